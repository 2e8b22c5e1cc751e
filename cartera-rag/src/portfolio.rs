//! Portfolio balance metrics read from precomputed totals.
//!
//! Nothing here touches the vector store or any provider. The two input
//! files are produced offline: `metrics_config.json` names the product
//! columns behind each balance and `portfolio_totals.json` holds the sums.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{RagError, Result};

pub const METRICS_CONFIG_FILENAME: &str = "metrics_config.json";
pub const PORTFOLIO_TOTALS_FILENAME: &str = "portfolio_totals.json";

/// Column definitions for each balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub definitions: MetricDefinitions,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricDefinitions {
    /// Liability product columns (deposits).
    pub captaciones: Vec<String>,
    /// Asset product columns (loans, cards).
    pub colocaciones: Vec<String>,
}

/// Precomputed portfolio totals, in CRC.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioTotals {
    pub captaciones_total_crc: f64,
    pub colocaciones_total_crc: f64,
    #[serde(default)]
    pub saldo_neto_crc: Option<f64>,
    pub n_clientes: u64,
    #[serde(default)]
    pub cols_pasivas_detectadas: Vec<String>,
    #[serde(default)]
    pub cols_activas_detectadas: Vec<String>,
}

/// Which balance to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaldoKind {
    Neto,
    Captaciones,
    Colocaciones,
}

impl FromStr for SaldoKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neto" => Ok(SaldoKind::Neto),
            "captaciones" => Ok(SaldoKind::Captaciones),
            "colocaciones" => Ok(SaldoKind::Colocaciones),
            other => Err(RagError::InvalidArgument(format!(
                "invalid balance type '{other}', expected 'neto', 'captaciones' or 'colocaciones'"
            ))),
        }
    }
}

impl fmt::Display for SaldoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SaldoKind::Neto => "neto",
            SaldoKind::Captaciones => "captaciones",
            SaldoKind::Colocaciones => "colocaciones",
        })
    }
}

/// A single balance figure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SaldoReport {
    pub tipo: SaldoKind,
    pub crc: f64,
    pub n_clientes: u64,
    /// Columns summed into this balance (absent for `neto`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cols: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captaciones_crc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colocaciones_crc: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductColumns {
    pub cols_detectadas: Vec<String>,
    pub definicion: Vec<String>,
}

/// Per-product breakdown of both balances.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SaldoPorProducto {
    pub captaciones: ProductColumns,
    pub colocaciones: ProductColumns,
    pub n_clientes: u64,
}

/// Every total at once.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TotalsSummary {
    pub captaciones_crc: f64,
    pub colocaciones_crc: f64,
    pub neto_crc: f64,
    pub n_clientes: u64,
    pub cols_captaciones: Vec<String>,
    pub cols_colocaciones: Vec<String>,
}

/// Round to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Read-only view over the metrics configuration and portfolio totals.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioMetrics {
    config: MetricsConfig,
    totals: PortfolioTotals,
}

impl PortfolioMetrics {
    pub fn new(config: MetricsConfig, totals: PortfolioTotals) -> Self {
        Self { config, totals }
    }

    /// Load both files from `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DataUnavailable`] if either file is missing or
    /// does not match the expected shape.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config: MetricsConfig = read_json(&data_dir.join(METRICS_CONFIG_FILENAME))?;
        let totals: PortfolioTotals = read_json(&data_dir.join(PORTFOLIO_TOTALS_FILENAME))?;
        info!(n_clientes = totals.n_clientes, "loaded portfolio totals");
        Ok(Self::new(config, totals))
    }

    /// Net balance: captaciones minus colocaciones, before rounding.
    pub fn neto(&self) -> f64 {
        self.totals.captaciones_total_crc - self.totals.colocaciones_total_crc
    }

    pub fn saldo(&self, kind: SaldoKind) -> SaldoReport {
        let definitions = &self.config.definitions;
        let base = SaldoReport {
            tipo: kind,
            crc: 0.0,
            n_clientes: self.totals.n_clientes,
            cols: None,
            formula: None,
            captaciones_crc: None,
            colocaciones_crc: None,
        };
        match kind {
            SaldoKind::Captaciones => SaldoReport {
                crc: round2(self.totals.captaciones_total_crc),
                cols: Some(definitions.captaciones.clone()),
                ..base
            },
            SaldoKind::Colocaciones => SaldoReport {
                crc: round2(self.totals.colocaciones_total_crc),
                cols: Some(definitions.colocaciones.clone()),
                ..base
            },
            SaldoKind::Neto => SaldoReport {
                crc: round2(self.neto()),
                formula: Some("captaciones - colocaciones"),
                captaciones_crc: Some(round2(self.totals.captaciones_total_crc)),
                colocaciones_crc: Some(round2(self.totals.colocaciones_total_crc)),
                ..base
            },
        }
    }

    pub fn saldo_por_producto(&self) -> SaldoPorProducto {
        SaldoPorProducto {
            captaciones: ProductColumns {
                cols_detectadas: self.totals.cols_pasivas_detectadas.clone(),
                definicion: self.config.definitions.captaciones.clone(),
            },
            colocaciones: ProductColumns {
                cols_detectadas: self.totals.cols_activas_detectadas.clone(),
                definicion: self.config.definitions.colocaciones.clone(),
            },
            n_clientes: self.totals.n_clientes,
        }
    }

    /// Summary of all totals. A stored net balance takes precedence over
    /// the computed one.
    pub fn summary(&self) -> TotalsSummary {
        TotalsSummary {
            captaciones_crc: round2(self.totals.captaciones_total_crc),
            colocaciones_crc: round2(self.totals.colocaciones_total_crc),
            neto_crc: round2(self.totals.saldo_neto_crc.unwrap_or_else(|| self.neto())),
            n_clientes: self.totals.n_clientes,
            cols_captaciones: self.config.definitions.captaciones.clone(),
            cols_colocaciones: self.config.definitions.colocaciones.clone(),
        }
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        RagError::DataUnavailable(format!("cannot read '{}': {e}", path.display()))
    })?;
    serde_json::from_str(&text)
        .map_err(|e| RagError::DataUnavailable(format!("malformed '{}': {e}", path.display())))
}
