//! Server configuration read from the environment.

use std::path::PathBuf;

use anyhow::Context;
use cartera_rag::RagConfig;

/// Where the server listens and where it finds its data.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding `row_cards.jsonl`, `metrics_config.json` and
    /// `portfolio_totals.json`.
    pub data_dir: PathBuf,
    /// Directory the vector index persists to.
    pub index_dir: PathBuf,
    /// Optional OpenAI-compatible base URL.
    pub openai_base_url: Option<String>,
    pub embedding_model: Option<String>,
    pub chat_model: Option<String>,
    pub rag: RagConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            data_dir: PathBuf::from("data"),
            index_dir: PathBuf::from("rag_cartera"),
            openai_base_url: None,
            embedding_model: None,
            chat_model: None,
            rag: RagConfig::default(),
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl ServerConfig {
    /// Read `CARTERA_*` variables, falling back to [`ServerConfig::default`].
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let port = match var("CARTERA_PORT") {
            Some(port) => port
                .parse::<u16>()
                .with_context(|| format!("invalid CARTERA_PORT '{port}'"))?,
            None => defaults.port,
        };

        let mut rag = RagConfig::builder();
        if let Some(name) = var("CARTERA_COLLECTION") {
            rag = rag.collection_name(name);
        }
        if let Some(size) = var("CARTERA_INDEX_BATCH_SIZE") {
            rag = rag.index_batch_size(
                size.parse().with_context(|| format!("invalid CARTERA_INDEX_BATCH_SIZE '{size}'"))?,
            );
        }

        Ok(Self {
            host: var("CARTERA_HOST").unwrap_or(defaults.host),
            port,
            data_dir: var("CARTERA_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            index_dir: var("CARTERA_INDEX_DIR").map(PathBuf::from).unwrap_or(defaults.index_dir),
            openai_base_url: var("OPENAI_BASE_URL"),
            embedding_model: var("CARTERA_EMBEDDING_MODEL"),
            chat_model: var("CARTERA_CHAT_MODEL"),
            rag: rag.build()?,
        })
    }
}
