//! Loading customer records from line-delimited JSON storage.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{error, info};

use crate::document::CustomerRecord;
use crate::error::{RagError, Result};

/// File name of the customer record store inside a data directory.
pub const RECORDS_FILENAME: &str = "row_cards.jsonl";

/// A read-only source of [`CustomerRecord`]s.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Load every record, preserving source order.
    ///
    /// Loading is all-or-nothing: a single unreadable record fails the
    /// whole call with [`RagError::DataUnavailable`].
    async fn load(&self) -> Result<Vec<CustomerRecord>>;
}

/// A [`RecordSource`] backed by a JSONL file, one record per line.
#[derive(Debug, Clone)]
pub struct JsonlRecordStore {
    path: PathBuf,
}

impl JsonlRecordStore {
    /// Read records from the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read records from [`RECORDS_FILENAME`] inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(RECORDS_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSource for JsonlRecordStore {
    async fn load(&self) -> Result<Vec<CustomerRecord>> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            error!(path = %self.path.display(), error = %e, "failed to read record store");
            RagError::DataUnavailable(format!("cannot read '{}': {e}", self.path.display()))
        })?;
        let records = parse_records(&text).map_err(|e| {
            error!(path = %self.path.display(), error = %e, "failed to parse record store");
            e
        })?;
        info!(path = %self.path.display(), record_count = records.len(), "loaded customer records");
        Ok(records)
    }
}

/// Parse JSONL text into records. Blank lines are ignored.
///
/// # Errors
///
/// Returns [`RagError::DataUnavailable`] naming the 1-based line number of the
/// first line that is not a valid record, or of the first repeated id.
pub fn parse_records(text: &str) -> Result<Vec<CustomerRecord>> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = index + 1;
        let record: CustomerRecord = serde_json::from_str(line).map_err(|e| {
            RagError::DataUnavailable(format!("malformed record on line {line_no}: {e}"))
        })?;
        if !seen.insert(record.id.clone()) {
            return Err(RagError::DataUnavailable(format!(
                "duplicate customer id '{}' on line {line_no}",
                record.id
            )));
        }
        records.push(record);
    }
    Ok(records)
}
