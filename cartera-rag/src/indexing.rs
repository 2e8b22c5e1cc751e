//! One-time bootstrap of the customer collection from the record store.
//!
//! The collection counts as indexed as soon as it holds any document; there
//! is no reconciliation against the current size of the record store. A
//! bootstrap that fails part-way leaves the completed batches in place, and
//! later bootstraps will then skip. [`Indexer::rebuild`] is the way out of
//! either situation.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::document::{CustomerMetadata, CustomerRecord, IndexedDocument};
use crate::embedding::{EmbeddingProvider, ensure_batch_len};
use crate::error::Result;
use crate::record::RecordSource;
use crate::vectorstore::VectorStore;

/// Split `items` into consecutive batches of at most `size` items.
///
/// The last batch holds the remainder. A `size` of zero is treated as one.
pub fn batches<T>(items: &[T], size: usize) -> impl Iterator<Item = &[T]> {
    items.chunks(size.max(1))
}

/// Outcome of [`Indexer::ensure_indexed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IndexReport {
    /// The collection already held documents; nothing was loaded.
    AlreadyIndexed { documents: usize },
    /// The record store was loaded and inserted.
    Indexed { documents: usize, batches: usize },
}

impl IndexReport {
    /// Documents present in the collection after the bootstrap.
    pub fn documents(&self) -> usize {
        match self {
            IndexReport::AlreadyIndexed { documents } | IndexReport::Indexed { documents, .. } => {
                *documents
            }
        }
    }
}

/// Populates a collection from a [`RecordSource`] exactly once.
///
/// Calls on the same `Indexer` are serialised, so concurrent callers in one
/// process never load the records twice. Separate processes sharing a
/// [`JsonlVectorStore`](crate::JsonlVectorStore) directory are not
/// serialised; the store's on-disk id check turns a racing second load into
/// [`RagError::Conflict`](crate::RagError::Conflict), after which the
/// collection is non-empty and later bootstraps skip.
pub struct Indexer {
    records: Arc<dyn RecordSource>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    collection: String,
    batch_size: usize,
    lock: Mutex<()>,
}

impl Indexer {
    pub fn new(
        records: Arc<dyn RecordSource>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            records,
            embedding_provider,
            vector_store,
            collection: collection.into(),
            batch_size: batch_size.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection if needed and fill it if it is empty.
    ///
    /// # Errors
    ///
    /// Propagates the first failure from the record source, the embedding
    /// provider or the vector store. Batches inserted before the failure
    /// are kept.
    pub async fn ensure_indexed(&self) -> Result<IndexReport> {
        let _guard = self.lock.lock().await;
        self.bootstrap().await
    }

    /// Delete the collection and index the record store from scratch.
    pub async fn rebuild(&self) -> Result<IndexReport> {
        let _guard = self.lock.lock().await;
        info!(collection = %self.collection, "rebuilding collection");
        self.vector_store.delete_collection(&self.collection).await?;
        self.bootstrap().await
    }

    async fn bootstrap(&self) -> Result<IndexReport> {
        let collection = self.collection.as_str();
        self.vector_store.get_or_create_collection(collection).await?;

        let existing = self.vector_store.count(collection).await?;
        if existing > 0 {
            info!(collection, documents = existing, "collection already indexed");
            return Ok(IndexReport::AlreadyIndexed { documents: existing });
        }

        info!(collection, "indexing customer records");
        let records = self.records.load().await?;
        let total_batches = records.len().div_ceil(self.batch_size);

        for (index, batch) in batches(&records, self.batch_size).enumerate() {
            let batch_no = index + 1;
            self.index_batch(batch).await.inspect_err(|e| {
                error!(
                    collection,
                    batch = batch_no,
                    total_batches,
                    error = %e,
                    "indexing batch failed"
                );
            })?;
            info!(
                collection,
                batch = batch_no,
                total_batches,
                documents = batch.len(),
                "indexed batch"
            );
        }

        info!(collection, documents = records.len(), "indexing completed");
        Ok(IndexReport::Indexed { documents: records.len(), batches: total_batches })
    }

    async fn index_batch(&self, batch: &[CustomerRecord]) -> Result<()> {
        let texts: Vec<&str> = batch.iter().map(|r| r.summary.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await?;
        ensure_batch_len(self.embedding_provider.name(), batch.len(), embeddings.len())?;

        let documents = batch
            .iter()
            .zip(embeddings)
            .map(|(record, embedding)| IndexedDocument {
                id: record.id.clone(),
                summary: record.summary.clone(),
                embedding,
                metadata: CustomerMetadata::from(record),
            })
            .collect();
        self.vector_store.add(&self.collection, documents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_cover_all_items_in_order() {
        let items: Vec<u32> = (0..250).collect();
        let sizes: Vec<usize> = batches(&items, 100).map(<[u32]>::len).collect();
        assert_eq!(sizes, [100, 100, 50]);
        let flattened: Vec<u32> = batches(&items, 100).flatten().copied().collect();
        assert_eq!(flattened, items);
    }

    #[test]
    fn batches_of_empty_input() {
        let items: [u8; 0] = [];
        assert_eq!(batches(&items, 100).count(), 0);
    }

    #[test]
    fn zero_batch_size_is_treated_as_one() {
        assert_eq!(batches(&[1, 2, 3], 0).count(), 3);
    }

    #[test]
    fn report_documents() {
        assert_eq!(IndexReport::AlreadyIndexed { documents: 4 }.documents(), 4);
        assert_eq!(IndexReport::Indexed { documents: 7, batches: 1 }.documents(), 7);
    }
}
