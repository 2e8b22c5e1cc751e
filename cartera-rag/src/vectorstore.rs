//! Vector store trait for storing and searching customer embeddings.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::document::{IndexedDocument, Match};
use crate::error::{RagError, Result};

/// A storage backend for customer embeddings with nearest-neighbour search.
///
/// Implementations manage named collections of [`IndexedDocument`]s keyed by
/// customer id. Documents are never updated in place; rebuilding a
/// collection means deleting and repopulating it.
///
/// # Example
///
/// ```rust,ignore
/// use cartera_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.get_or_create_collection("clientes").await?;
/// store.add("clientes", documents).await?;
/// let matches = store.query("clientes", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists.
    async fn get_or_create_collection(&self, name: &str) -> Result<()>;

    /// Delete a named collection and all its documents. No-op if absent.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Number of documents in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Insert documents into a collection.
    ///
    /// Ids must be unique within the call and absent from the collection,
    /// otherwise [`RagError::Conflict`] is returned and nothing is stored.
    async fn add(&self, collection: &str, documents: Vec<IndexedDocument>) -> Result<()>;

    /// Return the `k` documents nearest to `embedding`.
    ///
    /// Results are ordered by ascending distance; equal distances keep
    /// insertion order so identical inputs always produce identical output.
    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<Match>>;
}

/// Cosine distance `1 - cos(a, b)`, clamped to be non-negative.
///
/// Returns 1.0 (orthogonal) if either vector has zero magnitude.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).max(0.0)
}

/// Documents of one collection in insertion order, shared by the store backends.
#[derive(Debug, Clone, Default)]
pub(crate) struct CollectionData {
    documents: Vec<IndexedDocument>,
    ids: HashSet<String>,
}

impl CollectionData {
    pub(crate) fn from_documents(
        name: &str,
        documents: Vec<IndexedDocument>,
    ) -> Result<Self> {
        let mut data = Self::default();
        data.check_insert(name, &documents)?;
        data.insert(documents);
        Ok(data)
    }

    pub(crate) fn len(&self) -> usize {
        self.documents.len()
    }

    fn dimensions(&self) -> Option<usize> {
        self.documents.first().map(|d| d.embedding.len())
    }

    /// Validate an insert without applying it.
    pub(crate) fn check_insert(&self, name: &str, documents: &[IndexedDocument]) -> Result<()> {
        let mut batch_ids = HashSet::with_capacity(documents.len());
        let mut duplicates = Vec::new();
        for doc in documents {
            if self.ids.contains(&doc.id) || !batch_ids.insert(doc.id.as_str()) {
                duplicates.push(doc.id.clone());
            }
        }
        if !duplicates.is_empty() {
            return Err(RagError::Conflict { collection: name.to_string(), ids: duplicates });
        }

        let expected = self.dimensions().or_else(|| documents.first().map(|d| d.embedding.len()));
        if let Some(expected) = expected {
            if expected == 0 {
                return Err(RagError::InvalidArgument("embeddings must not be empty".into()));
            }
            if let Some(doc) = documents.iter().find(|d| d.embedding.len() != expected) {
                return Err(RagError::InvalidArgument(format!(
                    "embedding for '{}' has {} dimensions, collection '{name}' uses {expected}",
                    doc.id,
                    doc.embedding.len()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, documents: Vec<IndexedDocument>) {
        for doc in documents {
            self.ids.insert(doc.id.clone());
            self.documents.push(doc);
        }
    }

    pub(crate) fn nearest(&self, name: &str, embedding: &[f32], k: usize) -> Result<Vec<Match>> {
        if let Some(dims) = self.dimensions() {
            if dims != embedding.len() {
                return Err(RagError::InvalidArgument(format!(
                    "query embedding has {} dimensions, collection '{name}' uses {dims}",
                    embedding.len()
                )));
            }
        }

        let mut scored: Vec<(f32, &IndexedDocument)> =
            self.documents
                .iter()
                .map(|doc| (cosine_distance(&doc.embedding, embedding), doc))
                .collect();

        // Stable sort: ties stay in insertion order.
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, doc)| Match {
                customer_id: doc.id.clone(),
                summary: doc.summary.clone(),
                metadata: doc.metadata.clone(),
                distance,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_zero_distance() {
        let v = [0.3, 0.4, 0.5];
        assert!(cosine_distance(&v, &v) < 1e-6);
        assert!(cosine_distance(&v, &v) >= 0.0);
    }

    #[test]
    fn orthogonal_and_zero_vectors() {
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[0.0, 1.0]), 1.0);
    }

    #[test]
    fn opposite_vectors_have_distance_two() {
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }
}
