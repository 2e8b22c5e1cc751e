//! Semantic search over the customer collection.

use std::sync::Arc;

use tracing::{debug, error};

use crate::document::Match;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Check a query and `k` before any provider is called.
///
/// # Errors
///
/// Returns [`RagError::InvalidArgument`] if `query` is blank or `k` is
/// outside `1..=max_top_k`.
pub fn validate_query(query: &str, k: usize, max_top_k: usize) -> Result<()> {
    if query.trim().is_empty() {
        return Err(RagError::InvalidArgument("query must not be empty".to_string()));
    }
    if k == 0 || k > max_top_k {
        return Err(RagError::InvalidArgument(format!(
            "k must be between 1 and {max_top_k}, got {k}"
        )));
    }
    Ok(())
}

/// Embeds a query and returns the nearest customers.
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    collection: String,
    max_top_k: usize,
}

impl Retriever {
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        max_top_k: usize,
    ) -> Self {
        Self { embedding_provider, vector_store, collection: collection.into(), max_top_k }
    }

    /// Return up to `k` matches in ascending distance order.
    ///
    /// Fewer than `k` matches are returned when the collection is smaller.
    ///
    /// # Errors
    ///
    /// [`RagError::InvalidArgument`] for a blank query or out-of-range `k`;
    /// provider and index errors are propagated unchanged.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Match>> {
        validate_query(query, k, self.max_top_k)?;

        let embedding = self.embedding_provider.embed(query).await.inspect_err(|e| {
            error!(error = %e, "query embedding failed");
        })?;

        let matches =
            self.vector_store.query(&self.collection, &embedding, k).await.inspect_err(|e| {
                error!(collection = %self.collection, error = %e, "vector store query failed");
            })?;

        debug!(collection = %self.collection, k, match_count = matches.len(), "search completed");
        Ok(matches)
    }
}
