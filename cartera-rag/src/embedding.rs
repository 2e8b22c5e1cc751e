//! Embedding provider trait for turning text into vectors.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that maps text to fixed-dimension vectors.
///
/// [`embed_batch`](EmbeddingProvider::embed_batch) is the primitive: it must
/// return one vector per input, in input order, and split the input into
/// request batches the backend can accept. Failures surface as
/// [`RagError::ProviderError`]; providers do not retry.
///
/// # Example
///
/// ```rust,ignore
/// use cartera_rag::EmbeddingProvider;
///
/// let vectors = provider.embed_batch(&["retired low income", "public sector"]).await?;
/// assert_eq!(vectors.len(), 2);
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name used in errors and logs.
    fn name(&self) -> &str;

    /// Generate embeddings for a batch of texts, same length and order as `texts`.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Generate the embedding for a single text as a one-item batch.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text]).await?;
        ensure_batch_len(self.name(), 1, embeddings.len())?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RagError::provider(self.name(), "empty embedding response"))
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Fail with a provider error when a response does not cover every input.
pub fn ensure_batch_len(provider: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(RagError::provider(
            provider,
            format!("expected {expected} embeddings, received {got}"),
        ));
    }
    Ok(())
}
