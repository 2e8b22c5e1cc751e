//! The RAG service context object.
//!
//! [`RagService`] owns the shared providers and vector store and exposes the
//! three operations callers need: [`answer`](RagService::answer),
//! [`search`](RagService::search) and [`index_stats`](RagService::index_stats).
//! It is constructed once per process and shared behind an `Arc`; the
//! indexing bootstrap runs lazily on the first query.
//!
//! # Example
//!
//! ```rust,ignore
//! use cartera_rag::{JsonlRecordStore, JsonlVectorStore, RagConfig, RagService};
//!
//! let service = RagService::builder()
//!     .config(RagConfig::default())
//!     .record_source(Arc::new(JsonlRecordStore::in_dir("data".as_ref())))
//!     .embedding_provider(Arc::new(embedder))
//!     .generation_provider(Arc::new(chat))
//!     .vector_store(Arc::new(JsonlVectorStore::open("rag_cartera")?))
//!     .build()?;
//!
//! let result = service.answer("high income public sector customers", 5).await?;
//! ```

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::config::RagConfig;
use crate::document::{AnswerResult, IndexStats, Match};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::indexing::{IndexReport, Indexer};
use crate::record::RecordSource;
use crate::retrieval::{Retriever, validate_query};
use crate::synthesis::Synthesizer;
use crate::vectorstore::VectorStore;

/// Process-wide entry point to retrieval and answering.
///
/// Construct one via [`RagService::builder()`].
pub struct RagService {
    config: RagConfig,
    vector_store: Arc<dyn VectorStore>,
    indexer: Arc<Indexer>,
    retriever: Arc<Retriever>,
    synthesizer: Synthesizer,
    bootstrap: OnceCell<IndexReport>,
}

impl RagService {
    /// Create a new [`RagServiceBuilder`].
    pub fn builder() -> RagServiceBuilder {
        RagServiceBuilder::default()
    }

    /// Return a reference to the service configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Run the indexing bootstrap if it has not completed in this process.
    ///
    /// Concurrent callers wait for a single bootstrap. The bootstrap runs on
    /// its own task, so a caller that is dropped mid-way (a timed-out
    /// request, say) does not cut indexing short; the next caller waits for
    /// that task through the indexer lock. A failed bootstrap is not cached;
    /// the next call tries again (and, if the failure left a partial index
    /// behind, will find the collection non-empty and skip).
    pub async fn ensure_indexed(&self) -> Result<IndexReport> {
        self.bootstrap
            .get_or_try_init(|| {
                let indexer = self.indexer.clone();
                detached(async move { indexer.ensure_indexed().await })
            })
            .await
            .copied()
    }

    /// Drop the collection and index the record store again.
    ///
    /// Like the bootstrap, the rebuild completes even if the caller is dropped.
    pub async fn rebuild_index(&self) -> Result<IndexReport> {
        let indexer = self.indexer.clone();
        let report = detached(async move { indexer.rebuild().await }).await?;
        info!(documents = report.documents(), "index rebuilt");
        Ok(report)
    }

    /// Return up to `k` customers nearest to `query`, closest first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Match>> {
        validate_query(query, k, self.config.max_top_k)?;
        self.ensure_indexed().await?;
        self.retriever.search(query, k).await
    }

    /// Answer `query` using the `k` nearest customers as context.
    pub async fn answer(&self, query: &str, k: usize) -> Result<AnswerResult> {
        validate_query(query, k, self.config.max_top_k)?;
        self.ensure_indexed().await?;
        self.synthesizer.answer(query, k).await
    }

    /// Report the collection size without triggering indexing.
    ///
    /// A collection that has not been created yet reports as empty.
    pub async fn index_stats(&self) -> Result<IndexStats> {
        let collection = self.config.collection_name.as_str();
        let total = match self.vector_store.count(collection).await {
            Ok(total) => total,
            Err(RagError::IndexUnavailable { .. }) if self.bootstrap.get().is_none() => 0,
            Err(e) => return Err(e),
        };
        Ok(IndexStats::new(collection, total))
    }
}

/// Run an indexing job on its own task and wait for it.
async fn detached<F>(job: F) -> Result<IndexReport>
where
    F: Future<Output = Result<IndexReport>> + Send + 'static,
{
    tokio::spawn(async move {
        job.await.inspect_err(|e| error!(error = %e, "indexing job failed"))
    })
    .await
    .map_err(|e| RagError::index("indexer", format!("indexing task did not complete: {e}")))?
}

/// Builder for constructing a [`RagService`].
///
/// All components are required; `config` defaults to [`RagConfig::default`].
#[derive(Default)]
pub struct RagServiceBuilder {
    config: Option<RagConfig>,
    record_source: Option<Arc<dyn RecordSource>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
}

impl RagServiceBuilder {
    /// Set the service configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the customer record source used by the bootstrap.
    pub fn record_source(mut self, source: Arc<dyn RecordSource>) -> Self {
        self.record_source = Some(source);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Build the [`RagService`], validating that all components are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any component is missing.
    pub fn build(self) -> Result<RagService> {
        let config = self.config.unwrap_or_default();
        let record_source = self
            .record_source
            .ok_or_else(|| RagError::ConfigError("record_source is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::ConfigError("generation_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;

        let indexer = Arc::new(Indexer::new(
            record_source,
            embedding_provider.clone(),
            vector_store.clone(),
            config.collection_name.clone(),
            config.index_batch_size,
        ));
        let retriever = Arc::new(Retriever::new(
            embedding_provider,
            vector_store.clone(),
            config.collection_name.clone(),
            config.max_top_k,
        ));
        let synthesizer = Synthesizer::new(
            retriever.clone(),
            generation_provider,
            config.temperature,
            config.max_output_tokens,
        );

        Ok(RagService {
            config,
            vector_store,
            indexer,
            retriever,
            synthesizer,
            bootstrap: OnceCell::new(),
        })
    }
}
