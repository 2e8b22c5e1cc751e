//! Shared handler state with lazily constructed services.

use std::path::PathBuf;
use std::sync::Arc;

use cartera_rag::{
    JsonlRecordStore, JsonlVectorStore, OpenAIChatProvider, OpenAIEmbeddingProvider,
    PortfolioMetrics, RagService, Result, openai::api_key_from_env,
};
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::ServerConfig;

/// Keys shorter than this are treated as placeholders.
const MIN_API_KEY_LEN: usize = 20;

/// Builds the [`RagService`] on first use.
pub trait ServiceFactory: Send + Sync {
    /// Whether [`build`](ServiceFactory::build) has what it needs to succeed.
    fn is_configured(&self) -> bool;

    fn build(&self) -> Result<RagService>;
}

/// Production factory: OpenAI providers over the on-disk record and index
/// directories.
pub struct OpenAIServiceFactory {
    config: ServerConfig,
}

impl OpenAIServiceFactory {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }
}

impl ServiceFactory for OpenAIServiceFactory {
    fn is_configured(&self) -> bool {
        api_key_from_env().is_some_and(|key| key.trim().len() > MIN_API_KEY_LEN)
    }

    fn build(&self) -> Result<RagService> {
        let config = &self.config;
        let mut embedder = OpenAIEmbeddingProvider::from_env()?;
        let mut chat = OpenAIChatProvider::from_env()?;
        if let Some(base_url) = &config.openai_base_url {
            embedder = embedder.with_base_url(base_url.clone());
            chat = chat.with_base_url(base_url.clone());
        }
        if let Some(model) = &config.embedding_model {
            embedder = embedder.with_model(model.clone());
        }
        if let Some(model) = &config.chat_model {
            chat = chat.with_model(model.clone());
        }

        let service = RagService::builder()
            .config(config.rag.clone())
            .record_source(Arc::new(JsonlRecordStore::in_dir(&config.data_dir)))
            .embedding_provider(Arc::new(embedder))
            .generation_provider(Arc::new(chat))
            .vector_store(Arc::new(JsonlVectorStore::open(&config.index_dir)?))
            .build()?;
        info!(index_dir = %config.index_dir.display(), "rag service initialised");
        Ok(service)
    }
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

struct StateInner {
    data_dir: PathBuf,
    factory: Arc<dyn ServiceFactory>,
    rag: OnceCell<Arc<RagService>>,
    metrics: OnceCell<Arc<PortfolioMetrics>>,
}

impl AppState {
    /// `data_dir` holds the metrics files; the factory builds the RAG service.
    pub fn new(data_dir: impl Into<PathBuf>, factory: Arc<dyn ServiceFactory>) -> Self {
        Self {
            inner: Arc::new(StateInner {
                data_dir: data_dir.into(),
                factory,
                rag: OnceCell::new(),
                metrics: OnceCell::new(),
            }),
        }
    }

    /// The RAG service, built on first call. A failed build is retried on
    /// the next call.
    pub async fn rag(&self) -> Result<Arc<RagService>> {
        self.inner
            .rag
            .get_or_try_init(|| async { self.inner.factory.build().map(Arc::new) })
            .await
            .cloned()
    }

    /// The RAG service only if it has already been built.
    pub fn rag_if_built(&self) -> Option<Arc<RagService>> {
        self.inner.rag.get().cloned()
    }

    pub fn rag_configured(&self) -> bool {
        self.inner.factory.is_configured()
    }

    /// Portfolio metrics, loaded from the data directory on first call.
    pub async fn metrics(&self) -> Result<Arc<PortfolioMetrics>> {
        self.inner
            .metrics
            .get_or_try_init(|| async {
                PortfolioMetrics::load(&self.inner.data_dir).map(Arc::new)
            })
            .await
            .cloned()
    }
}
