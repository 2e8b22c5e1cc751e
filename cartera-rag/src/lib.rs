//! # cartera-rag
//!
//! Retrieval-augmented question answering over a bank's customer portfolio.
//!
//! Customer summaries are loaded from a JSONL record store, embedded, and
//! indexed once into a persistent vector collection. Questions are embedded,
//! matched against the nearest customers, and answered by a generation
//! provider constrained to that retrieved context.
//!
//! ## Components
//!
//! - [`RecordSource`] / [`JsonlRecordStore`]: load [`CustomerRecord`]s
//! - [`EmbeddingProvider`]: text to vectors (OpenAI with the `openai` feature)
//! - [`VectorStore`]: [`JsonlVectorStore`] (durable) and [`InMemoryVectorStore`]
//! - [`Indexer`]: one-time bootstrap of the collection
//! - [`Retriever`]: nearest-neighbour search for a query
//! - [`Synthesizer`]: grounded answer generation
//! - [`RagService`]: the shared context object tying them together
//! - [`PortfolioMetrics`]: balance figures from precomputed totals
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cartera_rag::*;
//!
//! let service = RagService::builder()
//!     .record_source(Arc::new(JsonlRecordStore::in_dir("data".as_ref())))
//!     .embedding_provider(Arc::new(OpenAIEmbeddingProvider::from_env()?))
//!     .generation_provider(Arc::new(OpenAIChatProvider::from_env()?))
//!     .vector_store(Arc::new(JsonlVectorStore::open("rag_cartera")?))
//!     .build()?;
//!
//! let result = service.answer("retired customers with low income", 5).await?;
//! println!("{} (from {} customers)", result.answer, result.context_used);
//! ```

pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod indexing;
pub mod inmemory;
pub mod jsonl;
pub mod portfolio;
pub mod record;
pub mod retrieval;
pub mod service;
pub mod synthesis;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;

pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    AnswerResult, CustomerMetadata, CustomerProfile, CustomerRecord, IndexStats, IndexStatus,
    IndexedDocument, Match,
};
pub use embedding::EmbeddingProvider;
pub use error::{ErrorKind, RagError, Result};
pub use generation::{GenerationProvider, GenerationRequest};
pub use indexing::{IndexReport, Indexer, batches};
pub use inmemory::InMemoryVectorStore;
pub use jsonl::JsonlVectorStore;
pub use portfolio::{PortfolioMetrics, SaldoKind, SaldoReport};
pub use record::{JsonlRecordStore, RecordSource};
pub use retrieval::Retriever;
pub use service::{RagService, RagServiceBuilder};
pub use synthesis::Synthesizer;
pub use vectorstore::VectorStore;

#[cfg(feature = "openai")]
pub use openai::{OpenAIChatProvider, OpenAIEmbeddingProvider};
