//! Error types for the `cartera-rag` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
///
/// Every component returns these unchanged to its caller; nothing in the
/// core retries or substitutes a fallback value.
#[derive(Debug, Error)]
pub enum RagError {
    /// The record source (or a static metrics file) is missing or corrupt.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// An embedding or generation provider call failed.
    #[error("Provider error ({provider}): {message}")]
    ProviderError {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector store is unreachable or a collection is missing.
    #[error("Index unavailable ({backend}): {message}")]
    IndexUnavailable {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// One or more ids were already present in the collection (or repeated
    /// within a single insert).
    #[error("Conflict in collection '{collection}': duplicate ids {ids:?}")]
    Conflict {
        /// The collection the insert targeted.
        collection: String,
        /// The offending ids.
        ids: Vec<String>,
    },

    /// A caller-supplied argument was out of range or empty.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Coarse classification of a [`RagError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DataUnavailable,
    Provider,
    IndexUnavailable,
    Conflict,
    InvalidArgument,
    Config,
}

impl RagError {
    /// Return the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::DataUnavailable(_) => ErrorKind::DataUnavailable,
            RagError::ProviderError { .. } => ErrorKind::Provider,
            RagError::IndexUnavailable { .. } => ErrorKind::IndexUnavailable,
            RagError::Conflict { .. } => ErrorKind::Conflict,
            RagError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            RagError::ConfigError(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn index(backend: &str, message: impl Into<String>) -> Self {
        RagError::IndexUnavailable { backend: backend.to_string(), message: message.into() }
    }

    pub(crate) fn provider(provider: &str, message: impl Into<String>) -> Self {
        RagError::ProviderError { provider: provider.to_string(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
