//! Configuration for the retrieval and answering pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default name of the customer collection in the vector store.
pub const DEFAULT_COLLECTION: &str = "clientes_cartera";

/// Configuration parameters for the RAG service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Name of the vector store collection holding customer summaries.
    pub collection_name: String,
    /// Number of records embedded and inserted per indexing batch.
    pub index_batch_size: usize,
    /// Number of matches retrieved when the caller does not specify `k`.
    pub default_top_k: usize,
    /// Largest `k` accepted by search and answer.
    pub max_top_k: usize,
    /// Sampling temperature passed to the generation provider.
    pub temperature: f32,
    /// Upper bound on generated tokens per answer.
    pub max_output_tokens: u32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection_name: DEFAULT_COLLECTION.to_string(),
            index_batch_size: 100,
            default_top_k: 5,
            max_top_k: 20,
            temperature: 0.3,
            max_output_tokens: 500,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the collection name.
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.config.collection_name = name.into();
        self
    }

    /// Set the number of records per indexing batch.
    pub fn index_batch_size(mut self, size: usize) -> Self {
        self.config.index_batch_size = size;
        self
    }

    /// Set the default number of matches to retrieve.
    pub fn default_top_k(mut self, k: usize) -> Self {
        self.config.default_top_k = k;
        self
    }

    /// Set the largest accepted `k`.
    pub fn max_top_k(mut self, k: usize) -> Self {
        self.config.max_top_k = k;
        self
    }

    /// Set the generation temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the generation token limit.
    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.config.max_output_tokens = tokens;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `collection_name` is empty
    /// - `index_batch_size == 0`
    /// - `default_top_k == 0` or `default_top_k > max_top_k`
    /// - `temperature` is outside `[0, 2]`
    /// - `max_output_tokens == 0`
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.collection_name.trim().is_empty() {
            return Err(RagError::ConfigError("collection_name must not be empty".to_string()));
        }
        if config.index_batch_size == 0 {
            return Err(RagError::ConfigError(
                "index_batch_size must be greater than zero".to_string(),
            ));
        }
        if config.default_top_k == 0 {
            return Err(RagError::ConfigError(
                "default_top_k must be greater than zero".to_string(),
            ));
        }
        if config.default_top_k > config.max_top_k {
            return Err(RagError::ConfigError(format!(
                "default_top_k ({}) must not exceed max_top_k ({})",
                config.default_top_k, config.max_top_k
            )));
        }
        if !(0.0..=2.0).contains(&config.temperature) {
            return Err(RagError::ConfigError(format!(
                "temperature ({}) must be within [0, 2]",
                config.temperature
            )));
        }
        if config.max_output_tokens == 0 {
            return Err(RagError::ConfigError(
                "max_output_tokens must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }
}
