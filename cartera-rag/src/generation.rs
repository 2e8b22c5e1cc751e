//! Text generation provider trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single-turn generation request: a system instruction plus one user message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub user_message: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// A provider that generates text from an instruction and a user message.
///
/// Implementations surface transport, auth and rate-limit failures as
/// [`RagError::ProviderError`](crate::RagError::ProviderError) and never retry.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short provider name used in errors and logs.
    fn name(&self) -> &str;

    /// Generate a completion for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
