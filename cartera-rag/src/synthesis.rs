//! Grounded answer generation from retrieved customer context.
//!
//! Grounding is requested through [`SYSTEM_INSTRUCTION`] only. The answer is
//! not checked afterwards for ids outside the retrieved matches.

use std::sync::Arc;

use tracing::{error, info};

use crate::document::{AnswerResult, Match};
use crate::error::{RagError, Result};
use crate::generation::{GenerationProvider, GenerationRequest};
use crate::retrieval::Retriever;

/// Instruction sent as the system message of every answer request.
pub const SYSTEM_INSTRUCTION: &str = "You are a specialised banking assistant.
Answer ONLY from the customer information provided.
If the information is insufficient, say \"not available in the provided data\".
Always cite the customer ids when relevant.
Be concise and precise.";

/// Render matches as `Customer {id}: {summary}` paragraphs, in match order.
pub fn build_context(matches: &[Match]) -> String {
    matches
        .iter()
        .map(|m| format!("Customer {}: {}", m.customer_id, m.summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the user message embedding the context block and the question.
pub fn build_user_message(context: &str, query: &str) -> String {
    format!(
        "Customer context:\n{context}\n\nQuestion: {query}\n\n\
         Answer based solely on the provided context."
    )
}

/// Retrieves context for a question and asks the generation provider to
/// answer from it.
pub struct Synthesizer {
    retriever: Arc<Retriever>,
    generation_provider: Arc<dyn GenerationProvider>,
    temperature: f32,
    max_output_tokens: u32,
}

impl Synthesizer {
    pub fn new(
        retriever: Arc<Retriever>,
        generation_provider: Arc<dyn GenerationProvider>,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Self {
        Self { retriever, generation_provider, temperature, max_output_tokens }
    }

    /// Answer `query` from the `k` nearest customers.
    ///
    /// # Errors
    ///
    /// Retrieval and provider errors are propagated unchanged. An empty
    /// completion is a [`RagError::ProviderError`]; no fallback answer is
    /// produced.
    pub async fn answer(&self, query: &str, k: usize) -> Result<AnswerResult> {
        let matches = self.retriever.search(query, k).await?;
        let context = build_context(&matches);

        let request = GenerationRequest {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            user_message: build_user_message(&context, query),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        };

        let provider = self.generation_provider.name();
        let answer = self.generation_provider.generate(&request).await.inspect_err(|e| {
            error!(provider, error = %e, "answer generation failed");
        })?;
        if answer.trim().is_empty() {
            return Err(RagError::provider(provider, "generated answer was empty"));
        }

        info!(k, context_used = matches.len(), "answer generated");
        let context_used = matches.len();
        Ok(AnswerResult { answer, matches, context_used })
    }
}
