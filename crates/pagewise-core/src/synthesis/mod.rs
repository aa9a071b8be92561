//! Cited answer synthesis: prompt the model with retrieved passages and
//! attribute its reply to pages.

pub mod citation;
pub mod prompt;

use std::sync::Arc;
use std::time::{Duration, Instant};

use pagewise_index::{RetrievalResult, RetrievedPassage};
use pagewise_llm::{GenerationOptions, LlmError, LlmProvider};
use serde::Serialize;
use tracing::Instrument;

pub use citation::{CitationExtractor, Citations, PageReferenceExtractor, resolve_citations};
pub use prompt::{NOT_FOUND_ANSWER, QuickAction};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Cited pages, deduplicated in order of first appearance.
    pub citations: Vec<usize>,
    /// The model named no retrieved page; `citations` lists the retrieved pages.
    pub citations_inferred: bool,
    /// Passages the answer was generated from, in retrieval order.
    pub sources: Vec<RetrievedPassage>,
}

pub struct Synthesizer<P: LlmProvider> {
    provider: Arc<P>,
    extractor: Arc<dyn CitationExtractor>,
    timeout: Duration,
    max_tokens: Option<u32>,
}

impl<P: LlmProvider> Clone for Synthesizer<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            extractor: Arc::clone(&self.extractor),
            timeout: self.timeout,
            max_tokens: self.max_tokens,
        }
    }
}

impl<P: LlmProvider> std::fmt::Debug for Synthesizer<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer")
            .field("provider", &self.provider.name())
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> Synthesizer<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, timeout: Duration) -> Self {
        Self {
            provider,
            extractor: Arc::new(PageReferenceExtractor),
            timeout,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn CitationExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Ask the model to answer `question` from `retrieved` and cite its pages.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SynthesisTimeout`] when the call exceeds the
    /// timeout, and [`EngineError::Synthesis`] for any other inference failure,
    /// including a blank reply. Nothing is retried.
    pub async fn synthesize(
        &self,
        question: &str,
        retrieved: RetrievalResult,
        temperature: f32,
    ) -> Result<Answer, EngineError> {
        let messages = prompt::build_messages(question, &retrieved);
        let options = GenerationOptions {
            temperature,
            max_tokens: self.max_tokens,
        };
        let prompt_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        tracing::debug!(
            passages = retrieved.len(),
            prompt_chars,
            temperature,
            "sending synthesis request"
        );

        let start = Instant::now();
        let llm_span = tracing::info_span!("llm_call", provider = %self.provider.name());
        let chat = self.provider.chat(&messages, &options).instrument(llm_span);
        let text = match tokio::time::timeout(self.timeout, chat).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) if e.is_timeout() => {
                tracing::warn!("inference request timed out: {e}");
                return Err(EngineError::SynthesisTimeout(self.timeout));
            }
            Ok(Err(e)) => return Err(EngineError::Synthesis(e)),
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "LLM request timed out");
                return Err(EngineError::SynthesisTimeout(self.timeout));
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::Synthesis(LlmError::EmptyResponse {
                provider: self.provider.name().to_owned(),
            }));
        }

        let citations = resolve_citations(self.extractor.as_ref(), text, &retrieved);
        tracing::info!(
            latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            answer_chars = text.len(),
            citations = ?citations.pages,
            inferred = citations.inferred,
            "synthesized answer"
        );

        Ok(Answer {
            text: text.to_owned(),
            citations: citations.pages,
            citations_inferred: citations.inferred,
            sources: retrieved.passages,
        })
    }
}
