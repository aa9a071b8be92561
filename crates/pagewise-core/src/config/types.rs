use std::fmt;

use pagewise_index::RetrievalConfig;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

fn default_provider_name() -> String {
    "groq".into()
}

fn default_base_url() -> String {
    pagewise_llm::openai::GROQ_BASE_URL.into()
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".into()
}

fn default_max_tokens() -> u32 {
    1024
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Label used in logs and error messages.
    #[serde(default = "default_provider_name")]
    pub provider_name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider_name: default_provider_name(),
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Feature-hashing embedder, no download.
    #[default]
    Hash,
    /// BERT sentence embeddings from the Hugging Face hub.
    Candle,
}

impl EmbeddingBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Candle => "candle",
        }
    }
}

impl fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hash" => Ok(Self::Hash),
            "candle" => Ok(Self::Candle),
            other => Err(format!("unknown embedding backend: {other}")),
        }
    }
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".into()
}

fn default_dimensions() -> usize {
    384
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,
    /// Hub repository for the `candle` backend.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Vector size for the `hash` backend; `candle` takes it from the model.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
        }
    }
}

pub const CHUNK_SIZE_RANGE: std::ops::RangeInclusive<usize> = 200..=2000;
pub const CHUNK_OVERLAP_MAX: usize = 500;

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_k() -> usize {
    pagewise_index::retriever::DEFAULT_K
}

fn default_fetch_n() -> usize {
    pagewise_index::retriever::DEFAULT_FETCH_N
}

fn default_mmr_lambda() -> f32 {
    pagewise_index::retriever::DEFAULT_MMR_LAMBDA
}

/// Per-document settings, fixed once processing starts.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_fetch_n")]
    pub fetch_n: usize,
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            temperature: 0.0,
            k: default_k(),
            fetch_n: default_fetch_n(),
            mmr_lambda: default_mmr_lambda(),
        }
    }
}

impl SessionConfig {
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] naming the first out-of-range field.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !CHUNK_SIZE_RANGE.contains(&self.chunk_size) {
            return Err(EngineError::Configuration(format!(
                "chunk_size must be within {}..={}, got {}",
                CHUNK_SIZE_RANGE.start(),
                CHUNK_SIZE_RANGE.end(),
                self.chunk_size
            )));
        }
        if self.chunk_overlap > CHUNK_OVERLAP_MAX {
            return Err(EngineError::Configuration(format!(
                "chunk_overlap must be at most {CHUNK_OVERLAP_MAX}, got {}",
                self.chunk_overlap
            )));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(EngineError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(EngineError::Configuration(format!(
                "temperature must be within 0.0..=1.0, got {}",
                self.temperature
            )));
        }
        if self.k == 0 {
            return Err(EngineError::Configuration("k must be at least 1".into()));
        }
        if self.fetch_n < self.k {
            return Err(EngineError::Configuration(format!(
                "fetch_n ({}) must be at least k ({})",
                self.fetch_n, self.k
            )));
        }
        if !(0.0..=1.0).contains(&self.mmr_lambda) {
            return Err(EngineError::Configuration(format!(
                "mmr_lambda must be within 0.0..=1.0, got {}",
                self.mmr_lambda
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn retrieval(&self) -> RetrievalConfig {
        RetrievalConfig {
            k: self.k,
            fetch_n: self.fetch_n,
            lambda: self.mmr_lambda,
        }
    }
}

fn default_llm_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_llm_timeout")]
    pub llm_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_seconds: default_llm_timeout(),
        }
    }
}

/// Wrapper for sensitive strings with redacted Debug/Display.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedSecrets {
    pub api_key: Option<Secret>,
}
