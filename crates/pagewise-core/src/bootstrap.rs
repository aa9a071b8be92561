//! Construction of the provider and embedding model from [`Config`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pagewise_index::SharedEmbeddingModel;
use pagewise_llm::openai::OpenAiProvider;
use pagewise_llm::{EmbeddingModel, HashEmbedder, LlmError};

use crate::config::{Config, EmbeddingBackend, EmbeddingConfig};
use crate::engine::Engine;

/// # Errors
///
/// Returns an error if no API key was resolved or the HTTP client cannot be built.
pub fn create_provider(config: &Config) -> anyhow::Result<OpenAiProvider> {
    let api_key = config.secrets.api_key.as_ref().with_context(|| {
        format!(
            "API key for {} not found (set PAGEWISE_API_KEY or GROQ_API_KEY)",
            config.llm.provider_name
        )
    })?;

    // The engine enforces its own deadline; the client timeout only backs it up.
    let client = pagewise_llm::http::client_with_timeout(Duration::from_secs(
        config.timeouts.llm_seconds.saturating_add(5),
    ))?;

    let provider = OpenAiProvider::new(
        config.llm.provider_name.clone(),
        api_key.expose().to_owned(),
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.max_tokens,
    )?
    .with_client(client);
    Ok(provider)
}

/// Embedding model that loads on first use.
///
/// Loading the candle backend downloads weights, so nothing happens until the
/// first document is processed.
#[must_use]
pub fn create_embedding_model(config: &EmbeddingConfig) -> SharedEmbeddingModel {
    let backend = config.backend;
    let dimensions = config.dimensions;
    let model = config.model.clone();
    SharedEmbeddingModel::new(move || load_embedding_model(backend, &model, dimensions))
}

fn load_embedding_model(
    backend: EmbeddingBackend,
    model: &str,
    dimensions: usize,
) -> Result<Arc<dyn EmbeddingModel>, LlmError> {
    match backend {
        EmbeddingBackend::Hash => Ok(Arc::new(HashEmbedder::new(dimensions)?)),
        #[cfg(feature = "candle")]
        EmbeddingBackend::Candle => Ok(Arc::new(
            pagewise_llm::embed::candle::BertEmbedder::load_cpu(model)?,
        )),
        #[cfg(not(feature = "candle"))]
        EmbeddingBackend::Candle => Err(LlmError::ModelLoad(format!(
            "embedding model {model} needs the candle feature"
        ))),
    }
}

/// Provider, embedding model and engine for a single-user process.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the provider cannot be built.
pub fn build_engine(config: &Config) -> anyhow::Result<Engine<OpenAiProvider>> {
    config.validate()?;
    let provider = Arc::new(create_provider(config)?);
    let model = Arc::new(create_embedding_model(&config.embedding));
    Ok(Engine::from_config(config, provider, model))
}

#[cfg(test)]
mod tests {
    use crate::config::Secret;

    use super::*;

    #[test]
    fn provider_requires_api_key() {
        let mut config = Config::default();
        config.secrets.api_key = None;
        let err = create_provider(&config).unwrap_err();
        assert!(err.to_string().contains("API key for groq not found"));
    }

    #[test]
    fn provider_uses_configured_model() {
        let mut config = Config::default();
        config.secrets.api_key = Some(Secret::new("gsk-test"));
        config.llm.model = "llama-3.1-8b-instant".into();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model(), "llama-3.1-8b-instant");
        assert!(!format!("{provider:?}").contains("gsk-test"));
    }

    #[tokio::test]
    async fn hash_backend_loads_lazily() {
        let config = EmbeddingConfig {
            backend: EmbeddingBackend::Hash,
            dimensions: 64,
            ..EmbeddingConfig::default()
        };
        let shared = create_embedding_model(&config);
        assert!(!shared.is_loaded());
        let model = shared.get().await.unwrap();
        assert_eq!(model.dimensions(), 64);
        assert!(shared.is_loaded());
    }

    #[cfg(not(feature = "candle"))]
    #[tokio::test]
    async fn candle_backend_without_feature_fails_on_load() {
        let config = EmbeddingConfig {
            backend: EmbeddingBackend::Candle,
            ..EmbeddingConfig::default()
        };
        let shared = create_embedding_model(&config);
        assert!(shared.get().await.is_err());
    }

    #[test]
    fn build_engine_rejects_invalid_config() {
        let mut config = Config::default();
        config.secrets.api_key = Some(Secret::new("k"));
        config.session.chunk_overlap = config.session.chunk_size;
        assert!(build_engine(&config).is_err());
    }
}
