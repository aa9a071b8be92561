use super::{Config, EmbeddingBackend, Secret};

/// Checked in order; the first non-empty one wins.
pub(crate) const API_KEY_VARS: [&str; 2] = ["PAGEWISE_API_KEY", "GROQ_API_KEY"];

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PAGEWISE_LLM_PROVIDER") {
            self.llm.provider_name = v;
        }
        if let Ok(v) = std::env::var("PAGEWISE_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("PAGEWISE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("PAGEWISE_LLM_MAX_TOKENS") {
            if let Ok(n) = v.parse::<u32>() {
                self.llm.max_tokens = n;
            } else {
                tracing::warn!("ignoring invalid PAGEWISE_LLM_MAX_TOKENS value: {v}");
            }
        }
        if let Ok(v) = std::env::var("PAGEWISE_EMBEDDING_BACKEND") {
            match v.parse::<EmbeddingBackend>() {
                Ok(backend) => self.embedding.backend = backend,
                Err(e) => tracing::warn!("ignoring PAGEWISE_EMBEDDING_BACKEND: {e}"),
            }
        }
        if let Ok(v) = std::env::var("PAGEWISE_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("PAGEWISE_EMBEDDING_DIMENSIONS")
            && let Ok(n) = v.parse::<usize>()
        {
            self.embedding.dimensions = n;
        }
        if let Ok(v) = std::env::var("PAGEWISE_CHUNK_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.session.chunk_size = n;
        }
        if let Ok(v) = std::env::var("PAGEWISE_CHUNK_OVERLAP")
            && let Ok(n) = v.parse::<usize>()
        {
            self.session.chunk_overlap = n;
        }
        if let Ok(v) = std::env::var("PAGEWISE_TEMPERATURE") {
            if let Ok(t) = v.parse::<f32>() {
                self.session.temperature = t;
            } else {
                tracing::warn!("ignoring invalid PAGEWISE_TEMPERATURE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("PAGEWISE_K")
            && let Ok(n) = v.parse::<usize>()
        {
            self.session.k = n;
        }
        if let Ok(v) = std::env::var("PAGEWISE_FETCH_N")
            && let Ok(n) = v.parse::<usize>()
        {
            self.session.fetch_n = n;
        }
        if let Ok(v) = std::env::var("PAGEWISE_MMR_LAMBDA")
            && let Ok(l) = v.parse::<f32>()
        {
            self.session.mmr_lambda = l;
        }
        if let Ok(v) = std::env::var("PAGEWISE_TIMEOUT_LLM")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.llm_seconds = secs;
        }
    }

    /// Pick up the inference API key from the environment.
    pub fn resolve_secrets(&mut self) {
        self.secrets.api_key = API_KEY_VARS
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|v| !v.trim().is_empty())
            .map(Secret::new);
    }
}
