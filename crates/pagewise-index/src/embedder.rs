//! Lazily loaded, process-wide embedding model and the async [`Embedder`] over it.
//!
//! One [`SharedEmbeddingModel`] is constructed at startup and handed to every
//! session by `Arc`. The model itself is loaded on first use, on a blocking
//! thread, and then reused for every document and query.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use pagewise_llm::{EmbeddingModel, LlmError};
use tokio::sync::OnceCell;

use crate::error::{IndexError, Result};

pub type ModelLoader =
    Arc<dyn Fn() -> std::result::Result<Arc<dyn EmbeddingModel>, LlmError> + Send + Sync>;

pub struct SharedEmbeddingModel {
    cell: OnceCell<Arc<dyn EmbeddingModel>>,
    loader: ModelLoader,
}

impl fmt::Debug for SharedEmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedEmbeddingModel")
            .field("loaded", &self.cell.initialized())
            .field("model", &self.cell.get().map(|m| m.name().to_owned()))
            .finish_non_exhaustive()
    }
}

impl SharedEmbeddingModel {
    /// Defer loading until the first [`get`](Self::get). A failed load leaves the
    /// cell empty so the next call tries again.
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> std::result::Result<Arc<dyn EmbeddingModel>, LlmError> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            loader: Arc::new(loader),
        }
    }

    #[must_use]
    pub fn preloaded(model: Arc<dyn EmbeddingModel>) -> Self {
        let for_loader = Arc::clone(&model);
        Self {
            cell: OnceCell::new_with(Some(model)),
            loader: Arc::new(move || Ok(Arc::clone(&for_loader))),
        }
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// The model, loading it on first call. Concurrent first callers wait on a
    /// single load.
    ///
    /// # Errors
    ///
    /// Returns an error if the loader fails or panics.
    pub async fn get(&self) -> Result<Arc<dyn EmbeddingModel>> {
        let model = self
            .cell
            .get_or_try_init(|| async {
                let loader = Arc::clone(&self.loader);
                let started = Instant::now();
                let model = tokio::task::spawn_blocking(move || loader()).await??;
                tracing::info!(
                    model = model.name(),
                    dimensions = model.dimensions(),
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "embedding model ready"
                );
                Ok::<_, IndexError>(model)
            })
            .await?;
        Ok(Arc::clone(model))
    }
}

/// Turns text into vectors with the shared model, off the async runtime.
#[derive(Debug, Clone)]
pub struct Embedder {
    model: Arc<SharedEmbeddingModel>,
}

impl Embedder {
    #[must_use]
    pub fn new(model: Arc<SharedEmbeddingModel>) -> Self {
        Self { model }
    }

    /// One vector per input, in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if the model fails, or returns the wrong number or
    /// shape of vectors.
    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.model.get().await?;
        let expected = texts.len();
        let dimensions = model.dimensions();

        let started = Instant::now();
        let vectors = tokio::task::spawn_blocking(move || model.embed_batch(&texts)).await??;

        if vectors.len() != expected {
            return Err(IndexError::LengthMismatch {
                expected,
                actual: vectors.len(),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: dimensions,
                actual: bad.len(),
            });
        }

        tracing::debug!(
            count = expected,
            dimensions,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "embedded texts"
        );
        Ok(vectors)
    }

    /// # Errors
    ///
    /// Same as [`embed`](Self::embed).
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(vec![query.to_owned()])
            .await?
            .pop()
            .ok_or(IndexError::LengthMismatch {
                expected: 1,
                actual: 0,
            })
    }
}
