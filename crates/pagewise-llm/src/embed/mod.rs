//! Text embedding backends.
//!
//! Every backend is synchronous and deterministic: the same text always maps to
//! the same vector. Callers on an async runtime should run [`EmbeddingModel::embed_batch`]
//! on a blocking thread.

#[cfg(feature = "candle")]
pub mod candle;
pub mod hash;

pub use hash::HashEmbedder;

use crate::error::LlmError;

pub trait EmbeddingModel: Send + Sync {
    /// Embed each text, preserving input order and length.
    ///
    /// # Errors
    ///
    /// Returns an error if tokenization or the forward pass fails.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Length of every vector this model produces.
    fn dimensions(&self) -> usize;

    fn name(&self) -> &str;
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_vector_is_noop() {
        let mut v = vec![0.0; 4];
        l2_normalize(&mut v);
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
