//! Feature-hashing bag-of-words embedder.
//!
//! Needs no model download, which makes it the default for offline use and tests.
//! Each lowercase alphanumeric token (and each adjacent token pair) is hashed
//! with blake3 into one of `dimensions` buckets with a hash-derived sign; counts
//! are damped with `ln(1 + tf)` and the result is L2-normalized. Features are
//! accumulated in sorted order so repeated calls are bit-identical.

use std::collections::BTreeMap;

use super::{EmbeddingModel, l2_normalize};
use crate::error::LlmError;

pub const DEFAULT_DIMENSIONS: usize = 384;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

impl HashEmbedder {
    /// # Errors
    ///
    /// Returns an error if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self, LlmError> {
        if dimensions == 0 {
            return Err(LlmError::ModelLoad(
                "hash embedder needs at least one dimension".into(),
            ));
        }
        Ok(Self { dimensions })
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let hash = blake3::hash(feature.as_bytes());
        let bytes = hash.as_bytes();
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[..8]);
        let value = u64::from_le_bytes(word);
        let sign = if value >> 63 == 0 { 1.0 } else { -1.0 };
        #[expect(clippy::cast_possible_truncation)]
        let index = (value % self.dimensions as u64) as usize;
        (index, sign)
    }

    #[must_use]
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for token in &tokens {
            *counts.entry(token.clone()).or_default() += 1;
        }
        for pair in tokens.windows(2) {
            *counts.entry(format!("{} {}", pair[0], pair[1])).or_default() += 1;
        }

        let mut vector = vec![0.0f32; self.dimensions];
        for (feature, tf) in &counts {
            let (index, sign) = self.bucket(feature);
            #[expect(clippy::cast_precision_loss)]
            let weight = (1.0 + *tf as f32).ln();
            vector[index] += sign * weight;
        }
        l2_normalize(&mut vector);
        vector
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl EmbeddingModel for HashEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "hash"
    }
}
