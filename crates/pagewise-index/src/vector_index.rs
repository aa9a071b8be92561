//! Exact in-memory nearest-neighbour index over passage embeddings.

use crate::chunker::Passage;
use crate::error::{IndexError, Result};

struct Entry {
    passage: Passage,
    embedding: Vec<f32>,
}

/// Passages and their embeddings for one document.
///
/// Starts unbuilt; [`build`](Self::build) replaces the whole contents and the
/// entries are read-only afterwards.
#[derive(Default)]
pub struct VectorIndex {
    entries: Option<Vec<Entry>>,
    dimensions: usize,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("built", &self.is_built())
            .field("len", &self.len())
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

/// A search hit, borrowed from the index.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub passage: &'a Passage,
    pub embedding: &'a [f32],
    /// Cosine similarity to the query, higher is closer.
    pub similarity: f32,
}

impl VectorIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `passages` with their parallel `embeddings`, discarding any prior contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the slices differ in length or the embeddings differ
    /// in dimension.
    pub fn build(&mut self, passages: Vec<Passage>, embeddings: Vec<Vec<f32>>) -> Result<()> {
        if passages.len() != embeddings.len() {
            return Err(IndexError::LengthMismatch {
                expected: passages.len(),
                actual: embeddings.len(),
            });
        }
        let dimensions = embeddings.first().map_or(0, Vec::len);
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: dimensions,
                actual: bad.len(),
            });
        }

        let entries: Vec<Entry> = passages
            .into_iter()
            .zip(embeddings)
            .map(|(passage, embedding)| Entry { passage, embedding })
            .collect();
        tracing::info!(passages = entries.len(), dimensions, "built vector index");
        self.entries = Some(entries);
        self.dimensions = dimensions;
        Ok(())
    }

    /// Shorthand for a fresh index followed by [`build`](Self::build).
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn from_parts(passages: Vec<Passage>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        let mut index = Self::new();
        index.build(passages, embeddings)?;
        Ok(index)
    }

    #[must_use]
    pub fn is_built(&self) -> bool {
        self.entries.is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The `top_n` passages most similar to `query`, by descending cosine
    /// similarity; equal scores keep document order.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotBuilt`] before the first build, and a dimension
    /// error if `query` does not match the indexed vectors.
    pub fn search(&self, query: &[f32], top_n: usize) -> Result<Vec<Neighbor<'_>>> {
        let entries = self.entries.as_ref().ok_or(IndexError::NotBuilt)?;
        if !entries.is_empty() && query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        let mut hits: Vec<Neighbor<'_>> = entries
            .iter()
            .map(|e| Neighbor {
                passage: &e.passage,
                embedding: &e.embedding,
                similarity: cosine_similarity(query, &e.embedding),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then(a.passage.sequence_index.cmp(&b.passage.sequence_index))
        });
        hits.truncate(top_n);
        Ok(hits)
    }
}

/// Cosine similarity; zero when either vector has no magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
