//! Maximal-marginal-relevance retrieval.
//!
//! The `fetch_n` nearest passages are re-ranked greedily: each round picks the
//! candidate maximizing `λ·sim(candidate, query) − (1−λ)·max sim(candidate, picked)`.
//! With `λ = 1` this is plain nearest-neighbour order; lower values trade
//! relevance for coverage of different parts of the document.

use serde::Serialize;

use crate::chunker::Passage;
use crate::embedder::Embedder;
use crate::error::{IndexError, Result};
use crate::vector_index::{Neighbor, VectorIndex, cosine_similarity};

pub const DEFAULT_K: usize = 5;
pub const DEFAULT_FETCH_N: usize = 20;
pub const DEFAULT_MMR_LAMBDA: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    /// Passages returned.
    pub k: usize,
    /// Nearest neighbours considered before re-ranking.
    pub fetch_n: usize,
    /// Relevance weight in `[0, 1]`.
    pub lambda: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            fetch_n: DEFAULT_FETCH_N,
            lambda: DEFAULT_MMR_LAMBDA,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    pub passage: Passage,
    /// Cosine similarity to the query.
    pub relevance: f32,
}

/// Passages in selection order, at most `k` long.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub passages: Vec<RetrievedPassage>,
}

impl RetrievalResult {
    #[must_use]
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Distinct page numbers in selection order.
    #[must_use]
    pub fn pages(&self) -> Vec<usize> {
        let mut pages = Vec::new();
        for p in &self.passages {
            if !pages.contains(&p.passage.page_number) {
                pages.push(p.passage.page_number);
            }
        }
        pages
    }
}

#[derive(Debug, Clone)]
pub struct Retriever {
    embedder: Embedder,
    config: RetrievalConfig,
}

impl Retriever {
    #[must_use]
    pub fn new(embedder: Embedder, config: RetrievalConfig) -> Self {
        Self { embedder, config }
    }

    /// Embed `query` and select up to `k` diverse, relevant passages from `index`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotBuilt`] if `index` was never built, or an
    /// embedding error.
    pub async fn retrieve(&self, index: &VectorIndex, query: &str) -> Result<RetrievalResult> {
        if !index.is_built() {
            return Err(IndexError::NotBuilt);
        }
        let k = self.config.k;
        let fetch_n = self.config.fetch_n.max(k);

        let query_vec = self.embedder.embed_query(query).await?;
        let candidates = index.search(&query_vec, fetch_n)?;
        let picked = select_mmr(&candidates, k, self.config.lambda);

        let result = RetrievalResult {
            passages: picked
                .into_iter()
                .map(|i| RetrievedPassage {
                    passage: candidates[i].passage.clone(),
                    relevance: candidates[i].similarity,
                })
                .collect(),
        };

        tracing::debug!(
            candidates = candidates.len(),
            selected = result.len(),
            pages = ?result.pages(),
            scores = ?result.passages.iter().map(|p| p.relevance).collect::<Vec<_>>(),
            "retrieved passages"
        );
        Ok(result)
    }
}

/// Indices into `candidates`, in MMR selection order, at most `k` long.
///
/// Equal scores go to the passage earlier in the document.
#[must_use]
pub fn select_mmr(candidates: &[Neighbor<'_>], k: usize, lambda: f32) -> Vec<usize> {
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k && !remaining.is_empty() {
        let mut best: Option<(usize, f32)> = None;
        for (pos, &c) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&s| cosine_similarity(candidates[c].embedding, candidates[s].embedding))
                .fold(None, |acc: Option<f32>, sim| Some(acc.map_or(sim, |a| a.max(sim))))
                .unwrap_or(0.0);
            let score = lambda * candidates[c].similarity - (1.0 - lambda) * redundancy;

            let better = match best {
                None => true,
                Some((best_pos, best_score)) => {
                    if (score - best_score).abs() <= f32::EPSILON {
                        candidates[c].passage.sequence_index
                            < candidates[remaining[best_pos]].passage.sequence_index
                    } else {
                        score > best_score
                    }
                }
            };
            if better {
                best = Some((pos, score));
            }
        }
        let Some((pos, _)) = best else { break };
        selected.push(remaining.remove(pos));
    }
    selected
}
