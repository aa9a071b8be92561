//! Page references in generated answers.
//!
//! Matching free-form model output is heuristic, so the rule sits behind
//! [`CitationExtractor`] and can be swapped per engine.

use std::sync::LazyLock;

use pagewise_index::RetrievalResult;
use regex::Regex;

/// `Page 4`, `[Page 4]`, `p. 4`, `pg. 9`, and for plural forms also lists
/// and ranges: `pp. 4-6`, `pages 2, 3 and 7`. Group 1 holds a plural list,
/// group 2 a single page.
static PAGE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:pages|pgs\.?|pp\.)\s*(\d+(?:\s*(?:[-–]|,|,?\s*(?:and|&))\s*\d+)*)|(?:page|pg\.?|p\.)\s*(\d+))",
    )
    .unwrap()
});

static NUMBER_OR_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:\s*[-–]\s*(\d+))?").unwrap());

/// Ranges wider than this cite only their endpoints.
const MAX_RANGE_SPAN: usize = 50;

pub trait CitationExtractor: Send + Sync {
    /// Page numbers referenced in `text`, in order of appearance. May repeat.
    fn extract(&self, text: &str) -> Vec<usize>;
}

/// Default English page-reference matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageReferenceExtractor;

impl CitationExtractor for PageReferenceExtractor {
    fn extract(&self, text: &str) -> Vec<usize> {
        let mut pages = Vec::new();
        for caps in PAGE_REF.captures_iter(text) {
            let Some(list) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            for item in NUMBER_OR_RANGE.captures_iter(list.as_str()) {
                let Some(start) = item.get(1).and_then(|m| m.as_str().parse::<usize>().ok())
                else {
                    continue;
                };
                match item.get(2).and_then(|m| m.as_str().parse::<usize>().ok()) {
                    Some(end) if end >= start && end - start <= MAX_RANGE_SPAN => {
                        pages.extend(start..=end);
                    }
                    Some(end) => {
                        pages.push(start);
                        pages.push(end);
                    }
                    None => pages.push(start),
                }
            }
        }
        pages.retain(|&p| p > 0);
        pages
    }
}

/// Pages an answer is attributed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Citations {
    /// Deduplicated, in order of first appearance.
    pub pages: Vec<usize>,
    /// True when the answer named no retrieved page and the retrieved pages
    /// were used instead.
    pub inferred: bool,
}

/// Cite the pages `answer` mentions that were actually retrieved, falling back
/// to every retrieved page when it mentions none.
#[must_use]
pub fn resolve_citations(
    extractor: &dyn CitationExtractor,
    answer: &str,
    retrieved: &RetrievalResult,
) -> Citations {
    let retrieved_pages = retrieved.pages();
    let mut pages: Vec<usize> = Vec::new();
    let mut dropped = 0usize;
    for page in extractor.extract(answer) {
        if !retrieved_pages.contains(&page) {
            dropped += 1;
            continue;
        }
        if !pages.contains(&page) {
            pages.push(page);
        }
    }
    if dropped > 0 {
        tracing::debug!(dropped, "ignored page references outside the retrieved context");
    }

    if pages.is_empty() && !retrieved_pages.is_empty() {
        tracing::warn!(
            pages = ?retrieved_pages,
            "answer cites no retrieved page, citing retrieved context instead"
        );
        return Citations {
            pages: retrieved_pages,
            inferred: true,
        };
    }
    Citations {
        pages,
        inferred: false,
    }
}
