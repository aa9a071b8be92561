//! Page-aware sliding-window chunking.
//!
//! Non-blank pages are trimmed and joined with [`PAGE_SEPARATOR`] into a single
//! text. A window of `chunk_size` characters slides over it, advancing by
//! `chunk_size - chunk_overlap`; the final window may be shorter. Each passage
//! is attributed to the page holding its first character, and the separator
//! counts as part of the page before it.

use serde::{Deserialize, Serialize};

use crate::document::LoadedDocument;
use crate::error::{IndexError, Result};

pub const PAGE_SEPARATOR: &str = "\n\n";

/// Contiguous run of document text with page provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    /// 1-based page the passage starts on.
    pub page_number: usize,
    /// Position in document order, starting at 0.
    pub sequence_index: usize,
    /// Offset of the first character in the joined document text, in chars.
    pub start_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// # Errors
    ///
    /// Returns an error if `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(IndexError::InvalidChunking(
                "chunk_size must be positive".into(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(IndexError::InvalidChunking(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split `document` into overlapping passages in document order.
    ///
    /// Returns an empty vector when no page has text; callers treat that as
    /// an empty document.
    #[must_use]
    pub fn chunk(&self, document: &LoadedDocument) -> Vec<Passage> {
        let layout = PageLayout::new(document);
        let chars: Vec<char> = layout.text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut passages = Vec::with_capacity(chars.len() / step + 1);
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(chars.len());
            passages.push(Passage {
                text: chars[start..end].iter().collect(),
                page_number: layout.page_at(start),
                sequence_index: passages.len(),
                start_offset: start,
            });
            if end == chars.len() {
                break;
            }
            start += step;
        }

        tracing::debug!(
            document = document.name(),
            chars = chars.len(),
            passages = passages.len(),
            chunk_size = self.chunk_size,
            chunk_overlap = self.chunk_overlap,
            "chunked document"
        );
        passages
    }
}

/// Joined document text plus the char offset where each non-blank page begins.
struct PageLayout {
    text: String,
    /// `(start_offset, page_number)`, ascending by offset.
    starts: Vec<(usize, usize)>,
}

impl PageLayout {
    fn new(document: &LoadedDocument) -> Self {
        let mut text = String::new();
        let mut starts = Vec::new();
        let mut offset = 0;
        for (i, page) in document.pages().iter().enumerate() {
            let page = page.trim();
            if page.is_empty() {
                continue;
            }
            if !starts.is_empty() {
                text.push_str(PAGE_SEPARATOR);
                offset += PAGE_SEPARATOR.chars().count();
            }
            starts.push((offset, i + 1));
            text.push_str(page);
            offset += page.chars().count();
        }
        Self { text, starts }
    }

    fn page_at(&self, offset: usize) -> usize {
        let idx = self.starts.partition_point(|&(start, _)| start <= offset);
        self.starts[idx.saturating_sub(1)].1
    }
}

/// Joined text the chunker windows over, for callers that need offsets to line up.
#[must_use]
pub fn joined_text(document: &LoadedDocument) -> String {
    PageLayout::new(document).text
}
