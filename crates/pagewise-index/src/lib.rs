//! Document ingestion and retrieval: page extraction, chunking, embedding,
//! vector search and MMR re-ranking.

pub mod chunker;
pub mod document;
pub mod embedder;
pub mod error;
pub mod retriever;
pub mod vector_index;

pub use chunker::{Chunker, Passage};
pub use document::{Document, DocumentFormat, LoadedDocument, PageExtractor, PlainTextExtractor};
pub use embedder::{Embedder, SharedEmbeddingModel};
pub use error::IndexError;
pub use retriever::{RetrievalConfig, RetrievalResult, RetrievedPassage, Retriever};
pub use vector_index::VectorIndex;

#[cfg(feature = "pdf")]
pub use document::PdfExtractor;
