//! Error types for pagewise-index.

/// Errors raised while ingesting a document or querying its index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading a document from disk.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The document could not be parsed into pages.
    #[error("text extraction failed: {0}")]
    Extraction(String),

    /// Extraction found more pages than the document declared.
    #[error("document declares {declared} pages but {extracted} were extracted")]
    PageCountMismatch { declared: usize, extracted: usize },

    /// No page yielded any text.
    #[error("document contains no extractable text")]
    EmptyDocument,

    #[error("invalid chunking: {0}")]
    InvalidChunking(String),

    /// Embedding backend failure.
    #[error("embedding failed: {0}")]
    Embedding(#[from] pagewise_llm::LlmError),

    /// The embedding backend returned a different number of vectors than inputs.
    #[error("expected {expected} embeddings, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// `search` was called before any `build`.
    #[error("vector index has not been built")]
    NotBuilt,

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
