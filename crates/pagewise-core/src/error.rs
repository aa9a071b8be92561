use std::time::Duration;

use pagewise_index::IndexError;
use pagewise_llm::LlmError;

/// Failures surfaced to whatever renders the session.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("document contains no extractable text")]
    EmptyDocument,

    #[error("document could not be read: {0}")]
    Extraction(#[source] IndexError),

    #[error("embedding failed: {0}")]
    Embedding(#[source] IndexError),

    #[error("vector index has not been built")]
    IndexNotBuilt,

    #[error("no document loaded")]
    NoDocument,

    #[error("document is still being processed")]
    NotReady,

    #[error("document was replaced before processing finished")]
    Superseded,

    #[error("question is empty")]
    EmptyQuestion,

    #[error("answer synthesis failed: {0}")]
    Synthesis(#[source] LlmError),

    #[error("answer synthesis timed out after {}s", .0.as_secs())]
    SynthesisTimeout(Duration),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl EngineError {
    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::SynthesisTimeout(_) | Self::NotReady => true,
            Self::Synthesis(e) => matches!(
                e,
                LlmError::RateLimited | LlmError::Unavailable | LlmError::Timeout
            ),
            _ => false,
        }
    }
}

impl From<IndexError> for EngineError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::EmptyDocument => Self::EmptyDocument,
            IndexError::NotBuilt => Self::IndexNotBuilt,
            IndexError::InvalidChunking(msg) => Self::Configuration(msg),
            e @ (IndexError::Io(_)
            | IndexError::FileTooLarge(_)
            | IndexError::UnsupportedFormat(_)
            | IndexError::Extraction(_)
            | IndexError::PageCountMismatch { .. }) => Self::Extraction(e),
            e @ (IndexError::Embedding(_)
            | IndexError::LengthMismatch { .. }
            | IndexError::DimensionMismatch { .. }
            | IndexError::Task(_)) => Self::Embedding(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_errors_map_to_engine_kinds() {
        assert!(matches!(
            EngineError::from(IndexError::EmptyDocument),
            EngineError::EmptyDocument
        ));
        assert!(matches!(
            EngineError::from(IndexError::NotBuilt),
            EngineError::IndexNotBuilt
        ));
        assert!(matches!(
            EngineError::from(IndexError::Extraction("bad xref".into())),
            EngineError::Extraction(_)
        ));
        assert!(matches!(
            EngineError::from(IndexError::Embedding(LlmError::ModelLoad("x".into()))),
            EngineError::Embedding(_)
        ));
        assert!(matches!(
            EngineError::from(IndexError::InvalidChunking("overlap".into())),
            EngineError::Configuration(_)
        ));
    }

    #[test]
    fn timeout_message_names_duration() {
        let err = EngineError::SynthesisTimeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "answer synthesis timed out after 60s");
    }

    #[test]
    fn transient_errors() {
        assert!(EngineError::SynthesisTimeout(Duration::from_secs(1)).is_transient());
        assert!(EngineError::Synthesis(LlmError::RateLimited).is_transient());
        assert!(
            !EngineError::Synthesis(LlmError::EmptyResponse {
                provider: "groq".into()
            })
            .is_transient()
        );
        assert!(!EngineError::NoDocument.is_transient());
        assert!(!EngineError::Superseded.is_transient());
    }
}
