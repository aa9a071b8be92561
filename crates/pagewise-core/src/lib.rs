//! Session engine for page-cited question answering over a single document.

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod error;
pub mod session;
pub mod synthesis;

pub use config::{Config, SessionConfig};
pub use engine::Engine;
pub use error::EngineError;
pub use session::{ChatTurn, DocumentSummary, SessionState};
pub use synthesis::{Answer, CitationExtractor, PageReferenceExtractor, QuickAction};
