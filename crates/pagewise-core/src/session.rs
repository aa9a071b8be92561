//! Per-user session state machine.
//!
//! ```text
//! Empty ──process──▶ Processing ──built──▶ Ready ◀──▶ QueryInFlight
//!   ▲                    │ failed                │
//!   └────────────────────┴──────── reset ────────┘
//! ```
//!
//! Every upload and reset bumps a generation counter. Work started under an
//! older generation may finish, but never writes into the newer state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pagewise_index::VectorIndex;
use serde::Serialize;

use crate::config::SessionConfig;
use crate::error::EngineError;
use crate::synthesis::Answer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Empty,
    Processing,
    Ready,
    QueryInFlight,
}

impl SessionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::QueryInFlight => "query_in_flight",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What was loaded: file name, page count and passage count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub page_count: usize,
    pub passage_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: Answer,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    #[must_use]
    pub fn new(question: impl Into<String>, answer: Answer) -> Self {
        Self {
            question: question.into(),
            answer,
            timestamp: Utc::now(),
        }
    }
}

/// Everything a query needs, captured when it starts so a concurrent upload
/// cannot change it underneath.
#[derive(Debug, Clone)]
pub(crate) struct QueryTicket {
    pub generation: u64,
    pub index: Arc<VectorIndex>,
    pub config: SessionConfig,
}

#[derive(Debug)]
pub(crate) struct Session {
    state: SessionState,
    generation: u64,
    config: Option<SessionConfig>,
    index: Option<Arc<VectorIndex>>,
    document: Option<DocumentSummary>,
    transcript: Vec<ChatTurn>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: SessionState::Empty,
            generation: 0,
            config: None,
            index: None,
            document: None,
            transcript: Vec::new(),
        }
    }
}

impl Session {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> Option<SessionConfig> {
        self.config
    }

    pub fn document(&self) -> Option<&DocumentSummary> {
        self.document.as_ref()
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    fn clear(&mut self) {
        self.generation += 1;
        self.config = None;
        self.index = None;
        self.document = None;
        self.transcript.clear();
    }

    /// Drop the current document and start a new one. Returns the new generation.
    pub fn begin_processing(&mut self, config: SessionConfig) -> u64 {
        self.clear();
        self.config = Some(config);
        self.state = SessionState::Processing;
        tracing::info!(generation = self.generation, "session processing");
        self.generation
    }

    /// Install a finished build. Returns false, leaving the session untouched,
    /// when the build belongs to an older generation.
    pub fn finish_processing(
        &mut self,
        generation: u64,
        index: VectorIndex,
        document: DocumentSummary,
    ) -> bool {
        if generation != self.generation {
            tracing::warn!(
                build_generation = generation,
                current_generation = self.generation,
                "discarding superseded index build"
            );
            return false;
        }
        self.index = Some(Arc::new(index));
        self.document = Some(document);
        self.state = SessionState::Ready;
        tracing::info!(generation, "session ready");
        true
    }

    /// Abandon a build; the session returns to `Empty` if it is still current.
    pub fn fail_processing(&mut self, generation: u64) {
        if generation == self.generation && self.state == SessionState::Processing {
            self.config = None;
            self.state = SessionState::Empty;
            tracing::info!(generation, "session empty after failed processing");
        }
    }

    /// # Errors
    ///
    /// Returns [`EngineError::NoDocument`] when nothing is loaded and
    /// [`EngineError::NotReady`] while processing or answering another question.
    pub fn begin_query(&mut self) -> Result<QueryTicket, EngineError> {
        match self.state {
            SessionState::Empty => Err(EngineError::NoDocument),
            SessionState::Processing | SessionState::QueryInFlight => Err(EngineError::NotReady),
            SessionState::Ready => {
                let (Some(index), Some(config)) = (self.index.clone(), self.config) else {
                    return Err(EngineError::IndexNotBuilt);
                };
                self.state = SessionState::QueryInFlight;
                Ok(QueryTicket {
                    generation: self.generation,
                    index,
                    config,
                })
            }
        }
    }

    /// Append a completed turn if the query is still current. Returns whether it was kept.
    pub fn record_turn(&mut self, generation: u64, turn: ChatTurn) -> bool {
        if generation != self.generation {
            tracing::warn!(
                query_generation = generation,
                current_generation = self.generation,
                "not recording answer for a superseded document"
            );
            return false;
        }
        self.transcript.push(turn);
        true
    }

    pub fn end_query(&mut self, generation: u64) {
        if generation == self.generation && self.state == SessionState::QueryInFlight {
            self.state = SessionState::Ready;
        }
    }

    pub fn reset(&mut self) {
        self.clear();
        self.state = SessionState::Empty;
        tracing::info!(generation = self.generation, "session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> DocumentSummary {
        DocumentSummary {
            name: "report.pdf".into(),
            page_count: 3,
            passage_count: 4,
        }
    }

    fn answer(text: &str) -> Answer {
        Answer {
            text: text.into(),
            citations: vec![1],
            citations_inferred: false,
            sources: Vec::new(),
        }
    }

    fn ready_session() -> Session {
        let mut s = Session::default();
        let generation = s.begin_processing(SessionConfig::default());
        assert!(s.finish_processing(generation, VectorIndex::new(), summary()));
        s
    }

    #[test]
    fn starts_empty_and_rejects_queries() {
        let mut s = Session::default();
        assert_eq!(s.state(), SessionState::Empty);
        assert!(matches!(s.begin_query(), Err(EngineError::NoDocument)));
    }

    #[test]
    fn processing_rejects_queries() {
        let mut s = Session::default();
        s.begin_processing(SessionConfig::default());
        assert_eq!(s.state(), SessionState::Processing);
        assert!(matches!(s.begin_query(), Err(EngineError::NotReady)));
    }

    #[test]
    fn query_cycle_returns_to_ready() {
        let mut s = ready_session();
        assert_eq!(s.document(), Some(&summary()));

        let ticket = s.begin_query().unwrap();
        assert_eq!(s.state(), SessionState::QueryInFlight);
        assert!(matches!(s.begin_query(), Err(EngineError::NotReady)));

        assert!(s.record_turn(ticket.generation, ChatTurn::new("q", answer("a"))));
        s.end_query(ticket.generation);
        assert_eq!(s.state(), SessionState::Ready);
        assert_eq!(s.transcript().len(), 1);
    }

    #[test]
    fn failed_processing_returns_to_empty() {
        let mut s = ready_session();
        let generation = s.begin_processing(SessionConfig::default());
        assert!(s.document().is_none());
        s.fail_processing(generation);
        assert_eq!(s.state(), SessionState::Empty);
        assert!(s.config().is_none());
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = ready_session();
        let ticket = s.begin_query().unwrap();
        s.record_turn(ticket.generation, ChatTurn::new("q", answer("a")));
        s.end_query(ticket.generation);

        s.reset();
        assert_eq!(s.state(), SessionState::Empty);
        assert!(s.transcript().is_empty());
        assert!(s.document().is_none());
        assert!(matches!(s.begin_query(), Err(EngineError::NoDocument)));
    }

    #[test]
    fn stale_build_is_discarded() {
        let mut s = Session::default();
        let old = s.begin_processing(SessionConfig::default());
        let new = s.begin_processing(SessionConfig::default());
        assert!(new > old);

        assert!(!s.finish_processing(old, VectorIndex::new(), summary()));
        assert_eq!(s.state(), SessionState::Processing);

        s.fail_processing(old);
        assert_eq!(s.state(), SessionState::Processing);

        assert!(s.finish_processing(new, VectorIndex::new(), summary()));
        assert_eq!(s.state(), SessionState::Ready);
    }

    #[test]
    fn stale_query_does_not_touch_new_session() {
        let mut s = ready_session();
        let ticket = s.begin_query().unwrap();

        let generation = s.begin_processing(SessionConfig::default());
        assert!(!s.record_turn(ticket.generation, ChatTurn::new("q", answer("old"))));
        s.end_query(ticket.generation);
        assert_eq!(s.state(), SessionState::Processing);
        assert!(s.transcript().is_empty());

        assert!(s.finish_processing(generation, VectorIndex::new(), summary()));
        assert_eq!(s.state(), SessionState::Ready);
    }

    #[test]
    fn state_names() {
        assert_eq!(SessionState::QueryInFlight.to_string(), "query_in_flight");
        assert_eq!(SessionState::Empty.as_str(), "empty");
    }
}
