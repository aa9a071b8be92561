//! The entry point a renderer drives: process a document, ask questions,
//! reset, read the transcript.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use pagewise_index::document::extractor_for;
use pagewise_index::{
    Chunker, Document, Embedder, IndexError, Retriever, SharedEmbeddingModel, VectorIndex,
};
use pagewise_llm::LlmProvider;

use crate::config::{Config, SessionConfig};
use crate::error::{EngineError, Result};
use crate::session::{ChatTurn, DocumentSummary, QueryTicket, Session, SessionState};
use crate::synthesis::{Answer, CitationExtractor, Synthesizer};

/// One user's session over one document at a time.
///
/// The embedding model is shared between engines; the index, transcript and
/// configuration belong to this engine alone. All methods take `&self`, so an
/// engine can sit behind an `Arc` while a build or query runs.
pub struct Engine<P: LlmProvider> {
    session: Mutex<Session>,
    embedder: Embedder,
    synthesizer: Synthesizer<P>,
}

impl<P: LlmProvider> std::fmt::Debug for Engine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state())
            .field("synthesizer", &self.synthesizer)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> Engine<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, model: Arc<SharedEmbeddingModel>, llm_timeout: Duration) -> Self {
        Self {
            session: Mutex::new(Session::default()),
            embedder: Embedder::new(model),
            synthesizer: Synthesizer::new(provider, llm_timeout),
        }
    }

    /// Engine with the timeout and token limit from `config`.
    #[must_use]
    pub fn from_config(config: &Config, provider: Arc<P>, model: Arc<SharedEmbeddingModel>) -> Self {
        let mut engine = Self::new(
            provider,
            model,
            Duration::from_secs(config.timeouts.llm_seconds),
        );
        engine.synthesizer = engine.synthesizer.with_max_tokens(config.llm.max_tokens);
        engine
    }

    #[must_use]
    pub fn with_citation_extractor(mut self, extractor: Arc<dyn CitationExtractor>) -> Self {
        self.synthesizer = self.synthesizer.with_extractor(extractor);
        self
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session().state()
    }

    /// Summary of the loaded document, once ready.
    #[must_use]
    pub fn document(&self) -> Option<DocumentSummary> {
        self.session().document().cloned()
    }

    /// Settings of the current document, from the start of processing.
    #[must_use]
    pub fn config(&self) -> Option<SessionConfig> {
        self.session().config()
    }

    /// Completed question/answer turns, oldest first.
    #[must_use]
    pub fn transcript(&self) -> Vec<ChatTurn> {
        self.session().transcript().to_vec()
    }

    /// Replace the current document: extract, chunk, embed and index it.
    ///
    /// The previous index and transcript are dropped as soon as processing
    /// starts. On failure the session is left empty.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] before touching the session if
    /// `config` is out of range, [`EngineError::EmptyDocument`] when no page
    /// has text, [`EngineError::Superseded`] when another upload or a reset
    /// happened meanwhile, and extraction or embedding errors otherwise.
    #[tracing::instrument(skip_all, fields(document = %document.name()))]
    pub async fn process_document(
        &self,
        document: Document,
        config: SessionConfig,
    ) -> Result<DocumentSummary> {
        config.validate()?;

        let generation = self.session().begin_processing(config);
        let mut guard = ProcessingGuard {
            session: &self.session,
            generation,
            armed: true,
        };

        let start = Instant::now();
        let (index, summary) = self.build(document, config).await?;

        guard.armed = false;
        if !self
            .session()
            .finish_processing(generation, index, summary.clone())
        {
            return Err(EngineError::Superseded);
        }

        tracing::info!(
            pages = summary.page_count,
            passages = summary.passage_count,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "document processed"
        );
        Ok(summary)
    }

    /// [`process_document`](Self::process_document) for raw uploaded bytes.
    ///
    /// # Errors
    ///
    /// Same as [`process_document`](Self::process_document).
    pub async fn process_bytes(
        &self,
        name: &str,
        bytes: Vec<u8>,
        config: SessionConfig,
    ) -> Result<DocumentSummary> {
        self.process_document(Document::new(name, bytes), config)
            .await
    }

    async fn build(
        &self,
        document: Document,
        config: SessionConfig,
    ) -> Result<(VectorIndex, DocumentSummary)> {
        let extractor = extractor_for(document.format())?;
        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;

        let (loaded, passages) = tokio::task::spawn_blocking(move || {
            let loaded = document.load(extractor.as_ref())?;
            let passages = chunker.chunk(&loaded);
            Ok::<_, IndexError>((loaded, passages))
        })
        .await
        .map_err(|e| EngineError::Extraction(IndexError::Task(e)))??;

        if passages.is_empty() {
            return Err(EngineError::EmptyDocument);
        }

        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let embeddings = self.embedder.embed(texts).await?;

        let summary = DocumentSummary {
            name: loaded.name().to_owned(),
            page_count: loaded.page_count(),
            passage_count: passages.len(),
        };
        let index = VectorIndex::from_parts(passages, embeddings)?;
        Ok((index, summary))
    }

    /// Answer `question` from the loaded document and record the turn.
    ///
    /// A question that outlives an upload or reset still gets its answer, but
    /// the turn is not added to the new transcript.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyQuestion`] for a blank question,
    /// [`EngineError::NoDocument`] or [`EngineError::NotReady`] in the wrong
    /// state, and retrieval or synthesis errors otherwise.
    #[tracing::instrument(skip_all, fields(question_chars = question.chars().count()))]
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(EngineError::EmptyQuestion);
        }

        let ticket = self.session().begin_query()?;
        let _guard = QueryGuard {
            session: &self.session,
            generation: ticket.generation,
        };

        let answer = self.answer(&ticket, question).await?;
        self.session()
            .record_turn(ticket.generation, ChatTurn::new(question, answer.clone()));
        Ok(answer)
    }

    async fn answer(&self, ticket: &QueryTicket, question: &str) -> Result<Answer> {
        let retriever = Retriever::new(self.embedder.clone(), ticket.config.retrieval());
        let retrieved = retriever.retrieve(&ticket.index, question).await?;
        self.synthesizer
            .synthesize(question, retrieved, ticket.config.temperature)
            .await
    }

    /// Drop the document, index and transcript. Work still running against
    /// them finishes without touching the new state.
    pub fn reset(&self) {
        self.session().reset();
    }
}

/// Returns the session to `Empty` if processing stops early, including when
/// the `process_document` future is dropped.
struct ProcessingGuard<'a> {
    session: &'a Mutex<Session>,
    generation: u64,
    armed: bool,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.session
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .fail_processing(self.generation);
        }
    }
}

/// Returns the session to `Ready` however the query ends.
struct QueryGuard<'a> {
    session: &'a Mutex<Session>,
    generation: u64,
}

impl Drop for QueryGuard<'_> {
    fn drop(&mut self) {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .end_query(self.generation);
    }
}
