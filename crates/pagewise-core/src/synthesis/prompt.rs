use std::fmt::Write;

use pagewise_index::RetrievalResult;
use pagewise_llm::Message;

/// Reply the model is told to give when the context lacks the answer.
pub const NOT_FOUND_ANSWER: &str = "I cannot find that information in the provided document.";

pub const SYSTEM_PROMPT: &str = "\
You are an expert assistant analyzing a document. \
Your role is to provide accurate, well-sourced answers based on the document.

INSTRUCTIONS:
1. Use ONLY the provided context to answer questions
2. Always cite page numbers when referencing information (e.g., [Page 12])
3. If information is not in the context, clearly state: 'I cannot find that information in the provided document.'
4. Be concise but comprehensive
5. If context is ambiguous or contradictory, acknowledge this";

/// Retrieved passages, each under a `[Page N]` label, in retrieval order.
#[must_use]
pub fn format_context(retrieved: &RetrievalResult) -> String {
    let mut out = String::new();
    for (i, p) in retrieved.passages.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let _ = write!(out, "[Page {}]\n{}", p.passage.page_number, p.passage.text.trim());
    }
    out
}

/// System instruction with the context appended, followed by the question.
#[must_use]
pub fn build_messages(question: &str, retrieved: &RetrievalResult) -> Vec<Message> {
    let context = format_context(retrieved);
    let system = if context.is_empty() {
        format!("{SYSTEM_PROMPT}\n\nCONTEXT:\n(no passages retrieved)")
    } else {
        format!("{SYSTEM_PROMPT}\n\nCONTEXT:\n{context}")
    };
    vec![Message::system(system), Message::user(question.trim())]
}

/// Canned questions offered as one-click actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickAction {
    Summarize,
    KeyPoints,
    Statistics,
    Recommendations,
}

impl QuickAction {
    pub const ALL: [Self; 4] = [
        Self::Summarize,
        Self::KeyPoints,
        Self::Statistics,
        Self::Recommendations,
    ];

    #[must_use]
    pub fn question(self) -> &'static str {
        match self {
            Self::Summarize => {
                "Provide a comprehensive summary of this document including its main purpose, key findings, and conclusions."
            }
            Self::KeyPoints => {
                "What are the most important key points and takeaways from this document?"
            }
            Self::Statistics => {
                "List all important statistics, numbers, and quantitative data mentioned in the document."
            }
            Self::Recommendations => {
                "What are the main recommendations or action items suggested in this document?"
            }
        }
    }

    /// Short command name, e.g. `summary` for `/summary`.
    #[must_use]
    pub fn command(self) -> &'static str {
        match self {
            Self::Summarize => "summary",
            Self::KeyPoints => "keypoints",
            Self::Statistics => "stats",
            Self::Recommendations => "recommendations",
        }
    }

    #[must_use]
    pub fn from_command(cmd: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.command() == cmd)
    }
}

#[cfg(test)]
mod tests {
    use pagewise_index::{Passage, RetrievedPassage};
    use pagewise_llm::Role;

    use super::*;

    fn retrieved(items: &[(usize, &str)]) -> RetrievalResult {
        RetrievalResult {
            passages: items
                .iter()
                .enumerate()
                .map(|(i, (page, text))| RetrievedPassage {
                    passage: Passage {
                        text: (*text).to_owned(),
                        page_number: *page,
                        sequence_index: i,
                        start_offset: 0,
                    },
                    relevance: 0.9,
                })
                .collect(),
        }
    }

    #[test]
    fn context_labels_each_passage() {
        let ctx = format_context(&retrieved(&[(2, " rainfall rose "), (5, "budget fell")]));
        assert_eq!(ctx, "[Page 2]\nrainfall rose\n\n[Page 5]\nbudget fell");
    }

    #[test]
    fn messages_are_system_then_user() {
        let msgs = build_messages("  What rose?  ", &retrieved(&[(2, "rainfall rose")]));
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert!(msgs[0].content.contains("Use ONLY the provided context"));
        assert!(msgs[0].content.contains("[Page 2]\nrainfall rose"));
        assert_eq!(msgs[1].role, Role::User);
        assert_eq!(msgs[1].content, "What rose?");
    }

    #[test]
    fn empty_context_is_stated() {
        let msgs = build_messages("q", &RetrievalResult::default());
        assert!(msgs[0].content.contains("(no passages retrieved)"));
    }

    #[test]
    fn prompt_names_not_found_reply() {
        assert!(SYSTEM_PROMPT.contains(NOT_FOUND_ANSWER));
    }

    #[test]
    fn quick_actions_round_trip_commands() {
        for action in QuickAction::ALL {
            assert_eq!(QuickAction::from_command(action.command()), Some(action));
            assert!(action.question().ends_with(['.', '?']));
        }
        assert_eq!(QuickAction::from_command("nope"), None);
    }
}
