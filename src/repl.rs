//! Interactive question loop over stdin.

use std::fmt::Write as _;
use std::path::Path;

use pagewise_core::{Answer, ChatTurn, Engine, EngineError, QuickAction, SessionConfig};
use pagewise_llm::LlmProvider;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands:
  /load <path>       replace the current document
  /summary           summarize the document
  /keypoints         list the key findings
  /stats             pull out statistics and numbers
  /recommendations   list the recommendations
  /history           show this session's questions and answers
  /reset             drop the document and history
  /quit              exit
Anything else is asked as a question.";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Ask(&'a str),
    Quick(QuickAction),
    Load(&'a str),
    History,
    Reset,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Ask(line));
    };
    let (name, arg) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(n, a)| (n, a.trim()));
    Some(match name {
        "load" => Command::Load(arg),
        "history" => Command::History,
        "reset" => Command::Reset,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => QuickAction::from_command(other).map_or(Command::Unknown(other), Command::Quick),
    })
}

/// Answer text followed by its page sources.
pub fn render_answer(answer: &Answer) -> String {
    let mut out = answer.text.clone();
    if !answer.citations.is_empty() {
        let pages: Vec<String> = answer
            .citations
            .iter()
            .map(|p| format!("Page {p}"))
            .collect();
        let _ = write!(out, "\n\nSources: {}", pages.join(", "));
        if answer.citations_inferred {
            out.push_str(" (retrieved context)");
        }
    }
    out
}

fn render_history(turns: &[ChatTurn]) -> String {
    if turns.is_empty() {
        return "No questions yet.".into();
    }
    let mut out = String::new();
    for (i, turn) in turns.iter().enumerate() {
        let _ = writeln!(
            out,
            "[{}] {} {}\n{}\n",
            i + 1,
            turn.timestamp.format("%H:%M:%S"),
            turn.question,
            render_answer(&turn.answer)
        );
    }
    out
}

async fn ask<P: LlmProvider>(engine: &Engine<P>, question: &str) {
    match engine.ask(question).await {
        Ok(answer) => println!("{}\n", render_answer(&answer)),
        Err(EngineError::NoDocument) => println!("Load a document first: /load <path>"),
        Err(e) if e.is_transient() => println!("{e}. Try again in a moment."),
        Err(e) => println!("Error: {e}"),
    }
}

/// Read commands until EOF, `/quit` or Ctrl-C.
///
/// # Errors
///
/// Returns an error if stdin cannot be read.
pub async fn run<P: LlmProvider>(engine: &Engine<P>, session: SessionConfig) -> anyhow::Result<()> {
    println!("Type a question, or /help for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match parse(&line) {
            None => {}
            Some(Command::Ask(question)) => ask(engine, question).await,
            Some(Command::Quick(action)) => ask(engine, action.question()).await,
            Some(Command::Load("")) => println!("Usage: /load <path>"),
            Some(Command::Load(path)) => {
                if let Err(e) = crate::load_document(engine, Path::new(path), session).await {
                    println!("Error: {e:#}");
                }
            }
            Some(Command::History) => print!("{}", render_history(&engine.transcript())),
            Some(Command::Reset) => {
                engine.reset();
                println!("Session cleared.");
            }
            Some(Command::Help) => println!("{HELP}"),
            Some(Command::Quit) => break,
            Some(Command::Unknown(name)) => println!("Unknown command /{name}. Try /help."),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(citations: Vec<usize>, inferred: bool) -> Answer {
        Answer {
            text: "Coverage reached 92 percent.".into(),
            citations,
            citations_inferred: inferred,
            sources: Vec::new(),
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse("  "), None);
        assert_eq!(parse(" what is it? "), Some(Command::Ask("what is it?")));
        assert_eq!(parse("/load  a b.pdf "), Some(Command::Load("a b.pdf")));
        assert_eq!(parse("/load"), Some(Command::Load("")));
        assert_eq!(parse("/stats"), Some(Command::Quick(QuickAction::Statistics)));
        assert_eq!(parse("/exit"), Some(Command::Quit));
        assert_eq!(parse("/nope"), Some(Command::Unknown("nope")));
    }

    #[test]
    fn answer_lists_sources() {
        assert_eq!(
            render_answer(&answer(vec![2, 5], false)),
            "Coverage reached 92 percent.\n\nSources: Page 2, Page 5"
        );
        assert!(render_answer(&answer(vec![1], true)).ends_with("Page 1 (retrieved context)"));
        assert_eq!(
            render_answer(&answer(Vec::new(), false)),
            "Coverage reached 92 percent."
        );
    }

    #[test]
    fn history_numbers_turns() {
        let turns = vec![
            ChatTurn::new("first?", answer(vec![1], false)),
            ChatTurn::new("second?", answer(vec![2], false)),
        ];
        let out = render_history(&turns);
        assert!(out.contains("[1]"));
        assert!(out.contains("second?"));
        assert_eq!(render_history(&[]), "No questions yet.");
    }
}
