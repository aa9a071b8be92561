mod repl;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use pagewise_core::bootstrap::build_engine;
use pagewise_core::{Config, Engine, SessionConfig};
use pagewise_index::Document;
use pagewise_index::document::DEFAULT_MAX_FILE_SIZE;
use pagewise_llm::LlmProvider;

/// Ask questions about a PDF and get answers with page citations.
#[derive(Debug, Parser)]
#[command(name = "pagewise", version, about)]
struct Cli {
    /// PDF or plain-text document to load. Form feeds separate pages in text files.
    file: Option<PathBuf>,

    /// Path to the TOML config file (defaults to `PAGEWISE_CONFIG` or `config/default.toml`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Answer this question and exit. Repeat for several questions.
    #[arg(short, long = "question")]
    questions: Vec<String>,

    /// Characters per passage.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Characters shared between consecutive passages.
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Sampling temperature for answers.
    #[arg(long)]
    temperature: Option<f32>,

    /// Passages used as context for each answer.
    #[arg(short)]
    k: Option<usize>,
}

impl Cli {
    fn apply(&self, session: &mut SessionConfig) {
        if let Some(v) = self.chunk_size {
            session.chunk_size = v;
        }
        if let Some(v) = self.chunk_overlap {
            session.chunk_overlap = v;
        }
        if let Some(v) = self.temperature {
            session.temperature = v;
        }
        if let Some(v) = self.k {
            session.k = v;
            session.fetch_n = session.fetch_n.max(v);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)?;
    cli.apply(&mut config.session);
    let engine = build_engine(&config)?;
    tracing::info!(
        provider = %config.llm.provider_name,
        model = %config.llm.model,
        embedding = %config.embedding.backend,
        "pagewise ready"
    );

    if let Some(file) = &cli.file {
        load_document(&engine, file, config.session).await?;
    }

    if cli.questions.is_empty() {
        repl::run(&engine, config.session).await
    } else {
        for question in &cli.questions {
            let answer = engine.ask(question).await?;
            println!("{}\n", repl::render_answer(&answer));
        }
        Ok(())
    }
}

async fn load_document<P: LlmProvider>(
    engine: &Engine<P>,
    path: &Path,
    session: SessionConfig,
) -> anyhow::Result<()> {
    let document = Document::from_path(path, DEFAULT_MAX_FILE_SIZE)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    println!("Processing {}...", document.name());
    let summary = engine.process_document(document, session).await?;
    println!(
        "Loaded {} pages, created {} chunks",
        summary.page_count, summary.passage_count
    );
    Ok(())
}

fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("PAGEWISE_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn clear_env() {
        for (key, _) in std::env::vars_os() {
            let name = key.to_string_lossy();
            if name.starts_with("PAGEWISE_") || name == "GROQ_API_KEY" {
                unsafe { std::env::remove_var(&key) };
            }
        }
    }

    #[test]
    fn cli_overrides_session_settings() {
        let cli = Cli::parse_from([
            "pagewise",
            "report.pdf",
            "--chunk-size",
            "500",
            "--chunk-overlap",
            "100",
            "-k",
            "30",
        ]);
        let mut session = SessionConfig::default();
        cli.apply(&mut session);
        assert_eq!(session.chunk_size, 500);
        assert_eq!(session.chunk_overlap, 100);
        assert_eq!(session.k, 30);
        assert_eq!(session.fetch_n, 30);
        assert_eq!(cli.file.as_deref(), Some(Path::new("report.pdf")));
    }

    #[test]
    fn repeated_questions() {
        let cli = Cli::parse_from(["pagewise", "a.pdf", "-q", "one", "--question", "two"]);
        assert_eq!(cli.questions, ["one", "two"]);
    }

    #[test]
    #[serial]
    fn default_config_file_is_valid() {
        clear_env();
        let config = Config::load(Path::new("config/default.toml")).unwrap();
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert!(config.secrets.api_key.is_none());
        config.validate().unwrap();
    }

    #[test]
    #[serial]
    fn config_path_falls_back_to_env_then_default() {
        clear_env();
        assert_eq!(resolve_config_path(None), PathBuf::from("config/default.toml"));
        unsafe { std::env::set_var("PAGEWISE_CONFIG", "/etc/pagewise.toml") };
        assert_eq!(resolve_config_path(None), PathBuf::from("/etc/pagewise.toml"));
        clear_env();
    }

    #[test]
    fn explicit_config_path_wins() {
        assert_eq!(
            resolve_config_path(Some(Path::new("custom.toml"))),
            PathBuf::from("custom.toml")
        );
    }
}
