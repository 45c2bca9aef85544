//! Codedoc Pipeline — Entry Point
//!
//! Parses CLI arguments, walks the target project, runs the per-language
//! extraction pipeline, persists the result, and runs the documentation
//! backend over whatever the store reports as undocumented.

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use codedoc_pipeline::config::PipelineConfig;
use codedoc_pipeline::llm::{self, Provider};
use codedoc_pipeline::lsp::ClientMode;
use codedoc_pipeline::orchestrator;
use codedoc_pipeline::store::Store;
use codedoc_pipeline::walker;

/// Walks a project, drives per-language LSP servers to extract symbols and
/// call graphs, and persists the result for LLM-driven documentation.
#[derive(Parser, Debug)]
#[command(name = "codedoc")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory to analyze.
    project_path: PathBuf,

    /// Disable container mode; run language servers as local subprocesses.
    #[arg(long = "no-docker", visible_alias = "nd")]
    no_docker: bool,

    /// Documentation output root (collaborator: passed through, not opened
    /// by this build since no real provider writes files here yet).
    #[arg(long = "output-docs", visible_alias = "od")]
    output_docs: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long)]
    debug: bool,

    /// LLM provider selection (collaborator: resolves to the built-in
    /// no-network backend regardless of value).
    #[arg(short, long, default_value = "ollama")]
    provider: String,

    /// Model name (collaborator, passed to the provider).
    #[arg(short, long)]
    model: Option<String>,

    /// Extra project-context file, read by a real provider but not opened
    /// by this build (collaborator).
    #[arg(short = 'c', long = "project-context")]
    project_context: Option<PathBuf>,

    /// Directory containing `languages.json`/`servers.json`/`ignore.json`/
    /// `kinds.json` overrides.
    #[arg(long = "config-dir")]
    config_dir: Option<PathBuf>,
}

fn init_tracing(debug: bool) -> Result<()> {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("codedoc_pipeline={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(true).with_target(true))
        .try_init()
        .context("failed to initialize tracing subscriber")?;
    Ok(())
}

/// Prompts on stdin whether to reuse or erase an existing database file.
/// Returns `true` to erase it first.
fn prompt_erase_existing(db_path: &std::path::Path) -> Result<bool> {
    print!("Database {} already exists. Reuse (r) or erase (e)? [r]: ", db_path.display());
    std::io::stdout().flush().ok();
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).context("failed to read prompt response")?;
    Ok(line.trim().eq_ignore_ascii_case("e"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug)?;

    let project_path = args
        .project_path
        .canonicalize()
        .with_context(|| format!("project path does not exist: {}", args.project_path.display()))?;
    let project_name = project_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    if let Some(ctx_path) = &args.project_context {
        info!(path = %ctx_path.display(), "project context file received (passed through unopened)");
    }
    if let Some(docs_path) = &args.output_docs {
        info!(path = %docs_path.display(), "documentation output root received (passed through)");
    }

    let config = match &args.config_dir {
        Some(dir) => PipelineConfig::load(dir).context("failed to load config tables")?,
        None => PipelineConfig::default(),
    };

    let invocation_dir = std::env::current_dir().context("failed to determine invocation directory")?;
    let db_path = invocation_dir.join(format!("{project_name}.db"));
    if db_path.exists() && prompt_erase_existing(&db_path)? {
        std::fs::remove_file(&db_path).with_context(|| format!("failed to erase {}", db_path.display()))?;
    }

    info!(project = %project_path.display(), db = %db_path.display(), "walking project");
    let walked = walker::walk(&project_path, &config);
    info!(files = walked.files.len(), folders = walked.folders.len(), skipped = walked.skipped, "walk complete");

    let mode = if args.no_docker { ClientMode::Host } else { ClientMode::Container };
    let mut store = Store::open(&db_path).context("failed to open database")?;

    let summary = orchestrator::run(&project_name, &project_path, &walked.folders, &walked.files, &config, mode, &mut store)
        .await
        .context("run failed")?;

    let provider = Provider::parse(&args.provider).unwrap_or_else(|| {
        warn!(provider = %args.provider, "unrecognized provider, defaulting to ollama");
        Provider::Ollama
    });
    let backend = llm::backend_for(provider, args.model.as_deref());
    let documented = orchestrator::document_pending(&mut store, backend.as_ref(), None).context("documentation pass failed")?;

    info!(
        symbols = summary.total_symbols,
        edges = summary.total_edges,
        documented,
        failed_languages = ?summary.failed_languages,
        success = summary.success(),
        "run finished"
    );

    if summary.success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
