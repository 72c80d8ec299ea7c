//! # docdex CLI
//!
//! Command-line interface for building cached vector indexes and asking
//! questions against them.
//!
//! ## Usage
//!
//! ```bash
//! docdex --config ./docdex.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docdex ingest <path>...` | Build (or refresh) cached indexes for documents |
//! | `docdex ask "<query>" --doc <path>` | Answer a question against one or more documents |
//! | `docdex info --doc <path>` | Show page/chunk/character counts |
//! | `docdex cache clear` | Remove every cache entry |
//!
//! ## Examples
//!
//! ```bash
//! # Warm the cache for a device manual at maximum throughput
//! docdex ingest manual.pdf --profile insane
//!
//! # Ask across two documents (the second widens retrieval)
//! docdex ask "which function measures angles?" --doc manual.pdf --doc release-notes.md
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docdex::config;
use docdex::progress::ProgressMode;
use docdex::session::DocSession;

/// docdex — cached vector-index construction and document QA.
#[derive(Parser)]
#[command(
    name = "docdex",
    about = "Cached vector-index construction and document QA over PDFs, slides, Word docs, and web pages",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./docdex.toml")]
    config: PathBuf,

    /// Progress output on stderr: auto, off, human, or json.
    #[arg(long, global = true, default_value = "auto")]
    progress: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or refresh) cached indexes for one or more documents.
    ///
    /// The first path is loaded, later paths are added and merged. Documents
    /// already in the cache are restored without any embedding calls.
    Ingest {
        /// Document paths or URLs.
        #[arg(required = true)]
        paths: Vec<String>,

        /// Explicit document type (pdf, slides, word, web, text); detected
        /// from the path when omitted.
        #[arg(long)]
        doc_type: Option<String>,

        /// Performance profile override (turbo, extreme, ultra, maximum, insane).
        #[arg(long)]
        profile: Option<String>,
    },

    /// Answer a question against one or more documents.
    Ask {
        /// The question.
        query: String,

        /// Document path or URL; repeat to merge several documents.
        #[arg(long = "doc", required = true)]
        docs: Vec<String>,

        /// Explicit document type for all given documents.
        #[arg(long)]
        doc_type: Option<String>,
    },

    /// Show page/chunk/character counts for a document (cache-aware).
    Info {
        /// Document path or URL.
        #[arg(long = "doc")]
        doc: String,
    },

    /// Manage the index cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove every cache entry.
    Clear,
}

fn parse_progress(mode: &str) -> Result<ProgressMode> {
    Ok(match mode {
        "auto" => ProgressMode::default_for_tty(),
        "off" => ProgressMode::Off,
        "human" => ProgressMode::Human,
        "json" => ProgressMode::Json,
        other => anyhow::bail!("Unknown progress mode: {}. Use auto, off, human, or json.", other),
    })
}

fn open_session(
    cli_config: &std::path::Path,
    progress: &str,
    profile: Option<String>,
) -> Result<DocSession> {
    let mut cfg = config::load_config(cli_config)?;
    if let Some(profile) = profile {
        cfg.embedding.profile = Some(profile);
        config::validate(&cfg)?;
    }
    let mut session = DocSession::from_config(cfg)?;
    session.set_reporter(parse_progress(progress)?.reporter());
    Ok(session)
}

fn print_info(session: &DocSession) {
    let info = session.info();
    println!("documents: {}", info.documents.join(", "));
    println!("  pages: {}", info.pages);
    println!("  chunks: {}", info.chunks);
    println!("  total characters: {}", info.total_characters);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            paths,
            doc_type,
            profile,
        } => {
            let mut session = open_session(&cli.config, &cli.progress, profile)?;
            let mut iter = paths.iter();
            if let Some(first) = iter.next() {
                session.load(first, doc_type.as_deref()).await?;
                for path in iter {
                    session.add(path, doc_type.as_deref()).await?;
                }
            }
            print_info(&session);
            for record in session.documents() {
                let origin = if record.from_cache { "cache" } else { "built" };
                println!("  {} ({})", record.name, origin);
            }
            println!("ok");
        }

        Commands::Ask {
            query,
            docs,
            doc_type,
        } => {
            let mut session = open_session(&cli.config, &cli.progress, None)?;
            let mut iter = docs.iter();
            if let Some(first) = iter.next() {
                session.load(first, doc_type.as_deref()).await?;
                for doc in iter {
                    session.add(doc, doc_type.as_deref()).await?;
                }
            }

            match session.ask(&query).await {
                Ok(answer) => {
                    println!("{}", answer.text);
                    if !answer.sources.is_empty() {
                        println!();
                        println!("sources: {}", answer.sources.len());
                        for (i, source) in answer.sources.iter().enumerate() {
                            println!("  [{}] {} page {}", i + 1, source.document, source.page);
                        }
                    }
                }
                Err(e) => {
                    // Query failures stay conversational rather than crashing
                    // the caller's loop.
                    println!("Could not answer the question: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Info { doc } => {
            let mut session = open_session(&cli.config, &cli.progress, None)?;
            session.load(&doc, None).await?;
            print_info(&session);
        }

        Commands::Cache { action } => match action {
            CacheAction::Clear => {
                let cfg = config::load_config(&cli.config)?;
                let cache = docdex::cache::IndexCache::new(cfg.cache.root.clone());
                let removed = cache.clear_all().await?;
                println!("cache cleared ({} entries removed)", removed);
            }
        },
    }

    Ok(())
}
