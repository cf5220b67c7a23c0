//! # ragkit CLI (`rag`)
//!
//! The `rag` binary is the primary interface for ragkit. It starts the HTTP
//! server, answers one-shot questions against the configured context
//! directory, and inspects chunking output.
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag serve` | Load the context directory and start the HTTP API |
//! | `rag ask "<question>"` | Load the context directory and answer one question |
//! | `rag chunk <file>` | Show how a text file would be chunked, without indexing |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ragkit::answer;
use ragkit::chunk::chunk_words;
use ragkit::config::{self, Config};
use ragkit::embedding::{create_embedder, Embedder};
use ragkit::generation::create_generator;
use ragkit::ingest;
use ragkit::retriever::Retriever;
use ragkit::server;
use ragkit::store::VectorStore;

use std::sync::Arc;

/// ragkit — a minimal retrieval-augmented generation service.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "ragkit — a minimal retrieval-augmented generation service",
    version,
    long_about = "ragkit chunks and embeds text passages into an in-memory vector index, \
    retrieves the passages most similar to a question, and asks a text-generation \
    provider for an answer grounded in the retrieved context."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Loads every CSV file from the configured context directory into the
    /// vector store, then serves the JSON API on `[server].bind`.
    Serve,

    /// Answer a single question and exit.
    ///
    /// Loads the context directory, retrieves the most relevant passages,
    /// and prints the generated answer with its context and score.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Show how a text file would be chunked, without indexing anything.
    Chunk {
        /// Path to a plain-text file.
        file: PathBuf,

        /// Maximum words per chunk.
        #[arg(long, default_value_t = 500)]
        max_words: usize,

        /// Words shared between consecutive chunks.
        #[arg(long, default_value_t = 50)]
        overlap_words: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // chunk is a pure inspection command; it needs no config file.
    if let Commands::Chunk {
        file,
        max_words,
        overlap_words,
    } = &cli.command
    {
        return run_chunk(file, *max_words, *overlap_words);
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask { question } => {
            run_ask(&cfg, &question).await?;
        }
        Commands::Chunk { .. } => unreachable!(),
    }

    Ok(())
}

fn run_chunk(file: &PathBuf, max_words: usize, overlap_words: usize) -> anyhow::Result<()> {
    if max_words == 0 || overlap_words >= max_words {
        anyhow::bail!(
            "overlap_words ({}) must be smaller than max_words ({})",
            overlap_words,
            max_words
        );
    }

    let text = std::fs::read_to_string(file)?;
    let chunks = chunk_words(&text, max_words, overlap_words);

    println!("chunk {} (dry-run)", file.display());
    println!("  words: {}", text.split_whitespace().count());
    println!("  chunks: {}", chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let words = chunk.split_whitespace().count();
        let preview: String = chunk.chars().take(60).collect();
        println!("  [{}] {} words: \"{}…\"", i, words, preview);
    }

    Ok(())
}

async fn run_ask(cfg: &Config, question: &str) -> anyhow::Result<()> {
    let store = Arc::new(VectorStore::new(cfg.embedding.dims));
    let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&cfg.embedding)?);
    let generator = create_generator(&cfg.generation)?;

    if let Some(dir) = &cfg.ingest.context_dir {
        let report = ingest::load_context_dir(
            &store,
            embedder.as_ref(),
            &cfg.chunking,
            &cfg.embedding,
            dir,
        )
        .await;
        println!(
            "loaded {} documents ({} chunks) from {}",
            report.documents_processed,
            report.chunks_created,
            dir.display()
        );
    }

    let retriever = Retriever::new(store, embedder, &cfg.retrieval);
    let result = answer::ask(
        &retriever,
        generator.as_ref(),
        cfg.generation.max_new_tokens,
        cfg.generation.temperature,
        question,
    )
    .await;

    println!();
    println!("answer: {}", result.answer);
    println!("context: {}", result.context.replace('\n', " "));
    if let Some(score) = result.score {
        println!("score: {:.3}", score);
    }

    Ok(())
}
