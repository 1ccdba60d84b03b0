//! bot CLI - run Buffer-of-Thoughts agents from the command line.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bot")]
#[command(author, version, about = "bot - Buffer-of-Thoughts agents with reusable thought templates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project (bot.toml and .bot/)
    Init {
        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Run episodes in generated rooms and update the template buffer
    Run {
        /// Number of episodes
        #[arg(short, long, default_value = "10")]
        episodes: usize,

        /// LLM backend: mock, ollama, openai or claude (default: from bot.toml)
        #[arg(short, long)]
        backend: Option<String>,

        /// Seed of the first room; episode i uses seed + i
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Buffer snapshot to load and save (default: .bot/buffer.json)
        #[arg(long)]
        buffer: Option<PathBuf>,

        /// Room side length (default: from bot.toml)
        #[arg(long)]
        size: Option<i32>,

        /// Write per-episode metrics as JSON to this file
        #[arg(long)]
        metrics: Option<PathBuf>,
    },

    /// List stored thought templates
    Templates {
        /// Buffer snapshot to read (default: .bot/buffer.json)
        #[arg(long)]
        buffer: Option<PathBuf>,

        /// Print each template's reasoning pattern
        #[arg(short, long)]
        full: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init { path } => commands::init::run(path),
        Commands::Run {
            episodes,
            backend,
            seed,
            buffer,
            size,
            metrics,
        } => commands::run::run(
            commands::run::RunOptions {
                episodes,
                backend,
                seed,
                buffer,
                size,
                metrics,
            },
            cli.verbose,
        ),
        Commands::Templates { buffer, full } => commands::templates::run(buffer, full),
    }
}
