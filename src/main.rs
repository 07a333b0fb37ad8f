//! repoatlas CLI - repository maps from the command line.
//!
//! Thin wrapper around the map engine:
//!
//! 1. Resolve the repository root and load project config
//! 2. Expand positional paths through git-aware discovery
//! 3. Build a `MapRequest` from the chat/other/mentioned file sets
//! 4. Generate and print the map
//!
//! Token counting note: the engine takes a counting capability, not a
//! tokenizer. The CLI supplies the standard chars/4 estimator; embedders
//! with a real tokenizer pass their own counter through the library API.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use repoatlas::config::Config;
use repoatlas::discovery::find_source_files;
use repoatlas::{MapEngine, MapRequest, RankingConfig};

/// Generate a repository map showing important code structures.
///
/// Examples:
///   repoatlas .                              # Map current directory
///   repoatlas src/ --map-tokens 2048         # Map src/ with a 2048-token budget
///   repoatlas --chat-files main.py --other-files src/
#[derive(Parser, Debug)]
#[command(name = "repoatlas")]
#[command(version)]
#[command(about, long_about = None)]
pub struct Cli {
    /// Files or directories to include in the map
    ///
    /// Directories are expanded through git-aware discovery. When no
    /// explicit --chat-files/--other-files are given, everything found
    /// here is treated as background context.
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    /// Repository root directory
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Maximum tokens for the generated map
    #[arg(long, default_value = "1024")]
    pub map_tokens: usize,

    /// Files currently being edited (given the highest priority)
    #[arg(long, value_name = "FILES", num_args = 0..)]
    pub chat_files: Vec<PathBuf>,

    /// Other files to consider for the map
    #[arg(long, value_name = "FILES", num_args = 0..)]
    pub other_files: Vec<PathBuf>,

    /// Files explicitly mentioned (given elevated priority)
    #[arg(long, value_name = "FILES", num_args = 0..)]
    pub mentioned_files: Vec<PathBuf>,

    /// Identifiers explicitly mentioned (boosts matching symbols)
    #[arg(long, value_name = "IDENTS", num_args = 0..)]
    pub mentioned_idents: Vec<String>,

    /// Force refresh of the tag cache
    #[arg(long)]
    pub force_refresh: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins when set; --verbose raises the default level
    let default_filter = if cli.verbose {
        "repoatlas=debug"
    } else {
        "repoatlas=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let map = run(&cli)?;

    if map.is_empty() {
        eprintln!("No repository map generated.");
    } else {
        println!("{map}");
    }

    Ok(())
}

/// Execute the full pipeline for one CLI invocation.
fn run(cli: &Cli) -> Result<String> {
    let engine = MapEngine::new(&cli.root, RankingConfig::default())?;
    let config = Config::load(engine.root());

    let mut chat_files = cli.chat_files.clone();
    let mut other_files = cli.other_files.clone();

    // Expand directory arguments through discovery
    other_files = expand_paths(engine.root(), &other_files, &config)?;
    chat_files = expand_paths(engine.root(), &chat_files, &config)?;

    // No explicit role sets: positional paths become background context
    if chat_files.is_empty() && other_files.is_empty() && !cli.paths.is_empty() {
        other_files = expand_paths(engine.root(), &cli.paths, &config)?;
    }

    let request = MapRequest {
        chat_files,
        other_files,
        mentioned_files: cli.mentioned_files.clone(),
        mentioned_idents: cli.mentioned_idents.iter().cloned().collect::<HashSet<_>>(),
        budget: Some(cli.map_tokens),
        force_refresh: cli.force_refresh,
    };

    // chars/4 estimator; a model-specific tokenizer plugs in through the
    // library API
    let counter = |s: &str| (s.len() + 3) / 4;

    engine.generate(&request, &counter)
}

/// Expand a mixed list of files and directories into concrete file paths.
fn expand_paths(root: &Path, paths: &[PathBuf], config: &Config) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in paths {
        let abs = if input.is_absolute() {
            input.clone()
        } else {
            root.join(input)
        };

        if abs.is_file() {
            files.push(abs);
        } else if abs.is_dir() {
            files.extend(find_source_files(&abs, config)?);
        } else {
            tracing::warn!("skipping non-existent path: {}", input.display());
        }
    }

    Ok(files)
}
