//! AKC CLI
//!
//! Command-line interface for clue sets: bookmark story passages, share
//! them as `AKC1-` codes and find them again after content updates.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use akc_core::{ClueStore, Config};

mod commands;
mod output;
mod prompt;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "akc")]
#[command(about = "AKC - Story clue bookmarks and share codes")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage clue sets
    Set {
        #[command(subcommand)]
        command: SetCommands,
    },
    /// Manage clues within a set
    Clue {
        #[command(subcommand)]
        command: ClueCommands,
    },
    /// Print the share code for a set
    Export {
        /// Set ID (full or prefix)
        set: String,
    },
    /// Import a share code
    Import {
        /// Share code (AKC1-...)
        code: String,
        /// Merge into this set instead of creating one
        #[arg(long)]
        into: Option<String>,
        /// Title for a newly created set
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// Fail instead of creating a set when no target is given
        #[arg(long)]
        no_create: bool,
    },
    /// Show what a share code contains
    Decode {
        /// Share code (AKC1-...)
        code: String,
    },
    /// Locate a set's clues in the current story content
    Resolve {
        /// Set ID (full or prefix)
        set: String,
        /// Fill in missing previews and digests first
        #[arg(long)]
        refresh: bool,
    },
    /// Add highlighted segments from a highlight export file
    Highlights {
        /// Set ID (full or prefix)
        set: String,
        /// JSON file mapping story paths to segment indices
        file: PathBuf,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum SetCommands {
    /// Create a new set
    #[command(alias = "new")]
    Create {
        /// Title (a numbered default is used when omitted)
        title: Option<String>,
    },
    /// List all sets
    #[command(alias = "ls")]
    List,
    /// Show a set and its clues
    Show {
        /// Set ID (full or prefix)
        id: String,
    },
    /// Rename a set
    Rename {
        /// Set ID (full or prefix)
        id: String,
        /// New title
        title: String,
    },
    /// Set or clear a set's description
    Describe {
        /// Set ID (full or prefix)
        id: String,
        /// Description (clears it when omitted)
        text: Option<String>,
    },
    /// Delete a set
    #[command(alias = "rm")]
    Delete {
        /// Set ID (full or prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum ClueCommands {
    /// Bookmark a passage
    Add {
        /// Set ID (full or prefix)
        set: String,
        /// Story ID
        story: String,
        /// Segment index within the story
        index: u32,
        /// Preview text to store with the clue
        #[arg(short, long)]
        preview: Option<String>,
    },
    /// Remove a clue
    #[command(alias = "rm")]
    Remove {
        /// Set ID (full or prefix)
        set: String,
        /// Story ID
        story: String,
        /// Segment index within the story
        index: u32,
    },
    /// Move a clue to another position in the set
    #[command(alias = "mv")]
    Move {
        /// Set ID (full or prefix)
        set: String,
        /// Current position (0-based)
        from: usize,
        /// New position (0-based)
        to: usize,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, content_dir, log_file, preview_chars)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    let config = Config::load_with_cli_override(config_path);
    init_logging(config.as_ref().ok().and_then(Config::log_path));

    // Commands that don't need the store
    match cli.command {
        Commands::Config { command } => {
            return handle_config_command(command, config_path, &output);
        }
        Commands::Decode { code } => return commands::share::decode(code, &output),
        _ => {}
    }

    let config = config.context("Failed to load configuration")?;

    let mut store = ClueStore::open(&config)?;

    match cli.command {
        Commands::Set { command } => handle_set_command(command, &mut store, &output),
        Commands::Clue { command } => handle_clue_command(command, &mut store, &config, &output),
        Commands::Export { set } => commands::share::export(&store, set, &output),
        Commands::Import {
            code,
            into,
            title,
            no_create,
        } => commands::share::import(&mut store, code, into, title, no_create, &output),
        Commands::Resolve { set, refresh } => {
            commands::resolve::resolve(&mut store, &config, set, refresh, &output)
        }
        Commands::Highlights { set, file } => {
            commands::highlights::import(&mut store, &config, set, file, &output)
        }
        Commands::Config { .. } | Commands::Decode { .. } => Ok(()), // Handled above
    }
}

fn handle_set_command(command: SetCommands, store: &mut ClueStore, output: &Output) -> Result<()> {
    match command {
        SetCommands::Create { title } => commands::set::create(store, title, output),
        SetCommands::List => commands::set::list(store, output),
        SetCommands::Show { id } => commands::set::show(store, id, output),
        SetCommands::Rename { id, title } => commands::set::rename(store, id, title, output),
        SetCommands::Describe { id, text } => commands::set::describe(store, id, text, output),
        SetCommands::Delete { id } => commands::set::delete(store, id, output),
    }
}

fn handle_clue_command(
    command: ClueCommands,
    store: &mut ClueStore,
    config: &Config,
    output: &Output,
) -> Result<()> {
    match command {
        ClueCommands::Add {
            set,
            story,
            index,
            preview,
        } => commands::clue::add(store, config, set, story, index, preview, output),
        ClueCommands::Remove { set, story, index } => {
            commands::clue::remove(store, set, story, index, output)
        }
        ClueCommands::Move { set, from, to } => {
            commands::clue::move_item(store, set, from, to, output)
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// Only initializes if AKC_LOG environment variable is set.
/// Logs to the configured log file when set, otherwise stderr.
fn init_logging(log_path: Option<&Path>) {
    let Ok(log_level) = std::env::var("AKC_LOG") else {
        return;
    };

    let env_filter = EnvFilter::new(log_directive(&log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    match log_path {
        Some(log_path) => {
            let log_file = match File::options().create(true).append(true).open(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
                    return;
                }
            };
            // Ignore error if already initialized
            let _ = builder.with_ansi(false).with_writer(log_file).try_init();
            info!("Logging to {:?}", log_path);
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
}

/// Filter directive applying one level to both crates
fn log_directive(level: &str) -> String {
    format!("akc_core={},akc_cli={}", level, level)
}
