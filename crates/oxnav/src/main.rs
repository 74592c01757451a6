#![deny(unsafe_code)]

mod commands;
mod config;
mod exit_code;
mod output;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use oxnav_core::prefs::PreferenceLoadStatus;
use oxnav_core::storage::StorageError;
use oxnav_core::{FileController, JsonPreferences, LocalStorage, NavError};

use crate::commands::{cat, ls, mkdir, root, write};
use crate::config::{Config, Overrides, Settings};

/// Command-line interface for path-addressable file navigation
#[derive(Parser)]
#[command(name = "oxnav")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Write a note, creating the notes directory on the way
    echo \"hello\" | oxnav write notes/today.txt

    # Read it back
    oxnav cat notes/today.txt

    # List the root with its parent entry
    oxnav ls --nav

    # Start future invocations in the notes directory
    oxnav root --remember notes
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress log output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (default: <config dir>/oxnav/config.toml)
    #[arg(long, value_name = "FILE", env = "OXNAV_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Sandbox directory the storage is rooted at
    #[arg(long, value_name = "DIR", env = "OXNAV_STORAGE_ROOT", global = true)]
    storage_root: Option<PathBuf>,

    /// Preference file remembering the chosen root
    #[arg(long, value_name = "FILE", env = "OXNAV_PREFERENCES", global = true)]
    preferences: Option<PathBuf>,

    /// Number of entries read per directory batch
    #[arg(long, value_name = "N", global = true)]
    batch_size: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a directory
    Ls(ls::Args),

    /// Print a file, creating it (and its directories) if missing
    Cat(cat::Args),

    /// Replace a file's content with stdin
    Write(write::Args),

    /// Create a directory and its parents
    Mkdir(mkdir::Args),

    /// Show or change the root directory
    Root(root::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let quiet = cli.quiet;

    match run(cli) {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);
            if !quiet {
                eprintln!("Error: {e:#}");
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let config = Config::load(cli.config.as_deref())?;
    let settings = Settings::resolve(
        config,
        Overrides {
            storage_root: cli.storage_root,
            preferences: cli.preferences,
            batch_size: cli.batch_size,
        },
    )?;
    tracing::debug!(?settings, "Resolved settings");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async {
        let controller = build_controller(&settings)?;
        match &cli.command {
            Commands::Ls(args) => ls::execute(&controller, args).await,
            Commands::Cat(args) => cat::execute(&controller, args).await,
            Commands::Write(args) => write::execute(&controller, args).await,
            Commands::Mkdir(args) => mkdir::execute(&controller, args).await,
            Commands::Root(args) => root::execute(&controller, args).await,
        }
    })
}

fn build_controller(settings: &Settings) -> Result<FileController> {
    let prefs = JsonPreferences::open(&settings.preferences).with_context(|| {
        format!(
            "Failed to open preferences: {}",
            settings.preferences.display()
        )
    })?;
    if let PreferenceLoadStatus::Corrupted { backup_path, error } = prefs.load_status() {
        tracing::warn!(
            backup = %backup_path.display(),
            error = %error,
            "Preference file was corrupted and has been reset"
        );
    }

    let storage =
        LocalStorage::new(&settings.storage_root).with_batch_size(settings.batch_size);
    Ok(FileController::new(Arc::new(storage), Arc::new(prefs)))
}

/// Set up tracing/logging based on verbosity level
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(nav_err) = cause.downcast_ref::<NavError>() {
            if matches!(nav_err, NavError::MissingArgument(_)) {
                return exit_code::USAGE_ERROR;
            }
            if nav_err.is_not_found() {
                return exit_code::NOT_FOUND;
            }
            if matches!(
                nav_err.storage_error(),
                Some(StorageError::PermissionDenied { .. })
            ) {
                return exit_code::PERMISSION_DENIED;
            }
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::PermissionDenied => return exit_code::PERMISSION_DENIED,
                io::ErrorKind::NotFound => return exit_code::NOT_FOUND,
                _ => {}
            }
        }
    }

    exit_code::GENERAL_ERROR
}
