//! Root command - show the active root or remember a new one.

use anyhow::Result;
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use oxnav_core::{FileController, RootSource};

use super::directory_path;

#[derive(ClapArgs)]
pub struct Args {
    /// Remember this directory (relative to the current root) as the root
    /// for future invocations
    #[arg(long, value_name = "PATH")]
    pub remember: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct RootOutput<'a> {
    root: &'a str,
    default_root: &'a str,
    source: &'static str,
}

fn source_name(source: RootSource) -> &'static str {
    match source {
        RootSource::Default => "default",
        RootSource::Remembered => "remembered",
        RootSource::Fallback => "fallback",
    }
}

#[instrument(level = "info", name = "cmd::root", skip_all)]
pub async fn execute(controller: &FileController, args: &Args) -> Result<()> {
    let state = controller.wait_for_init().await?;

    if let Some(path) = &args.remember {
        let dir = match directory_path(path) {
            Some(path) => controller.get_directory(path, None, false).await?,
            None => state.root().clone(),
        };
        controller.remember_root(&dir).await?;
        println!("{}", dir.location());
        return Ok(());
    }

    if args.json {
        let output = RootOutput {
            root: state.root().location(),
            default_root: state.default_root().location(),
            source: source_name(state.source()),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", state.root().location());
    }
    Ok(())
}
