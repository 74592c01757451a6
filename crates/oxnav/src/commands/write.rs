use std::io::{self, Read};

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use oxnav_core::FileController;

#[derive(ClapArgs)]
pub struct Args {
    /// File path relative to the root; missing directories are created
    pub path: String,
}

/// Replace the file's content with everything read from stdin.
#[instrument(level = "info", name = "cmd::write", skip_all, fields(path = %args.path))]
pub async fn execute(controller: &FileController, args: &Args) -> Result<()> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read stdin")?;

    let file = controller.write_file_by_name(&args.path, &text).await?;
    info!(location = %file.location(), bytes = text.len(), "Wrote file");
    Ok(())
}
