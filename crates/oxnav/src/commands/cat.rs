use std::io::{self, Write};

use anyhow::{Result, bail};
use clap::Args as ClapArgs;
use tracing::instrument;

use oxnav_core::FileController;

#[derive(ClapArgs)]
pub struct Args {
    /// File path relative to the root (created empty if missing)
    pub path: String,
}

#[instrument(level = "info", name = "cmd::cat", skip_all, fields(path = %args.path))]
pub async fn execute(controller: &FileController, args: &Args) -> Result<()> {
    let Some(file) = controller.read_file_by_name(&args.path).await? else {
        bail!("Not a file path: {}", args.path);
    };
    io::stdout().write_all(file.content.as_bytes())?;
    Ok(())
}
