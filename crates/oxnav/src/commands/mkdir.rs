use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use oxnav_core::FileController;

#[derive(ClapArgs)]
pub struct Args {
    /// Directory path to create, relative to the root
    pub path: String,

    /// Print the location of the directory
    #[arg(long)]
    pub print: bool,
}

/// Create the directory and any missing parents.
#[instrument(level = "info", name = "cmd::mkdir", skip_all, fields(path = %args.path))]
pub async fn execute(controller: &FileController, args: &Args) -> Result<()> {
    let dir = controller
        .get_directory(args.path.trim_start_matches('/'), None, true)
        .await?;
    if args.print {
        println!("{}", dir.location());
    }
    Ok(())
}
