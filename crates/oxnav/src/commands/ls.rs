//! List command - list the children of a directory.
//!
//! # Examples
//!
//! ```bash
//! # List the root, including the ".." entry
//! oxnav ls --nav
//!
//! # List with ids
//! oxnav ls -l notes
//!
//! # Output as JSON for scripting
//! oxnav ls --json notes | jq '.entries[].display_name'
//! ```

use anyhow::Result;
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use oxnav_core::{FileController, ListingNode};

use super::directory_path;
use crate::output::{create_table, format_entry_type};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Directory to list, relative to the root (default: root)
    #[arg(default_value = "/")]
    pub path: String,

    /// Include the ".." entry when listing the root
    #[arg(long)]
    pub nav: bool,

    /// Show entry type, id and location
    #[arg(short, long)]
    pub long: bool,

    /// Output as JSON
    #[arg(long, conflicts_with = "long")]
    pub json: bool,
}

/// JSON output format for ls command
#[derive(Serialize)]
struct LsOutput<'a> {
    path: &'a str,
    location: &'a str,
    entries: &'a [ListingNode],
}

#[instrument(level = "info", name = "cmd::ls", skip_all, fields(path = %args.path))]
pub async fn execute(controller: &FileController, args: &Args) -> Result<()> {
    let dir = match directory_path(&args.path) {
        Some(path) => controller.get_directory(path, None, false).await?,
        None => controller.root().await?,
    };

    let nodes = controller.list_children(Some(&dir), args.nav).await?;

    if args.json {
        let output = LsOutput {
            path: &args.path,
            location: dir.location(),
            entries: &nodes,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if args.long {
        print_long_format(&nodes);
    } else {
        print_short_format(&nodes);
    }

    Ok(())
}

fn display_name(node: &ListingNode) -> String {
    if node.is_container && !node.is_up_navigation {
        format!("{}/", node.display_name)
    } else {
        node.display_name.clone()
    }
}

fn print_short_format(nodes: &[ListingNode]) {
    for node in nodes {
        println!("{}", display_name(node));
    }
}

fn print_long_format(nodes: &[ListingNode]) {
    let mut table = create_table();
    table.set_header(vec!["Type", "Name", "Id", "Location"]);
    for node in nodes {
        table.add_row(vec![
            format_entry_type(node.is_container).to_string(),
            display_name(node),
            node.id.clone(),
            node.handle.location().to_string(),
        ]);
    }
    println!("{table}");
}
