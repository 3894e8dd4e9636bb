//! Command-line interface: `--config <file>` and `--version`, the only two
//! flags spec.md §6 names as part of the contract.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "originhttpd", about = "A lightweight multi-server HTTP/1.x origin server.")]
pub struct CliArgs {
    /// Path to the JSON configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the version and exit.
    #[arg(long)]
    pub version: bool,
}
