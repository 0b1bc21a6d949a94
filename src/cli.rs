//! Command-line interface definitions.

use clap::Parser;
use std::path::PathBuf;

/// Build a static site from markdown, notebooks and data files
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file, relative to the site root
    #[arg(short = 'C', long, default_value = "config.yml")]
    pub config: PathBuf,

    /// Site root directory
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Serve the output after building, rebuilding on change
    #[arg(short, long)]
    pub serve: bool,

    /// Port to serve on (only this port is tried)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Interface to bind on
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Print every step
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
