//! Command-line argument definitions for the `fastget` binary.
use clap::Parser;
use std::path::PathBuf;

/// Downloads a file over HTTP(S) using several concurrent range requests.
#[derive(Parser, Debug)]
#[command(name = "fastget", about, disable_version_flag = true)]
pub struct Args {
    /// The URL of the file to download.
    pub url: Option<String>,

    /// Number of parallel workers [default: 3].
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Output file, or an existing directory to save into.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Extra request header, e.g. "Authorization: Bearer <token>". Repeatable.
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// Show debug information.
    #[arg(short, long)]
    pub debug: bool,

    /// Show version information and exit.
    #[arg(short, long)]
    pub version: bool,
}
