use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Import the visible text of a web page, with you choosing the page.
#[derive(Debug, Parser)]
#[command(name = "gleaner", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open URL in a browser window; press Import to capture its text.
    Import(ImportArgs),
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    pub url: String,

    /// YAML configuration file. Defaults to ./gleaner.yaml when present.
    #[arg(long, env = "GLEANER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the result here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print `{"text": ...}` instead of the raw text.
    #[arg(long)]
    pub json: bool,

    /// Accept an import whose text is blank.
    #[arg(long)]
    pub allow_empty: bool,

    /// Run the browser without a visible window.
    #[arg(long)]
    pub headless: bool,
}
