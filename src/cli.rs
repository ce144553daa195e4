use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "filefx")]
#[command(about = "Batch file operations built from composable handlers", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides FILEFX_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a pipeline over the given files and folders
    Run(RunArgs),
    /// Print the metadata of every built-in handler as JSON
    Handlers,
    /// Expand a range expression such as "1,3-5,8-N"
    Range(RangeArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Pipeline description (TOML, or JSON with a .json extension)
    #[arg(long, short)]
    pub pipeline: PathBuf,

    /// Print task events as JSON lines instead of text
    #[arg(long)]
    pub json: bool,

    /// Input files and folders
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct RangeArgs {
    /// Range expression
    pub expr: String,

    /// Value an open upper bound ("N") resolves to
    #[arg(long, default_value_t = 100)]
    pub max: u32,
}
