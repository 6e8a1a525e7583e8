use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use quill_driver::Pass;

/// CLI arguments for the quill binary.
#[derive(Parser, Debug)]
#[command(
    name = "quill",
    version,
    about = "Resolve names and validate method bodies of a quill program"
)]
pub struct CliArgs {
    /// Program to compile, in the JSON program format.
    pub program: PathBuf,

    /// Path to a quill.json config file. Defaults to the quill.json next to
    /// the program, if there is one.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Ignore any quill.json next to the program.
    #[arg(long)]
    pub no_config: bool,

    // ==================== Output ====================
    /// How diagnostics are reported on stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Print the declaration listing produced by the last pass.
    #[arg(long)]
    pub emit: bool,

    /// Print the effective driver options instead of compiling.
    #[arg(long)]
    pub show_config: bool,

    /// Disable colored output.
    #[arg(long)]
    pub no_color: bool,

    // ==================== Driver ====================
    /// Sweeps allowed per pass before pending names are forced.
    #[arg(long)]
    pub max_sweeps: Option<u32>,

    /// Stop after this many errors.
    #[arg(long)]
    pub max_errors: Option<usize>,

    /// Last pass to run (register, resolve, validate or emit).
    #[arg(long)]
    pub stop_after: Option<Pass>,

    /// Report warnings as errors.
    #[arg(long)]
    pub warnings_as_errors: bool,
}

/// Diagnostic output format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
