//! Flags accepted before or after any subcommand.
//!
//! They control how much a run reports and where its settings come from;
//! what gets generated is decided by the subcommand's own arguments and the
//! `[generation]` / `[templates]` config sections.

use clap::{ArgAction, Args, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Log more of the run on stderr (-v, -vv, -vvv)
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        long_help = "Log more of the run on stderr. Without the flag only warnings and errors \
                     are logged; -v adds generation steps and resolved template ids, -vv each \
                     generator dispatch and engine call, -vvv everything. RUST_LOG overrides \
                     this."
    )]
    pub verbose: u8,

    /// Print errors only; `generate` also stops asking before writing into
    /// an existing project directory
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colors (also set by NO_COLOR)
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Read settings from FILE instead of `.codeloom.toml` or the user
    /// config file; CODELOOM_* variables still apply on top
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// How results are printed
    #[arg(
        long = "output-format",
        visible_alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Auto
    )]
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `human` on a terminal, `plain` when piped
    #[default]
    Auto,
    /// Colored summary with generated files listed
    Human,
    /// Same text without colors
    Plain,
    /// One JSON document per command on stdout; logs on stderr turn to JSON
    Json,
}
