//! CLI argument definitions using the clap derive API.
//!
//! Argument names, aliases, help text and value enums live here.  Commands
//! translate these into core settings; nothing here touches the engine.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use codeloom_core::application::OverwritePolicy;

pub mod global;
pub use global::{GlobalArgs, OutputFormat};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name    = "codeloom",
    bin_name = "codeloom",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Schema-driven code generation",
    long_about = "Codeloom turns a domain schema into a project tree by letting \
                  generators react to every artifact they create and rendering \
                  templates through tera, legacy .tpl, diagram and folder engines.",
    after_help = "EXAMPLES:\n\
        \x20 codeloom generate shop.json --output ./out\n\
        \x20 codeloom generate shop.toml --preview --format json\n\
        \x20 codeloom templates --templates ./my-templates\n\
        \x20 codeloom completions bash > /usr/share/bash-completion/completions/codeloom",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a project from a schema file.
    #[command(
        visible_alias = "gen",
        about = "Generate code from a schema",
        after_help = "EXAMPLES:\n\
            \x20 codeloom generate shop.json\n\
            \x20 codeloom generate shop.json --output out --namespace Acme.Shop\n\
            \x20 codeloom generate shop.json --project-template @templates/webapi\n\
            \x20 codeloom generate shop.json --preview"
    )]
    Generate(GenerateArgs),

    /// List the templates the generator can resolve.
    #[command(
        visible_alias = "ls",
        about = "List available templates",
        after_help = "EXAMPLES:\n\
            \x20 codeloom templates\n\
            \x20 codeloom templates --templates ./my-templates\n\
            \x20 codeloom templates --format json"
    )]
    Templates(TemplatesArgs),

    /// Write a default configuration file.
    #[command(
        about = "Initialise configuration",
        after_help = "EXAMPLES:\n\
            \x20 codeloom init           # platform config directory\n\
            \x20 codeloom init --local   # .codeloom.toml in the current directory"
    )]
    Init(InitArgs),

    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 codeloom completions bash > ~/.local/share/bash-completion/completions/codeloom\n\
            \x20 codeloom completions zsh  > ~/.zfunc/_codeloom\n\
            \x20 codeloom completions fish > ~/.config/fish/completions/codeloom.fish"
    )]
    Completions(CompletionsArgs),

    /// Inspect the effective configuration.
    #[command(
        about = "Configuration inspection",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 codeloom config get generation.overwrite\n\
            \x20 codeloom config list\n\
            \x20 codeloom config path"
    )]
    Config(ConfigCommands),
}

// ── generate ──────────────────────────────────────────────────────────────────

/// Arguments for `codeloom generate`.  Every option falls back to the
/// `[generation]` or `[templates]` config section when omitted.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Schema file (`.json` or `.toml`).
    #[arg(value_name = "SCHEMA", help = "Schema file (.json or .toml)")]
    pub schema: PathBuf,

    /// Build the tree and report it without writing anything.
    #[arg(long = "preview", visible_alias = "dry-run", help = "Show what would be generated")]
    pub preview: bool,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        help = "Directory the project folder is written into"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        short = 'n',
        long = "namespace",
        value_name = "NS",
        help = "Namespace for generated code"
    )]
    pub namespace: Option<String>,

    /// User templates directory, consulted before the built-in one for
    /// `@templates/...` ids.
    #[arg(
        short = 't',
        long = "templates",
        value_name = "DIR",
        help = "User templates directory"
    )]
    pub templates: Option<PathBuf>,

    #[arg(
        long = "overwrite",
        value_enum,
        value_name = "POLICY",
        help = "What to do with files that already exist"
    )]
    pub overwrite: Option<OverwriteArg>,

    #[arg(
        long = "project-template",
        value_name = "ID",
        help = "Template folder rendered into the project (e.g. @templates/webapi)"
    )]
    pub project_template: Option<String>,

    #[arg(
        long = "entity-template",
        value_name = "ID",
        help = "Template for entities that do not name one"
    )]
    pub entity_template: Option<String>,

    #[arg(short = 'y', long = "yes", help = "Do not ask before writing into an existing project")]
    pub yes: bool,
}

/// CLI spelling of [`OverwritePolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OverwriteArg {
    Never,
    Always,
    IfChanged,
}

impl From<OverwriteArg> for OverwritePolicy {
    fn from(arg: OverwriteArg) -> Self {
        match arg {
            OverwriteArg::Never => Self::Never,
            OverwriteArg::Always => Self::Always,
            OverwriteArg::IfChanged => Self::IfChanged,
        }
    }
}

// ── templates ─────────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TemplatesArgs {
    #[arg(
        short = 't',
        long = "templates",
        value_name = "DIR",
        help = "User templates directory"
    )]
    pub templates: Option<PathBuf>,

    /// Print ids only, one per line.
    #[arg(long = "ids", help = "Print template ids only")]
    pub ids_only: bool,
}

// ── init ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Write `.codeloom.toml` in the current directory instead of the
    /// platform config directory.
    #[arg(long = "local", help = "Create local configuration in current directory")]
    pub local: bool,

    #[arg(short = 'f', long = "force", help = "Overwrite existing configuration")]
    pub force: bool,
}

// ── completions ───────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: clap_complete::Shell,
}

// ── config subcommands ────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the value of a configuration key.
    Get {
        /// Dotted key path, e.g. `generation.overwrite`.
        key: String,
    },
    /// Print all configuration values.
    List,
    /// Print the path of the configuration file in use.
    Path,
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_generate_command() {
        let cli = Cli::parse_from([
            "codeloom",
            "generate",
            "shop.json",
            "--output",
            "out",
            "--overwrite",
            "if-changed",
        ]);
        let Commands::Generate(args) = cli.command else {
            panic!("expected Generate command");
        };
        assert_eq!(args.schema, PathBuf::from("shop.json"));
        assert_eq!(args.output, Some(PathBuf::from("out")));
        assert_eq!(
            args.overwrite.map(OverwritePolicy::from),
            Some(OverwritePolicy::IfChanged)
        );
        assert!(!args.preview);
    }

    #[test]
    fn dry_run_is_an_alias_for_preview() {
        let cli = Cli::parse_from(["codeloom", "gen", "shop.json", "--dry-run"]);
        let Commands::Generate(args) = cli.command else {
            panic!("expected Generate command");
        };
        assert!(args.preview);
    }

    #[test]
    fn format_alias_sets_output_format() {
        let cli = Cli::parse_from(["codeloom", "templates", "--format", "json"]);
        assert_eq!(cli.global.output_format, OutputFormat::Json);
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        let result = Cli::try_parse_from(["codeloom", "--quiet", "--verbose", "templates"]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_overwrite_policy_is_rejected() {
        let result = Cli::try_parse_from(["codeloom", "generate", "s.json", "--overwrite", "sometimes"]);
        assert!(result.is_err());
    }
}
