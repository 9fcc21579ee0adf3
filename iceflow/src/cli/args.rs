//! CLI argument definitions
//!
//! All Clap derive structs for `iceflow` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Load, validate and update ice free-energy experiment configurations.
#[derive(Parser, Debug)]
#[command(name = "iceflow", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "ICEFLOW_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "ICEFLOW_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Expand `${VAR}` references in documents before parsing.
    #[arg(long, global = true, env = "ICEFLOW_EXPAND_ENV")]
    pub expand_env: bool,
}

// ============================================================================
// Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate experiment files without running anything.
    Validate(ValidateArgs),

    /// Print the normalized configuration with all defaults filled in.
    Show(ShowArgs),

    /// Record the training step reached into an experiment file.
    Step(StepArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Experiment files or glob patterns (e.g. `runs/*.yaml`).
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Experiment file.
    pub file: PathBuf,

    /// Document format.
    #[arg(short, long, default_value = "yaml")]
    pub format: DocumentFormat,
}

/// Arguments for `step`.
#[derive(Args, Debug)]
pub struct StepArgs {
    /// Experiment file to update in place.
    pub file: PathBuf,

    /// Global step reached by the run.
    pub step: u64,

    /// Allow moving the step backwards.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Serialization format for `show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DocumentFormat {
    #[default]
    Yaml,
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["iceflow", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_validate_requires_files() {
        let result = Cli::try_parse_from(["iceflow", "validate"]);
        assert!(result.is_err(), "Expected error for missing files");
    }

    #[test]
    fn test_validate_defaults() {
        let cli = Cli::try_parse_from(["iceflow", "validate", "a.yaml", "runs/*.yaml"]).unwrap();
        let Commands::Validate(args) = cli.command else {
            panic!("Expected ValidateArgs");
        };
        assert_eq!(args.files, ["a.yaml", "runs/*.yaml"]);
        assert_eq!(args.format, OutputFormat::Human);
        assert!(!args.strict);
    }

    #[test]
    fn test_show_json() {
        let cli = Cli::try_parse_from(["iceflow", "show", "exp.yaml", "--format", "json"]).unwrap();
        let Commands::Show(args) = cli.command else {
            panic!("Expected ShowArgs");
        };
        assert_eq!(args.file, PathBuf::from("exp.yaml"));
        assert_eq!(args.format, DocumentFormat::Json);
    }

    #[test]
    fn test_step_args() {
        let cli = Cli::try_parse_from(["iceflow", "step", "exp.yaml", "2500", "--force"]).unwrap();
        let Commands::Step(args) = cli.command else {
            panic!("Expected StepArgs");
        };
        assert_eq!(args.step, 2500);
        assert!(args.force);
    }

    #[test]
    fn test_step_rejects_negative() {
        let result = Cli::try_parse_from(["iceflow", "step", "exp.yaml", "-5"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_color_choices_parse() {
        for variant in ["auto", "always", "never"] {
            let cli = Cli::try_parse_from(["iceflow", "--color", variant, "version"]);
            assert!(cli.is_ok(), "Failed to parse color={variant}");
        }
    }

    #[test]
    fn test_log_format_parse() {
        let cli = Cli::try_parse_from(["iceflow", "--log-format", "json", "version"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_completions_shells_parse() {
        for shell in ["bash", "zsh", "fish", "powershell", "elvish"] {
            let cli = Cli::try_parse_from(["iceflow", "completions", shell]);
            assert!(cli.is_ok(), "Failed to parse shell={shell}");
        }
    }

    #[test]
    fn test_expand_env_is_opt_in() {
        let cli = Cli::try_parse_from(["iceflow", "show", "exp.yaml"]).unwrap();
        assert!(!cli.expand_env);

        let cli = Cli::try_parse_from(["iceflow", "show", "exp.yaml", "--expand-env"]).unwrap();
        assert!(cli.expand_env);
    }

    #[test]
    fn test_verbose_count_and_quiet() {
        let cli = Cli::try_parse_from(["iceflow", "-vvv", "--quiet", "version"]).unwrap();
        assert_eq!(cli.verbose, 3);
        assert!(cli.quiet);
    }
}
