//! CLI command definitions using clap
//!
//! Defines all CLI subcommands and their arguments.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Run Makefile targets through a validated, time-bounded gate.
///
/// Serves one Makefile to an MCP client over stdio, or lists and runs its
/// targets directly from the command line.
#[derive(Parser, Debug)]
#[command(name = "makegate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (overrides default XDG paths)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log output format (logs always go to stderr)
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Makefile to serve, relative to the working directory
    #[arg(long, global = true)]
    pub make_path: Option<PathBuf>,

    /// Build tool to invoke instead of `make`
    #[arg(long, global = true)]
    pub make_command: Option<String>,

    /// Directory make runs in (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    pub working_dir: Option<PathBuf>,

    /// Boundary no path may escape (defaults to the working directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start MCP server over stdio
    Mcp,

    /// List targets defined in the makefile
    List(ListArgs),

    /// Run one target through the gate
    Run(RunArgs),

    /// Print the makefile being served
    Show,
}

/// Log formatter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

/// Arguments for the `list` subcommand
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Glob matched against the full target name (e.g., "test*")
    pub pattern: Option<String>,

    /// Only show targets with a `##` description
    #[arg(short, long)]
    pub documented: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Output format options for `list`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON output
    Json,
    /// Plain text (one target per line)
    Plain,
}

/// Arguments for the `run` subcommand
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Target name to run (e.g., build, test)
    #[arg(required = true)]
    pub target: String,

    /// Timeout in seconds (1 to 3600, defaults to the configured timeout)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: RunFormat,
}

/// Output format options for `run`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunFormat {
    /// Target output followed by a status line
    Text,
    /// The same JSON object the MCP tool returns
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_mcp() {
        let cli = Cli::parse_from(["makegate", "mcp"]);
        assert!(matches!(cli.command, Commands::Mcp));
        assert!(!cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_cli_parse_run_simple() {
        let cli = Cli::parse_from(["makegate", "run", "build"]);
        if let Commands::Run(args) = cli.command {
            assert_eq!(args.target, "build");
            assert!(args.timeout.is_none());
            assert_eq!(args.format, RunFormat::Text);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_run_with_timeout() {
        let cli = Cli::parse_from(["makegate", "run", "test", "-t", "30", "-f", "json"]);
        if let Commands::Run(args) = cli.command {
            assert_eq!(args.target, "test");
            assert_eq!(args.timeout, Some(30));
            assert_eq!(args.format, RunFormat::Json);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_list() {
        let cli = Cli::parse_from(["makegate", "list"]);
        if let Commands::List(args) = cli.command {
            assert!(args.pattern.is_none());
            assert!(!args.documented);
            assert_eq!(args.format, OutputFormat::Table);
        } else {
            panic!("Expected List command");
        }
    }

    #[test]
    fn test_cli_parse_list_filtered() {
        let cli = Cli::parse_from(["makegate", "list", "test*", "--documented", "-f", "plain"]);
        if let Commands::List(args) = cli.command {
            assert_eq!(args.pattern.as_deref(), Some("test*"));
            assert!(args.documented);
            assert_eq!(args.format, OutputFormat::Plain);
        } else {
            panic!("Expected List command");
        }
    }

    #[test]
    fn test_cli_parse_show() {
        let cli = Cli::parse_from(["makegate", "show"]);
        assert!(matches!(cli.command, Commands::Show));
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "makegate",
            "-v",
            "--log-format",
            "json",
            "-c",
            "/path/to/config.toml",
            "--make-path",
            "build/project.mk",
            "--make-command",
            "gmake",
            "-C",
            "/srv/project",
            "--root",
            "/srv",
            "mcp",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
        assert_eq!(cli.make_path, Some(PathBuf::from("build/project.mk")));
        assert_eq!(cli.make_command.as_deref(), Some("gmake"));
        assert_eq!(cli.working_dir, Some(PathBuf::from("/srv/project")));
        assert_eq!(cli.root, Some(PathBuf::from("/srv")));
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["makegate", "list", "-C", "/srv/project"]);
        assert_eq!(cli.working_dir, Some(PathBuf::from("/srv/project")));
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["makegate", "list", "-f", "yaml"]).is_err());
        assert!(Cli::try_parse_from(["makegate", "run"]).is_err());
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }
}
