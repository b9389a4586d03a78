//! CLI argument definitions using clap derive

use crate::adapter::Method;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Offline worker - versioned, content-addressed caching for web apps
///
/// Installs application versions from a manifest into local caches and
/// serves requests from them.
#[derive(Parser, Debug)]
#[command(name = "offline-worker")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "OFFLINE_WORKER_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the groups, routes and rules a manifest declares
    Inspect(InspectArgs),

    /// Compare two manifests group by group
    Diff(DiffArgs),

    /// Fetch the manifest from the origin and install its version
    Install(TargetArgs),

    /// Promote the installed version to active
    Activate(TargetArgs),

    /// Serve requests through the active version
    Fetch(FetchArgs),

    /// Show installed versions and caches on disk
    Status(StatusArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Where the worker talks to and stores caches
#[derive(Args, Debug, Default, Clone)]
pub struct TargetArgs {
    /// Origin base URL (overrides worker.origin)
    #[arg(long)]
    pub origin: Option<String>,

    /// Cache directory (overrides cache.dir)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
}

/// Arguments for the inspect command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Manifest file
    pub manifest: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the diff command
#[derive(Parser, Debug)]
pub struct DiffArgs {
    /// Manifest being installed
    pub current: PathBuf,

    /// Manifest currently active (omit for a fresh install)
    pub previous: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Request URLs, origin-relative
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET", value_parser = parse_method)]
    pub method: Method,

    /// Print response headers
    #[arg(short, long)]
    pub include: bool,

    #[command(flatten)]
    pub target: TargetArgs,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub target: TargetArgs,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for reporting commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// Parse an HTTP method name, case-insensitively
fn parse_method(s: &str) -> Result<Method, String> {
    Method::parse(s).ok_or_else(|| format!("unsupported HTTP method '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_method_any_case() {
        assert_eq!(parse_method("get").unwrap(), Method::Get);
        assert_eq!(parse_method("PATCH").unwrap(), Method::Patch);
        assert!(parse_method("BREW").is_err());
    }

    #[test]
    fn cli_parses_inspect() {
        let cli = Cli::parse_from(["offline-worker", "inspect", "ngsw.json", "-f", "json"]);
        match cli.command {
            Commands::Inspect(args) => {
                assert_eq!(args.manifest, PathBuf::from("ngsw.json"));
                assert_eq!(args.format, OutputFormat::Json);
            }
            _ => panic!("expected Inspect command"),
        }
    }

    #[test]
    fn cli_parses_diff_without_previous() {
        let cli = Cli::parse_from(["offline-worker", "diff", "new.json"]);
        match cli.command {
            Commands::Diff(args) => {
                assert!(args.previous.is_none());
                assert_eq!(args.format, OutputFormat::Text);
            }
            _ => panic!("expected Diff command"),
        }
    }

    #[test]
    fn cli_parses_fetch() {
        let cli = Cli::parse_from([
            "offline-worker",
            "fetch",
            "-X",
            "POST",
            "--origin",
            "http://127.0.0.1:9000",
            "/api/users",
            "/api/items",
        ]);
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.method, Method::Post);
                assert_eq!(args.urls, vec!["/api/users", "/api/items"]);
                assert_eq!(args.target.origin.as_deref(), Some("http://127.0.0.1:9000"));
            }
            _ => panic!("expected Fetch command"),
        }
    }

    #[test]
    fn cli_fetch_requires_url() {
        assert!(Cli::try_parse_from(["offline-worker", "fetch"]).is_err());
    }

    #[test]
    fn cli_parses_install_target() {
        let cli = Cli::parse_from(["offline-worker", "install", "--cache-dir", "/tmp/c"]);
        match cli.command {
            Commands::Install(args) => assert_eq!(args.cache_dir, Some(PathBuf::from("/tmp/c"))),
            _ => panic!("expected Install command"),
        }
    }

    #[test]
    fn cli_verbose_levels() {
        let cli = Cli::parse_from(["offline-worker", "activate"]);
        assert_eq!(cli.verbose, 0);

        let cli = Cli::parse_from(["offline-worker", "-v", "activate"]);
        assert_eq!(cli.verbose, 1);

        let cli = Cli::parse_from(["offline-worker", "-vv", "activate"]);
        assert_eq!(cli.verbose, 2);
    }
}
