//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// bundlegate - versioned web bundle cache with integrity-checked origin fallback
///
/// Resolves the current resource bundle version, serves bundle files from a
/// local cache, and fetches misses from the origin after verifying them
/// against the published hash manifest.
#[derive(Parser, Debug)]
#[command(name = "bundlegate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BUNDLEGATE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Query the version API and activate the returned namespace
    Resolve(ResolveArgs),

    /// Serve one resource path through the cache
    Get(GetArgs),

    /// Inspect or clear the resource cache
    Cache(CacheArgs),

    /// Inspect or clear cached hash manifests
    Hashes(HashesArgs),

    /// Show active namespace, persisted manifest and cache usage
    Status(StatusArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Resource path, e.g. /build/main.js
    pub path: String,

    /// Query string forwarded to the origin
    #[arg(short, long)]
    pub query: Option<String>,

    /// Write the response body to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Use the persisted manifest instead of querying the version API
    #[arg(long)]
    pub offline: bool,

    /// Output format for response metadata
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached namespaces
    List {
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show total cache size
    Size,

    /// Remove one namespace and its hash manifest
    Evict {
        /// Namespace to remove, e.g. h5/v1
        namespace: String,
    },

    /// Remove every namespace, hash manifest and the persisted manifest
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Parser, Debug)]
pub struct HashesArgs {
    #[command(subcommand)]
    pub action: HashesAction,
}

#[derive(Subcommand, Debug)]
pub enum HashesAction {
    /// Load and summarize a namespace's hash manifest
    Show {
        /// Namespace; defaults to the active one
        namespace: Option<String>,

        /// Number of sample records to print
        #[arg(short, long, default_value = "5")]
        sample: usize,
    },

    /// Drop both hash manifest tiers
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Dotted key, e.g. origin.base_url
        key: String,

        value: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Plain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_get() {
        let cli = Cli::parse_from([
            "bundlegate",
            "get",
            "/build/main.js",
            "--query",
            "v=2",
            "-o",
            "out.js",
        ]);
        match cli.command {
            Commands::Get(args) => {
                assert_eq!(args.path, "/build/main.js");
                assert_eq!(args.query.as_deref(), Some("v=2"));
                assert_eq!(args.output, Some(PathBuf::from("out.js")));
                assert!(!args.offline);
                assert_eq!(args.format, OutputFormat::Table);
            }
            _ => panic!("expected Get command"),
        }
    }

    #[test]
    fn parse_cache_list_json() {
        let cli = Cli::parse_from(["bundlegate", "cache", "list", "--format", "json"]);
        match cli.command {
            Commands::Cache(CacheArgs {
                action: CacheAction::List { format },
            }) => assert_eq!(format, OutputFormat::Json),
            _ => panic!("expected cache list"),
        }
    }

    #[test]
    fn parse_hashes_show_defaults() {
        let cli = Cli::parse_from(["bundlegate", "hashes", "show"]);
        match cli.command {
            Commands::Hashes(HashesArgs {
                action: HashesAction::Show { namespace, sample },
            }) => {
                assert!(namespace.is_none());
                assert_eq!(sample, 5);
            }
            _ => panic!("expected hashes show"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["bundlegate", "-vv", "--config", "/tmp/b.toml", "status"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/b.toml")));
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn parse_config_set() {
        let cli = Cli::parse_from(["bundlegate", "config", "set", "cache.worker_threads", "8"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                action: Some(ConfigAction::Set { key, value }),
            }) => {
                assert_eq!(key, "cache.worker_threads");
                assert_eq!(value, "8");
            }
            _ => panic!("expected config set"),
        }
    }
}
