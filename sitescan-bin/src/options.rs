use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Error, Result};
use clap::Parser;
use serde::Deserialize;
use sitescan_lib::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};

/// Default configuration file, loaded from the working directory when
/// present
pub(crate) const SITESCAN_CONFIG_FILE: &str = "sitescan.toml";

const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_MAX_RETRIES: u64 = 0;

/// Output format of the final report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Format {
    /// Human-readable summary
    #[default]
    Compact,
    /// Machine-readable report
    Json,
}

// Macro for generating default functions to be used by serde
macro_rules! default_function {
    ( $( $name:ident : $T:ty = $e:expr; )* ) => {
        $(
            fn $name() -> $T {
                $e
            }
        )*
    };
}

// Generate the functions for serde defaults
default_function! {
    batch_size: usize = DEFAULT_BATCH_SIZE;
    max_redirects: usize = DEFAULT_MAX_REDIRECTS;
    retries: u64 = DEFAULT_MAX_RETRIES;
    user_agent: String = DEFAULT_USER_AGENT.to_string();
    timeout: usize = DEFAULT_TIMEOUT;
    cache_ttl: u64 = DEFAULT_CACHE_TTL_SECS;
}

// Macro for merging configuration values
macro_rules! fold_in {
    ( $cli:ident , $toml:ident ; $( $key:ident : $default:expr; )* ) => {
        $(
            if $cli.$key == $default && $toml.$key != $default {
                $cli.$key = $toml.$key;
            }
        )*
    };
}

#[derive(Debug, Parser)]
#[command(
    name = "sitescan",
    version,
    about = "Find broken links on rendered pages and whole sites"
)]
pub(crate) struct SitescanOptions {
    /// The page to scan, or the site root when `--site` is given
    pub(crate) url: String,

    /// Configuration file to use
    #[arg(short, long = "config", default_value = SITESCAN_CONFIG_FILE)]
    pub(crate) config_file: PathBuf,

    #[command(flatten)]
    pub(crate) config: Config,
}

#[derive(Debug, Clone, Deserialize, Parser)]
pub(crate) struct Config {
    /// Scan the whole site, seeded from its sitemap.xml
    #[arg(short, long)]
    #[serde(default)]
    pub(crate) site: bool,

    /// Verbose program output
    #[arg(short, long)]
    #[serde(default)]
    pub(crate) verbose: bool,

    /// Do not show a progress bar while scanning.
    /// This is recommended for non-interactive shells (e.g. for
    /// continuous integration)
    #[arg(long)]
    #[serde(default)]
    pub(crate) no_progress: bool,

    /// Number of link validations dispatched per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    #[serde(default = "batch_size")]
    pub(crate) batch_size: usize,

    /// Maximum number of allowed redirects when following links
    #[arg(long, default_value_t = DEFAULT_MAX_REDIRECTS)]
    #[serde(default = "max_redirects")]
    pub(crate) max_redirects: usize,

    /// Number of retries for transient link-check failures
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    #[serde(default = "retries")]
    pub(crate) retries: u64,

    /// User agent
    #[arg(short, long, default_value = DEFAULT_USER_AGENT)]
    #[serde(default = "user_agent")]
    pub(crate) user_agent: String,

    /// Proceed for server connections considered insecure (invalid TLS)
    #[arg(short, long)]
    #[serde(default)]
    pub(crate) insecure: bool,

    /// Custom request headers, e.g. `accept=text/html`
    #[arg(long = "header")]
    #[serde(default)]
    pub(crate) headers: Vec<String>,

    /// Exclude URLs from checking (supports regex)
    #[arg(long)]
    #[serde(default)]
    pub(crate) exclude: Vec<String>,

    /// URLs to check (supports regex). Has preference over all excludes
    #[arg(long)]
    #[serde(default)]
    pub(crate) include: Vec<String>,

    /// Comma-separated list of accepted status codes for valid links
    #[arg(short, long)]
    #[serde(default)]
    pub(crate) accept: Option<String>,

    /// Website timeout from connect to response finished, in seconds
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT)]
    #[serde(default = "timeout")]
    pub(crate) timeout: usize,

    /// Time-to-live for cached link statuses, in seconds
    #[arg(long, default_value_t = DEFAULT_CACHE_TTL_SECS)]
    #[serde(default = "cache_ttl")]
    pub(crate) cache_ttl: u64,

    /// Output format of the final report
    #[arg(short, long, value_enum, default_value = "compact")]
    #[serde(default)]
    pub(crate) format: Format,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    #[serde(default)]
    pub(crate) output: Option<PathBuf>,

    /// Export broken links as CSV.
    /// Defaults to `broken-links-{date}.csv` when no path is given
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    #[serde(default)]
    pub(crate) export_csv: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    /// A missing file is not an error; anything else is.
    pub(crate) fn load_from_file(path: &Path) -> Result<Option<Config>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                return match e.kind() {
                    ErrorKind::NotFound => Ok(None),
                    _ => Err(Error::from(e)),
                }
            }
        };
        Ok(Some(toml::from_str(&contents)?))
    }

    /// Merge the configuration from TOML into the CLI configuration
    pub(crate) fn merge(&mut self, toml: Config) {
        fold_in! {
            // Destination and source configs
            self, toml;

            // Keys with defaults to assign
            site: false;
            verbose: false;
            no_progress: false;
            batch_size: DEFAULT_BATCH_SIZE;
            max_redirects: DEFAULT_MAX_REDIRECTS;
            retries: DEFAULT_MAX_RETRIES;
            user_agent: DEFAULT_USER_AGENT;
            insecure: false;
            headers: Vec::<String>::new();
            exclude: Vec::<String>::new();
            include: Vec::<String>::new();
            accept: None;
            timeout: DEFAULT_TIMEOUT;
            cache_ttl: DEFAULT_CACHE_TTL_SECS;
            format: Format::Compact;
            output: None;
            export_csv: None;
        }
    }
}
