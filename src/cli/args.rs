//! Command-line argument parsing

use crate::config::{ListerConfig, ListerConfigFile};
use crate::error::{ListerError, Result};
use clap::Parser;
use std::path::Path;
use std::time::Duration;

pub const TOKEN_ENV: &str = "REGISTRY_LISTER_TOKEN";
pub const USERNAME_ENV: &str = "REGISTRY_LISTER_USERNAME";
pub const PASSWORD_ENV: &str = "REGISTRY_LISTER_PASSWORD";

#[derive(Parser, Debug, Clone)]
#[command(name = "registry-lister")]
#[command(about = "Periodically list the public repositories and tags of a Docker registry")]
#[command(version, author)]
pub struct Args {
    /// Registry base URL
    #[arg(long = "registry-host", help = "The URL of the registry being listed")]
    pub registry_host: Option<String>,

    #[arg(
        long = "refresh-interval",
        help = "Seconds between registry refreshes [default: 60]"
    )]
    pub refresh_interval: Option<u64>,

    #[arg(
        long = "public-prefix",
        short = 'P',
        help = "Repository name prefix that may be listed publicly (repeatable)"
    )]
    pub public_prefixes: Vec<String>,

    #[arg(
        long = "pull-hostname",
        help = "Hostname to show on listings, defaults to the request hostname"
    )]
    pub pull_hostname: Option<String>,

    #[arg(long = "token", help = "Pre-issued bearer token used for every call")]
    pub token: Option<String>,

    #[arg(
        long = "username",
        short = 'u',
        help = "Username for the registry token service"
    )]
    pub username: Option<String>,

    #[arg(
        long = "password",
        short = 'p',
        help = "Password for the registry token service"
    )]
    pub password: Option<String>,

    #[arg(
        long = "timeout",
        short = 't',
        help = "Timeout for each registry request in seconds [default: 30]"
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "concurrency",
        short = 'j',
        help = "Maximum tag listings in flight per refresh [default: 4]"
    )]
    pub concurrency: Option<usize>,

    #[arg(long = "skip-tls", short = 'k', help = "Skip TLS certificate verification")]
    pub skip_tls: bool,

    #[arg(long = "config", help = "Path to a JSON configuration file")]
    pub config: Option<String>,

    #[arg(long = "once", help = "Run a single refresh, print the listing and exit")]
    pub once: bool,

    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long = "quiet", short = 'q', help = "Only print warnings and errors")]
    pub quiet: bool,

    #[arg(
        long = "log",
        default_value = "info",
        help = "Log filter used when RUST_LOG is unset"
    )]
    pub log: String,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse().from_env()
    }

    /// Fill credentials from the environment when not given on the command line
    pub fn from_env(mut self) -> Self {
        if self.token.is_none() {
            self.token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());
        }

        if self.username.is_none() {
            self.username = std::env::var(USERNAME_ENV).ok();
        }

        if self.password.is_none() {
            self.password = std::env::var(PASSWORD_ENV).ok();
        }

        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.verbose && self.quiet {
            return Err(ListerError::Config(
                "--verbose and --quiet cannot be used together".to_string(),
            ));
        }

        if self.token.is_some() && self.username.is_some() {
            return Err(ListerError::Config(
                "Use either --token or --username/--password, not both".to_string(),
            ));
        }

        if self.password.is_some() && self.username.is_none() {
            return Err(ListerError::Config(
                "--password requires --username".to_string(),
            ));
        }

        Ok(())
    }

    /// Defaults, then the config file, then command-line flags
    pub fn to_config(&self) -> Result<ListerConfig> {
        let mut config = ListerConfig::default();

        if let Some(path) = &self.config {
            config = config.merge_file(ListerConfigFile::from_file(Path::new(path))?)?;
        }

        if let Some(host) = &self.registry_host {
            config = ListerConfig {
                registry_url: url::Url::parse(host)?,
                ..config
            };
        }
        if let Some(secs) = self.refresh_interval {
            config = config.with_refresh_interval(Duration::from_secs(secs));
        }
        if !self.public_prefixes.is_empty() {
            config = config.with_public_prefixes(self.public_prefixes.iter().cloned());
        }
        if self.pull_hostname.is_some() {
            config = config.with_pull_hostname(self.pull_hostname.clone());
        }
        if let Some(secs) = self.timeout {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(concurrency) = self.concurrency {
            config = config.with_tag_fetch_concurrency(concurrency);
        }
        if self.skip_tls {
            config = config.with_skip_tls(true);
        }

        config.validate()?;
        Ok(config)
    }
}
