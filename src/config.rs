//! Configuration for the catalog lister
//!
//! [`ListerConfig`] is built once at startup and shared immutably for the life
//! of the process. [`ListerConfigFile`] is the on-disk JSON form; every field
//! is optional so a file only needs to name what it overrides.

use crate::error::{ListerError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:8080";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TAG_FETCH_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct ListerConfig {
    pub registry_url: Url,
    pub refresh_interval: Duration,
    pub public_prefixes: Vec<String>,
    pub pull_hostname: Option<String>,
    pub request_timeout: Duration,
    pub tag_fetch_concurrency: usize,
    pub skip_tls: bool,
}

impl Default for ListerConfig {
    fn default() -> Self {
        Self {
            registry_url: Url::parse(DEFAULT_REGISTRY_URL).expect("default registry URL is valid"),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            public_prefixes: Vec::new(),
            pull_hostname: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            tag_fetch_concurrency: DEFAULT_TAG_FETCH_CONCURRENCY,
            skip_tls: false,
        }
    }
}

impl ListerConfig {
    pub fn new(registry_url: &str) -> Result<Self> {
        Ok(Self {
            registry_url: Url::parse(registry_url)?,
            ..Self::default()
        })
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_public_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pull_hostname(mut self, hostname: Option<String>) -> Self {
        self.pull_hostname = hostname;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_tag_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.tag_fetch_concurrency = concurrency;
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    /// Overlay the fields a config file sets
    pub fn merge_file(mut self, file: ListerConfigFile) -> Result<Self> {
        if let Some(url) = file.registry_url {
            self.registry_url = Url::parse(&url)?;
        }
        if let Some(secs) = file.refresh_interval_secs {
            self.refresh_interval = Duration::from_secs(secs);
        }
        if let Some(prefixes) = file.public_prefixes {
            self.public_prefixes = prefixes;
        }
        if file.pull_hostname.is_some() {
            self.pull_hostname = file.pull_hostname;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(concurrency) = file.tag_fetch_concurrency {
            self.tag_fetch_concurrency = concurrency;
        }
        if let Some(skip_tls) = file.skip_tls {
            self.skip_tls = skip_tls;
        }
        Ok(self)
    }

    /// Registry base URL without a trailing slash, ready for path joins
    pub fn base_address(&self) -> String {
        self.registry_url.as_str().trim_end_matches('/').to_string()
    }

    pub fn validate(&self) -> Result<()> {
        match self.registry_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ListerError::Config(format!(
                    "Registry URL must use http or https, got {}",
                    other
                )));
            }
        }

        if self.refresh_interval.is_zero() {
            return Err(ListerError::Config(
                "Refresh interval must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ListerError::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.tag_fetch_concurrency == 0 {
            return Err(ListerError::Config(
                "Tag fetch concurrency must be greater than 0".to_string(),
            ));
        }

        // An empty prefix would match every repository.
        if self.public_prefixes.iter().any(|p| p.is_empty()) {
            return Err(ListerError::Config(
                "Public prefixes must not be empty strings".to_string(),
            ));
        }

        Ok(())
    }
}

/// On-disk configuration, JSON encoded
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListerConfigFile {
    pub registry_url: Option<String>,
    pub refresh_interval_secs: Option<u64>,
    pub public_prefixes: Option<Vec<String>>,
    pub pull_hostname: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub tag_fetch_concurrency: Option<usize>,
    pub skip_tls: Option<bool>,
}

impl ListerConfigFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}
