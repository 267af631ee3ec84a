//! Logging and console output control
//!
//! This module provides the [`Logger`] used by every component. Level messages
//! (`info`, `warning`, `error`, ...) become `tracing` events so the refresher's
//! failures reach the operator log; headings and listings are written to stdout
//! and suppressed in quiet mode.

use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `default_filter` when it is set. Calling this twice is
/// harmless; the second installation is ignored.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Logger responsible for all operator-visible output
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Option<Instant>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            start_time: Some(Instant::now()),
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            start_time: Some(Instant::now()),
        }
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!("\n=== {} ===", title);
        }
    }

    /// Sub-section heading
    pub fn subsection(&self, title: &str) {
        if !self.quiet {
            println!("\n--- {} ---", title);
        }
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!("{}", message);
    }

    /// Detail that only matters when diagnosing
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            tracing::info!("{}", message);
        } else {
            tracing::debug!("{}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            tracing::info!("{}", message);
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            tracing::info!(outcome = "success", "{}", message);
        }
    }

    /// Warnings are never silenced
    pub fn warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.verbose {
            tracing::debug!("{}", message);
        } else {
            tracing::trace!("{}", message);
        }
    }

    /// Key-value pair summary display
    pub fn summary_kv(&self, title: &str, items: &[(&str, String)]) {
        if !self.quiet {
            self.subsection(title);
            for (key, value) in items {
                println!("  {}: {}", key, value);
            }
        }
    }

    /// Pre-rendered block written verbatim
    pub fn block(&self, text: &str) {
        if !self.quiet {
            println!("{}", text);
        }
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs == 0 {
            format!("{}ms", duration.as_millis())
        } else if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m{}s", secs / 60, secs % 60)
        } else {
            format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }

    /// Time since this logger was created
    pub fn elapsed(&self) -> Duration {
        self.start_time
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }
}
