//! Read model for the listing page
//!
//! [`Lister`] is what request handlers hold. Each call takes one snapshot
//! reference and builds a [`ListingIndex`] from it, so a page never mixes two
//! refreshes. Rendering to HTML belongs to the caller; [`ListingIndex::render_text`]
//! covers the console.

use crate::catalog::snapshot::{Snapshot, SnapshotReader};
use crate::config::ListerConfig;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::sync::Arc;

pub const DEFAULT_TITLE: &str = "Docker Registry";
pub const NO_TAGS: &str = "No Tags";

/// Title shown on the page: configured override, then request host, then a
/// generic fallback.
pub fn display_hostname(pull_hostname: Option<&str>, request_host: Option<&str>) -> String {
    pull_hostname
        .filter(|host| !host.is_empty())
        .or(request_host.filter(|host| !host.is_empty()))
        .unwrap_or(DEFAULT_TITLE)
        .to_string()
}

pub fn tag_print(tags: &[String]) -> String {
    if tags.is_empty() {
        NO_TAGS.to_string()
    } else {
        tags.join(", ")
    }
}

/// Day-month hour:minute in UTC, e.g. `01-03 12:30 UTC`
pub fn display_time(time: DateTime<Utc>) -> String {
    time.format("%d-%m %H:%M UTC").to_string()
}

#[derive(Debug, Clone)]
pub struct ListingIndex {
    pub title: String,
    pub snapshot: Option<Arc<Snapshot>>,
}

impl ListingIndex {
    pub fn last_polled(&self) -> Option<DateTime<Utc>> {
        self.snapshot.as_ref().map(|snapshot| snapshot.produced_at())
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);

        let Some(snapshot) = &self.snapshot else {
            let _ = writeln!(out, "  (catalog not loaded yet)");
            return out;
        };

        if snapshot.is_empty() {
            let _ = writeln!(out, "  (no public repositories)");
        }
        for repo in snapshot.repositories() {
            let _ = writeln!(out, "  {}: {}", repo.name, tag_print(&repo.tags));
        }
        let _ = writeln!(out, "Last polled: {}", display_time(snapshot.produced_at()));
        out
    }
}

#[derive(Debug, Clone)]
pub struct Lister {
    pull_hostname: Option<String>,
    reader: SnapshotReader,
}

impl Lister {
    pub fn new(config: &ListerConfig, reader: SnapshotReader) -> Self {
        Self {
            pull_hostname: config.pull_hostname.clone(),
            reader,
        }
    }

    pub fn title(&self, request_host: Option<&str>) -> String {
        display_hostname(self.pull_hostname.as_deref(), request_host)
    }

    pub fn listing(&self, request_host: Option<&str>) -> ListingIndex {
        ListingIndex {
            title: self.title(request_host),
            snapshot: self.reader.current(),
        }
    }
}
