//! Registry Lister Library
//!
//! Periodically discovers the public repositories of a Docker registry, fetches
//! their tags and publishes the result as an immutable snapshot for concurrent
//! readers.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod listing;
pub mod logging;
pub mod registry;

pub use catalog::{CatalogRefresher, Scheduler, Snapshot, SnapshotReader};
pub use config::ListerConfig;
pub use error::{ListerError, RegistryError, Result};
pub use listing::Lister;
