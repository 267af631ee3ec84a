//! One catalog refresh cycle
//!
//! A cycle lists the catalog, keeps the public names, fetches each one's tags
//! and publishes the result as a new [`Snapshot`]. A failed catalog call aborts
//! the cycle and leaves the current snapshot alone. A failed tag call only
//! drops that repository from the new snapshot.

use crate::catalog::clock::{Clock, SystemClock};
use crate::catalog::snapshot::{RepositoryInfo, Snapshot, SnapshotPublisher, SnapshotReader};
use crate::config::{DEFAULT_TAG_FETCH_CONCURRENCY, ListerConfig};
use crate::error::{RegistryError, RegistryResult};
use crate::logging::Logger;
use crate::registry::client::CatalogSource;
use crate::registry::scope::ScopeFilter;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A repository left out of a snapshot because its tag fetch failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRepository {
    pub name: String,
    pub error: RegistryError,
}

/// Outcome of a cycle that reached the publish step
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub snapshot: Arc<Snapshot>,
    pub catalog_size: usize,
    pub public_count: usize,
    pub skipped: Vec<SkippedRepository>,
    pub elapsed: Duration,
}

pub struct CatalogRefresher {
    source: Arc<dyn CatalogSource>,
    filter: ScopeFilter,
    publisher: SnapshotPublisher,
    clock: Arc<dyn Clock>,
    concurrency: usize,
    output: Logger,
}

impl CatalogRefresher {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        filter: ScopeFilter,
        publisher: SnapshotPublisher,
    ) -> Self {
        Self {
            source,
            filter,
            publisher,
            clock: Arc::new(SystemClock),
            concurrency: DEFAULT_TAG_FETCH_CONCURRENCY,
            output: Logger::default(),
        }
    }

    pub fn from_config(
        config: &ListerConfig,
        source: Arc<dyn CatalogSource>,
        publisher: SnapshotPublisher,
    ) -> Self {
        Self::new(
            source,
            ScopeFilter::new(config.public_prefixes.clone()),
            publisher,
        )
        .with_concurrency(config.tag_fetch_concurrency)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_output(mut self, output: Logger) -> Self {
        self.output = output;
        self
    }

    pub fn reader(&self) -> SnapshotReader {
        self.publisher.subscribe()
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.publisher.current()
    }

    /// Run one cycle to completion
    pub async fn refresh(&self) -> RegistryResult<RefreshReport> {
        let started = Instant::now();

        let catalog = self.source.fetch_catalog().await.map_err(|e| {
            self.output.error(&format!(
                "Catalog refresh aborted, keeping previous snapshot: {}",
                e
            ));
            e
        })?;
        let catalog_size = catalog.len();

        let public: Vec<String> = catalog
            .into_iter()
            .filter(|name| self.filter.is_repository_public(name))
            .collect();
        let public_count = public.len();
        self.output.verbose(&format!(
            "{} of {} repositories are public",
            public_count, catalog_size
        ));

        let (repositories, skipped) = self.fetch_all_tags(public).await;

        let snapshot = self
            .publisher
            .publish(Snapshot::new(repositories, self.clock.now()));

        Ok(RefreshReport {
            snapshot,
            catalog_size,
            public_count,
            skipped,
            elapsed: started.elapsed(),
        })
    }

    /// Fetch tags with bounded concurrency, keeping catalog order
    async fn fetch_all_tags(
        &self,
        names: Vec<String>,
    ) -> (Vec<RepositoryInfo>, Vec<SkippedRepository>) {
        let source = &self.source;
        let results: Vec<(String, RegistryResult<RepositoryInfo>)> = stream::iter(names)
            .map(move |name| async move {
                let result = source.fetch_tags(&name).await;
                (name, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut repositories = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for (name, result) in results {
            match result {
                Ok(info) => repositories.push(info),
                Err(error) => {
                    self.output.warning(&format!(
                        "Skipping repository {}: {}",
                        name, error
                    ));
                    skipped.push(SkippedRepository { name, error });
                }
            }
        }

        (repositories, skipped)
    }
}
