//! Background catalog refresh pipeline
//!
//! [`Scheduler`] drives [`CatalogRefresher`] on a fixed interval; each cycle
//! publishes an immutable [`Snapshot`] that readers obtain through a
//! [`SnapshotReader`].

pub mod clock;
pub mod refresher;
pub mod scheduler;
pub mod snapshot;

pub use clock::{Clock, FixedClock, SystemClock};
pub use refresher::{CatalogRefresher, RefreshReport, SkippedRepository};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerState};
pub use snapshot::{RepositoryInfo, Snapshot, SnapshotPublisher, SnapshotReader, snapshot_channel};
