// Library surface shared by the `postedit` binary and integration tests.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod diff;
pub mod effort;
pub mod error;
pub mod export;
pub mod metrics;
pub mod segments;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod tracker;
pub mod util;
pub mod workbench;

pub use error::{Error, Result};
pub use snapshot::{SnapshotError, TrackerSnapshot};
pub use tracker::{EditingSession, IdleNotice, SegmentTimeTracker, IDLE_THRESHOLD_SECS};
