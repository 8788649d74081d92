use thiserror::Error;

use crate::segments::SegmentLoadError;
use crate::snapshot::SnapshotError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Segments(#[from] SegmentLoadError),

    #[error("no stored progress for {name} {surname}")]
    UnknownUser { name: String, surname: String },
}

pub type Result<T> = std::result::Result<T, Error>;
