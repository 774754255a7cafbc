use thiserror::Error;

use crate::miner::{Reading, RejectionReason, StoredReading};

#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    #[error("database is busy")]
    Busy,
    #[error("record not found")]
    NotFound,
    #[error("constraint violated: {0}")]
    Conflict(String),
    #[error("{0}")]
    Other(String)
}

pub trait Database {
    type ReadingHandle;

    /// Appends a reading and its rejection breakdown as one unit: either all
    /// rows are written or none are.
    fn add_reading(&self, reading: &Reading, reasons: &[RejectionReason])
        -> Result<Self::ReadingHandle, DatabaseError>;
    /// Most recent reading of every host, ordered by hostname.
    fn get_latest_readings(&self) -> Result<Vec<StoredReading>, DatabaseError>;
    /// Full history of one host, oldest first.
    fn get_readings(&self, hostname: &str) -> Result<Vec<StoredReading>, DatabaseError>;
    fn count_readings(&self) -> Result<i64, DatabaseError>;
}
