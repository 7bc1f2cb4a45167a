pub mod file;
pub mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use std::time::Duration;

use chrono::{DateTime, Utc};
use keel_core::{LockRecord, MigrationError};

/// The error returned when the lock slot is already taken.
pub(crate) fn lock_conflict(
    existing: LockRecord,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> MigrationError {
    let stale = existing.is_stale(now, stale_after);
    MigrationError::MigrationInProgress {
        lock: existing,
        stale,
    }
}
