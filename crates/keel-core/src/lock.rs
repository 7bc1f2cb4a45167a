use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::migration::Direction;

/// Identity of a process holding the migration lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    pub id: Uuid,
    pub pid: u32,
}

impl LockOwner {
    /// A fresh identity for the running process.
    pub fn current() -> Self {
        Self {
            id: Uuid::new_v4(),
            pid: std::process::id(),
        }
    }
}

impl fmt::Display for LockOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {} ({})", self.pid, self.id)
    }
}

/// The single-slot marker of an in-flight `up` or `down` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    pub owner: LockOwner,
    pub operation: Direction,
    pub acquired_at: DateTime<Utc>,
}

impl LockRecord {
    pub fn new(owner: LockOwner, operation: Direction, acquired_at: DateTime<Utc>) -> Self {
        Self {
            owner,
            operation,
            acquired_at,
        }
    }

    /// True when the lock has been held longer than `stale_after`.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        let limit = TimeDelta::from_std(stale_after).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(self.acquired_at) > limit
    }
}
