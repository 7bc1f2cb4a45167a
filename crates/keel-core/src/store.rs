use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::MigrationError;
use crate::lock::{LockOwner, LockRecord};
use crate::migration::{AppliedMigration, Direction, MigrationRecord, Version};

/// Enumerates and creates migration definitions.
pub trait MigrationSource {
    /// All definitions, ascending by version. A pure read.
    fn list_available(&self) -> Result<Vec<MigrationRecord>, MigrationError>;

    /// Write an empty definition with the next version and return its filename.
    fn generate(&self, name: &str, created_at: DateTime<Utc>) -> Result<String, MigrationError>;
}

/// Persists the applied history and the migration lock.
///
/// The store does not know about ordering rules; the engine only ever calls
/// `mark_applied` / `mark_unapplied` right after the matching script succeeded.
pub trait StateStore {
    /// Applied history, ascending by version.
    fn applied(&self) -> Result<Vec<AppliedMigration>, MigrationError>;

    fn applied_versions(&self) -> Result<Vec<Version>, MigrationError> {
        Ok(self.applied()?.into_iter().map(|m| m.version).collect())
    }

    /// Highest applied version, if any.
    fn current_version(&self) -> Result<Option<Version>, MigrationError> {
        Ok(self.applied_versions()?.into_iter().max())
    }

    fn mark_applied(
        &self,
        version: Version,
        name: &str,
        applied_at: DateTime<Utc>,
    ) -> Result<(), MigrationError>;

    fn mark_unapplied(&self, version: Version) -> Result<(), MigrationError>;

    /// Take the lock if the slot is empty, otherwise fail with
    /// [`MigrationError::MigrationInProgress`].
    fn acquire_lock(
        &self,
        owner: &LockOwner,
        operation: Direction,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<LockRecord, MigrationError>;

    /// Release a lock held by `owner`. An empty slot is not an error.
    fn release_lock(&self, owner: &LockOwner) -> Result<(), MigrationError>;

    fn read_lock(&self) -> Result<Option<LockRecord>, MigrationError>;

    /// Remove whatever lock is present. Operator recovery only.
    fn clear_lock(&self) -> Result<Option<LockRecord>, MigrationError>;
}
