use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use keel_core::{
    AppliedMigration, Direction, LockOwner, LockRecord, MigrationError, StateStore, Version,
};

use crate::lock_conflict;

#[derive(Debug, Default)]
struct MemoryState {
    applied: Vec<AppliedMigration>,
    lock: Option<LockRecord>,
}

/// Process-local state store. Clones share state, so two engines built from
/// clones of one store contend for the same lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StateStore for MemoryStateStore {
    fn applied(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        Ok(self.state().applied.clone())
    }

    fn mark_applied(
        &self,
        version: Version,
        name: &str,
        applied_at: DateTime<Utc>,
    ) -> Result<(), MigrationError> {
        let mut state = self.state();
        if state.applied.iter().any(|m| m.version == version) {
            return Err(MigrationError::DuplicateApplication(version));
        }
        state.applied.push(AppliedMigration {
            version,
            name: name.to_string(),
            applied_at,
        });
        state.applied.sort_by_key(|m| m.version);
        Ok(())
    }

    fn mark_unapplied(&self, version: Version) -> Result<(), MigrationError> {
        let mut state = self.state();
        let index = state
            .applied
            .iter()
            .position(|m| m.version == version)
            .ok_or(MigrationError::NotApplied(version))?;
        state.applied.remove(index);
        Ok(())
    }

    fn acquire_lock(
        &self,
        owner: &LockOwner,
        operation: Direction,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<LockRecord, MigrationError> {
        let mut state = self.state();
        if let Some(existing) = &state.lock {
            return Err(lock_conflict(existing.clone(), now, stale_after));
        }
        let record = LockRecord::new(owner.clone(), operation, now);
        state.lock = Some(record.clone());
        Ok(record)
    }

    fn release_lock(&self, owner: &LockOwner) -> Result<(), MigrationError> {
        let mut state = self.state();
        if let Some(lock) = &state.lock {
            if lock.owner != *owner {
                return Err(MigrationError::InconsistentState(format!(
                    "migration lock is held by {}, not by {}",
                    lock.owner, owner
                )));
            }
        }
        state.lock = None;
        Ok(())
    }

    fn read_lock(&self) -> Result<Option<LockRecord>, MigrationError> {
        Ok(self.state().lock.clone())
    }

    fn clear_lock(&self) -> Result<Option<LockRecord>, MigrationError> {
        Ok(self.state().lock.take())
    }
}
