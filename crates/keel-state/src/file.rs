use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use keel_core::{
    AppliedMigration, Direction, LockOwner, LockRecord, MigrationError, StateStore, Version,
};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::lock_conflict;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateFile {
    #[serde(default)]
    applied: Vec<AppliedMigration>,
}

/// Applied history in a JSON file, lock record in `<state file>.lock`.
///
/// Every write goes to a temp file in the same directory and is renamed into
/// place, so readers never see a half-written file. The lock is published
/// with a no-clobber rename: of two racing processes exactly one succeeds.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl FileStateStore {
    pub fn new(state_path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            lock_path: lock_path.into(),
        }
    }

    /// Store with the lock next to the state file.
    pub fn at(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let mut lock = state_path.as_os_str().to_owned();
        lock.push(".lock");
        Self::new(state_path, PathBuf::from(lock))
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn read_state(&self) -> Result<StateFile, MigrationError> {
        if !self.state_path.exists() {
            return Ok(StateFile::default());
        }
        let content = fs::read_to_string(&self.state_path)
            .map_err(|e| MigrationError::storage("read state file", e))?;
        serde_json::from_str(&content).map_err(|e| {
            MigrationError::storage(
                format!("parse state file {}", self.state_path.display()),
                e,
            )
        })
    }

    fn write_state(&self, state: &StateFile) -> Result<(), MigrationError> {
        let text = serde_json::to_string_pretty(state)
            .map_err(|e| MigrationError::storage("serialize state", e))?;
        let temp = temp_file_beside(&self.state_path, &text)?;
        temp.persist(&self.state_path)
            .map_err(|e| MigrationError::storage("replace state file", e.error))?;
        Ok(())
    }
}

/// Fully written temp file in the same directory as `target`, ready to be renamed.
fn temp_file_beside(target: &Path, text: &str) -> Result<NamedTempFile, MigrationError> {
    let dir = parent_dir(target);
    fs::create_dir_all(dir).map_err(|e| MigrationError::storage("create state directory", e))?;

    let mut temp =
        NamedTempFile::new_in(dir).map_err(|e| MigrationError::storage("create temp file", e))?;
    temp.write_all(text.as_bytes())
        .map_err(|e| MigrationError::storage("write temp file", e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| MigrationError::storage("sync temp file", e))?;
    Ok(temp)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

impl StateStore for FileStateStore {
    fn applied(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        let mut applied = self.read_state()?.applied;
        applied.sort_by_key(|m| m.version);
        Ok(applied)
    }

    fn mark_applied(
        &self,
        version: Version,
        name: &str,
        applied_at: DateTime<Utc>,
    ) -> Result<(), MigrationError> {
        let mut state = self.read_state()?;
        if state.applied.iter().any(|m| m.version == version) {
            return Err(MigrationError::DuplicateApplication(version));
        }
        state.applied.push(AppliedMigration {
            version,
            name: name.to_string(),
            applied_at,
        });
        state.applied.sort_by_key(|m| m.version);
        self.write_state(&state)?;
        debug!(version, "marked applied");
        Ok(())
    }

    fn mark_unapplied(&self, version: Version) -> Result<(), MigrationError> {
        let mut state = self.read_state()?;
        let index = state
            .applied
            .iter()
            .position(|m| m.version == version)
            .ok_or(MigrationError::NotApplied(version))?;
        state.applied.remove(index);
        self.write_state(&state)?;
        debug!(version, "marked unapplied");
        Ok(())
    }

    fn acquire_lock(
        &self,
        owner: &LockOwner,
        operation: Direction,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<LockRecord, MigrationError> {
        let record = LockRecord::new(owner.clone(), operation, now);
        let text = serde_json::to_string_pretty(&record)
            .map_err(|e| MigrationError::storage("serialize lock", e))?;
        let temp = temp_file_beside(&self.lock_path, &text)?;

        match temp.persist_noclobber(&self.lock_path) {
            Ok(_) => {
                debug!(owner = %owner, lock = %self.lock_path.display(), "acquired migration lock");
                Ok(record)
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                let existing = self.read_lock()?.ok_or_else(|| {
                    MigrationError::storage(
                        "acquire migration lock",
                        "lock file vanished while being read",
                    )
                })?;
                Err(lock_conflict(existing, now, stale_after))
            }
            Err(e) => Err(MigrationError::storage("create lock file", e.error)),
        }
    }

    fn release_lock(&self, owner: &LockOwner) -> Result<(), MigrationError> {
        match self.read_lock()? {
            None => {
                warn!(owner = %owner, "migration lock was already gone on release");
                Ok(())
            }
            Some(lock) if lock.owner == *owner => {
                fs::remove_file(&self.lock_path)
                    .map_err(|e| MigrationError::storage("remove lock file", e))?;
                debug!(owner = %owner, "released migration lock");
                Ok(())
            }
            Some(lock) => Err(MigrationError::InconsistentState(format!(
                "migration lock is held by {}, not by {}",
                lock.owner, owner
            ))),
        }
    }

    fn read_lock(&self) -> Result<Option<LockRecord>, MigrationError> {
        let content = match fs::read_to_string(&self.lock_path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MigrationError::storage("read lock file", e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| MigrationError::storage("parse lock file", e))
    }

    fn clear_lock(&self) -> Result<Option<LockRecord>, MigrationError> {
        let record = match self.read_lock() {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "clearing unreadable migration lock");
                None
            }
        };
        match fs::remove_file(&self.lock_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(MigrationError::storage("remove lock file", e)),
        }
        Ok(record)
    }
}
