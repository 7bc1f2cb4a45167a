use std::fmt::Display;

use thiserror::Error;

use crate::lock::LockRecord;
use crate::migration::{Direction, Version};

/// Every failure the migration engine and its stores can report.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("invalid migration name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },
    #[error("corrupt migration: {0}")]
    CorruptMigration(String),
    #[error("migration {0} is already applied")]
    DuplicateApplication(Version),
    #[error("migration {0} is not applied")]
    NotApplied(Version),
    #[error("invalid target version {target}: {reason}")]
    InvalidTarget { target: Version, reason: String },
    #[error("rollback needs a step count or a target version")]
    AmbiguousRollback,
    #[error("{}", in_progress_message(.lock, .stale))]
    MigrationInProgress { lock: LockRecord, stale: bool },
    #[error(
        "{direction} script of migration {version} ({name}) failed after {completed} completed: {message}"
    )]
    ScriptExecution {
        version: Version,
        name: String,
        direction: Direction,
        completed: usize,
        message: String,
    },
    #[error("applied history does not match migration files: {0}")]
    InconsistentState(String),
    #[error("{context}: {message}")]
    Storage { context: String, message: String },
}

fn in_progress_message(lock: &LockRecord, stale: &bool) -> String {
    let mut message = format!(
        "another `{}` run holds the migration lock (owner {}, since {})",
        lock.operation,
        lock.owner,
        lock.acquired_at.to_rfc3339()
    );
    if *stale {
        message.push_str("; the lock is stale, verify the database and run `keel unlock`");
    }
    message
}

impl MigrationError {
    pub fn storage(context: impl Into<String>, err: impl Display) -> Self {
        MigrationError::Storage {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub fn invalid_name(name: &str, reason: impl Into<String>) -> Self {
        MigrationError::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_target(target: Version, reason: impl Into<String>) -> Self {
        MigrationError::InvalidTarget {
            target,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockOwner;
    use chrono::Utc;

    #[test]
    fn in_progress_mentions_unlock_only_when_stale() {
        let lock = LockRecord::new(LockOwner::current(), Direction::Up, Utc::now());
        let fresh = MigrationError::MigrationInProgress {
            lock: lock.clone(),
            stale: false,
        };
        let stale = MigrationError::MigrationInProgress { lock, stale: true };

        assert!(fresh.to_string().contains("`up` run holds the migration lock"));
        assert!(!fresh.to_string().contains("keel unlock"));
        assert!(stale.to_string().contains("keel unlock"));
    }

    #[test]
    fn script_failure_carries_underlying_message() {
        let err = MigrationError::ScriptExecution {
            version: 3,
            name: "add_email".into(),
            direction: Direction::Up,
            completed: 2,
            message: "syntax error near BOGUS".into(),
        };
        assert_eq!(
            err.to_string(),
            "up script of migration 3 (add_email) failed after 2 completed: syntax error near BOGUS"
        );
    }
}
