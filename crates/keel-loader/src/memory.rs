use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use keel_core::{MigrationError, MigrationRecord, MigrationSource};
use keel_planner::validate_available;

use crate::naming::sanitize_name;

/// In-memory migration definitions. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryMigrationSource {
    records: Arc<Mutex<Vec<MigrationRecord>>>,
}

impl MemoryMigrationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<MigrationRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    /// Add or replace a definition, e.g. to fill in scripts after `generate`.
    pub fn insert(&self, record: MigrationRecord) {
        let mut records = self.lock();
        records.retain(|r| r.version != record.version);
        records.push(record);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MigrationRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MigrationSource for MemoryMigrationSource {
    fn list_available(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        let mut records = self.lock().clone();
        records.sort_by_key(|r| r.version);
        validate_available(&records)?;
        Ok(records)
    }

    fn generate(&self, name: &str, created_at: DateTime<Utc>) -> Result<String, MigrationError> {
        let slug = sanitize_name(name)?;
        let version = self.list_available()?.last().map_or(0, |r| r.version) + 1;
        let filename = format!("{version:04}_{slug}");

        self.lock().push(MigrationRecord {
            created_at: Some(created_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ..MigrationRecord::new(version, slug)
        });
        Ok(filename)
    }
}
