use std::collections::HashSet;

use keel_core::{MigrationError, MigrationRecord, Version};

/// Validate the available migration sequence.
/// Checks for:
/// - Version 0, which is reserved for "nothing applied"
/// - Duplicate versions
/// - Records not sorted ascending
pub fn validate_available(records: &[MigrationRecord]) -> Result<(), MigrationError> {
    let mut seen = HashSet::new();
    let mut previous: Option<Version> = None;

    for record in records {
        if record.version == 0 {
            return Err(MigrationError::CorruptMigration(format!(
                "migration {:?} uses reserved version 0",
                record.name
            )));
        }
        if !seen.insert(record.version) {
            return Err(MigrationError::CorruptMigration(format!(
                "version {} is defined more than once",
                record.version
            )));
        }
        if let Some(prev) = previous {
            if record.version < prev {
                return Err(MigrationError::CorruptMigration(format!(
                    "migrations are out of order: {} follows {}",
                    record.version, prev
                )));
            }
        }
        previous = Some(record.version);
    }

    Ok(())
}

/// Check that the applied versions are exactly the first N available versions.
///
/// `applied` must be ascending, as returned by the state store.
pub fn validate_applied(
    available: &[MigrationRecord],
    applied: &[Version],
) -> Result<(), MigrationError> {
    let known: HashSet<Version> = available.iter().map(|m| m.version).collect();
    if let Some(orphan) = applied.iter().find(|v| !known.contains(v)) {
        return Err(MigrationError::InconsistentState(format!(
            "applied migration {orphan} has no migration file"
        )));
    }

    for (record, version) in available.iter().zip(applied) {
        if record.version != *version {
            return Err(MigrationError::InconsistentState(format!(
                "migration {} is pending below applied migration {}",
                record.version, version
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn records(versions: &[Version]) -> Vec<MigrationRecord> {
        versions
            .iter()
            .map(|v| MigrationRecord::new(*v, format!("m{v}")))
            .collect()
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::contiguous(vec![1, 2, 3])]
    #[case::gaps_allowed(vec![1, 5, 20])]
    fn available_ok(#[case] versions: Vec<Version>) {
        assert!(validate_available(&records(&versions)).is_ok());
    }

    #[rstest]
    #[case::duplicate(vec![1, 2, 2], "defined more than once")]
    #[case::zero(vec![0, 1], "reserved version 0")]
    #[case::unsorted(vec![2, 1], "out of order")]
    fn available_corrupt(#[case] versions: Vec<Version>, #[case] needle: &str) {
        let err = validate_available(&records(&versions)).unwrap_err();
        assert!(matches!(err, MigrationError::CorruptMigration(_)));
        assert!(err.to_string().contains(needle), "{err}");
    }

    #[rstest]
    #[case::nothing_applied(vec![1, 2, 3], vec![])]
    #[case::prefix(vec![1, 2, 3], vec![1, 2])]
    #[case::all(vec![1, 2, 3], vec![1, 2, 3])]
    #[case::sparse_versions(vec![10, 20, 30], vec![10, 20])]
    fn applied_prefix_ok(#[case] available: Vec<Version>, #[case] applied: Vec<Version>) {
        assert!(validate_applied(&records(&available), &applied).is_ok());
    }

    #[rstest]
    #[case::hole(vec![1, 2, 3], vec![1, 3], "migration 2 is pending below applied migration 3")]
    #[case::orphan(vec![1, 2], vec![1, 2, 3], "applied migration 3 has no migration file")]
    #[case::skipped_first(vec![1, 2], vec![2], "migration 1 is pending below applied migration 2")]
    fn applied_prefix_broken(
        #[case] available: Vec<Version>,
        #[case] applied: Vec<Version>,
        #[case] needle: &str,
    ) {
        let err = validate_applied(&records(&available), &applied).unwrap_err();
        assert!(matches!(err, MigrationError::InconsistentState(_)));
        assert!(err.to_string().contains(needle), "{err}");
    }
}
