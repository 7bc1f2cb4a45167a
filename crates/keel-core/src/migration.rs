use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of a migration in the total order. Versions start at 1.
pub type Version = u32;

/// One migration definition as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub version: Version,
    pub name: String,
    /// Creation time in RFC3339 (UTC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub up: Vec<String>,
    #[serde(default)]
    pub down: Vec<String>,
}

impl MigrationRecord {
    pub fn new(version: Version, name: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            created_at: None,
            up: Vec::new(),
            down: Vec::new(),
        }
    }

    /// Script statements to run for the given direction.
    pub fn script(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// Lifecycle of one migration within the applied set.
///
/// `Pending -> Applying -> Applied -> Reverting -> Pending`; a failed script
/// leaves the migration `Failed` for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationState {
    Pending,
    Applying,
    Applied,
    Reverting,
    Failed,
}

impl MigrationState {
    /// State entered when a script starts in `direction`, if that is legal.
    pub fn begin(self, direction: Direction) -> Option<MigrationState> {
        match (self, direction) {
            (MigrationState::Pending, Direction::Up) => Some(MigrationState::Applying),
            (MigrationState::Applied, Direction::Down) => Some(MigrationState::Reverting),
            _ => None,
        }
    }

    /// State after the running script finished.
    pub fn finish(self, success: bool) -> MigrationState {
        match (self, success) {
            (MigrationState::Applying, true) => MigrationState::Applied,
            (MigrationState::Reverting, true) => MigrationState::Pending,
            (MigrationState::Applying | MigrationState::Reverting, false) => {
                MigrationState::Failed
            }
            (other, _) => other,
        }
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MigrationState::Pending => "pending",
            MigrationState::Applying => "applying",
            MigrationState::Applied => "applied",
            MigrationState::Reverting => "reverting",
            MigrationState::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// A persisted entry of the applied history. Existence means applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMigration {
    pub version: Version,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Ordered migrations one invocation intends to apply or revert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    pub direction: Direction,
    pub migrations: Vec<MigrationRecord>,
}

impl MigrationPlan {
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn versions(&self) -> Vec<Version> {
        self.migrations.iter().map(|m| m.version).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Direction::Up, vec!["CREATE TABLE users (id INTEGER)".to_string()])]
    #[case(Direction::Down, vec!["DROP TABLE users".to_string()])]
    fn script_selects_direction(#[case] direction: Direction, #[case] expected: Vec<String>) {
        let record = MigrationRecord {
            up: vec!["CREATE TABLE users (id INTEGER)".into()],
            down: vec!["DROP TABLE users".into()],
            ..MigrationRecord::new(1, "create_users")
        };
        assert_eq!(record.script(direction), expected.as_slice());
    }

    #[test]
    fn record_without_scripts_deserializes_with_empty_placeholders() {
        let record: MigrationRecord =
            serde_json::from_str(r#"{"version": 3, "name": "noop"}"#).unwrap();
        assert_eq!(record.version, 3);
        assert!(record.up.is_empty());
        assert!(record.down.is_empty());
        assert!(record.created_at.is_none());
    }

    #[rstest]
    #[case::apply(MigrationState::Pending, Direction::Up, Some(MigrationState::Applying))]
    #[case::revert(MigrationState::Applied, Direction::Down, Some(MigrationState::Reverting))]
    #[case::apply_twice(MigrationState::Applied, Direction::Up, None)]
    #[case::revert_pending(MigrationState::Pending, Direction::Down, None)]
    #[case::failed_is_terminal(MigrationState::Failed, Direction::Up, None)]
    fn begin_transitions(
        #[case] from: MigrationState,
        #[case] direction: Direction,
        #[case] expected: Option<MigrationState>,
    ) {
        assert_eq!(from.begin(direction), expected);
    }

    #[test]
    fn finish_closes_the_cycle() {
        let applied = MigrationState::Pending
            .begin(Direction::Up)
            .unwrap()
            .finish(true);
        assert_eq!(applied, MigrationState::Applied);

        let pending = applied.begin(Direction::Down).unwrap().finish(true);
        assert_eq!(pending, MigrationState::Pending);

        assert_eq!(MigrationState::Applying.finish(false), MigrationState::Failed);
        assert_eq!(MigrationState::Reverting.finish(false), MigrationState::Failed);
    }

    #[test]
    fn direction_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Direction::Down).unwrap(), "\"down\"");
        assert_eq!(Direction::Up.to_string(), "up");
    }
}
