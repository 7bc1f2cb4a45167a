use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::file_format::FileFormat;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "keel.json";

/// Environment variable that overrides `databaseUrl`.
pub const DATABASE_URL_ENV: &str = "KEEL_DATABASE_URL";

/// Default migration filename pattern: zero-padded version + sanitized name.
pub fn default_migration_filename_pattern() -> String {
    "%04v_%m".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".keel/state.json")
}

fn default_lock_timeout_secs() -> u64 {
    600
}

/// Top-level keel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct KeelConfig {
    pub migrations_dir: PathBuf,
    /// JSON file holding the applied history. The lock lives next to it.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default)]
    pub migration_format: FileFormat,
    /// Must start with a version placeholder (`%v` or `%0Nv`).
    #[serde(default = "default_migration_filename_pattern")]
    pub migration_filename_pattern: String,
    /// Age after which a leftover lock is reported as stale.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl Default for KeelConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            state_file: default_state_file(),
            migration_format: FileFormat::Json,
            migration_filename_pattern: default_migration_filename_pattern(),
            lock_timeout_secs: default_lock_timeout_secs(),
            database_url: None,
        }
    }
}

impl KeelConfig {
    /// Path where migrations are stored.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Path of the applied-history state file.
    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    /// Path of the lock record, `<state file>.lock`.
    pub fn lock_file(&self) -> PathBuf {
        let mut name = self.state_file.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Preferred file format for generated migrations.
    pub fn migration_format(&self) -> FileFormat {
        self.migration_format
    }

    /// Pattern for migration filenames (supports %v, %0Nv and %m placeholders).
    pub fn migration_filename_pattern(&self) -> &str {
        &self.migration_filename_pattern
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }

    /// Rebase relative paths onto `root`.
    pub fn relative_to(mut self, root: &Path) -> Self {
        if self.migrations_dir.is_relative() {
            self.migrations_dir = root.join(&self.migrations_dir);
        }
        if self.state_file.is_relative() {
            self.state_file = root.join(&self.state_file);
        }
        self
    }

    /// Check settings that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        check_filename_pattern(&self.migration_filename_pattern).map_err(|reason| {
            format!(
                "migrationFilenamePattern {reason}: {:?}",
                self.migration_filename_pattern
            )
        })
    }
}

/// The rendered stem must read back as its version: a leading `%v` / `%0Nv`
/// followed by the end of the pattern or a separator that is neither a digit
/// nor another placeholder.
fn check_filename_pattern(pattern: &str) -> Result<(), &'static str> {
    if pattern.contains(['/', '\\']) {
        return Err("must not contain path separators");
    }
    let after_version = pattern
        .strip_prefix('%')
        .map(|rest| rest.trim_start_matches(|c: char| c.is_ascii_digit()))
        .and_then(|rest| rest.strip_prefix('v'))
        .ok_or("must start with %v or %0Nv")?;
    if after_version.starts_with(|c: char| c.is_ascii_digit() || c == '%') {
        return Err("needs a separator after the version placeholder");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keel_config_default() {
        let config = KeelConfig::default();

        assert_eq!(config.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(config.state_file, PathBuf::from(".keel/state.json"));
        assert_eq!(config.migration_format, FileFormat::Json);
        assert_eq!(config.migration_filename_pattern, "%04v_%m");
        assert_eq!(config.lock_timeout(), Duration::from_secs(600));
        assert!(config.database_url().is_none());
    }

    #[test]
    fn test_keel_config_lock_file_sits_next_to_state() {
        let config = KeelConfig::default();
        assert_eq!(config.lock_file(), PathBuf::from(".keel/state.json.lock"));
    }

    #[test]
    fn test_keel_config_minimal_json_fills_defaults() {
        let config: KeelConfig =
            serde_json::from_str(r#"{"migrationsDir": "db/migrations"}"#).unwrap();

        assert_eq!(config.migrations_dir(), Path::new("db/migrations"));
        assert_eq!(config.state_file(), Path::new(".keel/state.json"));
        assert_eq!(config.lock_timeout_secs, 600);
    }

    #[test]
    fn test_keel_config_relative_to_root() {
        let config = KeelConfig::default().relative_to(Path::new("/srv/app"));
        assert_eq!(config.migrations_dir(), Path::new("/srv/app/migrations"));
        assert_eq!(config.state_file(), Path::new("/srv/app/.keel/state.json"));
    }

    #[test]
    fn test_keel_config_validate_pattern() {
        let ok = ["%v_%m", "%04v_%m", "%v", "%06v-%m", "%v.%m"];
        for pattern in ok {
            let config = KeelConfig {
                migration_filename_pattern: pattern.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_ok(), "{pattern}");
        }

        let rejected = [
            ("%m_%v", "must start with"),
            ("%v%m", "separator"),
            ("%04v%m", "separator"),
            ("%v1_%m", "separator"),
            ("%04v/%m", "path separators"),
            ("%v\\%m", "path separators"),
        ];
        for (pattern, reason) in rejected {
            let config = KeelConfig {
                migration_filename_pattern: pattern.to_string(),
                ..Default::default()
            };
            let err = config.validate().unwrap_err();
            assert!(err.contains(reason), "{pattern}: {err}");
        }
    }
}
