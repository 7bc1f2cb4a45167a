use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use keel_config::{CONFIG_FILE_NAME, KeelConfig};

/// Load keel.json config from current directory.
pub fn load_config() -> Result<KeelConfig> {
    let path = PathBuf::from(CONFIG_FILE_NAME);
    if !path.exists() {
        anyhow::bail!("{CONFIG_FILE_NAME} not found. Run 'keel init' first.");
    }
    read_config(&path)
}

/// Load config from a specific path.
pub fn load_config_from_path(path: PathBuf) -> Result<KeelConfig> {
    if !path.exists() {
        anyhow::bail!("{CONFIG_FILE_NAME} not found at: {}", path.display());
    }
    read_config(&path)
}

/// Load config from project root, with fallback to defaults.
///
/// With a root, relative paths in the result point inside that root.
pub fn load_config_or_default(project_root: Option<PathBuf>) -> Result<KeelConfig> {
    let Some(root) = project_root else {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        if path.exists() {
            return load_config_from_path(path);
        }
        return Ok(KeelConfig::default());
    };

    let config_path = root.join(CONFIG_FILE_NAME);
    let config = if config_path.exists() {
        load_config_from_path(config_path)?
    } else {
        KeelConfig::default()
    };
    Ok(config.relative_to(&root))
}

fn read_config(path: &PathBuf) -> Result<KeelConfig> {
    let content = fs::read_to_string(path).context("read keel.json")?;
    let config: KeelConfig = serde_json::from_str(&content).context("parse keel.json")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid keel.json: {}", e))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_config::FileFormat;
    use std::env;
    use tempfile::tempdir;

    struct CwdGuard {
        original: PathBuf,
    }

    impl CwdGuard {
        fn new(dir: &PathBuf) -> Self {
            let original = env::current_dir().unwrap();
            env::set_current_dir(dir).unwrap();
            Self { original }
        }
    }

    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = env::set_current_dir(&self.original);
        }
    }

    #[test]
    #[serial_test::serial]
    fn load_config_missing_points_to_init() {
        let tmp = tempdir().unwrap();
        let _guard = CwdGuard::new(&tmp.path().to_path_buf());

        let err = load_config().unwrap_err();
        assert!(err.to_string().contains("keel init"));
    }

    #[test]
    #[serial_test::serial]
    fn load_config_reads_current_dir() {
        let tmp = tempdir().unwrap();
        let _guard = CwdGuard::new(&tmp.path().to_path_buf());

        fs::write(
            CONFIG_FILE_NAME,
            r#"{"migrationsDir": "db", "migrationFormat": "sql"}"#,
        )
        .unwrap();

        let cfg = load_config().unwrap();
        assert_eq!(cfg.migrations_dir, PathBuf::from("db"));
        assert_eq!(cfg.migration_format(), FileFormat::Sql);
    }

    #[test]
    fn load_config_from_path_rejects_bad_pattern() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"{"migrationsDir": "migrations", "migrationFilenamePattern": "%m"}"#,
        )
        .unwrap();

        let err = load_config_from_path(path).unwrap_err();
        assert!(err.to_string().contains("invalid keel.json"));
    }

    #[test]
    fn load_config_or_default_without_file() {
        let tmp = tempdir().unwrap();
        let cfg = load_config_or_default(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.migrations_dir, tmp.path().join("migrations"));
        assert_eq!(cfg.state_file, tmp.path().join(".keel/state.json"));
        assert_eq!(cfg.migration_format(), FileFormat::Json);
    }

    #[test]
    fn load_config_or_default_rebases_onto_root() {
        let tmp = tempdir().unwrap();
        let absolute_state = tmp.path().join("elsewhere/state.json");
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            format!(
                r#"{{"migrationsDir": "db", "stateFile": {}}}"#,
                serde_json::to_string(&absolute_state).unwrap()
            ),
        )
        .unwrap();

        let cfg = load_config_or_default(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.migrations_dir(), tmp.path().join("db"));
        assert_eq!(cfg.state_file(), absolute_state);
        assert_eq!(cfg.lock_file(), tmp.path().join("elsewhere/state.json.lock"));
    }

    #[test]
    #[serial_test::serial]
    fn load_config_or_default_without_root_keeps_relative_paths() {
        let tmp = tempdir().unwrap();
        let _guard = CwdGuard::new(&tmp.path().to_path_buf());

        let cfg = load_config_or_default(None).unwrap();
        assert_eq!(cfg, KeelConfig::default());
    }
}
