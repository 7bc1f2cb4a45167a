use anyhow::Result;
use colored::Colorize;
use keel_core::MigrationState;
use keel_loader::load_config;

use crate::utils::build_engine;

pub fn cmd_status() -> Result<()> {
    let config = load_config()?;
    let engine = build_engine(&config);
    let status = engine.status()?;

    println!("{}", "Configuration:".bright_cyan().bold());
    println!(
        "  {} {}",
        "Migrations directory:".cyan(),
        format!("{}", config.migrations_dir().display()).bright_white()
    );
    println!(
        "  {} {}",
        "State file:".cyan(),
        format!("{}", config.state_file().display()).bright_white()
    );
    println!(
        "  {} {:?}",
        "Migration format:".cyan(),
        config.migration_format()
    );
    println!(
        "  {} {}",
        "Migration filename pattern:".cyan(),
        config.migration_filename_pattern().bright_white()
    );
    println!();

    let current = status
        .current
        .map_or_else(|| "none".to_string(), |v| v.to_string());
    println!(
        "{} {}",
        "Current version:".bright_cyan().bold(),
        current.bright_magenta()
    );
    println!(
        "{} {}  {} {}",
        "Applied:".bright_cyan().bold(),
        status.applied.len().to_string().bright_yellow(),
        "Pending:".bright_cyan().bold(),
        status.pending.len().to_string().bright_yellow()
    );

    match &status.lock {
        Some(lock) => {
            let held = format!(
                "{} by {} since {}",
                lock.operation, lock.owner, lock.acquired_at
            );
            if status.stale {
                println!(
                    "{} {} {}",
                    "Lock:".bright_cyan().bold(),
                    held.bright_red(),
                    "(stale; verify the database and run `keel unlock`)".bright_red()
                );
            } else {
                println!("{} {}", "Lock:".bright_cyan().bold(), held.bright_yellow());
            }
        }
        None => println!("{} {}", "Lock:".bright_cyan().bold(), "free".bright_green()),
    }
    println!();

    if status.entries.is_empty() {
        println!("{}", "No migrations found.".bright_yellow());
        return Ok(());
    }

    println!("{}", "Migrations:".bright_cyan().bold());
    for entry in &status.entries {
        let state = format!("{:<9}", entry.state.to_string());
        let state = match entry.state {
            MigrationState::Applied => state.bright_green(),
            MigrationState::Pending => state.bright_white(),
            MigrationState::Applying | MigrationState::Reverting => state.bright_yellow(),
            MigrationState::Failed => state.bright_red(),
        };
        let applied_at = entry
            .applied_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_default();
        println!(
            "  {} {} {} {}",
            format!("{:>4}", entry.version).bright_magenta(),
            state,
            entry.name.bright_white(),
            applied_at.dimmed()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keel_config::{CONFIG_FILE_NAME, KeelConfig};
    use keel_core::StateStore;
    use std::{env, fs, path::PathBuf};
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

    fn write_config() -> KeelConfig {
        let cfg = KeelConfig::default();
        fs::write(CONFIG_FILE_NAME, serde_json::to_string_pretty(&cfg).unwrap()).unwrap();
        cfg
    }

    #[test]
    #[serial_test::serial]
    fn cmd_status_without_migrations() {
        let tmp = tempdir().unwrap();
        let _guard = CwdGuard::new(&tmp.path().to_path_buf());
        write_config();

        cmd_status().unwrap();
    }

    #[test]
    #[serial_test::serial]
    fn cmd_status_with_applied_and_pending() {
        let tmp = tempdir().unwrap();
        let _guard = CwdGuard::new(&tmp.path().to_path_buf());
        let cfg = write_config();

        let engine = build_engine(&cfg);
        engine.generate("users").unwrap();
        engine.generate("posts").unwrap();
        engine.state().mark_applied(1, "users", Utc::now()).unwrap();

        cmd_status().unwrap();
    }

    #[test]
    #[serial_test::serial]
    fn cmd_status_fails_on_orphaned_history() {
        let tmp = tempdir().unwrap();
        let _guard = CwdGuard::new(&tmp.path().to_path_buf());
        let cfg = write_config();

        build_engine(&cfg)
            .state()
            .mark_applied(4, "gone", Utc::now())
            .unwrap();

        let err = cmd_status().unwrap_err();
        assert!(err.to_string().contains("no migration file"), "{err}");
    }
}
