use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use keel_config::{CONFIG_FILE_NAME, FileFormat, KeelConfig};

/// Write a default `keel.json` in the current directory and create the
/// migrations directory it points at. An existing config is left untouched.
pub fn cmd_init(format: Option<FileFormat>) -> Result<()> {
    let config_path = Path::new(CONFIG_FILE_NAME);
    if config_path.exists() {
        bail!("{CONFIG_FILE_NAME} already exists; edit it instead of re-running init");
    }

    let config = KeelConfig {
        migration_format: format.unwrap_or_default(),
        ..KeelConfig::default()
    };
    let json = serde_json::to_string_pretty(&config).context("serialize default config")?;
    fs::write(config_path, json + "\n").with_context(|| format!("write {CONFIG_FILE_NAME}"))?;

    let migrations_dir = config.migrations_dir();
    fs::create_dir_all(migrations_dir)
        .with_context(|| format!("create {}", migrations_dir.display()))?;

    println!("{} {}", "Created".bright_green(), CONFIG_FILE_NAME.bright_white());
    println!(
        "  {} {}",
        "Migrations:".cyan(),
        format!("{} ({:?})", migrations_dir.display(), config.migration_format()).bright_white()
    );
    println!(
        "  {} {}",
        "State file:".cyan(),
        format!("{}", config.state_file().display()).bright_white()
    );
    println!(
        "Next: {} and set {} or {}.",
        "keel generate <name>".bright_white(),
        "databaseUrl".bright_white(),
        keel_config::DATABASE_URL_ENV.bright_white()
    );
    Ok(())
}
