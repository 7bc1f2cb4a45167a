use std::env;

use anyhow::{Context, Result};
use keel::{Engine, SeaOrmExecutor};
use keel_config::{CONFIG_FILE_NAME, DATABASE_URL_ENV, KeelConfig};
use keel_loader::FsMigrationSource;
use keel_state::FileStateStore;

pub type CliEngine = Engine<FsMigrationSource, FileStateStore>;

/// Engine over the migrations directory and state file named in `config`.
pub fn build_engine(config: &KeelConfig) -> CliEngine {
    let source = FsMigrationSource::from_config(config);
    let state = FileStateStore::new(config.state_file(), config.lock_file());
    Engine::new(source, state).with_lock_timeout(config.lock_timeout())
}

/// Pick the database URL: flag, then environment, then keel.json.
pub fn resolve_database_url(
    flag: Option<&str>,
    env_value: Option<String>,
    config: &KeelConfig,
) -> Result<String> {
    flag.map(str::to_string)
        .or(env_value.filter(|v| !v.trim().is_empty()))
        .or_else(|| config.database_url().map(str::to_string))
        .with_context(|| {
            format!(
                "no database URL; pass --database-url, set {DATABASE_URL_ENV} or add databaseUrl to {CONFIG_FILE_NAME}"
            )
        })
}

/// Resolve the URL and open a connection for running scripts.
pub async fn connect(flag: Option<&str>, config: &KeelConfig) -> Result<SeaOrmExecutor> {
    let url = resolve_database_url(flag, env::var(DATABASE_URL_ENV).ok(), config)?;
    SeaOrmExecutor::connect(&url)
        .await
        .context("connect to database")
}
