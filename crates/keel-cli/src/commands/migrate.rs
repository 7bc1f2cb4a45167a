use anyhow::Result;
use colored::Colorize;
use keel_core::{MigrationError, Version};
use keel_loader::load_config;

use crate::utils::{build_engine, connect};

pub async fn cmd_up(database_url: Option<&str>, step: Option<usize>, to: Option<Version>) -> Result<()> {
    let config = load_config()?;
    let engine = build_engine(&config);
    let mut executor = connect(database_url, &config).await?;

    let applied = engine.migrate_up(&mut executor, step, to).await?;
    if applied == 0 {
        println!("{}", "No ups to apply.".bright_yellow());
    } else {
        println!(
            "{} {}",
            applied.to_string().bright_green().bold(),
            "ups applied successfully.".bright_green()
        );
    }
    Ok(())
}

pub async fn cmd_down(database_url: Option<&str>, step: Option<usize>, to: Option<Version>) -> Result<()> {
    // Fail before touching the database.
    if step.is_none() && to.is_none() {
        return Err(MigrationError::AmbiguousRollback.into());
    }

    let config = load_config()?;
    let engine = build_engine(&config);
    let mut executor = connect(database_url, &config).await?;

    let reverted = engine.migrate_down(&mut executor, step, to).await?;
    if reverted == 0 {
        println!("{}", "No rollbacks to apply.".bright_yellow());
    } else {
        println!(
            "{} {}",
            reverted.to_string().bright_green().bold(),
            "rollbacks applied successfully.".bright_green()
        );
    }
    Ok(())
}
