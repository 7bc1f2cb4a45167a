use anyhow::Result;
use colored::Colorize;
use keel_config::FileFormat;
use keel_loader::load_config;

use crate::utils::build_engine;

pub fn cmd_generate(name: &str, format: Option<FileFormat>) -> Result<()> {
    let mut config = load_config()?;
    if let Some(format) = format {
        config.migration_format = format;
    }
    let engine = build_engine(&config);
    let filename = engine.generate(name)?;

    println!(
        "{} {}",
        "Created migration:".bright_green(),
        config.migrations_dir().join(&filename).display()
    );
    Ok(())
}
