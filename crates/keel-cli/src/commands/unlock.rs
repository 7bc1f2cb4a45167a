use anyhow::Result;
use colored::Colorize;
use keel_loader::load_config;

use crate::utils::build_engine;

pub fn cmd_unlock() -> Result<()> {
    let config = load_config()?;
    let engine = build_engine(&config);

    match engine.force_unlock()? {
        Some(lock) => println!(
            "{} {} by {} since {}",
            "Removed migration lock:".bright_green(),
            lock.operation,
            lock.owner,
            lock.acquired_at
        ),
        None => println!("{}", "No migration lock present.".bright_yellow()),
    }
    Ok(())
}
