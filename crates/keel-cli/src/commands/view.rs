use anyhow::Result;
use colored::Colorize;
use keel_loader::load_config;

use crate::utils::build_engine;

pub fn cmd_view(max_count: Option<usize>) -> Result<()> {
    let config = load_config()?;
    let engine = build_engine(&config);
    let applied = engine.view(max_count)?;

    if applied.is_empty() {
        println!("{}", "No migrations applied.".bright_yellow());
        return Ok(());
    }

    println!(
        "{} {}",
        "Applied migrations".bright_cyan().bold(),
        "(newest -> oldest):".bright_white()
    );
    for migration in &applied {
        println!(
            "  {} {} {}",
            format!("{:>4}", migration.version).bright_magenta(),
            migration.name.bright_white(),
            migration
                .applied_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string()
                .dimmed()
        );
    }
    Ok(())
}
