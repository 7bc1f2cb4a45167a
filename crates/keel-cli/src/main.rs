use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use keel_config::FileFormat;
use keel_core::Version;
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod commands;
mod utils;
use commands::{cmd_down, cmd_generate, cmd_init, cmd_status, cmd_unlock, cmd_up, cmd_view};

/// keel command-line interface.
#[derive(Parser, Debug)]
#[command(name = "keel", author, version, about)]
struct Cli {
    /// Log level: trace, debug, info, warn or error.
    #[arg(short = 'l', long, global = true)]
    log_level: Option<String>,
    /// Database URL. Overrides KEEL_DATABASE_URL and keel.json.
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize keel.json with defaults and create the migrations directory.
    Init {
        /// Format for generated migrations.
        #[arg(short = 'f', long)]
        format: Option<FileFormat>,
    },
    /// Create an empty migration with the next version.
    Generate {
        name: String,
        /// File format; defaults to migrationFormat in keel.json.
        #[arg(short = 'f', long)]
        format: Option<FileFormat>,
    },
    /// Apply pending migrations.
    Up {
        /// Apply at most this many migrations.
        #[arg(short = 'n', long)]
        step: Option<usize>,
        /// Apply up to and including this version.
        #[arg(short = 'v', long)]
        to: Option<Version>,
    },
    /// Roll back applied migrations. Requires --step or --to.
    Down {
        /// Roll back this many migrations.
        #[arg(short = 'n', long)]
        step: Option<usize>,
        /// Roll back every migration above this version; 0 reverts all.
        #[arg(short = 'v', long)]
        to: Option<Version>,
    },
    /// Show applied migrations, most recent first.
    View {
        #[arg(short = 'n', long = "max-count")]
        max_count: Option<usize>,
    },
    /// Show applied and pending migrations and the lock.
    Status,
    /// Remove a leftover migration lock.
    Unlock,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.log_level.as_deref());

    if let Err(err) = run(cli).await {
        eprintln!(
            "{} {:#}",
            "Could not perform operation:".bright_red().bold(),
            err
        );
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let database_url = cli.database_url;
    match cli.command {
        Commands::Init { format } => cmd_init(format),
        Commands::Generate { name, format } => cmd_generate(&name, format),
        Commands::Up { step, to } => cmd_up(database_url.as_deref(), step, to).await,
        Commands::Down { step, to } => cmd_down(database_url.as_deref(), step, to).await,
        Commands::View { max_count } => cmd_view(max_count),
        Commands::Status => cmd_status(),
        Commands::Unlock => cmd_unlock(),
    }
}

fn setup_logging(log_level: Option<&str>) {
    let level = match log_level.unwrap_or("warn").to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", level)))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
