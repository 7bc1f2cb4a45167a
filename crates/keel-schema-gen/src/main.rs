use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use schemars::{Schema, schema_for};
use keel_config::KeelConfig;
use keel_core::MigrationRecord;

#[derive(Debug, Parser)]
#[command(
    name = "keel-schema-gen",
    about = "Emit JSON Schemas for keel.json and JSON/YAML migration files."
)]
struct Args {
    /// Output directory for schema files.
    #[arg(short = 'o', long = "out", default_value = "schemas")]
    out: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let written = run(&args.out)?;

    println!("Wrote schemas:");
    for path in written {
        println!("  {}", path.display());
    }
    Ok(())
}

fn run(out: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out).with_context(|| format!("create dir {}", out.display()))?;

    let schemas = [
        ("migration.schema.json", schema_for!(MigrationRecord)),
        ("config.schema.json", schema_for!(KeelConfig)),
    ];

    let mut written = Vec::with_capacity(schemas.len());
    for (file, schema) in schemas {
        let path = out.join(file);
        write_schema(&path, &schema)?;
        written.push(path);
    }
    Ok(written)
}

fn write_schema(path: &Path, schema: &Schema) -> Result<()> {
    let text = serde_json::to_string_pretty(schema)
        .with_context(|| format!("serialize {}", path.display()))?;
    fs::write(path, text).with_context(|| format!("write {}", path.display()))
}
