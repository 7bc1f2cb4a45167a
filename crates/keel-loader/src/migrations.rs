use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use keel_config::{FileFormat, KeelConfig};
use keel_core::{MigrationError, MigrationRecord, MigrationSource, Version};
use keel_planner::validate_available;
use tracing::debug;

use crate::naming::{migration_filename, name_from_stem, parse_version, sanitize_name};

const UP_MARKER: &str = "-- +up";
const DOWN_MARKER: &str = "-- +down";

/// Migration definitions stored as files in one directory.
#[derive(Debug, Clone)]
pub struct FsMigrationSource {
    dir: PathBuf,
    format: FileFormat,
    pattern: String,
}

impl FsMigrationSource {
    pub fn new(dir: impl Into<PathBuf>, format: FileFormat, pattern: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            format,
            pattern: pattern.into(),
        }
    }

    pub fn from_config(config: &KeelConfig) -> Self {
        Self::new(
            config.migrations_dir(),
            config.migration_format(),
            config.migration_filename_pattern(),
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn render(&self, record: &MigrationRecord) -> Result<String, MigrationError> {
        match self.format {
            FileFormat::Json => serde_json::to_string_pretty(record)
                .map_err(|e| MigrationError::storage("serialize migration", e)),
            FileFormat::Yaml | FileFormat::Yml => serde_yaml::to_string(record)
                .map_err(|e| MigrationError::storage("serialize migration", e)),
            FileFormat::Sql => Ok(sql_template(record)),
        }
    }
}

impl MigrationSource for FsMigrationSource {
    fn list_available(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        load_migrations_from_dir(&self.dir)
    }

    fn generate(&self, name: &str, created_at: DateTime<Utc>) -> Result<String, MigrationError> {
        let slug = sanitize_name(name)?;
        let existing = self.list_available()?;
        let version = existing
            .iter()
            .map(|m| m.version)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| MigrationError::CorruptMigration("version space exhausted".into()))?;

        let filename = migration_filename(version, &slug, self.format, &self.pattern);
        check_rendered_filename(name, &filename, version)?;

        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .map_err(|e| MigrationError::storage("create migrations directory", e))?;
        }

        let record = MigrationRecord {
            created_at: Some(created_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ..MigrationRecord::new(version, slug.clone())
        };
        let path = self.dir.join(&filename);
        let text = self.render(&record)?;

        // create_new: never clobber a file that raced us to the same name.
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                MigrationError::storage(format!("create migration file {}", path.display()), e)
            })?;
        file.write_all(text.as_bytes()).map_err(|e| {
            MigrationError::storage(format!("write migration file {}", path.display()), e)
        })?;

        debug!(version, path = %path.display(), "generated migration");
        Ok(filename)
    }
}

/// A generated file must land directly in the directory and load back under
/// the version it was generated with.
fn check_rendered_filename(
    name: &str,
    filename: &str,
    version: Version,
) -> Result<(), MigrationError> {
    if filename.contains(['/', '\\']) {
        return Err(MigrationError::invalid_name(
            name,
            format!("filename {filename:?} would leave the migrations directory"),
        ));
    }
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let parsed = parse_version(stem);
    if parsed != Some(version) {
        return Err(MigrationError::invalid_name(
            name,
            format!(
                "filename {filename:?} would be read back as version {} instead of {version}; \
                 put a separator after the version in migrationFilenamePattern",
                parsed.map_or_else(|| "none".to_string(), |v| v.to_string())
            ),
        ));
    }
    Ok(())
}

/// Load all migration definitions from `dir`, sorted by version.
///
/// A missing directory is an empty sequence. Hidden files and unknown
/// extensions are skipped.
pub fn load_migrations_from_dir(dir: &Path) -> Result<Vec<MigrationRecord>, MigrationError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut by_version: BTreeMap<Version, (PathBuf, MigrationRecord)> = BTreeMap::new();
    let entries =
        fs::read_dir(dir).map_err(|e| MigrationError::storage("read migrations directory", e))?;

    for entry in entries {
        let entry = entry.map_err(|e| MigrationError::storage("read directory entry", e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.starts_with('.') {
            continue;
        }
        let Some(format) = path
            .extension()
            .and_then(|s| s.to_str())
            .and_then(FileFormat::from_extension)
        else {
            continue;
        };

        let record = load_migration_file(&path, stem, format)?;
        if let Some((other, _)) = by_version.get(&record.version) {
            return Err(MigrationError::CorruptMigration(format!(
                "version {} is defined by both {} and {}",
                record.version,
                other.display(),
                path.display()
            )));
        }
        by_version.insert(record.version, (path, record));
    }

    let records: Vec<MigrationRecord> = by_version.into_values().map(|(_, r)| r).collect();
    validate_available(&records)?;
    Ok(records)
}

fn load_migration_file(
    path: &Path,
    stem: &str,
    format: FileFormat,
) -> Result<MigrationRecord, MigrationError> {
    let version = parse_version(stem).ok_or_else(|| {
        MigrationError::CorruptMigration(format!(
            "cannot parse version from filename: {}",
            path.display()
        ))
    })?;

    let content = fs::read_to_string(path).map_err(|e| {
        MigrationError::storage(format!("read migration file {}", path.display()), e)
    })?;

    let record = match format {
        FileFormat::Json => serde_json::from_str::<MigrationRecord>(&content).map_err(|e| {
            MigrationError::CorruptMigration(format!("parse migration {}: {}", path.display(), e))
        })?,
        FileFormat::Yaml | FileFormat::Yml => serde_yaml::from_str::<MigrationRecord>(&content)
            .map_err(|e| {
                MigrationError::CorruptMigration(format!(
                    "parse migration {}: {}",
                    path.display(),
                    e
                ))
            })?,
        FileFormat::Sql => parse_sql_migration(version, &name_from_stem(stem), &content)
            .map_err(|e| {
                MigrationError::CorruptMigration(format!(
                    "parse migration {}: {}",
                    path.display(),
                    e
                ))
            })?,
    };

    if record.version != version {
        return Err(MigrationError::CorruptMigration(format!(
            "{} declares version {} but its filename says {}",
            path.display(),
            record.version,
            version
        )));
    }

    Ok(record)
}

/// Parse a SQL migration split by `-- +up` / `-- +down` marker lines.
///
/// Comment lines are dropped; each section becomes one script statement, or
/// none when the section is empty.
pub fn parse_sql_migration(
    version: Version,
    name: &str,
    content: &str,
) -> Result<MigrationRecord, String> {
    #[derive(PartialEq)]
    enum Section {
        Header,
        Up,
        Down,
    }

    let mut section = Section::Header;
    let mut seen_up = false;
    let mut up = Vec::new();
    let mut down = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case(UP_MARKER) {
            if seen_up {
                return Err(format!("duplicate `{UP_MARKER}` marker"));
            }
            seen_up = true;
            section = Section::Up;
            continue;
        }
        if trimmed.eq_ignore_ascii_case(DOWN_MARKER) {
            if section == Section::Down {
                return Err(format!("duplicate `{DOWN_MARKER}` marker"));
            }
            section = Section::Down;
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        match section {
            Section::Header => return Err(format!("SQL before the `{UP_MARKER}` marker")),
            Section::Up => up.push(line),
            Section::Down => down.push(line),
        }
    }

    if !seen_up {
        return Err(format!("missing `{UP_MARKER}` marker"));
    }

    let into_script = |lines: Vec<&str>| {
        let text = lines.join("\n").trim().to_string();
        if text.is_empty() { Vec::new() } else { vec![text] }
    };

    Ok(MigrationRecord {
        up: into_script(up),
        down: into_script(down),
        ..MigrationRecord::new(version, name)
    })
}

fn sql_template(record: &MigrationRecord) -> String {
    let mut text = format!("-- Migration: {}\n", record.name);
    if let Some(created_at) = &record.created_at {
        text.push_str(&format!("-- Created: {created_at}\n"));
    }
    text.push_str(&format!("\n{UP_MARKER}\n\n\n{DOWN_MARKER}\n\n"));
    text
}
