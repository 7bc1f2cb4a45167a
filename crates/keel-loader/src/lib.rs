pub mod config;
pub mod memory;
pub mod migrations;
pub mod naming;

pub use config::{load_config, load_config_from_path, load_config_or_default};
pub use memory::MemoryMigrationSource;
pub use migrations::{FsMigrationSource, load_migrations_from_dir, parse_sql_migration};
pub use naming::{migration_filename, sanitize_name, validate_name};
