pub mod config;
pub mod file_format;

pub use config::{
    CONFIG_FILE_NAME, DATABASE_URL_ENV, KeelConfig, default_migration_filename_pattern,
};
pub use file_format::FileFormat;

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;

    #[test]
    fn default_values_use_standard_paths() {
        let cfg = KeelConfig::default();
        assert_eq!(cfg.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(cfg.state_file, PathBuf::from(".keel/state.json"));
        assert_eq!(cfg.migration_format(), FileFormat::Json);
    }

    #[test]
    fn overrides_work_via_struct_update() {
        let cfg = KeelConfig {
            migrations_dir: PathBuf::from("db/migrations"),
            state_file: PathBuf::from("db/state.json"),
            migration_format: FileFormat::Sql,
            ..Default::default()
        };

        assert_eq!(cfg.migrations_dir(), Path::new("db/migrations"));
        assert_eq!(cfg.state_file(), Path::new("db/state.json"));
        assert_eq!(cfg.migration_format(), FileFormat::Sql);
    }
}
