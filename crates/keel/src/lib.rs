pub mod engine;
pub mod executor;

pub use engine::{DEFAULT_LOCK_TIMEOUT, Engine, MigrationStatus, StatusEntry};
pub use executor::{ScriptError, ScriptExecutor, SeaOrmExecutor};

pub use keel_core::{
    AppliedMigration, Direction, LockOwner, LockRecord, MigrationError, MigrationRecord,
    MigrationSource, MigrationState, StateStore, Version,
};
