pub mod error;
pub mod lock;
pub mod migration;
pub mod store;

pub use error::MigrationError;
pub use lock::{LockOwner, LockRecord};
pub use migration::{
    AppliedMigration, Direction, MigrationPlan, MigrationRecord, MigrationState, Version,
};
pub use store::{MigrationSource, StateStore};
