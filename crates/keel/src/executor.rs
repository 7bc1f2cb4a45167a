use keel_core::{Direction, MigrationRecord};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, TransactionTrait};

/// Failure reported by a script run; only its message reaches the caller.
pub type ScriptError = Box<dyn std::error::Error + Send + Sync>;

/// Runs one migration's script against a database.
///
/// An executor must either run the whole script or leave the database as it
/// was; the engine records the migration only after `execute` returns `Ok`.
#[allow(async_fn_in_trait)]
pub trait ScriptExecutor {
    async fn execute(
        &mut self,
        direction: Direction,
        migration: &MigrationRecord,
    ) -> Result<(), ScriptError>;
}

/// Executes scripts through a sea-orm connection, one transaction per script.
#[derive(Debug, Clone)]
pub struct SeaOrmExecutor {
    conn: DatabaseConnection,
}

impl SeaOrmExecutor {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn connect(database_url: &str) -> Result<Self, DbErr> {
        let conn = Database::connect(database_url).await?;
        Ok(Self::new(conn))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }
}

impl ScriptExecutor for SeaOrmExecutor {
    async fn execute(
        &mut self,
        direction: Direction,
        migration: &MigrationRecord,
    ) -> Result<(), ScriptError> {
        let txn = self.conn.begin().await?;
        for statement in migration.script(direction) {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            tracing::debug!(version = migration.version, %direction, "{statement}");
            // Dropping `txn` without commit rolls back.
            txn.execute_unprepared(statement).await?;
        }
        txn.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_exists(conn: &DatabaseConnection, name: &str) -> bool {
        conn.execute_unprepared(&format!("SELECT 1 FROM {name}"))
            .await
            .is_ok()
    }

    async fn sqlite_executor(dir: &tempfile::TempDir) -> SeaOrmExecutor {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        SeaOrmExecutor::connect(&url).await.unwrap()
    }

    fn users_migration() -> MigrationRecord {
        MigrationRecord {
            up: vec![
                "CREATE TABLE users (id INTEGER PRIMARY KEY)".into(),
                "  ".into(),
                "CREATE INDEX users_id ON users (id)".into(),
            ],
            down: vec!["DROP TABLE users".into()],
            ..MigrationRecord::new(1, "users")
        }
    }

    #[tokio::test]
    async fn runs_script_in_both_directions() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = sqlite_executor(&dir).await;
        let migration = users_migration();

        executor.execute(Direction::Up, &migration).await.unwrap();
        assert!(table_exists(executor.connection(), "users").await);

        executor.execute(Direction::Down, &migration).await.unwrap();
        assert!(!table_exists(executor.connection(), "users").await);
    }

    #[tokio::test]
    async fn failing_statement_rolls_back_the_script() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = sqlite_executor(&dir).await;
        let migration = MigrationRecord {
            up: vec![
                "CREATE TABLE posts (id INTEGER PRIMARY KEY)".into(),
                "THIS IS NOT SQL".into(),
            ],
            ..MigrationRecord::new(1, "posts")
        };

        let err = executor.execute(Direction::Up, &migration).await;
        assert!(err.is_err());
        assert!(!table_exists(executor.connection(), "posts").await);
    }
}
