use std::time::Duration;

use chrono::{DateTime, Utc};
use keel_core::{
    AppliedMigration, Direction, LockOwner, LockRecord, MigrationError, MigrationPlan,
    MigrationRecord, MigrationSource, MigrationState, StateStore, Version,
};
use keel_planner::{plan_down, plan_up, validate_applied};

use crate::executor::ScriptExecutor;

/// Default age after which a held lock is reported as stale.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(600);

/// Coordinates the migration source, the state store and a script executor.
///
/// Each engine carries its own lock identity, so two engines over clones of
/// one state store exclude each other like two processes would.
#[derive(Debug)]
pub struct Engine<S, T> {
    source: S,
    state: T,
    owner: LockOwner,
    lock_timeout: Duration,
}

/// One row of [`Engine::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub version: Version,
    pub name: String,
    pub state: MigrationState,
    pub applied_at: Option<DateTime<Utc>>,
}

/// Snapshot of applied history, pending migrations and the lock.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub current: Option<Version>,
    pub applied: Vec<AppliedMigration>,
    pub pending: Vec<MigrationRecord>,
    pub lock: Option<LockRecord>,
    pub stale: bool,
    pub entries: Vec<StatusEntry>,
}

impl MigrationStatus {
    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }
}

/// How a locked run ended early.
enum Interrupted {
    /// Nothing is half-recorded; the lock can go.
    Release(MigrationError),
    /// A script succeeded but recording it failed; the database and the
    /// applied history may disagree until an operator checks.
    KeepLock(MigrationError),
}

impl<S: MigrationSource, T: StateStore> Engine<S, T> {
    pub fn new(source: S, state: T) -> Self {
        Self {
            source,
            state,
            owner: LockOwner::current(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn state(&self) -> &T {
        &self.state
    }

    pub fn owner(&self) -> &LockOwner {
        &self.owner
    }

    /// Create an empty migration with the next version; returns its filename.
    pub fn generate(&self, name: &str) -> Result<String, MigrationError> {
        let filename = self.source.generate(name, Utc::now())?;
        tracing::info!(%filename, "generated migration");
        Ok(filename)
    }

    /// Apply pending migrations in ascending order. Returns how many ran.
    pub async fn migrate_up<E: ScriptExecutor>(
        &self,
        executor: &mut E,
        step: Option<usize>,
        to: Option<Version>,
    ) -> Result<usize, MigrationError> {
        self.run(executor, Direction::Up, step, to).await
    }

    /// Revert applied migrations in descending order. Returns how many ran.
    ///
    /// Requires `step` or `to`; `to = 0` reverts everything.
    pub async fn migrate_down<E: ScriptExecutor>(
        &self,
        executor: &mut E,
        step: Option<usize>,
        to: Option<Version>,
    ) -> Result<usize, MigrationError> {
        if step.is_none() && to.is_none() {
            return Err(MigrationError::AmbiguousRollback);
        }
        self.run(executor, Direction::Down, step, to).await
    }

    /// Applied history, most recent first.
    pub fn view(&self, max_count: Option<usize>) -> Result<Vec<AppliedMigration>, MigrationError> {
        let mut applied = self.state.applied()?;
        applied.reverse();
        if let Some(max_count) = max_count {
            applied.truncate(max_count);
        }
        Ok(applied)
    }

    pub fn status(&self) -> Result<MigrationStatus, MigrationError> {
        let available = self.source.list_available()?;
        let applied = self.state.applied()?;
        let versions: Vec<Version> = applied.iter().map(|m| m.version).collect();
        validate_applied(&available, &versions)?;

        let lock = self.state.read_lock()?;
        let stale = lock
            .as_ref()
            .is_some_and(|l| l.is_stale(Utc::now(), self.lock_timeout));

        let mut entries: Vec<StatusEntry> = available
            .iter()
            .map(|record| {
                let applied_at = applied
                    .iter()
                    .find(|m| m.version == record.version)
                    .map(|m| m.applied_at);
                let state = if applied_at.is_some() {
                    MigrationState::Applied
                } else {
                    MigrationState::Pending
                };
                StatusEntry {
                    version: record.version,
                    name: record.name.clone(),
                    state,
                    applied_at,
                }
            })
            .collect();

        // Mark the migration an in-flight run is working on.
        if let Some(lock) = &lock {
            let target = match lock.operation {
                Direction::Up => entries
                    .iter_mut()
                    .find(|e| e.state == MigrationState::Pending),
                Direction::Down => entries
                    .iter_mut()
                    .rev()
                    .find(|e| e.state == MigrationState::Applied),
            };
            if let Some(entry) = target {
                if let Some(next) = entry.state.begin(lock.operation) {
                    entry.state = next;
                }
            }
        }

        let pending = available
            .into_iter()
            .filter(|r| !versions.contains(&r.version))
            .collect();

        Ok(MigrationStatus {
            current: versions.last().copied(),
            applied,
            pending,
            lock,
            stale,
            entries,
        })
    }

    /// Remove whatever lock is present and return it.
    pub fn force_unlock(&self) -> Result<Option<LockRecord>, MigrationError> {
        let cleared = self.state.clear_lock()?;
        match &cleared {
            Some(lock) => tracing::warn!(
                owner = %lock.owner,
                operation = %lock.operation,
                acquired_at = %lock.acquired_at,
                "cleared migration lock"
            ),
            None => tracing::info!("no migration lock to clear"),
        }
        Ok(cleared)
    }

    async fn run<E: ScriptExecutor>(
        &self,
        executor: &mut E,
        direction: Direction,
        step: Option<usize>,
        to: Option<Version>,
    ) -> Result<usize, MigrationError> {
        self.state
            .acquire_lock(&self.owner, direction, Utc::now(), self.lock_timeout)?;
        tracing::debug!(owner = %self.owner, %direction, "acquired migration lock");

        match self.run_locked(executor, direction, step, to).await {
            Ok(count) => {
                // Every migration is already recorded; a stuck lock is left
                // for `keel unlock` rather than reported as a failed run.
                if let Err(release_err) = self.state.release_lock(&self.owner) {
                    tracing::error!(
                        error = %release_err,
                        count,
                        "migrations recorded but the lock could not be released"
                    );
                }
                Ok(count)
            }
            Err(Interrupted::Release(err)) => {
                if let Err(release_err) = self.state.release_lock(&self.owner) {
                    tracing::error!(error = %release_err, "failed to release migration lock");
                }
                Err(err)
            }
            Err(Interrupted::KeepLock(err)) => {
                tracing::error!(
                    owner = %self.owner,
                    "migration lock kept; verify the database, then run `keel unlock`"
                );
                Err(err)
            }
        }
    }

    async fn run_locked<E: ScriptExecutor>(
        &self,
        executor: &mut E,
        direction: Direction,
        step: Option<usize>,
        to: Option<Version>,
    ) -> Result<usize, Interrupted> {
        let plan = self.plan(direction, step, to).map_err(Interrupted::Release)?;
        if plan.is_empty() {
            tracing::info!(%direction, "nothing to do");
            return Ok(0);
        }
        tracing::info!(%direction, count = plan.len(), versions = ?plan.versions(), "running migrations");

        let mut completed = 0;
        for migration in &plan.migrations {
            let state = match direction {
                Direction::Up => MigrationState::Applying,
                Direction::Down => MigrationState::Reverting,
            };
            tracing::info!(version = migration.version, name = %migration.name, %state, "running script");

            if let Err(err) = executor.execute(direction, migration).await {
                tracing::error!(
                    version = migration.version,
                    name = %migration.name,
                    state = %state.finish(false),
                    error = %err,
                    "script failed"
                );
                return Err(Interrupted::Release(MigrationError::ScriptExecution {
                    version: migration.version,
                    name: migration.name.clone(),
                    direction,
                    completed,
                    message: err.to_string(),
                }));
            }

            self.record(direction, migration)
                .map_err(Interrupted::KeepLock)?;
            completed += 1;
            tracing::info!(
                version = migration.version,
                state = %state.finish(true),
                "migration done"
            );
        }
        Ok(completed)
    }

    fn plan(
        &self,
        direction: Direction,
        step: Option<usize>,
        to: Option<Version>,
    ) -> Result<MigrationPlan, MigrationError> {
        let available = self.source.list_available()?;
        let applied = self.state.applied_versions()?;
        validate_applied(&available, &applied)?;
        match direction {
            Direction::Up => plan_up(&available, applied.last().copied(), step, to),
            Direction::Down => plan_down(&available, &applied, step, to),
        }
    }

    fn record(&self, direction: Direction, migration: &MigrationRecord) -> Result<(), MigrationError> {
        match direction {
            Direction::Up => self
                .state
                .mark_applied(migration.version, &migration.name, Utc::now()),
            Direction::Down => self.state.mark_unapplied(migration.version),
        }
    }
}
