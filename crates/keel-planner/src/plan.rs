use keel_core::{Direction, MigrationError, MigrationPlan, MigrationRecord, Version};

/// Build the up plan: available migrations above `current`, ascending.
///
/// `to` bounds the plan by version and wins over `step` when both are given.
/// A `to` equal to the current version yields an empty plan.
pub fn plan_up(
    available: &[MigrationRecord],
    current: Option<Version>,
    step: Option<usize>,
    to: Option<Version>,
) -> Result<MigrationPlan, MigrationError> {
    let current = current.unwrap_or(0);
    let mut migrations: Vec<MigrationRecord> = available
        .iter()
        .filter(|m| m.version > current)
        .cloned()
        .collect();

    if let Some(target) = to {
        if target < current {
            return Err(MigrationError::invalid_target(
                target,
                format!("below the current version {current}"),
            ));
        }
        if target != current && !available.iter().any(|m| m.version == target) {
            return Err(MigrationError::invalid_target(
                target,
                "no migration has this version",
            ));
        }
        migrations.retain(|m| m.version <= target);
    } else if let Some(step) = step {
        migrations.truncate(step);
    }

    Ok(MigrationPlan {
        direction: Direction::Up,
        migrations,
    })
}

/// Build the down plan: applied migrations above `to` (or the last `step`
/// applied), descending.
///
/// `applied` must be ascending. Rolling back requires `step` or `to`; `to = 0`
/// reverts everything.
pub fn plan_down(
    available: &[MigrationRecord],
    applied: &[Version],
    step: Option<usize>,
    to: Option<Version>,
) -> Result<MigrationPlan, MigrationError> {
    let current = applied.last().copied().unwrap_or(0);

    let versions: Vec<Version> = match (to, step) {
        (Some(target), _) => {
            if target > current {
                return Err(MigrationError::invalid_target(
                    target,
                    format!("above the current version {current}"),
                ));
            }
            if target != 0 && !applied.contains(&target) {
                return Err(MigrationError::invalid_target(
                    target,
                    "not an applied version",
                ));
            }
            applied.iter().rev().copied().filter(|v| *v > target).collect()
        }
        (None, Some(step)) => applied.iter().rev().copied().take(step).collect(),
        (None, None) => return Err(MigrationError::AmbiguousRollback),
    };

    let migrations = versions
        .into_iter()
        .map(|version| {
            available
                .iter()
                .find(|m| m.version == version)
                .cloned()
                .ok_or_else(|| {
                    MigrationError::InconsistentState(format!(
                        "applied migration {version} has no migration file"
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MigrationPlan {
        direction: Direction::Down,
        migrations,
    })
}
