//! Versioned schema upgrades for the record store.
//!
//! # Responsibility
//! - Name each schema step and the version it brings the store to.
//! - Upgrade a store from its recorded version in one transaction.
//!
//! # Invariants
//! - Step versions start at 1 and increase by exactly one.
//! - The store's version lives in `PRAGMA user_version` and is bumped per step.
//! - A store recorded at a version this build does not know is never touched.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;
use std::time::Instant;

/// One schema step.
#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "articles",
        sql: include_str!("0001_articles.sql"),
    },
    SchemaStep {
        version: 2,
        name: "comments",
        sql: include_str!("0002_comments.sql"),
    },
];

/// Versions a store moved through during [`apply_migrations`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    pub from_version: u32,
    pub to_version: u32,
    /// Names of the steps applied, oldest first.
    pub applied: Vec<&'static str>,
}

impl UpgradeReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Schema version this build upgrades stores to.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Schema version recorded in the store.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

fn steps_after(version: u32) -> &'static [SchemaStep] {
    let start = SCHEMA_STEPS.partition_point(|step| step.version <= version);
    &SCHEMA_STEPS[start..]
}

/// Upgrades `conn` to [`latest_version`].
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the store is newer than this build.
/// - `Sqlite` when a step fails; the whole upgrade is rolled back.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<UpgradeReport> {
    let from_version = schema_version(conn)?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending = steps_after(from_version);
    let mut report = UpgradeReport {
        from_version,
        to_version: from_version,
        applied: Vec::with_capacity(pending.len()),
    };
    if pending.is_empty() {
        return Ok(report);
    }

    let tx = conn.transaction()?;
    for step in pending {
        let started_at = Instant::now();
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={} duration_ms={}",
            step.version,
            step.name,
            started_at.elapsed().as_millis()
        );
        report.to_version = step.version;
        report.applied.push(step.name);
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} steps={}",
        report.from_version,
        report.to_version,
        report.applied.len()
    );
    Ok(report)
}
