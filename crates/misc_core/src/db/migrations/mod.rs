//! Versioned schema for the `documents` and `document_archive` tables.
//!
//! # Responsibility
//! - Bring a connection up to the latest document schema in one transaction.
//! - Let stores verify a connection is at that schema before use.
//!
//! # Invariants
//! - Steps are listed in ascending version order without gaps.
//! - Each applied step writes its version to `PRAGMA user_version` inside
//!   the same transaction as its DDL.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// One schema step: `(version, sql)`.
type SchemaStep = (u32, &'static str);

const SCHEMA_STEPS: &[SchemaStep] = &[
    (1, include_str!("0001_documents.sql")),
    (2, include_str!("0002_archive_append_only.sql")),
];

/// Schema version this binary writes and expects.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |(version, _)| *version)
}

/// Migrates `conn` to [`latest_version`] and returns the versions applied.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file is ahead of this binary.
/// - `Sqlite` when a step fails; no step of the run is kept.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<Vec<u32>> {
    let from = schema_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    let pending: Vec<SchemaStep> = SCHEMA_STEPS
        .iter()
        .copied()
        .filter(|(version, _)| *version > from)
        .collect();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let tx = conn.transaction()?;
    for (version, sql) in &pending {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    let applied: Vec<u32> = pending.iter().map(|(version, _)| *version).collect();
    for version in &applied {
        info!("event=db_migrate module=db status=ok from={from} version={version}");
    }
    Ok(applied)
}

/// Fails unless `conn` is exactly at [`latest_version`].
pub fn require_latest(conn: &Connection) -> DbResult<()> {
    let actual_version = schema_version(conn)?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(DbError::SchemaNotReady {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
