//! Schema upgrades, tracked in SQLite's `user_version` pragma.

use rusqlite::{Connection, TransactionBehavior};

use super::error::DatabaseError;

/// Index `i` upgrades the schema from version `i` to `i + 1`.
const STEPS: &[(&str, &str)] = &[
    ("create_pages", include_str!("sql/001_create_pages.sql")),
    ("add_insert_seq", include_str!("sql/002_add_insert_seq.sql")),
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    STEPS.len() as u32
}

pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?)
}

/// Brings the schema up to [`latest_version`], one transaction per step.
pub fn upgrade(conn: &mut Connection) -> Result<(), DatabaseError> {
    let found = schema_version(conn)?;
    if found > latest_version() {
        return Err(DatabaseError::UnsupportedSchema {
            found,
            supported: latest_version(),
        });
    }

    for (index, &(name, sql)) in STEPS.iter().enumerate().skip(found as usize) {
        let version = index as u32 + 1;
        let failed = |source| DatabaseError::Migration {
            version,
            name,
            source,
        };

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(failed)?;
        tx.execute_batch(sql).map_err(failed)?;
        tx.pragma_update(None, "user_version", version)
            .map_err(failed)?;
        tx.commit().map_err(failed)?;

        log::info!("Upgraded page database schema to v{} ({})", version, name);
    }

    Ok(())
}
