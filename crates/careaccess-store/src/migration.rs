//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {current} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Registered subjects and the role they act in
        CREATE TABLE principals (
            subject TEXT NOT NULL,
            role INTEGER NOT NULL,            -- 1 = patient, 2 = doctor
            registered_at INTEGER NOT NULL,   -- Unix ms
            PRIMARY KEY (subject, role)
        );

        -- Delegated access grants, one row per grant
        CREATE TABLE grants (
            grant_id BLOB PRIMARY KEY,        -- 16 random bytes
            patient_id TEXT NOT NULL,
            doctor_id TEXT NOT NULL,
            token_digest BLOB NOT NULL UNIQUE,-- 32 bytes, Blake3 of the token
            issued_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,      -- exclusive
            revoked INTEGER NOT NULL DEFAULT 0,
            revoked_at INTEGER,
            max_uses INTEGER,                 -- NULL = unlimited
            use_count INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX idx_grants_patient_doctor ON grants(patient_id, doctor_id);
        CREATE INDEX idx_grants_expires ON grants(expires_at);

        -- Medical records; grant_id is kept after the grant is purged
        CREATE TABLE records (
            record_id BLOB PRIMARY KEY,       -- 16 random bytes
            patient_id TEXT NOT NULL,
            doctor_id TEXT NOT NULL,
            grant_id BLOB NOT NULL,
            diagnosis TEXT NOT NULL,
            symptoms BLOB NOT NULL,           -- CBOR array of strings
            prescriptions BLOB NOT NULL,      -- CBOR array of strings
            notes TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX idx_records_patient ON records(patient_id, created_at);
        "#,
    )?;

    Ok(())
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            [CURRENT_VERSION + 1],
        )
        .unwrap();
        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
