//! Schema upgrades for the response cache.
//!
//! Each batch is applied inside its own transaction together with its row in
//! `_migrations`, so a failed batch leaves the schema at the previous version.

use super::Error;
use tokio_rusqlite::{Connection, params, rusqlite};

/// Numbered SQL batches, oldest first.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_responses.sql"))];

const VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
)";

fn schema_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    conn.execute(VERSION_TABLE, [])?;
    Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?)
}

fn apply(conn: &mut rusqlite::Connection, version: i64, sql: &str) -> Result<(), Error> {
    let failed = |e: rusqlite::Error| Error::MigrationFailed(format!("version {version}: {e}"));

    let tx = conn.transaction().map_err(failed)?;
    tx.execute_batch(sql).map_err(failed)?;
    tx.execute(
        "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
        params![version, chrono::Utc::now().to_rfc3339()],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

/// Bring the schema up to the newest version.
///
/// # Errors
///
/// `MigrationFailed` names the batch whose SQL was rejected.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let current = schema_version(conn)?;
        for &(version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
            apply(conn, version, sql)?;
            tracing::debug!(version, from = current, "upgraded response cache schema");
        }
        Ok(())
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let has_responses: bool = conn
            .call(|conn| {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='responses')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();

        assert!(has_responses);
    }

    #[tokio::test]
    async fn test_migrations_version_tracking() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let count: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0)))
            .await
            .unwrap();

        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_schema_version_reports_latest() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let version = conn.call(|conn| schema_version(conn)).await.unwrap();
        assert_eq!(version, MIGRATIONS.last().map(|(v, _)| *v).unwrap());
    }
}
