use crate::error::LocalStoreError;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS cats (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS authors (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    death INTEGER,
    death_inexact_label TEXT
);
CREATE TABLE IF NOT EXISTS books (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT,
    author_id INTEGER,
    cat_id INTEGER,
    pdf_links TEXT,
    has_pdf INTEGER NOT NULL DEFAULT 0,
    info_long TEXT,
    printed TEXT,
    size REAL
);
";

/// Handle to the local SQLite cache. Holds only the file path: every call
/// opens its own connection and releases it before returning.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs one statement on the blocking pool and maps every returned row.
    pub async fn query<T, F>(
        &self,
        sql: &'static str,
        params: Vec<SqlValue>,
        map: F,
    ) -> Result<Vec<T>, LocalStoreError>
    where
        T: Send + 'static,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let logged_params = params.clone();
        let result = tokio::task::spawn_blocking(move || query_once(&path, sql, params, map))
            .await
            .map_err(|err| LocalStoreError::Worker(err.to_string()))
            .and_then(|inner| inner);
        if let Err(err) = &result {
            log::error!(
                "[local-store] query failed err=\"{}\" sql=\"{}\" params={:?}",
                err,
                compact_sql(sql),
                logged_params
            );
        }
        result
    }

    /// Runs one write statement and returns the number of changed rows.
    pub async fn execute(
        &self,
        sql: &'static str,
        params: Vec<SqlValue>,
    ) -> Result<usize, LocalStoreError> {
        let path = self.path.clone();
        let logged_params = params.clone();
        let result = tokio::task::spawn_blocking(move || execute_once(&path, sql, params))
            .await
            .map_err(|err| LocalStoreError::Worker(err.to_string()))
            .and_then(|inner| inner);
        if let Err(err) = &result {
            log::error!(
                "[local-store] statement failed err=\"{}\" sql=\"{}\" params={:?}",
                err,
                compact_sql(sql),
                logged_params
            );
        }
        result
    }

    /// Opens the one connection that batch enrichment keeps for a whole batch.
    pub fn open_batch_connection(&self) -> Result<Connection, LocalStoreError> {
        open_existing(&self.path)
    }
}

fn open_existing(path: &Path) -> Result<Connection, LocalStoreError> {
    // The cache is seeded out of band, so a missing file is an error.
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

fn query_once<T, F>(
    path: &Path,
    sql: &str,
    params: Vec<SqlValue>,
    mut map: F,
) -> Result<Vec<T>, LocalStoreError>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut conn = open_existing(path)?;
    let tx = conn.transaction()?;
    let rows = {
        let mut stmt = tx.prepare(sql)?;
        let mapped = stmt.query_map(rusqlite::params_from_iter(params), |row| map(row))?;
        let mut rows = Vec::new();
        for row in mapped {
            rows.push(row?);
        }
        rows
    };
    tx.commit()?;
    Ok(rows)
}

fn execute_once(path: &Path, sql: &str, params: Vec<SqlValue>) -> Result<usize, LocalStoreError> {
    let mut conn = open_existing(path)?;
    let tx = conn.transaction()?;
    let changed = tx.execute(sql, rusqlite::params_from_iter(params))?;
    tx.commit()?;
    Ok(changed)
}

pub(crate) fn compact_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Creates the cache tables when missing. Row seeding stays outside this crate.
pub fn init_schema(path: &Path) -> Result<Connection, LocalStoreError> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            id TEXT PRIMARY KEY NOT NULL,
            applied_at INTEGER NOT NULL
        );",
    )?;
    apply_migration(&conn, "0000_library_cache", SCHEMA_SQL)?;
    Ok(conn)
}

fn apply_migration(conn: &Connection, id: &str, sql: &str) -> Result<(), LocalStoreError> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM schema_migrations WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Ok(());
    }
    conn.execute_batch(sql)?;
    conn.execute(
        "INSERT INTO schema_migrations (id, applied_at) VALUES (?1, ?2)",
        params![id, chrono::Utc::now().timestamp_millis()],
    )?;
    Ok(())
}

/// Reads a loosely typed column as text; imported rows mix integers and labels.
pub(crate) fn column_text(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(value) => Some(value.to_string()),
        ValueRef::Real(value) => Some(value.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    })
}

/// Reads a key column that may have been imported as text or real.
pub(crate) fn column_i64(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<i64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(value) => Some(value),
        ValueRef::Real(value) if value.fract() == 0.0 => Some(value as i64),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.trim().parse::<i64>().ok()),
        _ => None,
    })
}

pub(crate) fn column_f64(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<f64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(value) => Some(value as f64),
        ValueRef::Real(value) => Some(value),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.trim().parse::<f64>().ok()),
        _ => None,
    })
}

/// Converts a column into JSON without forcing a type.
pub(crate) fn column_json(row: &Row<'_>, idx: usize) -> rusqlite::Result<serde_json::Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(value) => serde_json::Value::from(value),
        ValueRef::Real(value) => serde_json::Value::from(value),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    })
}
