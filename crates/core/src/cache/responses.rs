//! Cached response CRUD operations.
//!
//! Rows are addressed by the request-derived cache key and carry the
//! creation timestamp that expiry decisions are made against.

use super::connection::CacheDb;
use crate::Error;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A response payload as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub method: String,
    /// Canonical URL of the request that produced this response.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// A stored response together with the moment it was cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub response: CachedResponse,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Wrap a freshly fetched response, stamped with the current time.
    pub fn new(response: CachedResponse) -> Self {
        Self { response, created_at: Utc::now() }
    }
}

/// Raw column values of one `responses` row.
type ResponseRow = (String, String, String, i64, Option<String>, String, Vec<u8>, String);

fn decode_row(key: &str, row: ResponseRow) -> Result<CacheEntry, Error> {
    let (method, url, final_url, status_code, content_type, headers_json, body, created_at) = row;

    let status_code = u16::try_from(status_code)
        .map_err(|_| Error::CorruptEntry(format!("{key}: status code {status_code} out of range")))?;
    let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)
        .map_err(|e| Error::CorruptEntry(format!("{key}: headers: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::CorruptEntry(format!("{key}: created_at: {e}")))?
        .with_timezone(&Utc);

    Ok(CacheEntry {
        response: CachedResponse { method, url, final_url, status_code, content_type, headers, body },
        created_at,
    })
}

impl CacheDb {
    /// Insert or replace the response cached under `key`.
    pub async fn upsert_response(&self, key: &str, entry: &CacheEntry) -> Result<(), Error> {
        let key = key.to_string();
        let headers_json = serde_json::to_string(&entry.response.headers)
            .map_err(|e| Error::InvalidInput(format!("unserializable headers: {e}")))?;
        let created_at = entry.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true);
        let response = entry.response.clone();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO responses (
                    key, method, url, final_url, status_code, content_type,
                    headers_json, body, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(key) DO UPDATE SET
                    method = excluded.method,
                    url = excluded.url,
                    final_url = excluded.final_url,
                    status_code = excluded.status_code,
                    content_type = excluded.content_type,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    created_at = excluded.created_at",
                    params![
                        &key,
                        &response.method,
                        &response.url,
                        &response.final_url,
                        i64::from(response.status_code),
                        &response.content_type,
                        &headers_json,
                        &response.body,
                        &created_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry cached under `key`.
    ///
    /// Returns None if nothing is stored for the key.
    pub async fn get_response(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, final_url, status_code, content_type,
                        headers_json, body, created_at
                    FROM responses WHERE key = ?1",
                )?;

                let result = stmt.query_row(params![&key], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                    ))
                });

                match result {
                    Ok(row) => decode_row(&key, row).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry cached under `key`. Returns whether a row was removed.
    pub async fn delete_response(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM responses WHERE key = ?1", params![key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// All cached keys, oldest entry first.
    pub async fn response_keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM responses ORDER BY created_at ASC")?;
                let keys = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of cached responses.
    pub async fn count_responses(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every cached response.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_responses(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM responses", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
