//! Stored-response reads and the batch precache write.

use std::collections::HashSet;

use super::connection::StoreDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A precached response row.
///
/// Once written during an initialization pass, a row is authoritative for
/// its key until the process ends: no TTL, no revalidation, no eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResponse {
    pub key: String,
    pub method: String,
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers_json: Option<String>,
    pub body: Vec<u8>,
    pub fetched_at: String,
}

impl StoreDb {
    /// Get a stored response by identity key.
    ///
    /// Returns None if the key is not in the store.
    pub async fn get_response(&self, key: &str) -> Result<Option<StoredResponse>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, method, url, final_url, status, content_type, headers_json, body, fetched_at
                     FROM responses WHERE key = ?1",
                )?;

                let result = stmt.query_row(params![key], |row| {
                    Ok(StoredResponse {
                        key: row.get(0)?,
                        method: row.get(1)?,
                        url: row.get(2)?,
                        final_url: row.get(3)?,
                        status: row.get(4)?,
                        content_type: row.get(5)?,
                        headers_json: row.get(6)?,
                        body: row.get(7)?,
                        fetched_at: row.get(8)?,
                    })
                });

                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Write a batch of responses in one transaction.
    ///
    /// This is the initializer's only write path: either every row lands or
    /// none does, and concurrent readers observe the batch atomically.
    pub async fn put_all(&self, rows: Vec<StoredResponse>) -> Result<(), Error> {
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for row in &rows {
                    tx.execute(
                        "INSERT OR REPLACE INTO responses
                            (key, method, url, final_url, status, content_type, headers_json, body, fetched_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                        params![
                            &row.key,
                            &row.method,
                            &row.url,
                            &row.final_url,
                            row.status as i64,
                            &row.content_type,
                            &row.headers_json,
                            &row.body,
                            &row.fetched_at,
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a key is present.
    pub async fn contains(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let present: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM responses WHERE key = ?1)",
                    params![key],
                    |row| row.get(0),
                )?;
                Ok(present)
            })
            .await
            .map_err(Error::from)
    }

    /// Of the given keys, return the subset not yet present in the store.
    pub async fn missing_keys(&self, keys: Vec<String>) -> Result<HashSet<String>, Error> {
        self.conn
            .call(move |conn| -> Result<HashSet<String>, Error> {
                let mut stmt = conn.prepare("SELECT EXISTS(SELECT 1 FROM responses WHERE key = ?1)")?;
                let mut missing = HashSet::new();
                for key in keys {
                    let present: bool = stmt.query_row(params![&key], |row| row.get(0))?;
                    if !present {
                        missing.insert(key);
                    }
                }
                Ok(missing)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored responses.
    pub async fn response_count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
