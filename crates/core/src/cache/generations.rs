//! Cache generations and their entries.
//!
//! A generation is a named namespace of request identity → response
//! snapshot. Generations are created on first open and survive restarts
//! until explicitly deleted.

use chrono::Utc;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use crate::{CachedResponse, Error};

/// Handle to an opened generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    name: String,
}

impl Generation {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Row values for one entry, prepared outside the database thread.
struct EntryRow {
    key: String,
    status: i64,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(key: &str, response: &CachedResponse) -> Result<Self, Error> {
        Ok(Self {
            key: key.to_string(),
            status: i64::from(response.status),
            headers_json: response.headers_json()?,
            body: response.body.to_vec(),
        })
    }
}

fn write_rows(conn: &mut rusqlite::Connection, generation: &str, rows: &[EntryRow]) -> Result<(), Error> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
        params![generation, now],
    )?;
    for row in rows {
        tx.execute(
            "INSERT INTO entries (generation, key, status, headers_json, body, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(generation, key) DO UPDATE SET
                status = excluded.status,
                headers_json = excluded.headers_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
            params![generation, &row.key, row.status, &row.headers_json, &row.body, now],
        )?;
    }
    tx.commit()?;
    Ok(())
}

impl CacheDb {
    /// Open a generation, creating it if absent. Idempotent.
    pub async fn open_generation(&self, name: &str) -> Result<Generation, Error> {
        let owned = name.to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![owned, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Generation { name: name.to_string() })
    }

    /// Look up an entry. A miss is `None`, not an error.
    pub async fn get(&self, generation: &Generation, key: &str) -> Result<Option<CachedResponse>, Error> {
        let name = generation.name.clone();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt =
                    conn.prepare("SELECT status, headers_json, body FROM entries WHERE generation = ?1 AND key = ?2")?;

                let result = stmt.query_row(params![name, key], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?))
                });

                match result {
                    Ok((status, headers_json, body)) => {
                        let status = u16::try_from(status).map_err(|e| Error::Encoding(e.to_string()))?;
                        CachedResponse::from_stored(status, &headers_json, body).map(Some)
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Store an entry, replacing any existing one with the same key.
    pub async fn put(&self, generation: &Generation, key: &str, response: &CachedResponse) -> Result<(), Error> {
        self.put_many(generation, &[(key.to_string(), response.clone())]).await
    }

    /// Store several entries in one transaction: all are written or none.
    pub async fn put_many(&self, generation: &Generation, entries: &[(String, CachedResponse)]) -> Result<(), Error> {
        let name = generation.name.clone();
        let rows = entries
            .iter()
            .map(|(key, response)| EntryRow::new(key, response))
            .collect::<Result<Vec<_>, _>>()?;

        self.conn
            .call(move |conn| -> Result<(), Error> { write_rows(conn, &name, &rows) })
            .await
            .map_err(Error::from)
    }

    /// Look up a key in each named generation in order, returning the first hit.
    pub async fn match_any(&self, generations: &[&str], key: &str) -> Result<Option<CachedResponse>, Error> {
        for name in generations {
            let generation = Generation { name: (*name).to_string() };
            if let Some(hit) = self.get(&generation, key).await? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    /// Delete a generation and all its entries.
    ///
    /// Returns false if the generation did not exist.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entries WHERE generation = ?1", params![name])?;
                let deleted = tx.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all existing generations, sorted.
    pub async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Keys stored in a generation, sorted.
    pub async fn entry_keys(&self, generation: &Generation) -> Result<Vec<String>, Error> {
        let name = generation.name.clone();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM entries WHERE generation = ?1 ORDER BY key")?;
                let keys = stmt
                    .query_map(params![name], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}
