//! SQLite response cache
//!
//! This module provides the SQLite-backed store behind the HTTP fetcher.

use crate::cache::policy::CachePolicy;
use crate::cache::schema::initialize_schema;
use crate::cache::{CacheError, CacheMethod, CacheResult, CachedResponse};
use crate::config::CacheConfig;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite-backed response cache with a freshness policy and an LRU bound
pub struct ResponseCache {
    conn: Connection,
    policy: CachePolicy,
    max_entries: u64,
}

impl ResponseCache {
    /// Opens (or creates) the cache database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite cache file
    /// * `config` - Cache policy and size bound
    pub fn open(path: &Path, config: &CacheConfig) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            policy: CachePolicy::from_config(config),
            max_entries: config.max_entries,
        })
    }

    /// Creates an in-memory cache (for testing)
    #[cfg(test)]
    pub fn new_in_memory(config: &CacheConfig) -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            policy: CachePolicy::from_config(config),
            max_entries: config.max_entries,
        })
    }

    /// Looks up a fresh entry, touching it for LRU purposes
    ///
    /// Stale entries are deleted and reported as a miss.
    pub fn get(&mut self, method: CacheMethod, url: &str) -> CacheResult<Option<CachedResponse>> {
        self.get_at(method, url, Utc::now())
    }

    fn get_at(
        &mut self,
        method: CacheMethod,
        url: &str,
        now: DateTime<Utc>,
    ) -> CacheResult<Option<CachedResponse>> {
        let row = self
            .conn
            .query_row(
                "SELECT final_url, status, content_type, body, fetched_at
                 FROM responses WHERE method = ?1 AND url = ?2",
                params![method.as_str(), url],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<Vec<u8>>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((final_url, status, content_type, body, fetched_at)) = row else {
            return Ok(None);
        };

        let fetched_at = fetched_at
            .parse::<DateTime<Utc>>()
            .map_err(|e| CacheError::Corrupt(format!("bad timestamp for {}: {}", url, e)))?;

        if !self.policy.is_fresh(url, fetched_at, now) {
            tracing::debug!("Cache entry for {} {} is stale", method.as_str(), url);
            self.conn.execute(
                "DELETE FROM responses WHERE method = ?1 AND url = ?2",
                params![method.as_str(), url],
            )?;
            return Ok(None);
        }

        self.conn.execute(
            "UPDATE responses SET access_seq = (SELECT COALESCE(MAX(access_seq), 0) + 1 FROM responses)
             WHERE method = ?1 AND url = ?2",
            params![method.as_str(), url],
        )?;

        Ok(Some(CachedResponse {
            url: url.to_string(),
            final_url,
            status,
            content_type,
            body: body.unwrap_or_default(),
            fetched_at,
        }))
    }

    /// Stores a response, replacing any previous entry, then enforces the size bound
    pub fn put(&mut self, method: CacheMethod, response: &CachedResponse) -> CacheResult<()> {
        let body: Option<&[u8]> = match method {
            CacheMethod::Get => Some(&response.body),
            CacheMethod::Head => None,
        };
        self.conn.execute(
            "INSERT OR REPLACE INTO responses
             (method, url, final_url, status, content_type, body, fetched_at, access_seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7,
                     (SELECT COALESCE(MAX(access_seq), 0) + 1 FROM responses))",
            params![
                method.as_str(),
                response.url,
                response.final_url,
                response.status,
                response.content_type,
                body,
                response.fetched_at.to_rfc3339(),
            ],
        )?;
        self.evict()
    }

    /// Number of cached entries
    pub fn len(&self) -> CacheResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drops least-recently-used rows beyond `max_entries`
    fn evict(&mut self) -> CacheResult<()> {
        let count = self.len()?;
        if count <= self.max_entries {
            return Ok(());
        }
        let excess = (count - self.max_entries) as i64;
        let removed = self.conn.execute(
            "DELETE FROM responses WHERE rowid IN
             (SELECT rowid FROM responses ORDER BY access_seq ASC LIMIT ?1)",
            params![excess],
        )?;
        tracing::debug!("Evicted {} cache entries", removed);
        Ok(())
    }
}
