//! Table layout of the response cache

/// Rows are keyed by (method, url); `access_seq` orders eviction
pub const SCHEMA_SQL: &str = r#"
-- One row per cached request; HEAD rows carry no body
CREATE TABLE IF NOT EXISTS responses (
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    final_url TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB,
    fetched_at TEXT NOT NULL,
    access_seq INTEGER NOT NULL,
    PRIMARY KEY (method, url)
);

CREATE INDEX IF NOT EXISTS idx_responses_access ON responses(access_seq);
"#;

/// Creates the cache table and index if missing; safe to run on every open
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_responses_table_exists() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='responses'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
