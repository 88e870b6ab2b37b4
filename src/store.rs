//! Interval persistence.
//!
//! One row per `(the_date, time_interval)` key. The write contract is an
//! idempotent upsert: writing the same key twice leaves one row reflecting
//! the later write, so a restart that re-finalizes a bucket cannot create
//! duplicates. At-least-once delivery is the guarantee; exactly-once across
//! process crashes is not.
//!
//! Three implementations:
//! - `SqliteIntervalStore`: local SQLite database (default).
//! - `InMemoryIntervalStore`: tests.
//! - `HttpIntervalStore` (feature `store-http`): PostgREST-style endpoint
//!   with `on_conflict` merge, matching the hosted deployment.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::interval::IntervalRecord;
use crate::ClassCounts;

pub trait IntervalStore {
    /// Idempotent upsert on `(the_date, time_interval)`; last write wins.
    fn upsert(&mut self, record: &IntervalRecord) -> Result<()>;
}

// ----------------------------------------------------------------------------
// SQLite store
// ----------------------------------------------------------------------------

/// One persisted row, as read back for export.
#[derive(Clone, Debug, Serialize)]
pub struct StoredInterval {
    pub the_date: String,
    pub time_interval: String,
    #[serde(flatten)]
    pub counts: ClassCounts,
}

pub struct SqliteIntervalStore {
    conn: Connection,
}

impl SqliteIntervalStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("open interval database {}", db_path))?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS interval_tracking (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              the_date TEXT NOT NULL,
              time_interval TEXT NOT NULL,
              cyc INTEGER NOT NULL DEFAULT 0,
              b INTEGER NOT NULL DEFAULT 0,
              p INTEGER NOT NULL DEFAULT 0,
              c INTEGER NOT NULL DEFAULT 0,
              updated_at INTEGER NOT NULL,
              UNIQUE(the_date, time_interval)
            );

            CREATE INDEX IF NOT EXISTS idx_interval_date ON interval_tracking(the_date);
            "#,
        )?;
        Ok(())
    }

    /// Read rows back in key order, for the export tool.
    pub fn rows(&self, limit: usize) -> Result<Vec<StoredInterval>> {
        let mut stmt = self.conn.prepare(
            "SELECT the_date, time_interval, cyc, b, p, c
             FROM interval_tracking
             ORDER BY the_date, time_interval
             LIMIT ?1",
        )?;
        let mut rows = stmt.query(params![limit as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(StoredInterval {
                the_date: row.get(0)?,
                time_interval: row.get(1)?,
                counts: ClassCounts {
                    cyc: row.get::<_, i64>(2)? as u64,
                    b: row.get::<_, i64>(3)? as u64,
                    p: row.get::<_, i64>(4)? as u64,
                    c: row.get::<_, i64>(5)? as u64,
                },
            });
        }
        Ok(out)
    }

    pub fn row_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM interval_tracking", [], |row| {
                row.get(0)
            })?;
        Ok(count as u64)
    }
}

impl IntervalStore for SqliteIntervalStore {
    fn upsert(&mut self, record: &IntervalRecord) -> Result<()> {
        let updated_at = chrono::Utc::now().timestamp();
        self.conn
            .execute(
                r#"
                INSERT INTO interval_tracking(the_date, time_interval, cyc, b, p, c, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(the_date, time_interval) DO UPDATE SET
                  cyc = excluded.cyc,
                  b = excluded.b,
                  p = excluded.p,
                  c = excluded.c,
                  updated_at = excluded.updated_at
                "#,
                params![
                    record.date.to_string(),
                    record.label,
                    record.counts.cyc as i64,
                    record.counts.b as i64,
                    record.counts.p as i64,
                    record.counts.c as i64,
                    updated_at
                ],
            )
            .with_context(|| {
                format!("upsert interval {} {}", record.date, record.label)
            })?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// In-memory store for tests
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct InMemoryIntervalStore {
    rows: BTreeMap<(String, String), ClassCounts>,
}

impl InMemoryIntervalStore {
    pub fn get(&self, date: &str, label: &str) -> Option<ClassCounts> {
        self.rows
            .get(&(date.to_string(), label.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntervalStore for InMemoryIntervalStore {
    fn upsert(&mut self, record: &IntervalRecord) -> Result<()> {
        self.rows.insert(
            (record.date.to_string(), record.label.clone()),
            record.counts,
        );
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// HTTP store (PostgREST-style), feature-gated
// ----------------------------------------------------------------------------

#[cfg(feature = "store-http")]
pub use http::{HttpIntervalStore, HttpStoreConfig};

#[cfg(feature = "store-http")]
mod http {
    use super::*;
    use url::Url;

    #[derive(Clone, Debug)]
    pub struct HttpStoreConfig {
        /// Service base URL, e.g. `https://project.example.co`.
        pub base_url: Url,
        /// Target table under `/rest/v1/`.
        pub table: String,
        /// API key sent as both `apikey` and bearer token.
        pub api_key: String,
    }

    pub struct HttpIntervalStore {
        config: HttpStoreConfig,
        endpoint: Url,
    }

    impl HttpIntervalStore {
        pub fn new(config: HttpStoreConfig) -> Result<Self> {
            let mut endpoint = config
                .base_url
                .join(&format!("rest/v1/{}", config.table))
                .context("build interval store endpoint")?;
            endpoint.set_query(Some("on_conflict=the_date,time_interval"));
            Ok(Self { config, endpoint })
        }
    }

    impl IntervalStore for HttpIntervalStore {
        fn upsert(&mut self, record: &IntervalRecord) -> Result<()> {
            let body = serde_json::json!({
                "the_date": record.date.to_string(),
                "time_interval": record.label,
                "cyc": record.counts.cyc,
                "b": record.counts.b,
                "p": record.counts.p,
                "c": record.counts.c,
            });
            ureq::post(self.endpoint.as_str())
                .set("apikey", &self.config.api_key)
                .set(
                    "Authorization",
                    &format!("Bearer {}", self.config.api_key),
                )
                .set("Prefer", "resolution=merge-duplicates")
                .send_json(body)
                .with_context(|| {
                    format!("upsert interval {} {}", record.date, record.label)
                })?;
            Ok(())
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::NamedTempFile;

    fn record(label: &str, b: u64) -> IntervalRecord {
        IntervalRecord {
            date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            label: label.to_string(),
            counts: ClassCounts {
                cyc: 0,
                b,
                p: 0,
                c: 0,
            },
        }
    }

    #[test]
    fn sqlite_upsert_round_trips() -> Result<()> {
        let file = NamedTempFile::new()?;
        let mut store = SqliteIntervalStore::open(file.path().to_str().unwrap())?;

        store.upsert(&record("09:00 - 09:15", 3))?;

        let rows = store.rows(10)?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].the_date, "2026-03-10");
        assert_eq!(rows[0].time_interval, "09:00 - 09:15");
        assert_eq!(rows[0].counts.b, 3);
        Ok(())
    }

    #[test]
    fn sqlite_upsert_same_key_twice_keeps_one_row_with_later_write() -> Result<()> {
        let file = NamedTempFile::new()?;
        let mut store = SqliteIntervalStore::open(file.path().to_str().unwrap())?;

        // Simulates a restart re-finalizing the same bucket.
        store.upsert(&record("09:00 - 09:15", 3))?;
        store.upsert(&record("09:00 - 09:15", 5))?;

        assert_eq!(store.row_count()?, 1);
        let rows = store.rows(10)?;
        assert_eq!(rows[0].counts.b, 5);
        Ok(())
    }

    #[test]
    fn sqlite_distinct_keys_get_distinct_rows() -> Result<()> {
        let file = NamedTempFile::new()?;
        let mut store = SqliteIntervalStore::open(file.path().to_str().unwrap())?;

        store.upsert(&record("09:00 - 09:15", 1))?;
        store.upsert(&record("09:15 - 09:30", 2))?;

        assert_eq!(store.row_count()?, 2);
        Ok(())
    }

    #[test]
    fn sqlite_schema_survives_reopen() -> Result<()> {
        let file = NamedTempFile::new()?;
        let path = file.path().to_str().unwrap().to_string();
        {
            let mut store = SqliteIntervalStore::open(&path)?;
            store.upsert(&record("09:00 - 09:15", 4))?;
        }
        let store = SqliteIntervalStore::open(&path)?;
        assert_eq!(store.row_count()?, 1);
        Ok(())
    }

    #[test]
    fn in_memory_upsert_is_idempotent() -> Result<()> {
        let mut store = InMemoryIntervalStore::default();
        store.upsert(&record("09:00 - 09:15", 3))?;
        store.upsert(&record("09:00 - 09:15", 7))?;

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("2026-03-10", "09:00 - 09:15").unwrap().b, 7);
        Ok(())
    }
}
