//! Result store
//!
//! Persists final verdicts to SQLite so past analyses can be listed and
//! inspected. Only verdicts with a scam determination are stored.

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use minerva_core::AnalysisVerdict;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A verdict ready to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResult {
    pub text: String,
    pub summary: Option<String>,
    pub is_scam: bool,
    pub confidence_level: Option<u8>,
}

impl NewResult {
    /// `None` when the verdict states no scam determination
    pub fn from_verdict(verdict: &AnalysisVerdict) -> Option<Self> {
        Some(Self {
            text: verdict.text.clone(),
            summary: verdict.summary.clone(),
            is_scam: verdict.is_scam?,
            confidence_level: verdict.confidence_level,
        })
    }
}

/// A stored analysis
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub text: String,
    pub summary: Option<String>,
    pub is_scam: bool,
    pub confidence_level: Option<i64>,
    pub created_at: NaiveDateTime,
}

impl AnalysisRecord {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            text: row.try_get("text")?,
            summary: row.try_get("summary")?,
            is_scam: row.try_get("is_scam")?,
            confidence_level: row.try_get("confidence_level")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

const CREATE_RESULTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    summary TEXT,
    is_scam BOOLEAN NOT NULL,
    confidence_level INTEGER,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)
"#;

const SELECT_COLUMNS: &str = "SELECT id, text, summary, is_scam, confidence_level, created_at FROM results";

/// SQLite-backed store of final verdicts
#[derive(Clone)]
pub struct ResultStore {
    pool: SqlitePool,
}

impl ResultStore {
    /// Open (creating if needed) the database at `database_url`
    pub async fn open(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init().await?;
        info!("Result store ready at {}", database_url);
        Ok(store)
    }

    /// A private in-memory database, gone when the store is dropped
    pub async fn in_memory() -> Result<Self, StoreError> {
        // Each connection to :memory: is its own database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_RESULTS_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a verdict, returning its id
    pub async fn store_result(&self, result: &NewResult) -> Result<i64, StoreError> {
        let done = sqlx::query(
            "INSERT INTO results (text, summary, is_scam, confidence_level) VALUES (?, ?, ?, ?)",
        )
        .bind(&result.text)
        .bind(&result.summary)
        .bind(result.is_scam)
        .bind(result.confidence_level.map(i64::from))
        .execute(&self.pool)
        .await?;

        let id = done.last_insert_rowid();
        debug!("Stored result {} (scam: {})", id, result.is_scam);
        Ok(id)
    }

    pub async fn get_result(&self, id: i64) -> Result<Option<AnalysisRecord>, StoreError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(AnalysisRecord::from_row).transpose()?)
    }

    /// The `k` most recent results, newest first
    pub async fn top_k(&self, k: u32) -> Result<Vec<AnalysisRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "{} ORDER BY created_at DESC, id DESC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(i64::from(k))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(AnalysisRecord::from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(text: &str, is_scam: bool, confidence: Option<u8>) -> NewResult {
        NewResult {
            text: text.to_string(),
            summary: Some(text.to_string()),
            is_scam,
            confidence_level: confidence,
        }
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let store = ResultStore::in_memory().await.unwrap();
        let id = store
            .store_result(&result("Scam. Confidence level: 90%", true, Some(90)))
            .await
            .unwrap();

        let record = store.get_result(id).await.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.text, "Scam. Confidence level: 90%");
        assert!(record.is_scam);
        assert_eq!(record.confidence_level, Some(90));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = ResultStore::in_memory().await.unwrap();
        assert!(store.get_result(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_top_k_newest_first() {
        let store = ResultStore::in_memory().await.unwrap();
        for (i, scam) in [true, false, true].into_iter().enumerate() {
            store
                .store_result(&result(&format!("verdict {}", i + 1), scam, None))
                .await
                .unwrap();
        }

        let records = store.top_k(2).await.unwrap();
        let texts: Vec<_> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["verdict 3", "verdict 2"]);
        assert!(!records[1].is_scam);
        assert!(records[1].confidence_level.is_none());
    }

    #[test]
    fn test_undetermined_verdict_not_storable() {
        let verdict = AnalysisVerdict::from_text("Could not read the image.");
        assert!(NewResult::from_verdict(&verdict).is_none());

        let verdict = AnalysisVerdict::from_text("This is a scam. Confidence level: 85%");
        let new = NewResult::from_verdict(&verdict).unwrap();
        assert!(new.is_scam);
        assert_eq!(new.confidence_level, Some(85));
    }
}
