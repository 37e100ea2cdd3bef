//! SQLite-backed topic repository.
//!
//! Keyed by (doc_id, section_id); saving again overwrites, which is the
//! regeneration path. The full topic travels as JSON in `payload_json`;
//! the indexed columns exist for listing and resume queries.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use studyforge_core::{Error, Result, Topic};

use crate::schema::SCHEMA_SQL;

pub struct TopicStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl TopicStore {
    /// Open or create the store. `db_dir` is a directory; the file will be
    /// `db_dir/topics.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("topics.db");

        let conn = Connection::open(&db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };
        info!("TopicStore initialized: path={}", store.db_path.display());
        Ok(store)
    }

    /// Persist one topic, overwriting any existing row for the same
    /// section. This is the durability point of a generation run.
    pub fn save_topic(&self, doc_id: &str, topic: &Topic) -> Result<()> {
        let payload = serde_json::to_string(topic)?;
        let now = epoch_millis();

        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT OR REPLACE INTO topics
             (doc_id, section_id, section_title, level, relevance, confidence, payload_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            doc_id,
            topic.id,
            topic.section_title,
            topic.level,
            serde_json::to_string(&topic.relevance)?.trim_matches('"'),
            topic.confidence.to_string(),
            payload,
            now,
        ])
        .map_err(|e| Error::Database(e.to_string()))?;

        debug!("saved topic {} for doc {}", topic.id, doc_id);
        Ok(())
    }

    /// All topics for a document, in section order.
    pub fn get_topics(&self, doc_id: &str) -> Result<Vec<Topic>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT payload_json FROM topics WHERE doc_id = ?1 ORDER BY section_id",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![doc_id], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut topics = Vec::new();
        for payload in rows {
            let payload = payload.map_err(|e| Error::Database(e.to_string()))?;
            topics.push(serde_json::from_str(&payload)?);
        }
        Ok(topics)
    }

    /// Section ids already persisted for a document; feeds the resume
    /// skip set.
    pub fn topic_ids(&self, doc_id: &str) -> Result<HashSet<i64>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT section_id FROM topics WHERE doc_id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![doc_id], |row| row.get::<_, i64>(0))
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut ids = HashSet::new();
        for id in rows {
            ids.insert(id.map_err(|e| Error::Database(e.to_string()))?);
        }
        Ok(ids)
    }

    pub fn count_topics(&self, doc_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .prepare_cached("SELECT COUNT(*) FROM topics WHERE doc_id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![doc_id], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count as usize)
    }

    /// Remove all topics for a document (full regeneration).
    pub fn delete_topics(&self, doc_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn
            .prepare_cached("DELETE FROM topics WHERE doc_id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .execute(params![doc_id])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(removed)
    }
}

fn epoch_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
