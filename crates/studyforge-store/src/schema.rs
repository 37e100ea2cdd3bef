//! Database schema.

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS topics (
    doc_id TEXT NOT NULL,
    section_id INTEGER NOT NULL,
    section_title TEXT NOT NULL,
    level INTEGER NOT NULL,
    relevance TEXT NOT NULL,
    confidence TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (doc_id, section_id)
);

CREATE INDEX IF NOT EXISTS idx_topics_doc ON topics(doc_id);
"#;
