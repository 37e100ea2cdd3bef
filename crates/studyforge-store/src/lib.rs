//! StudyForge Store — persisted topics.
//!
//! The generation loop persists each topic the moment it is accepted; a
//! later run resumes by skipping the ids already present here.

pub mod schema;
pub mod sqlite;

pub use sqlite::TopicStore;
