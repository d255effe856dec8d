// Persistence: SQLite-backed documents, revisions, and catalogs.

pub mod documents;
pub mod meta_db;
