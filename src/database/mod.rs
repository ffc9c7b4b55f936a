// Storage module
// SQLite holds the relational rows (documents, chunks, QA log, users,
// orders); LanceDB holds the chunk embeddings for similarity search.

pub mod lancedb;
pub mod sqlite;
