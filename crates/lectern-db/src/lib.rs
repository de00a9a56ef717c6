//! Lectern DB - SQLite vector index and manifest storage.

mod database;
mod error;
mod index;
mod manifest_store;
mod migrations;
mod operations;

pub use database::SqliteIndex;
pub use error::{DbError, DbResult};
pub use manifest_store::JsonManifestStore;
pub use operations::stats::IndexStats;
pub use operations::vectors::{cosine_similarity, decode_vector, encode_vector};
