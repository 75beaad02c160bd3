//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL and seed data (SQLite-first)
//! - `sqlite.rs`: `Storage`, the query layer used by the services

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{DbDailyFact, DbProfile};
pub use schema::SQLITE_INIT;
pub use sqlite::{SqlitePool, Storage};
