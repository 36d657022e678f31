//! Data ingestion and storage
//!
//! Page fetching, table extraction, record normalization and SQLite storage.

pub mod database;
pub mod normalize;
pub mod scrapers;
pub mod table;

pub use database::Database;
pub use normalize::{NormalizeRules, NormalizedRecord, NormalizedTable, Value};
pub use table::{locate, RawTable, TableSelector, TableSpec};
