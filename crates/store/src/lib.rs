//! `stockline-store`: SQLite implementation of [`InventoryStore`].
//!
//! [`InventoryStore`]: stockline_ingest::InventoryStore

pub mod error;
pub mod seed;
pub mod sqlite;

pub use error::SeedError;
pub use seed::{apply_seed, SeedFile, SeedSummary};
pub use sqlite::{ProductRow, SqliteStore, StockRow};
