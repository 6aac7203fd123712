//! `stockline-ingest`: vendor sales CSV ingestion.
//!
//! Maps vendor headers onto canonical fields, validates rows, aggregates sales
//! per (site, product) and reconciles them against an [`InventoryStore`].
//! Storage backends live behind that trait; this crate has no database code.

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod header;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod source;
pub mod store;

pub use config::IngestConfig;
pub use engine::{ingest, inspect_headers, HeaderInspection};
pub use error::{HeaderError, IngestError, StoreError};
pub use model::{IngestionReport, ReconciliationOutcome};
pub use store::{InventoryStore, MemoryStore};
