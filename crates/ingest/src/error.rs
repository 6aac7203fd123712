use thiserror::Error;

use crate::model::CanonicalField;

/// File-level failures. Any of these aborts the ingestion before a report is
/// produced; row and aggregate failures are carried in the report instead.
#[derive(Debug, Error)]
pub enum IngestError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (zero workers, empty keyword list, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("file is empty")]
    EmptyFile,

    #[error("CSV parse error{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Csv { line: Option<u64>, message: String },

    #[error("no data rows found below the header row")]
    NoDataRows,

    /// Mandatory identity columns could not be located in the header row.
    #[error("could not identify required column(s): {}", join_fields(.fields))]
    UnmappedColumns { fields: Vec<CanonicalField> },

    #[error(transparent)]
    Header(#[from] HeaderError),

    /// Catalog upload hit existing products under `on_duplicate = "reject"`.
    #[error("{} product(s) already exist: {}", .upcs.len(), .upcs.join(", "))]
    DuplicateProducts { upcs: Vec<String> },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("cannot start worker pool: {0}")]
    WorkerPool(String),
}

/// Header-row problems detected by the mapper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("header row is empty")]
    Empty,

    /// Two or more headers match a field equally well.
    #[error("ambiguous headers for {field}: {}", .headers.join(", "))]
    Ambiguous {
        field: CanonicalField,
        headers: Vec<String>,
    },
}

/// Failures reported by an [`InventoryStore`](crate::store::InventoryStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The line's stock changed between read and conditional write.
    #[error("write conflict on inventory line {line}")]
    Conflict { line: i64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Backend(String),
}

fn join_fields(fields: &[CanonicalField]) -> String {
    fields.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ")
}
