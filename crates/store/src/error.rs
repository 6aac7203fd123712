use stockline_ingest::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("seed parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
