//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                    |
//! |------|------------------------------------------------------------|
//! | 0    | Success, every row accepted and every aggregate applied    |
//! | 1    | General error (unspecified)                                |
//! | 2    | CLI usage error (bad args, unreadable input file)          |
//! | 3    | Config file invalid                                        |
//! | 4    | Upload rejected as a whole, nothing written                |
//! | 5    | Partial: rows rejected or aggregates not applied           |
//! | 6    | Store failure (database unreachable, batch rolled back)    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use stockline_ingest::IngestError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing or unreadable files.
pub const EXIT_USAGE: u8 = 2;

/// Config TOML failed to parse or validate.
pub const EXIT_CONFIG_INVALID: u8 = 3;

/// File-level rejection: empty, unparseable, unmapped or ambiguous headers,
/// catalog duplicates under `on_duplicate = "reject"`.
pub const EXIT_FILE_REJECTED: u8 = 4;

/// Ingestion finished but some rows were rejected or some aggregates were
/// not applied to stock.
pub const EXIT_PARTIAL: u8 = 5;

/// The inventory store failed or an all-or-nothing commit was rolled back.
pub const EXIT_STORE: u8 = 6;

/// Map a file-level ingestion error to its exit code.
pub fn ingest_exit_code(err: &IngestError) -> u8 {
    match err {
        IngestError::ConfigParse(_) | IngestError::ConfigValidation(_) => EXIT_CONFIG_INVALID,
        IngestError::EmptyFile
        | IngestError::Csv { .. }
        | IngestError::NoDataRows
        | IngestError::UnmappedColumns { .. }
        | IngestError::Header(_)
        | IngestError::DuplicateProducts { .. } => EXIT_FILE_REJECTED,
        IngestError::Store(_) => EXIT_STORE,
        IngestError::WorkerPool(_) => EXIT_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockline_ingest::StoreError;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_CONFIG_INVALID,
            EXIT_FILE_REJECTED,
            EXIT_PARTIAL,
            EXIT_STORE,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn ingest_errors_map_to_codes() {
        assert_eq!(ingest_exit_code(&IngestError::EmptyFile), EXIT_FILE_REJECTED);
        assert_eq!(ingest_exit_code(&IngestError::ConfigParse("x".into())), EXIT_CONFIG_INVALID);
        assert_eq!(
            ingest_exit_code(&IngestError::Store(StoreError::Backend("down".into()))),
            EXIT_STORE
        );
    }
}
