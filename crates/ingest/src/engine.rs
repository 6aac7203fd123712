use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::aggregate::aggregate_sales;
use crate::catalog::{apply_catalog, collect_products};
use crate::config::{IngestConfig, IngestMode};
use crate::error::IngestError;
use crate::header::map_headers;
use crate::model::{HeaderMapping, IngestionReport, NormalizedSale, RejectedRow, ReportMeta};
use crate::normalize::{normalize_row, NormalizeRules};
use crate::reconcile::{reconcile, Reconciliation};
use crate::report::build_report;
use crate::source::{decode, read_table, sniff_delimiter, DelimiterGuess, SourceTable};
use crate::store::InventoryStore;

/// Run one upload through the pipeline.
///
/// File-level problems return `Err` before anything is written. Row and
/// aggregate problems are reported in the returned [`IngestionReport`].
pub fn ingest(
    bytes: &[u8],
    store: &dyn InventoryStore,
    config: &IngestConfig,
) -> Result<IngestionReport, IngestError> {
    config.validate()?;

    let file_digest = format!("{:x}", Sha256::digest(bytes));
    let (table, mapping, _) = load_table(bytes, config)?;

    info!(
        rows = table.rows.len(),
        delimiter = %(table.delimiter as char),
        digest = %file_digest,
        "file accepted"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .map_err(|e| IngestError::WorkerPool(e.to_string()))?;

    let rules = NormalizeRules {
        site_code_strip_prefixes: config.site_code_strip_prefixes.clone(),
    };
    let results: Vec<Result<NormalizedSale, RejectedRow>> = pool.install(|| {
        table
            .rows
            .par_iter()
            .map(|row| normalize_row(row, &mapping, &rules))
            .collect()
    });

    let mut accepted = Vec::with_capacity(results.len());
    let mut rejected = Vec::new();
    for r in results {
        match r {
            Ok(sale) => accepted.push(sale),
            Err(rej) => {
                debug!(line = rej.line, reasons = %rej.reasons.join("; "), "row rejected");
                rejected.push(rej);
            }
        }
    }

    let (reconciliation, catalog) = match config.mode {
        IngestMode::Reconcile => {
            let aggregates = aggregate_sales(&accepted);
            (
                reconcile(&aggregates, store, config.commit_policy, &pool),
                None,
            )
        }
        IngestMode::Catalog => {
            let records = collect_products(&accepted);
            let summary = apply_catalog(records, store, config.on_duplicate)?;
            (
                Reconciliation {
                    outcomes: Vec::new(),
                    rolled_back: false,
                },
                Some(summary),
            )
        }
    };

    let meta = ReportMeta {
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        run_at: chrono::Utc::now().to_rfc3339(),
        mode: config.mode,
        file_digest,
        delimiter: table.delimiter as char,
    };

    let report = build_report(meta, mapping, &accepted, rejected, reconciliation, catalog);

    let s = &report.summary;
    info!(
        rows = s.rows_total,
        accepted = s.rows_accepted,
        rejected = s.rows_rejected,
        aggregates = s.aggregates_total,
        updated = s.updated,
        "ingestion complete"
    );

    Ok(report)
}

/// A file's header row, how it was split, and how it maps.
#[derive(Debug, Clone, Serialize)]
pub struct HeaderInspection {
    pub delimiter: char,
    /// Detection detail; absent when the delimiter is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sniffed: Option<DelimiterGuess>,
    pub headers: Vec<String>,
    pub mapping: HeaderMapping,
}

/// Decode, parse and map the header row without touching a store.
pub fn inspect_headers(bytes: &[u8], config: &IngestConfig) -> Result<HeaderInspection, IngestError> {
    config.validate()?;
    let (table, mapping, sniffed) = load_table(bytes, config)?;
    Ok(HeaderInspection {
        delimiter: table.delimiter as char,
        sniffed,
        headers: table.headers,
        mapping,
    })
}

fn load_table(
    bytes: &[u8],
    config: &IngestConfig,
) -> Result<(SourceTable, HeaderMapping, Option<DelimiterGuess>), IngestError> {
    let text = decode(bytes)?;
    let (delimiter, sniffed) = match config.delimiter {
        Some(d) => (d as u8, None),
        None => {
            let guess = sniff_delimiter(&text);
            debug!(
                delimiter = %guess.delimiter,
                columns = guess.columns,
                matching = guess.matching_rows,
                sampled = guess.sampled_rows,
                "delimiter sniffed"
            );
            (guess.byte(), Some(guess))
        }
    };
    let table = read_table(&text, delimiter)?;

    let mapping = map_headers(&table.headers, &config.keywords, config.header_strategy)?;
    let missing = mapping.missing_identity();
    if !missing.is_empty() {
        return Err(IngestError::UnmappedColumns { fields: missing });
    }

    if table.rows.is_empty() {
        return Err(IngestError::NoDataRows);
    }

    Ok((table, mapping, sniffed))
}
