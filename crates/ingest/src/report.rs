use crate::model::{
    CatalogSummary, HeaderMapping, IngestionReport, NormalizedSale, ReconciliationOutcome,
    RejectedRow, ReportMeta, ReportSummary,
};
use crate::reconcile::Reconciliation;

/// Tally an ingestion run into its report. Rejections and outcomes are carried
/// through verbatim.
pub fn build_report(
    meta: ReportMeta,
    header_mapping: HeaderMapping,
    accepted: &[NormalizedSale],
    rejected: Vec<RejectedRow>,
    reconciliation: Reconciliation,
    catalog: Option<CatalogSummary>,
) -> IngestionReport {
    let mut summary = ReportSummary {
        rows_total: accepted.len() + rejected.len(),
        rows_accepted: accepted.len(),
        rows_rejected: rejected.len(),
        aggregates_total: reconciliation.outcomes.len(),
        rolled_back: reconciliation.rolled_back,
        ..ReportSummary::default()
    };

    for sale in accepted {
        summary.units_sold = summary.units_sold.saturating_add(sale.quantity);
        summary.revenue_cents = summary.revenue_cents.saturating_add(sale.final_total_cents);
    }

    for o in &reconciliation.outcomes {
        match &o.outcome {
            ReconciliationOutcome::Updated {
                previous_stock,
                new_stock,
                shortfall,
            } => {
                summary.updated += 1;
                summary.units_applied += previous_stock.saturating_sub(*new_stock).max(0) as u64;
                summary.shortfall = summary.shortfall.saturating_add(*shortfall);
            }
            ReconciliationOutcome::LocationNotFound => summary.location_not_found += 1,
            ReconciliationOutcome::ProductNotFound => summary.product_not_found += 1,
            ReconciliationOutcome::InventoryLineNotFound => summary.inventory_line_not_found += 1,
            ReconciliationOutcome::StoreError { .. } => summary.store_errors += 1,
        }
    }

    IngestionReport {
        meta,
        header_mapping,
        summary,
        rejected,
        outcomes: reconciliation.outcomes,
        catalog,
    }
}
