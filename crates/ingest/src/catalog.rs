//! Catalog uploads: collapse sales per UPC and upsert products.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::config::OnDuplicate;
use crate::error::IngestError;
use crate::model::{CatalogSummary, NormalizedSale, ProductRecord};
use crate::store::InventoryStore;

/// One record per UPC, taken from its most recent sale. Equal dates resolve
/// to the later line.
pub fn collect_products(sales: &[NormalizedSale]) -> Vec<ProductRecord> {
    let mut latest: BTreeMap<&str, &NormalizedSale> = BTreeMap::new();

    for sale in sales {
        latest
            .entry(sale.upc.as_str())
            .and_modify(|cur| {
                if (sale.sale_date, sale.line) > (cur.sale_date, cur.line) {
                    *cur = sale;
                }
            })
            .or_insert(sale);
    }

    latest
        .into_values()
        .map(|s| ProductRecord {
            upc: s.upc.clone(),
            product_name: s.product_name.clone(),
            unit_price_cents: s.unit_price_cents,
            last_sale_date: s.sale_date,
        })
        .collect()
}

/// Write `records` to the store according to the duplicate policy.
pub fn apply_catalog(
    records: Vec<ProductRecord>,
    store: &dyn InventoryStore,
    on_duplicate: OnDuplicate,
) -> Result<CatalogSummary, IngestError> {
    let mut duplicates = Vec::new();
    for r in &records {
        if store.find_product(&r.upc)?.is_some() {
            duplicates.push(r.upc.clone());
        }
    }

    let products_total = records.len();

    let to_write: Vec<ProductRecord> = match on_duplicate {
        OnDuplicate::Reject if !duplicates.is_empty() => {
            return Err(IngestError::DuplicateProducts { upcs: duplicates });
        }
        OnDuplicate::Skip => records
            .into_iter()
            .filter(|r| duplicates.binary_search(&r.upc).is_err())
            .collect(),
        OnDuplicate::Reject | OnDuplicate::Overwrite => records,
    };

    if !duplicates.is_empty() {
        warn!(count = duplicates.len(), policy = %on_duplicate, "products already in catalog");
    }

    if !to_write.is_empty() {
        store.upsert_products(&to_write)?;
    }
    info!(written = to_write.len(), total = products_total, "catalog updated");

    Ok(CatalogSummary {
        on_duplicate,
        products_total,
        written: to_write.len(),
        duplicates,
    })
}
