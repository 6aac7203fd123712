//! Apply aggregated sales to inventory.

use std::collections::BTreeMap;

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::warn;

use crate::config::CommitPolicy;
use crate::error::StoreError;
use crate::model::{AggregateKey, AggregateOutcome, ReconciliationOutcome, SalesAggregate};
use crate::store::{InventoryLine, InventoryStore, StockWrite};

/// Outcomes in key order, plus whether a batch commit was rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub outcomes: Vec<AggregateOutcome>,
    pub rolled_back: bool,
}

/// Stock after selling `quantity` units from `current`, floored at zero.
pub fn apply_sale(current: i64, quantity: u64) -> (i64, u64) {
    let qty = i64::try_from(quantity).unwrap_or(i64::MAX);
    let new_stock = current.saturating_sub(qty).max(0);
    let applied = current.saturating_sub(new_stock).max(0) as u64;
    (new_stock, quantity - applied.min(quantity))
}

pub fn reconcile(
    aggregates: &BTreeMap<AggregateKey, SalesAggregate>,
    store: &dyn InventoryStore,
    policy: CommitPolicy,
    pool: &ThreadPool,
) -> Reconciliation {
    let aggs: Vec<&SalesAggregate> = aggregates.values().collect();

    let mut result = match policy {
        CommitPolicy::PerAggregate => Reconciliation {
            outcomes: pool.install(|| {
                aggs.par_iter()
                    .map(|agg| reconcile_one(*agg, store))
                    .collect()
            }),
            rolled_back: false,
        },
        CommitPolicy::AllOrNothing => reconcile_batch(&aggs, store, pool),
    };

    result.outcomes.sort_by(|a, b| a.key.cmp(&b.key));

    for o in result.outcomes.iter().filter(|o| !o.outcome.is_updated()) {
        warn!(key = %o.key, quantity = o.quantity, outcome = %o.outcome, "aggregate not applied");
    }

    result
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Resolve the inventory line for an aggregate, or the outcome explaining why
/// there is none.
fn lookup(
    key: &AggregateKey,
    store: &dyn InventoryStore,
) -> Result<InventoryLine, ReconciliationOutcome> {
    let location = store
        .find_location(&key.site_code)
        .map_err(store_outcome)?
        .ok_or(ReconciliationOutcome::LocationNotFound)?;
    let product = store
        .find_product(&key.upc)
        .map_err(store_outcome)?
        .ok_or(ReconciliationOutcome::ProductNotFound)?;
    let line = store
        .find_inventory_line(location, product)
        .map_err(store_outcome)?
        .ok_or(ReconciliationOutcome::InventoryLineNotFound)?;
    if line.stock_level < 0 {
        return Err(ReconciliationOutcome::StoreError {
            message: format!(
                "inventory line {} holds negative stock {}",
                line.id.0, line.stock_level
            ),
        });
    }
    Ok(line)
}

fn store_outcome(e: StoreError) -> ReconciliationOutcome {
    ReconciliationOutcome::StoreError {
        message: e.to_string(),
    }
}

fn outcome(agg: &SalesAggregate, outcome: ReconciliationOutcome) -> AggregateOutcome {
    AggregateOutcome {
        key: agg.key.clone(),
        quantity: agg.quantity,
        outcome,
    }
}

// ---------------------------------------------------------------------------
// Per-aggregate commit
// ---------------------------------------------------------------------------

fn reconcile_one(agg: &SalesAggregate, store: &dyn InventoryStore) -> AggregateOutcome {
    let line = match lookup(&agg.key, store) {
        Ok(line) => line,
        Err(o) => return outcome(agg, o),
    };

    let (new_stock, shortfall) = apply_sale(line.stock_level, agg.quantity);
    let result = match store.set_stock(line.id, line.stock_level, new_stock) {
        Ok(()) => ReconciliationOutcome::Updated {
            previous_stock: line.stock_level,
            new_stock,
            shortfall,
        },
        Err(e) => store_outcome(e),
    };
    outcome(agg, result)
}

// ---------------------------------------------------------------------------
// All-or-nothing commit
// ---------------------------------------------------------------------------

fn reconcile_batch(
    aggs: &[&SalesAggregate],
    store: &dyn InventoryStore,
    pool: &ThreadPool,
) -> Reconciliation {
    let looked_up: Vec<(&SalesAggregate, Result<InventoryLine, ReconciliationOutcome>)> = pool
        .install(|| {
            aggs.par_iter()
                .map(|agg| (*agg, lookup(&agg.key, store)))
                .collect()
        });

    let lookup_failure = looked_up.iter().find_map(|(agg, r)| match r {
        Err(ReconciliationOutcome::StoreError { message }) => {
            Some(format!("lookup failed for {}: {message}", agg.key))
        }
        _ => None,
    });

    let mut writes = Vec::new();
    let mut planned = Vec::with_capacity(looked_up.len());
    for (agg, r) in looked_up {
        match r {
            Ok(line) => {
                let (new_stock, shortfall) = apply_sale(line.stock_level, agg.quantity);
                writes.push(StockWrite {
                    line: line.id,
                    expected: line.stock_level,
                    new_stock,
                });
                planned.push(outcome(
                    agg,
                    ReconciliationOutcome::Updated {
                        previous_stock: line.stock_level,
                        new_stock,
                        shortfall,
                    },
                ));
            }
            Err(o) => planned.push(outcome(agg, o)),
        }
    }

    let failure = match lookup_failure {
        Some(cause) => Some(cause),
        None if writes.is_empty() => None,
        None => store.set_stock_batch(&writes).err().map(|e| e.to_string()),
    };

    let Some(cause) = failure else {
        return Reconciliation {
            outcomes: planned,
            rolled_back: false,
        };
    };

    warn!(writes = writes.len(), cause = %cause, "batch commit rolled back");

    for o in planned.iter_mut().filter(|o| o.outcome.is_updated()) {
        o.outcome = ReconciliationOutcome::StoreError {
            message: format!("rolled back: {cause}"),
        };
    }

    Reconciliation {
        outcomes: planned,
        rolled_back: true,
    }
}
