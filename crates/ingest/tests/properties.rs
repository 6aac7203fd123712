// Property-based tests for aggregation and stock reconciliation.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeMap;

use chrono::NaiveDate;
use proptest::prelude::*;
use stockline_ingest::aggregate::aggregate_sales;
use stockline_ingest::config::CommitPolicy;
use stockline_ingest::model::{AggregateKey, NormalizedSale, ReconciliationOutcome};
use stockline_ingest::reconcile::{apply_sale, reconcile};
use stockline_ingest::MemoryStore;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Small key space so aggregates actually merge.
fn arb_sale() -> impl Strategy<Value = NormalizedSale> {
    (
        2u64..10_000,
        prop_oneof![Just("SW_02"), Just("SW_03"), Just("SW_04")],
        prop_oneof![Just("012345"), Just("067890"), Just("055555")],
        prop::option::of(prop_oneof![Just("Cola"), Just("Chips"), Just("Mix")]),
        0i64..60,
        1i64..100_000,
        1u64..20,
    )
        .prop_map(|(line, site, upc, name, day, cents, quantity)| NormalizedSale {
            line,
            site_code: site.to_string(),
            upc: upc.to_string(),
            product_name: name.map(str::to_string),
            sale_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(day as u64),
            unit_price_cents: cents,
            final_total_cents: cents * quantity as i64,
            quantity,
        })
}

/// Distinct line numbers, as produced by one file.
fn arb_sales() -> impl Strategy<Value = Vec<NormalizedSale>> {
    prop::collection::vec(arb_sale(), 0..60).prop_map(|mut v| {
        for (i, s) in v.iter_mut().enumerate() {
            s.line = i as u64 + 2;
        }
        v
    })
}

fn pool() -> rayon::ThreadPool {
    rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn aggregation_ignores_row_order(
        (sales, shuffled) in arb_sales().prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        prop_assert_eq!(aggregate_sales(&sales), aggregate_sales(&shuffled));
    }

    #[test]
    fn aggregation_conserves_units_and_revenue(sales in arb_sales()) {
        let aggs = aggregate_sales(&sales);
        let units: u64 = aggs.values().map(|a| a.quantity).sum();
        let rows: usize = aggs.values().map(|a| a.row_count).sum();
        let revenue: i64 = aggs.values().map(|a| a.revenue_cents).sum();
        prop_assert_eq!(units, sales.iter().map(|s| s.quantity).sum::<u64>());
        prop_assert_eq!(rows, sales.len());
        prop_assert_eq!(revenue, sales.iter().map(|s| s.final_total_cents).sum::<i64>());
    }

    #[test]
    fn apply_sale_never_goes_negative(current in -5i64..1_000, quantity in 0u64..2_000) {
        let (new_stock, shortfall) = apply_sale(current, quantity);
        prop_assert!(new_stock >= 0);
        prop_assert!(shortfall <= quantity);
        if current >= 0 {
            prop_assert_eq!(new_stock as u64 + (quantity - shortfall), current as u64);
        }
    }

    #[test]
    fn reconciled_stock_is_floored(
        sales in arb_sales(),
        stocks in prop::collection::vec(0i64..30, 9),
        batch in any::<bool>(),
    ) {
        let store = MemoryStore::new();
        let mut initial = BTreeMap::new();
        let mut i = 0;
        for site in ["SW_02", "SW_03", "SW_04"] {
            for upc in ["012345", "067890", "055555"] {
                store.add_line(site, upc, stocks[i]);
                initial.insert(AggregateKey::new(site, upc), stocks[i]);
                i += 1;
            }
        }

        let aggs = aggregate_sales(&sales);
        let policy = if batch { CommitPolicy::AllOrNothing } else { CommitPolicy::PerAggregate };
        let result = reconcile(&aggs, &store, policy, &pool());

        prop_assert!(!result.rolled_back);
        for o in &result.outcomes {
            let start = initial[&o.key];
            let expected = (start - o.quantity as i64).max(0);
            let is_expected_update = matches!(
                o.outcome,
                ReconciliationOutcome::Updated { previous_stock, new_stock, .. }
                    if previous_stock == start && new_stock == expected
            );
            prop_assert!(is_expected_update);
            prop_assert_eq!(store.stock(&o.key.site_code, &o.key.upc), Some(expected));
        }
    }
}
