use std::collections::BTreeMap;

use crate::model::{AggregateKey, NormalizedSale, SalesAggregate};

/// Group sales by (site_code, upc), sum quantities and revenue, track the
/// sale date range.
///
/// Every field of the result is independent of input order: the product name
/// comes from the lowest-numbered line that carries one.
pub fn aggregate_sales(sales: &[NormalizedSale]) -> BTreeMap<AggregateKey, SalesAggregate> {
    let mut groups: BTreeMap<AggregateKey, (SalesAggregate, u64)> = BTreeMap::new();

    for sale in sales {
        let key = sale.key();
        let (agg, name_line) = groups.entry(key.clone()).or_insert_with(|| {
            (
                SalesAggregate {
                    key,
                    quantity: 0,
                    row_count: 0,
                    revenue_cents: 0,
                    product_name: None,
                    first_sale_date: sale.sale_date,
                    last_sale_date: sale.sale_date,
                },
                u64::MAX,
            )
        });

        agg.quantity = agg.quantity.saturating_add(sale.quantity);
        agg.row_count += 1;
        agg.revenue_cents = agg.revenue_cents.saturating_add(sale.final_total_cents);
        agg.first_sale_date = agg.first_sale_date.min(sale.sale_date);
        agg.last_sale_date = agg.last_sale_date.max(sale.sale_date);

        if let Some(ref name) = sale.product_name {
            if sale.line < *name_line {
                agg.product_name = Some(name.clone());
                *name_line = sale.line;
            }
        }
    }

    groups
        .into_iter()
        .map(|(key, (agg, _))| (key, agg))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sale(line: u64, site: &str, upc: &str, date: &str, total: i64) -> NormalizedSale {
        NormalizedSale {
            line,
            site_code: site.into(),
            upc: upc.into(),
            product_name: None,
            sale_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            unit_price_cents: total,
            final_total_cents: total,
            quantity: 1,
        }
    }

    #[test]
    fn same_key_different_dates_merge() {
        let sales = vec![
            sale(2, "SW_02", "012345", "2024-03-01", 150),
            sale(3, "SW_02", "012345", "2024-03-02", 150),
        ];
        let aggs = aggregate_sales(&sales);
        assert_eq!(aggs.len(), 1);
        let agg = &aggs[&AggregateKey::new("SW_02", "012345")];
        assert_eq!(agg.quantity, 2);
        assert_eq!(agg.row_count, 2);
        assert_eq!(agg.revenue_cents, 300);
        assert_eq!(agg.first_sale_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(agg.last_sale_date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn keys_separate_by_site_and_upc() {
        let sales = vec![
            sale(2, "SW_02", "A", "2024-03-01", 100),
            sale(3, "SW_03", "A", "2024-03-01", 100),
            sale(4, "SW_02", "B", "2024-03-01", 100),
        ];
        let aggs = aggregate_sales(&sales);
        assert_eq!(aggs.len(), 3);
        let keys: Vec<String> = aggs.keys().map(|k| k.to_string()).collect();
        // BTreeMap ordering: site first, then upc
        assert_eq!(keys, vec!["SW_02/A", "SW_02/B", "SW_03/A"]);
    }

    #[test]
    fn explicit_quantities_are_summed() {
        let mut a = sale(2, "S", "U", "2024-03-01", 300);
        a.quantity = 3;
        let mut b = sale(3, "S", "U", "2024-03-01", 200);
        b.quantity = 2;
        let aggs = aggregate_sales(&[a, b]);
        assert_eq!(aggs[&AggregateKey::new("S", "U")].quantity, 5);
        assert_eq!(aggs[&AggregateKey::new("S", "U")].row_count, 2);
    }

    #[test]
    fn product_name_from_lowest_line() {
        let mut a = sale(7, "S", "U", "2024-03-01", 100);
        a.product_name = Some("Later".into());
        let mut b = sale(4, "S", "U", "2024-03-01", 100);
        b.product_name = Some("Earlier".into());
        let c = sale(2, "S", "U", "2024-03-01", 100);

        let forward = aggregate_sales(&[a.clone(), b.clone(), c.clone()]);
        let backward = aggregate_sales(&[c, b, a]);
        assert_eq!(forward, backward);
        assert_eq!(
            forward[&AggregateKey::new("S", "U")].product_name.as_deref(),
            Some("Earlier")
        );
    }

    #[test]
    fn empty_input() {
        assert!(aggregate_sales(&[]).is_empty());
    }
}
