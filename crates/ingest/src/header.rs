//! Header row → canonical field mapping.
//!
//! Vendors name the same column differently (`Location_ID`, `Site Code`,
//! `machine name`), so columns are found by keyword containment on a
//! normalized form of the header rather than by exact name.

use tracing::debug;

use crate::config::{HeaderStrategy, KeywordConfig};
use crate::error::HeaderError;
use crate::model::{CanonicalField, HeaderMapping};

/// Lower-case, trim, and turn spaces and hyphens into underscores.
pub fn normalize_header(s: &str) -> String {
    s.trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Map a header row onto the canonical fields.
pub fn map_headers(
    headers: &[String],
    keywords: &KeywordConfig,
    strategy: HeaderStrategy,
) -> Result<HeaderMapping, HeaderError> {
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(HeaderError::Empty);
    }

    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();

    let mapping = match strategy {
        HeaderStrategy::FirstMatch => map_first_match(headers, &normalized, keywords),
        HeaderStrategy::Exclusive => map_exclusive(headers, &normalized, keywords)?,
    };

    for (field, header) in mapping.iter() {
        debug!(field = %field, header, "mapped column");
    }

    Ok(mapping)
}

/// First keyword (priority order), first header (column order) wins.
fn map_first_match(
    headers: &[String],
    normalized: &[String],
    keywords: &KeywordConfig,
) -> HeaderMapping {
    let mut pairs = Vec::new();

    for field in CanonicalField::ALL {
        let hit = keywords.for_field(field).iter().find_map(|kw| {
            let kw = normalize_header(kw);
            normalized.iter().position(|h| h.contains(&kw))
        });
        if let Some(idx) = hit {
            pairs.push((field, headers[idx].clone()));
        }
    }

    HeaderMapping::from_pairs(pairs)
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    field: CanonicalField,
    column: usize,
    score: usize,
}

/// Greedy one-to-one allocation by keyword specificity.
///
/// Every (header, field) pair scores the length of the longest keyword for
/// that field the header contains. Candidates are taken best score first
/// (field order, then column order break ties). A field whose best free
/// candidate is tied by another free header is ambiguous.
fn map_exclusive(
    headers: &[String],
    normalized: &[String],
    keywords: &KeywordConfig,
) -> Result<HeaderMapping, HeaderError> {
    let mut candidates = Vec::new();

    for (field_rank, field) in CanonicalField::ALL.into_iter().enumerate() {
        let kws: Vec<String> = keywords
            .for_field(field)
            .iter()
            .map(|k| normalize_header(k))
            .collect();
        for (column, header) in normalized.iter().enumerate() {
            let best = kws
                .iter()
                .filter(|kw| header.contains(kw.as_str()))
                .map(|kw| kw.len())
                .max();
            if let Some(score) = best {
                candidates.push((field_rank, Candidate { field, column, score }));
            }
        }
    }

    candidates.sort_by(|(ra, a), (rb, b)| {
        b.score
            .cmp(&a.score)
            .then(ra.cmp(rb))
            .then(a.column.cmp(&b.column))
    });

    let mut column_taken = vec![false; headers.len()];
    let mut pairs: Vec<(CanonicalField, String)> = Vec::new();

    for (_, cand) in &candidates {
        if column_taken[cand.column] || pairs.iter().any(|(f, _)| *f == cand.field) {
            continue;
        }

        let rivals: Vec<usize> = candidates
            .iter()
            .map(|(_, c)| c)
            .filter(|c| {
                c.field == cand.field
                    && c.score == cand.score
                    && c.column != cand.column
                    && !column_taken[c.column]
            })
            .map(|c| c.column)
            .collect();

        if !rivals.is_empty() {
            let mut cols = vec![cand.column];
            cols.extend(rivals);
            cols.sort_unstable();
            return Err(HeaderError::Ambiguous {
                field: cand.field,
                headers: cols.into_iter().map(|c| headers[c].clone()).collect(),
            });
        }

        column_taken[cand.column] = true;
        pairs.push((cand.field, headers[cand.column].clone()));
    }

    Ok(HeaderMapping::from_pairs(pairs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hdrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn map(list: &[&str], strategy: HeaderStrategy) -> HeaderMapping {
        map_headers(&hdrs(list), &KeywordConfig::default(), strategy).unwrap()
    }

    #[test]
    fn normalize_spaces_and_case() {
        assert_eq!(normalize_header("  Site Code "), "site_code");
        assert_eq!(normalize_header("Sale-Date"), "sale_date");
        assert_eq!(normalize_header("\u{feff}Location_ID"), "location_id");
    }

    #[test]
    fn vendor_a_headers() {
        let m = map(
            &["Location_ID", "Scancode", "Product Name", "Sale Date", "Unit Price", "Final Total"],
            HeaderStrategy::Exclusive,
        );
        assert_eq!(m.get(CanonicalField::SiteCode), Some("Location_ID"));
        assert_eq!(m.get(CanonicalField::Upc), Some("Scancode"));
        assert_eq!(m.get(CanonicalField::ProductName), Some("Product Name"));
        assert_eq!(m.get(CanonicalField::SaleDate), Some("Sale Date"));
        assert_eq!(m.get(CanonicalField::UnitPrice), Some("Unit Price"));
        assert_eq!(m.get(CanonicalField::FinalTotal), Some("Final Total"));
        assert_eq!(m.get(CanonicalField::Quantity), None);
    }

    #[test]
    fn vendor_b_headers() {
        let m = map(
            &["Site_Code", "UPC", "Item", "Transaction Date", "Price", "Total", "Qty"],
            HeaderStrategy::Exclusive,
        );
        assert_eq!(m.get(CanonicalField::SiteCode), Some("Site_Code"));
        assert_eq!(m.get(CanonicalField::Upc), Some("UPC"));
        assert_eq!(m.get(CanonicalField::ProductName), Some("Item"));
        assert_eq!(m.get(CanonicalField::SaleDate), Some("Transaction Date"));
        assert_eq!(m.get(CanonicalField::UnitPrice), Some("Price"));
        assert_eq!(m.get(CanonicalField::FinalTotal), Some("Total"));
        assert_eq!(m.get(CanonicalField::Quantity), Some("Qty"));
    }

    #[test]
    fn unmatched_fields_are_absent() {
        let m = map(&["Location_ID", "Scancode"], HeaderStrategy::Exclusive);
        assert_eq!(m.len(), 2);
        assert!(!m.is_mapped(CanonicalField::SaleDate));
        assert!(m.missing_identity().is_empty());
    }

    #[test]
    fn first_match_lets_fields_share_a_header() {
        // "Product Code" holds both `product_code` (upc) and `product` (name)
        let m = map(&["Location", "Product Code"], HeaderStrategy::FirstMatch);
        assert_eq!(m.get(CanonicalField::Upc), Some("Product Code"));
        assert_eq!(m.get(CanonicalField::ProductName), Some("Product Code"));
    }

    #[test]
    fn first_match_prefers_keyword_priority_over_column_order() {
        // `location_id` outranks `location` even though "Location" comes first
        let m = map(&["Location", "Location_ID", "UPC"], HeaderStrategy::FirstMatch);
        assert_eq!(m.get(CanonicalField::SiteCode), Some("Location_ID"));
    }

    #[test]
    fn exclusive_gives_each_header_one_field() {
        let m = map(&["Location", "Product Code"], HeaderStrategy::Exclusive);
        assert_eq!(m.get(CanonicalField::Upc), Some("Product Code"));
        assert_eq!(m.get(CanonicalField::ProductName), None);
    }

    #[test]
    fn exclusive_prefers_longest_keyword() {
        // "Unit Price" must go to unit_price, not be stolen by a shorter match
        let m = map(
            &["Site", "Location", "UPC", "Unit Price", "Line Total", "Date"],
            HeaderStrategy::Exclusive,
        );
        assert_eq!(m.get(CanonicalField::SiteCode), Some("Location"));
        assert_eq!(m.get(CanonicalField::UnitPrice), Some("Unit Price"));
        assert_eq!(m.get(CanonicalField::FinalTotal), Some("Line Total"));
        assert_eq!(m.get(CanonicalField::SaleDate), Some("Date"));
    }

    #[test]
    fn exclusive_reports_ties() {
        // "Sale Date" scores `sale_date`, "Settle Date" only `date`: no tie
        let m = map(&["Location", "UPC", "Sale Date", "Settle Date"], HeaderStrategy::Exclusive);
        assert_eq!(m.get(CanonicalField::SaleDate), Some("Sale Date"));

        let err = map_headers(
            &hdrs(&["Location", "UPC", "Order Date", "Ship Date"]),
            &KeywordConfig::default(),
            HeaderStrategy::Exclusive,
        )
        .unwrap_err();
        assert_eq!(
            err,
            HeaderError::Ambiguous {
                field: CanonicalField::SaleDate,
                headers: hdrs(&["Order Date", "Ship Date"]),
            }
        );
    }

    #[test]
    fn exclusive_specific_keyword_beats_generic() {
        // Both contain "location", but "Location_ID" scores higher
        let m = map(&["Location Name", "Location_ID", "UPC"], HeaderStrategy::Exclusive);
        assert_eq!(m.get(CanonicalField::SiteCode), Some("Location_ID"));
    }

    #[test]
    fn empty_header_row() {
        let err = map_headers(&hdrs(&["", " "]), &KeywordConfig::default(), HeaderStrategy::Exclusive)
            .unwrap_err();
        assert_eq!(err, HeaderError::Empty);
    }

    #[test]
    fn custom_keywords() {
        let mut keywords = KeywordConfig::default();
        keywords.upc = vec!["EAN 13".into()];
        let m = map_headers(&hdrs(&["Location", "ean_13"]), &keywords, HeaderStrategy::Exclusive)
            .unwrap();
        assert_eq!(m.get(CanonicalField::Upc), Some("ean_13"));
    }
}
