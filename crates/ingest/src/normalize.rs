//! Raw row → validated sale.
//!
//! This is the only place raw cell text is coerced into typed values. Every
//! failure for a row is collected so an operator can fix a file in one pass.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::model::{CanonicalField, HeaderMapping, NormalizedSale, RawRow, RejectedRow};

/// `YYYY-MM-DD`, month 01–12, day 01–31.
static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").unwrap()
});

/// `MM/DD/YYYY`, leading zeros optional.
static US_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0?[1-9]|1[0-2])/(0?[1-9]|[12]\d|3[01])/(\d{4})$").unwrap()
});

/// Unsigned plain decimal: `12`, `12.`, `12.5`, `.5`.
static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d*)(?:\.(\d*))?$").unwrap());

/// `1,250` or `12,345,678.90`: commas only between full groups of three.
static GROUPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:,\d{3})+(?:\.\d*)?$").unwrap());

/// Largest accepted quantity; sums over a file stay well inside `u64`.
pub const MAX_QUANTITY: u64 = 1_000_000;

/// Digits allowed after the decimal point in an amount.
pub const MAX_FRACTION_DIGITS: usize = 2;

/// Per-file normalization settings.
#[derive(Debug, Clone, Default)]
pub struct NormalizeRules {
    pub site_code_strip_prefixes: Vec<String>,
}

/// Validate one row against the mapping.
pub fn normalize_row(
    row: &RawRow,
    mapping: &HeaderMapping,
    rules: &NormalizeRules,
) -> Result<NormalizedSale, RejectedRow> {
    let value = |field: CanonicalField| cell(row, mapping, field);

    let mut reasons = Vec::new();

    for field in CanonicalField::MANDATORY {
        if value(field).is_none() {
            reasons.push(format!("Missing required field: {field}"));
        }
    }
    if !reasons.is_empty() {
        return Err(reject(row, reasons));
    }

    // Presence was checked above.
    let site_code = strip_site_prefix(value(CanonicalField::SiteCode).unwrap_or_default(), rules);
    let upc = value(CanonicalField::Upc).unwrap_or_default().to_string();
    let product_name = value(CanonicalField::ProductName).map(str::to_string);

    if site_code.is_empty() {
        reasons.push("Missing required field: site_code".to_string());
    }

    let raw_date = value(CanonicalField::SaleDate).unwrap_or_default();
    let sale_date = parse_sale_date(raw_date);
    if sale_date.is_none() {
        reasons.push(format!("Invalid sale_date format: \"{raw_date}\""));
    }

    let unit_price = parse_amount(
        CanonicalField::UnitPrice,
        value(CanonicalField::UnitPrice).unwrap_or_default(),
    );
    if let Err(ref reason) = unit_price {
        reasons.push(reason.clone());
    }

    let final_total = parse_amount(
        CanonicalField::FinalTotal,
        value(CanonicalField::FinalTotal).unwrap_or_default(),
    );
    if let Err(ref reason) = final_total {
        reasons.push(reason.clone());
    }

    let quantity = match value(CanonicalField::Quantity) {
        Some(raw) => parse_quantity(raw),
        None => Ok(1),
    };
    if let Err(ref reason) = quantity {
        reasons.push(reason.clone());
    }

    match (sale_date, unit_price, final_total, quantity) {
        (Some(sale_date), Ok(unit_price_cents), Ok(final_total_cents), Ok(quantity))
            if reasons.is_empty() =>
        {
            Ok(NormalizedSale {
                line: row.line,
                site_code,
                upc,
                product_name,
                sale_date,
                unit_price_cents,
                final_total_cents,
                quantity,
            })
        }
        _ => Err(reject(row, reasons)),
    }
}

/// Trimmed, non-blank value of a mapped field.
fn cell<'a>(row: &'a RawRow, mapping: &HeaderMapping, field: CanonicalField) -> Option<&'a str> {
    mapping
        .get(field)
        .and_then(|header| row.get(header))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn reject(row: &RawRow, reasons: Vec<String>) -> RejectedRow {
    RejectedRow {
        line: row.line,
        original_row: row.clone(),
        reasons,
    }
}

fn strip_site_prefix(site: &str, rules: &NormalizeRules) -> String {
    rules
        .site_code_strip_prefixes
        .iter()
        .find_map(|p| site.strip_prefix(p.as_str()))
        .unwrap_or(site)
        .trim()
        .to_string()
}

/// Parse `YYYY-MM-DD` or `MM/DD/YYYY`.
///
/// The shape is checked first; the date must then exist in the calendar, so
/// `2024-02-30` and `02/29/2023` fail instead of rolling over.
pub fn parse_sale_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let (y, m, d) = if let Some(c) = ISO_DATE.captures(s) {
        (c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)
    } else if let Some(c) = US_DATE.captures(s) {
        (c[3].parse().ok()?, c[1].parse().ok()?, c[2].parse().ok()?)
    } else {
        return None;
    };
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Parse a strictly positive money amount into cents.
///
/// Tolerates a leading `$` and `,` thousands separators. Zero is refused as
/// a "no sale" sentinel; more than two fractional digits is refused as
/// corrupted.
pub fn parse_amount(field: CanonicalField, raw: &str) -> Result<i64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(format!("Missing required field: {field}"));
    }

    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let not_a_number = || format!("Invalid {field}: \"{trimmed}\" is not a number");
    let rest = rest.strip_prefix('$').unwrap_or(rest);
    if rest.contains(',') && !GROUPED.is_match(rest) {
        return Err(not_a_number());
    }
    let rest = rest.replace(',', "");

    let caps = DECIMAL
        .captures(&rest)
        .filter(|c| !c[1].is_empty() || c.get(2).is_some_and(|f| !f.as_str().is_empty()))
        .ok_or_else(not_a_number)?;

    let whole = &caps[1];
    let frac = caps.get(2).map(|m| m.as_str()).unwrap_or("");

    let is_zero = whole.chars().all(|c| c == '0') && frac.chars().all(|c| c == '0');
    if negative && !is_zero {
        return Err(format!("Invalid {field}: \"{trimmed}\" must not be negative"));
    }
    if is_zero {
        return Err(format!("Invalid {field}: \"{trimmed}\" must be greater than zero"));
    }
    if frac.len() > MAX_FRACTION_DIGITS {
        return Err(format!("Invalid {field}: \"{trimmed}\" has excessive precision"));
    }

    let out_of_range = || format!("Invalid {field}: \"{trimmed}\" is out of range");
    let units: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| out_of_range())?
    };
    let cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| out_of_range())? * 10,
        _ => frac.parse().map_err(|_| out_of_range())?,
    };

    units
        .checked_mul(100)
        .and_then(|u| u.checked_add(cents))
        .ok_or_else(out_of_range)
}

/// Parse an explicit quantity column: a positive integer up to
/// [`MAX_QUANTITY`].
pub fn parse_quantity(raw: &str) -> Result<u64, String> {
    let trimmed = raw.trim();
    match trimmed.parse::<u64>() {
        Ok(q) if q > MAX_QUANTITY => Err(format!(
            "Invalid quantity: \"{trimmed}\" exceeds {MAX_QUANTITY}"
        )),
        Ok(q) if q > 0 => Ok(q),
        _ => Err(format!("Invalid quantity: \"{trimmed}\"")),
    }
}
