//! Locating the report table in response HTML and normalizing its rows

use std::str::FromStr;

use chrono::Month;
use scraper::{ElementRef, Html, Selector};

use crate::error::ScrapeError;
use crate::types::{ReportKind, StatRow, StatTable};

/// Header signature of the PBS report table. The response wraps the real
/// table in boilerplate tables at unstable positions, so it has to be
/// matched by content rather than position.
const SCHEME_HEADER_TOKENS: [&str; 3] = ["Item", "Scheme", "Month"];

/// Extract every `<table>` in document order as trimmed cell text.
fn extract_tables(html: &str) -> Vec<Vec<Vec<String>>> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table").unwrap();
    let row_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("th, td").unwrap();

    document
        .select(&table_sel)
        .map(|table| {
            table
                .select(&row_sel)
                .map(|row| row.select(&cell_sel).map(cell_text).collect())
                .collect()
        })
        .collect()
}

/// Collapse a cell's text nodes into one whitespace-normalized string.
fn cell_text(cell: ElementRef) -> String {
    let text: String = cell.text().collect::<Vec<_>>().join(" ");

    let mut cleaned = String::new();
    let mut prev_was_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !prev_was_space && !cleaned.is_empty() {
                cleaned.push(' ');
                prev_was_space = true;
            }
        } else {
            cleaned.push(c);
            prev_was_space = false;
        }
    }
    cleaned.trim().to_string()
}

/// Find the data rows of the report table for `kind`.
///
/// The MBS report never renders more than one candidate table, so the first
/// table wins unconditionally. The PBS report is selected by header
/// signature; rows up to and including the header row are discarded.
pub fn locate_table(html: &str, kind: ReportKind) -> Result<Vec<Vec<String>>, ScrapeError> {
    let tables = extract_tables(html);
    match kind {
        ReportKind::ItemByStateByMonth => {
            tables.into_iter().next().ok_or(ScrapeError::TableNotFound)
        }
        ReportKind::ItemBySchemeByStateByMonth => {
            let table = tables
                .into_iter()
                .find(|table| table_has_tokens(table))
                .ok_or(ScrapeError::TableNotFound)?;
            let header = table
                .iter()
                .position(|row| row_has_tokens(row))
                .ok_or(ScrapeError::HeaderNotFound)?;
            Ok(table.into_iter().skip(header + 1).collect())
        }
    }
}

fn table_has_tokens(table: &[Vec<String>]) -> bool {
    SCHEME_HEADER_TOKENS
        .iter()
        .all(|token| table.iter().flatten().any(|cell| cell.contains(token)))
}

fn row_has_tokens(row: &[String]) -> bool {
    SCHEME_HEADER_TOKENS
        .iter()
        .all(|token| row.iter().any(|cell| cell.contains(token)))
}

/// Map located rows onto the fixed output schema for `kind`.
///
/// Columns are assigned positionally; rows shorter than the schema leave
/// the trailing measures absent. Repeated header/footer artifact rows are
/// filtered out, and count cells are coerced to numbers with thousands
/// separators stripped. Anything unparseable stays absent, never zero.
/// Pure and deterministic: identical input gives identical output.
pub fn normalize(rows: &[Vec<String>], kind: ReportKind) -> StatTable {
    let mut table = StatTable::empty(kind);
    let measure_offset = if kind.has_scheme() { 3 } else { 2 };

    for cells in rows {
        let get = |i: usize| cells.get(i).map(String::as_str).unwrap_or("").trim();
        let item = get(0).to_string();
        let scheme = if kind.has_scheme() {
            Some(get(1).to_string())
        } else {
            None
        };
        let month = get(measure_offset - 1).to_string();

        if !keep_row(kind, &item, scheme.as_deref(), &month) {
            continue;
        }

        let mut states: [Option<u64>; 8] = [None; 8];
        for (i, slot) in states.iter_mut().enumerate() {
            *slot = parse_count(get(measure_offset + i));
        }
        let total = parse_count(get(measure_offset + 8));

        table.rows.push(StatRow { item, scheme, month, states, total });
    }
    table
}

/// Row filters per report kind; drops the artifacts the endpoint mixes in
/// with data rows (repeated headers, subtotal and grand-total rows).
fn keep_row(kind: ReportKind, item: &str, scheme: Option<&str>, month: &str) -> bool {
    if !kind.item_matches_alphabet(item) {
        return false;
    }
    let month_lower = month.to_lowercase();
    if month_lower.contains("total") || month_lower.contains("month") {
        return false;
    }
    if let Some(scheme) = scheme {
        let item_lower = item.to_lowercase();
        let scheme_lower = scheme.to_lowercase();
        if item_lower.contains("total")
            || item_lower.contains("all items")
            || scheme_lower.contains("total")
            || scheme_lower.contains("all items")
        {
            return false;
        }
        if scheme != "PBS" && scheme != "RPBS" {
            return false;
        }
        if !is_month_period(month) {
            return false;
        }
    }
    true
}

/// True for period cells shaped like "JAN2024": a three-letter month
/// abbreviation followed by a four-digit year.
fn is_month_period(cell: &str) -> bool {
    let cell = cell.trim();
    if cell.len() != 7 {
        return false;
    }
    let (name, year) = cell.split_at(3);
    name.chars().all(|c| c.is_ascii_alphabetic())
        && Month::from_str(name).is_ok()
        && year.chars().all(|c| c.is_ascii_digit())
}

/// Coerce a count cell to a number, stripping thousands separators.
pub fn parse_count(cell: &str) -> Option<u64> {
    let cleaned = cell.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Locate and normalize in one step, mapping parse-level misses to the
/// canonical empty table. This is the shape the batch runner consumes: a
/// missing or malformed table is data (zero rows), not an error.
pub fn parse_report(html: &str, kind: ReportKind) -> StatTable {
    match locate_table(html, kind) {
        Ok(rows) => normalize(&rows, kind),
        Err(_) => StatTable::empty(kind),
    }
}
