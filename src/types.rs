//! Report kinds, output schemas, and normalized table types

use crate::error::ScrapeError;

/// State/territory count columns, in report column order.
pub const STATE_COLUMNS: [&str; 8] = ["NSW", "VIC", "QLD", "SA", "WA", "TAS", "ACT", "NT"];

/// The two report shapes the statistics endpoint can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// MBS item report: Item, Month, eight state counts, Total.
    ItemByStateByMonth,
    /// PBS item report: Item, Scheme (PBS/RPBS), Month, eight state counts, Total.
    ItemBySchemeByStateByMonth,
}

impl ReportKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mbs" => Some(ReportKind::ItemByStateByMonth),
            "pbs" => Some(ReportKind::ItemBySchemeByStateByMonth),
            _ => None,
        }
    }

    /// Report program path on the statistics server.
    pub fn program(&self) -> &'static str {
        match self {
            ReportKind::ItemByStateByMonth => "/statistics/mbs_item_standard_report",
            ReportKind::ItemBySchemeByStateByMonth => "/statistics/pbs_item_standard_report",
        }
    }

    pub fn has_scheme(&self) -> bool {
        matches!(self, ReportKind::ItemBySchemeByStateByMonth)
    }

    /// Output column names, in fixed order.
    pub fn headers(&self) -> Vec<&'static str> {
        let mut headers = vec!["Item"];
        if self.has_scheme() {
            headers.push("Scheme");
        }
        headers.push("Month");
        headers.extend(STATE_COLUMNS);
        headers.push("Total");
        headers
    }

    pub fn column_count(&self) -> usize {
        if self.has_scheme() {
            12
        } else {
            11
        }
    }

    /// Whether a cell value is a well-formed item code for this report.
    /// MBS item codes are numeric; PBS codes are alphanumeric (e.g. "02580K").
    pub fn item_matches_alphabet(&self, cell: &str) -> bool {
        if cell.is_empty() {
            return false;
        }
        match self {
            ReportKind::ItemByStateByMonth => cell.chars().all(|c| c.is_ascii_digit()),
            ReportKind::ItemBySchemeByStateByMonth => {
                cell.chars().all(|c| c.is_ascii_alphanumeric())
            }
        }
    }
}

/// Which measure the report counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportVariable {
    Services,
    Benefit,
}

impl ReportVariable {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportVariable::Services => "services",
            ReportVariable::Benefit => "benefit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "services" | "service" => Some(ReportVariable::Services),
            "benefit" | "benefits" => Some(ReportVariable::Benefit),
            _ => None,
        }
    }
}

/// Reporting window, both ends inclusive, as YYYYMM periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: u32,
    end: u32,
}

impl DateWindow {
    /// Parse and validate a pair of YYYYMM period strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, ScrapeError> {
        let start = parse_period(start)?;
        let end = parse_period(end)?;
        if start > end {
            return Err(ScrapeError::InvalidConfiguration(format!(
                "start period {start} is after end period {end}"
            )));
        }
        Ok(DateWindow { start, end })
    }

    pub fn start_param(&self) -> String {
        format!("{:06}", self.start)
    }

    pub fn end_param(&self) -> String {
        format!("{:06}", self.end)
    }
}

fn parse_period(s: &str) -> Result<u32, ScrapeError> {
    let bad = || {
        ScrapeError::InvalidConfiguration(format!("period '{s}' is not YYYYMM with month 01-12"))
    };
    if s.len() != 6 || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(bad());
    }
    let value: u32 = s.parse().map_err(|_| bad())?;
    let month = value % 100;
    if !(1..=12).contains(&month) {
        return Err(bad());
    }
    Ok(value)
}

/// One normalized observation: an item code, optional scheme, a month
/// period, and nine count measures. Missing or unparseable counts stay
/// `None`, never zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRow {
    pub item: String,
    pub scheme: Option<String>,
    pub month: String,
    pub states: [Option<u64>; 8],
    pub total: Option<u64>,
}

/// A schema-complete table of normalized rows for one report kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatTable {
    pub kind: ReportKind,
    pub rows: Vec<StatRow>,
}

impl StatTable {
    /// The canonical empty table: correct schema, zero rows.
    pub fn empty(kind: ReportKind) -> Self {
        StatTable { kind, rows: Vec::new() }
    }

    pub fn headers(&self) -> Vec<&'static str> {
        self.kind.headers()
    }
}

/// Per-batch results for a run, ordered by batch number (1-based at the
/// API surface). Every batch has a slot before a merge; slots are only
/// ever appended by the runner or replaced in place by recovery.
#[derive(Debug)]
pub struct ResultCollection {
    kind: ReportKind,
    tables: Vec<StatTable>,
}

impl ResultCollection {
    pub fn new(kind: ReportKind) -> Self {
        ResultCollection { kind, tables: Vec::new() }
    }

    pub fn from_tables(kind: ReportKind, tables: Vec<StatTable>) -> Self {
        ResultCollection { kind, tables }
    }

    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn push(&mut self, table: StatTable) {
        self.tables.push(table);
    }

    /// Batch result for a 1-based batch number.
    pub fn get(&self, batch_no: usize) -> Option<&StatTable> {
        if batch_no == 0 {
            return None;
        }
        self.tables.get(batch_no - 1)
    }

    /// Replace the slot for a 1-based batch number.
    pub fn replace(&mut self, batch_no: usize, table: StatTable) -> Result<(), ScrapeError> {
        if batch_no == 0 || batch_no > self.tables.len() {
            return Err(ScrapeError::OutOfRange {
                index: batch_no,
                batches: self.tables.len(),
            });
        }
        self.tables[batch_no - 1] = table;
        Ok(())
    }

    pub fn tables(&self) -> &[StatTable] {
        &self.tables
    }
}
