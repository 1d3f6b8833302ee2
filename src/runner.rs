//! Sequential batch runner and single-batch recovery

use std::thread;
use std::time::Duration;

use crate::client::ReportSource;
use crate::error::ScrapeError;
use crate::parse::parse_report;
use crate::progress::Progress;
use crate::types::{ReportKind, ResultCollection, StatTable};

/// What happened to one batch. Failures are data here, not control flow:
/// the run records them and moves on.
#[derive(Debug)]
pub enum BatchOutcome {
    /// Normalized table with at least one row.
    Fetched(usize),
    /// Response parsed but held no usable rows.
    Empty,
    /// Transport or other failure; slot holds the canonical empty table.
    Failed(ScrapeError),
}

/// Outcome of a recovery attempt that reached the endpoint.
#[derive(Debug)]
pub enum Recovery {
    /// Slot replaced with a table of this many rows.
    Replaced { rows: usize },
    /// Endpoint answered but had no data; slot replaced with the
    /// canonical empty table.
    NoData,
}

/// Fetch, locate, and normalize one batch. Rows for items outside the
/// batch never survive: a batch result holds its own items or nothing.
fn fetch_batch_table<S: ReportSource>(
    source: &S,
    kind: ReportKind,
    batch: &[String],
) -> Result<StatTable, ScrapeError> {
    let body = source.fetch(batch)?;
    let mut table = parse_report(&body, kind);
    table.rows.retain(|row| batch.iter().any(|item| item == &row.item));
    Ok(table)
}

/// Run every batch in order, one blocking round-trip at a time, pausing
/// `delay` before each batch except the first. Every failure becomes an
/// empty slot and the run continues; the returned collection always has
/// exactly one slot per batch.
pub fn run_batches<S: ReportSource>(
    source: &S,
    kind: ReportKind,
    batches: &[Vec<String>],
    delay: Duration,
    progress: &mut dyn Progress,
) -> ResultCollection {
    let mut collection = ResultCollection::new(kind);
    progress.begin(batches.len());

    for (i, batch) in batches.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            thread::sleep(delay);
        }
        progress.batch_started(i + 1, batches.len(), batch.len());

        let outcome = match fetch_batch_table(source, kind, batch) {
            Ok(table) if table.rows.is_empty() => {
                collection.push(StatTable::empty(kind));
                BatchOutcome::Empty
            }
            Ok(table) => {
                let rows = table.rows.len();
                collection.push(table);
                BatchOutcome::Fetched(rows)
            }
            Err(e) => {
                collection.push(StatTable::empty(kind));
                BatchOutcome::Failed(e)
            }
        };
        progress.batch_finished(i + 1, batches.len(), &outcome);
    }

    progress.finish();
    collection
}

/// Re-fetch one batch (1-based `batch_no`) and replace its slot.
///
/// Uses the same source, and therefore the same report parameters, as the
/// original run. A transport failure leaves the existing slot untouched
/// and is returned to the caller; there is no automatic retry.
pub fn recover_batch<S: ReportSource>(
    source: &S,
    batches: &[Vec<String>],
    collection: &mut ResultCollection,
    batch_no: usize,
) -> Result<Recovery, ScrapeError> {
    if batch_no == 0 || batch_no > batches.len() || batch_no > collection.len() {
        return Err(ScrapeError::OutOfRange {
            index: batch_no,
            batches: batches.len(),
        });
    }

    let kind = collection.kind();
    let table = fetch_batch_table(source, kind, &batches[batch_no - 1])?;
    let rows = table.rows.len();
    collection.replace(batch_no, table)?;

    Ok(if rows == 0 {
        Recovery::NoData
    } else {
        Recovery::Replaced { rows }
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;
    use crate::progress::NullProgress;
    use crate::types::StatRow;

    /// Replays a canned response per fetch call.
    struct StubSource {
        responses: RefCell<VecDeque<Result<String, ScrapeError>>>,
    }

    impl StubSource {
        fn new(responses: Vec<Result<String, ScrapeError>>) -> Self {
            StubSource { responses: RefCell::new(responses.into()) }
        }
    }

    impl ReportSource for StubSource {
        fn fetch(&self, _batch: &[String]) -> Result<String, ScrapeError> {
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(ScrapeError::TableNotFound))
        }
    }

    fn mbs_response(item: &str, count: u64) -> String {
        format!(
            "<table>\
             <tr><th>Item</th><th>Month</th><th>NSW</th><th>VIC</th><th>QLD</th>\
             <th>SA</th><th>WA</th><th>TAS</th><th>ACT</th><th>NT</th><th>Total</th></tr>\
             <tr><td>{item}</td><td>Jan2020</td><td>{count}</td><td>0</td><td>0</td>\
             <td>0</td><td>0</td><td>0</td><td>0</td><td>0</td><td>{count}</td></tr>\
             </table>"
        )
    }

    fn transport_error() -> ScrapeError {
        ScrapeError::Transport {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn batch(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_run_keeps_one_slot_per_batch_under_mixed_outcomes() {
        let kind = ReportKind::ItemByStateByMonth;
        let batches = vec![batch(&["10990"]), batch(&["10991"]), batch(&["10992"])];
        let source = StubSource::new(vec![
            Ok(mbs_response("10990", 11)),
            Err(transport_error()),
            Ok("<html><p>no table here</p></html>".to_string()),
        ]);

        let collection =
            run_batches(&source, kind, &batches, Duration::ZERO, &mut NullProgress);

        assert_eq!(collection.len(), 3);
        assert_eq!(collection.get(1).unwrap().rows.len(), 1);
        assert_eq!(collection.get(1).unwrap().rows[0].total, Some(11));
        assert!(collection.get(2).unwrap().rows.is_empty());
        assert!(collection.get(3).unwrap().rows.is_empty());
    }

    #[test]
    fn test_run_drops_rows_from_other_batches() {
        let kind = ReportKind::ItemByStateByMonth;
        let batches = vec![batch(&["10990"])];
        // Response carries a row for an item the batch never asked for.
        let body = mbs_response("10990", 5).replace(
            "</table>",
            "<tr><td>99999</td><td>Jan2020</td><td>1</td><td>0</td><td>0</td>\
             <td>0</td><td>0</td><td>0</td><td>0</td><td>0</td><td>1</td></tr></table>",
        );
        let source = StubSource::new(vec![Ok(body)]);

        let collection =
            run_batches(&source, kind, &batches, Duration::ZERO, &mut NullProgress);

        let table = collection.get(1).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].item, "10990");
    }

    fn seeded_collection(kind: ReportKind, slots: usize) -> ResultCollection {
        let mut collection = ResultCollection::new(kind);
        for _ in 0..slots {
            collection.push(StatTable::empty(kind));
        }
        collection
    }

    #[test]
    fn test_recover_out_of_range_leaves_collection_unmodified() {
        let kind = ReportKind::ItemByStateByMonth;
        let batches = vec![batch(&["10990"])];
        let mut collection = seeded_collection(kind, 1);
        let source = StubSource::new(vec![Ok(mbs_response("10990", 7))]);

        for bad in [0, 2] {
            let result = recover_batch(&source, &batches, &mut collection, bad);
            assert!(matches!(result, Err(ScrapeError::OutOfRange { .. })));
        }
        assert_eq!(collection.len(), 1);
        assert!(collection.get(1).unwrap().rows.is_empty());
    }

    #[test]
    fn test_recover_replaces_slot_on_success() {
        let kind = ReportKind::ItemByStateByMonth;
        let batches = vec![batch(&["10990"]), batch(&["10991"])];
        let mut collection = seeded_collection(kind, 2);
        let source = StubSource::new(vec![Ok(mbs_response("10991", 4))]);

        let result = recover_batch(&source, &batches, &mut collection, 2).unwrap();
        assert!(matches!(result, Recovery::Replaced { rows: 1 }));
        assert_eq!(collection.get(2).unwrap().rows[0].item, "10991");
        // The untouched slot stays as it was.
        assert!(collection.get(1).unwrap().rows.is_empty());
    }

    #[test]
    fn test_recover_no_data_still_replaces_slot() {
        let kind = ReportKind::ItemByStateByMonth;
        let batches = vec![batch(&["10990"])];
        let mut collection = ResultCollection::new(kind);
        // Seed the slot with a stale row to prove replacement happens.
        let mut stale = StatTable::empty(kind);
        stale.rows.push(StatRow {
            item: "10990".to_string(),
            scheme: None,
            month: "Jan2019".to_string(),
            states: [None; 8],
            total: Some(3),
        });
        collection.push(stale);

        let source = StubSource::new(vec![Ok("<html></html>".to_string())]);
        let result = recover_batch(&source, &batches, &mut collection, 1).unwrap();

        assert!(matches!(result, Recovery::NoData));
        assert!(collection.get(1).unwrap().rows.is_empty());
    }

    #[test]
    fn test_recover_transport_failure_leaves_slot_untouched() {
        let kind = ReportKind::ItemByStateByMonth;
        let batches = vec![batch(&["10990"])];
        let mut collection = ResultCollection::new(kind);
        let mut existing = StatTable::empty(kind);
        existing.rows.push(StatRow {
            item: "10990".to_string(),
            scheme: None,
            month: "Jan2020".to_string(),
            states: [None; 8],
            total: Some(9),
        });
        collection.push(existing);

        let source = StubSource::new(vec![Err(transport_error())]);
        let result = recover_batch(&source, &batches, &mut collection, 1);

        assert!(matches!(result, Err(ScrapeError::Transport { .. })));
        assert_eq!(collection.get(1).unwrap().rows.len(), 1);
        assert_eq!(collection.get(1).unwrap().rows[0].total, Some(9));
    }
}
