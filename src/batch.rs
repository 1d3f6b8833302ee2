//! Splitting item lists into request-sized batches, and merging results back

use crate::error::ScrapeError;
use crate::types::{ResultCollection, StatTable};

/// Server-imposed ceiling on items per request.
pub const MAX_BATCH_SIZE: usize = 30;

/// Split an ordered item list into order-preserving batches of at most
/// `size` items. The last batch may be short. The batches partition the
/// input exactly: no drops, no duplicates, no reordering.
pub fn make_batches(items: &[String], size: usize) -> Result<Vec<Vec<String>>, ScrapeError> {
    if size == 0 || size > MAX_BATCH_SIZE {
        return Err(ScrapeError::InvalidConfiguration(format!(
            "batch size must be between 1 and {MAX_BATCH_SIZE}, got {size}"
        )));
    }
    if items.is_empty() {
        return Err(ScrapeError::InvalidConfiguration(
            "item list is empty".to_string(),
        ));
    }
    Ok(items.chunks(size).map(|chunk| chunk.to_vec()).collect())
}

/// Concatenate all batch results in batch order into one flat table.
/// Row order within each batch is preserved; no deduplication or sorting.
pub fn merge(collection: &ResultCollection) -> StatTable {
    let mut merged = StatTable::empty(collection.kind());
    for table in collection.tables() {
        merged.rows.extend(table.rows.iter().cloned());
    }
    merged
}
