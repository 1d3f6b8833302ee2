//! The `mbs` and `pbs` subcommands: read the item list, run the batch
//! pipeline, persist per-batch results and the merged output.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batch::{make_batches, merge};
use crate::client::{ReportClient, ReportConfig};
use crate::parse::parse_count;
use crate::progress::ConsoleProgress;
use crate::runner::run_batches;
use crate::types::{DateWindow, ReportKind, ReportVariable, StatRow, StatTable};
use crate::FetchArgs;

pub fn run_fetch(kind: ReportKind, args: &FetchArgs) -> Result<()> {
    let variable = ReportVariable::from_str(&args.var).ok_or_else(|| {
        anyhow!("unknown report variable '{}', expected services or benefit", args.var)
    })?;
    let window = DateWindow::parse(&args.start, &args.end)?;

    let items = read_items(&args.items, &args.item_column)?;
    let batches = make_batches(&items, args.batch_size)?;

    let client = ReportClient::new(ReportConfig { kind, variable, window })?;
    let mut progress = ConsoleProgress::new(args.quiet);
    let collection = run_batches(
        &client,
        kind,
        &batches,
        Duration::from_secs(args.delay),
        &mut progress,
    );

    // One file per batch so a failed batch can be recovered later without
    // re-fetching the whole run.
    fs::create_dir_all(&args.work_dir)
        .with_context(|| format!("Failed to create work dir: {}", args.work_dir))?;
    for (i, table) in collection.tables().iter().enumerate() {
        write_table_csv(&batch_file_path(&args.work_dir, i + 1), table, None)?;
    }

    let merged = merge(&collection);
    let metadata = match &args.metadata {
        Some(path) => Some(load_metadata(path)?),
        None => None,
    };
    write_table_csv(Path::new(&args.out), &merged, metadata.as_ref())?;

    if !args.quiet {
        let empty = collection
            .tables()
            .iter()
            .filter(|table| table.rows.is_empty())
            .count();
        println!(
            "Done! {} rows across {} batches written to {} ({} empty batches)",
            merged.rows.len(),
            collection.len(),
            args.out,
            empty
        );
    }
    Ok(())
}

/// Read the item code column from a CSV file, in file order.
pub fn read_items(path: &str, column: &str) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open items file: {}", path))?;
    let headers = reader.headers()?.clone();
    let index = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| anyhow!("items file {} has no '{}' column", path, column))?;

    let mut items = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = record.get(index) {
            let value = value.trim();
            if !value.is_empty() {
                items.push(value.to_string());
            }
        }
    }
    Ok(items)
}

pub fn batch_file_path(work_dir: &str, batch_no: usize) -> PathBuf {
    Path::new(work_dir).join(format!("batch_{:03}.csv", batch_no))
}

/// Item metadata (category/group/subgroup) keyed by item code. The first
/// column of the file is the key; every other column is carried across.
pub struct MetadataIndex {
    pub columns: Vec<String>,
    by_item: HashMap<String, Vec<String>>,
}

impl MetadataIndex {
    pub fn lookup(&self, item: &str) -> Option<&[String]> {
        self.by_item.get(item).map(Vec::as_slice)
    }
}

pub fn load_metadata(path: &str) -> Result<MetadataIndex> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open metadata file: {}", path))?;
    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(anyhow!(
            "metadata file {} needs an item column plus at least one value column",
            path
        ));
    }
    let columns: Vec<String> = headers.iter().skip(1).map(|h| h.to_string()).collect();

    let mut by_item = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let Some(item) = record.get(0) else { continue };
        let values: Vec<String> = (1..headers.len())
            .map(|i| record.get(i).unwrap_or("").to_string())
            .collect();
        by_item.insert(item.trim().to_string(), values);
    }
    Ok(MetadataIndex { columns, by_item })
}

fn count_field(value: Option<u64>) -> String {
    value.map(|n| n.to_string()).unwrap_or_default()
}

/// Write a normalized table as CSV, optionally left-joining metadata
/// columns by item code. Unknown counts and missing metadata keys become
/// empty cells.
pub fn write_table_csv(
    path: &Path,
    table: &StatTable,
    metadata: Option<&MetadataIndex>,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;

    let mut headers: Vec<String> = table.headers().iter().map(|h| h.to_string()).collect();
    if let Some(metadata) = metadata {
        headers.extend(metadata.columns.iter().cloned());
    }
    writer.write_record(&headers)?;

    for row in &table.rows {
        let mut fields = vec![row.item.clone()];
        if let Some(scheme) = &row.scheme {
            fields.push(scheme.clone());
        }
        fields.push(row.month.clone());
        fields.extend(row.states.iter().map(|v| count_field(*v)));
        fields.push(count_field(row.total));

        if let Some(metadata) = metadata {
            match metadata.lookup(&row.item) {
                Some(values) => fields.extend(values.iter().cloned()),
                None => fields.extend(metadata.columns.iter().map(|_| String::new())),
            }
        }
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a per-batch CSV back into a normalized table.
pub fn read_table_csv(path: &Path, kind: ReportKind) -> Result<StatTable> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to read batch file: {}", path.display()))?;

    let measure_offset = if kind.has_scheme() { 3 } else { 2 };
    let mut table = StatTable::empty(kind);
    for record in reader.records() {
        let record = record?;
        let get = |i: usize| record.get(i).unwrap_or("");

        let mut states: [Option<u64>; 8] = [None; 8];
        for (i, slot) in states.iter_mut().enumerate() {
            *slot = parse_count(get(measure_offset + i));
        }
        table.rows.push(StatRow {
            item: get(0).to_string(),
            scheme: kind.has_scheme().then(|| get(1).to_string()),
            month: get(measure_offset - 1).to_string(),
            states,
            total: parse_count(get(measure_offset + 8)),
        });
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("item_stats_test_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_read_items_by_column() {
        let path = temp_path("items.csv");
        fs::write(&path, "group,item\nA1,10990\nA1,10991\nA2, 11000 \nA2,\n").unwrap();

        let items = read_items(path.to_str().unwrap(), "item").unwrap();
        assert_eq!(items, ["10990", "10991", "11000"]);

        assert!(read_items(path.to_str().unwrap(), "code").is_err());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_table_csv_round_trip() {
        let kind = ReportKind::ItemBySchemeByStateByMonth;
        let mut table = StatTable::empty(kind);
        table.rows.push(StatRow {
            item: "02580K".to_string(),
            scheme: Some("PBS".to_string()),
            month: "JAN2024".to_string(),
            states: [Some(5), None, Some(0), None, None, None, None, Some(2)],
            total: Some(7),
        });

        let path = temp_path("round_trip.csv");
        write_table_csv(&path, &table, None).unwrap();
        let restored = read_table_csv(&path, kind).unwrap();
        assert_eq!(restored, table);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_metadata_join_passes_through() {
        let meta_path = temp_path("metadata.csv");
        fs::write(&meta_path, "item,category,group\n10990,A1,Professional Attendances\n").unwrap();
        let metadata = load_metadata(meta_path.to_str().unwrap()).unwrap();
        assert_eq!(metadata.columns, ["category", "group"]);

        let kind = ReportKind::ItemByStateByMonth;
        let mut table = StatTable::empty(kind);
        for item in ["10990", "10991"] {
            table.rows.push(StatRow {
                item: item.to_string(),
                scheme: None,
                month: "Jan2020".to_string(),
                states: [None; 8],
                total: Some(1),
            });
        }

        let out_path = temp_path("joined.csv");
        write_table_csv(&out_path, &table, Some(&metadata)).unwrap();
        let written = fs::read_to_string(&out_path).unwrap();
        let lines: Vec<&str> = written.lines().collect();

        assert!(lines[0].ends_with("Total,category,group"));
        assert!(lines[1].ends_with(",1,A1,Professional Attendances"));
        // Unknown item keeps its row with empty metadata cells.
        assert!(lines[2].ends_with(",1,,"));

        fs::remove_file(&meta_path).ok();
        fs::remove_file(&out_path).ok();
    }
}
