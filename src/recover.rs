//! The `recover` subcommand: re-fetch one batch of a previous run and
//! splice its result back into the per-batch files and merged output.

use anyhow::{anyhow, bail, Result};
use std::path::Path;

use crate::batch::{make_batches, merge};
use crate::client::{ReportClient, ReportConfig};
use crate::fetch::{batch_file_path, load_metadata, read_items, read_table_csv, write_table_csv};
use crate::runner::{recover_batch, Recovery};
use crate::types::{DateWindow, ReportKind, ReportVariable, ResultCollection, StatTable};
use crate::RecoverArgs;

pub fn run_recover(args: &RecoverArgs) -> Result<()> {
    let kind = ReportKind::from_str(&args.report)
        .ok_or_else(|| anyhow!("unknown report '{}', expected mbs or pbs", args.report))?;
    let fetch = &args.fetch;
    let variable = ReportVariable::from_str(&fetch.var).ok_or_else(|| {
        anyhow!("unknown report variable '{}', expected services or benefit", fetch.var)
    })?;
    let window = DateWindow::parse(&fetch.start, &fetch.end)?;

    // Batching is deterministic, so the same items file and batch size
    // reproduce the original run's batch list and numbering.
    let items = read_items(&fetch.items, &fetch.item_column)?;
    let batches = make_batches(&items, fetch.batch_size)?;

    // Rebuild the collection from the original run's per-batch files; a
    // missing file is an empty slot, which is what recovery is for.
    let mut tables = Vec::with_capacity(batches.len());
    for batch_no in 1..=batches.len() {
        let path = batch_file_path(&fetch.work_dir, batch_no);
        if path.exists() {
            tables.push(read_table_csv(&path, kind)?);
        } else {
            tables.push(StatTable::empty(kind));
        }
    }
    let mut collection = ResultCollection::from_tables(kind, tables);

    let client = ReportClient::new(ReportConfig { kind, variable, window })?;
    let recovery = match recover_batch(&client, &batches, &mut collection, args.batch) {
        Ok(recovery) => recovery,
        Err(e) if e.is_transport() => {
            bail!("recovery for batch {} failed: {}; batch files left as they were", args.batch, e)
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(table) = collection.get(args.batch) {
        write_table_csv(&batch_file_path(&fetch.work_dir, args.batch), table, None)?;
    }
    let merged = merge(&collection);
    let metadata = match &fetch.metadata {
        Some(path) => Some(load_metadata(path)?),
        None => None,
    };
    write_table_csv(Path::new(&fetch.out), &merged, metadata.as_ref())?;

    if !fetch.quiet {
        match recovery {
            Recovery::Replaced { rows } => {
                println!("Recovered batch {}: {} rows", args.batch, rows)
            }
            Recovery::NoData => println!("Recovered batch {}: no data", args.batch),
        }
        println!("Rewrote {} ({} rows)", fetch.out, merged.rows.len());
    }
    Ok(())
}
