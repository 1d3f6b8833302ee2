//! Progress reporting for long-running fetch runs.
//! Frontends implement this to surface per-batch status to users.

use std::io::{self, Write};

use crate::runner::BatchOutcome;

pub trait Progress {
    /// Called once with the total number of batches.
    fn begin(&mut self, _total: usize) {}

    /// Called before a batch's network round-trip starts.
    fn batch_started(&mut self, _batch_no: usize, _total: usize, _items: usize) {}

    /// Called with the batch's outcome, failures included.
    fn batch_finished(&mut self, _batch_no: usize, _total: usize, _outcome: &BatchOutcome) {}

    /// Called at the end, successful or not.
    fn finish(&mut self) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}

/// Prints one line per batch to stdout; silent when quiet.
pub struct ConsoleProgress {
    quiet: bool,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        ConsoleProgress { quiet }
    }
}

impl Progress for ConsoleProgress {
    fn begin(&mut self, total: usize) {
        if !self.quiet {
            println!("Fetching {} batches...", total);
        }
    }

    fn batch_started(&mut self, batch_no: usize, total: usize, items: usize) {
        if !self.quiet {
            print!("[{:02}/{:02}] {} items... ", batch_no, total, items);
            io::stdout().flush().ok();
        }
    }

    fn batch_finished(&mut self, _batch_no: usize, _total: usize, outcome: &BatchOutcome) {
        if self.quiet {
            return;
        }
        match outcome {
            BatchOutcome::Fetched(rows) => println!("{} rows", rows),
            BatchOutcome::Empty => println!("no data"),
            BatchOutcome::Failed(e) => println!("failed: {}", e),
        }
    }
}
