use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod batch;
mod client;
mod error;
mod fetch;
mod parse;
mod progress;
mod recover;
mod runner;
mod types;

/// Report endpoint; both report kinds are served by the same program
/// dispatcher, selected by the _PROGRAM query parameter.
pub const STATS_URL: &str = "http://medicarestatistics.humanservices.gov.au/statistics/do.jsp";

#[derive(Parser)]
#[command(name = "mbs-pbs-stats")]
#[command(about = "MBS/PBS item service statistics scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the MBS item-by-state-by-month report
    Mbs(FetchArgs),
    /// Fetch the PBS item-by-scheme-by-state-by-month report
    Pbs(FetchArgs),
    /// Re-fetch one batch of a previous run and re-merge the output
    Recover(RecoverArgs),
}

#[derive(Args)]
pub struct FetchArgs {
    /// CSV file with the item codes to query
    #[arg(long)]
    pub items: String,
    /// Column in the items file holding the codes
    #[arg(long, default_value = "item")]
    pub item_column: String,
    /// Start of the reporting window (YYYYMM)
    #[arg(long)]
    pub start: String,
    /// End of the reporting window (YYYYMM)
    #[arg(long)]
    pub end: String,
    /// Report variable: services or benefit
    #[arg(long, default_value = "services")]
    pub var: String,
    /// Items per request (the server accepts at most 30)
    #[arg(long, default_value_t = batch::MAX_BATCH_SIZE)]
    pub batch_size: usize,
    /// Seconds to wait between requests
    #[arg(long, default_value_t = 2)]
    pub delay: u64,
    /// Merged output CSV
    #[arg(short, long, default_value = "stats.csv")]
    pub out: String,
    /// Directory for per-batch result files
    #[arg(long, default_value = "batches")]
    pub work_dir: String,
    /// Item metadata CSV to left-join onto the merged output
    #[arg(long)]
    pub metadata: Option<String>,
    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct RecoverArgs {
    /// Which report the original run fetched: mbs or pbs
    #[arg(long)]
    pub report: String,
    /// Batch number to re-fetch (1-based)
    #[arg(long)]
    pub batch: usize,
    #[command(flatten)]
    pub fetch: FetchArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Mbs(args) => fetch::run_fetch(types::ReportKind::ItemByStateByMonth, &args),
        Commands::Pbs(args) => {
            fetch::run_fetch(types::ReportKind::ItemBySchemeByStateByMonth, &args)
        }
        Commands::Recover(args) => recover::run_recover(&args),
    }
}
