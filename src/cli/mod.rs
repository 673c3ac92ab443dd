pub mod inspect;
pub mod process;
pub mod render;
pub mod validate;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tdsmate",
    about = "Reconcile TDS challans against the party ledger and fill the quarterly return template."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline: ingest, deduplicate, reconcile, write back
    /// the masters, and fill the return template.
    Process {
        /// Challan export from the extraction stage (JSON or CSV)
        #[arg(long)]
        challans: String,
        /// TDS masters workbook
        #[arg(long)]
        masters: String,
        /// Return template workbook
        #[arg(long)]
        template: String,
        /// Output path (default: TDS_<Month>_<Year>.xlsx beside the template)
        #[arg(long)]
        out: Option<String>,
        /// Where to save the updated masters (default: <masters>_UPDATED.xlsx)
        #[arg(long = "updated-masters")]
        updated_masters: Option<String>,
    },
    /// Reconcile per-section totals only; exits non-zero on a mismatch.
    Validate {
        /// Challan export from the extraction stage (JSON or CSV)
        #[arg(long)]
        challans: String,
        /// TDS masters workbook
        #[arg(long)]
        masters: String,
    },
    /// Show how the masters columns were resolved.
    Inspect {
        /// TDS masters workbook
        #[arg(long)]
        masters: String,
    },
}
