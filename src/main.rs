mod challan;
mod cli;
mod columns;
mod error;
mod fmt;
mod ledger;
mod models;
mod populate;
mod reconcile;
mod settings;

use clap::Parser;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Process {
            challans,
            masters,
            template,
            out,
            updated_masters,
        } => cli::process::run(
            &challans,
            &masters,
            &template,
            out.as_deref(),
            updated_masters.as_deref(),
        ),
        Commands::Validate { challans, masters } => cli::validate::run(&challans, &masters),
        Commands::Inspect { masters } => cli::inspect::run(&masters),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
