use std::path::Path;

use crate::challan;
use crate::cli::render;
use crate::error::{Result, TdsError};
use crate::ledger;
use crate::reconcile;
use crate::settings::load_settings;

pub fn run(challans: &str, masters: &str) -> Result<()> {
    let settings = load_settings();

    let load = challan::load_challans(Path::new(challans))?;
    let deduped = challan::dedup(load.records);
    let read = ledger::read_masters(Path::new(masters), &settings)?;

    render::read_summary(&read);
    render::dedup_summary(&deduped);

    let report = reconcile::reconcile(&read.rows, &deduped.unique, settings.tolerance);
    render::validation_table(&report);

    let mut diagnostics = read.diagnostics;
    diagnostics.extend(load.diagnostics);
    diagnostics.extend(deduped.diagnostics);
    diagnostics.extend(report.diagnostics.clone());
    render::diagnostics(&diagnostics);

    if !report.passed {
        return Err(TdsError::Other(format!(
            "per-section totals differ by more than {} rupee",
            settings.tolerance
        )));
    }
    Ok(())
}
