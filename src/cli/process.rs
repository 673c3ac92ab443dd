use std::path::{Path, PathBuf};

use crate::challan;
use crate::cli::render;
use crate::error::Result;
use crate::ledger;
use crate::populate;
use crate::reconcile;
use crate::settings::load_settings;

pub fn run(
    challans: &str,
    masters: &str,
    template: &str,
    out: Option<&str>,
    updated_masters: Option<&str>,
) -> Result<()> {
    let settings = load_settings();
    let masters_path = Path::new(masters);

    let load = challan::load_challans(Path::new(challans))?;
    let deduped = challan::dedup(load.records);
    let mut read = ledger::read_masters(masters_path, &settings)?;

    render::read_summary(&read);
    render::dedup_summary(&deduped);

    // Validation failure is reported but never stops the pipeline.
    let report = reconcile::reconcile(&read.rows, &deduped.unique, settings.tolerance);
    render::validation_table(&report);

    let updated_path = match updated_masters {
        Some(p) => PathBuf::from(p),
        None => populate::updated_masters_path(masters_path),
    };
    let update = populate::update_masters(masters_path, &updated_path, &mut read, &deduped.unique)?;
    println!(
        "Updated masters: {} ({} rows written back)",
        update.out_path.display(),
        update.rows_updated
    );

    let out_path = match out {
        Some(p) => PathBuf::from(p),
        None => Path::new(template)
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(populate::output_filename(&read.rows)),
    };
    let populated = populate::generate_output(
        Path::new(template),
        &out_path,
        &read,
        &deduped.unique,
        &settings,
    )?;
    println!(
        "Return written: {} ({} challans, {} deductees)",
        populated.out_path.display(),
        populated.challan_rows,
        populated.deductee_rows
    );

    let mut diagnostics = read.diagnostics.clone();
    diagnostics.extend(load.diagnostics);
    diagnostics.extend(deduped.diagnostics);
    diagnostics.extend(report.diagnostics);
    diagnostics.extend(update.diagnostics);
    diagnostics.extend(populated.diagnostics);
    render::diagnostics(&diagnostics);

    Ok(())
}
