use std::path::Path;

use crate::cli::render;
use crate::error::Result;
use crate::ledger;
use crate::settings::load_settings;

pub fn run(masters: &str) -> Result<()> {
    let settings = load_settings();
    let read = ledger::read_masters(Path::new(masters), &settings)?;

    render::column_map(&read);
    render::read_summary(&read);
    render::diagnostics(&read.diagnostics);
    Ok(())
}
