//! Resolve command handler

use anyhow::{Context, Result};

use akc_core::{ClueStore, Config, KeyValueStore};

use super::{open_provider, parse_set_id, report_persist_error};
use crate::output::Output;

/// Locate every clue of a set in the current story content
///
/// With `refresh`, missing previews and digests are filled in first.
pub fn resolve<B: KeyValueStore>(
    store: &mut ClueStore<B>,
    config: &Config,
    set_id: String,
    refresh: bool,
    output: &Output,
) -> Result<()> {
    let set_id = parse_set_id(&set_id, store)?;
    let provider = open_provider(config)?;

    if refresh {
        let changed = store
            .refresh_details(&set_id, &provider, config.preview_chars)
            .context("Failed to refresh clue details")?;
        report_persist_error(store, output);
        if changed > 0 && !output.is_json() {
            output.message(&format!("Filled in details for {} clue(s)", changed));
        }
    }

    let results = store
        .resolve_set(&set_id, &provider)
        .context("Failed to resolve clue set")?;
    output.print_resolutions(&results);
    Ok(())
}
