//! Highlight import command handler

use std::path::PathBuf;

use anyhow::{Context, Result};

use akc_core::provider::parse_highlights;
use akc_core::{ClueStore, Config, KeyValueStore};

use super::{open_provider, parse_set_id, report_persist_error};
use crate::output::{Output, OutputFormat};

/// Add the segments listed in a highlight export file as clues
pub fn import<B: KeyValueStore>(
    store: &mut ClueStore<B>,
    config: &Config,
    set_id: String,
    file: PathBuf,
    output: &Output,
) -> Result<()> {
    let set_id = parse_set_id(&set_id, store)?;
    let provider = open_provider(config)?;

    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read highlights file: {:?}", file))?;
    let highlights = parse_highlights(&content)
        .with_context(|| format!("Failed to parse highlights file: {:?}", file))?;

    let outcome = store
        .import_highlights(&set_id, &highlights, &provider, config.preview_chars)
        .context("Failed to import highlights")?;
    report_persist_error(store, output);

    match output.format {
        OutputFormat::Json => output.json(&outcome),
        OutputFormat::Quiet => println!("{}", outcome.added),
        OutputFormat::Human => {
            output.success(&format!(
                "Added {} clue(s), {} already present",
                outcome.added, outcome.duplicates
            ));
            if !outcome.unknown_paths.is_empty() {
                output.warning(&format!(
                    "{} highlighted stor{} not found in content: {}",
                    outcome.unknown_paths.len(),
                    if outcome.unknown_paths.len() == 1 { "y" } else { "ies" },
                    outcome.unknown_paths.join(", ")
                ));
            }
        }
    }
    Ok(())
}
