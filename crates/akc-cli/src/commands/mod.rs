//! Command handlers

pub mod clue;
pub mod config;
pub mod highlights;
pub mod resolve;
pub mod set;
pub mod share;

use anyhow::{bail, Context, Result};

use akc_core::{ClueStore, Config, DirStoryProvider, KeyValueStore};

use crate::output::Output;

/// Resolve a set id or unique id prefix to a full id
pub fn parse_set_id<B: KeyValueStore>(id: &str, store: &ClueStore<B>) -> Result<String> {
    if store.get_set(id).is_some() {
        return Ok(id.to_string());
    }

    let matches = store.find_set_ids_by_prefix(id);
    match matches.len() {
        0 => bail!("No clue set found matching: {}", id),
        1 => Ok(matches[0].to_string()),
        _ => {
            eprintln!("Multiple clue sets match '{}':", id);
            for set_id in &matches {
                let title = store.get_set(set_id).map(|s| s.title.as_str()).unwrap_or("");
                eprintln!("  {} - {}", set_id, title);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Open the configured story content directory
pub fn open_provider(config: &Config) -> Result<DirStoryProvider> {
    let Some(ref dir) = config.content_dir else {
        bail!(
            "No story content configured.\n\
             Set one with: akc config set content_dir /path/to/content"
        );
    };
    DirStoryProvider::open(dir).context("Failed to open story content")
}

/// Tell the user when the last change could not be saved
pub fn report_persist_error<B: KeyValueStore>(store: &ClueStore<B>, output: &Output) {
    if let Some(err) = store.last_persist_error() {
        output.warning(&format!(
            "changes could not be saved and will be lost on exit: {}",
            err
        ));
    }
}
