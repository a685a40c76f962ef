//! Clue command handlers

use anyhow::{Context, Result};
use tracing::debug;

use akc_core::{ClueItem, ClueStore, Config, KeyValueStore, StoryProvider};

use super::{open_provider, parse_set_id, report_persist_error};
use crate::output::Output;

/// Bookmark a passage
///
/// With story content configured, the digest and preview are taken from
/// the current segment. A `--preview` given on the command line wins.
pub fn add<B: KeyValueStore>(
    store: &mut ClueStore<B>,
    config: &Config,
    set_id: String,
    story_id: String,
    index: u32,
    preview: Option<String>,
    output: &Output,
) -> Result<()> {
    let set_id = parse_set_id(&set_id, store)?;

    let mut item = match lookup_segment_item(config, &story_id, index) {
        Some(item) => item,
        None => ClueItem::new(story_id.clone(), index),
    };
    if let Some(text) = preview {
        item = item.with_preview(text);
    }

    let added = store.add_item(&set_id, item).context("Failed to add clue")?;
    report_persist_error(store, output);

    if added {
        output.success(&format!("Added clue {} #{}", story_id, index));
    } else {
        output.message(&format!("Clue {} #{} is already in this set", story_id, index));
    }
    Ok(())
}

fn lookup_segment_item(config: &Config, story_id: &str, index: u32) -> Option<ClueItem> {
    config.content_dir.as_ref()?;
    let provider = match open_provider(config) {
        Ok(p) => p,
        Err(e) => {
            debug!("Story content unavailable: {:#}", e);
            return None;
        }
    };
    let segments = match provider.segments(story_id) {
        Ok(s) => s?,
        Err(e) => {
            debug!("Failed to load story '{}': {:#}", story_id, e);
            return None;
        }
    };
    let segment = segments.get(index as usize)?;
    Some(ClueItem::from_segment(
        story_id,
        index,
        segment,
        config.preview_chars,
    ))
}

/// Remove a clue
pub fn remove<B: KeyValueStore>(
    store: &mut ClueStore<B>,
    set_id: String,
    story_id: String,
    index: u32,
    output: &Output,
) -> Result<()> {
    let set_id = parse_set_id(&set_id, store)?;
    let removed = store
        .remove_item(&set_id, &story_id, index)
        .context("Failed to remove clue")?;
    report_persist_error(store, output);

    if removed {
        output.success(&format!("Removed clue {} #{}", story_id, index));
    } else {
        output.message(&format!("Clue {} #{} is not in this set", story_id, index));
    }
    Ok(())
}

/// Move a clue to a new position
pub fn move_item<B: KeyValueStore>(
    store: &mut ClueStore<B>,
    set_id: String,
    from: usize,
    to: usize,
    output: &Output,
) -> Result<()> {
    let set_id = parse_set_id(&set_id, store)?;
    store
        .reorder_item(&set_id, from, to)
        .context("Failed to move clue")?;
    report_persist_error(store, output);

    output.success(&format!("Moved clue {} to position {}", from, to));
    Ok(())
}
