//! Clue set command handlers

use anyhow::{Context, Result};

use akc_core::{ClueStore, KeyValueStore};

use super::{parse_set_id, report_persist_error};
use crate::output::Output;
use crate::prompt::confirm;

/// Create a new set
pub fn create<B: KeyValueStore>(
    store: &mut ClueStore<B>,
    title: Option<String>,
    output: &Output,
) -> Result<()> {
    let id = store.create_set(title.as_deref());
    report_persist_error(store, output);

    let set = store
        .get_set(&id)
        .context("Created set is missing from the store")?;
    output.success(&format!("Created clue set: {}", set.title));
    output.print_set(set);
    Ok(())
}

/// List all sets
pub fn list<B: KeyValueStore>(store: &ClueStore<B>, output: &Output) -> Result<()> {
    output.print_sets(&store.sets());
    Ok(())
}

/// Show a single set
pub fn show<B: KeyValueStore>(store: &ClueStore<B>, id: String, output: &Output) -> Result<()> {
    let id = parse_set_id(&id, store)?;
    let set = store
        .get_set(&id)
        .ok_or_else(|| anyhow::anyhow!("Clue set not found: {}", id))?;
    output.print_set(set);
    Ok(())
}

/// Rename a set
pub fn rename<B: KeyValueStore>(
    store: &mut ClueStore<B>,
    id: String,
    title: String,
    output: &Output,
) -> Result<()> {
    let id = parse_set_id(&id, store)?;
    store
        .rename_set(&id, &title)
        .context("Failed to rename clue set")?;
    report_persist_error(store, output);

    let new_title = store.get_set(&id).map(|s| s.title.clone()).unwrap_or(title);
    output.success(&format!("Renamed clue set to: {}", new_title));
    Ok(())
}

/// Set or clear a set's description
pub fn describe<B: KeyValueStore>(
    store: &mut ClueStore<B>,
    id: String,
    text: Option<String>,
    output: &Output,
) -> Result<()> {
    let id = parse_set_id(&id, store)?;
    store
        .set_description(&id, text.as_deref())
        .context("Failed to update description")?;
    report_persist_error(store, output);

    match text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(_) => output.success("Description updated"),
        None => output.success("Description cleared"),
    }
    Ok(())
}

/// Delete a set
pub fn delete<B: KeyValueStore>(
    store: &mut ClueStore<B>,
    id: String,
    output: &Output,
) -> Result<()> {
    let id = parse_set_id(&id, store)?;
    let set = store
        .get_set(&id)
        .ok_or_else(|| anyhow::anyhow!("Clue set not found: {}", id))?;

    // Confirm deletion
    if output.should_prompt() {
        println!(
            "Delete clue set: {} - {} ({} clue(s))",
            id,
            set.title,
            set.items.len()
        );
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.delete_set(&id).context("Failed to delete clue set")?;
    report_persist_error(store, output);

    output.success(&format!("Deleted clue set: {}", id));
    Ok(())
}
