//! Share code command handlers

use anyhow::{Context, Result};

use akc_core::{decode_share_code, ClueStore, ImportOptions, KeyValueStore};

use super::{parse_set_id, report_persist_error};
use crate::output::{Output, OutputFormat};

/// Print the share code for a set
pub fn export<B: KeyValueStore>(
    store: &ClueStore<B>,
    set_id: String,
    output: &Output,
) -> Result<()> {
    let set_id = parse_set_id(&set_id, store)?;
    let code = store
        .export_share_code(&set_id)
        .context("Failed to export clue set")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({"setId": set_id, "code": code})
            );
        }
        OutputFormat::Human | OutputFormat::Quiet => println!("{}", code),
    }
    Ok(())
}

/// Import a share code into an existing or new set
pub fn import<B: KeyValueStore>(
    store: &mut ClueStore<B>,
    code: String,
    into: Option<String>,
    title: Option<String>,
    no_create: bool,
    output: &Output,
) -> Result<()> {
    let target_set_id = into
        .map(|id| parse_set_id(&id, store))
        .transpose()?;

    let options = ImportOptions {
        create_if_missing: !no_create && target_set_id.is_none(),
        target_set_id,
        title_if_create: title,
    };
    let outcome = store
        .import_share_code(&code, &options)
        .context("Failed to import share code")?;
    report_persist_error(store, output);

    match output.format {
        OutputFormat::Json => output.json(&outcome),
        OutputFormat::Quiet => println!("{}", outcome.set_id),
        OutputFormat::Human => {
            if outcome.created {
                output.success(&format!("Created clue set: {}", outcome.set_id));
            }
            output.success(&format!(
                "Imported {} new clue(s) into {}",
                outcome.items_added, outcome.set_id
            ));
        }
    }
    Ok(())
}

/// Show the contents of a share code without importing it
pub fn decode(code: String, output: &Output) -> Result<()> {
    let payload = decode_share_code(&code).context("Failed to decode share code")?;
    output.print_payload(&payload);
    Ok(())
}
