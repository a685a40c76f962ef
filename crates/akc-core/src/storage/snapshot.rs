//! Clue store snapshots
//!
//! The persisted blob is a JSON object mapping set id to set. Reading is
//! lenient: the blob may come from an older or newer build, or may have
//! been edited by hand, so every field is checked and coerced rather than
//! trusted. Whatever cannot be repaired is dropped.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::error::StorageResult;
use crate::models::{digest_hex, now_millis, ClueItem, ClueSet, DEFAULT_SET_TITLE};

/// All sets keyed by id
pub type Snapshot = BTreeMap<String, ClueSet>;

/// Serialize a snapshot to its persisted form
pub fn to_blob(sets: &Snapshot) -> StorageResult<String> {
    Ok(serde_json::to_string(sets)?)
}

/// Parse and sanitize a persisted blob
///
/// Never fails: unreadable input yields an empty snapshot.
pub fn from_blob(blob: &str) -> Snapshot {
    let value: Value = match serde_json::from_str(blob) {
        Ok(v) => v,
        Err(e) => {
            warn!("Stored clue sets are not valid JSON, starting empty: {}", e);
            return Snapshot::new();
        }
    };

    let Value::Object(entries) = value else {
        warn!("Stored clue sets are not a JSON object, starting empty");
        return Snapshot::new();
    };

    let mut sets = Snapshot::new();
    for (key, entry) in entries {
        let Some(set) = sanitize_set(&key, &entry) else {
            debug!("Dropping malformed clue set entry '{}'", key);
            continue;
        };
        match sets.entry(set.id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(set);
            }
            Entry::Occupied(_) => {
                debug!("Dropping clue set entry '{}': id '{}' already loaded", key, set.id)
            }
        }
    }
    sets
}

fn sanitize_set(key: &str, value: &Value) -> Option<ClueSet> {
    let obj = value.as_object()?;

    let id = non_empty_str(obj, "id").unwrap_or(key).to_string();
    if id.is_empty() {
        return None;
    }

    let title = non_empty_str(obj, "title")
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_SET_TITLE.to_string());
    let description = obj
        .get("desc")
        .and_then(Value::as_str)
        .map(str::to_string);

    let now = now_millis();
    let created_at = obj.get("createdAt").and_then(parse_timestamp).unwrap_or(now);
    let updated_at = obj
        .get("updatedAt")
        .and_then(parse_timestamp)
        .unwrap_or(created_at);

    let mut seen = HashSet::new();
    let mut dropped = 0usize;
    let mut items = Vec::new();
    for raw in obj.get("items").and_then(Value::as_array).into_iter().flatten() {
        match sanitize_item(raw, created_at) {
            Some(item) if seen.insert((item.story_id.clone(), item.segment_index)) => {
                items.push(item)
            }
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!("Dropped {} malformed or duplicate clue(s) from set '{}'", dropped, id);
    }

    Some(ClueSet {
        id,
        title,
        description,
        items,
        created_at,
        updated_at,
    })
}

fn sanitize_item(value: &Value, fallback_time: DateTime<Utc>) -> Option<ClueItem> {
    let obj = value.as_object()?;

    let story_id = non_empty_str(obj, "storyId")?.to_string();
    let segment_index = obj
        .get("segmentIndex")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())?;

    let digest = match obj.get("digest") {
        Some(Value::String(s)) => digest_hex::parse(s),
        Some(Value::Number(n)) => n.as_u64(),
        _ => None,
    }
    .filter(|d| *d != 0);

    let preview = obj
        .get("preview")
        .and_then(Value::as_str)
        .filter(|p| !p.trim().is_empty())
        .map(str::to_string);

    let created_at = obj
        .get("createdAt")
        .and_then(parse_timestamp)
        .unwrap_or(fallback_time);

    Some(ClueItem {
        story_id,
        segment_index,
        digest,
        preview,
        created_at,
    })
}

fn non_empty_str<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Milliseconds since the epoch, or an RFC 3339 string
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let ms = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            Utc.timestamp_millis_opt(ms).single()
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).trunc_subsecs(3)),
        _ => None,
    }
}
