//! Clue store
//!
//! The `ClueStore` owns every clue set. The whole state lives in memory and
//! is written back to a `KeyValueStore` as one snapshot after each change.
//!
//! ## Persistence policy
//!
//! Writes are best effort. If the backend fails, the in-memory state stays
//! correct, the failure is logged and kept in `last_persist_error()` so the
//! shell can warn that changes may not survive a restart.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = ClueStore::open(&config)?;
//!
//! let id = store.create_set(Some("Rhodes Island"));
//! store.add_item(&id, ClueItem::new("obt/main/level_main_00-01", 12))?;
//!
//! let code = store.export_share_code(&id)?;
//! ```

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::{self, EncodedCluePayload};
use crate::config::Config;
use crate::digest;
use crate::error::{ClueError, ClueResult};
use crate::models::{ClueItem, ClueSet, DEFAULT_SET_TITLE};
use crate::provider::{Highlight, StoryProvider};
use crate::resolver::{self, ClueResolution};
use crate::storage::{snapshot, FileKvStore, KeyValueStore, Snapshot, StorageError, STORE_KEY};

/// How many numbered titles are tried before falling back to an id suffix
const MAX_TITLE_ATTEMPTS: usize = 50;

/// Result of adding several clues to a set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AddOutcome {
    pub added: usize,
    /// Clues skipped because the set already had them
    pub duplicates: usize,
}

/// Where an imported share code should go
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Existing set to merge into
    pub target_set_id: Option<String>,
    /// Create a set when the target is missing or not given
    pub create_if_missing: bool,
    /// Title for a created set
    pub title_if_create: Option<String>,
}

/// Result of importing a share code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub set_id: String,
    pub created: bool,
    pub items_added: usize,
}

/// Result of importing highlights
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightImportOutcome {
    pub added: usize,
    pub duplicates: usize,
    /// Highlight paths that matched no known story
    pub unknown_paths: Vec<String>,
}

/// New details for one clue, applied by `update_item_details`
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDetails {
    pub story_id: String,
    pub segment_index: u32,
    pub digest: Option<u64>,
    pub preview: Option<String>,
}

/// In-memory clue sets backed by a key-value store
pub struct ClueStore<B: KeyValueStore = FileKvStore> {
    sets: Snapshot,
    backend: B,
    last_persist_error: Option<String>,
}

impl ClueStore<FileKvStore> {
    /// Open the file-backed store described by the configuration
    pub fn open(config: &Config) -> Result<Self> {
        let backend = FileKvStore::new(config.kv_dir());
        let store = Self::load(backend);
        if let Some(err) = store.last_persist_error() {
            return Err(anyhow::anyhow!(err.to_string()))
                .context("Failed to read stored clue sets");
        }
        Ok(store)
    }
}

impl<B: KeyValueStore> ClueStore<B> {
    /// Load the snapshot from a backend
    ///
    /// A missing snapshot gives an empty store. A backend read failure also
    /// gives an empty store, with the failure kept in `last_persist_error()`.
    pub fn load(backend: B) -> Self {
        let mut last_persist_error = None;
        let sets = match backend.get(STORE_KEY) {
            Ok(Some(blob)) => snapshot::from_blob(&blob),
            Ok(None) => Snapshot::new(),
            Err(e) => {
                warn!("Failed to read clue sets: {}", e);
                last_persist_error = Some(e.to_string());
                Snapshot::new()
            }
        };
        debug!("Loaded {} clue set(s)", sets.len());

        Self {
            sets,
            backend,
            last_persist_error,
        }
    }

    /// The backing store
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Error from the most recent failed write, cleared by the next success
    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    // ==================== Queries ====================

    /// All sets, oldest first
    pub fn sets(&self) -> Vec<&ClueSet> {
        let mut sets: Vec<_> = self.sets.values().collect();
        sets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sets
    }

    /// Get a set by id
    pub fn get_set(&self, id: &str) -> Option<&ClueSet> {
        self.sets.get(id)
    }

    /// Ids starting with a prefix
    pub fn find_set_ids_by_prefix(&self, prefix: &str) -> Vec<&str> {
        self.sets
            .keys()
            .filter(|id| id.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    /// Number of sets
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    // ==================== Set Operations ====================

    /// Create a set and return its id
    ///
    /// Blank or missing titles become a numbered default. A title already
    /// used by another set gets a numeric suffix.
    pub fn create_set(&mut self, title: Option<&str>) -> String {
        let id = self.generate_id();
        let title = self.unique_title(title, &id);
        self.sets.insert(id.clone(), ClueSet::new(id.clone(), title));
        info!("Created clue set {}", id);
        self.persist();
        id
    }

    /// Delete a set
    pub fn delete_set(&mut self, id: &str) -> ClueResult<ClueSet> {
        let removed = self
            .sets
            .remove(id)
            .ok_or_else(|| ClueError::NotFound(id.to_string()))?;
        self.persist();
        Ok(removed)
    }

    /// Rename a set; blank titles fall back to a default
    pub fn rename_set(&mut self, id: &str, title: &str) -> ClueResult<()> {
        self.require(id)?;
        let title = match title.trim() {
            "" => self.unique_title(None, id),
            t => t.to_string(),
        };
        self.mutate(id, |set| set.title = title)
    }

    /// Set or clear a set's description
    pub fn set_description(&mut self, id: &str, description: Option<&str>) -> ClueResult<()> {
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        self.mutate(id, |set| set.description = description)
    }

    // ==================== Item Operations ====================

    /// Add one clue; returns false if the set already had it
    pub fn add_item(&mut self, set_id: &str, item: ClueItem) -> ClueResult<bool> {
        Ok(self.add_items(set_id, vec![item])?.added == 1)
    }

    /// Append clues not already in the set, keeping caller order
    pub fn add_items(&mut self, set_id: &str, items: Vec<ClueItem>) -> ClueResult<AddOutcome> {
        let set = self
            .sets
            .get_mut(set_id)
            .ok_or_else(|| ClueError::NotFound(set_id.to_string()))?;

        let outcome = append_new(set, items);
        if outcome.added > 0 {
            set.touch();
            self.persist();
        }
        Ok(outcome)
    }

    /// Remove the clue at a story/segment pair; returns false if absent
    pub fn remove_item(
        &mut self,
        set_id: &str,
        story_id: &str,
        segment_index: u32,
    ) -> ClueResult<bool> {
        let pos = self.require(set_id)?.position(story_id, segment_index);
        match pos {
            Some(pos) => {
                self.mutate(set_id, |set| {
                    set.items.remove(pos);
                })?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Move the clue at `from` to position `to`
    pub fn reorder_item(&mut self, set_id: &str, from: usize, to: usize) -> ClueResult<()> {
        let len = self.require(set_id)?.items.len();
        for index in [from, to] {
            if index >= len {
                return Err(ClueError::IndexOutOfRange { index, len });
            }
        }
        if from == to {
            return Ok(());
        }
        self.mutate(set_id, |set| {
            let item = set.items.remove(from);
            set.items.insert(to, item);
        })
    }

    /// Replace the order of a set's clues
    ///
    /// `items` must hold exactly the clues already in the set (by
    /// story/segment pair); only their order may differ.
    pub fn set_items(&mut self, set_id: &str, items: Vec<ClueItem>) -> ClueResult<()> {
        let set = self.require(set_id)?;
        if !same_members(&set.items, &items) {
            return Err(ClueError::MembershipChanged);
        }
        self.mutate(set_id, |set| set.items = items)
    }

    /// Fill in digests and previews for existing clues
    ///
    /// Only absent fields are filled; updates for clues no longer in the
    /// set are ignored. Returns the number of clues changed.
    pub fn update_item_details(&mut self, set_id: &str, updates: &[ItemDetails]) -> ClueResult<usize> {
        let set = self
            .sets
            .get_mut(set_id)
            .ok_or_else(|| ClueError::NotFound(set_id.to_string()))?;

        let mut changed = 0;
        for update in updates {
            let Some(pos) = set.position(&update.story_id, update.segment_index) else {
                continue;
            };
            let item = &mut set.items[pos];
            let mut touched = false;
            if item.known_digest().is_none() {
                if let Some(d) = update.digest.filter(|d| *d != 0) {
                    item.digest = Some(d);
                    touched = true;
                }
            }
            if item.preview.is_none() {
                if let Some(p) = update.preview.as_deref().filter(|p| !p.trim().is_empty()) {
                    item.preview = Some(p.to_string());
                    touched = true;
                }
            }
            if touched {
                changed += 1;
            }
        }

        if changed > 0 {
            set.touch();
            self.persist();
        }
        Ok(changed)
    }

    // ==================== Share Codes ====================

    /// Export a set as a share code
    pub fn export_share_code(&self, set_id: &str) -> ClueResult<String> {
        let set = self.require(set_id)?;
        let payload = EncodedCluePayload::from_items(&set.items);
        Ok(codec::to_share_code(&payload)?)
    }

    /// Import a share code into an existing or new set
    ///
    /// Nothing is changed unless the code decodes cleanly.
    pub fn import_share_code(
        &mut self,
        code: &str,
        options: &ImportOptions,
    ) -> ClueResult<ImportOutcome> {
        let payload = codec::decode_share_code(code)?;
        let items = payload.to_items()?;

        let existing = options
            .target_set_id
            .as_deref()
            .filter(|id| self.sets.contains_key(*id));

        let (set_id, created) = match (existing, &options.target_set_id) {
            (Some(id), _) => (id.to_string(), false),
            (None, _) if options.create_if_missing => {
                (self.create_set(options.title_if_create.as_deref()), true)
            }
            (None, Some(id)) => return Err(ClueError::NotFound(id.clone())),
            (None, None) => return Err(ClueError::NoTarget),
        };

        let outcome = self.add_items(&set_id, items)?;
        info!(
            "Imported share code into {}: {} added, {} already present",
            set_id, outcome.added, outcome.duplicates
        );

        Ok(ImportOutcome {
            set_id,
            created,
            items_added: outcome.added,
        })
    }

    // ==================== Content ====================

    /// Resolve every clue of a set against current content
    pub fn resolve_set<P>(&self, set_id: &str, provider: &P) -> ClueResult<Vec<ClueResolution>>
    where
        P: StoryProvider + ?Sized,
    {
        let set = self.require(set_id)?;
        Ok(resolver::resolve_items(&set.items, provider))
    }

    /// Populate missing previews and digests from current content
    ///
    /// Goes through `update_item_details`, so it never bypasses the normal
    /// write path. Returns the number of clues changed.
    pub fn refresh_details<P>(
        &mut self,
        set_id: &str,
        provider: &P,
        preview_chars: usize,
    ) -> ClueResult<usize>
    where
        P: StoryProvider + ?Sized,
    {
        let updates: Vec<ItemDetails> = self
            .resolve_set(set_id, provider)?
            .into_iter()
            .filter(|r| r.item.preview.is_none() || r.item.known_digest().is_none())
            .filter_map(|r| {
                let segment = r.segment?;
                Some(ItemDetails {
                    story_id: r.item.story_id,
                    segment_index: r.item.segment_index,
                    digest: Some(digest::segment_digest(&segment)),
                    preview: Some(digest::make_preview(&segment, preview_chars)),
                })
            })
            .collect();

        if updates.is_empty() {
            return Ok(0);
        }
        self.update_item_details(set_id, &updates)
    }

    /// Add highlighted segments as clues
    pub fn import_highlights<P>(
        &mut self,
        set_id: &str,
        highlights: &[Highlight],
        provider: &P,
        preview_chars: usize,
    ) -> ClueResult<HighlightImportOutcome>
    where
        P: StoryProvider + ?Sized,
    {
        self.require(set_id)?;

        let mut outcome = HighlightImportOutcome::default();
        let mut items = Vec::new();
        for highlight in highlights {
            let story_id = match provider.story_id_for_path(&highlight.story_path) {
                Ok(Some(id)) => id,
                Ok(None) => {
                    outcome.unknown_paths.push(highlight.story_path.clone());
                    continue;
                }
                Err(e) => {
                    warn!("Failed to look up '{}': {:#}", highlight.story_path, e);
                    outcome.unknown_paths.push(highlight.story_path.clone());
                    continue;
                }
            };

            let segments = provider.segments(&story_id).unwrap_or_else(|e| {
                warn!("Failed to load story '{}': {:#}", story_id, e);
                None
            });

            for &index in &highlight.segment_indices {
                let segment = segments.as_ref().and_then(|s| s.get(index as usize));
                items.push(match segment {
                    Some(segment) => {
                        ClueItem::from_segment(story_id.clone(), index, segment, preview_chars)
                    }
                    None => ClueItem::new(story_id.clone(), index),
                });
            }
        }

        let added = self.add_items(set_id, items)?;
        outcome.added = added.added;
        outcome.duplicates = added.duplicates;
        Ok(outcome)
    }

    // ==================== Internals ====================

    fn require(&self, id: &str) -> ClueResult<&ClueSet> {
        self.sets
            .get(id)
            .ok_or_else(|| ClueError::NotFound(id.to_string()))
    }

    /// Apply a change to one set, refresh its timestamp and persist
    fn mutate<F>(&mut self, id: &str, change: F) -> ClueResult<()>
    where
        F: FnOnce(&mut ClueSet),
    {
        let set = self
            .sets
            .get_mut(id)
            .ok_or_else(|| ClueError::NotFound(id.to_string()))?;
        change(set);
        set.touch();
        self.persist();
        Ok(())
    }

    /// Write the full snapshot, swallowing failures
    fn persist(&mut self) {
        let result = snapshot::to_blob(&self.sets)
            .and_then(|blob| self.backend.set(STORE_KEY, &blob));
        match result {
            Ok(()) => self.last_persist_error = None,
            Err(e) => {
                warn!(
                    "Failed to save clue sets, changes are kept in memory only: {}",
                    e
                );
                self.last_persist_error = Some(describe(&e));
            }
        }
    }

    /// Time-based id with a random suffix
    fn generate_id(&self) -> String {
        loop {
            let random = Uuid::new_v4().simple().to_string();
            let id = format!("{:x}-{}", Utc::now().timestamp_millis(), &random[..6]);
            if !self.sets.contains_key(&id) {
                return id;
            }
        }
    }

    fn unique_title(&self, requested: Option<&str>, id: &str) -> String {
        let taken: HashSet<&str> = self
            .sets
            .values()
            .filter(|s| s.id != id)
            .map(|s| s.title.as_str())
            .collect();

        let requested = requested.map(str::trim).filter(|t| !t.is_empty());
        let (base, first) = match requested {
            Some(title) if !taken.contains(title) => return title.to_string(),
            Some(title) => (title.to_string(), 2),
            None => (DEFAULT_SET_TITLE.to_string(), self.sets.len().max(1)),
        };

        (first..first + MAX_TITLE_ATTEMPTS)
            .map(|n| format!("{} {}", base, n))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| format!("{} {}", base, id_suffix(id)))
    }
}

/// Append clues whose story/segment pair is new to the set
fn append_new(set: &mut ClueSet, items: Vec<ClueItem>) -> AddOutcome {
    let mut seen: HashSet<(String, u32)> = set
        .items
        .iter()
        .map(|i| (i.story_id.clone(), i.segment_index))
        .collect();

    let mut outcome = AddOutcome::default();
    for item in items {
        if seen.insert((item.story_id.clone(), item.segment_index)) {
            set.items.push(item);
            outcome.added += 1;
        } else {
            outcome.duplicates += 1;
        }
    }
    outcome
}

fn same_members(current: &[ClueItem], proposed: &[ClueItem]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }
    let current: HashSet<_> = current.iter().map(ClueItem::key).collect();
    let proposed: HashSet<_> = proposed.iter().map(ClueItem::key).collect();
    proposed.len() == current.len() && current == proposed
}

/// Last six characters of an id
fn id_suffix(id: &str) -> &str {
    let start = id.char_indices().rev().nth(5).map_or(0, |(i, _)| i);
    &id[start..]
}

fn describe(err: &StorageError) -> String {
    let mut message = err.to_string();
    if let Some(hint) = err.recovery_suggestion() {
        message.push(' ');
        message.push_str(hint);
    }
    if err.is_recoverable() {
        message.push_str(" The next change will retry the save.");
    }
    message
}
