//! Story content collaborators
//!
//! Parsing story scripts happens elsewhere; this crate only consumes the
//! result. A `StoryProvider` hands out the current segment sequence and
//! display metadata for a story id.
//!
//! `DirStoryProvider` reads exported content from disk:
//!
//! ```text
//! <root>/index.json              [StoryMeta, ...]  (optional)
//! <root>/stories/<story_id>.json { "segments": [StorySegment, ...] }
//! ```
//!
//! Story ids may contain `/`, which maps to nested directories.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{StoryMeta, StorySegment};

/// Source of parsed story content
pub trait StoryProvider {
    /// Current segments of a story, `None` if the story is unknown
    fn segments(&self, story_id: &str) -> Result<Option<Vec<StorySegment>>>;

    /// Display metadata for a story
    fn metadata(&self, story_id: &str) -> Result<Option<StoryMeta>>;

    /// Map a story text path (as used by highlight exports) to a story id
    fn story_id_for_path(&self, path: &str) -> Result<Option<String>>;
}

/// Highlighted segments of one story, as exported by the reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub story_path: String,
    pub segment_indices: BTreeSet<u32>,
}

/// Parse a highlight export: a JSON object of story path to segment indices
pub fn parse_highlights(json: &str) -> Result<Vec<Highlight>> {
    let map: BTreeMap<String, BTreeSet<u32>> =
        serde_json::from_str(json).context("Highlights must map story paths to index lists")?;
    Ok(map
        .into_iter()
        .map(|(story_path, segment_indices)| Highlight {
            story_path,
            segment_indices,
        })
        .collect())
}

#[derive(Deserialize)]
struct StoryFile {
    segments: Vec<StorySegment>,
}

/// Provider over a directory of exported story content
#[derive(Debug, Clone)]
pub struct DirStoryProvider {
    root: PathBuf,
    index: Vec<StoryMeta>,
}

impl DirStoryProvider {
    /// Open a content directory, reading `index.json` if present
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            bail!("Content directory not found: {:?}", root);
        }

        let index_path = root.join("index.json");
        let index = if index_path.exists() {
            let content = fs::read_to_string(&index_path)
                .with_context(|| format!("Failed to read story index {:?}", index_path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse story index {:?}", index_path))?
        } else {
            Vec::new()
        };

        Ok(Self { root, index })
    }

    /// Content root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn story_path(&self, story_id: &str) -> Option<PathBuf> {
        let relative = Path::new(story_id);
        let safe = !story_id.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| self.root.join("stories").join(format!("{}.json", story_id)))
    }
}

impl StoryProvider for DirStoryProvider {
    fn segments(&self, story_id: &str) -> Result<Option<Vec<StorySegment>>> {
        let Some(path) = self.story_path(story_id) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read story content {:?}", path))?;
        let story: StoryFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse story content {:?}", path))?;
        Ok(Some(story.segments))
    }

    fn metadata(&self, story_id: &str) -> Result<Option<StoryMeta>> {
        Ok(self.index.iter().find(|m| m.story_id == story_id).cloned())
    }

    fn story_id_for_path(&self, path: &str) -> Result<Option<String>> {
        if let Some(meta) = self
            .index
            .iter()
            .find(|m| m.story_txt.as_deref() == Some(path))
        {
            return Ok(Some(meta.story_id.clone()));
        }
        // Fall back to treating the path as a story id
        let exists = self.story_path(path).is_some_and(|p| p.exists());
        Ok(exists.then(|| path.to_string()))
    }
}

/// Provider holding content in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStoryProvider {
    stories: HashMap<String, Vec<StorySegment>>,
    metas: HashMap<String, StoryMeta>,
}

impl MemoryStoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a story's segments
    pub fn insert_story(&mut self, story_id: impl Into<String>, segments: Vec<StorySegment>) {
        self.stories.insert(story_id.into(), segments);
    }

    /// Add or replace a story's metadata
    pub fn insert_meta(&mut self, meta: StoryMeta) {
        self.metas.insert(meta.story_id.clone(), meta);
    }
}

impl StoryProvider for MemoryStoryProvider {
    fn segments(&self, story_id: &str) -> Result<Option<Vec<StorySegment>>> {
        Ok(self.stories.get(story_id).cloned())
    }

    fn metadata(&self, story_id: &str) -> Result<Option<StoryMeta>> {
        Ok(self.metas.get(story_id).cloned())
    }

    fn story_id_for_path(&self, path: &str) -> Result<Option<String>> {
        if let Some(meta) = self
            .metas
            .values()
            .find(|m| m.story_txt.as_deref() == Some(path))
        {
            return Ok(Some(meta.story_id.clone()));
        }
        Ok(self.stories.contains_key(path).then(|| path.to_string()))
    }
}
