//! Data models for clue bookmarks
//!
//! Defines the bookmark structures (ClueItem, ClueSet) and the parsed
//! story content they point into (StorySegment, StoryMeta).

use chrono::serde::ts_milliseconds;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::digest;

/// Title given to sets created without one
pub const DEFAULT_SET_TITLE: &str = "Clue Set";

/// Current time at the precision timestamps are persisted with
pub(crate) fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// One bookmarked passage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClueItem {
    /// Story the passage belongs to
    pub story_id: String,
    /// Position of the passage when it was bookmarked (may drift)
    pub segment_index: u32,
    /// Content digest of the passage, `None` when unknown
    #[serde(default, with = "digest_hex", skip_serializing_if = "Option::is_none")]
    pub digest: Option<u64>,
    /// Short first-line text, used for display and as a fallback match key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// When this clue was created
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl ClueItem {
    /// Create a clue without digest or preview
    pub fn new(story_id: impl Into<String>, segment_index: u32) -> Self {
        Self {
            story_id: story_id.into(),
            segment_index,
            digest: None,
            preview: None,
            created_at: now_millis(),
        }
    }

    /// Create a clue for a segment, computing its digest and preview
    pub fn from_segment(
        story_id: impl Into<String>,
        segment_index: u32,
        segment: &StorySegment,
        preview_chars: usize,
    ) -> Self {
        let preview = digest::make_preview(segment, preview_chars);
        Self::new(story_id, segment_index)
            .with_digest(digest::segment_digest(segment))
            .with_preview(preview)
    }

    /// Set the digest; zero is treated as unknown
    pub fn with_digest(mut self, digest: u64) -> Self {
        self.digest = (digest != 0).then_some(digest);
        self
    }

    /// Set the preview; blank text is treated as absent
    pub fn with_preview(mut self, preview: impl Into<String>) -> Self {
        let preview = preview.into();
        self.preview = (!preview.trim().is_empty()).then_some(preview);
        self
    }

    /// The dedupe key within a set
    pub fn key(&self) -> (&str, u32) {
        (&self.story_id, self.segment_index)
    }

    /// Digest if present and non-zero
    pub fn known_digest(&self) -> Option<u64> {
        self.digest.filter(|d| *d != 0)
    }
}

/// A named, ordered collection of clues
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClueSet {
    /// Stable identifier
    pub id: String,
    /// Display name
    pub title: String,
    /// Optional description
    #[serde(default, rename = "desc", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Clues in display/export order
    pub items: Vec<ClueItem>,
    /// When this set was created
    #[serde(with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// When this set was last changed
    #[serde(with = "ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl ClueSet {
    /// Create an empty set
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether a clue with this story/segment pair is present
    pub fn contains(&self, story_id: &str, segment_index: u32) -> bool {
        self.position(story_id, segment_index).is_some()
    }

    /// Position of the clue with this story/segment pair
    pub fn position(&self, story_id: &str, segment_index: u32) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.key() == (story_id, segment_index))
    }

    /// Refresh the modification time
    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }
}

/// One unit of parsed story content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorySegment {
    Dialogue {
        #[serde(rename = "characterName")]
        character_name: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<String>,
    },
    Narration {
        text: String,
    },
    Decision {
        options: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        values: Vec<String>,
    },
    System {
        #[serde(default)]
        speaker: Option<String>,
        text: String,
    },
    Subtitle {
        text: String,
        #[serde(default)]
        alignment: Option<String>,
    },
    Sticker {
        text: String,
        #[serde(default)]
        alignment: Option<String>,
    },
    Header {
        title: String,
    },
}

impl StorySegment {
    pub fn narration(text: impl Into<String>) -> Self {
        StorySegment::Narration { text: text.into() }
    }

    pub fn dialogue(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        StorySegment::Dialogue {
            character_name: speaker.into(),
            text: text.into(),
            position: None,
        }
    }
}

/// Display metadata for a story
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoryMeta {
    #[serde(rename = "storyId")]
    pub story_id: String,
    #[serde(rename = "storyName")]
    pub story_name: String,
    #[serde(rename = "storyCode", default)]
    pub story_code: Option<String>,
    /// Source text path, used to map highlight paths to story ids
    #[serde(rename = "storyTxt", default)]
    pub story_txt: Option<String>,
}

/// Serde adapter writing digests as fixed-width hex strings
///
/// JSON numbers lose precision past 2^53, so digests never travel as numbers.
pub(crate) mod digest_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(digest: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match digest {
            Some(d) => serializer.serialize_str(&format!("{:016x}", d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) => parse(&s)
                .map(|d| (d != 0).then_some(d))
                .ok_or_else(|| serde::de::Error::custom(format!("invalid digest: {}", s))),
        }
    }

    /// Parse a hex digest, with or without a `0x` prefix
    pub fn parse(s: &str) -> Option<u64> {
        let s = s.trim();
        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if hex.is_empty() || hex.len() > 16 {
            return None;
        }
        u64::from_str_radix(hex, 16).ok()
    }
}
