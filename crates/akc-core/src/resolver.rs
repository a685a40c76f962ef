//! Locating bookmarked passages in current content
//!
//! Segment indices drift when story data is re-parsed, so a stored index is
//! only a hint. Resolution tries, in order:
//!
//! 1. **Direct**: the segment at the stored index, confirmed by digest when
//!    the clue has one
//! 2. **Neighborhood**: the first segment within ±12 positions whose digest
//!    matches
//! 3. **Preview**: the first segment whose display text contains the stored
//!    preview (whitespace-collapsed, case-folded)
//!
//! When all three fail the clue is unresolved. This is a best-effort
//! heuristic: if a story repeats a passage, the first match wins.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::digest::{display_text, fold_for_match, segment_digest};
use crate::models::{ClueItem, StorySegment};
use crate::provider::StoryProvider;

/// How far from the stored index the digest search looks
pub const NEIGHBORHOOD_WINDOW: usize = 12;

/// Which stage located the passage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveMethod {
    Direct,
    Neighborhood,
    Preview,
}

/// Outcome of resolving one clue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Resolution {
    Resolved { index: usize, method: ResolveMethod },
    Unresolved,
}

impl Resolution {
    /// Resolved segment index, if any
    pub fn index(&self) -> Option<usize> {
        match self {
            Resolution::Resolved { index, .. } => Some(*index),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

/// Resolve a clue against a story's current segments
pub fn resolve(item: &ClueItem, segments: &[StorySegment]) -> Resolution {
    let stored = item.segment_index as usize;
    let digest = item.known_digest();

    if let Some(segment) = segments.get(stored) {
        match digest {
            None => return resolved(stored, ResolveMethod::Direct),
            Some(d) if segment_digest(segment) == d => {
                return resolved(stored, ResolveMethod::Direct)
            }
            Some(_) => debug!(
                "Digest mismatch at {}#{}, searching neighborhood",
                item.story_id, stored
            ),
        }
    }

    if let Some(d) = digest {
        if let Some(index) = search_neighborhood(segments, stored, d) {
            return resolved(index, ResolveMethod::Neighborhood);
        }
    }

    if let Some(preview) = item.preview.as_deref() {
        if let Some(index) = search_preview(segments, preview) {
            return resolved(index, ResolveMethod::Preview);
        }
    }

    debug!("Could not locate {}#{}", item.story_id, stored);
    Resolution::Unresolved
}

fn resolved(index: usize, method: ResolveMethod) -> Resolution {
    Resolution::Resolved { index, method }
}

fn search_neighborhood(segments: &[StorySegment], stored: usize, digest: u64) -> Option<usize> {
    let last = segments.len().checked_sub(1)?;
    let lo = stored.saturating_sub(NEIGHBORHOOD_WINDOW);
    let hi = stored.saturating_add(NEIGHBORHOOD_WINDOW).min(last);
    (lo..=hi)
        .filter(|&i| i != stored)
        .find(|&i| segment_digest(&segments[i]) == digest)
}

fn search_preview(segments: &[StorySegment], preview: &str) -> Option<usize> {
    let needle = fold_for_match(preview);
    if needle.is_empty() {
        return None;
    }
    segments
        .iter()
        .position(|segment| fold_for_match(&display_text(segment)).contains(&needle))
}

/// Resolution of one clue in a batch, with the located segment
#[derive(Debug, Clone)]
pub struct ClueResolution {
    pub item: ClueItem,
    pub resolution: Resolution,
    pub segment: Option<StorySegment>,
}

/// Resolve many clues, fetching each story's content once
///
/// A story that cannot be loaded only leaves its own clues unresolved.
pub fn resolve_items<P>(items: &[ClueItem], provider: &P) -> Vec<ClueResolution>
where
    P: StoryProvider + ?Sized,
{
    let mut content: HashMap<&str, Option<Vec<StorySegment>>> = HashMap::new();

    items
        .iter()
        .map(|item| {
            let segments = content
                .entry(item.story_id.as_str())
                .or_insert_with(|| match provider.segments(&item.story_id) {
                    Ok(segments) => segments,
                    Err(e) => {
                        warn!("Failed to load story '{}': {:#}", item.story_id, e);
                        None
                    }
                })
                .as_deref();

            let resolution = segments.map_or(Resolution::Unresolved, |s| resolve(item, s));
            let segment = resolution.index().and_then(|i| segments?.get(i)).cloned();

            ClueResolution {
                item: item.clone(),
                resolution,
                segment,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::make_preview;
    use crate::models::StoryMeta;
    use crate::provider::MemoryStoryProvider;

    fn story(n: usize) -> Vec<StorySegment> {
        (0..n)
            .map(|i| StorySegment::narration(format!("Line number {} of the story.", i)))
            .collect()
    }

    fn clue_for(segments: &[StorySegment], index: usize) -> ClueItem {
        ClueItem::from_segment("s", index as u32, &segments[index], 80)
    }

    #[test]
    fn test_direct_hit_with_matching_digest() {
        let segments = story(5);
        let item = clue_for(&segments, 3);
        assert_eq!(
            resolve(&item, &segments),
            Resolution::Resolved {
                index: 3,
                method: ResolveMethod::Direct
            }
        );
    }

    #[test]
    fn test_direct_hit_without_digest() {
        let segments = story(5);
        let item = ClueItem::new("s", 4);
        assert_eq!(
            resolve(&item, &segments),
            Resolution::Resolved {
                index: 4,
                method: ResolveMethod::Direct
            }
        );
    }

    #[test]
    fn test_direct_match_never_falls_through() {
        // Same passage appears earlier inside the window; direct hit still wins
        let mut segments = story(10);
        segments[2] = StorySegment::narration("Repeated line");
        segments[6] = StorySegment::narration("Repeated line");
        let item = clue_for(&segments, 6);

        assert_eq!(
            resolve(&item, &segments),
            Resolution::Resolved {
                index: 6,
                method: ResolveMethod::Direct
            }
        );
    }

    #[test]
    fn test_neighborhood_after_deletions() {
        let original = story(20);
        let item = clue_for(&original, 10);

        // Two segments removed before index 10: the passage is now at 8
        let mut current = original.clone();
        current.remove(3);
        current.remove(5);
        assert_eq!(current[8], original[10]);

        assert_eq!(
            resolve(&item, &current),
            Resolution::Resolved {
                index: 8,
                method: ResolveMethod::Neighborhood
            }
        );
    }

    #[test]
    fn test_neighborhood_when_stored_index_past_end() {
        let original = story(20);
        let item = clue_for(&original, 19);
        let current: Vec<_> = original[5..].to_vec();

        assert_eq!(
            resolve(&item, &current),
            Resolution::Resolved {
                index: 14,
                method: ResolveMethod::Neighborhood
            }
        );
    }

    #[test]
    fn test_drift_beyond_window_uses_preview() {
        let original = story(40);
        let item = clue_for(&original, 30);

        let current: Vec<_> = original[15..].to_vec();
        assert_eq!(
            resolve(&item, &current),
            Resolution::Resolved {
                index: 15,
                method: ResolveMethod::Preview
            }
        );

        let mut no_preview = item.clone();
        no_preview.preview = None;
        assert_eq!(resolve(&no_preview, &current), Resolution::Unresolved);
    }

    #[test]
    fn test_preview_matches_despite_reformatting() {
        let segments = vec![
            StorySegment::narration("Something else"),
            StorySegment::dialogue("Amiya", "Doctor,\n   PLEASE wake up."),
        ];
        let item = ClueItem::new("s", 0)
            .with_digest(12345)
            .with_preview("amiya: doctor, please");

        assert_eq!(
            resolve(&item, &segments),
            Resolution::Resolved {
                index: 1,
                method: ResolveMethod::Preview
            }
        );
    }

    #[test]
    fn test_preview_takes_first_duplicate() {
        let segments = vec![
            StorySegment::narration("intro"),
            StorySegment::narration("The same words"),
            StorySegment::narration("The same words"),
        ];
        let item = ClueItem::new("s", 50).with_preview(make_preview(&segments[2], 80));
        assert_eq!(resolve(&item, &segments).index(), Some(1));
    }

    #[test]
    fn test_unresolved_on_empty_content() {
        let item = ClueItem::new("s", 0).with_digest(1).with_preview("x");
        assert_eq!(resolve(&item, &[]), Resolution::Unresolved);
        assert!(!resolve(&item, &[]).is_resolved());
    }

    #[test]
    fn test_changed_text_without_preview_is_unresolved() {
        let original = story(5);
        let mut item = clue_for(&original, 2);
        item.preview = None;

        let mut current = original.clone();
        current[2] = StorySegment::narration("Completely rewritten.");
        assert_eq!(resolve(&item, &current), Resolution::Unresolved);
    }

    struct FailingProvider;

    impl StoryProvider for FailingProvider {
        fn segments(&self, story_id: &str) -> anyhow::Result<Option<Vec<StorySegment>>> {
            if story_id == "bad" {
                anyhow::bail!("disk on fire");
            }
            Ok(Some(story(3)))
        }

        fn metadata(&self, _story_id: &str) -> anyhow::Result<Option<StoryMeta>> {
            Ok(None)
        }

        fn story_id_for_path(&self, _path: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
    }

    #[test]
    fn test_batch_isolates_failures() {
        let items = vec![
            ClueItem::new("good", 1),
            ClueItem::new("bad", 1),
            ClueItem::new("good", 2),
        ];
        let results = resolve_items(&items, &FailingProvider);

        assert_eq!(results.len(), 3);
        assert!(results[0].resolution.is_resolved());
        assert_eq!(results[1].resolution, Resolution::Unresolved);
        assert!(results[1].segment.is_none());
        assert_eq!(results[2].resolution.index(), Some(2));
        assert_eq!(results[2].segment, Some(story(3)[2].clone()));
    }

    #[test]
    fn test_batch_missing_story_is_unresolved() {
        let mut provider = MemoryStoryProvider::new();
        provider.insert_story("known", story(2));

        let items = vec![ClueItem::new("unknown", 0), ClueItem::new("known", 0)];
        let results = resolve_items(&items, &provider);
        assert_eq!(results[0].resolution, Resolution::Unresolved);
        assert!(results[1].resolution.is_resolved());
    }
}
