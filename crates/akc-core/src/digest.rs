//! Passage digests
//!
//! A digest identifies a passage by its content rather than its position.
//! Text is normalized before hashing so that re-wrapping or punctuation
//! edits keep the same digest, while changes to the words themselves do not.
//!
//! Normalization: NFKC, lowercase the whole string, then drop punctuation,
//! symbols, separators and whitespace. Other code points (format characters
//! such as U+200B included) are kept.
//!
//! Hash: 64-bit FNV-1a over the UTF-8 bytes of the normalized text. The
//! arithmetic wraps modulo 2^64 so digests match across implementations.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::models::StorySegment;

/// FNV-1a 64-bit offset basis
pub const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Punctuation, symbols, separators and whitespace
static STRIPPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{P}\p{S}\p{Z}\s]+").expect("constant pattern compiles")
});

/// Normalize text for digesting
pub fn normalize(text: &str) -> String {
    // Whole-string lowercase so context rules like final sigma apply
    let lowered = text.nfkc().collect::<String>().to_lowercase();
    STRIPPED.replace_all(&lowered, "").into_owned()
}

/// Raw 64-bit FNV-1a over bytes
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Digest of a piece of text (normalized first)
pub fn digest64(text: &str) -> u64 {
    fnv1a64(normalize(text).as_bytes())
}

/// The text that identifies a segment
///
/// Speakers are part of a line's identity, so two characters saying the
/// same words produce different digests.
pub fn digest_text(segment: &StorySegment) -> String {
    match segment {
        StorySegment::Dialogue {
            character_name,
            text,
            ..
        } => format!("{} {}", character_name, text),
        StorySegment::System {
            speaker: Some(speaker),
            text,
        } => format!("{} {}", speaker, text),
        StorySegment::System { speaker: None, text }
        | StorySegment::Narration { text }
        | StorySegment::Subtitle { text, .. }
        | StorySegment::Sticker { text, .. } => text.clone(),
        StorySegment::Header { title } => title.clone(),
        StorySegment::Decision { options, .. } => options.join(" "),
    }
}

/// Digest of a segment
pub fn segment_digest(segment: &StorySegment) -> u64 {
    digest64(&digest_text(segment))
}

/// Human-readable text of a segment
pub fn display_text(segment: &StorySegment) -> String {
    match segment {
        StorySegment::Dialogue {
            character_name,
            text,
            ..
        } if !character_name.trim().is_empty() => format!("{}: {}", character_name, text),
        StorySegment::System {
            speaker: Some(speaker),
            text,
        } if !speaker.trim().is_empty() => format!("{}: {}", speaker, text),
        StorySegment::Dialogue { text, .. }
        | StorySegment::System { text, .. }
        | StorySegment::Narration { text }
        | StorySegment::Subtitle { text, .. }
        | StorySegment::Sticker { text, .. } => text.clone(),
        StorySegment::Header { title } => title.clone(),
        StorySegment::Decision { options, .. } => options.join(" / "),
    }
}

/// Short preview of a segment
///
/// First non-empty line of the display text with whitespace collapsed,
/// cut to `max_chars` characters. No ellipsis is added so the preview
/// stays a substring of the passage.
pub fn make_preview(segment: &StorySegment, max_chars: usize) -> String {
    let text = display_text(segment);
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    collapse_whitespace(line).chars().take(max_chars).collect()
}

/// Collapse runs of whitespace to single spaces and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Loose form used for preview matching: collapsed whitespace, lowercase
pub fn fold_for_match(text: &str) -> String {
    collapse_whitespace(text).to_lowercase()
}
