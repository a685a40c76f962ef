//! Binary clue payloads and share codes
//!
//! ## Byte layout (version 1)
//!
//! ```text
//! version        u8 (= 1)
//! story_count    varint
//! story_count x  varint byte length, UTF-8 story id
//! item_count     varint
//! item_count x   varint story_index, varint segment_index, u64 LE digest
//! ```
//!
//! Varints are unsigned LEB128 restricted to the u32 range. A zero digest
//! means "unknown".
//!
//! ## Share code
//!
//! `AKC1-` followed by the payload in base64url without padding. Decoding
//! also accepts a bare base64url body and tolerates padding.

use std::collections::HashMap;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde::Serialize;
use tracing::debug;

use crate::error::{FormatError, ShareCodeError};
use crate::models::ClueItem;

/// Current payload version
pub const PAYLOAD_VERSION: u8 = 1;

/// Tag in front of every share code
pub const SHARE_CODE_TAG: &str = "AKC1";

/// Separator between tag and body
pub const SHARE_CODE_SEPARATOR: char = '-';

/// base64url: no padding on encode, padding optional on decode
const SHARE_CODE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Varints never carry more than 35 bits
const MAX_VARINT_SHIFT: u32 = 35;

/// Reference to one clue inside a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClueRef {
    /// Index into the payload's story table
    pub story_index: u32,
    pub segment_index: u32,
    /// Zero when unknown
    pub digest64: u64,
}

/// Shareable projection of a clue set
///
/// Titles and timestamps are left out so identical content always produces
/// the same code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EncodedCluePayload {
    /// Deduplicated story ids, in the order items first reference them
    pub stories: Vec<String>,
    pub items: Vec<ClueRef>,
}

impl EncodedCluePayload {
    /// Build a payload from clues
    ///
    /// Clues are grouped by story in order of first appearance, and each
    /// group is sorted by segment index so the code follows reading order.
    pub fn from_items(items: &[ClueItem]) -> Self {
        let mut stories: Vec<String> = Vec::new();
        let mut groups: Vec<Vec<&ClueItem>> = Vec::new();
        let mut slots: HashMap<&str, usize> = HashMap::new();

        for item in items {
            let slot = *slots.entry(item.story_id.as_str()).or_insert_with(|| {
                stories.push(item.story_id.clone());
                groups.push(Vec::new());
                stories.len() - 1
            });
            groups[slot].push(item);
        }

        let mut refs = Vec::with_capacity(items.len());
        for (slot, group) in groups.iter_mut().enumerate() {
            group.sort_by_key(|item| item.segment_index);
            for item in group.iter() {
                refs.push(ClueRef {
                    story_index: slot as u32,
                    segment_index: item.segment_index,
                    digest64: item.known_digest().unwrap_or(0),
                });
            }
        }

        Self {
            stories,
            items: refs,
        }
    }

    /// Expand references back into clues
    ///
    /// Previews are left empty; they are filled in later from content.
    pub fn to_items(&self) -> Result<Vec<ClueItem>, FormatError> {
        self.items
            .iter()
            .map(|r| {
                let story_id = self.story(r.story_index)?;
                Ok(ClueItem::new(story_id, r.segment_index).with_digest(r.digest64))
            })
            .collect()
    }

    fn story(&self, index: u32) -> Result<&str, FormatError> {
        self.stories
            .get(index as usize)
            .map(String::as_str)
            .ok_or(FormatError::StoryIndexOutOfRange {
                index,
                stories: self.stories.len(),
            })
    }
}

/// Encode a payload to bytes
pub fn encode(payload: &EncodedCluePayload) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::with_capacity(2 + payload.stories.len() * 16 + payload.items.len() * 12);
    out.push(PAYLOAD_VERSION);

    write_varint(&mut out, to_u32(payload.stories.len(), "stories")?);
    for story in &payload.stories {
        write_varint(&mut out, to_u32(story.len(), "story id bytes")?);
        out.extend_from_slice(story.as_bytes());
    }

    write_varint(&mut out, to_u32(payload.items.len(), "items")?);
    for item in &payload.items {
        payload.story(item.story_index)?;
        write_varint(&mut out, item.story_index);
        write_varint(&mut out, item.segment_index);
        out.extend_from_slice(&item.digest64.to_le_bytes());
    }

    Ok(out)
}

/// Decode bytes into a payload
pub fn decode(bytes: &[u8]) -> Result<EncodedCluePayload, FormatError> {
    let mut reader = Reader::new(bytes);

    let version = reader.read_u8()?;
    if version != PAYLOAD_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }

    let story_count = reader.read_varint()? as usize;
    let mut stories = Vec::with_capacity(story_count.min(reader.remaining()));
    for _ in 0..story_count {
        let len = reader.read_varint()? as usize;
        let offset = reader.pos;
        let raw = reader.read_exact(len)?;
        let story = std::str::from_utf8(raw).map_err(|_| FormatError::InvalidUtf8 { offset })?;
        stories.push(story.to_string());
    }

    let item_count = reader.read_varint()? as usize;
    let mut items = Vec::with_capacity(item_count.min(reader.remaining() / 10));
    for _ in 0..item_count {
        let story_index = reader.read_varint()?;
        if story_index as usize >= stories.len() {
            return Err(FormatError::StoryIndexOutOfRange {
                index: story_index,
                stories: stories.len(),
            });
        }
        let segment_index = reader.read_varint()?;
        let digest_bytes: [u8; 8] = reader
            .read_exact(8)?
            .try_into()
            .map_err(|_| FormatError::Truncated {
                offset: reader.pos,
                needed: 8,
            })?;
        items.push(ClueRef {
            story_index,
            segment_index,
            digest64: u64::from_le_bytes(digest_bytes),
        });
    }

    if reader.remaining() > 0 {
        debug!("Ignoring {} trailing payload byte(s)", reader.remaining());
    }

    Ok(EncodedCluePayload { stories, items })
}

/// Encode a payload as a share code (`AKC1-...`)
pub fn to_share_code(payload: &EncodedCluePayload) -> Result<String, FormatError> {
    let bytes = encode(payload)?;
    Ok(format!(
        "{}{}{}",
        SHARE_CODE_TAG,
        SHARE_CODE_SEPARATOR,
        SHARE_CODE_ENGINE.encode(bytes)
    ))
}

/// Decode a share code, tagged or bare
pub fn decode_share_code(code: &str) -> Result<EncodedCluePayload, ShareCodeError> {
    let compact: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    let body = share_code_body(&compact).ok_or(ShareCodeError::Unrecognized)?;
    let bytes = SHARE_CODE_ENGINE.decode(body)?;
    Ok(decode(&bytes)?)
}

fn share_code_body(code: &str) -> Option<&str> {
    let tag = format!("{}{}", SHARE_CODE_TAG, SHARE_CODE_SEPARATOR);
    if let Some(body) = code.strip_prefix(tag.as_str()) {
        return is_base64url_body(body).then_some(body);
    }

    // A different AKC tag is a code from another format version
    if code.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("AKC")) {
        return None;
    }

    is_base64url_body(code).then_some(code)
}

/// base64url characters, optionally followed by `=` padding
fn is_base64url_body(body: &str) -> bool {
    let unpadded = body.trim_end_matches('=');
    !unpadded.is_empty() && unpadded.chars().all(is_base64url_char)
}

fn is_base64url_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn to_u32(value: usize, what: &'static str) -> Result<u32, FormatError> {
    u32::try_from(value).map_err(|_| FormatError::TooLarge(what))
}

fn write_varint(out: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Cursor over payload bytes
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn read_u8(&mut self) -> Result<u8, FormatError> {
        let byte = *self.bytes.get(self.pos).ok_or(FormatError::Truncated {
            offset: self.pos,
            needed: 1,
        })?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        if len > self.remaining() {
            return Err(FormatError::Truncated {
                offset: self.pos,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_varint(&mut self) -> Result<u32, FormatError> {
        let start = self.pos;
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift >= MAX_VARINT_SHIFT {
                return Err(FormatError::VarintOverflow { offset: start });
            }
        }
        u32::try_from(value).map_err(|_| FormatError::VarintOverflow { offset: start })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> EncodedCluePayload {
        EncodedCluePayload {
            stories: vec!["a1".to_string(), "b2".to_string()],
            items: vec![ClueRef {
                story_index: 1,
                segment_index: 42,
                digest64: 0x1122334455667788,
            }],
        }
    }

    fn looks_like_share_code(code: &str) -> bool {
        match code.strip_prefix("AKC1-") {
            Some(body) => !body.is_empty() && body.chars().all(is_base64url_char),
            None => false,
        }
    }

    #[test]
    fn test_encode_exact_layout() {
        let bytes = encode(&sample_payload()).unwrap();
        assert_eq!(
            bytes,
            vec![
                0x01, // version
                0x02, // story count
                0x02, b'a', b'1', //
                0x02, b'b', b'2', //
                0x01, // item count
                0x01, 0x2a, // story index, segment index
                0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11,
            ]
        );
    }

    #[test]
    fn test_example_share_code_roundtrip() {
        let payload = sample_payload();
        let code = to_share_code(&payload).unwrap();
        assert!(looks_like_share_code(&code), "bad code shape: {}", code);

        let decoded = decode_share_code(&code).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded.items[0].story_index, 1);
        assert_eq!(decoded.items[0].segment_index, 42);
        assert_eq!(decoded.items[0].digest64, 0x1122334455667788);
    }

    #[test]
    fn test_roundtrip_with_large_values_and_unicode() {
        let payload = EncodedCluePayload {
            stories: vec![
                "obt/main/level_main_08-01_beg".to_string(),
                "活动/故事".to_string(),
                String::new(),
            ],
            items: vec![
                ClueRef {
                    story_index: 0,
                    segment_index: u32::MAX,
                    digest64: u64::MAX,
                },
                ClueRef {
                    story_index: 2,
                    segment_index: 128,
                    digest64: 0,
                },
            ],
        };
        let decoded = decode(&encode(&payload).unwrap()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let payload = EncodedCluePayload::default();
        let bytes = encode(&payload).unwrap();
        assert_eq!(bytes, vec![1, 0, 0]);
        assert_eq!(decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_varint_boundaries() {
        let mut out = Vec::new();
        write_varint(&mut out, 127);
        assert_eq!(out, vec![0x7f]);

        out.clear();
        write_varint(&mut out, 128);
        assert_eq!(out, vec![0x80, 0x01]);

        out.clear();
        write_varint(&mut out, u32::MAX);
        assert_eq!(out, vec![0xff, 0xff, 0xff, 0xff, 0x0f]);
        assert_eq!(Reader::new(&out).read_varint().unwrap(), u32::MAX);
    }

    #[test]
    fn test_decode_rejects_long_varint() {
        let bytes = [0x01, 0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert_eq!(
            decode(&bytes),
            Err(FormatError::VarintOverflow { offset: 1 })
        );
    }

    #[test]
    fn test_decode_rejects_varint_beyond_u32() {
        let bytes = [0x01, 0xff, 0xff, 0xff, 0xff, 0x7f];
        assert!(matches!(
            decode(&bytes),
            Err(FormatError::VarintOverflow { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut bytes = encode(&sample_payload()).unwrap();
        bytes[0] = 2;
        assert_eq!(decode(&bytes), Err(FormatError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_decode_rejects_every_truncation() {
        let bytes = encode(&sample_payload()).unwrap();
        for len in 0..bytes.len() {
            assert!(
                matches!(decode(&bytes[..len]), Err(FormatError::Truncated { .. })),
                "prefix of length {} should be truncated",
                len
            );
        }
    }

    #[test]
    fn test_decode_rejects_oversized_length_prefix() {
        // Claims a 100-byte story id but only 2 bytes follow
        let bytes = [0x01, 0x01, 0x64, b'a', b'b'];
        assert!(matches!(
            decode(&bytes),
            Err(FormatError::Truncated { offset: 3, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let bytes = [0x01, 0x01, 0x02, 0xff, 0xfe, 0x00];
        assert_eq!(decode(&bytes), Err(FormatError::InvalidUtf8 { offset: 3 }));
    }

    #[test]
    fn test_decode_rejects_story_index_out_of_range() {
        let mut bytes = vec![0x01, 0x01, 0x01, b'a', 0x01, 0x05, 0x00];
        bytes.extend_from_slice(&[0; 8]);
        assert!(matches!(
            decode(&bytes),
            Err(FormatError::StoryIndexOutOfRange { index: 5, stories: 1 })
        ));
    }

    #[test]
    fn test_encode_rejects_dangling_story_index() {
        let payload = EncodedCluePayload {
            stories: vec!["a".to_string()],
            items: vec![ClueRef {
                story_index: 3,
                segment_index: 0,
                digest64: 0,
            }],
        };
        assert!(encode(&payload).is_err());
    }

    #[test]
    fn test_decode_share_code_accepts_bare_and_padded() {
        let payload = sample_payload();
        let code = to_share_code(&payload).unwrap();
        let body = code.strip_prefix("AKC1-").unwrap();

        assert_eq!(decode_share_code(body).unwrap(), payload);

        let mut padded = code.clone();
        while (padded.len() - 5) % 4 != 0 {
            padded.push('=');
        }
        assert_eq!(decode_share_code(&padded).unwrap(), payload);

        let wrapped = format!("  {}\n{}  ", &code[..10], &code[10..]);
        assert_eq!(decode_share_code(&wrapped).unwrap(), payload);
    }

    #[test]
    fn test_decode_bare_padded_body() {
        // version 1, stories ["ab", "c"], no items
        let decoded = decode_share_code("AQICYWIBYwA=").unwrap();
        assert_eq!(decoded.stories, vec!["ab".to_string(), "c".to_string()]);
        assert!(decoded.items.is_empty());
    }

    #[test]
    fn test_decode_share_code_rejects_garbage() {
        assert_eq!(decode_share_code(""), Err(ShareCodeError::Unrecognized));
        assert_eq!(
            decode_share_code("hello world!"),
            Err(ShareCodeError::Unrecognized)
        );
        assert_eq!(decode_share_code("AKC1-"), Err(ShareCodeError::Unrecognized));
        assert_eq!(
            decode_share_code("AKC2-AQA"),
            Err(ShareCodeError::Unrecognized)
        );
        assert!(matches!(
            decode_share_code("AKC1-AgA"),
            Err(ShareCodeError::Format(FormatError::UnsupportedVersion(2)))
        ));
        assert_eq!(decode_share_code("===="), Err(ShareCodeError::Unrecognized));
    }

    #[test]
    fn test_from_items_groups_and_sorts() {
        let items = vec![
            ClueItem::new("storyA", 5),
            ClueItem::new("storyB", 1),
            ClueItem::new("storyA", 2).with_digest(7),
        ];
        let payload = EncodedCluePayload::from_items(&items);

        assert_eq!(payload.stories, vec!["storyA", "storyB"]);
        let refs: Vec<_> = payload
            .items
            .iter()
            .map(|r| (r.story_index, r.segment_index, r.digest64))
            .collect();
        assert_eq!(refs, vec![(0, 2, 7), (0, 5, 0), (1, 1, 0)]);
    }

    #[test]
    fn test_to_items_copies_digest_and_leaves_preview_empty() {
        let items = sample_payload().to_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].story_id, "b2");
        assert_eq!(items[0].segment_index, 42);
        assert_eq!(items[0].digest, Some(0x1122334455667788));
        assert!(items[0].preview.is_none());
    }
}
