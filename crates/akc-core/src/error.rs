//! Error types for clue sets and share codes
//!
//! Three layers:
//! - `FormatError`: the binary payload itself is malformed
//! - `ShareCodeError`: the text wrapper around a payload is unusable
//! - `ClueError`: a store operation could not be carried out

use thiserror::Error;

/// Errors raised while decoding (or encoding) a binary clue payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Input ended before a complete field could be read
    #[error("Payload truncated at byte {offset}: needed {needed} more byte(s)")]
    Truncated { offset: usize, needed: usize },

    /// Leading version byte is not one we understand
    #[error("Unsupported payload version {0}")]
    UnsupportedVersion(u8),

    /// Varint ran past 35 bits or does not fit in a u32
    #[error("Malformed varint at byte {offset}")]
    VarintOverflow { offset: usize },

    /// A story id is not valid UTF-8
    #[error("Story id at byte {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    /// An item references a story slot that does not exist
    #[error("Story index {index} out of range ({stories} stories in table)")]
    StoryIndexOutOfRange { index: u32, stories: usize },

    /// A count or length cannot be represented as a u32 varint
    #[error("Too many {0} to encode")]
    TooLarge(&'static str),
}

/// Errors raised while unwrapping a textual share code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShareCodeError {
    /// Neither the tagged form nor a bare base64url string
    #[error("Not a recognized share code")]
    Unrecognized,

    /// The base64url body could not be decoded
    #[error("Share code is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decoded payload is malformed
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Errors raised by clue store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClueError {
    #[error("Invalid share code: {0}")]
    InvalidCode(#[from] ShareCodeError),

    #[error("Clue set not found: {0}")]
    NotFound(String),

    #[error("Item position {index} out of range (set has {len} item(s))")]
    IndexOutOfRange { index: usize, len: usize },

    /// `set_items` may only reorder, never add or drop entries
    #[error("Replacement list does not contain the same clues as the set")]
    MembershipChanged,

    #[error("No target clue set given and creating one was not allowed")]
    NoTarget,
}

impl From<FormatError> for ClueError {
    fn from(err: FormatError) -> Self {
        ClueError::InvalidCode(ShareCodeError::Format(err))
    }
}

/// Result type for clue store operations
pub type ClueResult<T> = Result<T, ClueError>;
