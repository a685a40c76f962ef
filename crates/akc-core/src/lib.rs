//! AKC Core Library
//!
//! Clue bookmarks for the story reader: named sets of references to story
//! passages, portable share codes, and resolution of those references
//! against story content that may have shifted since they were made.
//!
//! # Architecture
//!
//! - **Digest**: normalized FNV-1a fingerprints of segment text
//! - **Codec**: compact binary payload wrapped as an `AKC1-` share code
//! - **Store**: in-memory clue sets, snapshotted to a key-value backend
//! - **Resolver**: direct, neighborhood and preview lookup of passages
//!
//! # Quick Start
//!
//! ```text
//! let mut store = ClueStore::open(&config)?;
//!
//! let id = store.create_set(Some("Chapter 8"));
//! store.add_item(&id, ClueItem::from_segment(story_id, 12, &segment, 80))?;
//!
//! let code = store.export_share_code(&id)?;
//! ```
//!
//! # Modules
//!
//! - `store`: clue set management (main entry point)
//! - `models`: clue and story content structures
//! - `digest`: text normalization and segment fingerprints
//! - `codec`: binary payload and share code format
//! - `resolver`: locating bookmarked passages
//! - `provider`: story content sources
//! - `storage`: key-value persistence
//! - `config`: application configuration

pub mod codec;
pub mod config;
pub mod digest;
pub mod error;
pub mod models;
pub mod provider;
pub mod resolver;
pub mod storage;
pub mod store;

pub use codec::{decode_share_code, to_share_code, ClueRef, EncodedCluePayload};
pub use config::Config;
pub use error::{ClueError, ClueResult, FormatError, ShareCodeError};
pub use models::{ClueItem, ClueSet, StoryMeta, StorySegment};
pub use provider::{DirStoryProvider, Highlight, MemoryStoryProvider, StoryProvider};
pub use resolver::{ClueResolution, Resolution, ResolveMethod};
pub use storage::{FileKvStore, KeyValueStore, MemoryKvStore, StorageError};
pub use store::{
    AddOutcome, ClueStore, HighlightImportOutcome, ImportOptions, ImportOutcome, ItemDetails,
};
