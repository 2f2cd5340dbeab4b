//! # agora-core
//!
//! The social-graph engine for Agora - THE LOGIC.
//!
//! This crate implements the access-control and feed-ranking core of the
//! Agora social backend: the follow / follow-request state machine, the
//! visibility policy consulted by every single-item read, the per-user search
//! ledger and the feed ranking built on it.
//!
//! ## Architecture
//!
//! - `types`, `primitives`: data model, errors, hardcoded limits
//! - `store`, `storage`: the `DocumentStore` trait, `MemoryStore`, `RedbStore`
//! - `formats`: snapshot format for the `file` backend
//! - `accounts`, `follow`, `visibility`, `ledger`, `feed`, `posts`: the engine
//! - `media`: the blob store contract
//! - `session`: backend dispatch plus one method per engine operation
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network dependencies (pure Rust)
//! - Every operation is request-scoped and receives the acting account explicitly
//! - Multi-account writes are atomic; stale revisions surface as `Conflict`
//! - Integer arithmetic only; the clock is logical, not wall time

// =============================================================================
// MODULES
// =============================================================================

pub mod accounts;
pub mod feed;
pub mod follow;
pub mod formats;
pub mod ledger;
pub mod media;
pub mod metrics;
pub mod pagination;
pub mod posts;
pub mod primitives;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;
pub mod visibility;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Account, AccountDraft, AccountId, AgoraError, Comment, CommentDraft, CommentId, ErrorKind,
    MediaType, Post, PostDraft, PostId, SearchCategory, SearchRecord, Stamp, Visibility,
};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use storage::RedbStore;
pub use store::{AccountKey, DocumentStore, MemoryStore, SerializableStore};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use accounts::{AccountPatch, AccountRegistry};
pub use feed::{FeedRanker, PublicPostQuery, Sort, SortKey, SortOrder, TagFilter, TextQuery};
pub use follow::{AccountSummary, FollowGraph, FollowOutcome, RelationKind, RequestDecision};
pub use ledger::SearchLedger;
pub use media::{
    BlobStore, DirectoryBlobStore, DisabledBlobStore, MediaKind, StoredMedia, UploadRoot,
};
pub use metrics::StoreMetrics;
pub use pagination::{Page, PageRequest};
pub use posts::{NewPost, PostPatch, PostService};
pub use session::{Session, StorageBackend};
pub use visibility::{can_view, ensure_visible};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, store_from_bytes, store_to_bytes};
