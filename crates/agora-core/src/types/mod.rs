//! # Core Type Definitions
//!
//! This module contains all core types for the Agora social graph engine:
//! - Identifiers (`AccountId`, `PostId`, `CommentId`) and the logical clock (`Stamp`)
//! - Documents (`Account`, `Post`, `Comment`, `SearchRecord`)
//! - Closed vocabularies (`Visibility`, `MediaType`, `SearchCategory`)
//! - Error types (`AgoraError`, `ErrorKind`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they are used as `BTreeMap`/`BTreeSet` keys
//! - Use saturating arithmetic for counters to prevent overflow

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque identifier of an account.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AccountId(pub u64);

/// Opaque identifier of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PostId(pub u64);

/// Opaque identifier of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommentId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical timestamp issued by the store on every write.
///
/// A larger stamp means a later write. Stamps stand in for wall-clock
/// `createdAt`/`updatedAt` so ordering stays deterministic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Stamp(pub u64);

impl Stamp {
    /// The stamp following this one (saturating).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Get the raw stamp value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

// =============================================================================
// ACCOUNT
// =============================================================================

/// An account with its follow relations and privacy flag.
///
/// The relation sets are only mutated through the follow engine, which keeps
/// `followers`/`following` of both sides mutually consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Unique, lowercase handle.
    pub username: String,
    /// Unique, lowercase e-mail address.
    pub email: String,
    pub bio: String,
    /// URL of the profile picture in the blob store, if any.
    pub profile_pic: Option<String>,
    pub is_private: bool,
    pub followers: BTreeSet<AccountId>,
    pub following: BTreeSet<AccountId>,
    /// Pending inbound follow requests.
    pub follow_requests: BTreeSet<AccountId>,
    /// Optimistic-concurrency revision, bumped by the store on every commit.
    pub revision: u64,
    pub created: Stamp,
    pub updated: Stamp,
}

impl Account {
    /// Whether `other` is in this account's followers.
    #[must_use]
    pub fn is_followed_by(&self, other: AccountId) -> bool {
        self.followers.contains(&other)
    }

    /// Whether this account follows `other`.
    #[must_use]
    pub fn is_following(&self, other: AccountId) -> bool {
        self.following.contains(&other)
    }

    /// Whether `other` has a pending follow request on this account.
    #[must_use]
    pub fn has_request_from(&self, other: AccountId) -> bool {
        self.follow_requests.contains(&other)
    }
}

/// Fields supplied when an account is created. The store assigns the rest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountDraft {
    pub username: String,
    pub email: String,
    pub bio: String,
    pub profile_pic: Option<String>,
}

// =============================================================================
// POST
// =============================================================================

/// Per-post access tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Followers,
}

impl Visibility {
    /// Parse the wire name of a visibility tier.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            "followers" => Some(Self::Followers),
            _ => None,
        }
    }
}

/// Kind of media attached to a post.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    #[default]
    None,
}

impl MediaType {
    /// Parse the wire name of a media type.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// A post. Comments are not embedded; they are queried by post id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub owner: AccountId,
    pub title: String,
    pub description: String,
    pub content: String,
    pub media_type: MediaType,
    pub media_url: Option<String>,
    pub likes: BTreeSet<AccountId>,
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub revision: u64,
    pub created: Stamp,
    pub updated: Stamp,
}

/// Fields supplied when a post is created.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostDraft {
    pub owner: AccountId,
    pub title: String,
    pub description: String,
    pub content: String,
    pub media_type: MediaType,
    pub media_url: Option<String>,
    pub tags: Vec<String>,
    pub visibility: Visibility,
}

// =============================================================================
// COMMENT
// =============================================================================

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub owner: AccountId,
    pub post: PostId,
    pub content: String,
    pub revision: u64,
    pub created: Stamp,
    pub updated: Stamp,
}

/// Fields supplied when a comment is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDraft {
    pub owner: AccountId,
    pub post: PostId,
    pub content: String,
}

// =============================================================================
// SEARCH HISTORY
// =============================================================================

/// What a recorded search was looking for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SearchCategory {
    #[default]
    Posts,
    Users,
    Tags,
}

impl SearchCategory {
    /// Wire name, also used as part of the storage key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Users => "users",
            Self::Tags => "tags",
        }
    }

    /// Parse the wire name of a category.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "posts" => Some(Self::Posts),
            "users" => Some(Self::Users),
            "tags" => Some(Self::Tags),
            _ => None,
        }
    }
}

/// Per-user query frequency. Unique on (user, query, category).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub user: AccountId,
    pub query: String,
    pub category: SearchCategory,
    pub frequency: u64,
    pub updated: Stamp,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Coarse classification of an [`AgoraError`], stable across messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidOperation,
    InvalidInput,
    Forbidden,
    Conflict,
    DependencyFailure,
}

/// Errors that can occur in the Agora engine.
///
/// - No silent failures
/// - Use `Result<T, AgoraError>` for fallible operations
/// - Every variant carries a message fit for the end user
#[derive(Debug, Error)]
pub enum AgoraError {
    /// A referenced account, post, comment or request does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The operation is not allowed in the current state (self-follow, ...).
    #[error("{0}")]
    InvalidOperation(String),

    /// The request itself is malformed.
    #[error("{0}")]
    InvalidInput(String),

    /// The viewer is not allowed to see or modify the target.
    #[error("{0}")]
    Forbidden(String),

    /// A uniqueness conflict, or a concurrent write that outlasted the retries.
    #[error("{0}")]
    Conflict(String),

    /// A write carried a revision older than the stored one. Transient.
    #[error("{0}")]
    StaleRevision(String),

    /// An external collaborator (blob store) failed.
    #[error("{0}")]
    DependencyFailure(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The document store failed.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl AgoraError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Conflict(_) | Self::StaleRevision(_) => ErrorKind::Conflict,
            Self::DependencyFailure(_) | Self::SerializationError(_) | Self::IoError(_) => {
                ErrorKind::DependencyFailure
            }
        }
    }

    /// HTTP-like severity of this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidOperation(_) | Self::InvalidInput(_) => 400,
            Self::Forbidden(_) => 403,
            Self::Conflict(_) | Self::StaleRevision(_) => 409,
            Self::DependencyFailure(_) => 502,
            Self::SerializationError(_) | Self::IoError(_) => 500,
        }
    }

    pub(crate) fn account_not_found(id: AccountId) -> Self {
        Self::NotFound(format!("Account {} not found", id))
    }

    pub(crate) fn post_not_found(id: PostId) -> Self {
        Self::NotFound(format!("Post {} not found", id))
    }

    pub(crate) fn comment_not_found(id: CommentId) -> Self {
        Self::NotFound(format!("Comment {} not found", id))
    }

    pub(crate) fn io(e: impl fmt::Display) -> Self {
        Self::IoError(e.to_string())
    }

    pub(crate) fn codec(e: impl fmt::Display) -> Self {
        Self::SerializationError(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================
