//! # Engine Primitives
//!
//! Hardcoded runtime constants for the Agora engine.
//!
//! These limits are compiled into the binary and are immutable at runtime.
//! Every list operation is bounded by them.

/// Magic bytes for the Agora snapshot format header.
///
/// - File Header = Magic Bytes ("AGRA") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"AGRA";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// PAGINATION
// =============================================================================

/// Page number used when the caller does not supply one. Pages are 1-indexed.
pub const DEFAULT_PAGE: u32 = 1;

/// Page size used when the caller does not supply one.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Largest page size a caller may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

// =============================================================================
// FOLLOW GRAPH
// =============================================================================

/// How many times a two-sided follow mutation is re-read and re-applied
/// after a revision conflict before `Conflict` is surfaced.
pub const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Default number of accounts returned by `suggest`.
pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;

// =============================================================================
// FEED & SEARCH HISTORY
// =============================================================================

/// Number of top search terms folded into the personalized feed query.
pub const FEED_TERM_COUNT: usize = 5;

/// Search records kept per user. Older, rarer searches are evicted first.
pub const MAX_SEARCH_HISTORY: usize = 50;

/// Longest query text accepted by the feed.
pub const MAX_QUERY_LENGTH: usize = 256;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Longest username accepted at registration.
pub const MAX_USERNAME_LENGTH: usize = 30;

/// Longest e-mail address accepted at registration.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Longest bio accepted.
pub const MAX_BIO_LENGTH: usize = 512;

/// Longest post title accepted.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Longest post body (description or content) accepted (64KB).
pub const MAX_BODY_LENGTH: usize = 65536;

/// Longest comment accepted.
pub const MAX_COMMENT_LENGTH: usize = 4096;

/// Maximum number of tags on a post.
pub const MAX_TAGS: usize = 16;

/// Longest single tag accepted.
pub const MAX_TAG_LENGTH: usize = 64;
