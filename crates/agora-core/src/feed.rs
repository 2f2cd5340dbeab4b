//! # Feed Ranking Engine
//!
//! Paginated listings of public posts, optionally filtered by text, tags and
//! media type, and the personalized feed built from a user's search history.
//!
//! ## Query Model
//!
//! A query is a validated [`PublicPostQuery`]: each filter is either absent or
//! fully parsed. Visibility `public` is always implied. Text matching is
//! term based: the text is split into lowercase alphanumeric terms and a post
//! matches if any of them occurs among the terms of its title, description or
//! tags.
//!
//! ## Ordering
//!
//! Results are ordered by the requested [`Sort`]; ties always fall back to
//! post id, descending, so a page boundary never shuffles between requests.

use crate::accounts::require_account;
use crate::ledger::SearchLedger;
use crate::pagination::{Page, PageRequest};
use crate::primitives::{FEED_TERM_COUNT, MAX_QUERY_LENGTH, MAX_TAG_LENGTH, MAX_TAGS};
use crate::store::DocumentStore;
use crate::{AccountId, AgoraError, MediaType, Post, SearchCategory, Visibility};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::debug;

// =============================================================================
// QUERY MODEL
// =============================================================================

/// Lowercase alphanumeric terms of a text.
#[must_use]
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// A parsed full-text filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
    text: String,
    terms: BTreeSet<String>,
}

impl TextQuery {
    /// Parse query text. `Ok(None)` when the text has no searchable terms.
    pub fn parse(text: &str) -> Result<Option<Self>, AgoraError> {
        let text = text.trim();
        if text.len() > MAX_QUERY_LENGTH {
            return Err(AgoraError::InvalidInput(format!(
                "Search query exceeds {} bytes",
                MAX_QUERY_LENGTH
            )));
        }
        let terms = tokenize(text);
        if terms.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self {
            text: text.to_string(),
            terms,
        }))
    }

    /// Join already recorded queries into one query. Not length checked:
    /// each part passed the limit when it was recorded.
    fn joined(parts: &[String]) -> Option<Self> {
        let text = parts.join(" ");
        let terms = tokenize(&text);
        if terms.is_empty() {
            None
        } else {
            Some(Self { text, terms })
        }
    }

    /// The trimmed text as the user typed it. This is what gets recorded.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn terms(&self) -> &BTreeSet<String> {
        &self.terms
    }

    /// Number of distinct query terms found in the post.
    #[must_use]
    pub fn relevance(&self, post: &Post) -> usize {
        let mut haystack = tokenize(&post.title);
        haystack.extend(tokenize(&post.description));
        for tag in &post.tags {
            haystack.extend(tokenize(tag));
        }
        self.terms.intersection(&haystack).count()
    }

    #[must_use]
    pub fn matches(&self, post: &Post) -> bool {
        self.relevance(post) > 0
    }
}

/// Any-of tag filter. Tags compare exactly, after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    tags: BTreeSet<String>,
}

impl TagFilter {
    /// Build a filter. `Ok(None)` when no non-empty tag is given.
    pub fn new<I, T>(tags: I) -> Result<Option<Self>, AgoraError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let tags: BTreeSet<String> = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tags.len() > MAX_TAGS || tags.iter().any(|t| t.len() > MAX_TAG_LENGTH) {
            return Err(AgoraError::InvalidInput(format!(
                "At most {} tags of up to {} bytes may be filtered on",
                MAX_TAGS, MAX_TAG_LENGTH
            )));
        }
        if tags.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self { tags }))
    }

    #[must_use]
    pub fn matches(&self, post: &Post) -> bool {
        post.tags.iter().any(|tag| self.tags.contains(tag))
    }
}

/// The validated filter set of a public listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicPostQuery {
    pub text: Option<TextQuery>,
    pub tags: Option<TagFilter>,
    pub media_type: Option<MediaType>,
}

impl PublicPostQuery {
    fn matches(&self, post: &Post) -> bool {
        post.visibility == Visibility::Public
            && self.text.as_ref().is_none_or(|q| q.matches(post))
            && self.tags.as_ref().is_none_or(|t| t.matches(post))
            && self.media_type.is_none_or(|m| post.media_type == m)
    }
}

// =============================================================================
// SORTING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Created,
    Updated,
    Likes,
    Title,
    /// Number of distinct query terms matched.
    Relevance,
}

impl SortKey {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" | "createdat" => Some(Self::Created),
            "updated" | "updatedat" => Some(Self::Updated),
            "likes" => Some(Self::Likes),
            "title" => Some(Self::Title),
            "relevance" => Some(Self::Relevance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "1" => Some(Self::Asc),
            "desc" | "-1" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Sort key and direction. Defaults to newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sort {
    pub key: SortKey,
    pub order: SortOrder,
}

impl Sort {
    #[must_use]
    pub const fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    fn compare(&self, a: &Post, b: &Post, text: Option<&TextQuery>) -> Ordering {
        let primary = match self.key {
            SortKey::Created => a.created.cmp(&b.created),
            SortKey::Updated => a.updated.cmp(&b.updated),
            SortKey::Likes => a.likes.len().cmp(&b.likes.len()),
            SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortKey::Relevance => {
                let score = |p: &Post| text.map_or(0, |q| q.relevance(p));
                score(a).cmp(&score(b))
            }
        };
        let primary = match self.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| b.id.cmp(&a.id))
    }
}

// =============================================================================
// FEED RANKER
// =============================================================================

/// The FeedRanker lists public content.
pub struct FeedRanker;

impl FeedRanker {
    /// List public posts matching `query`.
    ///
    /// When `viewer` is authenticated and a text filter is present, the text
    /// is recorded in the viewer's search history after the query has run.
    /// An unknown viewer is `NotFound`.
    pub fn list_public<S: DocumentStore>(
        store: &mut S,
        viewer: Option<AccountId>,
        query: &PublicPostQuery,
        sort: Sort,
        page: PageRequest,
    ) -> Result<Page<Post>, AgoraError> {
        if let Some(user) = viewer {
            require_account(&*store, user)?;
        }
        let result = Self::execute(store, query, sort, page)?;
        if let (Some(user), Some(text)) = (viewer, &query.text) {
            SearchLedger::record(store, user, text.text(), SearchCategory::Posts)?;
        }
        Ok(result)
    }

    /// Newest-first public posts ranked by the user's top search terms.
    ///
    /// Without search history this is the unfiltered public listing. Nothing
    /// is recorded.
    pub fn personalized<S: DocumentStore>(
        store: &S,
        user: AccountId,
        page: PageRequest,
    ) -> Result<Page<Post>, AgoraError> {
        require_account(store, user)?;
        let terms = SearchLedger::top_terms(store, user, FEED_TERM_COUNT)?;
        let text = TextQuery::joined(&terms);
        debug!(user = %user, terms = terms.len(), "Building personalized feed");

        let query = PublicPostQuery {
            text,
            ..PublicPostQuery::default()
        };
        Self::execute(store, &query, Sort::default(), page)
    }

    /// Filter, order and paginate without side effects.
    fn execute<S: DocumentStore>(
        store: &S,
        query: &PublicPostQuery,
        sort: Sort,
        page: PageRequest,
    ) -> Result<Page<Post>, AgoraError> {
        let mut posts: Vec<Post> = store
            .posts()?
            .into_iter()
            .filter(|post| query.matches(post))
            .collect();
        posts.sort_by(|a, b| sort.compare(a, b, query.text.as_ref()));
        Ok(Page::slice(posts, page))
    }
}

// =============================================================================
// TESTS
// =============================================================================
