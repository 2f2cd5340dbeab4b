//! # Store Metrics
//!
//! Counts reported by `status`. Computed by a full scan; intended for
//! operators, not hot paths.

use crate::store::DocumentStore;
use crate::{AgoraError, Visibility};
use serde::{Deserialize, Serialize};

/// Aggregate counts over a document store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetrics {
    pub accounts: usize,
    pub private_accounts: usize,
    pub posts: usize,
    pub public_posts: usize,
    pub comments: usize,
    /// Number of (follower, followee) pairs.
    pub follow_edges: usize,
    pub pending_requests: usize,
    pub search_records: usize,
}

impl StoreMetrics {
    /// Create metrics with all zeros.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compute metrics from a store.
    pub fn collect<S: DocumentStore>(store: &S) -> Result<Self, AgoraError> {
        let accounts = store.accounts()?;
        let posts = store.posts()?;
        Ok(Self {
            accounts: accounts.len(),
            private_accounts: accounts.iter().filter(|a| a.is_private).count(),
            posts: posts.len(),
            public_posts: posts
                .iter()
                .filter(|p| p.visibility == Visibility::Public)
                .count(),
            comments: store.comment_count()?,
            follow_edges: accounts.iter().map(|a| a.following.len()).sum(),
            pending_requests: accounts.iter().map(|a| a.follow_requests.len()).sum(),
            search_records: store.search_record_count()?,
        })
    }
}
