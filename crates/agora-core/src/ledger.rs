//! # Search-History Ledger
//!
//! Per-user query frequencies, the interest signal behind the personalized
//! feed.
//!
//! Records are unique on `(user, query, category)`; repeating a search
//! increments its frequency. Each user keeps at most `MAX_SEARCH_HISTORY`
//! records: after a record is written, the surplus is evicted lowest
//! frequency first, then least recently updated. The record just written is
//! never evicted.

use crate::primitives::{MAX_QUERY_LENGTH, MAX_SEARCH_HISTORY};
use crate::store::DocumentStore;
use crate::{AccountId, AgoraError, SearchCategory, SearchRecord};
use std::cmp::Reverse;
use std::collections::BTreeSet;
use tracing::debug;

/// The SearchLedger records and ranks a user's searches.
pub struct SearchLedger;

impl SearchLedger {
    /// Record one search by `user`.
    ///
    /// The query is trimmed; an empty or overlong query is `InvalidInput`.
    pub fn record<S: DocumentStore>(
        store: &mut S,
        user: AccountId,
        query: &str,
        category: SearchCategory,
    ) -> Result<SearchRecord, AgoraError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AgoraError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }
        if query.len() > MAX_QUERY_LENGTH {
            return Err(AgoraError::InvalidInput(format!(
                "Search query exceeds {} bytes",
                MAX_QUERY_LENGTH
            )));
        }

        let record = store.increment_search(user, query, category)?;
        Self::prune(store, user, &record)?;
        Ok(record)
    }

    /// Evict surplus records of `user`, sparing `keep`.
    fn prune<S: DocumentStore>(
        store: &mut S,
        user: AccountId,
        keep: &SearchRecord,
    ) -> Result<(), AgoraError> {
        let mut history = store.search_history(user)?;
        if history.len() <= MAX_SEARCH_HISTORY {
            return Ok(());
        }
        let surplus = history.len() - MAX_SEARCH_HISTORY;

        history.retain(|r| !(r.query == keep.query && r.category == keep.category));
        history.sort_by_key(|r| (r.frequency, r.updated));
        let evicted: Vec<(String, SearchCategory)> = history
            .into_iter()
            .take(surplus)
            .map(|r| (r.query, r.category))
            .collect();

        debug!(user = %user, evicted = evicted.len(), "Pruned search history");
        store.remove_searches(user, &evicted)
    }

    /// Up to `n` distinct query strings of `user`, most frequent first.
    ///
    /// Ties are broken by the most recent update. A query recorded under
    /// several categories is returned once, at its best rank.
    pub fn top_terms<S: DocumentStore>(
        store: &S,
        user: AccountId,
        n: usize,
    ) -> Result<Vec<String>, AgoraError> {
        let mut history = store.search_history(user)?;
        history.sort_by_key(|r| (Reverse(r.frequency), Reverse(r.updated)));

        let mut seen = BTreeSet::new();
        Ok(history
            .into_iter()
            .filter(|r| seen.insert(r.query.clone()))
            .map(|r| r.query)
            .take(n)
            .collect())
    }
}
