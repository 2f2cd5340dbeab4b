//! # Follow Graph Engine
//!
//! The follow / follow-request state machine.
//!
//! ## Invariants
//!
//! - An account never appears in its own followers, following or requests.
//! - `a ∈ b.followers` if and only if `b ∈ a.following`.
//! - At most one pending request per (requester, target) pair.
//!
//! Every transition that touches two accounts is committed through
//! [`DocumentStore::commit_accounts`], which writes both sides or neither.
//! A stale revision (someone else wrote one side first) is retried from a
//! fresh read up to `MAX_COMMIT_ATTEMPTS` times.
//!
//! ## Transitions
//!
//! ```text
//! target public:   not following --follow--> following --unfollow--> not following
//! target private:  following --unfollow--> not following
//!                  not following --request--> pending --cancel--> not following
//!                  pending --accept (owner)--> following
//!                  pending --reject (owner)--> not following
//! ```

use crate::accounts::{require_account, with_retry};
use crate::pagination::{Page, PageRequest};
use crate::store::DocumentStore;
use crate::{Account, AccountId, AgoraError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Result of `request_or_toggle_follow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowOutcome {
    Followed,
    Unfollowed,
    RequestSent,
    RequestCancelled,
}

impl FollowOutcome {
    /// Whether the actor follows the target after the transition.
    #[must_use]
    pub const fn is_following(self) -> bool {
        matches!(self, Self::Followed)
    }

    /// User-facing description of the transition.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Followed => "Followed successfully",
            Self::Unfollowed => "Unfollowed successfully",
            Self::RequestSent => "Follow request sent",
            Self::RequestCancelled => "Follow request cancelled",
        }
    }
}

/// The owner's answer to a pending follow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestDecision {
    Accepted,
    Rejected,
}

impl RequestDecision {
    #[must_use]
    pub const fn from_accept(accept: bool) -> Self {
        if accept { Self::Accepted } else { Self::Rejected }
    }
}

/// Which relation set to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Followers,
    Following,
}

impl RelationKind {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "followers" => Some(Self::Followers),
            "following" => Some(Self::Following),
            _ => None,
        }
    }
}

/// Public projection of an account, used by every listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: AccountId,
    pub username: String,
    pub bio: String,
    pub profile_pic: Option<String>,
    pub is_private: bool,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            bio: account.bio.clone(),
            profile_pic: account.profile_pic.clone(),
            is_private: account.is_private,
        }
    }
}

/// Summaries of the given ids, ordered by username then id. Dangling ids are skipped.
fn summaries<S: DocumentStore>(
    store: &S,
    ids: &BTreeSet<AccountId>,
    filter: Option<&str>,
) -> Result<Vec<AccountSummary>, AgoraError> {
    let needle = filter
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty());

    let mut found = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(account) = store.account(*id)? else {
            continue;
        };
        if needle
            .as_deref()
            .is_none_or(|n| account.username.contains(n))
        {
            found.push(AccountSummary::from(&account));
        }
    }
    found.sort_by(|a, b| a.username.cmp(&b.username).then(a.id.cmp(&b.id)));
    Ok(found)
}

fn single(mut written: Vec<Account>) -> Result<Account, AgoraError> {
    written
        .pop()
        .ok_or_else(|| AgoraError::IoError("Commit returned no account".to_string()))
}

// =============================================================================
// FOLLOW GRAPH
// =============================================================================

/// The FollowGraph applies follow transitions to a document store.
pub struct FollowGraph;

impl FollowGraph {
    /// Follow, unfollow, request or cancel a request, depending on state.
    ///
    /// - Following already: unfollow (both sides).
    /// - Public target: follow (both sides).
    /// - Private target with a pending request from `actor`: cancel it.
    /// - Private target otherwise: send a request.
    pub fn request_or_toggle_follow<S: DocumentStore>(
        store: &mut S,
        actor: AccountId,
        target: AccountId,
    ) -> Result<FollowOutcome, AgoraError> {
        if actor == target {
            return Err(AgoraError::InvalidOperation(
                "You cannot follow yourself".to_string(),
            ));
        }

        let outcome = with_retry(store, "request_or_toggle_follow", |store| {
            let mut target_account = require_account(store, target)?;
            let mut actor_account = require_account(store, actor)?;

            if target_account.is_followed_by(actor) {
                target_account.followers.remove(&actor);
                actor_account.following.remove(&target);
                store.commit_accounts(&[actor_account, target_account])?;
                Ok(FollowOutcome::Unfollowed)
            } else if !target_account.is_private {
                target_account.followers.insert(actor);
                // A request left over from when the target was private is moot now.
                target_account.follow_requests.remove(&actor);
                actor_account.following.insert(target);
                store.commit_accounts(&[actor_account, target_account])?;
                Ok(FollowOutcome::Followed)
            } else if target_account.has_request_from(actor) {
                target_account.follow_requests.remove(&actor);
                store.commit_accounts(&[target_account])?;
                Ok(FollowOutcome::RequestCancelled)
            } else {
                target_account.follow_requests.insert(actor);
                store.commit_accounts(&[target_account])?;
                Ok(FollowOutcome::RequestSent)
            }
        })?;

        debug!(actor = %actor, target = %target, ?outcome, "Follow transition");
        Ok(outcome)
    }

    /// Accept or reject a pending request from `requester` on `owner`.
    ///
    /// Only private accounts hold requests (`InvalidOperation` otherwise). A
    /// request that does not exist, or no longer exists, is `NotFound`.
    pub fn resolve_follow_request<S: DocumentStore>(
        store: &mut S,
        owner: AccountId,
        requester: AccountId,
        decision: RequestDecision,
    ) -> Result<(), AgoraError> {
        with_retry(store, "resolve_follow_request", |store| {
            let mut owner_account = require_account(store, owner)?;
            if !owner_account.is_private {
                return Err(AgoraError::InvalidOperation(
                    "Only private accounts receive follow requests".to_string(),
                ));
            }
            if !owner_account.follow_requests.remove(&requester) {
                return Err(AgoraError::NotFound(format!(
                    "No pending follow request from account {}",
                    requester
                )));
            }

            match decision {
                RequestDecision::Rejected => {
                    store.commit_accounts(&[owner_account])?;
                }
                RequestDecision::Accepted => {
                    let mut requester_account = require_account(store, requester)?;
                    owner_account.followers.insert(requester);
                    requester_account.following.insert(owner);
                    store.commit_accounts(&[owner_account, requester_account])?;
                }
            }
            Ok(())
        })?;

        debug!(owner = %owner, requester = %requester, ?decision, "Follow request resolved");
        Ok(())
    }

    /// Flip the privacy flag and return the new value.
    ///
    /// Existing followers stay; privacy only gates future follows.
    pub fn toggle_privacy<S: DocumentStore>(
        store: &mut S,
        owner: AccountId,
    ) -> Result<bool, AgoraError> {
        let account = with_retry(store, "toggle_privacy", |store| {
            let mut account = require_account(store, owner)?;
            account.is_private = !account.is_private;
            single(store.commit_accounts(&[account])?)
        })?;
        debug!(owner = %owner, is_private = account.is_private, "Privacy toggled");
        Ok(account.is_private)
    }

    /// Followers or following of `account`, ordered by username.
    ///
    /// `filter` is a case-insensitive username substring. Any caller may list
    /// any account's relations.
    pub fn list_relations<S: DocumentStore>(
        store: &S,
        account: AccountId,
        kind: RelationKind,
        filter: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<AccountSummary>, AgoraError> {
        let account = require_account(store, account)?;
        let ids = match kind {
            RelationKind::Followers => &account.followers,
            RelationKind::Following => &account.following,
        };
        Ok(Page::slice(summaries(store, ids, filter)?, page))
    }

    /// Pending inbound requests of `owner`, ordered by username.
    pub fn pending_requests<S: DocumentStore>(
        store: &S,
        owner: AccountId,
        page: PageRequest,
    ) -> Result<Page<AccountSummary>, AgoraError> {
        let account = require_account(store, owner)?;
        Ok(Page::slice(
            summaries(store, &account.follow_requests, None)?,
            page,
        ))
    }

    /// Up to `limit` public accounts `account` does not follow, in id order.
    pub fn suggest<S: DocumentStore>(
        store: &S,
        account: AccountId,
        limit: usize,
    ) -> Result<Vec<AccountSummary>, AgoraError> {
        let me = require_account(store, account)?;
        Ok(store
            .accounts()?
            .iter()
            .filter(|a| a.id != me.id && !a.is_private && !me.is_following(a.id))
            .take(limit)
            .map(AccountSummary::from)
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccountKey, MemoryStore};
    use crate::{
        AccountDraft, Comment, CommentDraft, CommentId, Post, PostDraft, PostId, SearchCategory,
        SearchRecord,
    };

    fn store_with(names: &[&str]) -> (MemoryStore, Vec<AccountId>) {
        let mut store = MemoryStore::new();
        let ids = names
            .iter()
            .map(|name| {
                store
                    .insert_account(AccountDraft {
                        username: name.to_string(),
                        email: format!("{}@example.com", name),
                        ..AccountDraft::default()
                    })
                    .expect("insert")
                    .id
            })
            .collect();
        (store, ids)
    }

    fn get(store: &MemoryStore, id: AccountId) -> Account {
        store.account(id).expect("get").expect("exists")
    }

    #[test]
    fn self_follow_is_invalid() {
        let (mut store, ids) = store_with(&["ada"]);
        let result = FollowGraph::request_or_toggle_follow(&mut store, ids[0], ids[0]);
        assert!(matches!(result, Err(AgoraError::InvalidOperation(_))));
    }

    #[test]
    fn unknown_target_or_actor_is_not_found() {
        let (mut store, ids) = store_with(&["ada"]);
        assert!(matches!(
            FollowGraph::request_or_toggle_follow(&mut store, ids[0], AccountId(99)),
            Err(AgoraError::NotFound(_))
        ));
        assert!(matches!(
            FollowGraph::request_or_toggle_follow(&mut store, AccountId(99), ids[0]),
            Err(AgoraError::NotFound(_))
        ));
    }

    #[test]
    fn public_follow_toggles_both_sides() {
        let (mut store, ids) = store_with(&["ada", "bob"]);
        let (ada, bob) = (ids[0], ids[1]);

        let outcome = FollowGraph::request_or_toggle_follow(&mut store, ada, bob).expect("follow");
        assert_eq!(outcome, FollowOutcome::Followed);
        assert!(outcome.is_following());
        assert!(get(&store, bob).is_followed_by(ada));
        assert!(get(&store, ada).is_following(bob));

        let outcome =
            FollowGraph::request_or_toggle_follow(&mut store, ada, bob).expect("unfollow");
        assert_eq!(outcome, FollowOutcome::Unfollowed);
        assert!(get(&store, bob).followers.is_empty());
        assert!(get(&store, ada).following.is_empty());
    }

    #[test]
    fn private_target_request_then_cancel() {
        let (mut store, ids) = store_with(&["ada", "bob"]);
        let (ada, bob) = (ids[0], ids[1]);
        FollowGraph::toggle_privacy(&mut store, bob).expect("private");

        let sent = FollowGraph::request_or_toggle_follow(&mut store, ada, bob).expect("request");
        assert_eq!(sent, FollowOutcome::RequestSent);
        assert_eq!(
            get(&store, bob).follow_requests,
            BTreeSet::from([ada])
        );

        let cancelled =
            FollowGraph::request_or_toggle_follow(&mut store, ada, bob).expect("cancel");
        assert_eq!(cancelled, FollowOutcome::RequestCancelled);
        assert!(get(&store, bob).follow_requests.is_empty());
        assert!(get(&store, bob).followers.is_empty());
    }

    #[test]
    fn accept_establishes_mutual_membership() {
        let (mut store, ids) = store_with(&["ada", "bob"]);
        let (ada, bob) = (ids[0], ids[1]);
        FollowGraph::toggle_privacy(&mut store, bob).expect("private");
        FollowGraph::request_or_toggle_follow(&mut store, ada, bob).expect("request");

        FollowGraph::resolve_follow_request(&mut store, bob, ada, RequestDecision::Accepted)
            .expect("accept");
        let bob_now = get(&store, bob);
        assert!(bob_now.is_followed_by(ada));
        assert!(bob_now.follow_requests.is_empty());
        assert!(get(&store, ada).is_following(bob));

        let again =
            FollowGraph::resolve_follow_request(&mut store, bob, ada, RequestDecision::Accepted);
        assert!(matches!(again, Err(AgoraError::NotFound(_))));
    }

    #[test]
    fn reject_leaves_no_trace() {
        let (mut store, ids) = store_with(&["ada", "bob"]);
        let (ada, bob) = (ids[0], ids[1]);
        FollowGraph::toggle_privacy(&mut store, bob).expect("private");
        FollowGraph::request_or_toggle_follow(&mut store, ada, bob).expect("request");

        FollowGraph::resolve_follow_request(&mut store, bob, ada, RequestDecision::Rejected)
            .expect("reject");
        assert!(get(&store, bob).follow_requests.is_empty());
        assert!(!get(&store, bob).is_followed_by(ada));
        assert!(!get(&store, ada).is_following(bob));
    }

    #[test]
    fn resolve_on_public_account_is_invalid() {
        let (mut store, ids) = store_with(&["ada", "bob"]);
        let result =
            FollowGraph::resolve_follow_request(&mut store, ids[1], ids[0], RequestDecision::Accepted);
        assert!(matches!(result, Err(AgoraError::InvalidOperation(_))));
    }

    #[test]
    fn private_follower_unfollows_directly() {
        let (mut store, ids) = store_with(&["ada", "bob"]);
        let (ada, bob) = (ids[0], ids[1]);
        FollowGraph::request_or_toggle_follow(&mut store, ada, bob).expect("follow");
        assert!(FollowGraph::toggle_privacy(&mut store, bob).expect("private"));

        // Going private kept the follower.
        assert!(get(&store, bob).is_followed_by(ada));

        let outcome =
            FollowGraph::request_or_toggle_follow(&mut store, ada, bob).expect("unfollow");
        assert_eq!(outcome, FollowOutcome::Unfollowed);
        assert!(!get(&store, ada).is_following(bob));
    }

    #[test]
    fn toggle_privacy_round_trip_keeps_followers() {
        let (mut store, ids) = store_with(&["ada", "bob"]);
        FollowGraph::request_or_toggle_follow(&mut store, ids[0], ids[1]).expect("follow");
        assert!(FollowGraph::toggle_privacy(&mut store, ids[1]).expect("toggle"));
        assert!(!FollowGraph::toggle_privacy(&mut store, ids[1]).expect("toggle"));
        assert!(get(&store, ids[1]).is_followed_by(ids[0]));
    }

    #[test]
    fn relations_sorted_filtered_and_paged() {
        let (mut store, ids) = store_with(&["zed", "amy", "max", "star"]);
        let star = ids[3];
        for follower in &ids[..3] {
            FollowGraph::request_or_toggle_follow(&mut store, *follower, star).expect("follow");
        }

        let page = FollowGraph::list_relations(
            &store,
            star,
            RelationKind::Followers,
            None,
            PageRequest::new(1, 2).expect("page"),
        )
        .expect("list");
        let names: Vec<_> = page.items.iter().map(|s| s.username.as_str()).collect();
        assert_eq!(names, vec!["amy", "max"]);
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);

        let filtered = FollowGraph::list_relations(
            &store,
            star,
            RelationKind::Followers,
            Some("A"),
            PageRequest::default(),
        )
        .expect("list");
        let names: Vec<_> = filtered.items.iter().map(|s| s.username.as_str()).collect();
        assert_eq!(names, vec!["amy", "max"]);

        let following = FollowGraph::list_relations(
            &store,
            ids[0],
            RelationKind::Following,
            None,
            PageRequest::default(),
        )
        .expect("list");
        assert_eq!(following.items.len(), 1);
        assert_eq!(following.items[0].id, star);
    }

    #[test]
    fn pending_requests_lists_requesters() {
        let (mut store, ids) = store_with(&["owner", "zoe", "abe"]);
        FollowGraph::toggle_privacy(&mut store, ids[0]).expect("private");
        FollowGraph::request_or_toggle_follow(&mut store, ids[1], ids[0]).expect("request");
        FollowGraph::request_or_toggle_follow(&mut store, ids[2], ids[0]).expect("request");

        let page = FollowGraph::pending_requests(&store, ids[0], PageRequest::default())
            .expect("requests");
        let names: Vec<_> = page.items.iter().map(|s| s.username.as_str()).collect();
        assert_eq!(names, vec!["abe", "zoe"]);
    }

    #[test]
    fn suggest_excludes_self_followed_and_private() {
        let (mut store, ids) = store_with(&["me", "followed", "hidden", "open1", "open2"]);
        FollowGraph::request_or_toggle_follow(&mut store, ids[0], ids[1]).expect("follow");
        FollowGraph::toggle_privacy(&mut store, ids[2]).expect("private");

        let suggested: Vec<_> = FollowGraph::suggest(&store, ids[0], 10)
            .expect("suggest")
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(suggested, vec![ids[3], ids[4]]);

        let limited = FollowGraph::suggest(&store, ids[0], 1).expect("suggest");
        assert_eq!(limited.len(), 1);
    }

    // =========================================================================
    // CONFLICT RETRY
    // =========================================================================

    /// A store whose first `failures` account commits report a stale revision.
    struct FlakyStore {
        inner: MemoryStore,
        failures: usize,
    }

    impl DocumentStore for FlakyStore {
        fn insert_account(&mut self, draft: AccountDraft) -> Result<Account, AgoraError> {
            self.inner.insert_account(draft)
        }
        fn account(&self, id: AccountId) -> Result<Option<Account>, AgoraError> {
            self.inner.account(id)
        }
        fn find_account(&self, key: AccountKey<'_>) -> Result<Option<Account>, AgoraError> {
            self.inner.find_account(key)
        }
        fn accounts(&self) -> Result<Vec<Account>, AgoraError> {
            self.inner.accounts()
        }
        fn commit_accounts(&mut self, accounts: &[Account]) -> Result<Vec<Account>, AgoraError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(AgoraError::StaleRevision("stale".to_string()));
            }
            self.inner.commit_accounts(accounts)
        }
        fn insert_post(&mut self, draft: PostDraft) -> Result<Post, AgoraError> {
            self.inner.insert_post(draft)
        }
        fn post(&self, id: PostId) -> Result<Option<Post>, AgoraError> {
            self.inner.post(id)
        }
        fn posts(&self) -> Result<Vec<Post>, AgoraError> {
            self.inner.posts()
        }
        fn commit_post(&mut self, post: &Post) -> Result<Post, AgoraError> {
            self.inner.commit_post(post)
        }
        fn remove_post(&mut self, id: PostId) -> Result<bool, AgoraError> {
            self.inner.remove_post(id)
        }
        fn insert_comment(&mut self, draft: CommentDraft) -> Result<Comment, AgoraError> {
            self.inner.insert_comment(draft)
        }
        fn comment(&self, id: CommentId) -> Result<Option<Comment>, AgoraError> {
            self.inner.comment(id)
        }
        fn comments_for(&self, post: PostId) -> Result<Vec<Comment>, AgoraError> {
            self.inner.comments_for(post)
        }
        fn comment_count(&self) -> Result<usize, AgoraError> {
            self.inner.comment_count()
        }
        fn commit_comment(&mut self, comment: &Comment) -> Result<Comment, AgoraError> {
            self.inner.commit_comment(comment)
        }
        fn remove_comment(&mut self, id: CommentId) -> Result<bool, AgoraError> {
            self.inner.remove_comment(id)
        }
        fn increment_search(
            &mut self,
            user: AccountId,
            query: &str,
            category: SearchCategory,
        ) -> Result<SearchRecord, AgoraError> {
            self.inner.increment_search(user, query, category)
        }
        fn search_history(&self, user: AccountId) -> Result<Vec<SearchRecord>, AgoraError> {
            self.inner.search_history(user)
        }
        fn remove_searches(
            &mut self,
            user: AccountId,
            keys: &[(String, SearchCategory)],
        ) -> Result<(), AgoraError> {
            self.inner.remove_searches(user, keys)
        }
        fn search_record_count(&self) -> Result<usize, AgoraError> {
            self.inner.search_record_count()
        }
    }

    #[test]
    fn transient_conflicts_are_retried() {
        let (inner, ids) = store_with(&["ada", "bob"]);
        let mut store = FlakyStore { inner, failures: 2 };

        let outcome =
            FollowGraph::request_or_toggle_follow(&mut store, ids[0], ids[1]).expect("follow");
        assert_eq!(outcome, FollowOutcome::Followed);
        assert!(get(&store.inner, ids[1]).is_followed_by(ids[0]));
    }

    #[test]
    fn persistent_conflict_surfaces_after_max_attempts() {
        let (inner, ids) = store_with(&["ada", "bob"]);
        let mut store = FlakyStore {
            inner,
            failures: crate::primitives::MAX_COMMIT_ATTEMPTS,
        };

        let result = FollowGraph::request_or_toggle_follow(&mut store, ids[0], ids[1]);
        assert!(matches!(result, Err(AgoraError::Conflict(_))));
        // Nothing was written: no torn follow.
        assert!(get(&store.inner, ids[0]).following.is_empty());
        assert!(get(&store.inner, ids[1]).followers.is_empty());
    }
}
