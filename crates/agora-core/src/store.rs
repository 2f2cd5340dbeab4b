//! # Document Store
//!
//! The persistence contract for Agora CORE and its in-memory implementation.
//!
//! This module implements the `DocumentStore` trait.
//! All data structures use `BTreeMap` for deterministic ordering.
//!
//! ## Write Model
//!
//! Documents carry a `revision`. A commit succeeds only if the revision of
//! every document in it still equals the stored one; the store then bumps the
//! revision and stamps the write. Multi-document commits are all-or-nothing.

use crate::{
    Account, AccountDraft, AccountId, AgoraError, Comment, CommentDraft, CommentId, Post,
    PostDraft, PostId, SearchCategory, SearchRecord, Stamp,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

// =============================================================================
// DOCUMENTSTORE TRAIT
// =============================================================================

/// Unique lookup keys for `find_account`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKey<'a> {
    Username(&'a str),
    Email(&'a str),
}

/// The DocumentStore trait defines the storage operations the engine needs.
///
/// All fallible operations return `Result<T, AgoraError>` to support both
/// in-memory and persistent storage backends uniformly.
pub trait DocumentStore {
    /// Create an account. Fails with `Conflict` if the username or e-mail is taken.
    fn insert_account(&mut self, draft: AccountDraft) -> Result<Account, AgoraError>;

    /// Lookup an account by id.
    fn account(&self, id: AccountId) -> Result<Option<Account>, AgoraError>;

    /// Lookup an account by a unique key.
    fn find_account(&self, key: AccountKey<'_>) -> Result<Option<Account>, AgoraError>;

    /// All accounts in store-native (id) order.
    fn accounts(&self) -> Result<Vec<Account>, AgoraError>;

    /// Write all given accounts as one unit.
    ///
    /// Either every account is written or none is. Fails with `StaleRevision` if
    /// any revision is stale and with `Conflict` if a username/e-mail change
    /// collides.
    fn commit_accounts(&mut self, accounts: &[Account]) -> Result<Vec<Account>, AgoraError>;

    /// Create a post.
    fn insert_post(&mut self, draft: PostDraft) -> Result<Post, AgoraError>;

    /// Lookup a post by id.
    fn post(&self, id: PostId) -> Result<Option<Post>, AgoraError>;

    /// All posts in id order.
    fn posts(&self) -> Result<Vec<Post>, AgoraError>;

    /// Write a post, checking its revision.
    fn commit_post(&mut self, post: &Post) -> Result<Post, AgoraError>;

    /// Remove a post together with its comments. Returns whether it existed.
    fn remove_post(&mut self, id: PostId) -> Result<bool, AgoraError>;

    /// Create a comment.
    fn insert_comment(&mut self, draft: CommentDraft) -> Result<Comment, AgoraError>;

    /// Lookup a comment by id.
    fn comment(&self, id: CommentId) -> Result<Option<Comment>, AgoraError>;

    /// Comments on a post, oldest first.
    fn comments_for(&self, post: PostId) -> Result<Vec<Comment>, AgoraError>;

    /// Total number of comments.
    fn comment_count(&self) -> Result<usize, AgoraError>;

    /// Write a comment, checking its revision.
    fn commit_comment(&mut self, comment: &Comment) -> Result<Comment, AgoraError>;

    /// Remove a comment. Returns whether it existed.
    fn remove_comment(&mut self, id: CommentId) -> Result<bool, AgoraError>;

    /// Atomically upsert the `(user, query, category)` record, incrementing its
    /// frequency by 1 or creating it with frequency 1.
    fn increment_search(
        &mut self,
        user: AccountId,
        query: &str,
        category: SearchCategory,
    ) -> Result<SearchRecord, AgoraError>;

    /// All search records of a user.
    fn search_history(&self, user: AccountId) -> Result<Vec<SearchRecord>, AgoraError>;

    /// Remove the given `(query, category)` records of a user.
    fn remove_searches(
        &mut self,
        user: AccountId,
        keys: &[(String, SearchCategory)],
    ) -> Result<(), AgoraError>;

    /// Total number of search records.
    fn search_record_count(&self) -> Result<usize, AgoraError>;
}

// =============================================================================
// SHARED WRITE CHECKS
// =============================================================================

/// Reject a write whose revision no longer matches the stored document.
pub(crate) fn check_revision(
    kind: &str,
    id: impl Display,
    stored: u64,
    given: u64,
) -> Result<(), AgoraError> {
    if stored != given {
        return Err(AgoraError::StaleRevision(format!(
            "{} {} was modified concurrently (revision {} is stale, stored {})",
            kind, id, given, stored
        )));
    }
    Ok(())
}

/// Reject accounts that relate to themselves.
pub(crate) fn check_account_invariants(account: &Account) -> Result<(), AgoraError> {
    let id = account.id;
    if account.followers.contains(&id)
        || account.following.contains(&id)
        || account.follow_requests.contains(&id)
    {
        return Err(AgoraError::InvalidOperation(format!(
            "Account {} cannot relate to itself",
            id
        )));
    }
    Ok(())
}

/// Reject a batch that names the same account twice.
pub(crate) fn check_distinct(accounts: &[Account]) -> Result<(), AgoraError> {
    let mut seen = BTreeSet::new();
    for account in accounts {
        if !seen.insert(account.id) {
            return Err(AgoraError::InvalidOperation(format!(
                "Account {} appears twice in one commit",
                account.id
            )));
        }
    }
    Ok(())
}

// =============================================================================
// MEMORY STORE IMPLEMENTATION
// =============================================================================

/// The in-memory document store.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    accounts: BTreeMap<AccountId, Account>,
    /// Unique index: username -> AccountId
    usernames: BTreeMap<String, AccountId>,
    /// Unique index: email -> AccountId
    emails: BTreeMap<String, AccountId>,
    posts: BTreeMap<PostId, Post>,
    comments: BTreeMap<CommentId, Comment>,
    searches: BTreeMap<(AccountId, String, SearchCategory), SearchRecord>,
    next_account_id: u64,
    next_post_id: u64,
    next_comment_id: u64,
    clock: Stamp,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of the logical clock.
    #[must_use]
    pub fn clock(&self) -> Stamp {
        self.clock
    }

    fn tick(&mut self) -> Stamp {
        self.clock = self.clock.next();
        self.clock
    }

    fn check_unique(
        &self,
        username: &str,
        email: &str,
        owner: Option<AccountId>,
    ) -> Result<(), AgoraError> {
        if self
            .usernames
            .get(username)
            .is_some_and(|existing| Some(*existing) != owner)
        {
            return Err(AgoraError::Conflict(format!(
                "Username '{}' is already taken",
                username
            )));
        }
        if self
            .emails
            .get(email)
            .is_some_and(|existing| Some(*existing) != owner)
        {
            return Err(AgoraError::Conflict(format!(
                "E-mail '{}' is already registered",
                email
            )));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn insert_account(&mut self, draft: AccountDraft) -> Result<Account, AgoraError> {
        self.check_unique(&draft.username, &draft.email, None)?;

        let id = AccountId(self.next_account_id);
        self.next_account_id = self.next_account_id.saturating_add(1);
        let now = self.tick();

        let account = Account {
            id,
            username: draft.username,
            email: draft.email,
            bio: draft.bio,
            profile_pic: draft.profile_pic,
            is_private: false,
            followers: BTreeSet::new(),
            following: BTreeSet::new(),
            follow_requests: BTreeSet::new(),
            revision: 1,
            created: now,
            updated: now,
        };
        self.usernames.insert(account.username.clone(), id);
        self.emails.insert(account.email.clone(), id);
        self.accounts.insert(id, account.clone());
        Ok(account)
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, AgoraError> {
        Ok(self.accounts.get(&id).cloned())
    }

    fn find_account(&self, key: AccountKey<'_>) -> Result<Option<Account>, AgoraError> {
        let id = match key {
            AccountKey::Username(name) => self.usernames.get(name),
            AccountKey::Email(email) => self.emails.get(email),
        };
        Ok(id.and_then(|id| self.accounts.get(id)).cloned())
    }

    fn accounts(&self) -> Result<Vec<Account>, AgoraError> {
        Ok(self.accounts.values().cloned().collect())
    }

    fn commit_accounts(&mut self, accounts: &[Account]) -> Result<Vec<Account>, AgoraError> {
        check_distinct(accounts)?;

        // Validate the whole batch before touching any document.
        for account in accounts {
            check_account_invariants(account)?;
            let stored = self
                .accounts
                .get(&account.id)
                .ok_or_else(|| AgoraError::account_not_found(account.id))?;
            check_revision("Account", account.id, stored.revision, account.revision)?;
            self.check_unique(&account.username, &account.email, Some(account.id))?;
        }

        let now = self.tick();
        let mut written = Vec::with_capacity(accounts.len());
        for account in accounts {
            let mut next = account.clone();
            next.revision = account.revision.saturating_add(1);
            next.updated = now;

            if let Some(previous) = self.accounts.get(&account.id) {
                if previous.username != next.username {
                    self.usernames.remove(&previous.username);
                }
                if previous.email != next.email {
                    self.emails.remove(&previous.email);
                }
            }
            self.usernames.insert(next.username.clone(), next.id);
            self.emails.insert(next.email.clone(), next.id);
            self.accounts.insert(next.id, next.clone());
            written.push(next);
        }
        Ok(written)
    }

    fn insert_post(&mut self, draft: PostDraft) -> Result<Post, AgoraError> {
        let id = PostId(self.next_post_id);
        self.next_post_id = self.next_post_id.saturating_add(1);
        let now = self.tick();

        let post = Post {
            id,
            owner: draft.owner,
            title: draft.title,
            description: draft.description,
            content: draft.content,
            media_type: draft.media_type,
            media_url: draft.media_url,
            likes: BTreeSet::new(),
            tags: draft.tags,
            visibility: draft.visibility,
            revision: 1,
            created: now,
            updated: now,
        };
        self.posts.insert(id, post.clone());
        Ok(post)
    }

    fn post(&self, id: PostId) -> Result<Option<Post>, AgoraError> {
        Ok(self.posts.get(&id).cloned())
    }

    fn posts(&self) -> Result<Vec<Post>, AgoraError> {
        Ok(self.posts.values().cloned().collect())
    }

    fn commit_post(&mut self, post: &Post) -> Result<Post, AgoraError> {
        let stored = self
            .posts
            .get(&post.id)
            .ok_or_else(|| AgoraError::post_not_found(post.id))?;
        check_revision("Post", post.id, stored.revision, post.revision)?;

        let now = self.tick();
        let mut next = post.clone();
        next.revision = post.revision.saturating_add(1);
        next.updated = now;
        self.posts.insert(next.id, next.clone());
        Ok(next)
    }

    fn remove_post(&mut self, id: PostId) -> Result<bool, AgoraError> {
        if self.posts.remove(&id).is_none() {
            return Ok(false);
        }
        self.comments.retain(|_, comment| comment.post != id);
        self.tick();
        Ok(true)
    }

    fn insert_comment(&mut self, draft: CommentDraft) -> Result<Comment, AgoraError> {
        if !self.posts.contains_key(&draft.post) {
            return Err(AgoraError::post_not_found(draft.post));
        }
        let id = CommentId(self.next_comment_id);
        self.next_comment_id = self.next_comment_id.saturating_add(1);
        let now = self.tick();

        let comment = Comment {
            id,
            owner: draft.owner,
            post: draft.post,
            content: draft.content,
            revision: 1,
            created: now,
            updated: now,
        };
        self.comments.insert(id, comment.clone());
        Ok(comment)
    }

    fn comment(&self, id: CommentId) -> Result<Option<Comment>, AgoraError> {
        Ok(self.comments.get(&id).cloned())
    }

    fn comments_for(&self, post: PostId) -> Result<Vec<Comment>, AgoraError> {
        Ok(self
            .comments
            .values()
            .filter(|comment| comment.post == post)
            .cloned()
            .collect())
    }

    fn comment_count(&self) -> Result<usize, AgoraError> {
        Ok(self.comments.len())
    }

    fn commit_comment(&mut self, comment: &Comment) -> Result<Comment, AgoraError> {
        let stored = self
            .comments
            .get(&comment.id)
            .ok_or_else(|| AgoraError::comment_not_found(comment.id))?;
        check_revision("Comment", comment.id, stored.revision, comment.revision)?;

        let now = self.tick();
        let mut next = comment.clone();
        next.revision = comment.revision.saturating_add(1);
        next.updated = now;
        self.comments.insert(next.id, next.clone());
        Ok(next)
    }

    fn remove_comment(&mut self, id: CommentId) -> Result<bool, AgoraError> {
        let removed = self.comments.remove(&id).is_some();
        if removed {
            self.tick();
        }
        Ok(removed)
    }

    fn increment_search(
        &mut self,
        user: AccountId,
        query: &str,
        category: SearchCategory,
    ) -> Result<SearchRecord, AgoraError> {
        let now = self.tick();
        let record = self
            .searches
            .entry((user, query.to_string(), category))
            .and_modify(|record| {
                record.frequency = record.frequency.saturating_add(1);
                record.updated = now;
            })
            .or_insert_with(|| SearchRecord {
                user,
                query: query.to_string(),
                category,
                frequency: 1,
                updated: now,
            });
        Ok(record.clone())
    }

    fn search_history(&self, user: AccountId) -> Result<Vec<SearchRecord>, AgoraError> {
        Ok(self
            .searches
            .range((user, String::new(), SearchCategory::Posts)..)
            .take_while(|((owner, _, _), _)| *owner == user)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn remove_searches(
        &mut self,
        user: AccountId,
        keys: &[(String, SearchCategory)],
    ) -> Result<(), AgoraError> {
        for (query, category) in keys {
            self.searches.remove(&(user, query.clone(), *category));
        }
        Ok(())
    }

    fn search_record_count(&self) -> Result<usize, AgoraError> {
        Ok(self.searches.len())
    }
}

// =============================================================================
// SERIALIZABLE STORE
// =============================================================================

/// A serializable snapshot of a `MemoryStore`.
///
/// Indexes are not stored; they are rebuilt when the snapshot is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableStore {
    pub accounts: Vec<Account>,
    pub posts: Vec<Post>,
    pub comments: Vec<Comment>,
    pub searches: Vec<SearchRecord>,
    pub next_account_id: u64,
    pub next_post_id: u64,
    pub next_comment_id: u64,
    pub clock: u64,
}

impl From<&MemoryStore> for SerializableStore {
    fn from(store: &MemoryStore) -> Self {
        Self {
            accounts: store.accounts.values().cloned().collect(),
            posts: store.posts.values().cloned().collect(),
            comments: store.comments.values().cloned().collect(),
            searches: store.searches.values().cloned().collect(),
            next_account_id: store.next_account_id,
            next_post_id: store.next_post_id,
            next_comment_id: store.next_comment_id,
            clock: store.clock.value(),
        }
    }
}

impl From<SerializableStore> for MemoryStore {
    fn from(snapshot: SerializableStore) -> Self {
        let mut store = Self {
            next_account_id: snapshot.next_account_id,
            next_post_id: snapshot.next_post_id,
            next_comment_id: snapshot.next_comment_id,
            clock: Stamp(snapshot.clock),
            ..Self::default()
        };
        for account in snapshot.accounts {
            store.usernames.insert(account.username.clone(), account.id);
            store.emails.insert(account.email.clone(), account.id);
            store.accounts.insert(account.id, account);
        }
        for post in snapshot.posts {
            store.posts.insert(post.id, post);
        }
        for comment in snapshot.comments {
            store.comments.insert(comment.id, comment);
        }
        for record in snapshot.searches {
            store
                .searches
                .insert((record.user, record.query.clone(), record.category), record);
        }
        store
    }
}

// =============================================================================
// TESTS
// =============================================================================
