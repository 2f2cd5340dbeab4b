//! # redb-backed Document Storage
//!
//! A disk-backed document store using the redb embedded database.
//!
//! redb provides:
//! - ACID transactions (a multi-account follow commit is one write transaction)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Documents are stored as postcard bytes keyed by their numeric id.
//! Unique indexes (username, e-mail) and the comment-by-post index live in
//! their own tables and are maintained inside the same transaction as the
//! documents they index.

use crate::store::{
    AccountKey, DocumentStore, check_account_invariants, check_distinct, check_revision,
};
use crate::{
    Account, AccountDraft, AccountId, AgoraError, Comment, CommentDraft, CommentId, Post,
    PostDraft, PostId, SearchCategory, SearchRecord, Stamp,
};
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table,
    TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::Path;

/// Table for accounts: AccountId(u64) -> serialized Account bytes
const ACCOUNTS: TableDefinition<u64, &[u8]> = TableDefinition::new("accounts");

/// Unique index: username -> AccountId(u64)
const USERNAMES: TableDefinition<&str, u64> = TableDefinition::new("usernames");

/// Unique index: email -> AccountId(u64)
const EMAILS: TableDefinition<&str, u64> = TableDefinition::new("emails");

/// Table for posts: PostId(u64) -> serialized Post bytes
const POSTS: TableDefinition<u64, &[u8]> = TableDefinition::new("posts");

/// Table for comments: CommentId(u64) -> serialized Comment bytes
const COMMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("comments");

/// Index: (post_id, comment_id) -> (). Range scans give a post's comments in order.
const POST_COMMENTS: TableDefinition<(u64, u64), ()> = TableDefinition::new("post_comments");

/// Table for search history: (user, query, category) -> serialized SearchRecord
const SEARCHES: TableDefinition<(u64, &str, &str), &[u8]> = TableDefinition::new("searches");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_ACCOUNT_ID: &str = "next_account_id";
const NEXT_POST_ID: &str = "next_post_id";
const NEXT_COMMENT_ID: &str = "next_comment_id";
const CLOCK: &str = "clock";

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, AgoraError> {
    postcard::to_allocvec(value).map_err(AgoraError::codec)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AgoraError> {
    postcard::from_bytes(bytes).map_err(AgoraError::codec)
}

/// Read a counter and store its successor. Returns the value read.
fn take_counter(meta: &mut Table<'_, &'static str, u64>, key: &str) -> Result<u64, AgoraError> {
    let current = meta
        .get(key)
        .map_err(AgoraError::io)?
        .map(|v| v.value())
        .unwrap_or(0);
    meta.insert(key, current.saturating_add(1))
        .map_err(AgoraError::io)?;
    Ok(current)
}

/// Advance the logical clock and return the new stamp.
fn tick(meta: &mut Table<'_, &'static str, u64>) -> Result<Stamp, AgoraError> {
    Ok(Stamp(take_counter(meta, CLOCK)?.saturating_add(1)))
}

/// A disk-backed document store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a document database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AgoraError> {
        let db = Database::create(path.as_ref()).map_err(AgoraError::io)?;
        let store = Self { db };

        // Initialize tables if they don't exist
        store.write(|txn| {
            txn.open_table(ACCOUNTS).map_err(AgoraError::io)?;
            txn.open_table(USERNAMES).map_err(AgoraError::io)?;
            txn.open_table(EMAILS).map_err(AgoraError::io)?;
            txn.open_table(POSTS).map_err(AgoraError::io)?;
            txn.open_table(COMMENTS).map_err(AgoraError::io)?;
            txn.open_table(POST_COMMENTS).map_err(AgoraError::io)?;
            txn.open_table(SEARCHES).map_err(AgoraError::io)?;
            txn.open_table(METADATA).map_err(AgoraError::io)?;
            Ok(())
        })?;

        Ok(store)
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), AgoraError> {
        self.db.compact().map_err(AgoraError::io)?;
        Ok(())
    }

    /// Current value of the logical clock.
    pub fn clock(&self) -> Result<Stamp, AgoraError> {
        self.read(|txn| {
            let meta = txn.open_table(METADATA).map_err(AgoraError::io)?;
            Ok(Stamp(
                meta.get(CLOCK)
                    .map_err(AgoraError::io)?
                    .map(|v| v.value())
                    .unwrap_or(0),
            ))
        })
    }

    /// Run `f` in a write transaction, committing on `Ok` and aborting on `Err`.
    fn write<T>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> Result<T, AgoraError>,
    ) -> Result<T, AgoraError> {
        let txn = self.db.begin_write().map_err(AgoraError::io)?;
        match f(&txn) {
            Ok(value) => {
                txn.commit().map_err(AgoraError::io)?;
                Ok(value)
            }
            Err(e) => {
                txn.abort().map_err(AgoraError::io)?;
                Err(e)
            }
        }
    }

    /// Run `f` against a read snapshot.
    fn read<T>(
        &self,
        f: impl FnOnce(&ReadTransaction) -> Result<T, AgoraError>,
    ) -> Result<T, AgoraError> {
        let txn = self.db.begin_read().map_err(AgoraError::io)?;
        f(&txn)
    }
}

// =============================================================================
// DOCUMENTSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl DocumentStore for RedbStore {
    fn insert_account(&mut self, draft: AccountDraft) -> Result<Account, AgoraError> {
        self.write(|txn| {
            let mut accounts = txn.open_table(ACCOUNTS).map_err(AgoraError::io)?;
            let mut usernames = txn.open_table(USERNAMES).map_err(AgoraError::io)?;
            let mut emails = txn.open_table(EMAILS).map_err(AgoraError::io)?;
            let mut meta = txn.open_table(METADATA).map_err(AgoraError::io)?;

            if usernames
                .get(draft.username.as_str())
                .map_err(AgoraError::io)?
                .is_some()
            {
                return Err(AgoraError::Conflict(format!(
                    "Username '{}' is already taken",
                    draft.username
                )));
            }
            if emails
                .get(draft.email.as_str())
                .map_err(AgoraError::io)?
                .is_some()
            {
                return Err(AgoraError::Conflict(format!(
                    "E-mail '{}' is already registered",
                    draft.email
                )));
            }

            let id = AccountId(take_counter(&mut meta, NEXT_ACCOUNT_ID)?);
            let now = tick(&mut meta)?;
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

            let bytes = encode(&account)?;
            accounts
                .insert(id.0, bytes.as_slice())
                .map_err(AgoraError::io)?;
            usernames
                .insert(account.username.as_str(), id.0)
                .map_err(AgoraError::io)?;
            emails
                .insert(account.email.as_str(), id.0)
                .map_err(AgoraError::io)?;
            Ok(account)
        })
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, AgoraError> {
        self.read(|txn| {
            let accounts = txn.open_table(ACCOUNTS).map_err(AgoraError::io)?;
            match accounts.get(id.0).map_err(AgoraError::io)? {
                Some(data) => Ok(Some(decode(data.value())?)),
                None => Ok(None),
            }
        })
    }

    fn find_account(&self, key: AccountKey<'_>) -> Result<Option<Account>, AgoraError> {
        let id = self.read(|txn| {
            let found = match key {
                AccountKey::Username(name) => txn
                    .open_table(USERNAMES)
                    .map_err(AgoraError::io)?
                    .get(name)
                    .map_err(AgoraError::io)?
                    .map(|v| v.value()),
                AccountKey::Email(email) => txn
                    .open_table(EMAILS)
                    .map_err(AgoraError::io)?
                    .get(email)
                    .map_err(AgoraError::io)?
                    .map(|v| v.value()),
            };
            Ok(found)
        })?;
        match id {
            Some(id) => self.account(AccountId(id)),
            None => Ok(None),
        }
    }

    fn accounts(&self) -> Result<Vec<Account>, AgoraError> {
        self.read(|txn| {
            let accounts = txn.open_table(ACCOUNTS).map_err(AgoraError::io)?;
            let mut all = Vec::new();
            for entry in accounts.iter().map_err(AgoraError::io)? {
                let (_, value) = entry.map_err(AgoraError::io)?;
                all.push(decode(value.value())?);
            }
            Ok(all)
        })
    }

    fn commit_accounts(&mut self, batch: &[Account]) -> Result<Vec<Account>, AgoraError> {
        check_distinct(batch)?;

        self.write(|txn| {
            let mut accounts = txn.open_table(ACCOUNTS).map_err(AgoraError::io)?;
            let mut usernames = txn.open_table(USERNAMES).map_err(AgoraError::io)?;
            let mut emails = txn.open_table(EMAILS).map_err(AgoraError::io)?;
            let mut meta = txn.open_table(METADATA).map_err(AgoraError::io)?;

            let now = tick(&mut meta)?;
            let mut written = Vec::with_capacity(batch.len());

            // Any error below aborts the transaction, so nothing is half-written.
            for account in batch {
                check_account_invariants(account)?;

                let stored: Account = match accounts.get(account.id.0).map_err(AgoraError::io)? {
                    Some(data) => decode(data.value())?,
                    None => return Err(AgoraError::account_not_found(account.id)),
                };
                check_revision("Account", account.id, stored.revision, account.revision)?;

                if stored.username != account.username {
                    let taken = usernames
                        .get(account.username.as_str())
                        .map_err(AgoraError::io)?
                        .is_some();
                    if taken {
                        return Err(AgoraError::Conflict(format!(
                            "Username '{}' is already taken",
                            account.username
                        )));
                    }
                    usernames
                        .remove(stored.username.as_str())
                        .map_err(AgoraError::io)?;
                    usernames
                        .insert(account.username.as_str(), account.id.0)
                        .map_err(AgoraError::io)?;
                }
                if stored.email != account.email {
                    let taken = emails
                        .get(account.email.as_str())
                        .map_err(AgoraError::io)?
                        .is_some();
                    if taken {
                        return Err(AgoraError::Conflict(format!(
                            "E-mail '{}' is already registered",
                            account.email
                        )));
                    }
                    emails
                        .remove(stored.email.as_str())
                        .map_err(AgoraError::io)?;
                    emails
                        .insert(account.email.as_str(), account.id.0)
                        .map_err(AgoraError::io)?;
                }

                let mut next = account.clone();
                next.revision = account.revision.saturating_add(1);
                next.updated = now;
                let bytes = encode(&next)?;
                accounts
                    .insert(next.id.0, bytes.as_slice())
                    .map_err(AgoraError::io)?;
                written.push(next);
            }
            Ok(written)
        })
    }

    fn insert_post(&mut self, draft: PostDraft) -> Result<Post, AgoraError> {
        self.write(|txn| {
            let mut posts = txn.open_table(POSTS).map_err(AgoraError::io)?;
            let mut meta = txn.open_table(METADATA).map_err(AgoraError::io)?;

            let id = PostId(take_counter(&mut meta, NEXT_POST_ID)?);
            let now = tick(&mut meta)?;
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
            let bytes = encode(&post)?;
            posts
                .insert(id.0, bytes.as_slice())
                .map_err(AgoraError::io)?;
            Ok(post)
        })
    }

    fn post(&self, id: PostId) -> Result<Option<Post>, AgoraError> {
        self.read(|txn| {
            let posts = txn.open_table(POSTS).map_err(AgoraError::io)?;
            match posts.get(id.0).map_err(AgoraError::io)? {
                Some(data) => Ok(Some(decode(data.value())?)),
                None => Ok(None),
            }
        })
    }

    fn posts(&self) -> Result<Vec<Post>, AgoraError> {
        self.read(|txn| {
            let posts = txn.open_table(POSTS).map_err(AgoraError::io)?;
            let mut all = Vec::new();
            for entry in posts.iter().map_err(AgoraError::io)? {
                let (_, value) = entry.map_err(AgoraError::io)?;
                all.push(decode(value.value())?);
            }
            Ok(all)
        })
    }

    fn commit_post(&mut self, post: &Post) -> Result<Post, AgoraError> {
        self.write(|txn| {
            let mut posts = txn.open_table(POSTS).map_err(AgoraError::io)?;
            let mut meta = txn.open_table(METADATA).map_err(AgoraError::io)?;

            let stored: Post = match posts.get(post.id.0).map_err(AgoraError::io)? {
                Some(data) => decode(data.value())?,
                None => return Err(AgoraError::post_not_found(post.id)),
            };
            check_revision("Post", post.id, stored.revision, post.revision)?;

            let mut next = post.clone();
            next.revision = post.revision.saturating_add(1);
            next.updated = tick(&mut meta)?;
            let bytes = encode(&next)?;
            posts
                .insert(next.id.0, bytes.as_slice())
                .map_err(AgoraError::io)?;
            Ok(next)
        })
    }

    fn remove_post(&mut self, id: PostId) -> Result<bool, AgoraError> {
        self.write(|txn| {
            let mut posts = txn.open_table(POSTS).map_err(AgoraError::io)?;
            let mut comments = txn.open_table(COMMENTS).map_err(AgoraError::io)?;
            let mut index = txn.open_table(POST_COMMENTS).map_err(AgoraError::io)?;
            let mut meta = txn.open_table(METADATA).map_err(AgoraError::io)?;

            let existed = posts.remove(id.0).map_err(AgoraError::io)?.is_some();
            if !existed {
                return Ok(false);
            }

            let mut keys = Vec::new();
            for entry in index
                .range((id.0, 0)..=(id.0, u64::MAX))
                .map_err(AgoraError::io)?
            {
                let (key, _) = entry.map_err(AgoraError::io)?;
                keys.push(key.value());
            }
            for (post_id, comment_id) in keys {
                index.remove((post_id, comment_id)).map_err(AgoraError::io)?;
                comments.remove(comment_id).map_err(AgoraError::io)?;
            }
            tick(&mut meta)?;
            Ok(true)
        })
    }

    fn insert_comment(&mut self, draft: CommentDraft) -> Result<Comment, AgoraError> {
        self.write(|txn| {
            let posts = txn.open_table(POSTS).map_err(AgoraError::io)?;
            let mut comments = txn.open_table(COMMENTS).map_err(AgoraError::io)?;
            let mut index = txn.open_table(POST_COMMENTS).map_err(AgoraError::io)?;
            let mut meta = txn.open_table(METADATA).map_err(AgoraError::io)?;

            if posts.get(draft.post.0).map_err(AgoraError::io)?.is_none() {
                return Err(AgoraError::post_not_found(draft.post));
            }

            let id = CommentId(take_counter(&mut meta, NEXT_COMMENT_ID)?);
            let now = tick(&mut meta)?;
            let comment = Comment {
                id,
                owner: draft.owner,
                post: draft.post,
                content: draft.content,
                revision: 1,
                created: now,
                updated: now,
            };
            let bytes = encode(&comment)?;
            comments
                .insert(id.0, bytes.as_slice())
                .map_err(AgoraError::io)?;
            index
                .insert((comment.post.0, id.0), ())
                .map_err(AgoraError::io)?;
            Ok(comment)
        })
    }

    fn comment(&self, id: CommentId) -> Result<Option<Comment>, AgoraError> {
        self.read(|txn| {
            let comments = txn.open_table(COMMENTS).map_err(AgoraError::io)?;
            match comments.get(id.0).map_err(AgoraError::io)? {
                Some(data) => Ok(Some(decode(data.value())?)),
                None => Ok(None),
            }
        })
    }

    fn comments_for(&self, post: PostId) -> Result<Vec<Comment>, AgoraError> {
        self.read(|txn| {
            let comments = txn.open_table(COMMENTS).map_err(AgoraError::io)?;
            let index = txn.open_table(POST_COMMENTS).map_err(AgoraError::io)?;

            let mut found = Vec::new();
            for entry in index
                .range((post.0, 0)..=(post.0, u64::MAX))
                .map_err(AgoraError::io)?
            {
                let (key, _) = entry.map_err(AgoraError::io)?;
                let (_, comment_id) = key.value();
                if let Some(data) = comments.get(comment_id).map_err(AgoraError::io)? {
                    found.push(decode(data.value())?);
                }
            }
            Ok(found)
        })
    }

    fn comment_count(&self) -> Result<usize, AgoraError> {
        self.read(|txn| {
            let comments = txn.open_table(COMMENTS).map_err(AgoraError::io)?;
            Ok(comments.len().map_err(AgoraError::io)? as usize)
        })
    }

    fn commit_comment(&mut self, comment: &Comment) -> Result<Comment, AgoraError> {
        self.write(|txn| {
            let mut comments = txn.open_table(COMMENTS).map_err(AgoraError::io)?;
            let mut meta = txn.open_table(METADATA).map_err(AgoraError::io)?;

            let stored: Comment = match comments.get(comment.id.0).map_err(AgoraError::io)? {
                Some(data) => decode(data.value())?,
                None => return Err(AgoraError::comment_not_found(comment.id)),
            };
            check_revision("Comment", comment.id, stored.revision, comment.revision)?;

            let mut next = comment.clone();
            next.revision = comment.revision.saturating_add(1);
            next.updated = tick(&mut meta)?;
            let bytes = encode(&next)?;
            comments
                .insert(next.id.0, bytes.as_slice())
                .map_err(AgoraError::io)?;
            Ok(next)
        })
    }

    fn remove_comment(&mut self, id: CommentId) -> Result<bool, AgoraError> {
        self.write(|txn| {
            let mut comments = txn.open_table(COMMENTS).map_err(AgoraError::io)?;
            let mut index = txn.open_table(POST_COMMENTS).map_err(AgoraError::io)?;
            let mut meta = txn.open_table(METADATA).map_err(AgoraError::io)?;

            let removed: Option<Comment> = match comments.remove(id.0).map_err(AgoraError::io)? {
                Some(data) => Some(decode(data.value())?),
                None => None,
            };
            let Some(comment) = removed else {
                return Ok(false);
            };
            index
                .remove((comment.post.0, comment.id.0))
                .map_err(AgoraError::io)?;
            tick(&mut meta)?;
            Ok(true)
        })
    }

    fn increment_search(
        &mut self,
        user: AccountId,
        query: &str,
        category: SearchCategory,
    ) -> Result<SearchRecord, AgoraError> {
        self.write(|txn| {
            let mut searches = txn.open_table(SEARCHES).map_err(AgoraError::io)?;
            let mut meta = txn.open_table(METADATA).map_err(AgoraError::io)?;

            let key = (user.0, query, category.as_str());
            let existing: Option<SearchRecord> = match searches.get(key).map_err(AgoraError::io)? {
                Some(data) => Some(decode(data.value())?),
                None => None,
            };
            let now = tick(&mut meta)?;
            let record = match existing {
                Some(mut record) => {
                    record.frequency = record.frequency.saturating_add(1);
                    record.updated = now;
                    record
                }
                None => SearchRecord {
                    user,
                    query: query.to_string(),
                    category,
                    frequency: 1,
                    updated: now,
                },
            };
            let bytes = encode(&record)?;
            searches
                .insert(key, bytes.as_slice())
                .map_err(AgoraError::io)?;
            Ok(record)
        })
    }

    fn search_history(&self, user: AccountId) -> Result<Vec<SearchRecord>, AgoraError> {
        self.read(|txn| {
            let searches = txn.open_table(SEARCHES).map_err(AgoraError::io)?;
            let mut records = Vec::new();
            for entry in searches
                .range((user.0, "", "")..)
                .map_err(AgoraError::io)?
            {
                let (key, value) = entry.map_err(AgoraError::io)?;
                let (owner, _, _) = key.value();
                if owner != user.0 {
                    break;
                }
                records.push(decode(value.value())?);
            }
            Ok(records)
        })
    }

    fn remove_searches(
        &mut self,
        user: AccountId,
        keys: &[(String, SearchCategory)],
    ) -> Result<(), AgoraError> {
        self.write(|txn| {
            let mut searches = txn.open_table(SEARCHES).map_err(AgoraError::io)?;
            for (query, category) in keys {
                searches
                    .remove((user.0, query.as_str(), category.as_str()))
                    .map_err(AgoraError::io)?;
            }
            Ok(())
        })
    }

    fn search_record_count(&self) -> Result<usize, AgoraError> {
        self.read(|txn| {
            let searches = txn.open_table(SEARCHES).map_err(AgoraError::io)?;
            Ok(searches.len().map_err(AgoraError::io)? as usize)
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn draft(name: &str) -> AccountDraft {
        AccountDraft {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            ..AccountDraft::default()
        }
    }

    #[test]
    fn basic_account_operations() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let ada = store.insert_account(draft("ada")).expect("insert");
        let bob = store.insert_account(draft("bob")).expect("insert");

        assert_eq!(ada.id, AccountId(0));
        assert_eq!(bob.id, AccountId(1));
        assert_eq!(store.accounts().expect("scan").len(), 2);
        assert_eq!(
            store
                .find_account(AccountKey::Username("bob"))
                .expect("find")
                .map(|a| a.id),
            Some(bob.id)
        );
    }

    #[test]
    fn duplicate_email_conflicts() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        store.insert_account(draft("ada")).expect("insert");

        let mut clash = draft("other");
        clash.email = "ada@example.com".to_string();
        assert!(matches!(
            store.insert_account(clash),
            Err(AgoraError::Conflict(_))
        ));
        // The failed transaction must not have consumed an id.
        let carol = store.insert_account(draft("carol")).expect("insert");
        assert_eq!(carol.id, AccountId(1));
    }

    #[test]
    fn transaction_two_accounts_atomic() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let ada = store.insert_account(draft("ada")).expect("insert");
        let bob = store.insert_account(draft("bob")).expect("insert");

        let mut ada_next = ada.clone();
        ada_next.following.insert(bob.id);
        let mut bob_next = bob.clone();
        bob_next.followers.insert(ada.id);

        let written = store
            .commit_accounts(&[ada_next, bob_next])
            .expect("commit");
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|a| a.revision == 2));
        assert_eq!(written[0].updated, written[1].updated);
    }

    #[test]
    fn stale_revision_aborts_transaction() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let ada = store.insert_account(draft("ada")).expect("insert");
        let bob = store.insert_account(draft("bob")).expect("insert");
        store.commit_accounts(&[bob.clone()]).expect("commit");

        let mut ada_next = ada.clone();
        ada_next.following.insert(bob.id);
        let mut bob_stale = bob.clone();
        bob_stale.followers.insert(ada.id);

        let result = store.commit_accounts(&[ada_next, bob_stale]);
        assert!(matches!(result, Err(AgoraError::StaleRevision(_))));

        let ada_now = store.account(ada.id).expect("get").expect("exists");
        assert!(ada_now.following.is_empty());
        assert_eq!(ada_now.revision, 1);
    }

    #[test]
    fn comments_follow_their_post() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let ada = store.insert_account(draft("ada")).expect("insert");
        let first = store
            .insert_post(PostDraft {
                owner: ada.id,
                title: "first".to_string(),
                ..PostDraft::default()
            })
            .expect("post");
        let second = store
            .insert_post(PostDraft {
                owner: ada.id,
                title: "second".to_string(),
                ..PostDraft::default()
            })
            .expect("post");

        for (post, text) in [(first.id, "a"), (second.id, "b"), (first.id, "c")] {
            store
                .insert_comment(CommentDraft {
                    owner: ada.id,
                    post,
                    content: text.to_string(),
                })
                .expect("comment");
        }

        let on_first: Vec<_> = store
            .comments_for(first.id)
            .expect("comments")
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(on_first, vec!["a".to_string(), "c".to_string()]);

        assert!(store.remove_post(first.id).expect("remove"));
        assert_eq!(store.comment_count().expect("count"), 1);
        assert!(store.comments_for(first.id).expect("comments").is_empty());
    }

    #[test]
    fn comment_on_missing_post_fails() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let result = store.insert_comment(CommentDraft {
            owner: AccountId(0),
            post: PostId(99),
            content: "hello".to_string(),
        });
        assert!(matches!(result, Err(AgoraError::NotFound(_))));
    }

    #[test]
    fn search_history_is_scoped_per_user() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        for _ in 0..3 {
            store
                .increment_search(AccountId(1), "cats", SearchCategory::Posts)
                .expect("increment");
        }
        store
            .increment_search(AccountId(1), "cats", SearchCategory::Tags)
            .expect("increment");
        store
            .increment_search(AccountId(2), "dogs", SearchCategory::Posts)
            .expect("increment");

        let history = store.search_history(AccountId(1)).expect("history");
        assert_eq!(history.len(), 2);
        let posts = history
            .iter()
            .find(|r| r.category == SearchCategory::Posts)
            .expect("posts record");
        assert_eq!(posts.frequency, 3);

        store
            .remove_searches(AccountId(1), &[("cats".to_string(), SearchCategory::Tags)])
            .expect("remove");
        assert_eq!(store.search_record_count().expect("count"), 2);
    }

    #[test]
    fn recovery_persistence_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        let clock_before;
        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            let ada = store.insert_account(draft("ada")).expect("insert");
            store
                .insert_post(PostDraft {
                    owner: ada.id,
                    title: "kept".to_string(),
                    ..PostDraft::default()
                })
                .expect("post");
            clock_before = store.clock().expect("clock");
        }
        // Store dropped here, simulating process exit

        {
            let mut store = RedbStore::open(&db_path).expect("reopen db");
            assert_eq!(store.posts().expect("posts").len(), 1);
            assert_eq!(store.clock().expect("clock"), clock_before);

            // Counters survive the reopen.
            let bob = store.insert_account(draft("bob")).expect("insert");
            assert_eq!(bob.id, AccountId(1));
            store.compact().expect("compact");
        }
    }
}
