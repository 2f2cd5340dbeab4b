//! # Session Module
//!
//! A Session bundles a storage backend with a blob store and exposes every
//! engine operation as a method. Callers pass the acting account explicitly;
//! the session holds no per-request state.
//!
//! ## Storage Backends
//!
//! - `InMemory`: `MemoryStore` (fast, volatile unless saved as a snapshot)
//! - `Persistent`: `RedbStore` for disk-backed ACID storage

use crate::accounts::{AccountPatch, AccountRegistry};
use crate::feed::{FeedRanker, PublicPostQuery, Sort};
use crate::follow::{AccountSummary, FollowGraph, FollowOutcome, RelationKind, RequestDecision};
use crate::media::{BlobStore, DisabledBlobStore, UploadRoot};
use crate::metrics::StoreMetrics;
use crate::pagination::{Page, PageRequest};
use crate::posts::{NewPost, PostPatch, PostService};
use crate::storage::RedbStore;
use crate::store::{AccountKey, DocumentStore, MemoryStore};
use crate::{
    Account, AccountDraft, AccountId, AgoraError, Comment, CommentDraft, CommentId, Post,
    PostDraft, PostId, SearchCategory, SearchRecord,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbStore (database handle) cannot be safely cloned.

impl DocumentStore for StorageBackend {
    fn insert_account(&mut self, draft: AccountDraft) -> Result<Account, AgoraError> {
        match self {
            Self::InMemory(store) => store.insert_account(draft),
            Self::Persistent(redb) => redb.insert_account(draft),
        }
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, AgoraError> {
        match self {
            Self::InMemory(store) => store.account(id),
            Self::Persistent(redb) => redb.account(id),
        }
    }

    fn find_account(&self, key: AccountKey<'_>) -> Result<Option<Account>, AgoraError> {
        match self {
            Self::InMemory(store) => store.find_account(key),
            Self::Persistent(redb) => redb.find_account(key),
        }
    }

    fn accounts(&self) -> Result<Vec<Account>, AgoraError> {
        match self {
            Self::InMemory(store) => store.accounts(),
            Self::Persistent(redb) => redb.accounts(),
        }
    }

    fn commit_accounts(&mut self, accounts: &[Account]) -> Result<Vec<Account>, AgoraError> {
        match self {
            Self::InMemory(store) => store.commit_accounts(accounts),
            Self::Persistent(redb) => redb.commit_accounts(accounts),
        }
    }

    fn insert_post(&mut self, draft: PostDraft) -> Result<Post, AgoraError> {
        match self {
            Self::InMemory(store) => store.insert_post(draft),
            Self::Persistent(redb) => redb.insert_post(draft),
        }
    }

    fn post(&self, id: PostId) -> Result<Option<Post>, AgoraError> {
        match self {
            Self::InMemory(store) => store.post(id),
            Self::Persistent(redb) => redb.post(id),
        }
    }

    fn posts(&self) -> Result<Vec<Post>, AgoraError> {
        match self {
            Self::InMemory(store) => store.posts(),
            Self::Persistent(redb) => redb.posts(),
        }
    }

    fn commit_post(&mut self, post: &Post) -> Result<Post, AgoraError> {
        match self {
            Self::InMemory(store) => store.commit_post(post),
            Self::Persistent(redb) => redb.commit_post(post),
        }
    }

    fn remove_post(&mut self, id: PostId) -> Result<bool, AgoraError> {
        match self {
            Self::InMemory(store) => store.remove_post(id),
            Self::Persistent(redb) => redb.remove_post(id),
        }
    }

    fn insert_comment(&mut self, draft: CommentDraft) -> Result<Comment, AgoraError> {
        match self {
            Self::InMemory(store) => store.insert_comment(draft),
            Self::Persistent(redb) => redb.insert_comment(draft),
        }
    }

    fn comment(&self, id: CommentId) -> Result<Option<Comment>, AgoraError> {
        match self {
            Self::InMemory(store) => store.comment(id),
            Self::Persistent(redb) => redb.comment(id),
        }
    }

    fn comments_for(&self, post: PostId) -> Result<Vec<Comment>, AgoraError> {
        match self {
            Self::InMemory(store) => store.comments_for(post),
            Self::Persistent(redb) => redb.comments_for(post),
        }
    }

    fn comment_count(&self) -> Result<usize, AgoraError> {
        match self {
            Self::InMemory(store) => store.comment_count(),
            Self::Persistent(redb) => redb.comment_count(),
        }
    }

    fn commit_comment(&mut self, comment: &Comment) -> Result<Comment, AgoraError> {
        match self {
            Self::InMemory(store) => store.commit_comment(comment),
            Self::Persistent(redb) => redb.commit_comment(comment),
        }
    }

    fn remove_comment(&mut self, id: CommentId) -> Result<bool, AgoraError> {
        match self {
            Self::InMemory(store) => store.remove_comment(id),
            Self::Persistent(redb) => redb.remove_comment(id),
        }
    }

    fn increment_search(
        &mut self,
        user: AccountId,
        query: &str,
        category: SearchCategory,
    ) -> Result<SearchRecord, AgoraError> {
        match self {
            Self::InMemory(store) => store.increment_search(user, query, category),
            Self::Persistent(redb) => redb.increment_search(user, query, category),
        }
    }

    fn search_history(&self, user: AccountId) -> Result<Vec<SearchRecord>, AgoraError> {
        match self {
            Self::InMemory(store) => store.search_history(user),
            Self::Persistent(redb) => redb.search_history(user),
        }
    }

    fn remove_searches(
        &mut self,
        user: AccountId,
        keys: &[(String, SearchCategory)],
    ) -> Result<(), AgoraError> {
        match self {
            Self::InMemory(store) => store.remove_searches(user, keys),
            Self::Persistent(redb) => redb.remove_searches(user, keys),
        }
    }

    fn search_record_count(&self) -> Result<usize, AgoraError> {
        match self {
            Self::InMemory(store) => store.search_record_count(),
            Self::Persistent(redb) => redb.search_record_count(),
        }
    }
}

/// A Session combines a document store with a blob store.
///
/// Note: Session does NOT implement Clone (see `StorageBackend`).
pub struct Session {
    /// The storage backend (in-memory or persistent).
    backend: StorageBackend,
    /// Where media uploads go.
    blobs: Arc<dyn BlobStore + Send + Sync>,
    /// When set, local media paths must resolve inside this directory.
    uploads: Option<UploadRoot>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl Session {
    /// Create a new empty session with in-memory storage and no media storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session over an existing in-memory store.
    #[must_use]
    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            backend: StorageBackend::InMemory(store),
            blobs: Arc::new(DisabledBlobStore),
            uploads: None,
        }
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, AgoraError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbStore::open(path)?),
            blobs: Arc::new(DisabledBlobStore),
            uploads: None,
        })
    }

    /// Replace the blob store.
    #[must_use]
    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore + Send + Sync>) -> Self {
        self.blobs = blobs;
        self
    }

    /// Only accept local media files from inside `uploads`.
    #[must_use]
    pub fn with_upload_root(mut self, uploads: UploadRoot) -> Self {
        self.uploads = Some(uploads);
        self
    }

    fn staged(&self, local: &Path) -> Result<PathBuf, AgoraError> {
        match &self.uploads {
            Some(uploads) => uploads.resolve(local),
            None => Ok(local.to_path_buf()),
        }
    }

    fn staged_opt(&self, local: Option<&Path>) -> Result<Option<PathBuf>, AgoraError> {
        local.map(|path| self.staged(path)).transpose()
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// The in-memory store, for snapshotting. `None` for persistent backends.
    #[must_use]
    pub fn memory_store(&self) -> Option<&MemoryStore> {
        match &self.backend {
            StorageBackend::InMemory(store) => Some(store),
            StorageBackend::Persistent(_) => None,
        }
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    // =========================================================================
    // ACCOUNTS
    // =========================================================================

    pub fn register(
        &mut self,
        draft: AccountDraft,
        profile_pic: Option<&Path>,
    ) -> Result<Account, AgoraError> {
        let profile_pic = self.staged_opt(profile_pic)?;
        AccountRegistry::register(
            &mut self.backend,
            self.blobs.as_ref(),
            draft,
            profile_pic.as_deref(),
        )
    }

    pub fn account(&self, id: AccountId) -> Result<Account, AgoraError> {
        AccountRegistry::account(&self.backend, id)
    }

    /// Lookup an account by username (case-insensitive).
    pub fn account_by_username(&self, username: &str) -> Result<Account, AgoraError> {
        let username = username.trim().to_lowercase();
        self.backend
            .find_account(AccountKey::Username(&username))?
            .ok_or_else(|| AgoraError::NotFound(format!("Account '{}' not found", username)))
    }

    pub fn update_details(
        &mut self,
        id: AccountId,
        patch: &AccountPatch,
    ) -> Result<Account, AgoraError> {
        AccountRegistry::update_details(&mut self.backend, id, patch)
    }

    pub fn update_profile_pic(
        &mut self,
        id: AccountId,
        local: &Path,
    ) -> Result<Account, AgoraError> {
        let local = self.staged(local)?;
        AccountRegistry::update_profile_pic(&mut self.backend, self.blobs.as_ref(), id, &local)
    }

    // =========================================================================
    // FOLLOW GRAPH
    // =========================================================================

    pub fn request_or_toggle_follow(
        &mut self,
        actor: AccountId,
        target: AccountId,
    ) -> Result<FollowOutcome, AgoraError> {
        FollowGraph::request_or_toggle_follow(&mut self.backend, actor, target)
    }

    pub fn resolve_follow_request(
        &mut self,
        owner: AccountId,
        requester: AccountId,
        decision: RequestDecision,
    ) -> Result<(), AgoraError> {
        FollowGraph::resolve_follow_request(&mut self.backend, owner, requester, decision)
    }

    pub fn toggle_privacy(&mut self, owner: AccountId) -> Result<bool, AgoraError> {
        FollowGraph::toggle_privacy(&mut self.backend, owner)
    }

    pub fn list_relations(
        &self,
        account: AccountId,
        kind: RelationKind,
        filter: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<AccountSummary>, AgoraError> {
        FollowGraph::list_relations(&self.backend, account, kind, filter, page)
    }

    pub fn pending_requests(
        &self,
        owner: AccountId,
        page: PageRequest,
    ) -> Result<Page<AccountSummary>, AgoraError> {
        FollowGraph::pending_requests(&self.backend, owner, page)
    }

    pub fn suggest(
        &self,
        account: AccountId,
        limit: usize,
    ) -> Result<Vec<AccountSummary>, AgoraError> {
        FollowGraph::suggest(&self.backend, account, limit)
    }

    // =========================================================================
    // POSTS
    // =========================================================================

    pub fn create_post(
        &mut self,
        owner: AccountId,
        input: NewPost,
        media: Option<&Path>,
    ) -> Result<Post, AgoraError> {
        let media = self.staged_opt(media)?;
        PostService::create_post(
            &mut self.backend,
            self.blobs.as_ref(),
            owner,
            input,
            media.as_deref(),
        )
    }

    pub fn get_post(&self, viewer: Option<AccountId>, id: PostId) -> Result<Post, AgoraError> {
        PostService::get_post(&self.backend, viewer, id)
    }

    pub fn update_post(
        &mut self,
        actor: AccountId,
        id: PostId,
        patch: &PostPatch,
        media: Option<&Path>,
    ) -> Result<Post, AgoraError> {
        let media = self.staged_opt(media)?;
        PostService::update_post(
            &mut self.backend,
            self.blobs.as_ref(),
            actor,
            id,
            patch,
            media.as_deref(),
        )
    }

    pub fn delete_post(&mut self, actor: AccountId, id: PostId) -> Result<(), AgoraError> {
        PostService::delete_post(&mut self.backend, self.blobs.as_ref(), actor, id)
    }

    pub fn toggle_like(&mut self, actor: AccountId, id: PostId) -> Result<bool, AgoraError> {
        PostService::toggle_like(&mut self.backend, actor, id)
    }

    pub fn add_comment(
        &mut self,
        actor: AccountId,
        post: PostId,
        content: &str,
    ) -> Result<Comment, AgoraError> {
        PostService::add_comment(&mut self.backend, actor, post, content)
    }

    pub fn update_comment(
        &mut self,
        actor: AccountId,
        post: PostId,
        id: CommentId,
        content: &str,
    ) -> Result<Comment, AgoraError> {
        PostService::update_comment(&mut self.backend, actor, post, id, content)
    }

    pub fn delete_comment(
        &mut self,
        actor: AccountId,
        post: PostId,
        id: CommentId,
    ) -> Result<(), AgoraError> {
        PostService::delete_comment(&mut self.backend, actor, post, id)
    }

    pub fn list_comments(
        &self,
        viewer: Option<AccountId>,
        post: PostId,
    ) -> Result<Vec<Comment>, AgoraError> {
        PostService::list_comments(&self.backend, viewer, post)
    }

    // =========================================================================
    // FEED
    // =========================================================================

    /// Public listing; records the text of an authenticated search.
    pub fn list_public(
        &mut self,
        viewer: Option<AccountId>,
        query: &PublicPostQuery,
        sort: Sort,
        page: PageRequest,
    ) -> Result<Page<Post>, AgoraError> {
        FeedRanker::list_public(&mut self.backend, viewer, query, sort, page)
    }

    pub fn personalized_feed(
        &self,
        user: AccountId,
        page: PageRequest,
    ) -> Result<Page<Post>, AgoraError> {
        FeedRanker::personalized(&self.backend, user, page)
    }

    // =========================================================================
    // METRICS
    // =========================================================================

    pub fn metrics(&self) -> Result<StoreMetrics, AgoraError> {
        StoreMetrics::collect(&self.backend)
    }
}

// =============================================================================
// TESTS
// =============================================================================
