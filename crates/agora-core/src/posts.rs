//! # Posts, Likes and Comments
//!
//! Post lifecycle on top of the document store and the blob store.
//!
//! Reads go through the visibility policy: a post that the viewer may not
//! see is `Forbidden`, for the post itself and for everything hanging off it
//! (likes, comments). Writes are owner-only, except that a post owner may
//! also delete comments left on their post.

use crate::accounts::{require_account, with_retry};
use crate::media::{self, BlobStore, MediaKind};
use crate::primitives::{
    MAX_BODY_LENGTH, MAX_COMMENT_LENGTH, MAX_TAG_LENGTH, MAX_TAGS, MAX_TITLE_LENGTH,
};
use crate::store::DocumentStore;
use crate::visibility::ensure_visible;
use crate::{
    AccountId, AgoraError, Comment, CommentDraft, CommentId, MediaType, Post, PostDraft, PostId,
    Visibility,
};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

/// Fields of a new post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub description: String,
    pub content: String,
    pub tags: Vec<String>,
    pub visibility: Visibility,
}

/// Changes to a post. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub visibility: Option<Visibility>,
}

// =============================================================================
// VALIDATION
// =============================================================================

fn normalize_title(raw: &str) -> Result<String, AgoraError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(AgoraError::InvalidInput("Title is required".to_string()));
    }
    if title.len() > MAX_TITLE_LENGTH {
        return Err(AgoraError::InvalidInput(format!(
            "Title exceeds {} bytes",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn check_body(field: &str, text: &str) -> Result<(), AgoraError> {
    if text.len() > MAX_BODY_LENGTH {
        return Err(AgoraError::InvalidInput(format!(
            "{} exceeds {} bytes",
            field, MAX_BODY_LENGTH
        )));
    }
    Ok(())
}

/// Trim tags, drop empties and duplicates, keep first-seen order.
fn normalize_tags(raw: &[String]) -> Result<Vec<String>, AgoraError> {
    let mut seen = BTreeSet::new();
    let tags: Vec<String> = raw
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect();
    if tags.len() > MAX_TAGS {
        return Err(AgoraError::InvalidInput(format!(
            "A post may have at most {} tags",
            MAX_TAGS
        )));
    }
    if tags.iter().any(|t| t.len() > MAX_TAG_LENGTH) {
        return Err(AgoraError::InvalidInput(format!(
            "Tags may be at most {} bytes",
            MAX_TAG_LENGTH
        )));
    }
    Ok(tags)
}

fn normalize_comment(raw: &str) -> Result<String, AgoraError> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AgoraError::InvalidInput(
            "Comment cannot be empty".to_string(),
        ));
    }
    if content.len() > MAX_COMMENT_LENGTH {
        return Err(AgoraError::InvalidInput(format!(
            "Comment exceeds {} bytes",
            MAX_COMMENT_LENGTH
        )));
    }
    Ok(content.to_string())
}

fn media_type_of(kind: MediaKind) -> MediaType {
    match kind {
        MediaKind::Video => MediaType::Video,
        MediaKind::Image | MediaKind::Raw => MediaType::Image,
    }
}

fn require_post<S: DocumentStore>(store: &S, id: PostId) -> Result<Post, AgoraError> {
    store.post(id)?.ok_or_else(|| AgoraError::post_not_found(id))
}

fn require_owner(post: &Post, actor: AccountId) -> Result<(), AgoraError> {
    if post.owner != actor {
        return Err(AgoraError::Forbidden(format!(
            "Only the owner may modify post {}",
            post.id
        )));
    }
    Ok(())
}

/// Load a comment and check it belongs to `post`.
fn require_comment<S: DocumentStore>(
    store: &S,
    post: PostId,
    id: CommentId,
) -> Result<Comment, AgoraError> {
    match store.comment(id)? {
        Some(comment) if comment.post == post => Ok(comment),
        _ => Err(AgoraError::comment_not_found(id)),
    }
}

// =============================================================================
// POST SERVICE
// =============================================================================

/// The PostService owns posts, likes and comments.
pub struct PostService;

impl PostService {
    /// Create a post.
    ///
    /// Media is optional here: a failed upload creates the post without it.
    pub fn create_post<S: DocumentStore>(
        store: &mut S,
        blobs: &dyn BlobStore,
        owner: AccountId,
        input: NewPost,
        media: Option<&Path>,
    ) -> Result<Post, AgoraError> {
        require_account(store, owner)?;
        let title = normalize_title(&input.title)?;
        check_body("Description", &input.description)?;
        check_body("Content", &input.content)?;
        let tags = normalize_tags(&input.tags)?;

        let stored = media.and_then(|path| {
            let stored = blobs.upload(path);
            if stored.is_none() {
                warn!(owner = %owner, "Media upload failed, creating post without media");
            }
            stored
        });
        let (media_type, media_url) = match stored {
            Some(m) => (media_type_of(m.kind), Some(m.url)),
            None => (MediaType::None, None),
        };

        let post = store.insert_post(PostDraft {
            owner,
            title,
            description: input.description.trim().to_string(),
            content: input.content.trim().to_string(),
            media_type,
            media_url,
            tags,
            visibility: input.visibility,
        })?;
        debug!(post = %post.id, owner = %owner, "Post created");
        Ok(post)
    }

    /// Read a post as `viewer`.
    pub fn get_post<S: DocumentStore>(
        store: &S,
        viewer: Option<AccountId>,
        id: PostId,
    ) -> Result<Post, AgoraError> {
        let post = require_post(store, id)?;
        ensure_visible(viewer, &post)?;
        Ok(post)
    }

    /// Apply `patch` (and optionally new media) to a post owned by `actor`.
    ///
    /// New media is mandatory once supplied: an upload failure is
    /// `DependencyFailure`. The replaced blob is deleted best-effort.
    pub fn update_post<S: DocumentStore>(
        store: &mut S,
        blobs: &dyn BlobStore,
        actor: AccountId,
        id: PostId,
        patch: &PostPatch,
        media: Option<&Path>,
    ) -> Result<Post, AgoraError> {
        require_owner(&require_post(store, id)?, actor)?;

        let title = patch.title.as_deref().map(normalize_title).transpose()?;
        if let Some(description) = &patch.description {
            check_body("Description", description)?;
        }
        if let Some(content) = &patch.content {
            check_body("Content", content)?;
        }
        let tags = patch.tags.as_deref().map(normalize_tags).transpose()?;

        let stored = match media {
            Some(path) => Some(blobs.upload(path).ok_or_else(|| {
                AgoraError::DependencyFailure("Media upload failed".to_string())
            })?),
            None => None,
        };

        let result = with_retry(store, "update_post", |store| {
            let mut post = require_post(store, id)?;
            require_owner(&post, actor)?;
            if let Some(title) = &title {
                post.title.clone_from(title);
            }
            if let Some(description) = &patch.description {
                post.description = description.trim().to_string();
            }
            if let Some(content) = &patch.content {
                post.content = content.trim().to_string();
            }
            if let Some(tags) = &tags {
                post.tags.clone_from(tags);
            }
            if let Some(visibility) = patch.visibility {
                post.visibility = visibility;
            }
            let mut replaced = None;
            if let Some(m) = &stored {
                replaced = post.media_url.replace(m.url.clone());
                post.media_type = media_type_of(m.kind);
            }
            Ok((store.commit_post(&post)?, replaced))
        });

        match result {
            Ok((post, replaced)) => {
                if let Some(url) = replaced {
                    media::discard(blobs, &url);
                }
                debug!(post = %post.id, "Post updated");
                Ok(post)
            }
            Err(e) => {
                if let Some(m) = stored {
                    media::discard(blobs, &m.url);
                }
                Err(e)
            }
        }
    }

    /// Delete a post owned by `actor`, its comments and (best-effort) its media.
    pub fn delete_post<S: DocumentStore>(
        store: &mut S,
        blobs: &dyn BlobStore,
        actor: AccountId,
        id: PostId,
    ) -> Result<(), AgoraError> {
        let post = require_post(store, id)?;
        require_owner(&post, actor)?;
        if !store.remove_post(id)? {
            return Err(AgoraError::post_not_found(id));
        }
        if let Some(url) = &post.media_url {
            media::discard(blobs, url);
        }
        debug!(post = %id, "Post deleted");
        Ok(())
    }

    /// Like or unlike a post the actor can see. Returns whether it is now liked.
    pub fn toggle_like<S: DocumentStore>(
        store: &mut S,
        actor: AccountId,
        id: PostId,
    ) -> Result<bool, AgoraError> {
        require_account(store, actor)?;
        with_retry(store, "toggle_like", |store| {
            let mut post = require_post(store, id)?;
            ensure_visible(Some(actor), &post)?;
            let liked = if post.likes.remove(&actor) {
                false
            } else {
                post.likes.insert(actor)
            };
            store.commit_post(&post)?;
            Ok(liked)
        })
    }

    // =========================================================================
    // COMMENTS
    // =========================================================================

    /// Comment on a post the actor can see.
    pub fn add_comment<S: DocumentStore>(
        store: &mut S,
        actor: AccountId,
        post: PostId,
        content: &str,
    ) -> Result<Comment, AgoraError> {
        require_account(store, actor)?;
        ensure_visible(Some(actor), &require_post(store, post)?)?;
        let content = normalize_comment(content)?;
        store.insert_comment(CommentDraft {
            owner: actor,
            post,
            content,
        })
    }

    /// Edit a comment. Comment owner only.
    pub fn update_comment<S: DocumentStore>(
        store: &mut S,
        actor: AccountId,
        post: PostId,
        id: CommentId,
        content: &str,
    ) -> Result<Comment, AgoraError> {
        let content = normalize_comment(content)?;
        with_retry(store, "update_comment", |store| {
            let mut comment = require_comment(store, post, id)?;
            if comment.owner != actor {
                return Err(AgoraError::Forbidden(
                    "Only the author may edit a comment".to_string(),
                ));
            }
            comment.content.clone_from(&content);
            store.commit_comment(&comment)
        })
    }

    /// Delete a comment. Comment owner or post owner.
    pub fn delete_comment<S: DocumentStore>(
        store: &mut S,
        actor: AccountId,
        post: PostId,
        id: CommentId,
    ) -> Result<(), AgoraError> {
        let comment = require_comment(store, post, id)?;
        if comment.owner != actor && require_post(store, post)?.owner != actor {
            return Err(AgoraError::Forbidden(
                "Only the author or the post owner may delete a comment".to_string(),
            ));
        }
        if !store.remove_comment(id)? {
            return Err(AgoraError::comment_not_found(id));
        }
        Ok(())
    }

    /// Comments on a post the viewer can see, oldest first.
    pub fn list_comments<S: DocumentStore>(
        store: &S,
        viewer: Option<AccountId>,
        post: PostId,
    ) -> Result<Vec<Comment>, AgoraError> {
        ensure_visible(viewer, &require_post(store, post)?)?;
        store.comments_for(post)
    }
}

// =============================================================================
// TESTS
// =============================================================================
