//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use agora_core::{
    Account, AccountId, AccountPatch, AgoraError, Comment, MediaType, NewPost, PageRequest, Post,
    PostPatch, PublicPostQuery, Sort, SortKey, SortOrder, StoreMetrics, TagFilter, TextQuery,
    Visibility,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// ENVELOPES
// =============================================================================

/// Successful response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data,
        })
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub kind: String,
    pub message: String,
}

/// An error leaving the HTTP layer.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: "unauthorized",
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_input",
            message: message.into(),
        }
    }
}

impl From<AgoraError> for ApiError {
    fn from(err: AgoraError) -> Self {
        let status = StatusCode::from_u16(err.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let kind = match err.kind() {
            agora_core::ErrorKind::NotFound => "not_found",
            agora_core::ErrorKind::InvalidOperation => "invalid_operation",
            agora_core::ErrorKind::InvalidInput => "invalid_input",
            agora_core::ErrorKind::Forbidden => "forbidden",
            agora_core::ErrorKind::Conflict => "conflict",
            agora_core::ErrorKind::DependencyFailure => "dependency_failure",
        };
        if status.is_server_error() {
            tracing::error!(kind, error = %err, "Request failed");
        }
        Self {
            status,
            kind,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            kind: self.kind.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub persistent: bool,
    #[serde(flatten)]
    pub metrics: StoreMetrics,
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// Account registration request.
///
/// `profile_pic_path` names a file already staged on this host by the
/// upload gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_pic_path: Option<PathBuf>,
}

/// Account details update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl From<UpdateAccountRequest> for AccountPatch {
    fn from(request: UpdateAccountRequest) -> Self {
        Self {
            username: request.username,
            email: request.email,
            bio: request.bio,
        }
    }
}

/// Staged media file for profile pictures and posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRequest {
    pub media_path: PathBuf,
}

/// Resolution of a pending follow request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub accept: bool,
}

/// Account as seen by a viewer. `email` is only shown to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub id: AccountId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub bio: String,
    pub profile_pic: Option<String>,
    pub is_private: bool,
    pub followers: usize,
    pub following: usize,
    /// Whether the viewer follows this account.
    pub followed_by_viewer: bool,
    /// Whether the viewer has a pending request on this account.
    pub requested_by_viewer: bool,
}

impl AccountView {
    #[must_use]
    pub fn new(account: &Account, viewer: Option<AccountId>) -> Self {
        let is_self = viewer == Some(account.id);
        Self {
            id: account.id,
            username: account.username.clone(),
            email: is_self.then(|| account.email.clone()),
            bio: account.bio.clone(),
            profile_pic: account.profile_pic.clone(),
            is_private: account.is_private,
            followers: account.followers.len(),
            following: account.following.len(),
            followed_by_viewer: viewer.is_some_and(|v| account.is_followed_by(v)),
            requested_by_viewer: viewer.is_some_and(|v| account.has_request_from(v)),
        }
    }
}

/// Result of a follow toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowResponse {
    pub outcome: agora_core::FollowOutcome,
    pub is_following: bool,
}

/// Result of a privacy toggle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrivacyResponse {
    pub is_private: bool,
}

/// `?page=&limit=`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn to_request(self) -> Result<PageRequest, AgoraError> {
        PageRequest::from_parts(self.page, self.limit)
    }
}

/// `?kind=followers|following&search=&page=&limit=`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationParams {
    pub kind: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// `?limit=`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SuggestParams {
    pub limit: Option<usize>,
}

// =============================================================================
// POSTS
// =============================================================================

/// New post request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub media_path: Option<PathBuf>,
}

impl CreatePostRequest {
    pub fn into_parts(self) -> (NewPost, Option<PathBuf>) {
        (
            NewPost {
                title: self.title,
                description: self.description,
                content: self.content,
                tags: self.tags,
                visibility: self.visibility,
            },
            self.media_path,
        )
    }
}

/// Post update request. Absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub media_path: Option<PathBuf>,
}

impl UpdatePostRequest {
    pub fn into_parts(self) -> (PostPatch, Option<PathBuf>) {
        (
            PostPatch {
                title: self.title,
                description: self.description,
                content: self.content,
                tags: self.tags,
                visibility: self.visibility,
            },
            self.media_path,
        )
    }
}

/// Post as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    pub id: u64,
    pub owner: u64,
    pub title: String,
    pub description: String,
    pub content: String,
    pub media_type: MediaType,
    pub media_url: Option<String>,
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub likes: usize,
    pub liked_by_viewer: bool,
    pub created: u64,
    pub updated: u64,
}

impl PostView {
    #[must_use]
    pub fn new(post: Post, viewer: Option<AccountId>) -> Self {
        Self {
            id: post.id.0,
            owner: post.owner.0,
            liked_by_viewer: viewer.is_some_and(|v| post.likes.contains(&v)),
            likes: post.likes.len(),
            title: post.title,
            description: post.description,
            content: post.content,
            media_type: post.media_type,
            media_url: post.media_url,
            tags: post.tags,
            visibility: post.visibility,
            created: post.created.value(),
            updated: post.updated.value(),
        }
    }
}

/// Result of a like toggle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
}

/// `GET /posts` query string.
///
/// `tags` is comma-separated; `sort_by` is one of created, updated, likes,
/// title, relevance; `order` is asc or desc.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPostsParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub tags: Option<String>,
    pub media_type: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

impl ListPostsParams {
    /// Validate into a query, a sort and a page request.
    pub fn parse(&self) -> Result<(PublicPostQuery, Sort, PageRequest), AgoraError> {
        let text = match self.search.as_deref() {
            Some(text) => TextQuery::parse(text)?,
            None => None,
        };
        let tags = match self.tags.as_deref() {
            Some(tags) => TagFilter::new(tags.split(','))?,
            None => None,
        };
        let media_type = match self.media_type.as_deref() {
            Some(raw) => Some(MediaType::parse(raw).ok_or_else(|| {
                AgoraError::InvalidInput(format!("Unknown media type '{}'", raw))
            })?),
            None => None,
        };
        let key = match self.sort_by.as_deref() {
            Some(raw) => SortKey::parse(raw)
                .ok_or_else(|| AgoraError::InvalidInput(format!("Unknown sort key '{}'", raw)))?,
            None => SortKey::default(),
        };
        let order = match self.order.as_deref() {
            Some(raw) => SortOrder::parse(raw)
                .ok_or_else(|| AgoraError::InvalidInput(format!("Unknown sort order '{}'", raw)))?,
            None => SortOrder::default(),
        };
        let page = PageRequest::from_parts(self.page, self.limit)?;
        Ok((
            PublicPostQuery {
                text,
                tags,
                media_type,
            },
            Sort::new(key, order),
            page,
        ))
    }
}

// =============================================================================
// COMMENTS
// =============================================================================

/// New or edited comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

/// Comment as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: u64,
    pub owner: u64,
    pub post: u64,
    pub content: String,
    pub created: u64,
    pub updated: u64,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id.0,
            owner: comment.owner.0,
            post: comment.post.0,
            content: comment.content,
            created: comment.created.value(),
            updated: comment.updated.value(),
        }
    }
}
