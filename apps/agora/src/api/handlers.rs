//! # API Endpoint Handlers
//!
//! Each handler takes the session lock, calls one engine operation and maps
//! the result. Engine errors become [`ApiError`] responses.

use super::{
    AppState,
    auth::{MaybePrincipal, Principal},
    types::{
        AccountView, ApiError, ApiResponse, CommentRequest, CommentView, CreatePostRequest,
        FollowResponse, HealthResponse, LikeResponse, ListPostsParams, MediaRequest, PageParams,
        PostView, PrivacyResponse, RegisterRequest, RelationParams, ResolveRequest,
        StatusResponse, SuggestParams, UpdateAccountRequest, UpdatePostRequest,
    },
};
use agora_core::{
    AccountDraft, AccountId, AccountPatch, AccountSummary, CommentId, Page, PageRequest, PostId,
    RelationKind, RequestDecision,
    primitives::{DEFAULT_SUGGESTION_LIMIT, MAX_PAGE_LIMIT},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Store metrics.
pub async fn status_handler(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let session = state.session.read().await;
    let response = StatusResponse {
        persistent: session.is_persistent(),
        metrics: session.metrics()?,
    };
    Ok(ApiResponse::ok(response))
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// Register a new account.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let draft = AccountDraft {
        username: request.username,
        email: request.email,
        bio: request.bio,
        profile_pic: None,
    };
    let mut session = state.session.write().await;
    let account = session.register(draft, request.profile_pic_path.as_deref())?;
    tracing::info!(account = %account.id, username = %account.username, "Account registered");
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(
            AccountView::new(&account, Some(account.id)),
            "Account registered successfully",
        ),
    ))
}

/// Public profile of an account.
pub async fn get_account_handler(
    State(state): State<AppState>,
    MaybePrincipal(viewer): MaybePrincipal,
    Path(id): Path<u64>,
) -> ApiResult<impl IntoResponse> {
    let session = state.session.read().await;
    let account = session.account(AccountId(id))?;
    Ok(ApiResponse::ok(AccountView::new(&account, viewer)))
}

/// Update username, email or bio of the acting account.
pub async fn update_account_handler(
    State(state): State<AppState>,
    Principal(actor): Principal,
    Json(request): Json<UpdateAccountRequest>,
) -> ApiResult<impl IntoResponse> {
    let patch = AccountPatch::from(request);
    let mut session = state.session.write().await;
    let account = session.update_details(actor, &patch)?;
    Ok(ApiResponse::with_message(
        AccountView::new(&account, Some(actor)),
        "Account details updated successfully",
    ))
}

/// Replace the acting account's profile picture.
pub async fn profile_pic_handler(
    State(state): State<AppState>,
    Principal(actor): Principal,
    Json(request): Json<MediaRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut session = state.session.write().await;
    let account = session.update_profile_pic(actor, &request.media_path)?;
    Ok(ApiResponse::with_message(
        AccountView::new(&account, Some(actor)),
        "Profile picture updated successfully",
    ))
}

/// Flip the acting account between public and private.
pub async fn privacy_handler(
    State(state): State<AppState>,
    Principal(actor): Principal,
) -> ApiResult<impl IntoResponse> {
    let mut session = state.session.write().await;
    let is_private = session.toggle_privacy(actor)?;
    Ok(ApiResponse::ok(PrivacyResponse { is_private }))
}

// =============================================================================
// FOLLOW GRAPH
// =============================================================================

/// Follow, unfollow, request or cancel, depending on the current state.
pub async fn follow_handler(
    State(state): State<AppState>,
    Principal(actor): Principal,
    Path(target): Path<u64>,
) -> ApiResult<impl IntoResponse> {
    let mut session = state.session.write().await;
    let outcome = session.request_or_toggle_follow(actor, AccountId(target))?;
    Ok(ApiResponse::with_message(
        FollowResponse {
            outcome,
            is_following: outcome.is_following(),
        },
        outcome.message(),
    ))
}

/// Accept or reject a pending request on the acting account.
pub async fn resolve_request_handler(
    State(state): State<AppState>,
    Principal(owner): Principal,
    Path(requester): Path<u64>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<impl IntoResponse> {
    let decision = RequestDecision::from_accept(request.accept);
    let mut session = state.session.write().await;
    session.resolve_follow_request(owner, AccountId(requester), decision)?;
    let message = match decision {
        RequestDecision::Accepted => "Follow request accepted",
        RequestDecision::Rejected => "Follow request rejected",
    };
    Ok(ApiResponse::with_message(decision, message))
}

/// Inbound follow requests of the acting account.
pub async fn pending_requests_handler(
    State(state): State<AppState>,
    Principal(owner): Principal,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<ApiResponse<Page<AccountSummary>>>> {
    let page = params.to_request()?;
    let session = state.session.read().await;
    Ok(ApiResponse::ok(session.pending_requests(owner, page)?))
}

/// Followers or followees of any account.
pub async fn relations_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(params): Query<RelationParams>,
) -> ApiResult<Json<ApiResponse<Page<AccountSummary>>>> {
    let kind = match params.kind.as_deref() {
        Some(raw) => RelationKind::parse(raw).ok_or_else(|| {
            ApiError::bad_request(format!(
                "Unknown relation '{}', expected followers or following",
                raw
            ))
        })?,
        None => RelationKind::Followers,
    };
    let page = PageRequest::from_parts(params.page, params.limit)?;
    let session = state.session.read().await;
    Ok(ApiResponse::ok(session.list_relations(
        AccountId(id),
        kind,
        params.search.as_deref(),
        page,
    )?))
}

/// Public accounts the acting account does not follow yet.
pub async fn suggestions_handler(
    State(state): State<AppState>,
    Principal(actor): Principal,
    Query(params): Query<SuggestParams>,
) -> ApiResult<Json<ApiResponse<Vec<AccountSummary>>>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SUGGESTION_LIMIT)
        .min(MAX_PAGE_LIMIT as usize);
    let session = state.session.read().await;
    Ok(ApiResponse::ok(session.suggest(actor, limit)?))
}

// =============================================================================
// POSTS
// =============================================================================

/// Create a post owned by the acting account.
pub async fn create_post_handler(
    State(state): State<AppState>,
    Principal(owner): Principal,
    Json(request): Json<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    let (input, media) = request.into_parts();
    let mut session = state.session.write().await;
    let post = session.create_post(owner, input, media.as_deref())?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(
            PostView::new(post, Some(owner)),
            "Post created successfully",
        ),
    ))
}

/// Public listing with text, tag and media filters.
pub async fn list_posts_handler(
    State(state): State<AppState>,
    MaybePrincipal(viewer): MaybePrincipal,
    Query(params): Query<ListPostsParams>,
) -> ApiResult<Json<ApiResponse<Page<PostView>>>> {
    let (query, sort, page) = params.parse()?;
    // Write lock: authenticated text searches are recorded.
    let mut session = state.session.write().await;
    let posts = session.list_public(viewer, &query, sort, page)?;
    Ok(ApiResponse::ok(posts.map(|p| PostView::new(p, viewer))))
}

/// Personalized feed of the acting account.
pub async fn feed_handler(
    State(state): State<AppState>,
    Principal(user): Principal,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<ApiResponse<Page<PostView>>>> {
    let page = params.to_request()?;
    let session = state.session.read().await;
    let posts = session.personalized_feed(user, page)?;
    Ok(ApiResponse::ok(posts.map(|p| PostView::new(p, Some(user)))))
}

/// A single post, subject to visibility.
pub async fn get_post_handler(
    State(state): State<AppState>,
    MaybePrincipal(viewer): MaybePrincipal,
    Path(id): Path<u64>,
) -> ApiResult<Json<ApiResponse<PostView>>> {
    let session = state.session.read().await;
    let post = session.get_post(viewer, PostId(id))?;
    Ok(ApiResponse::ok(PostView::new(post, viewer)))
}

/// Edit a post. Owner only.
pub async fn update_post_handler(
    State(state): State<AppState>,
    Principal(actor): Principal,
    Path(id): Path<u64>,
    Json(request): Json<UpdatePostRequest>,
) -> ApiResult<Json<ApiResponse<PostView>>> {
    let (patch, media) = request.into_parts();
    let mut session = state.session.write().await;
    let post = session.update_post(actor, PostId(id), &patch, media.as_deref())?;
    Ok(ApiResponse::with_message(
        PostView::new(post, Some(actor)),
        "Post updated successfully",
    ))
}

/// Delete a post and its comments. Owner only.
pub async fn delete_post_handler(
    State(state): State<AppState>,
    Principal(actor): Principal,
    Path(id): Path<u64>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let mut session = state.session.write().await;
    session.delete_post(actor, PostId(id))?;
    Ok(ApiResponse::with_message((), "Post deleted successfully"))
}

/// Like or unlike a post.
pub async fn like_handler(
    State(state): State<AppState>,
    Principal(actor): Principal,
    Path(id): Path<u64>,
) -> ApiResult<Json<ApiResponse<LikeResponse>>> {
    let mut session = state.session.write().await;
    let liked = session.toggle_like(actor, PostId(id))?;
    Ok(ApiResponse::ok(LikeResponse { liked }))
}

// =============================================================================
// COMMENTS
// =============================================================================

/// Comments of a visible post, oldest first.
pub async fn list_comments_handler(
    State(state): State<AppState>,
    MaybePrincipal(viewer): MaybePrincipal,
    Path(post): Path<u64>,
) -> ApiResult<Json<ApiResponse<Vec<CommentView>>>> {
    let session = state.session.read().await;
    let comments = session.list_comments(viewer, PostId(post))?;
    Ok(ApiResponse::ok(
        comments.into_iter().map(CommentView::from).collect(),
    ))
}

/// Comment on a post.
pub async fn add_comment_handler(
    State(state): State<AppState>,
    Principal(actor): Principal,
    Path(post): Path<u64>,
    Json(request): Json<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut session = state.session.write().await;
    let comment = session.add_comment(actor, PostId(post), &request.content)?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(CommentView::from(comment), "Comment added successfully"),
    ))
}

/// Edit a comment. Comment owner only.
pub async fn update_comment_handler(
    State(state): State<AppState>,
    Principal(actor): Principal,
    Path((post, id)): Path<(u64, u64)>,
    Json(request): Json<CommentRequest>,
) -> ApiResult<Json<ApiResponse<CommentView>>> {
    let mut session = state.session.write().await;
    let comment = session.update_comment(actor, PostId(post), CommentId(id), &request.content)?;
    Ok(ApiResponse::with_message(
        CommentView::from(comment),
        "Comment updated successfully",
    ))
}

/// Delete a comment. Comment owner or post owner.
pub async fn delete_comment_handler(
    State(state): State<AppState>,
    Principal(actor): Principal,
    Path((post, id)): Path<(u64, u64)>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let mut session = state.session.write().await;
    session.delete_comment(actor, PostId(post), CommentId(id))?;
    Ok(ApiResponse::with_message((), "Comment deleted successfully"))
}
