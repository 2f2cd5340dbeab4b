//! Integration tests for the Agora HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use agora::api::{
    ACCOUNT_HEADER, AccountView, ApiResponse, AppState, CommentView, ErrorBody, FollowResponse,
    HealthResponse, LikeResponse, PostView, PrivacyResponse, StatusResponse, create_router,
};
use agora::config::AgoraConfig;
use agora_core::{
    AccountSummary, DirectoryBlobStore, FollowOutcome, Page, Session, UploadRoot,
};
use axum::http::{HeaderName, HeaderValue, header};
use axum_test::TestServer;
use serde_json::json;
use std::sync::Arc;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a test server with a fresh in-memory session.
fn create_test_server() -> TestServer {
    TestServer::new(create_router(AppState::new(Session::new()))).unwrap()
}

/// Create a test server that requires `api_key`.
fn create_auth_test_server(api_key: &str) -> TestServer {
    let mut config = AgoraConfig::default();
    config.security.api_key = Some(api_key.to_string());
    let state = AppState::with_config(Session::new(), &config);
    TestServer::new(create_router(state)).unwrap()
}

fn account_header() -> HeaderName {
    HeaderName::from_static(ACCOUNT_HEADER)
}

fn as_account(id: u64) -> HeaderValue {
    id.to_string().parse::<HeaderValue>().unwrap()
}

/// Register `name` and return its id.
async fn register(server: &TestServer, name: &str) -> u64 {
    let response = server
        .post("/accounts")
        .json(&json!({
            "username": name,
            "email": format!("{}@example.com", name),
        }))
        .await;
    assert_eq!(response.status_code().as_u16(), 201);
    let body: ApiResponse<AccountView> = response.json();
    body.data.id.0
}

/// Create a post and return its id.
async fn create_post(server: &TestServer, owner: u64, title: &str, visibility: &str) -> u64 {
    let response = server
        .post("/posts")
        .add_header(account_header(), as_account(owner))
        .json(&json!({
            "title": title,
            "description": format!("About {}", title),
            "tags": ["sample"],
            "visibility": visibility,
        }))
        .await;
    assert_eq!(response.status_code().as_u16(), 201);
    let body: ApiResponse<PostView> = response.json();
    body.data.id
}

fn error_kind(response: &axum_test::TestResponse) -> String {
    let body: ErrorBody = response.json();
    assert!(!body.success);
    body.kind
}

// =============================================================================
// HEALTH / STATUS TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_status_counts_documents() {
    let server = create_test_server();

    let response = server.get("/status").await;
    response.assert_status_ok();
    let status: ApiResponse<StatusResponse> = response.json();
    assert!(!status.data.persistent);
    assert_eq!(status.data.metrics.accounts, 0);

    let alice = register(&server, "alice").await;
    let bruno = register(&server, "bruno").await;
    server
        .post(&format!("/accounts/{}/follow", bruno))
        .add_header(account_header(), as_account(alice))
        .await
        .assert_status_ok();
    create_post(&server, alice, "hello", "public").await;

    let status: ApiResponse<StatusResponse> = server.get("/status").await.json();
    assert_eq!(status.data.metrics.accounts, 2);
    assert_eq!(status.data.metrics.follow_edges, 1);
    assert_eq!(status.data.metrics.public_posts, 1);
}

// =============================================================================
// ACCOUNT TESTS
// =============================================================================

#[tokio::test]
async fn test_register_normalizes_and_rejects_duplicates() {
    let server = create_test_server();

    let response = server
        .post("/accounts")
        .json(&json!({ "username": "  Alice ", "email": "ALICE@Example.com" }))
        .await;
    assert_eq!(response.status_code().as_u16(), 201);
    let body: ApiResponse<AccountView> = response.json();
    assert_eq!(body.data.username, "alice");
    assert_eq!(body.data.email.as_deref(), Some("alice@example.com"));

    let duplicate = server
        .post("/accounts")
        .json(&json!({ "username": "alice", "email": "other@example.com" }))
        .await;
    assert_eq!(duplicate.status_code().as_u16(), 409);
    assert_eq!(error_kind(&duplicate), "conflict");

    let invalid = server
        .post("/accounts")
        .json(&json!({ "username": "no spaces allowed", "email": "x@example.com" }))
        .await;
    assert_eq!(invalid.status_code().as_u16(), 400);
    assert_eq!(error_kind(&invalid), "invalid_input");
}

#[tokio::test]
async fn test_email_only_visible_to_owner() {
    let server = create_test_server();
    let alice = register(&server, "alice").await;
    let bruno = register(&server, "bruno").await;

    let own: ApiResponse<AccountView> = server
        .get(&format!("/accounts/{}", alice))
        .add_header(account_header(), as_account(alice))
        .await
        .json();
    assert_eq!(own.data.email.as_deref(), Some("alice@example.com"));

    let other: ApiResponse<AccountView> = server
        .get(&format!("/accounts/{}", alice))
        .add_header(account_header(), as_account(bruno))
        .await
        .json();
    assert_eq!(other.data.email, None);

    let missing = server.get("/accounts/999").await;
    missing.assert_status_not_found();
    assert_eq!(error_kind(&missing), "not_found");
}

#[tokio::test]
async fn test_update_account_details() {
    let server = create_test_server();
    let alice = register(&server, "alice").await;

    let response = server
        .patch("/accounts/me")
        .add_header(account_header(), as_account(alice))
        .json(&json!({ "bio": "Hello there" }))
        .await;
    response.assert_status_ok();
    let body: ApiResponse<AccountView> = response.json();
    assert_eq!(body.data.bio, "Hello there");

    let empty = server
        .patch("/accounts/me")
        .add_header(account_header(), as_account(alice))
        .json(&json!({}))
        .await;
    assert_eq!(empty.status_code().as_u16(), 400);
}

#[tokio::test]
async fn test_profile_pic_without_media_store_fails() {
    let server = create_test_server();
    let alice = register(&server, "alice").await;

    let response = server
        .put("/accounts/me/profile-pic")
        .add_header(account_header(), as_account(alice))
        .json(&json!({ "media_path": "/nonexistent/avatar.png" }))
        .await;
    assert_eq!(response.status_code().as_u16(), 502);
    assert_eq!(error_kind(&response), "dependency_failure");
}

// =============================================================================
// FOLLOW GRAPH TESTS
// =============================================================================

#[tokio::test]
async fn test_follow_requires_acting_account() {
    let server = create_test_server();
    let bruno = register(&server, "bruno").await;

    let response = server.post(&format!("/accounts/{}/follow", bruno)).await;
    assert_eq!(response.status_code().as_u16(), 401);
    assert_eq!(error_kind(&response), "unauthorized");

    let malformed = server
        .post(&format!("/accounts/{}/follow", bruno))
        .add_header(account_header(), "alice".parse::<HeaderValue>().unwrap())
        .await;
    assert_eq!(malformed.status_code().as_u16(), 400);
}

#[tokio::test]
async fn test_self_follow_is_invalid_operation() {
    let server = create_test_server();
    let alice = register(&server, "alice").await;

    let response = server
        .post(&format!("/accounts/{}/follow", alice))
        .add_header(account_header(), as_account(alice))
        .await;
    assert_eq!(response.status_code().as_u16(), 400);
    assert_eq!(error_kind(&response), "invalid_operation");
}

#[tokio::test]
async fn test_public_follow_toggle() {
    let server = create_test_server();
    let alice = register(&server, "alice").await;
    let bruno = register(&server, "bruno").await;
    let path = format!("/accounts/{}/follow", bruno);

    let first: ApiResponse<FollowResponse> = server
        .post(&path)
        .add_header(account_header(), as_account(alice))
        .await
        .json();
    assert_eq!(first.data.outcome, FollowOutcome::Followed);
    assert!(first.data.is_following);

    let followers: ApiResponse<Page<AccountSummary>> = server
        .get(&format!("/accounts/{}/relations?kind=followers", bruno))
        .await
        .json();
    assert_eq!(followers.data.total, 1);
    assert_eq!(followers.data.items[0].username, "alice");

    let second: ApiResponse<FollowResponse> = server
        .post(&path)
        .add_header(account_header(), as_account(alice))
        .await
        .json();
    assert_eq!(second.data.outcome, FollowOutcome::Unfollowed);
    assert_eq!(second.message.as_deref(), Some("Unfollowed successfully"));
}

#[tokio::test]
async fn test_private_account_request_flow() {
    let server = create_test_server();
    let alice = register(&server, "alice").await;
    let bruno = register(&server, "bruno").await;

    let privacy: ApiResponse<PrivacyResponse> = server
        .post("/accounts/me/privacy")
        .add_header(account_header(), as_account(bruno))
        .await
        .json();
    assert!(privacy.data.is_private);

    let request: ApiResponse<FollowResponse> = server
        .post(&format!("/accounts/{}/follow", bruno))
        .add_header(account_header(), as_account(alice))
        .await
        .json();
    assert_eq!(request.data.outcome, FollowOutcome::RequestSent);

    let pending: ApiResponse<Page<AccountSummary>> = server
        .get("/accounts/me/requests")
        .add_header(account_header(), as_account(bruno))
        .await
        .json();
    assert_eq!(pending.data.total, 1);
    assert_eq!(pending.data.items[0].username, "alice");

    server
        .post(&format!("/accounts/me/requests/{}", alice))
        .add_header(account_header(), as_account(bruno))
        .json(&json!({ "accept": true }))
        .await
        .assert_status_ok();

    let again = server
        .post(&format!("/accounts/me/requests/{}", alice))
        .add_header(account_header(), as_account(bruno))
        .json(&json!({ "accept": true }))
        .await;
    again.assert_status_not_found();

    let following: ApiResponse<Page<AccountSummary>> = server
        .get(&format!("/accounts/{}/relations?kind=following", alice))
        .await
        .json();
    assert_eq!(following.data.total, 1);
    assert_eq!(following.data.items[0].username, "bruno");
}

#[tokio::test]
async fn test_reject_request() {
    let server = create_test_server();
    let alice = register(&server, "alice").await;
    let bruno = register(&server, "bruno").await;
    server
        .post("/accounts/me/privacy")
        .add_header(account_header(), as_account(bruno))
        .await
        .assert_status_ok();
    server
        .post(&format!("/accounts/{}/follow", bruno))
        .add_header(account_header(), as_account(alice))
        .await
        .assert_status_ok();

    server
        .post(&format!("/accounts/me/requests/{}", alice))
        .add_header(account_header(), as_account(bruno))
        .json(&json!({ "accept": false }))
        .await
        .assert_status_ok();

    let profile: ApiResponse<AccountView> = server
        .get(&format!("/accounts/{}", bruno))
        .add_header(account_header(), as_account(alice))
        .await
        .json();
    assert_eq!(profile.data.followers, 0);
    assert!(!profile.data.requested_by_viewer);
}

#[tokio::test]
async fn test_unknown_relation_kind_rejected() {
    let server = create_test_server();
    let alice = register(&server, "alice").await;

    let response = server
        .get(&format!("/accounts/{}/relations?kind=friends", alice))
        .await;
    assert_eq!(response.status_code().as_u16(), 400);
}

#[tokio::test]
async fn test_suggestions_skip_followed_and_private() {
    let server = create_test_server();
    let me = register(&server, "me").await;
    let followed = register(&server, "followed").await;
    let hidden = register(&server, "hidden").await;
    register(&server, "open").await;

    server
        .post(&format!("/accounts/{}/follow", followed))
        .add_header(account_header(), as_account(me))
        .await
        .assert_status_ok();
    server
        .post("/accounts/me/privacy")
        .add_header(account_header(), as_account(hidden))
        .await
        .assert_status_ok();

    let suggestions: ApiResponse<Vec<AccountSummary>> = server
        .get("/accounts/me/suggestions")
        .add_header(account_header(), as_account(me))
        .await
        .json();
    let names: Vec<_> = suggestions
        .data
        .iter()
        .map(|s| s.username.as_str())
        .collect();
    assert_eq!(names, vec!["open"]);
}

// =============================================================================
// POST TESTS
// =============================================================================

#[tokio::test]
async fn test_post_visibility() {
    let server = create_test_server();
    let owner = register(&server, "owner").await;
    let other = register(&server, "other").await;
    let public = create_post(&server, owner, "open", "public").await;
    let private = create_post(&server, owner, "closed", "private").await;

    server
        .get(&format!("/posts/{}", public))
        .await
        .assert_status_ok();

    let anonymous = server.get(&format!("/posts/{}", private)).await;
    assert_eq!(anonymous.status_code().as_u16(), 403);
    assert_eq!(error_kind(&anonymous), "forbidden");

    let stranger = server
        .get(&format!("/posts/{}", private))
        .add_header(account_header(), as_account(other))
        .await;
    assert_eq!(stranger.status_code().as_u16(), 403);

    server
        .get(&format!("/posts/{}", private))
        .add_header(account_header(), as_account(owner))
        .await
        .assert_status_ok();

    server.get("/posts/999").await.assert_status_not_found();
}

#[tokio::test]
async fn test_create_post_requires_title() {
    let server = create_test_server();
    let owner = register(&server, "owner").await;

    let response = server
        .post("/posts")
        .add_header(account_header(), as_account(owner))
        .json(&json!({ "title": "   " }))
        .await;
    assert_eq!(response.status_code().as_u16(), 400);
}

#[tokio::test]
async fn test_list_posts_filters_and_paginates() {
    let server = create_test_server();
    let owner = register(&server, "owner").await;
    for i in 0..5 {
        create_post(&server, owner, &format!("rust post {}", i), "public").await;
    }
    create_post(&server, owner, "bread", "public").await;
    create_post(&server, owner, "secret rust", "private").await;

    let all: ApiResponse<Page<PostView>> = server.get("/posts").await.json();
    assert_eq!(all.data.total, 6);
    assert_eq!(all.data.items[0].title, "bread");

    let page: ApiResponse<Page<PostView>> = server
        .get("/posts?search=rust&page=2&limit=2&sort_by=title&order=asc")
        .await
        .json();
    assert_eq!(page.data.total, 5);
    assert_eq!(page.data.total_pages, 3);
    let titles: Vec<_> = page.data.items.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["rust post 2", "rust post 3"]);

    let bad = server.get("/posts?limit=0").await;
    assert_eq!(bad.status_code().as_u16(), 400);
    let bad_sort = server.get("/posts?sort_by=views").await;
    assert_eq!(bad_sort.status_code().as_u16(), 400);
}

#[tokio::test]
async fn test_search_shapes_personalized_feed() {
    let server = create_test_server();
    let author = register(&server, "author").await;
    let reader = register(&server, "reader").await;
    create_post(&server, author, "Learning rust", "public").await;
    create_post(&server, author, "Baking bread", "public").await;

    // Without history the feed is the public listing.
    let feed: ApiResponse<Page<PostView>> = server
        .get("/posts/feed")
        .add_header(account_header(), as_account(reader))
        .await
        .json();
    assert_eq!(feed.data.total, 2);

    server
        .get("/posts?search=bread")
        .add_header(account_header(), as_account(reader))
        .await
        .assert_status_ok();

    let feed: ApiResponse<Page<PostView>> = server
        .get("/posts/feed")
        .add_header(account_header(), as_account(reader))
        .await
        .json();
    assert_eq!(feed.data.total, 1);
    assert_eq!(feed.data.items[0].title, "Baking bread");

    let status: ApiResponse<StatusResponse> = server.get("/status").await.json();
    assert_eq!(status.data.metrics.search_records, 1);

    let anonymous = server.get("/posts/feed").await;
    assert_eq!(anonymous.status_code().as_u16(), 401);
}

#[tokio::test]
async fn test_unknown_viewer_is_not_found() {
    let server = create_test_server();
    let author = register(&server, "author").await;
    create_post(&server, author, "Learning rust", "public").await;
    let ghost = author + 1000;

    let search = server
        .get("/posts?search=rust")
        .add_header(account_header(), as_account(ghost))
        .await;
    assert_eq!(search.status_code().as_u16(), 404);

    let feed = server
        .get("/posts/feed")
        .add_header(account_header(), as_account(ghost))
        .await;
    assert_eq!(feed.status_code().as_u16(), 404);

    let status: ApiResponse<StatusResponse> = server.get("/status").await.json();
    assert_eq!(status.data.metrics.search_records, 0);
}

#[tokio::test]
async fn test_update_and_delete_post_owner_only() {
    let server = create_test_server();
    let owner = register(&server, "owner").await;
    let other = register(&server, "other").await;
    let post = create_post(&server, owner, "draft", "public").await;
    let path = format!("/posts/{}", post);

    let forbidden = server
        .patch(&path)
        .add_header(account_header(), as_account(other))
        .json(&json!({ "title": "hijacked" }))
        .await;
    assert_eq!(forbidden.status_code().as_u16(), 403);

    let updated: ApiResponse<PostView> = server
        .patch(&path)
        .add_header(account_header(), as_account(owner))
        .json(&json!({ "title": "final", "visibility": "private" }))
        .await
        .json();
    assert_eq!(updated.data.title, "final");
    assert_eq!(updated.data.description, "About draft");

    let forbidden = server
        .delete(&path)
        .add_header(account_header(), as_account(other))
        .await;
    assert_eq!(forbidden.status_code().as_u16(), 403);

    server
        .delete(&path)
        .add_header(account_header(), as_account(owner))
        .await
        .assert_status_ok();
    server
        .get(&path)
        .add_header(account_header(), as_account(owner))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_like_toggle() {
    let server = create_test_server();
    let owner = register(&server, "owner").await;
    let fan = register(&server, "fan").await;
    let post = create_post(&server, owner, "likeable", "public").await;
    let path = format!("/posts/{}/like", post);

    let liked: ApiResponse<LikeResponse> = server
        .post(&path)
        .add_header(account_header(), as_account(fan))
        .await
        .json();
    assert!(liked.data.liked);

    let view: ApiResponse<PostView> = server
        .get(&format!("/posts/{}", post))
        .add_header(account_header(), as_account(fan))
        .await
        .json();
    assert_eq!(view.data.likes, 1);
    assert!(view.data.liked_by_viewer);

    let unliked: ApiResponse<LikeResponse> = server
        .post(&path)
        .add_header(account_header(), as_account(fan))
        .await
        .json();
    assert!(!unliked.data.liked);
}

#[tokio::test]
async fn test_post_media_upload() {
    let media = tempfile::tempdir().unwrap();
    let upload = tempfile::tempdir().unwrap();
    let local = upload.path().join("photo.png");
    std::fs::write(&local, b"not really a png").unwrap();

    let blobs = DirectoryBlobStore::open(media.path(), "http://cdn.test/media").unwrap();
    let session = Session::new()
        .with_blob_store(Arc::new(blobs))
        .with_upload_root(UploadRoot::open(upload.path()).unwrap());
    let server = TestServer::new(create_router(AppState::new(session))).unwrap();
    let owner = register(&server, "owner").await;

    let response = server
        .post("/posts")
        .add_header(account_header(), as_account(owner))
        .json(&json!({ "title": "with media", "media_path": local }))
        .await;
    assert_eq!(response.status_code().as_u16(), 201);
    let body: ApiResponse<PostView> = response.json();
    let url = body.data.media_url.expect("media url");
    assert!(url.starts_with("http://cdn.test/media/"));
    assert_eq!(body.data.media_type, agora_core::MediaType::Image);
}

#[tokio::test]
async fn test_media_paths_outside_upload_dir_are_rejected() {
    let media = tempfile::tempdir().unwrap();
    let upload = tempfile::tempdir().unwrap();
    let elsewhere = tempfile::tempdir().unwrap();
    let secret = elsewhere.path().join("secret.png");
    std::fs::write(&secret, b"private").unwrap();

    let blobs = DirectoryBlobStore::open(media.path(), "http://cdn.test/media").unwrap();
    let session = Session::new()
        .with_blob_store(Arc::new(blobs))
        .with_upload_root(UploadRoot::open(upload.path()).unwrap());
    let server = TestServer::new(create_router(AppState::new(session))).unwrap();
    let owner = register(&server, "owner").await;

    let response = server
        .post("/posts")
        .add_header(account_header(), as_account(owner))
        .json(&json!({ "title": "exfiltrate", "media_path": secret }))
        .await;
    assert_eq!(response.status_code().as_u16(), 400);
    assert_eq!(error_kind(&response), "invalid_input");

    let response = server
        .put("/accounts/me/profile-pic")
        .add_header(account_header(), as_account(owner))
        .json(&json!({ "media_path": "/etc/passwd" }))
        .await;
    assert_eq!(response.status_code().as_u16(), 400);

    let response = server
        .post("/accounts")
        .json(&json!({
            "username": "mallory",
            "email": "mallory@example.com",
            "profile_pic_path": "../../etc/passwd"
        }))
        .await;
    assert_eq!(response.status_code().as_u16(), 400);

    assert_eq!(std::fs::read_dir(media.path()).unwrap().count(), 0);
}

// =============================================================================
// COMMENT TESTS
// =============================================================================

#[tokio::test]
async fn test_comment_lifecycle() {
    let server = create_test_server();
    let owner = register(&server, "owner").await;
    let guest = register(&server, "guest").await;
    let post = create_post(&server, owner, "discuss", "public").await;
    let comments = format!("/posts/{}/comments", post);

    let response = server
        .post(&comments)
        .add_header(account_header(), as_account(guest))
        .json(&json!({ "content": "first!" }))
        .await;
    assert_eq!(response.status_code().as_u16(), 201);
    let comment: ApiResponse<CommentView> = response.json();
    let comment_path = format!("{}/{}", comments, comment.data.id);

    let forbidden = server
        .patch(&comment_path)
        .add_header(account_header(), as_account(owner))
        .json(&json!({ "content": "edited by someone else" }))
        .await;
    assert_eq!(forbidden.status_code().as_u16(), 403);

    let edited: ApiResponse<CommentView> = server
        .patch(&comment_path)
        .add_header(account_header(), as_account(guest))
        .json(&json!({ "content": "second thoughts" }))
        .await
        .json();
    assert_eq!(edited.data.content, "second thoughts");

    let listed: ApiResponse<Vec<CommentView>> = server.get(&comments).await.json();
    assert_eq!(listed.data.len(), 1);

    // The post owner may delete comments on their post.
    server
        .delete(&comment_path)
        .add_header(account_header(), as_account(owner))
        .await
        .assert_status_ok();
    let listed: ApiResponse<Vec<CommentView>> = server.get(&comments).await.json();
    assert!(listed.data.is_empty());
}

#[tokio::test]
async fn test_comments_on_private_post_hidden() {
    let server = create_test_server();
    let owner = register(&server, "owner").await;
    let post = create_post(&server, owner, "hidden", "private").await;

    let response = server.get(&format!("/posts/{}/comments", post)).await;
    assert_eq!(response.status_code().as_u16(), 403);
}

// =============================================================================
// ERROR HANDLING TESTS
// =============================================================================

#[tokio::test]
async fn test_404_on_unknown_endpoint() {
    let server = create_test_server();
    server.get("/unknown").await.assert_status_not_found();
}

#[tokio::test]
async fn test_method_not_allowed() {
    let server = create_test_server();
    let response = server.post("/health").await;
    assert_eq!(response.status_code().as_u16(), 405);
}

#[tokio::test]
async fn test_invalid_json_body() {
    let server = create_test_server();
    let response = server
        .post("/accounts")
        .text("not valid json")
        .content_type("application/json")
        .await;
    assert!(response.status_code().is_client_error());
}

// =============================================================================
// AUTHENTICATION MIDDLEWARE TESTS
// =============================================================================

#[tokio::test]
async fn test_auth_valid_bearer_token() {
    let api_key = "test-secret-key-12345";
    let server = create_auth_test_server(api_key);

    let response = server
        .get("/status")
        .add_header(
            header::AUTHORIZATION,
            format!("Bearer {}", api_key).parse::<HeaderValue>().unwrap(),
        )
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_invalid_token_rejected() {
    let server = create_auth_test_server("correct-key");

    let response = server
        .get("/status")
        .add_header(
            header::AUTHORIZATION,
            "Bearer wrong-key".parse::<HeaderValue>().unwrap(),
        )
        .await;
    assert_eq!(
        response.status_code().as_u16(),
        401,
        "Invalid token should return 401 Unauthorized"
    );
}

#[tokio::test]
async fn test_auth_missing_header_rejected() {
    let server = create_auth_test_server("required-key");

    let response = server.get("/posts").await;
    assert_eq!(
        response.status_code().as_u16(),
        401,
        "Missing Authorization header should return 401 Unauthorized"
    );
}

#[tokio::test]
async fn test_auth_health_endpoint_bypasses_auth() {
    let server = create_auth_test_server("secret-key-for-bypass-test");

    let response = server.get("/health").await;
    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn test_auth_bearer_prefix_only_rejected() {
    let server = create_auth_test_server("actual-key");

    let response = server
        .get("/status")
        .add_header(
            header::AUTHORIZATION,
            "Bearer ".parse::<HeaderValue>().unwrap(),
        )
        .await;
    assert_eq!(response.status_code().as_u16(), 401);
}
