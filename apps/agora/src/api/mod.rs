//! # Agora HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check (never requires the API key)
//! - `GET /status` - Store metrics
//! - `POST /accounts` - Register an account
//! - `GET /accounts/{id}` - Account profile
//! - `PATCH /accounts/me` - Update account details
//! - `PUT /accounts/me/profile-pic` - Replace the profile picture
//! - `POST /accounts/me/privacy` - Toggle privacy
//! - `POST /accounts/{id}/follow` - Follow / unfollow / request / cancel
//! - `GET /accounts/me/requests` - Pending follow requests
//! - `POST /accounts/me/requests/{id}` - Accept or reject a request
//! - `GET /accounts/{id}/relations` - Followers or following
//! - `GET /accounts/me/suggestions` - Accounts to follow
//! - `POST /posts`, `GET /posts` - Create, list public posts
//! - `GET /posts/feed` - Personalized feed
//! - `GET|PATCH|DELETE /posts/{id}` - Read, edit, delete a post
//! - `POST /posts/{id}/like` - Toggle like
//! - `GET|POST /posts/{id}/comments` - List, add comments
//! - `PATCH|DELETE /posts/{id}/comments/{cid}` - Edit, delete a comment
//!
//! ## Security Configuration
//!
//! - `[security] cors_origins` / `AGORA_CORS_ORIGINS`: allowed origins, or "*" for all (default: localhost only)
//! - `[security] api_key` / `AGORA_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod types;

pub use auth::{ACCOUNT_HEADER, MaybePrincipal, Principal};
pub use types::{
    AccountView, ApiError, ApiResponse, CommentRequest, CommentView, CreatePostRequest,
    ErrorBody, FollowResponse, HealthResponse, LikeResponse, ListPostsParams, MediaRequest,
    PageParams, PostView, PrivacyResponse, RegisterRequest, RelationParams, ResolveRequest,
    StatusResponse, SuggestParams, UpdateAccountRequest, UpdatePostRequest,
};

use crate::config::{AgoraConfig, DEFAULT_BODY_LIMIT};
use agora_core::{AgoraError, Session};
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the session and the HTTP settings.
#[derive(Clone)]
pub struct AppState {
    /// The session containing the document and blob stores.
    pub session: Arc<RwLock<Session>>,
    /// Bearer key; `None` disables authentication.
    pub api_key: Option<Arc<str>>,
    /// Allowed CORS origins (empty = localhost only).
    pub cors_origins: Arc<[String]>,
    pub body_limit: usize,
}

impl AppState {
    /// Create app state with default settings: no API key, localhost CORS.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
            api_key: None,
            cors_origins: Arc::from(Vec::new()),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Create app state using the `[server]` and `[security]` settings.
    #[must_use]
    pub fn with_config(session: Session, config: &AgoraConfig) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
            api_key: config.security.api_key().map(Arc::from),
            cors_origins: Arc::from(config.security.cors_origins.clone()),
            body_limit: config.server.body_limit_bytes,
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

fn allowed_headers() -> [HeaderName; 3] {
    [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(ACCOUNT_HEADER),
    ]
}

/// Build the CORS layer.
///
/// - `["*"]`: allows all origins (development mode - use with caution!)
/// - empty: localhost only
/// - otherwise: the listed origins; invalid entries are skipped
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
        return CorsLayer::permissive();
    }
    if origins.is_empty() {
        tracing::info!("CORS: No origins configured, defaulting to localhost only");
        return build_localhost_cors();
    }

    let allowed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(hv) => {
                tracing::info!("CORS: Allowing origin: {}", origin);
                Some(hv)
            }
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if allowed_origins.is_empty() {
        tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
        build_localhost_cors()
    } else {
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods(ALLOWED_METHODS)
            .allow_headers(allowed_headers())
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(allowed_headers())
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Authentication - validates API key (if configured)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.cors_origins);

    let has_auth = state.api_key.is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set AGORA_API_KEY to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        // Accounts
        .route("/accounts", post(handlers::register_handler))
        .route(
            "/accounts/me",
            axum::routing::patch(handlers::update_account_handler),
        )
        .route(
            "/accounts/me/profile-pic",
            axum::routing::put(handlers::profile_pic_handler),
        )
        .route("/accounts/me/privacy", post(handlers::privacy_handler))
        .route(
            "/accounts/me/requests",
            get(handlers::pending_requests_handler),
        )
        .route(
            "/accounts/me/requests/{id}",
            post(handlers::resolve_request_handler),
        )
        .route(
            "/accounts/me/suggestions",
            get(handlers::suggestions_handler),
        )
        .route("/accounts/{id}", get(handlers::get_account_handler))
        .route("/accounts/{id}/follow", post(handlers::follow_handler))
        .route("/accounts/{id}/relations", get(handlers::relations_handler))
        // Posts
        .route(
            "/posts",
            get(handlers::list_posts_handler).post(handlers::create_post_handler),
        )
        .route("/posts/feed", get(handlers::feed_handler))
        .route(
            "/posts/{id}",
            get(handlers::get_post_handler)
                .patch(handlers::update_post_handler)
                .delete(handlers::delete_post_handler),
        )
        .route("/posts/{id}/like", post(handlers::like_handler))
        .route(
            "/posts/{id}/comments",
            get(handlers::list_comments_handler).post(handlers::add_comment_handler),
        )
        .route(
            "/posts/{id}/comments/{cid}",
            axum::routing::patch(handlers::update_comment_handler)
                .delete(handlers::delete_comment_handler),
        );

    // Authentication is innermost: it runs last on the request.
    if has_auth {
        router = router.layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::api_key_auth_middleware,
        ));
    }

    let body_limit = state.body_limit;
    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::extract::DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve `state` on `addr` until Ctrl+C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), AgoraError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AgoraError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Agora HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AgoraError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
