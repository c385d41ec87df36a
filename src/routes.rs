use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::LeaderboardError;
use crate::feed::client::PostsSource;
use crate::view::{LeaderboardView, LoadKind, ViewState};

#[derive(Clone)]
pub struct AppState {
    // Client of the upstream feed backing /api/posts
    pub feed: Arc<dyn PostsSource>,
    pub view: Arc<LeaderboardView>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(page_handler))
        .route("/refresh", post(refresh_handler))
        .route("/api/posts", get(posts_handler))
        .route("/api/leaderboard", get(leaderboard_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Failure of the upstream call behind the proxy endpoint.
#[derive(Debug)]
pub struct ProxyError(LeaderboardError);

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        error!("Failed to fetch posts: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to fetch posts" })),
        )
            .into_response()
    }
}

/// Forwards the upstream feed payload unchanged.
pub async fn posts_handler(State(state): State<AppState>) -> Result<Json<Value>, ProxyError> {
    let feed = state.feed.fetch_feed().await.map_err(ProxyError)?;
    Ok(Json(feed))
}

pub async fn page_handler(State(state): State<AppState>) -> Response {
    render_page(state.view.load(LoadKind::Initial).await)
}

pub async fn refresh_handler(State(state): State<AppState>) -> Response {
    render_page(state.view.load(LoadKind::Refresh).await)
}

pub async fn leaderboard_handler(State(state): State<AppState>) -> Json<ViewState> {
    Json(state.view.snapshot())
}

fn render_page(state: ViewState) -> Response {
    match state.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Could not render leaderboard page: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load leaderboard").into_response()
        }
    }
}
