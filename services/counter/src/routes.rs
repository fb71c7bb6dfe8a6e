//! Counter service routes

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use session_store::RecordStore;
use tracing::{debug, error, info};

use crate::{error::ApiResult, state::AppState};

/// Name of the session cookie
pub const SESSION_NAME: &str = "session";

/// Create the router for the counter service
pub fn create_router<R: RecordStore>(state: AppState<R>) -> Router {
    Router::new()
        .route("/", get(count::<R>))
        .route("/logout", post(logout::<R>))
        .route("/health", get(health_check::<R>))
        .with_state(state)
}

/// Increment and return the visitor's counter
pub async fn count<R: RecordStore>(
    State(state): State<AppState<R>>,
    headers: HeaderMap,
) -> ApiResult<(HeaderMap, String)> {
    let mut session = state.sessions.get(&headers, SESSION_NAME).await?;

    let count = session.get::<i64>("count").unwrap_or(0) + 1;
    session.insert("count", count)?;

    let mut response = HeaderMap::new();
    state.sessions.save(&mut response, &session).await?;

    debug!("Counter at {} (new session: {})", count, session.is_new());
    Ok((response, count.to_string()))
}

/// Destroy the visitor's session
pub async fn logout<R: RecordStore>(
    State(state): State<AppState<R>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    info!("Logout request");

    let mut session = state.sessions.get(&headers, SESSION_NAME).await?;
    session.options.max_age = -1;

    let mut response = HeaderMap::new();
    state.sessions.save(&mut response, &session).await?;

    Ok((
        response,
        Json(serde_json::json!({"message": "Logged out successfully"})),
    ))
}

/// Health check endpoint
pub async fn health_check<R: RecordStore>(State(state): State<AppState<R>>) -> impl IntoResponse {
    let healthy = match state.sessions.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            error!("Health check failed: {}", e);
            false
        }
    };

    let (status, status_text) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    (
        status,
        Json(serde_json::json!({
            "status": status_text,
            "service": "counter"
        })),
    )
}
