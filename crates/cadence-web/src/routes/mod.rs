mod analytics;
mod habits;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the caller's identity, set by the auth proxy in front.
pub const USER_HEADER: &str = "x-user-id";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(habits::routes())
        .merge(analytics::routes())
        .fallback(not_found)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> ApiError {
    ApiError::not_found("no such route")
}

fn header_user(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Caller identity from `x-user-id`. Rejects with 401 when missing.
pub struct UserId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_user(parts).map(UserId).ok_or_else(ApiError::unauthorized)
    }
}

/// Like [`UserId`] but optional, for pages that fall back to the configured user.
pub struct MaybeUserId(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeUserId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUserId(header_user(parts)))
    }
}
