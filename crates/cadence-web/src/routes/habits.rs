use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use cadence_core::history::HabitEvent;
use cadence_core::model::*;
use cadence_core::service::CompleteRequest;
use cadence_core::state::CompletionOutcome;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;
use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/habits", post(create_habit).get(list_habits))
        .route(
            "/api/v1/habits/{id}",
            get(get_habit)
                .put(update_habit)
                .patch(update_habit)
                .delete(delete_habit),
        )
        .route("/api/v1/habits/{id}/start", post(start))
        .route("/api/v1/habits/{id}/pause", post(pause))
        .route("/api/v1/habits/{id}/complete", post(complete))
        .route("/api/v1/habits/{id}/skip", post(skip))
        .route("/api/v1/habits/{id}/uncomplete", post(uncomplete))
        .route("/api/v1/habits/{id}/reset-streak", post(reset_streak))
        .route("/api/v1/habits/{id}/recompute", post(recompute))
        .route(
            "/api/v1/habits/{id}/entries/{date}/honesty",
            put(set_honesty),
        )
        .route("/api/v1/habits/{id}/honesty-review", post(review_honesty))
        .route("/api/v1/habits/{id}/history", get(history))
}

// -- Request/Response types --

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub include_inactive: bool,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub hard: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SkipRequest {
    /// Defaults to today.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct HonestyRequest {
    pub honesty_status: HonestyStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReviewItem {
    pub date: NaiveDate,
    pub honesty_status: HonestyStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub reviews: Vec<ReviewItem>,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub habit: Habit,
    #[serde(flatten)]
    pub outcome: CompletionOutcome,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub habit: Habit,
    #[serde(flatten)]
    pub outcome: ReviewOutcome,
}

// -- Helpers --

/// Parse an optional JSON body. An empty body yields the default.
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid JSON: {e}")))
}

// -- Handlers --

async fn create_habit(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Json(input): Json<CreateHabitInput>,
) -> Result<Response, ApiError> {
    let habit = state.service.create_habit(&user, input).await?;
    Ok((StatusCode::CREATED, Json(habit)).into_response())
}

async fn list_habits(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<HabitSummary>>, ApiError> {
    let query = HabitQuery {
        owner_id: user,
        include_inactive: params.include_inactive,
        category: params.category,
    };
    let habits = state.service.list_habits(&query).await?;
    Ok(Json(habits.iter().map(HabitSummary::from).collect()))
}

async fn get_habit(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<Habit>, ApiError> {
    Ok(Json(state.service.get_habit(&user, id).await?))
}

async fn update_habit(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateHabitInput>,
) -> Result<Json<Habit>, ApiError> {
    Ok(Json(state.service.update_habit(&user, id, input).await?))
}

async fn delete_habit(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> Result<Response, ApiError> {
    if params.hard {
        state.service.delete_habit(&user, id).await?;
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let habit = state.service.archive_habit(&user, id).await?;
    Ok(Json(habit).into_response())
}

async fn start(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<Habit>, ApiError> {
    Ok(Json(state.service.start(&user, id).await?))
}

async fn pause(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<Habit>, ApiError> {
    Ok(Json(state.service.pause(&user, id).await?))
}

async fn complete(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<CompleteResponse>, ApiError> {
    let request: CompleteRequest = optional_json(&body)?;
    let (habit, outcome) = state.service.complete(&user, id, request).await?;
    Ok(Json(CompleteResponse { habit, outcome }))
}

async fn skip(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<Habit>, ApiError> {
    let request: SkipRequest = optional_json(&body)?;
    Ok(Json(state.service.skip_day(&user, id, request.date).await?))
}

async fn uncomplete(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<Habit>, ApiError> {
    Ok(Json(state.service.uncomplete(&user, id).await?))
}

async fn reset_streak(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<Habit>, ApiError> {
    Ok(Json(state.service.reset_streak(&user, id).await?))
}

async fn recompute(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<Habit>, ApiError> {
    Ok(Json(state.service.recompute_streak(&user, id).await?))
}

async fn set_honesty(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Path((id, date)): Path<(Uuid, NaiveDate)>,
    Json(request): Json<HonestyRequest>,
) -> Result<Json<Habit>, ApiError> {
    let habit = state
        .service
        .set_honesty(&user, id, date, request.honesty_status)
        .await?;
    Ok(Json(habit))
}

async fn review_honesty(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Path(id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let reviews: Vec<(NaiveDate, HonestyStatus)> = request
        .reviews
        .into_iter()
        .map(|r| (r.date, r.honesty_status))
        .collect();
    let (habit, outcome) = state.service.review_honesty(&user, id, &reviews).await?;
    Ok(Json(ReviewResponse { habit, outcome }))
}

async fn history(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<HabitEvent>>, ApiError> {
    Ok(Json(state.service.history_for(&user, id).await?))
}
