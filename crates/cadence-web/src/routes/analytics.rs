use std::sync::Arc;

use askama::Template;
use axum::extract::State;
use axum::response::{Html, Json};
use axum::routing::get;
use axum::Router;
use cadence_core::service::{DailyAnalytics, DayState, PendingReview, WeeklyAnalytics};

use super::{MaybeUserId, UserId};
use crate::error::{ApiError, AppError};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/v1/analytics/daily", get(daily))
        .route("/api/v1/analytics/weekly", get(weekly))
        .route("/api/v1/reviews/pending", get(pending_reviews))
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    user: String,
    today: String,
    week_label: String,
    day_labels: Vec<String>,
    rows: Vec<GridRow>,
    legend: Vec<GridCell>,
    completed: usize,
    skipped: usize,
    not_done: usize,
    total: usize,
    pending_reviews: usize,
}

struct GridRow {
    name: String,
    category: String,
    streak: u32,
    progress: String,
    cells: Vec<GridCell>,
}

struct GridCell {
    class: String,
    symbol: &'static str,
    title: String,
}

const LEGEND: [DayState; 5] = [
    DayState::Completed,
    DayState::Skipped,
    DayState::Rest,
    DayState::Missed,
    DayState::Pending,
];

async fn daily(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
) -> Result<Json<DailyAnalytics>, ApiError> {
    Ok(Json(state.service.daily_analytics(&user).await?))
}

async fn weekly(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
) -> Result<Json<WeeklyAnalytics>, ApiError> {
    Ok(Json(state.service.weekly_analytics(&user).await?))
}

async fn pending_reviews(
    State(state): State<Arc<AppState>>,
    UserId(user): UserId,
) -> Result<Json<Vec<PendingReview>>, ApiError> {
    Ok(Json(state.service.pending_reviews(&user).await?))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    MaybeUserId(user): MaybeUserId,
) -> Result<Html<String>, AppError> {
    let user = user.unwrap_or_else(|| state.default_user.clone());
    let daily = state.service.daily_analytics(&user).await?;
    let weekly = state.service.weekly_analytics(&user).await?;
    let pending = state.service.pending_reviews(&user).await?;

    let rows = weekly
        .habits
        .iter()
        .map(|habit| GridRow {
            name: habit.name.clone(),
            category: habit.category.clone(),
            streak: habit.streak,
            progress: format!("{}/{}", habit.active_days, habit.days_per_week),
            cells: habit
                .cells
                .iter()
                .map(|cell| GridCell {
                    class: cell.state.to_string(),
                    symbol: cell.state.symbol(),
                    title: format!("{}: {}", cell.date.format("%a %d %b"), cell.state),
                })
                .collect(),
        })
        .collect();

    let tmpl = DashboardTemplate {
        user,
        today: weekly.today.format("%A, %d %B %Y").to_string(),
        week_label: format!("Week of {}", weekly.week_start.format("%d %b")),
        day_labels: weekly
            .days
            .iter()
            .map(|d| d.format("%a").to_string())
            .collect(),
        rows,
        legend: LEGEND
            .iter()
            .map(|state| GridCell {
                class: state.to_string(),
                symbol: state.symbol(),
                title: state.to_string(),
            })
            .collect(),
        completed: daily.counts.completed,
        skipped: daily.counts.skipped,
        not_done: daily.counts.not_done,
        total: daily.counts.total,
        pending_reviews: pending.len(),
    };

    Ok(Html(tmpl.render()?))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use cadence_core::model::CreateHabitInput;
    use cadence_core::service::CompleteRequest;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_daily_and_weekly_json() {
        let (state, _) = test_app_state();
        let habit = state
            .service
            .create_habit("alice", CreateHabitInput::named("Read"))
            .await
            .unwrap();
        state
            .service
            .create_habit("alice", CreateHabitInput::named("Write"))
            .await
            .unwrap();
        state
            .service
            .complete(
                "alice",
                habit.id,
                CompleteRequest {
                    duration: Some(900),
                    reflection: None,
                },
            )
            .await
            .unwrap();
        let app = crate::routes::router().with_state(state);

        let resp = app
            .clone()
            .oneshot(request("GET", "/api/v1/analytics/daily", "alice", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["date"], "2026-03-02");
        assert_eq!(json["total"], 2);
        assert_eq!(json["completed"], 1);
        assert_eq!(json["not_done"], 1);
        assert_eq!(json["categories"][0]["category"], "general");

        let resp = app
            .oneshot(request("GET", "/api/v1/analytics/weekly", "alice", None))
            .await
            .unwrap();
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["week_start"], "2026-03-02");
        assert_eq!(json["habits"].as_array().unwrap().len(), 2);
        assert_eq!(json["habits"][0]["cells"][0]["state"], "completed");
        assert_eq!(json["habits"][0]["cells"][1]["state"], "upcoming");
    }

    #[tokio::test]
    async fn test_pending_reviews() {
        let (state, _) = test_app_state();
        let habit = state
            .service
            .create_habit(
                "alice",
                CreateHabitInput {
                    accountability_mode: true,
                    ..CreateHabitInput::named("Study")
                },
            )
            .await
            .unwrap();
        state
            .service
            .complete("alice", habit.id, CompleteRequest::default())
            .await
            .unwrap();
        let app = crate::routes::router().with_state(state);

        let resp = app
            .oneshot(request("GET", "/api/v1/reviews/pending", "alice", None))
            .await
            .unwrap();
        let json = body_json(resp.into_body()).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["habit_name"], "Study");
    }

    #[tokio::test]
    async fn test_dashboard_renders_for_default_user() {
        let (state, _) = test_app_state();
        state
            .service
            .create_habit("test-user", CreateHabitInput::named("Meditate"))
            .await
            .unwrap();
        let app = crate::routes::router().with_state(state);

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Meditate"));
        assert!(html.contains("Week of 02 Mar"));
    }
}
