use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use cadence_core::error::{CadenceError, ErrorCategory};

/// JSON error for `/api` routes: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "missing x-user-id header")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<CadenceError> for ApiError {
    fn from(err: CadenceError) -> Self {
        let status = match err.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Dependency if err.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::Dependency => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("request failed: {err}");
        }
        Self::new(status, err.to_string())
    }
}

/// Error for HTML pages. Renders a plain 500 page.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("page error: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!(
                "<h1>Something went wrong</h1><pre>{}</pre>",
                html_escape(&self.0.to_string())
            )),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::error::Conflict;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CadenceError::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
            (
                CadenceError::Conflict(Conflict::AlreadyRunning),
                StatusCode::CONFLICT,
            ),
            (CadenceError::NotFound("habit".into()), StatusCode::NOT_FOUND),
            (
                CadenceError::Storage("database is locked".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CadenceError::Storage("no such table: habits".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<b>\"x\" & y</b>"), "&lt;b&gt;&quot;x&quot; &amp; y&lt;/b&gt;");
    }
}
