//! HTTP mapping of [`FilterError`]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};

use crate::error::FilterError;

/// Query appended to the dimension page after a bad range
pub const INVALID_RANGE_QUERY: &str = "error=invalid-range";

#[derive(Debug)]
pub struct AppError {
    pub error: FilterError,
    /// Page to send the user back to when the input itself was wrong
    pub back_to: Option<String>,
}

impl AppError {
    pub fn on_dimension(error: FilterError, filter_id: &str, dimension: &str) -> Self {
        Self {
            error,
            back_to: Some(format!("/filters/{filter_id}/dimensions/{dimension}")),
        }
    }
}

impl From<FilterError> for AppError {
    fn from(error: FilterError) -> Self {
        Self {
            error,
            back_to: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let (FilterError::InvalidRange(e), Some(back_to)) = (&self.error, &self.back_to) {
            tracing::info!(error = %e, "invalid range submitted");
            return Redirect::to(&format!("{back_to}?{INVALID_RANGE_QUERY}")).into_response();
        }

        let status = StatusCode::from_u16(self.error.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.error, "request failed");
        } else {
            tracing::warn!(error = %self.error, "request rejected");
        }

        let body = serde_json::json!({
            "error": self.error.to_string(),
            "retryable": self.error.is_retryable(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RangeError;
    use axum::http::header::LOCATION;

    #[test]
    fn test_invalid_range_redirects_back() {
        let err = AppError::on_dimension(RangeError::EmptyCatalog.into(), "f1", "time");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[LOCATION],
            "/filters/f1/dimensions/time?error=invalid-range"
        );
    }

    #[test]
    fn test_invalid_range_without_page_is_bad_request() {
        let err = AppError::from(FilterError::from(RangeError::EmptyCatalog));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upstream_not_found_passes_through() {
        let err = AppError::on_dimension(FilterError::upstream(404, "/filters/f1"), "f1", "age");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_upstream_failure_is_bad_gateway() {
        let err = AppError::from(FilterError::upstream(503, "/datasets/d"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
