use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Handler error rendered as a JSON body. Pages that swap htmx fragments
/// render their own inline errors instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("not found: {0}")]
    NotFound(anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (AppError::BadRequest(err) | AppError::NotFound(err)) = self;
        tracing::debug!(status = status.as_u16(), error = %err, "Request rejected");

        (
            status,
            Json(ErrorBody {
                error: err.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_variant() {
        assert_eq!(
            AppError::BadRequest(anyhow::anyhow!("month out of range")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound(anyhow::anyhow!("no exporter"))
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
    }
}
