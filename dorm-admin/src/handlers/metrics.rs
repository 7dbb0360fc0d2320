use axum::extract::State;
use service_core::error::AppError;

use crate::AppState;

pub async fn metrics(State(state): State<AppState>) -> Result<String, AppError> {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("metrics exporter is not installed")))
}
