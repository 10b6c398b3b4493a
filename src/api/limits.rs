//! Daily limit endpoint.

use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::models::LimitStatus;
use crate::AppState;

/// GET /api/limits - Today's counters against the configured caps.
pub async fn get_limits(State(state): State<AppState>) -> Result<Json<LimitStatus>, AppError> {
    let quota = state.pipeline.quota().get_quota().await?;
    Ok(Json(quota.status(state.pipeline.limits())))
}
