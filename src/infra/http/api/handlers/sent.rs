//! Sent notification handlers

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::response::IntoResponse;

use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;
use crate::infra::http::middleware::CurrentUser;

pub async fn create_sent_notification(
    State(state): State<ApiState>,
    Json(payload): Json<SendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let accepted = state
        .delivery
        .create_sent_notification(&payload.id)
        .await?;
    Ok(Json(SendAcceptedResponse::from(accepted)))
}

pub async fn list_sent_notifications(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let summaries = state.summaries.sent_notification_summaries().await?;
    let body: Vec<SentNotificationSummaryResponse> =
        summaries.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

pub async fn get_sent_notification(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .summaries
        .sent_notification(&id, user.id_or_empty())
        .await?;
    Ok(Json(SentNotificationResponse::from(view)))
}
