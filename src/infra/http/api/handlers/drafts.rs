//! Draft notification handlers

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;
use crate::infra::http::middleware::CurrentUser;

pub async fn create_draft_notification(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<DraftNotificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (_, command) = payload.into_command();
    let id = state.drafts.create(user.author(), command).await?;
    Ok(Json(id))
}

pub async fn update_draft_notification(
    State(state): State<ApiState>,
    Json(payload): Json<DraftNotificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (id, command) = payload.into_command();
    state
        .drafts
        .update(id.as_deref().unwrap_or(""), command)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn delete_draft_notification(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.drafts.delete(&id).await?;
    Ok(StatusCode::OK)
}

pub async fn duplicate_draft_notification(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let copy_id = state.drafts.duplicate(&id, user.author()).await?;
    Ok(Json(copy_id))
}

pub async fn list_draft_notifications(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let drafts = state.drafts.list().await?;
    let body: Vec<DraftNotificationSummaryResponse> = drafts.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

pub async fn get_draft_notification(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.drafts.get(&id).await?;
    Ok(Json(DraftNotificationResponse::from(view)))
}

pub async fn get_consent_summary(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.drafts.consent_summary(&id).await?;
    Ok(Json(ConsentSummaryResponse::from(summary)))
}

pub async fn preview_draft_notification(
    State(state): State<ApiState>,
    Json(payload): Json<DraftPreviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .previews
        .preview(
            &payload.draft_notification_id,
            &payload.teams_team_id,
            &payload.teams_channel_id,
        )
        .await?;
    Ok(StatusCode::OK)
}

pub async fn get_draft_card(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let card: CardResponse = state.drafts.card(&id).await?;
    Ok(Json(card))
}
