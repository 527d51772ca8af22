pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    routing::{get, post},
};

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/sentNotifications",
            get(handlers::list_sent_notifications).post(handlers::create_sent_notification),
        )
        .route(
            "/api/sentNotifications/{id}",
            get(handlers::get_sent_notification),
        )
        .route(
            "/api/draftNotifications",
            get(handlers::list_draft_notifications)
                .post(handlers::create_draft_notification)
                .put(handlers::update_draft_notification),
        )
        .route(
            "/api/draftNotifications/{id}",
            get(handlers::get_draft_notification).delete(handlers::delete_draft_notification),
        )
        .route(
            "/api/draftNotifications/{id}/card",
            get(handlers::get_draft_card),
        )
        .route(
            "/api/draftNotifications/duplicates/{id}",
            post(handlers::duplicate_draft_notification),
        )
        .route(
            "/api/draftNotifications/previews",
            post(handlers::preview_draft_notification),
        )
        .route(
            "/api/draftNotifications/consentSummaries/{id}",
            get(handlers::get_consent_summary),
        )
        .with_state(state)
}
