use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::application::card::AdaptiveCard;
use crate::application::preview::{PreviewSendError, PreviewSender, PreviewTarget};

use super::{GraphClient, GraphError};

const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationRequest<'a> {
    is_group: bool,
    channel_data: ChannelData<'a>,
    activity: Activity<'a>,
}

#[derive(Serialize)]
struct ChannelData<'a> {
    team: Id<'a>,
    channel: Id<'a>,
}

#[derive(Serialize)]
struct Id<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct Activity<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    attachments: [Attachment<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Attachment<'a> {
    content_type: &'static str,
    content: &'a AdaptiveCard,
}

impl From<GraphError> for PreviewSendError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Status { status, message } => PreviewSendError::Rejected { status, message },
            other => PreviewSendError::Unavailable(other.to_string()),
        }
    }
}

/// Starts a channel conversation through the bot connector service. The client's base url
/// is the connector service url.
pub struct BotConnectorPreviewSender {
    client: Arc<GraphClient>,
}

impl BotConnectorPreviewSender {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PreviewSender for BotConnectorPreviewSender {
    async fn send_preview(
        &self,
        card: &AdaptiveCard,
        target: &PreviewTarget,
    ) -> Result<(), PreviewSendError> {
        let url = self.client.endpoint(&["v3", "conversations"], &[])?;
        let request = ConversationRequest {
            is_group: true,
            channel_data: ChannelData {
                team: Id {
                    id: &target.team_id,
                },
                channel: Id {
                    id: &target.channel_id,
                },
            },
            activity: Activity {
                kind: "message",
                attachments: [Attachment {
                    content_type: ADAPTIVE_CARD_CONTENT_TYPE,
                    content: card,
                }],
            },
        };

        self.client.post_json(url, &request).await?;
        Ok(())
    }
}

/// Used when no bot credentials are configured.
pub struct UnconfiguredPreviewSender;

#[async_trait]
impl PreviewSender for UnconfiguredPreviewSender {
    async fn send_preview(
        &self,
        _card: &AdaptiveCard,
        _target: &PreviewTarget,
    ) -> Result<(), PreviewSendError> {
        Err(PreviewSendError::Unavailable(
            "bot connector credentials are not configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::{
        Json, Router,
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::post,
    };
    use serde_json::{Value, json};
    use url::Url;

    use super::*;
    use crate::application::card::{CardSettings, render_card};
    use crate::domain::entities::NotificationContent;
    use crate::infra::graph::test_server;

    fn card() -> AdaptiveCard {
        render_card(
            &NotificationContent {
                title: "Preview me".to_string(),
                ..Default::default()
            },
            &CardSettings::default(),
        )
    }

    fn target(team_id: &str) -> PreviewTarget {
        PreviewTarget {
            team_id: team_id.to_string(),
            channel_id: "19:channel".to_string(),
        }
    }

    async fn sender(received: Arc<Mutex<Vec<Value>>>) -> BotConnectorPreviewSender {
        let router = Router::new()
            .route(
                "/tenant/oauth2/v2.0/token",
                post(|| async { Json(json!({ "access_token": "bot-token", "expires_in": 3600 })) }),
            )
            .route(
                "/teams/v3/conversations",
                post(move |Json(body): Json<Value>| {
                    let received = received.clone();
                    async move {
                        let rejected = body["channelData"]["team"]["id"] == "uninstalled";
                        received.lock().expect("received lock").push(body);
                        let response: Response = if rejected {
                            (StatusCode::FORBIDDEN, "bot not installed").into_response()
                        } else {
                            (StatusCode::CREATED, Json(json!({ "id": "conversation" })))
                                .into_response()
                        };
                        response
                    }
                }),
            );
        let addr = test_server::spawn(router).await;
        let mut settings = test_server::settings(addr);
        settings.base_url = Url::parse(&format!("http://{addr}/teams/")).expect("service url");
        BotConnectorPreviewSender::new(Arc::new(GraphClient::new(&settings).expect("client")))
    }

    #[tokio::test]
    async fn preview_starts_a_channel_conversation_with_the_card() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sender = sender(received.clone()).await;

        sender
            .send_preview(&card(), &target("team-1"))
            .await
            .expect("preview sent");

        let received = received.lock().expect("received lock");
        assert_eq!(received.len(), 1);
        let body = &received[0];
        assert_eq!(body["isGroup"], true);
        assert_eq!(body["channelData"]["channel"]["id"], "19:channel");
        assert_eq!(body["activity"]["type"], "message");
        assert_eq!(
            body["activity"]["attachments"][0]["contentType"],
            ADAPTIVE_CARD_CONTENT_TYPE
        );
        assert_eq!(
            body["activity"]["attachments"][0]["content"]["type"],
            "AdaptiveCard"
        );
    }

    #[tokio::test]
    async fn connector_rejections_keep_their_status() {
        let sender = sender(Arc::new(Mutex::new(Vec::new()))).await;

        let err = sender
            .send_preview(&card(), &target("uninstalled"))
            .await
            .expect_err("rejected");
        assert!(matches!(
            err,
            PreviewSendError::Rejected { status: 403, .. }
        ));
    }

    #[tokio::test]
    async fn unconfigured_sender_is_unavailable() {
        let err = UnconfiguredPreviewSender
            .send_preview(&card(), &target("team-1"))
            .await
            .expect_err("unconfigured");
        assert!(matches!(err, PreviewSendError::Unavailable(_)));
    }
}
