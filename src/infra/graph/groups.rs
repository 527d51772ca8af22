use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::directory::{DirectoryError, GroupInfo, GroupsDirectory};

use super::{GraphClient, GraphError};

const HIDDEN_MEMBERSHIP: &str = "HiddenMembership";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupResponse {
    id: String,
    display_name: Option<String>,
    visibility: Option<String>,
}

impl From<GroupResponse> for GroupInfo {
    fn from(group: GroupResponse) -> Self {
        let hidden_membership = group
            .visibility
            .as_deref()
            .is_some_and(|value| value.eq_ignore_ascii_case(HIDDEN_MEMBERSHIP));
        Self {
            display_name: group.display_name.unwrap_or_else(|| group.id.clone()),
            id: group.id,
            hidden_membership,
        }
    }
}

impl From<GraphError> for DirectoryError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Status { status, message } => DirectoryError::Service { status, message },
            other => DirectoryError::Unavailable(other.to_string()),
        }
    }
}

pub struct GraphGroupsDirectory {
    client: Arc<GraphClient>,
}

impl GraphGroupsDirectory {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GroupsDirectory for GraphGroupsDirectory {
    async fn group_by_id(&self, id: &str) -> Result<Option<GroupInfo>, DirectoryError> {
        let url = self.client.endpoint(
            &["groups", id],
            &[("$select", "id,displayName,visibility")],
        )?;
        let group: Option<GroupResponse> = self.client.get_json(url).await?;
        Ok(group.map(GroupInfo::from))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Json, Router,
        extract::Path,
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::{get, post},
    };
    use serde_json::json;

    use super::*;
    use crate::infra::graph::test_server;

    async fn group(Path(id): Path<String>) -> Response {
        match id.as_str() {
            "visible" => Json(json!({
                "id": "visible",
                "displayName": "Engineering",
                "visibility": "Public"
            }))
            .into_response(),
            "hidden" => Json(json!({
                "id": "hidden",
                "displayName": "Board",
                "visibility": "HiddenMembership"
            }))
            .into_response(),
            "broken" => (StatusCode::SERVICE_UNAVAILABLE, "try later").into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn directory() -> GraphGroupsDirectory {
        let router = Router::new()
            .route(
                "/tenant/oauth2/v2.0/token",
                post(|| async { Json(json!({ "access_token": "t", "expires_in": 3600 })) }),
            )
            .route("/v1.0/groups/{id}", get(group));
        let addr = test_server::spawn(router).await;
        let client = GraphClient::new(&test_server::settings(addr)).expect("client");
        GraphGroupsDirectory::new(Arc::new(client))
    }

    #[tokio::test]
    async fn visibility_maps_to_hidden_membership() {
        let directory = directory().await;

        let visible = directory
            .group_by_id("visible")
            .await
            .expect("lookup")
            .expect("known group");
        assert_eq!(visible.display_name, "Engineering");
        assert!(!visible.hidden_membership);

        let hidden = directory
            .group_by_id("hidden")
            .await
            .expect("lookup")
            .expect("known group");
        assert!(hidden.hidden_membership);
    }

    #[tokio::test]
    async fn unknown_group_is_none_and_failures_carry_status() {
        let directory = directory().await;

        assert!(directory.group_by_id("nobody").await.expect("lookup").is_none());

        let err = directory.group_by_id("broken").await.expect_err("503");
        assert!(matches!(err, DirectoryError::Service { status: 503, .. }));
    }
}
