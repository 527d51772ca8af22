use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::catalog::{AppCatalog, CatalogError};

use super::{GraphClient, GraphError};

#[derive(Deserialize)]
struct TeamsAppList {
    #[serde(default)]
    value: Vec<TeamsApp>,
}

#[derive(Deserialize)]
struct TeamsApp {
    id: String,
}

impl From<GraphError> for CatalogError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Status { status, message } => CatalogError::Service { status, message },
            other => CatalogError::Unavailable(other.to_string()),
        }
    }
}

pub struct GraphAppCatalog {
    client: Arc<GraphClient>,
}

impl GraphAppCatalog {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AppCatalog for GraphAppCatalog {
    async fn teams_app_id(&self, external_id: &str) -> Result<Option<String>, CatalogError> {
        // OData string literals escape a quote by doubling it.
        let filter = format!("externalId eq '{}'", external_id.replace('\'', "''"));
        let url = self
            .client
            .endpoint(&["appCatalogs", "teamsApps"], &[("$filter", filter.as_str())])?;

        let apps: Option<TeamsAppList> = self.client.get_json(url).await?;
        Ok(apps.and_then(|list| list.value.into_iter().next().map(|app| app.id)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        Json, Router,
        extract::Query,
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::{get, post},
    };
    use serde_json::json;

    use super::*;
    use crate::infra::graph::test_server;

    async fn teams_apps(Query(query): Query<HashMap<String, String>>) -> Response {
        match query.get("$filter").map(String::as_str) {
            Some("externalId eq 'published'") => {
                Json(json!({ "value": [{ "id": "appId" }] })).into_response()
            }
            Some("externalId eq 'forbidden'") => {
                (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
            }
            _ => Json(json!({ "value": [] })).into_response(),
        }
    }

    async fn catalog() -> GraphAppCatalog {
        let router = Router::new()
            .route(
                "/tenant/oauth2/v2.0/token",
                post(|| async { Json(json!({ "access_token": "t", "expires_in": 3600 })) }),
            )
            .route("/v1.0/appCatalogs/teamsApps", get(teams_apps));
        let addr = test_server::spawn(router).await;
        let client = GraphClient::new(&test_server::settings(addr)).expect("client");
        GraphAppCatalog::new(Arc::new(client))
    }

    #[tokio::test]
    async fn published_app_resolves_to_its_catalog_id() {
        let catalog = catalog().await;

        let app_id = catalog.teams_app_id("published").await.expect("lookup");
        assert_eq!(app_id.as_deref(), Some("appId"));

        let missing = catalog.teams_app_id("unpublished").await.expect("lookup");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn unauthorized_catalog_reports_status() {
        let catalog = catalog().await;

        let err = catalog.teams_app_id("forbidden").await.expect_err("401");
        assert_eq!(err.status(), Some(401));
    }
}
