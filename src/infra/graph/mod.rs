//! Directory, app catalog and bot connector clients over client-credential REST APIs.

mod catalog;
mod groups;
mod preview;

pub use catalog::GraphAppCatalog;
pub use groups::GraphGroupsDirectory;
pub use preview::{BotConnectorPreviewSender, UnconfiguredPreviewSender};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::config::GraphSettings;
use crate::infra::error::InfraError;

/// Tokens are refreshed this long before the issuer's expiry.
const TOKEN_REFRESH_MARGIN: time::Duration = time::Duration::seconds(60);

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("graph request failed: {0}")]
    Transport(String),
    #[error("graph url could not be built: {0}")]
    Url(String),
}

impl From<reqwest::Error> for GraphError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => GraphError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => GraphError::Transport(err.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
struct ClientCredentials {
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: OffsetDateTime,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

pub struct GraphClient {
    http: reqwest::Client,
    base_url: Url,
    authority_url: Url,
    scope: String,
    credentials: ClientCredentials,
    token: Mutex<Option<CachedToken>>,
}

impl GraphClient {
    pub fn new(settings: &GraphSettings) -> Result<Self, InfraError> {
        let credentials = match (
            settings.tenant_id.as_ref(),
            settings.client_id.as_ref(),
            settings.client_secret.as_ref(),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => ClientCredentials {
                tenant_id: tenant_id.clone(),
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
            },
            _ => {
                return Err(InfraError::configuration(
                    "graph.tenant_id, graph.client_id and graph.client_secret must be set",
                ));
            }
        };

        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| InfraError::upstream(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            authority_url: settings.authority_url.clone(),
            scope: settings.scope.clone(),
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Build `{base}/{segments...}` with the given query pairs.
    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, GraphError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GraphError::Url(format!("`{}` cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn token_endpoint(&self) -> Result<Url, GraphError> {
        let mut url = self.authority_url.clone();
        url.path_segments_mut()
            .map_err(|_| GraphError::Url(format!("`{}` cannot be a base", self.authority_url)))?
            .pop_if_empty()
            .extend([
                self.credentials.tenant_id.as_str(),
                "oauth2",
                "v2.0",
                "token",
            ]);
        Ok(url)
    }

    async fn access_token(&self) -> Result<String, GraphError> {
        let mut cached = self.token.lock().await;
        let now = OffsetDateTime::now_utc();
        if let Some(token) = cached.as_ref()
            && token.expires_at - TOKEN_REFRESH_MARGIN > now
        {
            return Ok(token.access_token.clone());
        }

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let response = self
            .http
            .post(self.token_endpoint()?)
            .form(&form)
            .send()
            .await?;
        let response = error_for_status(response).await?;
        let token: TokenResponse = response.json().await?;

        debug!(
            target = "infra::graph",
            expires_in = token.expires_in,
            "graph access token refreshed"
        );
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: now + time::Duration::seconds(token.expires_in),
        });
        Ok(access_token)
    }

    /// GET a JSON resource; a 404 is reported as `Ok(None)`.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, GraphError> {
        let token = self.access_token().await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = error_for_status(response).await?;
        Ok(Some(response.json().await?))
    }

    /// POST a JSON body; the response body is discarded.
    async fn post_json<B: Serialize + Sync>(&self, url: Url, body: &B) -> Result<(), GraphError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(())
    }
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, GraphError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|err| format!("unreadable body: {err}"));
    Err(GraphError::Status {
        status: status.as_u16(),
        message,
    })
}
