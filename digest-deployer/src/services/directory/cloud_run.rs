//! Cloud Run Admin API (v1, Knative serving surface) client.

use super::{DeploymentDirectory, DirectoryError};
use crate::config::DeployerConfig;
use crate::models::{Service, ServiceName};
use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::observability::TracedClientExt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const KNATIVE_API_PATH: &str = "apis/serving.knative.dev/v1";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Where bearer tokens for the Admin API come from.
pub enum TokenSource {
    Static(Secret<String>),
    /// The instance metadata server of the runtime environment.
    Metadata {
        url: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

pub struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

impl TokenSource {
    pub fn from_config(config: &DeployerConfig) -> Self {
        match &config.access_token {
            Some(token) => TokenSource::Static(token.clone()),
            None => TokenSource::metadata(
                config
                    .metadata_token_url
                    .clone()
                    .unwrap_or_else(|| METADATA_TOKEN_URL.to_string()),
            ),
        }
    }

    pub fn metadata(url: impl Into<String>) -> Self {
        TokenSource::Metadata {
            url: url.into(),
            cached: Mutex::new(None),
        }
    }

    async fn token(&self, client: &Client) -> Result<String, DirectoryError> {
        let (url, cached) = match self {
            TokenSource::Static(token) => return Ok(token.expose_secret().clone()),
            TokenSource::Metadata { url, cached } => (url, cached),
        };

        let mut cached = cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let response = client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| {
                DirectoryError::Authentication(format!("Failed to reach metadata server: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Authentication(format!(
                "Metadata server returned {}: {}",
                status, body
            )));
        }

        let token: MetadataToken = response.json().await.map_err(|e| {
            DirectoryError::Authentication(format!("Failed to parse metadata token: {}", e))
        })?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        tracing::debug!(expires_in = token.expires_in, "Fetched access token from metadata server");

        Ok(token.access_token)
    }
}

pub struct CloudRunDirectory {
    client: Client,
    endpoint: String,
    tokens: TokenSource,
}

impl CloudRunDirectory {
    pub fn new(config: &DeployerConfig) -> Result<Self, DirectoryError> {
        Self::with_parts(
            config.api_endpoint(),
            TokenSource::from_config(config),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_parts(
        endpoint: impl Into<String>,
        tokens: TokenSource,
        timeout: Duration,
    ) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn service_url(&self, name: &ServiceName) -> String {
        format!("{}/{}/{}", self.endpoint, KNATIVE_API_PATH, name)
    }
}

async fn parse_service(response: Response) -> Result<Service, DirectoryError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DirectoryError::Api {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| DirectoryError::Decode(format!("Failed to parse service resource: {}", e)))
}

#[async_trait]
impl DeploymentDirectory for CloudRunDirectory {
    async fn get(&self, name: &ServiceName) -> Result<Service, DirectoryError> {
        let token = self.tokens.token(&self.client).await?;
        let url = self.service_url(name);

        let response = self
            .client
            .traced_get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| DirectoryError::Connection(format!("GET {} failed: {}", url, e)))?;

        parse_service(response).await
    }

    async fn replace(
        &self,
        name: &ServiceName,
        service: &Service,
    ) -> Result<Service, DirectoryError> {
        let token = self.tokens.token(&self.client).await?;
        let url = self.service_url(name);

        let response = self
            .client
            .traced_put(&url)
            .bearer_auth(&token)
            .json(service)
            .send()
            .await
            .map_err(|e| DirectoryError::Connection(format!("PUT {} failed: {}", url, e)))?;

        parse_service(response).await
    }
}
