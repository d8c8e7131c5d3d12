//! Remote profile service.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::{ProfileError, ProfileResult};
use crate::policy::ProfileConfig;

const PROFILE_PATH: &str = "/api/user/profile";

#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Raw profile payload as served.
    async fn fetch(&self) -> ProfileResult<Value>;
}

pub struct HttpProfileSource {
    client: Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpProfileSource {
    pub fn new(config: &ProfileConfig) -> ProfileResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| ProfileError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", config.service_url.trim_end_matches('/'), PROFILE_PATH),
            bearer_token: config.bearer_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn fetch(&self) -> ProfileResult<Value> {
        let mut request = self
            .client
            .get(&self.endpoint)
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProfileError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let payload: Value = response.json().await?;
        debug!(status = status.as_u16(), "profile fetched");
        Ok(payload)
    }
}
