use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::trace;

use crate::backend::SecondaryBackend;
use crate::config::RestSettings;
use crate::error::{BackendError, Result};

/// API-key authenticated client for the legacy REST endpoints.
pub struct RestClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl RestClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(BackendError::Auth("legacy API key is empty".to_string()));
        }
        let base_url = Url::parse(base_url)
            .map_err(|e| BackendError::Transport(format!("invalid base url {base_url}: {e}")))?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    pub fn from_settings(settings: &RestSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| BackendError::Auth("no legacy API key configured".to_string()))?;
        Self::new(
            &settings.base_url,
            api_key,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::Transport(format!("invalid path {path}: {e}")))
    }
}

#[async_trait]
impl SecondaryBackend for RestClient {
    async fn get(&self, path: &str, controller_id: u64) -> Result<Value> {
        let url = self.endpoint(path)?;
        trace!(%url, controller_id, "legacy request");
        let response = self
            .http
            .get(url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(&[("controller_id", controller_id)])
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
