//! Vapi REST client
//!
//! - **Phone numbers** (`phone_number`) - `AllocationApi` over `/phone-number`
//! - **Assistants** (`assistant`) - `POST /assistant` with voice selection
//!
//! One `VapiClient` wraps a pooled `reqwest::Client`; clone it (or share it in
//! an `Arc`) instead of building a new one per request.

pub mod assistant;
pub mod phone_number;

use std::time::Duration;

use pheona_core::config::VapiConfig;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum VapiError {
    #[error("could not build vapi http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("vapi request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("vapi returned status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("vapi response is missing `{0}`")]
    MissingField(&'static str),
}

/// Model the created assistants talk through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssistantModel {
    pub provider: String,
    pub name: String,
}

impl Default for AssistantModel {
    fn default() -> Self {
        Self { provider: "openai".to_string(), name: "gpt-4o-mini".to_string() }
    }
}

#[derive(Clone)]
pub struct VapiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    model: AssistantModel,
}

impl VapiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, VapiError> {
        let http = Client::builder().timeout(timeout).build().map_err(VapiError::Client)?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url, api_key, model: AssistantModel::default() })
    }

    pub fn from_config(config: &VapiConfig) -> Result<Self, VapiError> {
        let client = Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(client.with_model(AssistantModel {
            provider: config.model_provider.trim().to_string(),
            name: config.model_name.trim().to_string(),
        }))
    }

    pub fn with_model(mut self, model: AssistantModel) -> Self {
        self.model = model;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(self.api_key.expose_secret())
    }

    /// Sends the request and splits non-2xx answers off as `Upstream` errors,
    /// keeping the body text for callers that read hints out of it.
    async fn execute(
        &self,
        builder: RequestBuilder,
        operation: &str,
    ) -> Result<Response, VapiError> {
        let response = self.authorized(builder).send().await.map_err(VapiError::Transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(error) => {
                warn!(
                    event_name = "vapi.response.body_unreadable",
                    operation,
                    status = status.as_u16(),
                    error = %error,
                    "failed to read vapi error response body"
                );
                String::new()
            }
        };
        warn!(
            event_name = "vapi.request.rejected",
            operation,
            status = status.as_u16(),
            body = %body,
            "vapi returned an error response"
        );
        Err(VapiError::Upstream { status: status.as_u16(), body })
    }
}
