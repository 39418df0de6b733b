use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use log::{debug, error};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use super::SubscriptionSource;
use crate::models::CanonicalPayload;
use crate::settings::PanelSettings;

const USER_AGENT: &str = concat!("subpage/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("subscription '{0}' not found")]
    NotFound(String),

    #[error("panel request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("panel answered with status {0}")]
    Status(u16),

    #[error("malformed panel payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl PanelError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PanelError::NotFound(_))
    }
}

/// The panel either answers with the payload itself or wraps it in a
/// `response` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum PanelResponse {
    Wrapped { response: CanonicalPayload },
    Bare(CanonicalPayload),
}

impl PanelResponse {
    fn into_payload(self) -> CanonicalPayload {
        match self {
            PanelResponse::Wrapped { response } => response,
            PanelResponse::Bare(payload) => payload,
        }
    }
}

/// Decode a panel response body.
pub fn decode_payload(body: &str) -> Result<CanonicalPayload, PanelError> {
    let response: PanelResponse = serde_json::from_str(body)?;
    Ok(response.into_payload())
}

/// HTTP client for the panel API.
#[derive(Debug, Clone)]
pub struct PanelClient {
    client: Client,
    base_url: String,
    token: String,
    /// Set when the panel is reached over plain http and expects the
    /// reverse proxy headers itself
    forward_headers: bool,
}

impl PanelClient {
    pub fn new(settings: &PanelSettings) -> Result<Self, PanelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(PanelClient {
            client,
            base_url: format!("{}://{}", settings.scheme, settings.domain.trim_end_matches('/')),
            token: settings.token.clone(),
            forward_headers: settings.scheme == "http",
        })
    }

    pub fn subscription_url(&self, short_id: &str) -> String {
        format!(
            "{}/api/subscriptions/{}",
            self.base_url,
            urlencoding::encode(short_id)
        )
    }

    pub async fn get_subscription(&self, short_id: &str) -> Result<CanonicalPayload, PanelError> {
        let url = self.subscription_url(short_id);
        debug!("Fetching subscription from {}", url);

        let mut request = self.client.get(&url);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        if self.forward_headers {
            request = request
                .header("x-forwarded-for", "127.0.0.1")
                .header("x-forwarded-proto", "https");
        }

        let response = request.send().await.map_err(|e| {
            error!("Panel request for {} failed: {}", short_id, e);
            PanelError::Http(e)
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(PanelError::NotFound(short_id.to_string())),
            status if !status.is_success() => {
                error!("Panel answered {} for {}", status, short_id);
                return Err(PanelError::Status(status.as_u16()));
            }
            _ => {}
        }

        let body = response.text().await?;
        decode_payload(&body)
    }
}

impl SubscriptionSource for PanelClient {
    fn fetch<'a>(&'a self, short_id: &'a str) -> BoxFuture<'a, Result<CanonicalPayload, PanelError>> {
        self.get_subscription(short_id).boxed()
    }
}
