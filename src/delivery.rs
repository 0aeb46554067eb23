//! Response delivery to the callback URL.
//!
//! The response is serialized to the wire format and sent as the JSON body of
//! a single HTTP PUT. Any transport failure is reported as
//! [`Error::CloudFormationReporting`]; nothing is retried.

use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::types::Response;

/// Why a PUT to the callback URL failed.
#[derive(Debug, Clone, Error)]
pub enum DeliveryFailure {
    /// The connection could not be established.
    #[error("{0}")]
    Connect(String),
    /// The request timed out.
    #[error("{0}")]
    Timeout(String),
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// The status code.
        status: u16,
        /// The response body, if any.
        body: String,
    },
    /// The request could not be built or sent.
    #[error("{0}")]
    Request(String),
}

impl DeliveryFailure {
    /// A stable identifier for the kind of failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "ConnectionError",
            Self::Timeout(_) => "Timeout",
            Self::Status { .. } => "HTTPError",
            Self::Request(_) => "RequestException",
        }
    }
}

impl From<reqwest::Error> for DeliveryFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Sends a JSON body to a callback URL with HTTP PUT.
#[async_trait::async_trait]
pub trait ResponseTransport: Send + Sync {
    /// PUT `body` to `url`. Succeeds only on a 2xx answer.
    async fn put_json(&self, url: &str, body: &Value) -> Result<(), DeliveryFailure>;
}

/// HTTP settings for [`HttpTransport`].
#[derive(Debug, Clone, Default)]
pub struct DeliveryConfig {
    /// Connect timeout. `None` leaves the connection attempt unbounded.
    pub connect_timeout: Option<Duration>,
    /// Whole-request timeout. `None` leaves the request unbounded.
    pub request_timeout: Option<Duration>,
    /// User-Agent header value.
    pub user_agent: Option<String>,
}

/// [`ResponseTransport`] backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport from delivery settings.
    pub fn new(config: &DeliveryConfig) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().map_err(|e| {
            Error::CloudFormationReporting(format!("Could not build HTTP client: {}", e))
        })?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ResponseTransport for HttpTransport {
    async fn put_json(&self, url: &str, body: &Value) -> Result<(), DeliveryFailure> {
        let response = self.client.put(url).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DeliveryFailure::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Deliver a response and return the wire mapping that was sent.
pub async fn deliver(
    transport: &dyn ResponseTransport,
    response_url: &str,
    response: &Response,
) -> Result<Map<String, Value>, Error> {
    let wire = response.to_dict()?;
    let body = Value::Object(wire.clone());

    debug!(
        host = %url_host(response_url),
        status = ?response.status(),
        "Sending response"
    );

    match transport.put_json(response_url, &body).await {
        Ok(()) => {
            info!(
                request_id = %response.request_id(),
                status = ?response.status(),
                "Response delivered"
            );
            Ok(wire)
        },
        Err(failure) => {
            error!(
                request_id = %response.request_id(),
                host = %url_host(response_url),
                error = %failure,
                "Response delivery failed"
            );
            Err(Error::CloudFormationReporting(format!(
                "Could not send response to CloudFormation. (Caused by: {}: {})",
                failure.kind(),
                failure
            )))
        },
    }
}

/// Host part of a callback URL. Presigned query strings are never logged.
fn url_host(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "<invalid url>".to_string())
}
