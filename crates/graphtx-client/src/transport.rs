//! HTTP exchange behind a trait, so the state machine can run against a
//! scripted double in tests.

use async_trait::async_trait;
use graphtx_config::{ClientConfig, Credentials};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Client, RequestBuilder, Response};
use thiserror::Error;
use tracing::{debug, warn};

/// Header asking the server to stream the JSON response
pub const STREAM_HEADER: &str = "x-stream";

/// Errors from a single HTTP exchange
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request could not be sent or the body could not be read
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Server answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// A configured header value is not valid HTTP
    #[error("invalid header value for {name}")]
    InvalidHeader { name: &'static str },

    /// Connection-level failure reported by a non-reqwest transport
    #[error("connection failed: {0}")]
    Connection(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(err)
        }
    }
}

/// One POST or DELETE against a transaction endpoint, returning the raw body
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &str, payload: &serde_json::Value) -> Result<String, TransportError>;

    async fn delete(&self, url: &str) -> Result<String, TransportError>;
}

/// `reqwest`-backed transport with static basic auth
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    credentials: Option<Credentials>,
}

impl HttpTransport {
    pub fn new(credentials: Option<Credentials>) -> Result<Self, TransportError> {
        Self::from_config(&ClientConfig {
            credentials,
            ..ClientConfig::default()
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json; charset=UTF-8"));
        if config.stream_results {
            headers.insert(
                HeaderName::from_static(STREAM_HEADER),
                HeaderValue::from_static("true"),
            );
        }

        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|_| TransportError::InvalidHeader { name: "user-agent" })?;

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .user_agent(user_agent)
            .build()
            .map_err(TransportError::Request)?;

        Ok(Self {
            client,
            credentials: config.credentials.clone(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(credentials) => {
                request.basic_auth(&credentials.username, Some(&credentials.password))
            }
            None => request,
        }
    }

    async fn handle_response(response: Response) -> Result<String, TransportError> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            debug!(status = status.as_u16(), bytes = body.len(), "Received response");
            Ok(body)
        } else {
            warn!("Server returned HTTP {}", status.as_u16());
            Err(TransportError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, payload: &serde_json::Value) -> Result<String, TransportError> {
        debug!("POST {}", url);
        let response = self
            .authorize(self.client.post(url))
            .json(payload)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn delete(&self, url: &str) -> Result<String, TransportError> {
        debug!("DELETE {}", url);
        let response = self.authorize(self.client.delete(url)).send().await?;
        Self::handle_response(response).await
    }
}
