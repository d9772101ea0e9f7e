use async_trait::async_trait;
use reqwest::Method;
use std::error::Error as _;
use std::time::Duration;
use thiserror::Error;

/// Outbound request described by a target
#[derive(Debug, Clone, PartialEq)]
pub struct PurgeRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub bearer_token: Option<String>,
    pub json: Option<serde_json::Value>,
    pub timeout: Option<Duration>,
    /// `false` only for endpoints on trusted local infrastructure
    pub verify_tls: bool,
}

impl PurgeRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            bearer_token: None,
            json: None,
            timeout: None,
            verify_tls: true,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn insecure(mut self) -> Self {
        self.verify_tls = false;
        self
    }
}

/// A response that made it back, whatever its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
}

impl TransportError {
    pub fn request(url: impl Into<String>, message: impl Into<String>) -> Self {
        TransportError::Request {
            url: url.into(),
            message: message.into(),
        }
    }

    fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        // reqwest's top-level message is generic; the cause carries the detail
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        TransportError::request(url, message)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &PurgeRequest) -> Result<HttpReply, TransportError>;
}

/// reqwest-backed transport.
///
/// Holds a verifying client and a second one that accepts any certificate,
/// picked per request by `PurgeRequest::verify_tls`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    insecure: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let user_agent = concat!("purge-relay/", env!("CARGO_PKG_VERSION"));

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(TransportError::Client)?;

        let insecure = reqwest::Client::builder()
            .user_agent(user_agent)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(TransportError::Client)?;

        Ok(Self { client, insecure })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &PurgeRequest) -> Result<HttpReply, TransportError> {
        let client = if request.verify_tls {
            &self.client
        } else {
            &self.insecure
        };

        let mut builder = client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&request.url, &e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&request.url, &e))?;

        Ok(HttpReply { status, body })
    }
}
