//! Outbound HTTP client.
//!
//! # Responsibilities
//! - Describe a request to another host with a builder
//! - Resolve, connect, send and collect the body under one deadline
//! - Classify 4xx/5xx responses as failures per request policy
//!
//! # Design Decisions
//! - A single `tokio::time::timeout` covers resolution, connect and body read;
//!   expiry drops the connection
//! - Resolution prefers IPv6 addresses over IPv4
//! - Each request builds its own connector so `nodelay` is per request
//! - HTTPS uses rustls with the webpki roots; secure requests connect by host
//!   name so the certificate is checked against it

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE, HOST, USER_AGENT};
use hyper::{HeaderMap, Method, Request};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Outbound request failures. Messages name the target as `host:port/path`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request to '{target}' has timed out")]
    Timeout { target: String },

    #[error("Request to '{target}' has failed")]
    Failed {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("Request to '{target}' has responded with {status}")]
    Status { target: String, status: u16, body: Bytes },

    #[error("Request to '{target}' has responded with invalid JSON")]
    InvalidJson {
        target: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unable to resolve '{host}'")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },
}

/// A request to another host.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    host: String,
    port: u16,
    path: String,
    method: Method,
    body: Bytes,
    headers: HeaderMap,
    secure: bool,
    nodelay: bool,
    noresolve: bool,
    timeout: Duration,
    fail_on_4xx: bool,
    fail_on_5xx: bool,
}

impl OutboundRequest {
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&host) {
            headers.insert(HOST, value);
        }
        headers.insert(USER_AGENT, HeaderValue::from_static("YT"));

        Self {
            host,
            port: 80,
            path: "/".to_string(),
            method: Method::GET,
            body: Bytes::new(),
            headers,
            secure: false,
            nodelay: true,
            noresolve: false,
            timeout: DEFAULT_TIMEOUT,
            fail_on_4xx: false,
            fail_on_5xx: true,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') { path } else { format!("/{path}") };
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the body, and its `Content-Type` when given.
    pub fn with_body(mut self, body: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        self.body = body.into();
        if let Some(content_type) = content_type {
            match HeaderValue::from_str(content_type) {
                Ok(value) => {
                    self.headers.insert(CONTENT_TYPE, value);
                }
                Err(_) => tracing::warn!(content_type, "Ignoring invalid content type"),
            }
        }
        self
    }

    /// Serialize `value` as a JSON body.
    pub fn with_json_body<T: Serialize>(self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(self.with_body(body, Some("application/json")))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Speak HTTPS instead of plain HTTP. The port is left as set.
    pub fn with_https(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Skip local resolution and let the connector resolve the host name.
    pub fn with_noresolve(mut self, noresolve: bool) -> Self {
        self.noresolve = noresolve;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fail_on_4xx(mut self, fail: bool) -> Self {
        self.fail_on_4xx = fail;
        self
    }

    pub fn with_fail_on_5xx(mut self, fail: bool) -> Self {
        self.fail_on_5xx = fail;
        self
    }

    /// `host:port/path`, as used in error messages.
    pub fn target(&self) -> String {
        format!("{}:{}{}", self.host, self.port, self.path)
    }

    /// Send the request and collect the response body.
    pub async fn fire(self) -> Result<Bytes, TransportError> {
        let target = self.target();
        tracing::debug!(target = %target, method = %self.method, "Firing outbound request");

        match tokio::time::timeout(self.timeout, self.execute(&target)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(target = %target, "Outbound request timed out");
                Err(TransportError::Timeout { target })
            }
        }
    }

    /// Send the request and parse the response body as JSON.
    pub async fn fire_json<T: DeserializeOwned>(self) -> Result<T, TransportError> {
        let target = self.target();
        let body = self.fire().await?;
        serde_json::from_slice(&body).map_err(|source| TransportError::InvalidJson { target, source })
    }

    fn uri(&self, authority: &str) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}{}", scheme, authority, self.path)
    }

    async fn execute(self, target: &str) -> Result<Bytes, TransportError> {
        let authority = if self.noresolve || self.secure {
            format!("{}:{}", self.host, self.port)
        } else {
            self.resolve().await?.to_string()
        };
        let failed = |source: BoxError| TransportError::Failed {
            target: target.to_string(),
            source,
        };

        let uri = self.uri(&authority);
        let mut request = Request::builder()
            .method(self.method)
            .uri(uri)
            .body(Full::new(self.body))
            .map_err(|e| failed(e.into()))?;
        *request.headers_mut() = self.headers;

        let mut http = HttpConnector::new();
        http.set_nodelay(self.nodelay);
        http.enforce_http(false);
        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);
        let client: Client<_, Full<Bytes>> = Client::builder(TokioExecutor::new()).build(connector);

        let response = client.request(request).await.map_err(|e| failed(e.into()))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| failed(e.into()))?
            .to_bytes();

        let fatal = (status.is_client_error() && self.fail_on_4xx)
            || (status.is_server_error() && self.fail_on_5xx);
        if fatal {
            return Err(TransportError::Status {
                target: target.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn resolve(&self) -> Result<SocketAddr, TransportError> {
        let resolve_error = |source| TransportError::Resolve {
            host: self.host.clone(),
            source,
        };
        let addresses: Vec<SocketAddr> = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(resolve_error)?
            .collect();

        addresses
            .iter()
            .find(|addr| addr.is_ipv6())
            .or_else(|| addresses.first())
            .copied()
            .ok_or_else(|| resolve_error(io::Error::new(io::ErrorKind::NotFound, "no addresses")))
    }
}
