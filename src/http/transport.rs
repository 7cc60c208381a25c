//! Transport abstraction and the reqwest-backed implementation.
//!
//! # Responsibilities
//! - Send one attempt of an outbound request
//! - Turn error statuses into failures so the pipeline can classify them
//! - Map transport errors onto the failure taxonomy
//!
//! # Design Decisions
//! - The transport has no timeout of its own; the timeout guard bounds each attempt
//! - The body of an error response is kept for diagnostics

use std::future::Future;
use thiserror::Error;

use crate::http::request::OutboundRequest;
use crate::http::response::OutboundResponse;
use crate::resilience::errors::{Classify, DefaultClassifier, FailureKind, ResilienceError};

/// Failure of a single transport attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream returned status {status}")]
    Status { status: u16, body: String },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport timed out")]
    TimedOut,

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid target `{target}`: {reason}")]
    InvalidTarget { target: String, reason: String },
}

impl TransportError {
    /// Status code of an error response, if the upstream answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Failure kind for this error.
    ///
    /// 5xx and connection-level failures are transient. Every 4xx, 429 included, is
    /// treated as a rejection of the request itself.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            TransportError::Status { status, .. } if *status >= 500 => FailureKind::Retryable,
            TransportError::Status { .. } => FailureKind::NonRetryable,
            TransportError::Connect(_) | TransportError::Request(_) => FailureKind::Retryable,
            TransportError::TimedOut => FailureKind::Timeout,
            TransportError::InvalidTarget { .. } => FailureKind::NonRetryable,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::TimedOut
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_builder() {
            TransportError::InvalidTarget {
                target: e.url().map(|u| u.to_string()).unwrap_or_default(),
                reason: e.to_string(),
            }
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Classifier for transport failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpClassifier;

impl Classify<TransportError> for HttpClassifier {
    fn classify(&self, error: &ResilienceError<TransportError>) -> FailureKind {
        match error {
            ResilienceError::Inner(e) => e.failure_kind(),
            other => DefaultClassifier.classify(other),
        }
    }
}

/// Sends one attempt of an outbound request.
///
/// Implementations return `TransportError::Status` for 4xx/5xx responses.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<OutboundResponse, TransportError>> + Send;
}

/// Transport backed by a shared `reqwest::Client` (connection pooling included).
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a preconfigured client (proxy settings, TLS, pool sizes).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<OutboundResponse, TransportError>> + Send {
        let client = self.client.clone();
        async move {
            let mut builder = client.request(request.method, request.url);
            if let Some(payload) = &request.payload {
                builder = builder.json(payload);
            }

            let response = builder.send().await?;
            let status = response.status();
            let body = response.text().await?;

            if status.is_client_error() || status.is_server_error() {
                tracing::debug!(status = status.as_u16(), "Upstream returned error status");
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            Ok(OutboundResponse::new(status.as_u16(), body))
        }
    }
}
