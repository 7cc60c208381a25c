//! Outbound request construction.
//!
//! # Responsibilities
//! - Parse and validate the target URL before anything is sent
//! - Carry method and optional JSON payload through every attempt
//!
//! # Design Decisions
//! - Requests are cheap to clone; each retry attempt sends its own copy
//! - Only http and https targets are accepted

use reqwest::Method;
use url::Url;

use crate::http::transport::TransportError;

/// A single logical outbound call, replayed on every attempt.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub payload: Option<serde_json::Value>,
}

impl OutboundRequest {
    /// Build a request, rejecting targets that cannot be sent.
    pub fn new(
        method: Method,
        target: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<Self, TransportError> {
        let url = Url::parse(target).map_err(|e| TransportError::InvalidTarget {
            target: target.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(TransportError::InvalidTarget {
                    target: target.to_string(),
                    reason: format!("unsupported scheme `{}`", other),
                })
            }
        }

        Ok(Self {
            method,
            url,
            payload,
        })
    }
}
