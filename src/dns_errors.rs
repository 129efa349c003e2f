// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! PowerDNS HTTP API error types.
//!
//! These errors are surfaced verbatim in `RRset.status.syncErrorDescription`,
//! so their messages are written for the person reading the resource status.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by the PowerDNS HTTP API client.
#[derive(Error, Debug)]
pub enum PdnsError {
    /// The zone does not exist on the PowerDNS server (HTTP 404).
    #[error("Zone '{zone}' not found on PowerDNS server")]
    ZoneNotFound {
        /// Canonical zone name that was requested
        zone: String,
    },

    /// The API key was rejected (HTTP 401 or 403).
    #[error("PowerDNS API rejected credentials (HTTP {status})")]
    Unauthorized {
        /// HTTP status returned by the server
        status: u16,
    },

    /// The API answered with an unexpected status.
    ///
    /// `message` is the `error` field of the PowerDNS error body when present,
    /// otherwise the raw body.
    #[error("PowerDNS API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status returned by the server
        status: u16,
        /// Error text from the response body
        message: String,
    },

    /// The request never produced an HTTP response (DNS, connect, TLS, timeout).
    #[error("PowerDNS API request to {url} failed: {source}")]
    Transport {
        /// URL that was being requested
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode PowerDNS API response from {url}: {reason}")]
    Decode {
        /// URL that was being requested
        url: String,
        /// Decoder message
        reason: String,
    },

    /// The configured base URL could not be combined with an API path.
    #[error("Invalid PowerDNS API URL: {0}")]
    InvalidUrl(String),
}

impl PdnsError {
    /// Whether this error means the requested object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PdnsError::ZoneNotFound { .. } | PdnsError::Api { status: 404, .. }
        )
    }

    /// Build an error from a non-success HTTP status and its response body.
    #[must_use]
    pub fn from_status(status: StatusCode, zone: &str, body: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND => PdnsError::ZoneNotFound {
                zone: zone.to_string(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PdnsError::Unauthorized {
                status: status.as_u16(),
            },
            _ => PdnsError::Api {
                status: status.as_u16(),
                message: extract_error_message(body),
            },
        }
    }
}

/// PowerDNS error bodies look like `{"error": "..."}`; fall back to the raw text.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "empty response body".to_string()
            } else {
                body.trim().to_string()
            }
        })
}
