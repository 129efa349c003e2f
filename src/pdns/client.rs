// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `reqwest` implementation of [`RecordsApi`].

use super::types::{delete_entry, ExternalRRset, RRsetChange, RRsetPatch, ZoneResponse};
use super::RecordsApi;
use crate::dns_errors::PdnsError;
use crate::names::make_canonical;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

/// Header carrying the PowerDNS API key.
const API_KEY_HEADER: &str = "X-API-Key";

/// Connection settings for the PowerDNS HTTP API.
#[derive(Clone)]
pub struct PdnsConfig {
    /// Base URL of the API, e.g. `http://powerdns:8081`
    pub base_url: String,
    /// Value sent in the `X-API-Key` header
    pub api_key: String,
    /// PowerDNS server id, almost always `localhost`
    pub server_id: String,
    /// Per-request timeout
    pub timeout: Duration,
}

// The API key must never reach the logs.
impl std::fmt::Debug for PdnsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdnsConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<REDACTED>")
            .field("server_id", &self.server_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// PowerDNS HTTP API client.
#[derive(Clone)]
pub struct PdnsClient {
    http: HttpClient,
    base_url: Url,
    server_id: String,
    api_key: String,
}

impl std::fmt::Debug for PdnsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdnsClient")
            .field("base_url", &self.base_url.as_str())
            .field("server_id", &self.server_id)
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

impl PdnsClient {
    /// Build a client with its own HTTP connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &PdnsConfig) -> Result<Self, PdnsError> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PdnsError::Transport {
                url: config.base_url.clone(),
                source: e,
            })?;
        Self::from_reqwest(&config.base_url, &config.server_id, &config.api_key, http)
    }

    /// Build a client around an existing `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or cannot carry a path.
    pub fn from_reqwest(
        base_url: &str,
        server_id: &str,
        api_key: &str,
        http: HttpClient,
    ) -> Result<Self, PdnsError> {
        let base_url = Url::parse(base_url).map_err(|e| PdnsError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(PdnsError::InvalidUrl(format!(
                "{base_url} cannot be used as a base URL"
            )));
        }
        Ok(Self {
            http,
            base_url,
            server_id: server_id.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// `{base}/api/v1/servers/{server_id}/zones/{zone}.`
    fn zone_url(&self, zone: &str) -> Result<Url, PdnsError> {
        let zone_id = make_canonical(zone);
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| PdnsError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "v1", "servers", &self.server_id, "zones", &zone_id]);
        Ok(url)
    }

    async fn patch_zone(&self, zone: &str, body: &RRsetPatch) -> Result<(), PdnsError> {
        let url = self.zone_url(zone)?;

        debug!(url = %url, body = ?body, "PATCH PowerDNS zone");

        let response = self
            .http
            .patch(url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| PdnsError::Transport {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(
                url = %url,
                status = %status,
                error = %text,
                "PowerDNS PATCH failed"
            );
            return Err(PdnsError::from_status(status, &make_canonical(zone), &text));
        }

        Ok(())
    }
}

#[async_trait]
impl RecordsApi for PdnsClient {
    async fn get_rrsets(
        &self,
        zone: &str,
        name: &str,
        record_type: &str,
    ) -> Result<Vec<ExternalRRset>, PdnsError> {
        let mut url = self.zone_url(zone)?;
        url.query_pairs_mut()
            .append_pair("rrsets", "true")
            .append_pair("rrset_name", name)
            .append_pair("rrset_type", record_type);

        debug!(url = %url, "GET PowerDNS zone record-sets");

        let response = self
            .http
            .get(url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| PdnsError::Transport {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| PdnsError::Transport {
            url: url.to_string(),
            source: e,
        })?;

        if !status.is_success() {
            return Err(PdnsError::from_status(status, &make_canonical(zone), &text));
        }

        let zone_response: ZoneResponse =
            serde_json::from_str(&text).map_err(|e| PdnsError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(zone_response.rrsets)
    }

    async fn replace_rrset(&self, zone: &str, change: &RRsetChange) -> Result<(), PdnsError> {
        let body = RRsetPatch {
            rrsets: vec![change.to_replace()],
        };
        self.patch_zone(zone, &body).await?;

        info!(
            zone = %zone,
            name = %change.name,
            record_type = %change.record_type,
            ttl = change.ttl,
            "Replaced record-set on PowerDNS"
        );
        Ok(())
    }

    async fn delete_rrset(
        &self,
        zone: &str,
        name: &str,
        record_type: &str,
    ) -> Result<(), PdnsError> {
        let body = RRsetPatch {
            rrsets: vec![delete_entry(name, record_type)],
        };
        self.patch_zone(zone, &body).await?;

        info!(
            zone = %zone,
            name = %name,
            record_type = %record_type,
            "Deleted record-set on PowerDNS"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
