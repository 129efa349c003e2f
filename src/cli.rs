// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line and environment configuration of the operator.
//!
//! Every flag can also be set through the environment variable named next to
//! it, which is how the operator is normally configured in a Deployment.

use crate::constants::{DEFAULT_METRICS_ADDR, DEFAULT_PDNS_SERVER_ID, DEFAULT_PDNS_TIMEOUT_SECS};
use crate::pdns::PdnsConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// rrsync -- keep PowerDNS record-sets in line with `RRset` resources
#[derive(Debug, Parser)]
#[command(name = "rrsync", version, about)]
pub struct OperatorArgs {
    /// Base URL of the PowerDNS HTTP API
    #[arg(long, env = "PDNS_API_URL")]
    pub pdns_url: String,

    /// PowerDNS API key
    #[arg(long, env = "PDNS_API_KEY", hide_env_values = true)]
    pub pdns_api_key: String,

    /// PowerDNS server id
    #[arg(long, env = "PDNS_SERVER_ID", default_value = DEFAULT_PDNS_SERVER_ID)]
    pub pdns_server_id: String,

    /// Timeout of each PowerDNS request, in seconds
    #[arg(long, env = "PDNS_TIMEOUT_SECS", default_value_t = DEFAULT_PDNS_TIMEOUT_SECS)]
    pub pdns_timeout_secs: u64,

    /// Listen address of the metrics and health endpoints
    #[arg(long, env = "METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: SocketAddr,

    /// Only watch this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,
}

impl OperatorArgs {
    /// PowerDNS client settings from these arguments.
    #[must_use]
    pub fn pdns_config(&self) -> PdnsConfig {
        PdnsConfig {
            base_url: self.pdns_url.clone(),
            api_key: self.pdns_api_key.clone(),
            server_id: self.pdns_server_id.clone(),
            timeout: Duration::from_secs(self.pdns_timeout_secs),
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod cli_tests;
