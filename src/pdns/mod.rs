// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! PowerDNS management via its HTTP API.
//!
//! The record-set controller only needs three calls against the authoritative
//! server, captured by the [`RecordsApi`] trait:
//!
//! - read the record-sets matching a name and type
//! - replace a record-set (create or update, one atomic `PATCH`)
//! - delete a record-set
//!
//! [`PdnsClient`] implements the trait over `reqwest`. It performs exactly one
//! HTTP request per call and never retries: retry scheduling belongs to the
//! controller, and the client's request timeout guarantees a call cannot hang.
//! [`MemoryPdns`] is an in-process implementation for tests and local runs.
//!
//! # Example
//!
//! ```rust,no_run
//! use rrsync::pdns::{PdnsClient, PdnsConfig, RecordsApi};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = PdnsClient::new(&PdnsConfig {
//!     base_url: "http://powerdns.dns-system.svc:8081".to_string(),
//!     api_key: "secret".to_string(),
//!     server_id: "localhost".to_string(),
//!     timeout: Duration::from_secs(30),
//! })?;
//!
//! let rrsets = client.get_rrsets("example.com.", "www.example.com.", "A").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod memory;
pub mod types;

pub use client::{PdnsClient, PdnsConfig};
pub use memory::{MemoryPdns, RecordedCall};
pub use types::{ExternalRRset, RRsetChange};

use crate::dns_errors::PdnsError;
use async_trait::async_trait;

/// Record-set operations against the authoritative DNS server.
///
/// All names passed in are canonical (trailing dot).
#[async_trait]
pub trait RecordsApi: Send + Sync {
    /// Return the record-sets PowerDNS reports for `name`/`record_type` in `zone`.
    ///
    /// The server may include record-sets other than the one asked for
    /// (PowerDNS issue #14539); callers must filter by name.
    ///
    /// # Errors
    ///
    /// Returns [`PdnsError::ZoneNotFound`] when the zone does not exist, or any
    /// other [`PdnsError`] when the request fails.
    async fn get_rrsets(
        &self,
        zone: &str,
        name: &str,
        record_type: &str,
    ) -> Result<Vec<ExternalRRset>, PdnsError>;

    /// Create or replace a record-set in one atomic change.
    ///
    /// # Errors
    ///
    /// Returns a [`PdnsError`] when the server rejects the change or is unreachable.
    async fn replace_rrset(&self, zone: &str, change: &RRsetChange) -> Result<(), PdnsError>;

    /// Delete a record-set. Deleting a record-set that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns a [`PdnsError`] when the server rejects the change or is unreachable.
    async fn delete_rrset(&self, zone: &str, name: &str, record_type: &str)
        -> Result<(), PdnsError>;
}
