// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for PowerDNS record-set management.
//!
//! # Resource Types
//!
//! - [`Zone`] - An authoritative zone hosted on PowerDNS. The zone name is the
//!   resource's `metadata.name` (e.g. `example.com`).
//! - [`RRset`] - One record-set (name + type + TTL + records) inside a [`Zone`].
//!
//! # Example: Declaring a record-set
//!
//! ```rust,no_run
//! use rrsync::crd::{RRsetSpec, ZoneRef};
//!
//! let spec = RRsetSpec {
//!     r#type: "A".to_string(),
//!     name: "www".to_string(),
//!     ttl: 300,
//!     records: vec!["192.0.2.1".to_string()],
//!     comment: None,
//!     zone_ref: ZoneRef {
//!         name: "example.com".to_string(),
//!     },
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Outcome of the last sync of a resource against PowerDNS.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum SyncStatus {
    /// The external record-set matches the desired spec.
    Succeeded,
    /// The resource could not be synced; see `syncErrorDescription`.
    Failed,
}

impl SyncStatus {
    /// Wire representation, also used as the metrics `status` label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Succeeded => "Succeeded",
            SyncStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PowerDNS zone kind.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
pub enum ZoneKind {
    /// Replicated by the backend database.
    #[default]
    Native,
    /// Primary zone, sends NOTIFY to secondaries.
    Master,
    /// Secondary zone, transferred from the masters.
    Slave,
    /// Catalog producer.
    Producer,
    /// Catalog consumer.
    Consumer,
}

/// `Zone` status, owned by the zone controller.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_status: Option<SyncStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_error_description: Option<String>,
}

/// `Zone` declares an authoritative zone on the PowerDNS server.
///
/// The zone name is the resource name, so a `Zone` called `example.com`
/// manages the PowerDNS zone `example.com.`.
///
/// # Example
///
/// ```yaml
/// apiVersion: rrsync.firestoned.io/v1alpha1
/// kind: Zone
/// metadata:
///   name: example.com
///   namespace: dns-system
/// spec:
///   kind: Native
///   nameservers:
///     - ns1.example.com
///     - ns2.example.com
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "rrsync.firestoned.io",
    version = "v1alpha1",
    kind = "Zone",
    namespaced,
    doc = "Zone is an authoritative DNS zone hosted on PowerDNS. The resource name is the zone name."
)]
#[kube(status = "ZoneStatus")]
#[kube(printcolumn = r#"{"name":"Serial","type":"integer","jsonPath":".status.serial"}"#)]
#[kube(printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.syncStatus"}"#)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSpec {
    /// PowerDNS zone kind.
    #[serde(default)]
    pub kind: ZoneKind,

    /// Nameservers announced in the zone's NS record-set.
    #[serde(default)]
    pub nameservers: Vec<String>,

    /// Catalog zone this zone is a member of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,

    /// PowerDNS `SOA-EDIT-API` setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soa_edit_api: Option<String>,
}

impl Zone {
    /// DNS name of this zone (the resource name).
    #[must_use]
    pub fn zone_name(&self) -> String {
        kube::ResourceExt::name_any(self)
    }
}

/// Reference to the parent `Zone` of a record-set, in the same namespace.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ZoneRef {
    /// Name of the `Zone` resource.
    pub name: String,
}

/// `RRset` status, owned by the record-set controller.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RRsetStatus {
    /// Last time the record-set was written to PowerDNS (RFC3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,

    /// Fully-qualified DNS name the record-set resolved to (trailing dot).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_entry_name: Option<String>,

    /// Outcome of the last sync. Absent until the first sync finishes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_status: Option<SyncStatus>,

    /// Reason for a `Failed` sync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_error_description: Option<String>,

    /// `metadata.generation` the status was computed for. A `Failed`
    /// record-set is only re-evaluated once its spec moves past it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// `RRset` declares one DNS record-set inside a `Zone`.
///
/// The record name is resolved against the zone: `www` in zone `example.com`
/// becomes `www.example.com.`, a name ending in `.` is used as-is, and `@`
/// is the zone apex.
///
/// # Example
///
/// ```yaml
/// apiVersion: rrsync.firestoned.io/v1alpha1
/// kind: RRset
/// metadata:
///   name: www-example-com
///   namespace: dns-system
/// spec:
///   type: A
///   name: www
///   ttl: 300
///   records:
///     - 192.0.2.1
///     - 192.0.2.2
///   comment: Web frontends
///   zoneRef:
///     name: example.com
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[kube(
    group = "rrsync.firestoned.io",
    version = "v1alpha1",
    kind = "RRset",
    namespaced,
    shortname = "rrs",
    doc = "RRset is a DNS record-set (name, type, TTL and records) synchronized to a PowerDNS zone."
)]
#[kube(status = "RRsetStatus")]
#[kube(printcolumn = r#"{"name":"Zone","type":"string","jsonPath":".spec.zoneRef.name"}"#)]
#[kube(printcolumn = r#"{"name":"Name","type":"string","jsonPath":".status.dnsEntryName"}"#)]
#[kube(printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#)]
#[kube(printcolumn = r#"{"name":"TTL","type":"integer","jsonPath":".spec.ttl"}"#)]
#[kube(printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.syncStatus"}"#)]
#[serde(rename_all = "camelCase")]
pub struct RRsetSpec {
    /// DNS record type (A, AAAA, CNAME, TXT, MX, NS, SRV, PTR, CAA, ...).
    pub r#type: String,

    /// Record name, relative to the zone unless it ends with a dot. `@` is the apex.
    pub name: String,

    /// Time To Live in seconds.
    pub ttl: u32,

    /// Record contents, in PowerDNS presentation format.
    pub records: Vec<String>,

    /// Optional comment stored alongside the record-set in PowerDNS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Parent zone.
    pub zone_ref: ZoneRef,
}

impl RRset {
    /// Sync status from the last reconciliation, if any.
    #[must_use]
    pub fn sync_status(&self) -> Option<SyncStatus> {
        self.status.as_ref().and_then(|s| s.sync_status)
    }

    /// Whether the last reconciliation left this record-set `Failed`.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.sync_status() == Some(SyncStatus::Failed)
    }

    /// Whether this record-set is `Failed` for its current spec.
    ///
    /// A failed record-set stays failed until its spec is edited; a status
    /// without `observedGeneration` counts as current.
    #[must_use]
    pub fn is_pinned_failed(&self) -> bool {
        let Some(status) = self.status.as_ref() else {
            return false;
        };
        status.sync_status == Some(SyncStatus::Failed)
            && match (status.observed_generation, self.metadata.generation) {
                (Some(observed), Some(current)) => observed >= current,
                _ => true,
            }
    }

    /// Whether the deferred-cleanup finalizer is present.
    #[must_use]
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|x| x == finalizer))
    }

    /// Whether deletion has been requested.
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}
