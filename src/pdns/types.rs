// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Wire types for the PowerDNS HTTP API (`/api/v1`).

use serde::{Deserialize, Serialize};

/// Zone object as returned by `GET /servers/{server_id}/zones/{zone_id}`.
///
/// Only the fields the record-set controller reads are modelled; everything
/// else in the response is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ZoneResponse {
    /// Canonical zone name
    pub name: String,
    /// Record-sets in the zone (filtered by the `rrset_name`/`rrset_type` query)
    #[serde(default)]
    pub rrsets: Vec<ExternalRRset>,
}

/// A record-set as held by PowerDNS.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalRRset {
    /// Canonical owner name (`www.example.com.`)
    pub name: String,
    /// Record type (`A`, `TXT`, ...)
    #[serde(rename = "type")]
    pub record_type: String,
    /// TTL in seconds; absent on `DELETE` changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Change type, only present on `PATCH` bodies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changetype: Option<ChangeType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<Record>,
    /// Omitted from `PATCH` bodies when empty: an explicit empty list would
    /// erase comments PowerDNS already holds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

/// One record inside a record-set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub content: String,
    #[serde(default)]
    pub disabled: bool,
}

/// Comment attached to a record-set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub content: String,
    #[serde(default)]
    pub account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<u64>,
}

/// `changetype` of an entry in a `PATCH` body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Replace,
    Delete,
}

/// Body of `PATCH /servers/{server_id}/zones/{zone_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RRsetPatch {
    pub rrsets: Vec<ExternalRRset>,
}

/// Desired content of a record-set, independent of the wire format.
///
/// `name` must already be canonical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RRsetChange {
    pub name: String,
    pub record_type: String,
    pub ttl: u32,
    pub records: Vec<String>,
    /// Comment content; `None` leaves existing comments untouched.
    pub comment: Option<String>,
    /// Account recorded as the author of `comment`.
    pub account: String,
}

impl RRsetChange {
    /// Wire representation with `changetype: REPLACE`.
    #[must_use]
    pub fn to_replace(&self) -> ExternalRRset {
        ExternalRRset {
            name: self.name.clone(),
            record_type: self.record_type.clone(),
            ttl: Some(self.ttl),
            changetype: Some(ChangeType::Replace),
            records: self
                .records
                .iter()
                .map(|content| Record {
                    content: content.clone(),
                    disabled: false,
                })
                .collect(),
            comments: self
                .comment
                .iter()
                .map(|content| Comment {
                    content: content.clone(),
                    account: self.account.clone(),
                    modified_at: None,
                })
                .collect(),
        }
    }
}

/// Wire representation of deleting `name`/`record_type`.
#[must_use]
pub fn delete_entry(name: &str, record_type: &str) -> ExternalRRset {
    ExternalRRset {
        name: name.to_string(),
        record_type: record_type.to_string(),
        ttl: None,
        changetype: Some(ChangeType::Delete),
        records: Vec::new(),
        comments: Vec::new(),
    }
}
