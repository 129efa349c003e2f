// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Builders shared by the unit tests.

use crate::constants::FINALIZER_RRSET;
use crate::crd::{RRset, RRsetSpec, RRsetStatus, SyncStatus, Zone, ZoneKind, ZoneRef, ZoneSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use k8s_openapi::chrono::Utc;

pub const TEST_NAMESPACE: &str = "dns-system";
pub const TEST_ZONE: &str = "example.com";

/// `Zone` named `name` in [`TEST_NAMESPACE`].
pub fn zone(name: &str) -> Zone {
    Zone {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            uid: Some(format!("uid-zone-{name}")),
            ..Default::default()
        },
        spec: ZoneSpec {
            kind: ZoneKind::Native,
            nameservers: vec!["ns1.example.com".to_string()],
            catalog: None,
            soa_edit_api: None,
        },
        status: None,
    }
}

/// `A` record-set `name` for `record_name` in [`TEST_ZONE`], without finalizer or status.
pub fn rrset(name: &str, record_name: &str, records: &[&str]) -> RRset {
    RRset {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            uid: Some(format!("uid-rrset-{name}")),
            generation: Some(1),
            ..Default::default()
        },
        spec: RRsetSpec {
            r#type: "A".to_string(),
            name: record_name.to_string(),
            ttl: 300,
            records: records.iter().map(|r| (*r).to_string()).collect(),
            comment: None,
            zone_ref: ZoneRef {
                name: TEST_ZONE.to_string(),
            },
        },
        status: None,
    }
}

pub fn with_finalizer(mut rrset: RRset) -> RRset {
    rrset
        .metadata
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(FINALIZER_RRSET.to_string());
    rrset
}

pub fn deleting(mut rrset: RRset) -> RRset {
    rrset.metadata.deletion_timestamp = Some(Time(Utc::now()));
    rrset
}

pub fn with_sync_status(mut rrset: RRset, sync_status: SyncStatus) -> RRset {
    let generation = rrset.metadata.generation;
    let status = rrset.status.get_or_insert_with(RRsetStatus::default);
    status.sync_status = Some(sync_status);
    status.observed_generation = generation;
    if sync_status == SyncStatus::Failed {
        status.sync_error_description = Some("boom".to_string());
    }
    rrset
}
