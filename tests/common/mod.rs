// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared helpers for the integration tests.

#![allow(dead_code)]

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::controller::Action;
use rrsync::context::Context;
use rrsync::crd::{RRset, RRsetSpec, RRsetStatus, SyncStatus, Zone, ZoneKind, ZoneRef, ZoneSpec};
use rrsync::metrics::MemoryStatusSink;
use rrsync::pdns::RecordsApi;
use rrsync::reconcilers::{reconcile_rrset, ReconcileError, UniquenessIndex};
use rrsync::store::MemoryStore;
use std::sync::Arc;

pub const NAMESPACE: &str = "dns-system";
pub const ZONE: &str = "example.com";

/// Upper bound on reconciles before a test gives up waiting for a fixpoint.
const MAX_PASSES: usize = 10;

pub fn zone(name: &str) -> Zone {
    Zone {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            uid: Some(format!("uid-zone-{name}")),
            ..Default::default()
        },
        spec: ZoneSpec {
            kind: ZoneKind::Native,
            nameservers: vec![format!("ns1.{name}")],
            catalog: None,
            soa_edit_api: None,
        },
        status: None,
    }
}

pub fn spec(record_type: &str, name: &str, records: &[&str]) -> RRsetSpec {
    RRsetSpec {
        r#type: record_type.to_string(),
        name: name.to_string(),
        ttl: 300,
        records: records.iter().map(|r| (*r).to_string()).collect(),
        comment: None,
        zone_ref: ZoneRef {
            name: ZONE.to_string(),
        },
    }
}

pub fn rrset(name: &str, spec: RRsetSpec) -> RRset {
    RRset {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..Default::default()
        },
        spec,
        status: None,
    }
}

/// In-memory store and status sink around any [`RecordsApi`].
pub struct Operator {
    pub store: Arc<MemoryStore>,
    pub sink: Arc<MemoryStatusSink>,
    pub ctx: Context,
}

impl Operator {
    pub fn new(records: Arc<dyn RecordsApi>) -> Self {
        let store = Arc::new(MemoryStore::new(Arc::new(UniquenessIndex::new())));
        let sink = Arc::new(MemoryStatusSink::new());
        let ctx = Context::in_memory(store.clone(), records, sink.clone());
        Self { store, sink, ctx }
    }

    pub async fn reconcile(&self, name: &str) -> Result<Action, ReconcileError> {
        reconcile_rrset(&self.ctx, NAMESPACE, name).await
    }

    /// Reconcile `name` until a pass leaves it untouched, as the controller
    /// would on the watch events its own writes produce.
    pub async fn settle(&self, name: &str) -> Result<Action, ReconcileError> {
        for _ in 0..MAX_PASSES {
            let before = self.snapshot(name);
            let action = self.reconcile(name).await?;
            if self.snapshot(name) == before {
                return Ok(action);
            }
        }
        panic!("{name} did not settle after {MAX_PASSES} reconciles");
    }

    /// The parts of `name` the reconciler writes, `None` once it is gone.
    fn snapshot(&self, name: &str) -> Option<(Vec<String>, Option<RRsetStatus>, usize)> {
        self.store.rrset(NAMESPACE, name).map(|r| {
            (
                r.metadata.finalizers.clone().unwrap_or_default(),
                r.status.clone(),
                r.metadata.owner_references.as_ref().map_or(0, Vec::len),
            )
        })
    }

    pub fn status(&self, name: &str) -> RRsetStatus {
        self.store
            .rrset(NAMESPACE, name)
            .and_then(|r| r.status)
            .unwrap_or_default()
    }

    pub fn sync_status(&self, name: &str) -> Option<SyncStatus> {
        self.status(name).sync_status
    }
}
