// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! API-server backed persistence.

use super::{namespace_of, RRsetStore, StoreError, ZoneLookup};
use crate::constants::{API_GROUP_VERSION, KIND_RRSET, KIND_ZONE};
use crate::crd::{RRset, RRsetStatus, Zone};
use crate::reconcilers::index::UniquenessIndex;
use async_trait::async_trait;
use kube::api::{Patch, PatchParams, PostParams};
use kube::runtime::reflector::ObjectRef;
use kube::{Api, Client, ResourceExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Map a write error to [`StoreError`], keeping 409 and 404 distinct.
pub(crate) fn classify(err: kube::Error, kind: &'static str, namespace: &str, name: &str) -> StoreError {
    match &err {
        kube::Error::Api(response) if response.code == 409 => StoreError::Conflict {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(response) if response.code == 404 => StoreError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        _ => StoreError::Api(err),
    }
}

/// JSON merge patch body for the status subresource.
///
/// Every field is present so that `None` clears a stale value, and
/// `metadata.resourceVersion` makes the API server reject the patch with 409
/// when the object moved on.
pub(crate) fn status_merge_patch(resource_version: Option<&str>, status: &RRsetStatus) -> Value {
    json!({
        "apiVersion": API_GROUP_VERSION,
        "kind": KIND_RRSET,
        "metadata": {
            "resourceVersion": resource_version,
        },
        "status": {
            "lastUpdateTime": status.last_update_time,
            "dnsEntryName": status.dns_entry_name,
            "syncStatus": status.sync_status,
            "syncErrorDescription": status.sync_error_description,
            "observedGeneration": status.observed_generation,
        }
    })
}

/// `RRset` persistence through the Kubernetes API.
#[derive(Clone)]
pub struct KubeRRsetStore {
    client: Client,
    index: Arc<UniquenessIndex>,
}

impl KubeRRsetStore {
    #[must_use]
    pub fn new(client: Client, index: Arc<UniquenessIndex>) -> Self {
        Self { client, index }
    }

    fn api(&self, namespace: &str) -> Api<RRset> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl RRsetStore for KubeRRsetStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<RRset>, StoreError> {
        Ok(self.api(namespace).get_opt(name).await?)
    }

    fn list_by_index(&self, key: &str) -> Vec<ObjectRef<RRset>> {
        self.index.claimants(key)
    }

    async fn update(&self, rrset: &RRset) -> Result<RRset, StoreError> {
        let namespace = namespace_of(rrset)?;
        let name = rrset.name_any();

        debug!(namespace = %namespace, name = %name, "Replacing RRset");

        let updated = self
            .api(&namespace)
            .replace(&name, &PostParams::default(), rrset)
            .await
            .map_err(|e| classify(e, KIND_RRSET, &namespace, &name))
            .inspect_err(|e| {
                if e.is_conflict() {
                    warn!(namespace = %namespace, name = %name, "Conflict replacing RRset");
                }
            })?;

        self.index.reindex(&updated);
        Ok(updated)
    }

    async fn patch_status(
        &self,
        rrset: &RRset,
        status: &RRsetStatus,
    ) -> Result<RRset, StoreError> {
        let namespace = namespace_of(rrset)?;
        let name = rrset.name_any();
        let patch = status_merge_patch(rrset.resource_version().as_deref(), status);

        debug!(
            namespace = %namespace,
            name = %name,
            status = ?status.sync_status,
            "Patching RRset status"
        );

        let updated = self
            .api(&namespace)
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| classify(e, KIND_RRSET, &namespace, &name))
            .inspect_err(|e| {
                if e.is_conflict() {
                    warn!(namespace = %namespace, name = %name, "Conflict patching RRset status");
                }
            })?;

        self.index.reindex(&updated);
        Ok(updated)
    }
}

/// `Zone` lookup through the Kubernetes API.
#[derive(Clone)]
pub struct KubeZoneLookup {
    client: Client,
}

impl KubeZoneLookup {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ZoneLookup for KubeZoneLookup {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Zone>, StoreError> {
        let api: Api<Zone> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| classify(e, KIND_ZONE, namespace, name))
    }
}

#[cfg(test)]
#[path = "kubernetes_tests.rs"]
mod kubernetes_tests;
