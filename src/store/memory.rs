// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process persistence.
//!
//! [`MemoryStore`] behaves like the API server for the operations the
//! reconciler uses: every write bumps `resourceVersion`, stale writes are
//! rejected with [`StoreError::Conflict`], `update` never touches status, and
//! an object that is being deleted disappears once its last finalizer is
//! removed. It also offers the "user side" calls (create, edit, delete)
//! needed to drive the reconciler without a cluster.

use super::{namespace_of, RRsetStore, StoreError, ZoneLookup};
use crate::constants::KIND_RRSET;
use crate::crd::{RRset, RRsetSpec, RRsetStatus, Zone};
use crate::reconcilers::index::{object_ref, UniquenessIndex};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::chrono::Utc;
use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

type Key = (String, String);

#[derive(Default)]
struct MemoryState {
    rrsets: BTreeMap<Key, RRset>,
    zones: BTreeMap<Key, Zone>,
    resource_version: u64,
    pending_conflicts: usize,
}

impl MemoryState {
    fn next_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    /// Consume one injected conflict, if any.
    fn take_conflict(&mut self) -> bool {
        if self.pending_conflicts > 0 {
            self.pending_conflicts -= 1;
            true
        } else {
            false
        }
    }
}

/// In-memory `RRset` store and `Zone` lookup.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    index: Arc<UniquenessIndex>,
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn conflict(namespace: &str, name: &str) -> StoreError {
    StoreError::Conflict {
        kind: KIND_RRSET,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn not_found(namespace: &str, name: &str) -> StoreError {
    StoreError::NotFound {
        kind: KIND_RRSET,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

impl MemoryStore {
    /// Empty store feeding `index` on every write.
    #[must_use]
    pub fn new(index: Arc<UniquenessIndex>) -> Self {
        Self {
            state: Mutex::default(),
            index,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a new record-set, as `kubectl apply` would on first creation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingNamespace`] if `rrset` has no namespace.
    pub fn create_rrset(&self, mut rrset: RRset) -> Result<RRset, StoreError> {
        let namespace = namespace_of(&rrset)?;
        let name = rrset.name_any();
        let mut state = self.lock();

        rrset.metadata.resource_version = Some(state.next_version());
        rrset.metadata.generation = Some(1);
        rrset
            .metadata
            .uid
            .get_or_insert_with(|| format!("uid-{namespace}-{name}"));
        rrset.metadata.deletion_timestamp = None;

        state.rrsets.insert(key(&namespace, &name), rrset.clone());
        drop(state);

        self.index.reindex(&rrset);
        Ok(rrset)
    }

    /// Replace the spec of a stored record-set, bumping its generation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the record-set does not exist.
    pub fn edit_spec(
        &self,
        namespace: &str,
        name: &str,
        spec: RRsetSpec,
    ) -> Result<RRset, StoreError> {
        let mut state = self.lock();
        let version = state.next_version();
        let stored = state
            .rrsets
            .get_mut(&key(namespace, name))
            .ok_or_else(|| not_found(namespace, name))?;

        stored.spec = spec;
        stored.metadata.generation = Some(stored.metadata.generation.unwrap_or(0) + 1);
        stored.metadata.resource_version = Some(version);
        let updated = stored.clone();
        drop(state);

        self.index.reindex(&updated);
        Ok(updated)
    }

    /// Request deletion. Without finalizers the object is removed immediately,
    /// otherwise it only gets a deletion timestamp.
    ///
    /// Returns whether the object was removed.
    pub fn delete_rrset(&self, namespace: &str, name: &str) -> bool {
        let mut state = self.lock();
        let version = state.next_version();
        let k = key(namespace, name);
        let Some(stored) = state.rrsets.get_mut(&k) else {
            return false;
        };

        if stored.finalizers().is_empty() {
            if let Some(removed) = state.rrsets.remove(&k) {
                drop(state);
                self.index.remove(&object_ref(&removed));
            }
            return true;
        }

        if stored.metadata.deletion_timestamp.is_none() {
            stored.metadata.deletion_timestamp = Some(Time(Utc::now()));
            stored.metadata.resource_version = Some(version);
        }
        false
    }

    /// Current copy of a record-set.
    #[must_use]
    pub fn rrset(&self, namespace: &str, name: &str) -> Option<RRset> {
        self.lock().rrsets.get(&key(namespace, name)).cloned()
    }

    /// Every stored record-set, ordered by namespace and name.
    #[must_use]
    pub fn rrsets(&self) -> Vec<RRset> {
        self.lock().rrsets.values().cloned().collect()
    }

    /// Store or replace a zone.
    pub fn put_zone(&self, zone: Zone) {
        let namespace = zone.namespace().unwrap_or_default();
        let name = zone.name_any();
        self.lock().zones.insert(key(&namespace, &name), zone);
    }

    /// Remove a zone. Record-sets are left in place.
    pub fn delete_zone(&self, namespace: &str, name: &str) {
        self.lock().zones.remove(&key(namespace, name));
    }

    /// Make the next `count` writes fail with [`StoreError::Conflict`].
    pub fn inject_conflicts(&self, count: usize) {
        self.lock().pending_conflicts += count;
    }

    /// Index fed by this store.
    #[must_use]
    pub fn index(&self) -> Arc<UniquenessIndex> {
        self.index.clone()
    }
}

#[async_trait]
impl RRsetStore for MemoryStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<RRset>, StoreError> {
        Ok(self.rrset(namespace, name))
    }

    fn list_by_index(&self, key: &str) -> Vec<ObjectRef<RRset>> {
        self.index.claimants(key)
    }

    async fn update(&self, rrset: &RRset) -> Result<RRset, StoreError> {
        let namespace = namespace_of(rrset)?;
        let name = rrset.name_any();
        let k = key(&namespace, &name);

        let mut state = self.lock();
        if state.take_conflict() {
            return Err(conflict(&namespace, &name));
        }
        let stored = state
            .rrsets
            .get(&k)
            .ok_or_else(|| not_found(&namespace, &name))?;
        if rrset.resource_version().is_some() && rrset.resource_version() != stored.resource_version() {
            return Err(conflict(&namespace, &name));
        }

        let mut updated = rrset.clone();
        updated.status.clone_from(&stored.status);
        updated.metadata.deletion_timestamp = stored.metadata.deletion_timestamp.clone();
        updated.metadata.generation = if updated.spec == stored.spec {
            stored.metadata.generation
        } else {
            Some(stored.metadata.generation.unwrap_or(0) + 1)
        };
        updated.metadata.resource_version = Some(state.next_version());

        if updated.metadata.deletion_timestamp.is_some() && updated.finalizers().is_empty() {
            debug!(namespace = %namespace, name = %name, "Last finalizer removed, purging RRset");
            state.rrsets.remove(&k);
            drop(state);
            self.index.remove(&object_ref(&updated));
            return Ok(updated);
        }

        state.rrsets.insert(k, updated.clone());
        drop(state);

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

        let mut state = self.lock();
        if state.take_conflict() {
            return Err(conflict(&namespace, &name));
        }
        let version = state.next_version();
        let stored = state
            .rrsets
            .get_mut(&key(&namespace, &name))
            .ok_or_else(|| not_found(&namespace, &name))?;
        if rrset.resource_version().is_some() && rrset.resource_version() != stored.resource_version() {
            return Err(conflict(&namespace, &name));
        }

        stored.status = Some(status.clone());
        stored.metadata.resource_version = Some(version);
        let updated = stored.clone();
        drop(state);

        self.index.reindex(&updated);
        Ok(updated)
    }
}

#[async_trait]
impl ZoneLookup for MemoryStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Zone>, StoreError> {
        Ok(self.lock().zones.get(&key(namespace, name)).cloned())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
