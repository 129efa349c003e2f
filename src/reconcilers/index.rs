// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Uniqueness index over `RRset` resources.
//!
//! Maps `"<canonical name>/<TYPE>"` to the record-sets claiming that entry.
//! Only record-sets whose sync status is unset or `Succeeded` claim a key: a
//! `Failed` duplicate drops out so it cannot keep itself failed.
//!
//! The index is eventually consistent. It is refreshed by the persistence
//! layer after every successful write and by the controller's watch stream;
//! nothing in the reconciler holds it locked across an await point.

use crate::crd::{RRset, SyncStatus};
use crate::names::{entry_key, rrset_fqdn};
use k8s_openapi::chrono::{DateTime, Utc};
use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Uniqueness key of a record-set, ignoring its status.
#[must_use]
pub fn spec_key(rrset: &RRset) -> String {
    entry_key(&rrset_fqdn(rrset), &rrset.spec.r#type)
}

/// Key under which `rrset` is indexed, or `None` when it is `Failed`.
#[must_use]
pub fn derive_key(rrset: &RRset) -> Option<String> {
    if rrset.is_failed() {
        None
    } else {
        Some(spec_key(rrset))
    }
}

/// Stable identity of a record-set (namespace + name).
#[must_use]
pub fn object_ref(rrset: &RRset) -> ObjectRef<RRset> {
    let name = rrset.name_any();
    match rrset.namespace() {
        Some(namespace) => ObjectRef::new(&name).within(&namespace),
        None => ObjectRef::new(&name),
    }
}

/// Precedence of a claim on a name and type. The smallest rank wins.
///
/// A record-set already `Succeeded` under that name outranks any newcomer.
/// Otherwise the oldest object wins, then the smallest uid, so every pair
/// of claimants agrees on a single winner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClaimRank {
    unestablished: bool,
    untimestamped: bool,
    created: Option<DateTime<Utc>>,
    uid: String,
    namespace: String,
    name: String,
}

/// Rank of `rrset` as a claimant of `fqdn`.
#[must_use]
pub fn claim_rank(rrset: &RRset, fqdn: &str) -> ClaimRank {
    let established = rrset.status.as_ref().is_some_and(|s| {
        s.sync_status == Some(SyncStatus::Succeeded) && s.dns_entry_name.as_deref() == Some(fqdn)
    });
    let created = rrset.metadata.creation_timestamp.as_ref().map(|t| t.0);

    ClaimRank {
        unestablished: !established,
        untimestamped: created.is_none(),
        created,
        uid: rrset.metadata.uid.clone().unwrap_or_default(),
        namespace: rrset.namespace().unwrap_or_default(),
        name: rrset.name_any(),
    }
}

#[derive(Debug, Default)]
struct IndexState {
    claimants: HashMap<String, HashSet<ObjectRef<RRset>>>,
    // Reverse map so a re-key or removal does not scan every entry.
    keys: HashMap<ObjectRef<RRset>, String>,
}

impl IndexState {
    fn detach(&mut self, object: &ObjectRef<RRset>) {
        if let Some(old_key) = self.keys.remove(object) {
            if let Some(set) = self.claimants.get_mut(&old_key) {
                set.remove(object);
                if set.is_empty() {
                    self.claimants.remove(&old_key);
                }
            }
        }
    }
}

/// Materialized `"<fqdn>/<TYPE>"` → claimants index.
#[derive(Debug, Default)]
pub struct UniquenessIndex {
    state: RwLock<IndexState>,
}

impl UniquenessIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current key of `rrset`, replacing any key it had before.
    pub fn reindex(&self, rrset: &RRset) {
        let object = object_ref(rrset);
        let key = derive_key(rrset);

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.detach(&object);
        if let Some(key) = key {
            debug!(rrset = %object, key = %key, "Indexed RRset");
            state
                .claimants
                .entry(key.clone())
                .or_default()
                .insert(object.clone());
            state.keys.insert(object, key);
        } else {
            debug!(rrset = %object, "RRset is Failed, removed from index");
        }
    }

    /// Rebuild the index from a complete listing of record-sets.
    pub fn replace_all<'a>(&self, rrsets: impl IntoIterator<Item = &'a RRset>) {
        let mut fresh = IndexState::default();
        for rrset in rrsets {
            let object = object_ref(rrset);
            fresh.detach(&object);
            if let Some(key) = derive_key(rrset) {
                fresh
                    .claimants
                    .entry(key.clone())
                    .or_default()
                    .insert(object.clone());
                fresh.keys.insert(object, key);
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = fresh;
        debug!(keys = state.claimants.len(), "Rebuilt RRset index");
    }

    /// Drop `object` from the index entirely.
    pub fn remove(&self, object: &ObjectRef<RRset>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.detach(object);
    }

    /// Record-sets currently claiming `key`, ordered by namespace and name.
    #[must_use]
    pub fn claimants(&self, key: &str) -> Vec<ObjectRef<RRset>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut refs: Vec<_> = state
            .claimants
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        refs.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        refs
    }

    /// Other record-sets claiming the same name and type as `rrset`.
    ///
    /// Uses the spec key even when `rrset` itself is `Failed`, so a change to
    /// a losing duplicate still wakes the winner.
    #[must_use]
    pub fn siblings(&self, rrset: &RRset) -> Vec<ObjectRef<RRset>> {
        let own = object_ref(rrset);
        self.claimants(&spec_key(rrset))
            .into_iter()
            .filter(|other| *other != own)
            .collect()
    }

    /// Number of distinct keys currently claimed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .claimants
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod index_tests;
