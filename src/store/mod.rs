// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Persistence of `RRset` and `Zone` resources.
//!
//! The reconciler never talks to the Kubernetes API directly. It goes through
//! two narrow traits:
//!
//! - [`ZoneLookup`] resolves the parent zone of a record-set
//! - [`RRsetStore`] reads and writes record-sets
//!
//! Writes are optimistic: both `update` and `patch_status` carry the
//! `resourceVersion` of the object they were given, and a stale version
//! surfaces as [`StoreError::Conflict`], never as [`StoreError::Api`].
//! Every successful write refreshes the [`UniquenessIndex`] with the object
//! that was written.
//!
//! [`KubeRRsetStore`]/[`KubeZoneLookup`] are backed by the API server;
//! [`MemoryStore`] keeps everything in process.
//!
//! [`UniquenessIndex`]: crate::reconcilers::index::UniquenessIndex

pub mod kubernetes;
pub mod memory;

pub use kubernetes::{KubeRRsetStore, KubeZoneLookup};
pub use memory::MemoryStore;

use crate::crd::{RRset, RRsetStatus, Zone};
use kube::runtime::reflector::ObjectRef;
use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by the persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The object does not exist (any more).
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// The write was based on a stale `resourceVersion`.
    #[error("Conflict writing {kind} {namespace}/{name}: the object has been modified")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// The object has no namespace; every resource handled here is namespaced.
    #[error("{kind} {name} has no namespace")]
    MissingNamespace { kind: &'static str, name: String },

    /// Any other API failure.
    #[error(transparent)]
    Api(#[from] kube::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Resolves the parent `Zone` of a record-set.
#[async_trait]
pub trait ZoneLookup: Send + Sync {
    /// Return the zone `name` in `namespace`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the lookup itself fails.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Zone>, StoreError>;
}

/// Reads and writes `RRset` resources.
#[async_trait]
pub trait RRsetStore: Send + Sync {
    /// Return the record-set `name` in `namespace`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the read fails.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<RRset>, StoreError>;

    /// Record-sets currently claiming the uniqueness `key` (`"<fqdn>/<TYPE>"`).
    fn list_by_index(&self, key: &str) -> Vec<ObjectRef<RRset>>;

    /// Replace the whole object (metadata included), guarded by its `resourceVersion`.
    ///
    /// Used for finalizer and owner-reference changes. Returns the stored object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a stale `resourceVersion`,
    /// [`StoreError::NotFound`] if the object is gone.
    async fn update(&self, rrset: &RRset) -> Result<RRset, StoreError>;

    /// Merge `status` into the status subresource, guarded by the `resourceVersion`
    /// of `rrset`. `None` fields in `status` are cleared.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a stale `resourceVersion`,
    /// [`StoreError::NotFound`] if the object is gone.
    async fn patch_status(&self, rrset: &RRset, status: &RRsetStatus)
        -> Result<RRset, StoreError>;
}

/// Namespace of `rrset`, or [`StoreError::MissingNamespace`].
pub(crate) fn namespace_of(rrset: &RRset) -> Result<String, StoreError> {
    kube::ResourceExt::namespace(rrset).ok_or_else(|| StoreError::MissingNamespace {
        kind: crate::constants::KIND_RRSET,
        name: kube::ResourceExt::name_any(rrset),
    })
}
