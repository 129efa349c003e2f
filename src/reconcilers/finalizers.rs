// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for `RRset` resources.
//!
//! A record-set owns a record-set on PowerDNS, so it carries a finalizer that
//! holds its deletion until the external record-set is gone. The lifecycle is
//! driven by two facts read from the object, whether the finalizer is present
//! and whether deletion was requested:
//!
//! | finalizer | deleting | state                              | action                       |
//! |-----------|----------|------------------------------------|------------------------------|
//! | no        | no       | [`FinalizerState::Unregistered`]   | attach, stop                 |
//! | yes       | no       | [`FinalizerState::Active`]         | normal reconciliation        |
//! | yes       | yes      | [`FinalizerState::Finalizing`]     | clean up, then detach        |
//! | no        | yes      | [`FinalizerState::Released`]       | nothing                      |
//!
//! # Example
//!
//! ```rust,ignore
//! use rrsync::reconcilers::finalizers::{finalizer_state, handle_deletion, FinalizerState};
//!
//! match finalizer_state(&rrset, FINALIZER_RRSET) {
//!     FinalizerState::Finalizing => handle_deletion(store, &rrset, FINALIZER_RRSET, &cleanup).await?,
//!     FinalizerState::Unregistered => { ensure_finalizer(store, &rrset, FINALIZER_RRSET).await?; }
//!     FinalizerState::Active | FinalizerState::Released => {}
//! }
//! ```

use crate::crd::RRset;
use crate::reconcilers::ReconcileError;
use crate::store::{RRsetStore, StoreError};
use async_trait::async_trait;
use kube::ResourceExt;
use tracing::info;

/// Position of an object in the finalizer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizerState {
    /// Live object without the finalizer yet.
    Unregistered,
    /// Live object carrying the finalizer.
    Active,
    /// Deletion requested while the finalizer is still present.
    Finalizing,
    /// Deletion requested and nothing left to clean up.
    Released,
}

/// Compute the [`FinalizerState`] of `rrset` for `finalizer`.
#[must_use]
pub fn finalizer_state(rrset: &RRset, finalizer: &str) -> FinalizerState {
    match (rrset.has_finalizer(finalizer), rrset.is_deleting()) {
        (false, false) => FinalizerState::Unregistered,
        (true, false) => FinalizerState::Active,
        (true, true) => FinalizerState::Finalizing,
        (false, true) => FinalizerState::Released,
    }
}

/// Cleanup that must succeed before the finalizer is removed.
#[async_trait]
pub trait FinalizerCleanup: Send + Sync {
    /// Tear down whatever `rrset` created outside the cluster.
    ///
    /// # Errors
    ///
    /// An error keeps the finalizer in place; deletion stays blocked until a
    /// later attempt succeeds.
    async fn cleanup(&self, rrset: &RRset) -> Result<(), ReconcileError>;
}

/// Add `finalizer` to `rrset` if missing.
///
/// Returns the stored object when a write happened, `None` when the
/// finalizer was already present.
///
/// # Errors
///
/// Returns the [`StoreError`] of the failed update.
pub async fn ensure_finalizer(
    store: &dyn RRsetStore,
    rrset: &RRset,
    finalizer: &str,
) -> Result<Option<RRset>, StoreError> {
    if rrset.has_finalizer(finalizer) {
        return Ok(None);
    }

    let namespace = rrset.namespace().unwrap_or_default();
    let name = rrset.name_any();
    info!("Adding finalizer {} to {}/{} RRset", finalizer, namespace, name);

    let mut updated = rrset.clone();
    updated
        .metadata
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_string());

    store.update(&updated).await.map(Some)
}

/// Remove `finalizer` from `rrset` if present.
///
/// Returns the stored object when a write happened, `None` when the
/// finalizer was already absent.
///
/// # Errors
///
/// Returns the [`StoreError`] of the failed update.
pub async fn remove_finalizer(
    store: &dyn RRsetStore,
    rrset: &RRset,
    finalizer: &str,
) -> Result<Option<RRset>, StoreError> {
    if !rrset.has_finalizer(finalizer) {
        return Ok(None);
    }

    let namespace = rrset.namespace().unwrap_or_default();
    let name = rrset.name_any();
    info!("Removing finalizer {} from {}/{} RRset", finalizer, namespace, name);

    let mut updated = rrset.clone();
    if let Some(finalizers) = updated.metadata.finalizers.as_mut() {
        finalizers.retain(|f| f != finalizer);
    }

    store.update(&updated).await.map(Some)
}

/// Run `cleanup` for a deleting `rrset`, then remove `finalizer`.
///
/// An object whose last outcome was `Failed` never created anything on
/// PowerDNS, so its cleanup is skipped.
///
/// # Errors
///
/// Returns the cleanup error (finalizer kept) or the [`StoreError`] of the
/// finalizer removal.
pub async fn handle_deletion(
    store: &dyn RRsetStore,
    rrset: &RRset,
    finalizer: &str,
    cleanup: &dyn FinalizerCleanup,
) -> Result<(), ReconcileError> {
    let namespace = rrset.namespace().unwrap_or_default();
    let name = rrset.name_any();

    if rrset.is_failed() {
        info!(
            "RRset {}/{} is Failed, nothing to clean up on PowerDNS",
            namespace, name
        );
    } else {
        info!("Running cleanup for deleted RRset {}/{}", namespace, name);
        cleanup.cleanup(rrset).await?;
    }

    remove_finalizer(store, rrset, finalizer).await?;
    Ok(())
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
