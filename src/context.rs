// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the `RRset` controller.
//!
//! The reconciler receives an `Arc<Context>` holding every collaborator it
//! talks to:
//! - the `RRset` store and the `Zone` lookup (Kubernetes or in-memory)
//! - the PowerDNS records API
//! - the status sink publishing the per-object gauge
//! - the uniqueness index shared by the store and the watch stream
//!
//! All of them sit behind traits, so [`Context::in_memory`] builds a context
//! that needs neither a cluster nor a PowerDNS server.

use crate::metrics::StatusSink;
use crate::pdns::RecordsApi;
use crate::reconcilers::index::UniquenessIndex;
use crate::store::{KubeRRsetStore, KubeZoneLookup, MemoryStore, RRsetStore, ZoneLookup};
use kube::Client;
use std::sync::Arc;

/// Shared context passed to the reconciler.
#[derive(Clone)]
pub struct Context {
    /// Reads and writes `RRset` resources
    pub rrsets: Arc<dyn RRsetStore>,

    /// Resolves parent zones
    pub zones: Arc<dyn ZoneLookup>,

    /// PowerDNS record-set API
    pub records: Arc<dyn RecordsApi>,

    /// Receives the sync outcome of every `RRset`
    pub status_sink: Arc<dyn StatusSink>,

    /// Name/type claims of all known `RRset`s
    pub index: Arc<UniquenessIndex>,
}

impl Context {
    /// Context backed by the Kubernetes API.
    ///
    /// The store feeds `index` after each write; the controller feeds it from
    /// the watch stream.
    #[must_use]
    pub fn kubernetes(
        client: Client,
        records: Arc<dyn RecordsApi>,
        status_sink: Arc<dyn StatusSink>,
        index: Arc<UniquenessIndex>,
    ) -> Self {
        Self {
            rrsets: Arc::new(KubeRRsetStore::new(client.clone(), index.clone())),
            zones: Arc::new(KubeZoneLookup::new(client)),
            records,
            status_sink,
            index,
        }
    }

    /// Context backed by a [`MemoryStore`], sharing its index.
    #[must_use]
    pub fn in_memory(
        store: Arc<MemoryStore>,
        records: Arc<dyn RecordsApi>,
        status_sink: Arc<dyn StatusSink>,
    ) -> Self {
        let index = store.index();
        Self {
            rrsets: store.clone(),
            zones: store,
            records,
            status_sink,
            index,
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
