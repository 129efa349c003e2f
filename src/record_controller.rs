// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `RRset` controller wiring.
//!
//! Three watch streams feed the reconciler:
//! - `RRset` changes reconcile the changed object
//! - `Zone` changes reconcile every `RRset` referencing the zone, so a
//!   record-set created before its zone converges as soon as the zone appears
//! - `RRset` changes also reconcile the *siblings* of the changed object
//!   (same name and type), so the loser of a uniqueness race re-checks
//!
//! A separate watcher keeps the [`UniquenessIndex`] in line with the cluster,
//! including objects the controller itself never wrote.

use crate::constants::{ERROR_REQUEUE_DURATION_SECS, KIND_RRSET};
use crate::context::Context;
use crate::crd::{RRset, Zone};
use crate::metrics::{record_error, record_reconciliation_error, record_reconciliation_success};
use crate::reconcilers::index::{object_ref, UniquenessIndex};
use crate::reconcilers::{reconcile_rrset, ReconcileError};
use anyhow::Result;
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::{self, Config as WatcherConfig, Event};
use kube::runtime::{Controller, WatchStreamExt};
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Error policy for the `RRset` controller.
///
/// Returns an action to requeue the resource after a delay when reconciliation fails.
#[allow(clippy::needless_pass_by_value)] // Signature required by kube::runtime::Controller
fn error_policy(rrset: Arc<RRset>, err: &ReconcileError, _ctx: Arc<Context>) -> Action {
    error!(
        error = %err,
        rrset = %object_ref(&rrset),
        "Reconciliation error - will retry in {}s",
        ERROR_REQUEUE_DURATION_SECS
    );
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

/// Record-sets in `rrsets` that reference `zone`.
#[must_use]
pub fn rrsets_for_zone(rrsets: &[Arc<RRset>], zone: &Zone) -> Vec<ObjectRef<RRset>> {
    let Some(namespace) = zone.namespace() else {
        return vec![];
    };
    let zone_name = zone.name_any();

    rrsets
        .iter()
        .filter(|rrset| {
            rrset.namespace().as_deref() == Some(namespace.as_str())
                && rrset.spec.zone_ref.name == zone_name
        })
        .map(|rrset| object_ref(rrset))
        .collect()
}

fn namespaced_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>
        + Clone
        + serde::de::DeserializeOwned
        + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run the `RRset` controller until its watch streams end.
///
/// # Arguments
///
/// * `client` - Kubernetes client
/// * `context` - Collaborators handed to every reconcile
/// * `namespace` - Restrict watches to one namespace, or `None` for all
///
/// # Errors
///
/// Returns an error if the controller fails to start.
pub async fn run_rrset_controller(
    client: Client,
    context: Arc<Context>,
    namespace: Option<String>,
) -> Result<()> {
    info!(
        "Starting {} controller (namespace: {})",
        KIND_RRSET,
        namespace.as_deref().unwrap_or("all")
    );

    let rrsets: Api<RRset> = namespaced_api(&client, namespace.as_deref());
    let zones: Api<Zone> = namespaced_api(&client, namespace.as_deref());
    let watcher_config = WatcherConfig::default();

    let controller = Controller::new(rrsets.clone(), watcher_config.clone());
    let store = controller.store();
    let index = context.index.clone();

    controller
        .watches(zones, watcher_config.clone(), move |zone| {
            rrsets_for_zone(&store.state(), &zone)
        })
        .watches(rrsets, watcher_config, move |rrset| index.siblings(&rrset))
        .run(reconcile_wrapper, error_policy, context)
        .for_each(|result| {
            match result {
                Ok((object, action)) => debug!(rrset = %object, ?action, "Reconciled"),
                Err(e) => warn!(error = %e, "Controller reported an error"),
            }
            futures::future::ready(())
        })
        .await;

    Ok(())
}

/// Reconcile one `RRset` and record metrics.
async fn reconcile_wrapper(rrset: Arc<RRset>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();
    let name = rrset.name_any();
    let namespace = rrset
        .namespace()
        .ok_or_else(|| ReconcileError::Invalid(format!("{KIND_RRSET} {name} has no namespace")))?;

    let result = reconcile_rrset(&ctx, &namespace, &name).await;

    let duration = start.elapsed();
    match &result {
        Ok(_) => record_reconciliation_success(KIND_RRSET, duration),
        Err(e) => {
            record_reconciliation_error(KIND_RRSET, duration);
            record_error(KIND_RRSET, e.metric_label());
        }
    }

    result
}

/// Applies `RRset` watch events to a [`UniquenessIndex`].
///
/// During a (re)list the index keeps serving its previous content; the
/// listed objects replace it atomically once the list completes.
pub struct IndexFeeder {
    index: Arc<UniquenessIndex>,
    pending: Option<Vec<RRset>>,
}

impl IndexFeeder {
    #[must_use]
    pub fn new(index: Arc<UniquenessIndex>) -> Self {
        Self {
            index,
            pending: None,
        }
    }

    pub fn apply(&mut self, event: Event<RRset>) {
        match event {
            Event::Init => self.pending = Some(Vec::new()),
            Event::InitApply(rrset) => self.pending.get_or_insert_with(Vec::new).push(rrset),
            Event::InitDone => {
                let listed = self.pending.take().unwrap_or_default();
                self.index.replace_all(&listed);
            }
            Event::Apply(rrset) => self.index.reindex(&rrset),
            Event::Delete(rrset) => self.index.remove(&object_ref(&rrset)),
        }
    }
}

/// Keep `index` fed from a watch on `RRset`s until the stream ends.
///
/// # Errors
///
/// Never returns an error today; watch errors are retried with backoff.
pub async fn run_index_feeder(
    client: Client,
    index: Arc<UniquenessIndex>,
    namespace: Option<String>,
) -> Result<()> {
    let rrsets: Api<RRset> = namespaced_api(&client, namespace.as_deref());
    let mut feeder = IndexFeeder::new(index);

    let mut events = watcher::watcher(rrsets, WatcherConfig::default())
        .default_backoff()
        .boxed();

    while let Some(event) = events.next().await {
        match event {
            Ok(event) => feeder.apply(event),
            Err(e) => warn!(error = %e, "RRset index watch error, retrying"),
        }
    }

    info!("RRset index watch ended");
    Ok(())
}

#[cfg(test)]
#[path = "record_controller_tests.rs"]
mod record_controller_tests;
