// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `RRset` reconciliation.
//!
//! One pass of [`reconcile_rrset`] walks the object through these steps,
//! stopping at the first one that settles it:
//!
//! 1. Load the `RRset`; gone means done.
//! 2. Resolve the parent `Zone`; missing means release the finalizer and
//!    retry shortly, since the zone may simply not be created yet.
//! 3. Deleting: delete the record-set on PowerDNS, then release the finalizer.
//! 4. No finalizer yet: attach it and wait for the resulting update event.
//! 5. `Failed` for the current generation: republish the status and stop.
//! 6. Another `RRset` with a stronger claim on the same name and type
//!    exists: mark `Failed`.
//! 7. Sync with PowerDNS (fetch, diff, apply when different).
//! 8. Make the zone the controller owner of the `RRset`.
//! 9. Write the status.
//! 10. Publish the outcome to the status sink.
//!
//! A write conflict anywhere turns into an immediate requeue; the next pass
//! starts again from a fresh read.

use crate::constants::{
    FINALIZER_RRSET, KIND_RRSET, KIND_ZONE, MISSING_ZONE_REQUEUE_SECS,
};
use crate::context::Context;
use crate::crd::{RRset, SyncStatus, Zone};
use crate::metrics::{record_pdns_change, record_reconciliation_requeue};
use crate::names::{entry_key, make_canonical, resolve_fqdn};
use crate::pdns::RecordsApi;
use crate::reconcilers::finalizers::{
    ensure_finalizer, finalizer_state, handle_deletion, remove_finalizer, FinalizerCleanup,
    FinalizerState,
};
use crate::reconcilers::index::{claim_rank, derive_key};
use crate::reconcilers::status::{duplicate_status, sync_status};
use crate::reconcilers::sync::{self, desired_change, sync_rrset, SyncOutcome};
use crate::reconcilers::ReconcileError;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Deletes the PowerDNS record-set of a deleted `RRset`.
struct ExternalTeardown<'a> {
    records: &'a dyn RecordsApi,
    zone: String,
    name: String,
    record_type: String,
}

#[async_trait]
impl FinalizerCleanup for ExternalTeardown<'_> {
    async fn cleanup(&self, _rrset: &RRset) -> Result<(), ReconcileError> {
        sync::delete(self.records, &self.zone, &self.name, &self.record_type).await?;
        record_pdns_change("delete");
        info!(
            zone = %self.zone,
            name = %self.name,
            record_type = %self.record_type,
            "Deleted record-set from PowerDNS"
        );
        Ok(())
    }
}

/// Reconcile the `RRset` `name` in `namespace`.
///
/// # Returns
///
/// - `Action::await_change()` once the object is settled
/// - `Action::requeue(2s)` while its zone is missing
/// - `Action::requeue(0s)` after a write conflict
///
/// # Errors
///
/// Returns [`ReconcileError::ExternalSync`] when PowerDNS rejected a change
/// (after the `Failed` status has been written), and any non-conflict
/// persistence error.
pub async fn reconcile_rrset(
    ctx: &Context,
    namespace: &str,
    name: &str,
) -> Result<Action, ReconcileError> {
    match reconcile(ctx, namespace, name).await {
        Err(e) if e.is_conflict() => {
            warn!(
                "Conflict while reconciling RRset {}/{}, requeueing: {}",
                namespace, name, e
            );
            record_reconciliation_requeue(KIND_RRSET, "conflict");
            Ok(Action::requeue(Duration::ZERO))
        }
        other => other,
    }
}

async fn reconcile(ctx: &Context, namespace: &str, name: &str) -> Result<Action, ReconcileError> {
    let identity = ObjectRef::<RRset>::new(name).within(namespace);

    // Step 1
    let Some(rrset) = ctx.rrsets.get(namespace, name).await? else {
        debug!("RRset {}/{} no longer exists", namespace, name);
        ctx.index.remove(&identity);
        ctx.status_sink.retract(&identity);
        return Ok(Action::await_change());
    };

    // Step 2
    let zone_ref = &rrset.spec.zone_ref.name;
    let Some(zone) = ctx.zones.get(namespace, zone_ref).await? else {
        return handle_missing_zone(ctx, &rrset, &identity).await;
    };
    let zone_id = make_canonical(&zone.zone_name());
    let fqdn = resolve_fqdn(&rrset.spec.name, &zone.zone_name());
    let record_type = rrset.spec.r#type.trim().to_ascii_uppercase();

    // Steps 3 and 4
    match finalizer_state(&rrset, FINALIZER_RRSET) {
        FinalizerState::Finalizing => {
            let synced_name = rrset
                .status
                .as_ref()
                .and_then(|s| s.dns_entry_name.clone())
                .unwrap_or_else(|| fqdn.clone());
            let teardown = ExternalTeardown {
                records: ctx.records.as_ref(),
                zone: zone_id,
                name: synced_name,
                record_type,
            };
            handle_deletion(ctx.rrsets.as_ref(), &rrset, FINALIZER_RRSET, &teardown).await?;
            ctx.index.remove(&identity);
            ctx.status_sink.retract(&identity);
            info!("Finalized RRset {}/{}", namespace, name);
            return Ok(Action::await_change());
        }
        FinalizerState::Released => {
            debug!("RRset {}/{} is being deleted, nothing to do", namespace, name);
            return Ok(Action::await_change());
        }
        FinalizerState::Unregistered => {
            ensure_finalizer(ctx.rrsets.as_ref(), &rrset, FINALIZER_RRSET).await?;
            return Ok(Action::await_change());
        }
        FinalizerState::Active => {}
    }

    // Step 5
    if rrset.is_pinned_failed() {
        let status = rrset.status.as_ref();
        let dns_entry_name = status
            .and_then(|s| s.dns_entry_name.as_deref())
            .unwrap_or(&fqdn);
        debug!(
            "RRset {}/{} is Failed for its current generation, not syncing",
            namespace, name
        );
        ctx.status_sink
            .publish(dns_entry_name, &record_type, SyncStatus::Failed, &identity);
        return Ok(Action::await_change());
    }

    // Step 6
    ctx.index.reindex(&rrset);
    let key = entry_key(&fqdn, &record_type);
    let own_rank = claim_rank(&rrset, &fqdn);
    let mut others = Vec::new();
    for claimant in ctx.rrsets.list_by_index(&key) {
        if claimant == identity {
            continue;
        }
        let other_namespace = claimant.namespace.as_deref().unwrap_or_default();
        let Some(other) = ctx.rrsets.get(other_namespace, &claimant.name).await? else {
            continue;
        };
        // The index may lag behind the object
        if derive_key(&other).as_deref() != Some(key.as_str()) {
            continue;
        }
        if claim_rank(&other, &fqdn) < own_rank {
            others.push(claimant);
        }
    }
    if !others.is_empty() {
        let claimed_by: Vec<String> = others
            .iter()
            .map(|r| format!("{}/{}", r.namespace.as_deref().unwrap_or_default(), r.name))
            .collect();
        warn!(
            "RRset {}/{} duplicates {} already claimed by {}",
            namespace,
            name,
            key,
            claimed_by.join(", ")
        );
        let status = duplicate_status(
            rrset.status.as_ref(),
            &fqdn,
            rrset.metadata.generation,
            chrono::Utc::now(),
        );
        ctx.rrsets.patch_status(&rrset, &status).await?;
        ctx.status_sink
            .publish(&fqdn, &record_type, SyncStatus::Failed, &identity);
        return Ok(Action::await_change());
    }

    // Step 7
    let change = desired_change(&rrset, &fqdn);
    let result = sync_rrset(ctx.records.as_ref(), &zone_id, &change).await;
    match &result {
        Ok(SyncOutcome::Applied) => {
            record_pdns_change("replace");
            info!(
                "Applied {} {} to PowerDNS zone {} for RRset {}/{}",
                fqdn, record_type, zone_id, namespace, name
            );
        }
        Ok(SyncOutcome::Unchanged) => {}
        Err(e) => {
            error!(
                "Failed to sync RRset {}/{} to PowerDNS: {}",
                namespace, name, e
            );
        }
    }

    // Step 8
    let rrset = match zone_owner_update(&rrset, &zone)? {
        Some(owned) => {
            debug!("Setting zone {} as owner of RRset {}/{}", zone_ref, namespace, name);
            ctx.rrsets.update(&owned).await?
        }
        None => rrset,
    };

    // Step 9
    let status = sync_status(
        rrset.status.as_ref(),
        &fqdn,
        &result,
        rrset.metadata.generation,
        chrono::Utc::now(),
    );
    let outcome = status.sync_status.unwrap_or(SyncStatus::Failed);
    ctx.rrsets.patch_status(&rrset, &status).await?;

    // Step 10
    ctx.status_sink
        .publish(&fqdn, &record_type, outcome, &identity);

    match result {
        Ok(_) => Ok(Action::await_change()),
        Err(e) => Err(ReconcileError::ExternalSync(e)),
    }
}

/// The parent zone does not exist (yet). Release the finalizer so a deleted
/// zone does not block deletion of its record-sets, and retry shortly.
async fn handle_missing_zone(
    ctx: &Context,
    rrset: &RRset,
    identity: &ObjectRef<RRset>,
) -> Result<Action, ReconcileError> {
    info!(
        "Zone {} for RRset {} not found, retrying in {}s",
        rrset.spec.zone_ref.name, identity, MISSING_ZONE_REQUEUE_SECS
    );

    remove_finalizer(ctx.rrsets.as_ref(), rrset, FINALIZER_RRSET).await?;
    ctx.status_sink.retract(identity);

    record_reconciliation_requeue(KIND_RRSET, "missing_zone");
    Ok(Action::requeue(Duration::from_secs(MISSING_ZONE_REQUEUE_SECS)))
}

/// `rrset` with `zone` set as its controller owner, or `None` if it already is.
///
/// Earlier `Zone` owner references are replaced, so moving a record-set to
/// another zone moves its owner too.
///
/// # Errors
///
/// Returns [`ReconcileError::Invalid`] when the zone has no uid or when
/// something other than a `Zone` already controls the record-set.
pub fn zone_owner_update(rrset: &RRset, zone: &Zone) -> Result<Option<RRset>, ReconcileError> {
    let owner: OwnerReference = zone.controller_owner_ref(&()).ok_or_else(|| {
        ReconcileError::Invalid(format!("Zone {} has no uid", zone.name_any()))
    })?;

    let current = rrset.owner_references();
    if current
        .iter()
        .any(|r| r.uid == owner.uid && r.controller == Some(true))
    {
        return Ok(None);
    }

    if let Some(other) = current
        .iter()
        .find(|r| r.controller == Some(true) && r.kind != KIND_ZONE)
    {
        return Err(ReconcileError::Invalid(format!(
            "RRset {}/{} is already controlled by {} {}",
            rrset.namespace().unwrap_or_default(),
            rrset.name_any(),
            other.kind,
            other.name
        )));
    }

    let mut references: Vec<OwnerReference> = current
        .iter()
        .filter(|r| r.kind != KIND_ZONE)
        .cloned()
        .collect();
    references.push(owner);

    let mut updated = rrset.clone();
    updated.metadata.owner_references = Some(references);
    Ok(Some(updated))
}

#[cfg(test)]
#[path = "rrset_tests.rs"]
mod rrset_tests;
