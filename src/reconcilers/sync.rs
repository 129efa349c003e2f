// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record-set synchronization against PowerDNS.
//!
//! Wraps [`RecordsApi`] with the three things the reconciler needs on top of
//! raw API calls:
//!
//! 1. **Filtering** - a filtered `GET` may return record-sets other than the
//!    one asked for (PowerDNS issue #14539), so [`fetch`] keeps only the entry
//!    whose canonical name and type match.
//! 2. **Diffing** - [`differs`] decides whether a `PATCH` is needed at all, so
//!    an unchanged record-set causes no write.
//! 3. **Comment preservation** - a record-set without a desired comment never
//!    sends one, leaving whatever comment PowerDNS holds untouched.

use crate::constants::COMMENT_ACCOUNT;
use crate::crd::RRset;
use crate::dns_errors::PdnsError;
use crate::names::make_canonical;
use crate::pdns::{ExternalRRset, RRsetChange, RecordsApi};
use tracing::{debug, info};

/// Result of a successful [`sync_rrset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// PowerDNS already matched; nothing was written.
    Unchanged,
    /// A `REPLACE` was sent.
    Applied,
}

/// Desired PowerDNS content of `rrset`, under the already resolved `fqdn`.
///
/// Record values are trimmed here, so the diff and the `REPLACE` see the
/// same contents.
#[must_use]
pub fn desired_change(rrset: &RRset, fqdn: &str) -> RRsetChange {
    RRsetChange {
        name: make_canonical(fqdn),
        record_type: rrset.spec.r#type.trim().to_ascii_uppercase(),
        ttl: rrset.spec.ttl,
        records: rrset
            .spec
            .records
            .iter()
            .map(|record| record.trim().to_string())
            .collect(),
        comment: rrset.spec.comment.clone(),
        account: COMMENT_ACCOUNT.to_string(),
    }
}

/// Fetch the record-set `name`/`record_type` from `zone`.
///
/// Returns `Ok(None)` when the record-set or the zone does not exist.
///
/// # Errors
///
/// Returns the [`PdnsError`] of any other failed request.
pub async fn fetch(
    api: &dyn RecordsApi,
    zone: &str,
    name: &str,
    record_type: &str,
) -> Result<Option<ExternalRRset>, PdnsError> {
    let canonical = make_canonical(name);
    let rrsets = match api.get_rrsets(zone, &canonical, record_type).await {
        Ok(rrsets) => rrsets,
        Err(e) if e.is_not_found() => {
            debug!(zone = %zone, name = %canonical, "Zone not found on PowerDNS");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let returned = rrsets.len();
    let found = rrsets.into_iter().find(|candidate| {
        make_canonical(&candidate.name) == canonical
            && candidate.record_type.eq_ignore_ascii_case(record_type)
    });

    if returned > 1 {
        debug!(
            zone = %zone,
            name = %canonical,
            returned,
            "PowerDNS returned unrelated record-sets, filtered by name"
        );
    }

    Ok(found)
}

fn sorted_contents<'a>(contents: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut values: Vec<String> = contents.map(|c| c.trim().to_string()).collect();
    values.sort_unstable();
    values
}

/// Whether PowerDNS must be updated to match `desired`.
///
/// Record contents compare as a sorted multiset, so ordering differences do
/// not trigger a write. Any disabled record on PowerDNS is a difference, as
/// rrsync only publishes enabled records. A desired record-set without a
/// comment never differs on comments.
#[must_use]
pub fn differs(desired: &RRsetChange, external: Option<&ExternalRRset>) -> bool {
    let Some(external) = external else {
        return true;
    };

    if external.ttl != Some(desired.ttl) {
        return true;
    }
    if !external.record_type.eq_ignore_ascii_case(&desired.record_type) {
        return true;
    }
    if external.records.iter().any(|r| r.disabled) {
        return true;
    }
    if sorted_contents(desired.records.iter().map(String::as_str))
        != sorted_contents(external.records.iter().map(|r| r.content.as_str()))
    {
        return true;
    }

    match &desired.comment {
        Some(comment) => {
            external.comments.first().map(|c| c.content.as_str()) != Some(comment.as_str())
        }
        None => false,
    }
}

/// Create or replace the record-set on PowerDNS.
///
/// # Errors
///
/// Returns the [`PdnsError`] of the failed `PATCH`.
pub async fn apply(api: &dyn RecordsApi, zone: &str, change: &RRsetChange) -> Result<(), PdnsError> {
    api.replace_rrset(zone, change).await
}

/// Delete the record-set from PowerDNS.
///
/// A zone that no longer exists on PowerDNS holds nothing to delete, so a
/// not-found answer counts as success.
///
/// # Errors
///
/// Returns the [`PdnsError`] of the failed `PATCH`.
pub async fn delete(
    api: &dyn RecordsApi,
    zone: &str,
    name: &str,
    record_type: &str,
) -> Result<(), PdnsError> {
    let canonical = make_canonical(name);
    let record_type = record_type.trim().to_ascii_uppercase();
    match api.delete_rrset(zone, &canonical, &record_type).await {
        Err(e) if e.is_not_found() => {
            info!(zone = %zone, name = %canonical, "Zone already gone from PowerDNS, nothing to delete");
            Ok(())
        }
        other => other,
    }
}

/// Fetch, diff and, if needed, apply `change` to `zone`.
///
/// # Errors
///
/// Returns the [`PdnsError`] of the failed fetch or apply.
pub async fn sync_rrset(
    api: &dyn RecordsApi,
    zone: &str,
    change: &RRsetChange,
) -> Result<SyncOutcome, PdnsError> {
    let external = fetch(api, zone, &change.name, &change.record_type).await?;

    if !differs(change, external.as_ref()) {
        debug!(
            zone = %zone,
            name = %change.name,
            record_type = %change.record_type,
            "Record-set already up to date on PowerDNS"
        );
        return Ok(SyncOutcome::Unchanged);
    }

    apply(api, zone, change).await?;
    Ok(SyncOutcome::Applied)
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod sync_tests;
