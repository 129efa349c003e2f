// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status builders for `RRset` resources.
//!
//! The reconciler never edits a status in place. It computes the complete
//! next [`RRsetStatus`] with one of the functions below and hands it to the
//! store, which writes it as a merge patch. Keeping these pure makes the
//! timestamp rules testable without a clock.
//!
//! # Timestamp rules
//!
//! - `lastUpdateTime` moves to `now` when a change was sent to PowerDNS.
//! - A successful sync of a generation newer than `observedGeneration` also
//!   moves it, since the write may have landed on an attempt whose status
//!   update was lost to a conflict.
//! - Otherwise it keeps the prior value, falling back to `now` on first write.

use crate::constants::DUPLICATE_RRSET_DESCRIPTION;
use crate::crd::{RRsetStatus, SyncStatus};
use crate::dns_errors::PdnsError;
use crate::reconcilers::sync::SyncOutcome;
use chrono::{DateTime, SecondsFormat, Utc};

/// Format `now` the way `lastUpdateTime` is stored (RFC3339, seconds, `Z`).
#[must_use]
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn preserved_timestamp(prior: Option<&RRsetStatus>, now: DateTime<Utc>) -> String {
    prior
        .and_then(|status| status.last_update_time.clone())
        .unwrap_or_else(|| format_timestamp(now))
}

fn is_new_generation(prior: Option<&RRsetStatus>, generation: Option<i64>) -> bool {
    match (prior.and_then(|s| s.observed_generation), generation) {
        (Some(observed), Some(current)) => observed < current,
        _ => false,
    }
}

/// Status after a sync attempt.
///
/// # Arguments
///
/// * `prior` - The status the object carried before this reconcile
/// * `dns_entry_name` - The resolved canonical name
/// * `result` - Outcome of the sync step
/// * `generation` - `metadata.generation` the sync was computed from
/// * `now` - Current time
#[must_use]
pub fn sync_status(
    prior: Option<&RRsetStatus>,
    dns_entry_name: &str,
    result: &Result<SyncOutcome, PdnsError>,
    generation: Option<i64>,
    now: DateTime<Utc>,
) -> RRsetStatus {
    let (last_update_time, sync_status, sync_error_description) = match result {
        Ok(SyncOutcome::Applied) => (format_timestamp(now), SyncStatus::Succeeded, None),
        Ok(SyncOutcome::Unchanged) if is_new_generation(prior, generation) => {
            (format_timestamp(now), SyncStatus::Succeeded, None)
        }
        Ok(SyncOutcome::Unchanged) => (
            preserved_timestamp(prior, now),
            SyncStatus::Succeeded,
            None,
        ),
        Err(e) => (
            preserved_timestamp(prior, now),
            SyncStatus::Failed,
            Some(e.to_string()),
        ),
    };

    RRsetStatus {
        last_update_time: Some(last_update_time),
        dns_entry_name: Some(dns_entry_name.to_string()),
        sync_status: Some(sync_status),
        sync_error_description,
        observed_generation: generation,
    }
}

/// Status of an object that lost the uniqueness check.
#[must_use]
pub fn duplicate_status(
    prior: Option<&RRsetStatus>,
    dns_entry_name: &str,
    generation: Option<i64>,
    now: DateTime<Utc>,
) -> RRsetStatus {
    RRsetStatus {
        last_update_time: Some(preserved_timestamp(prior, now)),
        dns_entry_name: Some(dns_entry_name.to_string()),
        sync_status: Some(SyncStatus::Failed),
        sync_error_description: Some(DUPLICATE_RRSET_DESCRIPTION.to_string()),
        observed_generation: generation,
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
