// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process stand-in for a PowerDNS server.
//!
//! Holds zones and record-sets in memory, records every call it receives and
//! can be told to fail or to reproduce the unfiltered `GET` answers of
//! PowerDNS issue #14539.

use super::types::{Comment, ExternalRRset, Record, RRsetChange};
use super::RecordsApi;
use crate::dns_errors::PdnsError;
use crate::names::make_canonical;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A call received by [`MemoryPdns`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Get {
        zone: String,
        name: String,
        record_type: String,
    },
    Replace {
        zone: String,
        change: RRsetChange,
    },
    Delete {
        zone: String,
        name: String,
        record_type: String,
    },
}

#[derive(Default)]
struct PdnsState {
    // zone -> (name, TYPE) -> record-set
    zones: BTreeMap<String, BTreeMap<(String, String), ExternalRRset>>,
    calls: Vec<RecordedCall>,
    failure: Option<(u16, String)>,
    unfiltered_gets: bool,
}

/// In-memory [`RecordsApi`].
#[derive(Default)]
pub struct MemoryPdns {
    state: Mutex<PdnsState>,
}

impl MemoryPdns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PdnsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an empty zone.
    pub fn add_zone(&self, zone: &str) {
        self.lock().zones.entry(make_canonical(zone)).or_default();
    }

    /// Store a record-set directly, bypassing the call log.
    pub fn seed(&self, zone: &str, rrset: ExternalRRset) {
        let key = (make_canonical(&rrset.name), rrset.record_type.to_ascii_uppercase());
        self.lock()
            .zones
            .entry(make_canonical(zone))
            .or_default()
            .insert(key, rrset);
    }

    /// Record-set `name`/`record_type` in `zone`, if present.
    #[must_use]
    pub fn rrset(&self, zone: &str, name: &str, record_type: &str) -> Option<ExternalRRset> {
        self.lock()
            .zones
            .get(&make_canonical(zone))
            .and_then(|z| z.get(&(make_canonical(name), record_type.to_ascii_uppercase())))
            .cloned()
    }

    /// Every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Number of `REPLACE` changes received.
    #[must_use]
    pub fn replace_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, RecordedCall::Replace { .. }))
            .count()
    }

    /// Number of `DELETE` changes received.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, RecordedCall::Delete { .. }))
            .count()
    }

    /// Answer every following call with HTTP `status` and `message`, or stop failing with `None`.
    pub fn fail_with(&self, failure: Option<(u16, &str)>) {
        self.lock().failure = failure.map(|(status, message)| (status, message.to_string()));
    }

    /// Return the whole zone from `get_rrsets`, ignoring the name filter.
    pub fn set_unfiltered_gets(&self, unfiltered: bool) {
        self.lock().unfiltered_gets = unfiltered;
    }

    fn check_failure(state: &PdnsState, zone: &str) -> Result<(), PdnsError> {
        match &state.failure {
            Some((status, message)) => Err(PdnsError::from_status(
                reqwest::StatusCode::from_u16(*status)
                    .unwrap_or(reqwest::StatusCode::INTERNAL_SERVER_ERROR),
                zone,
                &serde_json::json!({ "error": message }).to_string(),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordsApi for MemoryPdns {
    async fn get_rrsets(
        &self,
        zone: &str,
        name: &str,
        record_type: &str,
    ) -> Result<Vec<ExternalRRset>, PdnsError> {
        let zone_id = make_canonical(zone);
        let mut state = self.lock();
        state.calls.push(RecordedCall::Get {
            zone: zone_id.clone(),
            name: name.to_string(),
            record_type: record_type.to_string(),
        });
        Self::check_failure(&state, &zone_id)?;

        let rrsets = state
            .zones
            .get(&zone_id)
            .ok_or_else(|| PdnsError::ZoneNotFound {
                zone: zone_id.clone(),
            })?;

        let wanted = (make_canonical(name), record_type.to_ascii_uppercase());
        Ok(rrsets
            .iter()
            .filter(|(key, _)| state.unfiltered_gets || **key == wanted)
            .map(|(_, rrset)| rrset.clone())
            .collect())
    }

    async fn replace_rrset(&self, zone: &str, change: &RRsetChange) -> Result<(), PdnsError> {
        let zone_id = make_canonical(zone);
        let mut state = self.lock();
        state.calls.push(RecordedCall::Replace {
            zone: zone_id.clone(),
            change: change.clone(),
        });
        Self::check_failure(&state, &zone_id)?;

        let rrsets = state
            .zones
            .get_mut(&zone_id)
            .ok_or_else(|| PdnsError::ZoneNotFound {
                zone: zone_id.clone(),
            })?;

        let key = (
            make_canonical(&change.name),
            change.record_type.to_ascii_uppercase(),
        );
        // Comments survive a REPLACE that does not carry any.
        let comments = match &change.comment {
            Some(content) => vec![Comment {
                content: content.clone(),
                account: change.account.clone(),
                modified_at: None,
            }],
            None => rrsets
                .get(&key)
                .map(|existing| existing.comments.clone())
                .unwrap_or_default(),
        };

        rrsets.insert(
            key.clone(),
            ExternalRRset {
                name: key.0,
                record_type: key.1,
                ttl: Some(change.ttl),
                changetype: None,
                records: change
                    .records
                    .iter()
                    .map(|content| Record {
                        content: content.clone(),
                        disabled: false,
                    })
                    .collect(),
                comments,
            },
        );
        Ok(())
    }

    async fn delete_rrset(
        &self,
        zone: &str,
        name: &str,
        record_type: &str,
    ) -> Result<(), PdnsError> {
        let zone_id = make_canonical(zone);
        let mut state = self.lock();
        state.calls.push(RecordedCall::Delete {
            zone: zone_id.clone(),
            name: name.to_string(),
            record_type: record_type.to_string(),
        });
        Self::check_failure(&state, &zone_id)?;

        let rrsets = state
            .zones
            .get_mut(&zone_id)
            .ok_or_else(|| PdnsError::ZoneNotFound {
                zone: zone_id.clone(),
            })?;
        rrsets.remove(&(make_canonical(name), record_type.to_ascii_uppercase()));
        Ok(())
    }
}
