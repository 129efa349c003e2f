// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of `RRset` resources against PowerDNS.
//!
//! # Reconciliation Architecture
//!
//! The controller hands one object identity at a time to
//! [`reconcile_rrset`], which drives the pieces below:
//!
//! 1. **Finalizers** ([`finalizers`]) - decide between deletion and the normal path
//! 2. **Uniqueness** ([`index`]) - reject a second record-set claiming the same name and type
//! 3. **Sync** ([`sync`]) - diff against PowerDNS and apply only when needed
//! 4. **Status** ([`status`]) - compute the status written back to the cluster
//!
//! Every collaborator comes from the [`Context`](crate::context::Context), so
//! the whole flow runs against in-memory stores in tests.
//!
//! # Example: Using the Reconciler
//!
//! ```rust,no_run
//! use rrsync::context::Context;
//! use rrsync::reconcilers::reconcile_rrset;
//!
//! async fn reconcile(ctx: &Context) -> Result<(), rrsync::reconcilers::ReconcileError> {
//!     let action = reconcile_rrset(ctx, "dns-system", "www").await?;
//!     println!("{action:?}");
//!     Ok(())
//! }
//! ```

pub mod finalizers;
pub mod index;
pub mod rrset;
pub mod status;
pub mod sync;

pub use index::UniquenessIndex;
pub use rrset::reconcile_rrset;

use crate::dns_errors::PdnsError;
use crate::store::StoreError;
use thiserror::Error;

/// Errors returned by a reconcile pass.
///
/// Conflicts never reach the controller as errors: [`reconcile_rrset`] turns
/// them into an immediate requeue.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Reading or writing the `RRset` or its `Zone` failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// A PowerDNS call failed.
    #[error("PowerDNS sync error: {0}")]
    ExternalSync(#[from] PdnsError),

    /// The object cannot be reconciled as it stands.
    #[error("invalid RRset: {0}")]
    Invalid(String),
}

impl ReconcileError {
    /// Whether this is an optimistic-concurrency conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileError::Persistence(e) if e.is_conflict())
    }

    /// Short label used for the error metrics.
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self {
            ReconcileError::Persistence(_) => "persistence",
            ReconcileError::ExternalSync(_) => "external_sync",
            ReconcileError::Invalid(_) => "invalid",
        }
    }
}
