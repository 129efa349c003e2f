// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the rrsync operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all rrsync CRDs
pub const API_GROUP: &str = "rrsync.firestoned.io";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "rrsync.firestoned.io/v1alpha1";

/// Kind name for `Zone` resource
pub const KIND_ZONE: &str = "Zone";

/// Kind name for `RRset` resource
pub const KIND_RRSET: &str = "RRset";

/// Finalizer guarding removal of the PowerDNS record-set behind an `RRset`
pub const FINALIZER_RRSET: &str = "rrsync.firestoned.io/finalizer";

// ============================================================================
// Record-Set Sync Constants
// ============================================================================

/// `syncErrorDescription` of an `RRset` that duplicates another one's name and type
pub const DUPLICATE_RRSET_DESCRIPTION: &str = "Already existing RRset with the same FQDN";

/// Account recorded on PowerDNS comments written by the operator
pub const COMMENT_ACCOUNT: &str = "rrsync-operator";

// ============================================================================
// PowerDNS API Constants
// ============================================================================

/// Default PowerDNS server id
pub const DEFAULT_PDNS_SERVER_ID: &str = "localhost";

/// Default PowerDNS request timeout (30 seconds)
pub const DEFAULT_PDNS_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Requeue delay while the parent `Zone` of an `RRset` does not exist yet
pub const MISSING_ZONE_REQUEUE_SECS: u64 = 2;

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default bind address for the metrics and health HTTP server
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Liveness probe path
pub const HEALTHZ_PATH: &str = "/healthz";

/// Readiness probe path
pub const READYZ_PATH: &str = "/readyz";
