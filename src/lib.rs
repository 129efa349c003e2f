// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # rrsync - PowerDNS record-set operator for Kubernetes
//!
//! rrsync keeps the record-sets of a PowerDNS server in line with `RRset`
//! custom resources. Each `RRset` names a parent `Zone`, a record name, a type,
//! a TTL and its records; the operator resolves the fully-qualified name,
//! writes the record-set through the PowerDNS HTTP API, and reports the
//! outcome in the resource status and as a Prometheus gauge.
//!
//! ## Modules
//!
//! - [`crd`] - `Zone` and `RRset` resource types
//! - [`names`] - FQDN resolution and uniqueness keys
//! - [`pdns`] - PowerDNS records API client and an in-memory stand-in
//! - [`store`] - `RRset` persistence and `Zone` lookup (Kubernetes or in-memory)
//! - [`reconcilers`] - The `RRset` reconciliation algorithm
//! - [`record_controller`] - Controller and watch wiring
//! - [`metrics`] - Prometheus metrics and the per-object status sink
//! - [`server`] - `/metrics`, `/healthz` and `/readyz` endpoints
//! - [`cli`] - Command-line and environment configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use rrsync::names::resolve_fqdn;
//!
//! assert_eq!(resolve_fqdn("www", "example.com"), "www.example.com.");
//! assert_eq!(resolve_fqdn("@", "example.com"), "example.com.");
//! ```

pub mod cli;
pub mod constants;
pub mod context;
pub mod crd;
pub mod dns_errors;
pub mod manifests;
pub mod metrics;
pub mod names;
pub mod pdns;
pub mod reconcilers;
pub mod record_controller;
pub mod server;
pub mod store;

#[cfg(test)]
mod testing;
