// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the rrsync operator.
//!
//! Two kinds of metrics live here:
//!
//! - **Controller metrics** - process-wide reconciliation counters and
//!   histograms with the namespace prefix `rrsync_firestoned_io_`, registered
//!   in [`METRICS_REGISTRY`] on first use.
//! - **Per-object status** - the `rrsets_status` gauge, one series per
//!   `RRset`. It is not a global: the reconciler receives a [`StatusSink`] and
//!   publishes through it, which keeps the engine testable and lets the sink
//!   remove the exact series an object published last.
//!
//! # Example
//!
//! ```rust,no_run
//! use rrsync::metrics::{record_reconciliation_success, METRICS_REGISTRY, PrometheusStatusSink};
//!
//! let sink = PrometheusStatusSink::new(&METRICS_REGISTRY).unwrap();
//! record_reconciliation_success("RRset", std::time::Duration::from_millis(12));
//! ```

use crate::crd::{RRset, SyncStatus};
use kube::runtime::reflector::ObjectRef;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all controller metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "rrsync_firestoned_io";

/// Name of the per-object status gauge
pub const RRSETS_STATUS_METRIC: &str = "rrsets_status";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of resource (e.g., `RRset`)
/// - `status`: Outcome (`success`, `error`, `requeue`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `resource_type`: Kind of resource
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of requeue operations
///
/// Labels:
/// - `resource_type`: Kind of resource
/// - `reason`: Reason for requeue (`conflict`, `missing_zone`, `error`)
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of requeue operations by resource type and reason",
    );
    let counter = CounterVec::new(opts, &["resource_type", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// PowerDNS Change Metrics
// ============================================================================

/// Total number of record-set changes sent to PowerDNS
///
/// Labels:
/// - `operation`: `replace` or `delete`
pub static PDNS_CHANGES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_pdns_changes_total"),
        "Total number of record-set changes sent to PowerDNS by operation",
    );
    let counter = CounterVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of errors by resource type and error category
///
/// Labels:
/// - `resource_type`: Kind of resource
/// - `error_type`: Category of error (`persistence`, `external_sync`, `invalid`)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of errors by resource type and error category",
    );
    let counter = CounterVec::new(opts, &["resource_type", "error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation
///
/// # Arguments
/// * `resource_type` - The kind of resource reconciled (e.g., `RRset`)
/// * `duration` - Duration of the reconciliation
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
///
/// # Arguments
/// * `resource_type` - The kind of resource reconciled
/// * `duration` - Duration of the reconciliation before failure
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a reconciliation requeue
pub fn record_reconciliation_requeue(resource_type: &str, reason: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "requeue"])
        .inc();
    REQUEUE_TOTAL
        .with_label_values(&[resource_type, reason])
        .inc();
}

/// Record a change sent to PowerDNS (`replace` or `delete`)
pub fn record_pdns_change(operation: &str) {
    PDNS_CHANGES_TOTAL.with_label_values(&[operation]).inc();
}

/// Record an error
///
/// # Arguments
/// * `resource_type` - The kind of resource where error occurred
/// * `error_type` - Category of error
pub fn record_error(resource_type: &str, error_type: &str) {
    ERRORS_TOTAL
        .with_label_values(&[resource_type, error_type])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

// ============================================================================
// Per-Object Status
// ============================================================================

/// Receives the sync outcome of every `RRset`.
///
/// Both calls are idempotent; the last `publish` for an identity wins.
pub trait StatusSink: Send + Sync {
    /// Report the current outcome of `identity`.
    fn publish(
        &self,
        dns_entry_name: &str,
        record_type: &str,
        status: SyncStatus,
        identity: &ObjectRef<RRset>,
    );

    /// Forget `identity`.
    fn retract(&self, identity: &ObjectRef<RRset>);
}

/// Label values of one `rrsets_status` series: fqdn, type, status, name, namespace.
type SeriesLabels = [String; 5];

/// [`StatusSink`] backed by the `rrsets_status` gauge.
///
/// Each identity owns at most one series. When an outcome changes (or the
/// name/type of the record-set changes) the previous series is removed before
/// the new one is set.
pub struct PrometheusStatusSink {
    gauge: GaugeVec,
    series: Mutex<HashMap<ObjectRef<RRset>, SeriesLabels>>,
}

impl PrometheusStatusSink {
    /// Create the gauge and register it in `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric with the same name is already registered.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let gauge = GaugeVec::new(
            Opts::new(RRSETS_STATUS_METRIC, "Statuses of RRsets processed"),
            &["fqdn", "type", "status", "name", "namespace"],
        )?;
        registry.register(Box::new(gauge.clone()))?;
        Ok(Self {
            gauge,
            series: Mutex::default(),
        })
    }

    fn remove_series(&self, labels: &SeriesLabels) {
        let values: Vec<&str> = labels.iter().map(String::as_str).collect();
        // Already absent is fine.
        let _ = self.gauge.remove_label_values(&values);
    }
}

impl StatusSink for PrometheusStatusSink {
    fn publish(
        &self,
        dns_entry_name: &str,
        record_type: &str,
        status: SyncStatus,
        identity: &ObjectRef<RRset>,
    ) {
        let labels: SeriesLabels = [
            dns_entry_name.to_string(),
            record_type.to_string(),
            status.as_str().to_string(),
            identity.name.clone(),
            identity.namespace.clone().unwrap_or_default(),
        ];

        let mut series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = series.get(identity) {
            if *previous != labels {
                self.remove_series(previous);
            }
        }
        let values: Vec<&str> = labels.iter().map(String::as_str).collect();
        self.gauge.with_label_values(&values).set(1.0);
        series.insert(identity.clone(), labels);
    }

    fn retract(&self, identity: &ObjectRef<RRset>) {
        let mut series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = series.remove(identity) {
            self.remove_series(&previous);
        }
    }
}

/// One entry held by [`MemoryStatusSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedStatus {
    pub dns_entry_name: String,
    pub record_type: String,
    pub status: SyncStatus,
}

/// [`StatusSink`] that keeps the last published outcome per identity in memory.
#[derive(Default)]
pub struct MemoryStatusSink {
    entries: Mutex<HashMap<ObjectRef<RRset>, PublishedStatus>>,
}

impl MemoryStatusSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last outcome published for `identity`, unless it was retracted.
    #[must_use]
    pub fn get(&self, identity: &ObjectRef<RRset>) -> Option<PublishedStatus> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StatusSink for MemoryStatusSink {
    fn publish(
        &self,
        dns_entry_name: &str,
        record_type: &str,
        status: SyncStatus,
        identity: &ObjectRef<RRset>,
    ) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                identity.clone(),
                PublishedStatus {
                    dns_entry_name: dns_entry_name.to_string(),
                    record_type: record_type.to_string(),
                    status,
                },
            );
    }

    fn retract(&self, identity: &ObjectRef<RRset>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity);
    }
}
