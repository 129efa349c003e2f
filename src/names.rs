// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS name canonicalization.
//!
//! Names are compared and stored in lower-case, fully-qualified, trailing-dot
//! form (`www.example.com.`), which is also the form PowerDNS returns.

use crate::crd::RRset;

/// Name used in a record-set spec to address the zone apex.
pub const APEX: &str = "@";

/// Return `name` in canonical form: lower-case with exactly one trailing dot.
///
/// # Example
///
/// ```rust
/// use rrsync::names::make_canonical;
///
/// assert_eq!(make_canonical("Example.COM"), "example.com.");
/// assert_eq!(make_canonical("example.com."), "example.com.");
/// ```
#[must_use]
pub fn make_canonical(name: &str) -> String {
    let trimmed = name.trim().trim_end_matches('.');
    format!("{}.", trimmed.to_ascii_lowercase())
}

/// Resolve a record name against its zone.
///
/// - `@` is the zone apex
/// - a name ending in `.` is already fully qualified
/// - anything else is relative to the zone
#[must_use]
pub fn resolve_fqdn(record_name: &str, zone_name: &str) -> String {
    let record_name = record_name.trim();
    if record_name.is_empty() || record_name == APEX {
        make_canonical(zone_name)
    } else if record_name.ends_with('.') {
        make_canonical(record_name)
    } else {
        make_canonical(&format!(
            "{record_name}.{}",
            zone_name.trim().trim_end_matches('.')
        ))
    }
}

/// Canonical DNS name an `RRset` resolves to, using its `zoneRef` as the zone.
#[must_use]
pub fn rrset_fqdn(rrset: &RRset) -> String {
    resolve_fqdn(&rrset.spec.name, &rrset.spec.zone_ref.name)
}

/// Uniqueness key for a canonical name and record type: `"<fqdn>/<TYPE>"`.
#[must_use]
pub fn entry_key(fqdn: &str, record_type: &str) -> String {
    format!("{fqdn}/{}", record_type.trim().to_ascii_uppercase())
}
