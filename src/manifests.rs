// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD manifest rendering.
//!
//! Backs the `crdgen` binary, which keeps `deploy/crds/` in sync with the
//! types in [`crate::crd`].

use crate::crd::{RRset, Zone};
use anyhow::Result;
use kube::CustomResourceExt;
use std::fs;
use std::path::{Path, PathBuf};

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

/// File name and YAML content of every CRD the operator serves.
///
/// # Errors
///
/// Returns an error if a CRD cannot be serialized.
pub fn crd_manifests() -> Result<Vec<(&'static str, String)>> {
    Ok(vec![
        ("zones.crd.yaml", render_crd::<Zone>()?),
        ("rrsets.crd.yaml", render_crd::<RRset>()?),
    ])
}

/// Render the CRD of `T` as YAML with the generated-file header.
///
/// # Errors
///
/// Returns an error if the CRD cannot be serialized.
pub fn render_crd<T: CustomResourceExt>() -> Result<String> {
    let yaml = serde_yaml::to_string(&T::crd())?;
    Ok(format!("{COPYRIGHT_HEADER}{yaml}"))
}

/// Write every CRD manifest into `output_dir`, creating it if needed.
///
/// # Errors
///
/// Returns an error if the directory or a file cannot be written.
pub fn write_crds(output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;

    let mut written = Vec::new();
    for (filename, content) in crd_manifests()? {
        let path = output_dir.join(filename);
        fs::write(&path, content)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
#[path = "manifests_tests.rs"]
mod manifests_tests;
