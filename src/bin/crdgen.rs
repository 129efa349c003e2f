// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Writes the `Zone` and `RRset` CRDs to deploy/crds/ from the types in src/crd.rs.
//!
//! Usage:
//!   cargo run --bin crdgen

use std::path::Path;

fn main() -> anyhow::Result<()> {
    let output_dir = Path::new("deploy/crds");

    println!("Generating CRD YAML files from src/crd.rs...");

    for path in rrsync::manifests::write_crds(output_dir)? {
        println!("  ✓ Generated {}", path.display());
    }

    println!("✓ Successfully generated CRD YAML files in deploy/crds/");
    println!("\nNext steps:");
    println!("  1. Review the generated files");
    println!("  2. Deploy with: kubectl apply -f deploy/crds/");

    Ok(())
}
