//! Safety checks run before the digest overwrites anything.
//!
//! The output file must never clobber one of the library exports it was
//! computed from.

use anyhow::{bail, Result};
use std::path::Path;

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output must have a `.json` extension
/// - Output cannot be the same as any of the input libraries
pub fn validate_output_path(output: &Path, source_paths: &[&Path]) -> Result<()> {
    let is_json = output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if !is_json {
        bail!(
            "Safety check failed: output file '{}' must have a .json extension",
            output.display()
        );
    }

    for source in source_paths {
        if same_file(output, source) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as library '{}'",
                output.display(),
                source.display()
            );
        }
    }

    Ok(())
}

/// Path equality, resolving both sides when they exist on disk.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
