// All core functionality is in claimtext-core
// This CLI acts as a thin wrapper around the core library

use anyhow::{bail, Result};
use std::path::Path;

// CLI-specific modules
pub mod model_manager;

// Re-export core types for convenience
pub use claimtext_core::*;

// Re-export CLI utilities
pub use model_manager::ModelManager;

/// A missing input is a filesystem failure, not a no-op
pub fn require_input(input: &Path) -> Result<()> {
    if !input.is_file() {
        bail!("input file not found: {}", input.display());
    }
    Ok(())
}

/// `{input_stem}{_config_stem}_claimtext[_extract].json` next to the working directory
pub fn default_output_path(input: &Path, config: Option<&str>, extract_only: bool) -> String {
    let input_name = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let config_suffix = config
        .and_then(|p| Path::new(p).file_stem())
        .and_then(|s| s.to_str())
        .map(|s| format!("_{s}"))
        .unwrap_or_default();
    let mode = if extract_only { "_extract" } else { "" };
    format!("{input_name}{config_suffix}_claimtext{mode}.json")
}
