//! `quill.json` loading.
//!
//! ```json
//! { "compilerOptions": { "maxSweeps": 8, "stopAfter": "validate" } }
//! ```
//!
//! Options given on the command line win over the config file, which wins
//! over the driver defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use quill_driver::DriverOptions;

use crate::args::CliArgs;

pub const CONFIG_FILE: &str = "quill.json";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QuillConfig {
    #[serde(default)]
    pub compiler_options: DriverOptions,
}

pub fn load_config(path: &Path) -> Result<QuillConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config {}", path.display()))
}

/// The config file that applies to `args`, if any.
#[must_use]
pub fn find_config(args: &CliArgs) -> Option<PathBuf> {
    if let Some(path) = &args.config {
        return Some(path.clone());
    }
    if args.no_config {
        return None;
    }
    let dir = args.program.parent().unwrap_or_else(|| Path::new("."));
    let candidate = dir.join(CONFIG_FILE);
    candidate.is_file().then_some(candidate)
}

/// Merge the config file and command-line overrides into driver options.
pub fn resolve_options(args: &CliArgs) -> Result<DriverOptions> {
    let mut options = match find_config(args) {
        Some(path) => {
            debug!(config = %path.display(), "loading config");
            load_config(&path)?.compiler_options
        }
        None => DriverOptions::default(),
    };

    if let Some(max_sweeps) = args.max_sweeps {
        options.max_sweeps = max_sweeps;
    }
    if let Some(max_errors) = args.max_errors {
        options.max_errors = max_errors;
    }
    if args.stop_after.is_some() {
        options.stop_after = args.stop_after;
    }
    if args.warnings_as_errors {
        options.warnings_as_errors = true;
    }
    if options.max_sweeps == 0 {
        anyhow::bail!("maxSweeps must be at least 1");
    }
    Ok(options)
}
