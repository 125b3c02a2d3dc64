//! Loading hook definitions into a registry before serving starts.
//!
//! Paths may be literal files or glob patterns. Files are loaded in the order
//! given (glob matches sorted within each pattern), so registration order
//! across files follows the command line.

mod actions;
mod file;


use std::path::{Path, PathBuf};

use glob::glob;

use crate::error::HooklineError;
use crate::hooks::HookRegistry;
use crate::utils::is_glob_pattern;

pub use actions::Action;
pub use file::{FileLoader, FilePhase, HookFile, HookSpec};

/// Source of hook registrations.
pub trait HookLoader {
    /// Register the hooks defined at `path`.
    ///
    /// # Returns
    /// The number of hooks registered
    fn load(&self, path: &Path, registry: &mut HookRegistry) -> Result<usize, HooklineError>;
}

/// Expand literal paths and glob patterns into an ordered file list.
///
/// A literal path that does not exist is an error. A glob pattern that
/// matches nothing only logs a warning.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>, HooklineError> {
    let mut files = Vec::new();

    for pattern in patterns {
        if !is_glob_pattern(pattern) {
            let path = PathBuf::from(pattern);
            if !path.is_file() {
                return Err(HooklineError::Load {
                    path,
                    reason: "file not found".to_string(),
                });
            }
            files.push(path);
            continue;
        }

        let mut matches: Vec<PathBuf> = glob(pattern)
            .map_err(|e| HooklineError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?
            .filter_map(|r| r.ok())
            .filter(|path| path.is_file())
            .collect();
        matches.sort();

        if matches.is_empty() {
            tracing::warn!(%pattern, "No hook files match pattern");
        }
        files.extend(matches);
    }

    Ok(files)
}

/// Load every file matched by `patterns` into `registry`.
///
/// # Returns
/// The files that were loaded, in load order. Fails if any file fails to
/// load or if nothing was loaded at all.
pub fn load_hook_files(
    patterns: &[String],
    loader: &dyn HookLoader,
    registry: &mut HookRegistry,
) -> Result<Vec<PathBuf>, HooklineError> {
    let files = expand_patterns(patterns)?;
    if files.is_empty() {
        return Err(HooklineError::NoHookFiles);
    }

    for path in &files {
        let count = loader.load(path, registry)?;
        tracing::info!(path = %path.display(), hooks = count, "Loaded hook file");
    }

    Ok(files)
}
