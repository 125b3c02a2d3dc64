//! Declarative hook files.
//!
//! A hook file lists hooks with the phase they attach to and the edits they
//! make. The format is picked from the extension: `.toml`, `.yaml`/`.yml` or
//! `.json`.
//!
//! ```toml
//! [[hooks]]
//! phase = "after"
//! transaction = "Machines > Machines collection > Get Machines"
//!
//! [[hooks.actions]]
//! op = "append"
//! path = "hooks_modifications"
//! value = "after mod"
//!
//! [[hooks.actions]]
//! op = "set"
//! path = "fail"
//! value = "Yay! Failed!"
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::actions::Action;
use super::HookLoader;
use crate::error::HooklineError;
use crate::hooks::{Callback, HookDescriptor, HookPhase, HookRegistry, Transaction};
use crate::utils::display_name;

/// Phase names as written in hook files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePhase {
    BeforeAll,
    AfterAll,
    BeforeEach,
    BeforeEachValidation,
    AfterEach,
    BeforeValidation,
    Before,
    After,
}

impl FilePhase {
    pub fn hook_phase(&self) -> HookPhase {
        match self {
            FilePhase::BeforeAll => HookPhase::BeforeAll,
            FilePhase::AfterAll => HookPhase::AfterAll,
            FilePhase::BeforeEach => HookPhase::BeforeEach,
            FilePhase::BeforeEachValidation => HookPhase::BeforeEachValidation,
            FilePhase::AfterEach => HookPhase::AfterEach,
            FilePhase::BeforeValidation => HookPhase::BeforeNamedValidation,
            FilePhase::Before => HookPhase::BeforeNamed,
            FilePhase::After => HookPhase::AfterNamed,
        }
    }
}

/// One hook entry in a hook file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookSpec {
    pub phase: FilePhase,
    /// Exact transaction name, required for `before_validation`, `before`
    /// and `after`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Top-level document of a hook file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookFile {
    #[serde(default)]
    pub hooks: Vec<HookSpec>,
}

impl HookFile {
    /// Read and parse a hook file, choosing the format by extension.
    pub fn read(path: &Path) -> Result<Self, HooklineError> {
        let content = fs::read_to_string(path).map_err(|e| load_error(path, e))?;
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let file: HookFile = match extension.as_str() {
            "toml" => toml::from_str(&content).map_err(|e| load_error(path, e))?,
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| load_error(path, e))?,
            "json" => serde_json::from_str(&content).map_err(|e| load_error(path, e))?,
            other => {
                return Err(load_error(
                    path,
                    format!("unsupported hook file extension '{other}' (expected toml, yaml or json)"),
                ))
            }
        };

        file.validate(path)?;
        Ok(file)
    }

    /// Check phase/transaction combinations and action paths.
    pub fn validate(&self, path: &Path) -> Result<(), HooklineError> {
        for (index, spec) in self.hooks.iter().enumerate() {
            let position = index + 1;
            let phase = spec.phase.hook_phase();
            match (phase.is_named(), spec.transaction.as_deref()) {
                (true, None) => {
                    return Err(load_error(
                        path,
                        format!("hook {position} ({phase}) requires a 'transaction' name"),
                    ))
                }
                (false, Some(_)) => {
                    return Err(load_error(
                        path,
                        format!("hook {position} ({phase}) does not take a 'transaction' name"),
                    ))
                }
                _ => {}
            }
            for action in &spec.actions {
                action
                    .validate()
                    .map_err(|e| load_error(path, format!("hook {position}: {e}")))?;
            }
        }
        Ok(())
    }

    /// Register every hook in document order.
    pub fn register(self, source: &str, registry: &mut HookRegistry) -> usize {
        let count = self.hooks.len();
        for (index, spec) in self.hooks.into_iter().enumerate() {
            let phase = spec.phase.hook_phase();
            let label = format!("{source}#{}", index + 1);
            let actions = Arc::new(spec.actions);

            let callback = if phase.is_suite() {
                let label = label.clone();
                Callback::suite(move |transactions: &mut Vec<Transaction>| {
                    for action in actions.iter() {
                        if let Action::Log { message } = action {
                            tracing::info!(hook = %label, "{message}");
                            continue;
                        }
                        for transaction in transactions.iter_mut() {
                            action.apply(transaction)?;
                        }
                    }
                    Ok(())
                })
            } else {
                let label = label.clone();
                Callback::transaction(move |transaction: &mut Transaction| {
                    for action in actions.iter() {
                        if let Action::Log { message } = action {
                            tracing::info!(hook = %label, "{message}");
                            continue;
                        }
                        action.apply(transaction)?;
                    }
                    Ok(())
                })
            };

            let mut descriptor = HookDescriptor::new(phase, callback).with_label(label);
            if let Some(name) = spec.transaction {
                descriptor = descriptor.with_name_filter(name);
            }
            registry.add(descriptor);
        }
        count
    }
}

/// Loads declarative hook files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl HookLoader for FileLoader {
    fn load(&self, path: &Path, registry: &mut HookRegistry) -> Result<usize, HooklineError> {
        let file = HookFile::read(path)?;
        Ok(file.register(&display_name(path), registry))
    }
}

fn load_error(path: &Path, reason: impl ToString) -> HooklineError {
    HooklineError::Load {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
