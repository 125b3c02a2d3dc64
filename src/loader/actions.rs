//! Transaction edits a declarative hook can perform.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::hooks::Transaction;
use crate::utils::value_kind;

/// One step of a declarative hook, applied in document order.
///
/// Paths are dotted keys into nested objects, e.g. `request.headers.Accept`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// Set `path` to `value`, creating intermediate objects
    Set { path: String, value: Value },
    /// Push `value` onto the array at `path`, creating it if absent
    Append { path: String, value: Value },
    /// Delete the key at `path` if it exists
    Remove { path: String },
    /// Emit a trace line
    Log { message: String },
}

impl Action {
    /// Path this action edits, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Action::Set { path, .. } | Action::Append { path, .. } | Action::Remove { path } => {
                Some(path)
            }
            Action::Log { .. } => None,
        }
    }

    /// Check the action is well formed before it is registered.
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = self.path() {
            if path.is_empty() || path.split('.').any(str::is_empty) {
                bail!("invalid path '{path}': segments must be non-empty");
            }
        }
        Ok(())
    }

    /// Apply this action to one transaction. `Log` is a no-op here.
    pub fn apply(&self, transaction: &mut Transaction) -> Result<()> {
        match self {
            Action::Set { path, value } => {
                let (parents, key) = split_path(path);
                let target = parent_object(transaction, &parents, true)?
                    .ok_or_else(|| anyhow::anyhow!("'{path}' could not be created"))?;
                target.insert(key.to_string(), value.clone());
            }
            Action::Append { path, value } => {
                let (parents, key) = split_path(path);
                let target = parent_object(transaction, &parents, true)?
                    .ok_or_else(|| anyhow::anyhow!("'{path}' could not be created"))?;
                match target
                    .entry(key.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()))
                {
                    Value::Array(items) => items.push(value.clone()),
                    other => bail!("cannot append to '{path}': it is {}", value_kind(other)),
                }
            }
            Action::Remove { path } => {
                let (parents, key) = split_path(path);
                if let Some(target) = parent_object(transaction, &parents, false)? {
                    target.shift_remove(key);
                }
            }
            Action::Log { .. } => {}
        }
        Ok(())
    }
}

fn split_path(path: &str) -> (Vec<&str>, &str) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let key = segments.pop().unwrap_or(path);
    (segments, key)
}

/// Walk `parents` from `root`, returning the object that holds the final key.
///
/// With `create`, missing objects are inserted; otherwise a missing segment
/// yields `Ok(None)`. Walking through a non-object is an error.
fn parent_object<'a>(
    root: &'a mut Transaction,
    parents: &[&str],
    create: bool,
) -> Result<Option<&'a mut Map<String, Value>>> {
    let mut current = root;
    for segment in parents {
        let next = if create {
            current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()))
        } else {
            match current.get_mut(*segment) {
                Some(value) => value,
                None => return Ok(None),
            }
        };
        current = match next {
            Value::Object(map) => map,
            other => bail!("'{segment}' is {}, not an object", value_kind(other)),
        };
    }
    Ok(Some(current))
}
