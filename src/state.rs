//! # State document store.
//!
//! [`StateFile`] persists a small schema-versioned JSON document next to the
//! manager's admin socket. The document records per-label overrides:
//!
//! ```json
//! { "SchemaVersion": 1,
//!   "Overrides": { "my-job": { "Enabled": false } } }
//! ```
//!
//! ## Rules
//! - Opening a missing file creates it with the default document.
//! - Writes are atomic with respect to crash: the document is written to a
//!   sibling temp file, synced, and renamed over the target.
//! - Only `SchemaVersion` 1 is accepted; the field is reserved for future
//!   migration.
//! - Unknown top-level keys are preserved verbatim so newer builds can add
//!   fields without breaking older readers.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::error::StateError;

/// File name of the state document inside the state directory.
pub const STATE_FILE_NAME: &str = "state.json";

/// The schema version this build reads and writes.
const SCHEMA_VERSION: i64 = 1;

/// Open-or-create handle to the on-disk state document.
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    doc: Value,
}

impl StateFile {
    /// The default document written when no state file exists yet.
    pub fn default_document() -> Value {
        json!({ "SchemaVersion": SCHEMA_VERSION, "Overrides": {} })
    }

    /// Opens the document at `path`, creating it with `default_doc` when it
    /// does not exist.
    pub fn open(path: PathBuf, default_doc: Value) -> Result<Self, StateError> {
        let doc = if path.exists() {
            let data = fs::read_to_string(&path).map_err(|source| StateError::Read {
                path: path.clone(),
                source,
            })?;
            let doc: Value =
                serde_json::from_str(&data).map_err(|source| StateError::Parse {
                    path: path.clone(),
                    source,
                })?;
            let found = doc
                .get("SchemaVersion")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            if found != SCHEMA_VERSION {
                return Err(StateError::SchemaVersion {
                    path: path.clone(),
                    found,
                });
            }
            doc
        } else {
            write_atomic(&path, &default_doc)?;
            default_doc
        };
        Ok(Self { path, doc })
    }

    /// Returns the current document.
    pub fn value(&self) -> &Value {
        &self.doc
    }

    /// Replaces the document and durably writes it to disk.
    pub fn set_value(&mut self, doc: Value) -> Result<(), StateError> {
        write_atomic(&self.path, &doc)?;
        self.doc = doc;
        Ok(())
    }

    /// Returns the persisted `Enabled` override for `label`, if any.
    pub fn override_for(&self, label: &str) -> Option<bool> {
        self.doc
            .get("Overrides")?
            .get(label)?
            .get("Enabled")?
            .as_bool()
    }

    /// Records an `Enabled` override for `label` and writes the document.
    ///
    /// The label does not have to correspond to a loaded job; stale
    /// overrides persist and keep gating future loads.
    pub fn set_override(&mut self, label: &str, enabled: bool) -> Result<(), StateError> {
        let mut doc = self.doc.clone();
        let overrides = doc
            .as_object_mut()
            .and_then(|top| {
                top.entry("Overrides")
                    .or_insert_with(|| json!({}))
                    .as_object_mut()
            })
            .ok_or_else(|| StateError::Parse {
                path: self.path.clone(),
                source: serde::de::Error::custom("Overrides is not an object"),
            })?;
        overrides.insert(label.to_string(), json!({ "Enabled": enabled }));
        self.set_value(doc)
    }

    /// Resets the document to the default. Test builds only.
    #[cfg(test)]
    pub fn clear(&mut self) -> Result<(), StateError> {
        self.set_value(Self::default_document())
    }
}

/// Writes `doc` to a sibling temp file, syncs it, and renames it over `path`.
fn write_atomic(path: &Path, doc: &Value) -> Result<(), StateError> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(doc).map_err(|source| StateError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let mut file = File::create(&tmp).map_err(|source| StateError::Write {
        path: tmp.clone(),
        source,
    })?;
    file.write_all(&data).map_err(|source| StateError::Write {
        path: tmp.clone(),
        source,
    })?;
    file.sync_all().map_err(|source| StateError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| StateError::Write {
        path: path.to_path_buf(),
        source,
    })
}
