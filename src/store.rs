// 💾 Persistence adapters - "give me the last known list" / "persist this list"
//
// The registry only sees the `AtmStore` trait. The JSON file layout is an
// array of ATM records; absent or blank files read as an empty list.

use crate::entities::AtmRecord;
use crate::error::{AtmError, AtmResult};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Source of the persisted ATM snapshot
pub trait AtmStore: Send + Sync {
    /// Raw records from the last snapshot, unvalidated
    fn load(&self) -> AtmResult<Vec<Value>>;

    /// Replace the snapshot with `records`
    fn save(&self, records: &[AtmRecord]) -> AtmResult<()>;
}

// ============================================================================
// JSON FILE STORE
// ============================================================================

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AtmStore for JsonFileStore {
    fn load(&self) -> AtmResult<Vec<Value>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Array(items) => Ok(items),
            other => Err(AtmError::invalid_record(
                self.path.display().to_string(),
                format!("expected a JSON array of ATMs, found {}", json_kind(&other)),
            )),
        }
    }

    fn save(&self, records: &[AtmRecord]) -> AtmResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write next to the target then rename, so readers never see half a file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(records)?)?;
        fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Store kept in memory, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    raw: Mutex<Vec<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: Vec<Value>) -> Self {
        MemoryStore { raw: Mutex::new(raw) }
    }

    /// Replace the raw snapshot (simulates an external edit of the file)
    pub fn set_raw(&self, raw: Vec<Value>) {
        *self.raw.lock().unwrap_or_else(|e| e.into_inner()) = raw;
    }

    pub fn raw(&self) -> Vec<Value> {
        self.raw.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl AtmStore for MemoryStore {
    fn load(&self) -> AtmResult<Vec<Value>> {
        Ok(self.raw())
    }

    fn save(&self, records: &[AtmRecord]) -> AtmResult<()> {
        let values = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        self.set_raw(values);
        Ok(())
    }
}
