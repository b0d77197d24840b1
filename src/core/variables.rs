//! core::variables
//!
//! Concurrency-safe store for workflow variables.
//!
//! # Design
//!
//! Values seeded from user input are locked: workflow actions can read
//! them but never overwrite them. Action-produced values may be
//! reassigned freely. Reads hand out an immutable snapshot so template
//! rendering never races a concurrent `set`.
//!
//! # Example
//!
//! ```
//! use gitfleet::core::types::VariableName;
//! use gitfleet::core::variables::VariableStore;
//!
//! let store = VariableStore::new();
//! let name = VariableName::new("ticket").unwrap();
//! store.seed(name.clone(), "FLEET-42");
//!
//! // Seeded values win over later sets.
//! assert!(!store.set(name.clone(), "FLEET-99"));
//! assert_eq!(store.get(&name), Some("FLEET-42".to_string()));
//! ```

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::core::types::VariableName;

#[derive(Debug, Clone)]
struct Variable {
    value: String,
    locked: bool,
}

/// Mapping from validated variable names to string values.
///
/// Thread-safe; cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct VariableStore {
    entries: Mutex<BTreeMap<VariableName, Variable>>,
}

impl VariableStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a locked value. Seeded values never change for the lifetime
    /// of the run, even if seeded again.
    pub fn seed(&self, name: VariableName, value: impl Into<String>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.entry(name).or_insert_with(|| Variable {
            value: value.into().trim().to_string(),
            locked: true,
        });
    }

    /// Set an unlocked value, trimming surrounding whitespace.
    ///
    /// Returns `false` when the name is locked and the value was kept.
    pub fn set(&self, name: VariableName, value: impl Into<String>) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get_mut(&name) {
            Some(existing) if existing.locked => false,
            Some(existing) => {
                existing.value = value.into().trim().to_string();
                true
            }
            None => {
                entries.insert(
                    name,
                    Variable {
                        value: value.into().trim().to_string(),
                        locked: false,
                    },
                );
                true
            }
        }
    }

    /// Read a single value.
    pub fn get(&self, name: &VariableName) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(name).map(|v| v.value.clone())
    }

    /// Shallow copy of every visible variable, keyed by string name.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .map(|(name, var)| (name.as_str().to_string(), var.value.clone()))
            .collect()
    }
}
