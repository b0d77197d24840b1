//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`VariableName`] - Validated workflow variable name
//! - [`OwnerRepo`] - Owner/repository split of a GitHub full name
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use gitfleet::core::types::{OwnerRepo, VariableName};
//!
//! let name = VariableName::new("workflow_run_id").unwrap();
//! assert_eq!(name.as_str(), "workflow_run_id");
//!
//! // Invalid constructions fail at creation time
//! assert!(VariableName::new("has space").is_err());
//! assert!(VariableName::new("").is_err());
//!
//! let split = OwnerRepo::parse("octo/widgets");
//! assert_eq!(split.owner, "octo");
//! assert_eq!(split.name, "widgets");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid variable name: {0}")]
    InvalidVariableName(String),
}

static VARIABLE_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("variable name pattern is valid"));

/// A validated workflow variable name.
///
/// Variable names may contain ASCII letters, digits, `_`, `.`, and `-`,
/// and must be non-empty. Dots allow namespacing captured values
/// (`Captured.owner`).
///
/// # Example
///
/// ```
/// use gitfleet::core::types::VariableName;
///
/// let name = VariableName::new("Captured.default-branch").unwrap();
/// assert_eq!(name.as_str(), "Captured.default-branch");
///
/// assert!(VariableName::new("no spaces allowed").is_err());
/// assert!(VariableName::new("no/slashes").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariableName(String);

impl VariableName {
    /// Create a new validated variable name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidVariableName` if the name is empty or
    /// contains a character outside `[A-Za-z0-9_.-]`.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if !VARIABLE_NAME_PATTERN.is_match(&name) {
            return Err(TypeError::InvalidVariableName(name));
        }
        Ok(Self(name))
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VariableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VariableName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VariableName> for String {
    fn from(value: VariableName) -> Self {
        value.0
    }
}

/// The owner/name split of a repository full name.
///
/// Full names that do not contain exactly one `/` map to an empty owner
/// with the whole input as the name, so callers can always render
/// *something* while guards detect the missing owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRepo {
    /// Repository owner (organization or user). Empty when unknown.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl OwnerRepo {
    /// Split an `owner/name` full name.
    pub fn parse(full_name: &str) -> Self {
        let mut parts = full_name.splitn(2, '/');
        match (parts.next(), parts.next()) {
            (Some(owner), Some(name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                }
            }
            _ => Self {
                owner: String::new(),
                name: full_name.to_string(),
            },
        }
    }

    /// True when the owner half is known.
    pub fn has_owner(&self) -> bool {
        !self.owner.is_empty()
    }

    /// Rejoin into `owner/name` (or just `name` when the owner is unknown).
    pub fn full_name(&self) -> String {
        if self.owner.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.owner, self.name)
        }
    }
}
