//! Discrete random variables.

use serde::{Deserialize, Serialize};

use crate::error::{PgmError, Result};

/// A named discrete variable with ordered state labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    labels: Vec<String>,
}

impl Variable {
    /// Variable with `domain_size` states labelled `"0"`, `"1"`, ...
    pub fn new(name: impl Into<String>, domain_size: usize) -> Result<Self> {
        let labels = (0..domain_size).map(|i| i.to_string()).collect();
        Self::with_labels(name, labels)
    }

    /// Variable with explicit state labels.
    pub fn with_labels(name: impl Into<String>, labels: Vec<String>) -> Result<Self> {
        let name = name.into();
        if labels.is_empty() {
            return Err(PgmError::InvalidTable(format!(
                "variable '{}' needs at least one state",
                name
            )));
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(PgmError::InvalidTable(format!(
                    "variable '{}' has duplicate label '{}'",
                    name, label
                )));
            }
        }
        Ok(Self { name, labels })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of states.
    pub fn domain_size(&self) -> usize {
        self.labels.len()
    }

    /// Index of the state called `label`.
    pub fn state(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}<{}>", self.name, self.labels.join(","))
    }
}
