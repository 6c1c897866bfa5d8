//! Inference configuration.
//!
//! Every field has a default, so a TOML file only needs the keys it changes:
//!
//! ```toml
//! elimination = "weighted-min-fill"
//! minimality = true
//! domain = "log"
//! max_triangulation_time_ms = 250
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::elimination::EliminationHeuristic;
use crate::error::{PgmError, Result};
use crate::junction_tree::JunctionTreeStrategy;

/// Representation of table values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumericDomain {
    /// Probabilities; combine by product, marginalize by sum.
    #[default]
    Linear,
    /// Log-probabilities; combine by sum, marginalize by log-sum-exp.
    Log,
}

/// What the propagation computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropagationMode {
    /// Marginals.
    #[default]
    SumProduct,
    /// Max-marginals.
    MaxProduct,
}

/// Options for building and running a junction-tree engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Elimination heuristic used for triangulation.
    pub elimination: EliminationHeuristic,

    /// Remove fill-ins not needed for chordality.
    pub minimality: bool,

    /// Binarize the junction tree before propagation.
    pub binary_join_tree: bool,

    /// Whether tables hold probabilities or their logarithms.
    pub domain: NumericDomain,

    /// Triangulation time budget; `None` is unlimited.
    pub max_triangulation_time_ms: Option<u64>,

    /// How cliques are connected into a tree.
    pub junction_tree: JunctionTreeStrategy,

    /// Sum-product or max-product.
    pub mode: PropagationMode,

    /// Propagate independent subtrees on the rayon pool.
    pub parallel: bool,
}

impl InferenceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_elimination(mut self, elimination: EliminationHeuristic) -> Self {
        self.elimination = elimination;
        self
    }

    pub fn with_minimality(mut self, minimality: bool) -> Self {
        self.minimality = minimality;
        self
    }

    pub fn with_binary_join_tree(mut self, binary: bool) -> Self {
        self.binary_join_tree = binary;
        self
    }

    pub fn with_domain(mut self, domain: NumericDomain) -> Self {
        self.domain = domain;
        self
    }

    /// Limit triangulation time. Limits beyond `u64::MAX` milliseconds saturate.
    pub fn with_max_triangulation_time(mut self, limit: Duration) -> Self {
        self.max_triangulation_time_ms =
            Some(u64::try_from(limit.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_junction_tree(mut self, strategy: JunctionTreeStrategy) -> Self {
        self.junction_tree = strategy;
        self
    }

    pub fn with_mode(mut self, mode: PropagationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Triangulation budget as a [`Duration`].
    pub fn max_triangulation_time(&self) -> Option<Duration> {
        self.max_triangulation_time_ms.map(Duration::from_millis)
    }

    /// Parse from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Serialize to a pretty TOML document.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Reject settings the engine cannot run.
    pub fn validate(&self) -> Result<()> {
        if let EliminationHeuristic::FixedOrder(order) = &self.elimination {
            for (i, node) in order.iter().enumerate() {
                if order[..i].contains(node) {
                    return Err(PgmError::Config(format!(
                        "fixed elimination order lists node {} twice",
                        node
                    )));
                }
            }
        }
        Ok(())
    }
}
