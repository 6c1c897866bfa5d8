//! Observations on single variables.

use serde::{Deserialize, Serialize};

use crate::error::{PgmError, Result};
use crate::graph::NodeId;
use crate::potential::Potential;

/// Evidence on one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Evidence {
    /// The variable was observed in this state.
    Hard(usize),
    /// Likelihood of each state; need not sum to one.
    Soft(Vec<f64>),
}

impl Evidence {
    /// True for an observed state.
    pub fn is_hard(&self) -> bool {
        matches!(self, Evidence::Hard(_))
    }

    /// Likelihood table over `node`.
    pub fn likelihood(&self, node: NodeId, domain_size: usize) -> Result<Potential> {
        let values = match self {
            Evidence::Hard(state) => {
                if *state >= domain_size {
                    return Err(PgmError::InvalidEvidence {
                        node,
                        reason: format!(
                            "state {} out of range for domain size {}",
                            state, domain_size
                        ),
                    });
                }
                let mut values = vec![0.0; domain_size];
                values[*state] = 1.0;
                values
            }
            Evidence::Soft(values) => {
                if values.len() != domain_size {
                    return Err(PgmError::InvalidEvidence {
                        node,
                        reason: format!(
                            "{} likelihoods for domain size {}",
                            values.len(),
                            domain_size
                        ),
                    });
                }
                if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err(PgmError::InvalidEvidence {
                        node,
                        reason: "likelihoods must be finite and non-negative".to_string(),
                    });
                }
                if values.iter().all(|&v| v == 0.0) {
                    return Err(PgmError::InvalidEvidence {
                        node,
                        reason: "every likelihood is zero".to_string(),
                    });
                }
                values.clone()
            }
        };
        Potential::from_vec(vec![node], &[domain_size], values)
    }
}
