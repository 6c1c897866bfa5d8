//! Odometer-style iteration over the joint states of a variable list.

use crate::error::{PgmError, Result};
use crate::graph::NodeId;

/// One joint assignment of a list of variables.
///
/// The last variable varies fastest, matching the row-major layout of
/// [`Potential`](super::Potential) values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instantiation {
    variables: Vec<NodeId>,
    dims: Vec<usize>,
    states: Vec<usize>,
    overflow: bool,
}

impl Instantiation {
    /// First assignment (all zeros) of `variables` with the given domain sizes.
    pub fn new(variables: Vec<NodeId>, dims: Vec<usize>) -> Result<Self> {
        if variables.len() != dims.len() {
            return Err(PgmError::InvalidTable(format!(
                "{} variables but {} domain sizes",
                variables.len(),
                dims.len()
            )));
        }
        let overflow = dims.iter().any(|&d| d == 0);
        Ok(Self {
            states: vec![0; variables.len()],
            variables,
            dims,
            overflow,
        })
    }

    /// Caller guarantees `variables.len() == dims.len()`.
    pub(super) fn from_parts(variables: Vec<NodeId>, dims: Vec<usize>) -> Self {
        let overflow = dims.iter().any(|&d| d == 0);
        Self {
            states: vec![0; variables.len()],
            variables,
            dims,
            overflow,
        }
    }

    pub fn variables(&self) -> &[NodeId] {
        &self.variables
    }

    pub fn states(&self) -> &[usize] {
        &self.states
    }

    pub fn state_of(&self, var: NodeId) -> Option<usize> {
        self.variables
            .iter()
            .position(|&v| v == var)
            .map(|i| self.states[i])
    }

    pub fn set_state(&mut self, var: NodeId, state: usize) -> Result<()> {
        let i = self
            .variables
            .iter()
            .position(|&v| v == var)
            .ok_or(PgmError::NodeNotFound(var))?;
        if state >= self.dims[i] {
            return Err(PgmError::InvalidTable(format!(
                "state {} out of range for variable {} of size {}",
                state, var, self.dims[i]
            )));
        }
        self.states[i] = state;
        Ok(())
    }

    /// Move to the next assignment; sets the end flag after the last one.
    pub fn inc(&mut self) {
        if self.overflow {
            return;
        }
        for i in (0..self.states.len()).rev() {
            self.states[i] += 1;
            if self.states[i] < self.dims[i] {
                return;
            }
            self.states[i] = 0;
        }
        self.overflow = true;
    }

    /// True once every assignment has been visited.
    pub fn is_end(&self) -> bool {
        self.overflow
    }

    pub fn reset(&mut self) {
        self.states.iter_mut().for_each(|s| *s = 0);
        self.overflow = self.dims.iter().any(|&d| d == 0);
    }

    /// Number of joint assignments.
    pub fn domain_size(&self) -> usize {
        self.dims.iter().product()
    }
}
