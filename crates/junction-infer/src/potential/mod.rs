//! Dense multidimensional tables over discrete variables.
//!
//! A [`Potential`] maps every joint state of an ordered variable list to a
//! scalar. It is the workhorse of junction-tree inference: clique tables,
//! messages, evidence likelihoods and posteriors are all potentials.
//!
//! ```text
//! combine(φ(A,B), ψ(B,C), ×)  = χ(A,B,C)     pointwise, broadcast on missing vars
//! project(χ(A,B,C), {A,C}, Σ) = ω(B)         reduce the removed axes
//! ```

mod instantiation;
mod ops;

pub use instantiation::Instantiation;
pub use ops::{log_sum_exp, CombineOp, ProjectOp};

use ndarray::{ArrayD, Axis, Dimension, IxDyn, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{PgmError, Result};
use crate::graph::NodeId;

/// A table φ(X₁, …, Xₖ) → ℝ stored as a row-major dense array.
///
/// Invariant: `values.ndim() == variables.len()` and axis `i` has the domain
/// size of `variables[i]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Potential {
    variables: Vec<NodeId>,
    values: ArrayD<f64>,
}

impl Potential {
    /// Create a potential from an array whose axes follow `variables`.
    pub fn new(variables: Vec<NodeId>, values: ArrayD<f64>) -> Result<Self> {
        if values.ndim() != variables.len() {
            return Err(PgmError::InvalidTable(format!(
                "{} variables for a {}-dimensional array",
                variables.len(),
                values.ndim()
            )));
        }
        for (i, v) in variables.iter().enumerate() {
            if variables[..i].contains(v) {
                return Err(PgmError::InvalidTable(format!(
                    "variable {} appears twice",
                    v
                )));
            }
        }
        Ok(Self { variables, values })
    }

    /// Create a potential from row-major values.
    pub fn from_vec(variables: Vec<NodeId>, dims: &[usize], values: Vec<f64>) -> Result<Self> {
        let expected: usize = dims.iter().product();
        if values.len() != expected {
            return Err(PgmError::InvalidTable(format!(
                "expected {} values, got {}",
                expected,
                values.len()
            )));
        }
        let array = ArrayD::from_shape_vec(IxDyn(dims), values)?;
        Self::new(variables, array)
    }

    /// Potential with every entry equal to `value`.
    pub fn filled(variables: Vec<NodeId>, dims: &[usize], value: f64) -> Result<Self> {
        Self::new(variables, ArrayD::from_elem(IxDyn(dims), value))
    }

    /// 0-dimensional potential.
    pub fn scalar(value: f64) -> Self {
        Self {
            variables: Vec::new(),
            values: ArrayD::from_elem(IxDyn(&[]), value),
        }
    }

    /// Scalar neutral element of `op`.
    pub fn neutral(op: CombineOp) -> Self {
        Self::scalar(op.neutral())
    }

    /// Variables in axis order.
    pub fn variables(&self) -> &[NodeId] {
        &self.variables
    }

    /// Raw table, one axis per variable.
    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    /// Domain sizes in variable order.
    pub fn dims(&self) -> &[usize] {
        self.values.shape()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether `var` is one of the variables of this potential.
    pub fn contains(&self, var: NodeId) -> bool {
        self.variables.contains(&var)
    }

    /// Axis index of `var`, or `None` if the potential does not mention it.
    pub fn axis_of(&self, var: NodeId) -> Option<usize> {
        self.variables.iter().position(|&v| v == var)
    }

    /// Number of states of `var` in this table.
    pub fn domain_size(&self, var: NodeId) -> Option<usize> {
        self.axis_of(var).map(|a| self.values.shape()[a])
    }

    /// True for a potential over no variables.
    pub fn is_scalar(&self) -> bool {
        self.variables.is_empty()
    }

    /// Value of a 0-dimensional potential.
    pub fn scalar_value(&self) -> Option<f64> {
        if self.is_scalar() {
            self.values.iter().next().copied()
        } else {
            None
        }
    }

    fn is_neutral_for(&self, op: CombineOp) -> bool {
        self.scalar_value() == Some(op.neutral())
    }

    /// Sum of all entries.
    pub fn sum(&self) -> f64 {
        self.values.sum()
    }

    /// Largest entry, `-inf` for an empty table.
    pub fn max_value(&self) -> f64 {
        self.values.iter().fold(f64::NEG_INFINITY, |acc, &x| acc.max(x))
    }

    /// Number of entries of `combine(self, other, _)`.
    pub fn combined_size(&self, other: &Potential) -> usize {
        let extra: usize = other
            .variables
            .iter()
            .zip(other.dims())
            .filter(|(v, _)| !self.contains(**v))
            .map(|(_, &d)| d)
            .product();
        self.len() * extra
    }

    /// Pointwise combination over the union of both variable sets.
    ///
    /// The result lists `self`'s variables first, followed by the variables
    /// only `other` has. Combining with a neutral scalar returns the other
    /// operand unchanged.
    pub fn combine(&self, other: &Potential, op: CombineOp) -> Result<Potential> {
        if other.is_neutral_for(op) {
            return Ok(self.clone());
        }
        if self.is_neutral_for(op) {
            return Ok(other.clone());
        }

        let mut variables = self.variables.clone();
        let mut shape: Vec<usize> = self.dims().to_vec();
        let mut positions = Vec::with_capacity(other.variables.len());
        for (axis, &var) in other.variables.iter().enumerate() {
            let dim = other.dims()[axis];
            match self.axis_of(var) {
                Some(a) => {
                    let left = self.dims()[a];
                    if left != dim {
                        return Err(PgmError::DomainMismatch {
                            var,
                            left,
                            right: dim,
                        });
                    }
                    positions.push(a);
                }
                None => {
                    positions.push(variables.len());
                    variables.push(var);
                    shape.push(dim);
                }
            }
        }
        let rank = variables.len();

        // self's axes lead the result: append unit axes for the new ones
        let mut left = self.values.view();
        for axis in self.variables.len()..rank {
            left = left.insert_axis(Axis(axis));
        }

        // other's axes are sorted into result order, then unit axes fill the gaps
        let mut perm: Vec<usize> = (0..other.variables.len()).collect();
        perm.sort_by_key(|&i| positions[i]);
        let mut right = other.values.view().permuted_axes(IxDyn(&perm));
        for axis in 0..rank {
            if !positions.contains(&axis) {
                right = right.insert_axis(Axis(axis));
            }
        }

        let mut values = ArrayD::<f64>::zeros(IxDyn(&shape));
        Zip::from(&mut values)
            .and_broadcast(&left)
            .and_broadcast(&right)
            .for_each(|out, &a, &b| *out = op.apply(a, b));

        Ok(Potential { variables, values })
    }

    /// Combine a list of potentials, always merging the pair with the
    /// smallest result first.
    pub fn combine_all(tables: &[&Potential], op: CombineOp) -> Result<Potential> {
        let mut pool: Vec<Potential> = tables.iter().map(|&t| t.clone()).collect();
        if pool.is_empty() {
            return Ok(Potential::neutral(op));
        }
        while pool.len() > 1 {
            let (i, j) = smallest_pair(&pool);
            let b = pool.swap_remove(j);
            let a = pool.swap_remove(i);
            pool.push(a.combine(&b, op)?);
        }
        pool.pop()
            .ok_or_else(|| PgmError::InvalidTable("empty combination".to_string()))
    }

    /// Reduce away `remove`. Variables not present are ignored; removing
    /// every variable yields a scalar.
    pub fn project(&self, remove: &[NodeId], op: ProjectOp) -> Result<Potential> {
        let mut axes: Vec<usize> = remove.iter().filter_map(|&v| self.axis_of(v)).collect();
        if axes.is_empty() {
            return Ok(self.clone());
        }
        axes.sort_unstable();
        axes.dedup();

        let mut values = self.values.clone();
        for &axis in axes.iter().rev() {
            values = values.map_axis(Axis(axis), |lane| op.reduce(lane));
        }
        let variables = self
            .variables
            .iter()
            .enumerate()
            .filter(|(i, _)| !axes.contains(i))
            .map(|(_, &v)| v)
            .collect();

        Ok(Potential { variables, values })
    }

    /// Reduce away every variable not in `keep`.
    pub fn project_onto(&self, keep: &[NodeId], op: ProjectOp) -> Result<Potential> {
        let remove: Vec<NodeId> = self
            .variables
            .iter()
            .copied()
            .filter(|v| !keep.contains(v))
            .collect();
        self.project(&remove, op)
    }

    /// Slice the table at `var = state`.
    pub fn reduce(&self, var: NodeId, state: usize) -> Result<Potential> {
        let axis = self.axis_of(var).ok_or(PgmError::NodeNotFound(var))?;
        let size = self.dims()[axis];
        if state >= size {
            return Err(PgmError::InvalidEvidence {
                node: var,
                reason: format!("state {} out of range for domain size {}", state, size),
            });
        }
        let values = self.values.index_axis(Axis(axis), state).to_owned();
        let mut variables = self.variables.clone();
        variables.remove(axis);
        Ok(Potential { variables, values })
    }

    /// Same table with its axes in `order` (a permutation of the variables).
    pub fn reorder(&self, order: &[NodeId]) -> Result<Potential> {
        if order.len() != self.variables.len() {
            return Err(PgmError::InvalidTable(format!(
                "cannot reorder {:?} as {:?}",
                self.variables, order
            )));
        }
        let mut perm = Vec::with_capacity(order.len());
        for &v in order {
            perm.push(self.axis_of(v).ok_or(PgmError::NodeNotFound(v))?);
        }
        let values = self
            .values
            .view()
            .permuted_axes(IxDyn(&perm))
            .as_standard_layout()
            .into_owned();
        Ok(Potential {
            variables: order.to_vec(),
            values,
        })
    }

    /// Scale to sum one; returns the previous sum. A zero-mass table is
    /// left untouched.
    pub fn normalize(&mut self) -> f64 {
        let sum = self.sum();
        if sum > 0.0 {
            self.values /= sum;
        }
        sum
    }

    /// Log-domain normalization; returns the previous log-mass.
    pub fn normalize_log(&mut self) -> f64 {
        let z = log_sum_exp(self.values.iter().copied());
        if z.is_finite() {
            self.values -= z;
        }
        z
    }

    /// Natural logarithm of every entry (`ln 0 = -inf`).
    pub fn to_log(&self) -> Potential {
        Potential {
            variables: self.variables.clone(),
            values: self.values.mapv(f64::ln),
        }
    }

    /// Back to linear domain after shifting by the maximum, so the largest
    /// entry becomes one.
    pub fn to_linear(&self) -> Potential {
        let max = self.max_value();
        let shift = if max.is_finite() { max } else { 0.0 };
        Potential {
            variables: self.variables.clone(),
            values: self.values.mapv(|x| (x - shift).exp()),
        }
    }

    /// First assignment of this potential's variables.
    pub fn instantiation(&self) -> Instantiation {
        Instantiation::from_parts(self.variables.clone(), self.dims().to_vec())
    }

    fn index_for(&self, inst: &Instantiation) -> Result<Vec<usize>> {
        self.variables
            .iter()
            .map(|&v| inst.state_of(v).ok_or(PgmError::NodeNotFound(v)))
            .collect()
    }

    /// Value at an instantiation covering (at least) this table's variables.
    pub fn get(&self, inst: &Instantiation) -> Result<f64> {
        let index = self.index_for(inst)?;
        self.values
            .get(index.as_slice())
            .copied()
            .ok_or_else(|| PgmError::InvalidTable(format!("index {:?} out of bounds", index)))
    }

    pub fn set(&mut self, inst: &Instantiation, value: f64) -> Result<()> {
        let index = self.index_for(inst)?;
        let slot = self
            .values
            .get_mut(index.as_slice())
            .ok_or_else(|| PgmError::InvalidTable(format!("index {:?} out of bounds", index)))?;
        *slot = value;
        Ok(())
    }

    /// Every `(states, value)` pair in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Vec<usize>, f64)> + '_ {
        self.values
            .indexed_iter()
            .map(|(index, &v)| (index.slice().to_vec(), v))
    }

    /// Entry-wise comparison that ignores variable order.
    pub fn approx_eq(&self, other: &Potential, epsilon: f64) -> bool {
        if self.variables.len() != other.variables.len() {
            return false;
        }
        let Ok(aligned) = other.reorder(&self.variables) else {
            return false;
        };
        self.dims() == aligned.dims()
            && self
                .values
                .iter()
                .zip(aligned.values.iter())
                .all(|(a, b)| (a - b).abs() <= epsilon || (a == b))
    }
}

/// Indices `(i, j)`, `i < j`, of the pair whose combination is smallest.
pub(crate) fn smallest_pair(pool: &[Potential]) -> (usize, usize) {
    let mut best = (0, 1);
    let mut best_size = usize::MAX;
    for i in 0..pool.len() {
        for j in (i + 1)..pool.len() {
            let size = pool[i].combined_size(&pool[j]);
            if size < best_size {
                best_size = size;
                best = (i, j);
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn pxy() -> Potential {
        Potential::from_vec(vec![0, 1], &[2, 2], vec![0.1, 0.2, 0.3, 0.4]).unwrap()
    }

    #[test]
    fn test_creation_checks() {
        assert!(Potential::from_vec(vec![0], &[2], vec![1.0]).is_err());
        assert!(Potential::from_vec(vec![0, 0], &[2, 2], vec![0.0; 4]).is_err());
        let p = pxy();
        assert_eq!(p.dims(), &[2, 2]);
        assert_eq!(p.domain_size(1), Some(2));
    }

    #[test]
    fn test_combine_shared_variable() {
        // φ(0,1) × ψ(1,2)
        let a = pxy();
        let b = Potential::from_vec(vec![1, 2], &[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();
        let c = a.combine(&b, CombineOp::Product).unwrap();
        assert_eq!(c.variables(), &[0, 1, 2]);
        assert_eq!(c.dims(), &[2, 2, 3]);

        let mut inst = c.instantiation();
        while !inst.is_end() {
            let expected = a.get(&inst).unwrap() * b.get(&inst).unwrap();
            assert_abs_diff_eq!(c.get(&inst).unwrap(), expected, epsilon = 1e-12);
            inst.inc();
        }
    }

    #[test]
    fn test_combine_reversed_axes() {
        let a = pxy();
        let b = Potential::from_vec(vec![1, 0], &[2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let c = a.combine(&b, CombineOp::Sum).unwrap();
        assert_eq!(c.variables(), &[0, 1]);
        // c[x,y] = a[x,y] + b[y,x]
        assert_abs_diff_eq!(c.values()[[0, 1]], 0.2 + 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c.values()[[1, 0]], 0.3 + 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_combine_disjoint_is_outer_product() {
        let a = Potential::from_vec(vec![0], &[2], vec![0.6, 0.4]).unwrap();
        let b = Potential::from_vec(vec![1], &[3], vec![0.2, 0.3, 0.5]).unwrap();
        let c = a.combine(&b, CombineOp::Product).unwrap();
        assert_eq!(c.len(), 6);
        assert_abs_diff_eq!(c.values()[[1, 2]], 0.4 * 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(c.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_combine_domain_mismatch() {
        let a = pxy();
        let b = Potential::from_vec(vec![1], &[3], vec![1.0; 3]).unwrap();
        let err = a.combine(&b, CombineOp::Product).unwrap_err();
        assert!(matches!(
            err,
            PgmError::DomainMismatch {
                var: 1,
                left: 2,
                right: 3
            }
        ));
    }

    #[test]
    fn test_neutral_fast_path() {
        let a = pxy();
        let one = Potential::neutral(CombineOp::Product);
        assert_eq!(a.combine(&one, CombineOp::Product).unwrap(), a);
        assert_eq!(one.combine(&a, CombineOp::Product).unwrap(), a);
        let zero = Potential::neutral(CombineOp::Sum);
        assert_eq!(zero.combine(&a, CombineOp::Sum).unwrap(), a);
    }

    #[test]
    fn test_project() {
        let p = pxy();
        let m = p.project(&[1], ProjectOp::Sum).unwrap();
        assert_eq!(m.variables(), &[0]);
        assert_abs_diff_eq!(m.values()[[0]], 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(m.values()[[1]], 0.7, epsilon = 1e-12);

        let mx = p.project(&[0], ProjectOp::Max).unwrap();
        assert_eq!(mx.variables(), &[1]);
        assert_abs_diff_eq!(mx.values()[[0]], 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(mx.values()[[1]], 0.4, epsilon = 1e-12);

        let s = p.project(&[0, 1], ProjectOp::Sum).unwrap();
        assert!(s.is_scalar());
        assert_abs_diff_eq!(s.scalar_value().unwrap(), 1.0, epsilon = 1e-12);

        // absent variables are ignored
        assert_eq!(p.project(&[9], ProjectOp::Sum).unwrap(), p);
    }

    #[test]
    fn test_log_domain_projection_matches_linear() {
        let p = pxy();
        let linear = p.project(&[0], ProjectOp::Sum).unwrap();
        let log = p.to_log().project(&[0], ProjectOp::LogSumExp).unwrap();
        for (a, b) in linear.values().iter().zip(log.values().iter()) {
            assert_abs_diff_eq!(a.ln(), *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_reduce_and_reorder() {
        let p = pxy();
        let r = p.reduce(1, 1).unwrap();
        assert_eq!(r.variables(), &[0]);
        assert_abs_diff_eq!(r.values()[[0]], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(r.values()[[1]], 0.4, epsilon = 1e-12);
        assert!(p.reduce(1, 2).is_err());

        let t = p.reorder(&[1, 0]).unwrap();
        assert_abs_diff_eq!(t.values()[[1, 0]], 0.2, epsilon = 1e-12);
        assert!(p.approx_eq(&t, 1e-12));
    }

    #[test]
    fn test_normalize() {
        let mut p = Potential::from_vec(vec![0], &[2], vec![2.0, 6.0]).unwrap();
        assert_abs_diff_eq!(p.normalize(), 8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.values()[[1]], 0.75, epsilon = 1e-12);

        let mut zero = Potential::filled(vec![0], &[2], 0.0).unwrap();
        assert_eq!(zero.normalize(), 0.0);

        let mut log = Potential::from_vec(vec![0], &[2], vec![2.0, 6.0])
            .unwrap()
            .to_log();
        assert_abs_diff_eq!(log.normalize_log(), 8.0f64.ln(), epsilon = 1e-12);
        let back = log.to_linear();
        assert_abs_diff_eq!(back.values()[[0]] / back.values()[[1]], 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_combine_all_matches_sequential() {
        let a = Potential::from_vec(vec![0], &[2], vec![0.5, 0.5]).unwrap();
        let b = pxy();
        let c = Potential::from_vec(vec![1, 2], &[2, 2], vec![0.9, 0.1, 0.2, 0.8]).unwrap();
        let all = Potential::combine_all(&[&a, &b, &c], CombineOp::Product).unwrap();
        let seq = a
            .combine(&b, CombineOp::Product)
            .unwrap()
            .combine(&c, CombineOp::Product)
            .unwrap();
        assert!(all.approx_eq(&seq, 1e-12));
        let empty = Potential::combine_all(&[], CombineOp::Product).unwrap();
        assert_eq!(empty.scalar_value(), Some(1.0));
    }

    #[test]
    fn test_iter_and_set() {
        let mut p = pxy();
        let entries: Vec<_> = p.iter().collect();
        assert_eq!(entries[2], (vec![1, 0], 0.3));

        let mut inst = p.instantiation();
        inst.set_state(0, 1).unwrap();
        inst.set_state(1, 1).unwrap();
        p.set(&inst, 9.0).unwrap();
        assert_eq!(p.get(&inst).unwrap(), 9.0);
    }
}
