//! Model containers feeding the inference engine.
//!
//! Both [`BayesNet`] and [`MarkovNet`] expose the same [`GraphicalModel`]
//! view: a set of variables, their moral graph and the tables to be
//! multiplied together.

use std::collections::BTreeMap;

use crate::error::{PgmError, Result};
use crate::graph::{Dag, DomainSizes, NodeId, UndiGraph};
use crate::potential::Potential;
use crate::variable::Variable;

/// What the inference engine needs from a model.
pub trait GraphicalModel {
    fn variable(&self, id: NodeId) -> Option<&Variable>;

    /// Node ids in ascending order.
    fn node_ids(&self) -> Vec<NodeId>;

    fn domain_sizes(&self) -> DomainSizes;

    /// Undirected graph with an edge between any two variables sharing a
    /// table.
    fn moral_graph(&self) -> Result<UndiGraph>;

    /// Tables whose product is the (unnormalized) joint distribution.
    fn tables(&self) -> Vec<&Potential>;

    /// Id of the variable called `name`.
    fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.node_ids()
            .into_iter()
            .find(|&id| self.variable(id).is_some_and(|v| v.name() == name))
    }
}

fn check_scope(variables: &BTreeMap<NodeId, Variable>, table: &Potential) -> Result<()> {
    for (&var, &size) in table.variables().iter().zip(table.dims()) {
        let expected = variables
            .get(&var)
            .ok_or(PgmError::NodeNotFound(var))?
            .domain_size();
        if expected != size {
            return Err(PgmError::DomainMismatch {
                var,
                left: expected,
                right: size,
            });
        }
    }
    Ok(())
}

/// Bayesian network: a DAG with one conditional table per node.
#[derive(Debug, Clone, Default)]
pub struct BayesNet {
    dag: Dag,
    variables: BTreeMap<NodeId, Variable>,
    cpts: BTreeMap<NodeId, Potential>,
}

impl BayesNet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable with no parents and no CPT yet.
    pub fn add_variable(&mut self, variable: Variable) -> NodeId {
        let id = self.dag.add_node();
        self.variables.insert(id, variable);
        id
    }

    /// Add `parent -> child`. Any table already set for `child` is dropped
    /// since its scope no longer matches.
    pub fn add_arc(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.dag.add_arc(parent, child)?;
        self.cpts.remove(&child);
        Ok(())
    }

    /// Set P(node | parents). The table must be over exactly the node and
    /// its parents, in any axis order.
    pub fn set_cpt(&mut self, node: NodeId, cpt: Potential) -> Result<()> {
        if !self.dag.exists_node(node) {
            return Err(PgmError::NodeNotFound(node));
        }
        check_scope(&self.variables, &cpt)?;
        let mut expected: Vec<NodeId> = self.dag.parents(node).collect();
        expected.push(node);
        expected.sort_unstable();
        let mut actual = cpt.variables().to_vec();
        actual.sort_unstable();
        if expected != actual {
            return Err(PgmError::InvalidTable(format!(
                "table for node {} is over {:?}, expected {:?}",
                node,
                cpt.variables(),
                expected
            )));
        }
        self.cpts.insert(node, cpt);
        Ok(())
    }

    /// Set P(node | parents) from row-major values over the parents in
    /// ascending id order followed by the node itself.
    pub fn set_cpt_values(&mut self, node: NodeId, values: Vec<f64>) -> Result<()> {
        let mut scope: Vec<NodeId> = self.dag.parents(node).collect();
        scope.push(node);
        let dims = scope
            .iter()
            .map(|v| {
                self.variables
                    .get(v)
                    .map(Variable::domain_size)
                    .ok_or(PgmError::NodeNotFound(*v))
            })
            .collect::<Result<Vec<_>>>()?;
        let cpt = Potential::from_vec(scope, &dims, values)?;
        self.set_cpt(node, cpt)
    }

    /// Conditional table of `node`, once set.
    pub fn cpt(&self, node: NodeId) -> Option<&Potential> {
        self.cpts.get(&node)
    }

    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    /// Nodes with every parent before its children.
    pub fn topological_order(&self) -> Vec<NodeId> {
        self.dag.topological_order()
    }

    /// Every node has a table.
    pub fn check(&self) -> Result<()> {
        match self.dag.nodes().find(|n| !self.cpts.contains_key(n)) {
            Some(node) => Err(PgmError::InvalidTable(format!(
                "node {} has no conditional table",
                node
            ))),
            None => Ok(()),
        }
    }
}

impl GraphicalModel for BayesNet {
    fn variable(&self, id: NodeId) -> Option<&Variable> {
        self.variables.get(&id)
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.variables.keys().copied().collect()
    }

    fn domain_sizes(&self) -> DomainSizes {
        self.variables
            .iter()
            .map(|(&id, v)| (id, v.domain_size()))
            .collect()
    }

    fn moral_graph(&self) -> Result<UndiGraph> {
        self.dag.moral_graph()
    }

    fn tables(&self) -> Vec<&Potential> {
        self.cpts.values().collect()
    }
}

/// Markov network: an undirected graph with arbitrary factors.
#[derive(Debug, Clone, Default)]
pub struct MarkovNet {
    graph: UndiGraph,
    variables: BTreeMap<NodeId, Variable>,
    factors: Vec<Potential>,
}

impl MarkovNet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unconnected variable.
    pub fn add_variable(&mut self, variable: Variable) -> NodeId {
        let id = self.graph.add_node();
        self.variables.insert(id, variable);
        id
    }

    /// Add a factor, connecting all of its variables pairwise.
    pub fn add_factor(&mut self, factor: Potential) -> Result<()> {
        check_scope(&self.variables, &factor)?;
        let vars = factor.variables();
        for (i, &a) in vars.iter().enumerate() {
            for &b in &vars[i + 1..] {
                self.graph.add_edge(a, b)?;
            }
        }
        self.factors.push(factor);
        Ok(())
    }

    /// Factors in insertion order.
    pub fn factors(&self) -> &[Potential] {
        &self.factors
    }

    pub fn graph(&self) -> &UndiGraph {
        &self.graph
    }
}

impl GraphicalModel for MarkovNet {
    fn variable(&self, id: NodeId) -> Option<&Variable> {
        self.variables.get(&id)
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.variables.keys().copied().collect()
    }

    fn domain_sizes(&self) -> DomainSizes {
        self.variables
            .iter()
            .map(|(&id, v)| (id, v.domain_size()))
            .collect()
    }

    fn moral_graph(&self) -> Result<UndiGraph> {
        Ok(self.graph.clone())
    }

    fn tables(&self) -> Vec<&Potential> {
        self.factors.iter().collect()
    }
}
