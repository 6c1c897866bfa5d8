//! Clique graphs: undirected graphs whose nodes carry variable sets.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{PgmError, Result};
use crate::graph::{NodeId, UndiGraph};

/// Identifier of a clique inside a [`CliqueGraph`].
pub type CliqueId = usize;

/// Undirected graph of cliques. The separator of an edge is the intersection
/// of the two cliques it joins and is always derived, never stored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CliqueGraph {
    graph: UndiGraph,
    cliques: BTreeMap<CliqueId, BTreeSet<NodeId>>,
}

impl CliqueGraph {
    /// An empty clique graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clique with a fresh id.
    pub fn add_clique(&mut self, variables: BTreeSet<NodeId>) -> CliqueId {
        let id = self.graph.add_node();
        self.cliques.insert(id, variables);
        id
    }

    /// Add a clique with a caller-chosen id.
    pub fn add_clique_with_id(&mut self, id: CliqueId, variables: BTreeSet<NodeId>) -> Result<()> {
        self.graph.add_node_with_id(id)?;
        self.cliques.insert(id, variables);
        Ok(())
    }

    /// Remove a clique and its edges.
    pub fn remove_clique(&mut self, id: CliqueId) {
        self.graph.remove_node(id);
        self.cliques.remove(&id);
    }

    /// Add a variable to an existing clique.
    pub fn add_to_clique(&mut self, id: CliqueId, var: NodeId) -> Result<()> {
        self.cliques
            .get_mut(&id)
            .ok_or(PgmError::NodeNotFound(id))?
            .insert(var);
        Ok(())
    }

    /// Replace the variable set of a clique.
    pub fn set_clique(&mut self, id: CliqueId, variables: BTreeSet<NodeId>) -> Result<()> {
        let slot = self.cliques.get_mut(&id).ok_or(PgmError::NodeNotFound(id))?;
        *slot = variables;
        Ok(())
    }

    /// Join two cliques.
    pub fn add_edge(&mut self, a: CliqueId, b: CliqueId) -> Result<()> {
        self.graph.add_edge(a, b)
    }

    pub fn remove_edge(&mut self, a: CliqueId, b: CliqueId) {
        self.graph.remove_edge(a, b);
    }

    /// Whether cliques `a` and `b` are adjacent.
    pub fn exists_edge(&self, a: CliqueId, b: CliqueId) -> bool {
        self.graph.exists_edge(a, b)
    }

    /// Variables of clique `id`.
    pub fn clique(&self, id: CliqueId) -> Option<&BTreeSet<NodeId>> {
        self.cliques.get(&id)
    }

    /// Variables shared by two cliques.
    pub fn separator(&self, a: CliqueId, b: CliqueId) -> Result<BTreeSet<NodeId>> {
        let ca = self.cliques.get(&a).ok_or(PgmError::NodeNotFound(a))?;
        let cb = self.cliques.get(&b).ok_or(PgmError::NodeNotFound(b))?;
        Ok(ca.intersection(cb).copied().collect())
    }

    /// Cliques adjacent to `id`.
    pub fn neighbours(&self, id: CliqueId) -> impl Iterator<Item = CliqueId> + '_ {
        self.graph.neighbours(id)
    }

    /// Clique ids in increasing order.
    pub fn clique_ids(&self) -> impl Iterator<Item = CliqueId> + '_ {
        self.cliques.keys().copied()
    }

    /// Every clique with its variables, by increasing id.
    pub fn cliques(&self) -> impl Iterator<Item = (CliqueId, &BTreeSet<NodeId>)> {
        self.cliques.iter().map(|(&id, c)| (id, c))
    }

    pub fn edges(&self) -> impl Iterator<Item = crate::graph::Edge> + '_ {
        self.graph.edges()
    }

    /// Number of cliques.
    pub fn size(&self) -> usize {
        self.cliques.len()
    }

    /// Number of clique edges.
    pub fn size_edges(&self) -> usize {
        self.graph.size_edges()
    }

    pub fn is_empty(&self) -> bool {
        self.cliques.is_empty()
    }

    /// Underlying clique adjacency.
    pub fn graph(&self) -> &UndiGraph {
        &self.graph
    }

    /// Clique ids grouped by connected component.
    pub fn connected_components(&self) -> Vec<Vec<CliqueId>> {
        self.graph.connected_components()
    }

    /// A graph is a forest iff `|E| = |V| - #components`.
    pub fn is_forest(&self) -> bool {
        self.size_edges() + self.connected_components().len() == self.size()
    }

    /// Cliques on the tree path from `from` to `to`, both included.
    ///
    /// Returns `None` when the two cliques are not connected.
    pub fn path(&self, from: CliqueId, to: CliqueId) -> Option<Vec<CliqueId>> {
        if !self.cliques.contains_key(&from) || !self.cliques.contains_key(&to) {
            return None;
        }
        let mut previous: BTreeMap<CliqueId, CliqueId> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);
        previous.insert(from, from);
        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![to];
                let mut node = to;
                while node != from {
                    node = previous[&node];
                    path.push(node);
                }
                path.reverse();
                return Some(path);
            }
            for n in self.neighbours(current) {
                if let std::collections::btree_map::Entry::Vacant(e) = previous.entry(n) {
                    e.insert(current);
                    queue.push_back(n);
                }
            }
        }
        None
    }

    /// Check the running-intersection property: for every variable, the
    /// cliques containing it induce a connected subgraph.
    pub fn has_running_intersection(&self) -> bool {
        let mut holders: BTreeMap<NodeId, Vec<CliqueId>> = BTreeMap::new();
        for (&id, clique) in &self.cliques {
            for &var in clique {
                holders.entry(var).or_default().push(id);
            }
        }

        holders.iter().all(|(&var, ids)| {
            if ids.len() <= 1 {
                return true;
            }
            let mut visited = BTreeSet::from([ids[0]]);
            let mut stack = vec![ids[0]];
            while let Some(current) = stack.pop() {
                for n in self.neighbours(current) {
                    let holds = self.cliques.get(&n).map(|c| c.contains(&var));
                    if holds == Some(true) && visited.insert(n) {
                        stack.push(n);
                    }
                }
            }
            visited.len() == ids.len()
        })
    }
}
