//! Elimination-sequence strategies.
//!
//! Eliminating a node connects all of its remaining neighbours pairwise and
//! removes it from the graph. The node together with those neighbours forms
//! the *elimination clique*; edges added to make it complete are *fill-ins*.
//! The order in which nodes are eliminated decides the size of the cliques,
//! and hence the cost of inference, so it is chosen by a pluggable
//! [`EliminationSequenceStrategy`]:
//!
//! - [`MinDegree`]: fewest remaining neighbours
//! - [`MinFill`]: fewest fill-in edges
//! - [`WeightedMinFill`]: fill-ins weighted by the product of domain sizes
//! - [`MinWeight`]: simplicial nodes first, then the lightest clique
//! - [`FixedOrder`]: caller-supplied order, remaining nodes by min-fill
//!
//! Every strategy breaks ties by the smallest [`NodeId`].

mod fixed_order;
mod heuristics;

pub use fixed_order::FixedOrder;
pub use heuristics::{MinDegree, MinFill, MinWeight, WeightedMinFill};

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{PgmError, Result};
use crate::graph::{DomainSizes, Edge, NodeId, UndiGraph};

/// Result of eliminating one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EliminationStep {
    /// The eliminated node.
    pub node: NodeId,
    /// `{node} ∪ remaining neighbours` at the time of elimination.
    pub clique: BTreeSet<NodeId>,
    /// Edges added between neighbours that were not yet adjacent.
    pub fill_ins: Vec<Edge>,
}

/// Picks the next node to eliminate and performs the elimination.
///
/// A strategy starts uninitialized; [`set_graph`](Self::set_graph) makes it
/// ready and it becomes exhausted once every node has been eliminated.
pub trait EliminationSequenceStrategy: Send + std::fmt::Debug {
    /// Load a working copy of `graph`. Every node needs a domain size.
    fn set_graph(&mut self, graph: &UndiGraph, domain_sizes: &DomainSizes) -> Result<()>;

    /// Node this strategy would eliminate next.
    fn next_node_to_eliminate(&self) -> Result<NodeId>;

    /// Eliminate `node`, which need not be the one the strategy suggested.
    fn eliminate(&mut self, node: NodeId) -> Result<EliminationStep>;

    /// True when no node is left to eliminate.
    fn is_exhausted(&self) -> bool;

    /// Drop the working graph, returning to the uninitialized state.
    fn clear(&mut self);

    fn name(&self) -> &'static str;
}

/// Serializable selector for the built-in strategies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EliminationHeuristic {
    #[default]
    MinFill,
    MinDegree,
    WeightedMinFill,
    MinWeight,
    /// Eliminate these nodes first, in this order.
    FixedOrder(Vec<NodeId>),
}

impl EliminationHeuristic {
    /// Instantiate the strategy.
    pub fn build(&self) -> Box<dyn EliminationSequenceStrategy> {
        match self {
            EliminationHeuristic::MinFill => Box::new(MinFill::new()),
            EliminationHeuristic::MinDegree => Box::new(MinDegree::new()),
            EliminationHeuristic::WeightedMinFill => Box::new(WeightedMinFill::new()),
            EliminationHeuristic::MinWeight => Box::new(MinWeight::new()),
            EliminationHeuristic::FixedOrder(order) => Box::new(FixedOrder::new(order.clone())),
        }
    }
}

/// Working copy of the graph being eliminated, shared by all strategies.
#[derive(Debug, Clone, Default)]
pub struct EliminationGraph {
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
    domain_sizes: DomainSizes,
}

impl EliminationGraph {
    pub fn new(graph: &UndiGraph, domain_sizes: &DomainSizes) -> Result<Self> {
        let mut adjacency = BTreeMap::new();
        let mut sizes = DomainSizes::new();
        for node in graph.nodes() {
            let size = *domain_sizes.get(&node).ok_or(PgmError::NodeNotFound(node))?;
            sizes.insert(node, size);
            adjacency.insert(node, graph.neighbours(node).collect());
        }
        Ok(Self {
            adjacency,
            domain_sizes: sizes,
        })
    }

    /// Nodes not yet eliminated, ascending.
    pub fn remaining(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.adjacency.contains_key(&node)
    }

    pub fn neighbours(&self, node: NodeId) -> Option<&BTreeSet<NodeId>> {
        self.adjacency.get(&node)
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.adjacency.get(&node).map_or(0, |n| n.len())
    }

    pub fn domain_size(&self, node: NodeId) -> usize {
        self.domain_sizes.get(&node).copied().unwrap_or(1)
    }

    fn missing_edges(&self, node: NodeId) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        let neighbours: Vec<NodeId> = self
            .adjacency
            .get(&node)
            .map(|n| n.iter().copied().collect())
            .unwrap_or_default();
        (0..neighbours.len()).flat_map(move |i| {
            let a = neighbours[i];
            neighbours[i + 1..]
                .iter()
                .copied()
                .filter(move |&b| !self.adjacency.get(&a).is_some_and(|s| s.contains(&b)))
                .map(move |b| (a, b))
                .collect::<Vec<_>>()
        })
    }

    /// Number of fill-ins eliminating `node` would add.
    pub fn fill_count(&self, node: NodeId) -> usize {
        self.missing_edges(node).count()
    }

    /// Σ `dom(a)·dom(b)` over the fill-ins eliminating `node` would add.
    pub fn weighted_fill(&self, node: NodeId) -> f64 {
        self.missing_edges(node)
            .map(|(a, b)| (self.domain_size(a) * self.domain_size(b)) as f64)
            .sum()
    }

    /// Product of the domain sizes of `node` and its remaining neighbours.
    pub fn clique_weight(&self, node: NodeId) -> f64 {
        let own = self.domain_size(node) as f64;
        self.adjacency.get(&node).map_or(own, |n| {
            n.iter().fold(own, |acc, &v| acc * self.domain_size(v) as f64)
        })
    }

    /// A node is simplicial when its neighbours already form a clique.
    pub fn is_simplicial(&self, node: NodeId) -> bool {
        self.missing_edges(node).next().is_none()
    }

    /// Eliminate `node`: connect its neighbours and remove it.
    pub fn eliminate(&mut self, node: NodeId) -> Result<EliminationStep> {
        if !self.contains(node) {
            return Err(PgmError::NodeNotFound(node));
        }
        let fill: Vec<(NodeId, NodeId)> = self.missing_edges(node).collect();
        let neighbours = self.adjacency.remove(&node).unwrap_or_default();

        let mut fill_ins = Vec::with_capacity(fill.len());
        for (a, b) in fill {
            if let Some(s) = self.adjacency.get_mut(&a) {
                s.insert(b);
            }
            if let Some(s) = self.adjacency.get_mut(&b) {
                s.insert(a);
            }
            fill_ins.push(Edge::new(a, b));
        }
        for &n in &neighbours {
            if let Some(s) = self.adjacency.get_mut(&n) {
                s.remove(&node);
            }
        }

        let mut clique = neighbours;
        clique.insert(node);
        Ok(EliminationStep {
            node,
            clique,
            fill_ins,
        })
    }

    /// Remaining node with the smallest key; ties go to the smallest id.
    pub fn argmin<K, F>(&self, mut key: F) -> Option<NodeId>
    where
        K: PartialOrd,
        F: FnMut(NodeId) -> K,
    {
        let mut best: Option<(NodeId, K)> = None;
        for node in self.remaining() {
            let k = key(node);
            let better = match &best {
                Some((_, b)) => k.partial_cmp(b) == Some(Ordering::Less),
                None => true,
            };
            if better {
                best = Some((node, k));
            }
        }
        best.map(|(node, _)| node)
    }
}

pub(crate) fn not_ready(strategy: &str) -> PgmError {
    PgmError::OperationNotAllowed(format!(
        "{} strategy has no graph left to eliminate",
        strategy
    ))
}

/// Run `strategy` to exhaustion on `graph` and return the elimination order.
pub fn elimination_order(
    strategy: &mut dyn EliminationSequenceStrategy,
    graph: &UndiGraph,
    domain_sizes: &DomainSizes,
) -> Result<Vec<NodeId>> {
    strategy.set_graph(graph, domain_sizes)?;
    let mut order = Vec::with_capacity(graph.size());
    while !strategy.is_exhausted() {
        let node = strategy.next_node_to_eliminate()?;
        strategy.eliminate(node)?;
        order.push(node);
    }
    Ok(order)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 4-cycle 0-1-2-3-0 plus a pendant node 4 attached to 0.
    pub(crate) fn cycle_with_tail() -> (UndiGraph, DomainSizes) {
        let mut g = UndiGraph::new();
        for _ in 0..5 {
            g.add_node();
        }
        for (a, b) in [(0, 1), (1, 2), (2, 3), (3, 0), (0, 4)] {
            g.add_edge(a, b).unwrap();
        }
        let sizes = (0..5).map(|n| (n, 2)).collect();
        (g, sizes)
    }

    #[test]
    fn test_elimination_adds_fill() {
        let (g, sizes) = cycle_with_tail();
        let mut eg = EliminationGraph::new(&g, &sizes).unwrap();
        assert_eq!(eg.fill_count(1), 1);
        assert!(eg.is_simplicial(4));
        assert_eq!(eg.clique_weight(0), 16.0);

        let step = eg.eliminate(1).unwrap();
        assert_eq!(step.clique, BTreeSet::from([0, 1, 2]));
        assert_eq!(step.fill_ins, vec![Edge::new(0, 2)]);
        assert!(eg.neighbours(0).unwrap().contains(&2));
        assert!(!eg.contains(1));
        assert!(eg.eliminate(1).is_err());
    }

    #[test]
    fn test_missing_domain_size() {
        let (g, mut sizes) = cycle_with_tail();
        sizes.remove(&3);
        assert!(matches!(
            EliminationGraph::new(&g, &sizes),
            Err(PgmError::NodeNotFound(3))
        ));
    }

    #[test]
    fn test_heuristic_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            h: EliminationHeuristic,
        }
        let w: Wrapper = toml::from_str("h = \"weighted-min-fill\"").unwrap();
        assert_eq!(w.h, EliminationHeuristic::WeightedMinFill);
        let w: Wrapper = toml::from_str("h = { fixed-order = [2, 0] }").unwrap();
        assert_eq!(w.h, EliminationHeuristic::FixedOrder(vec![2, 0]));
        assert_eq!(w.h.build().name(), "fixed-order");
    }

    #[test]
    fn test_every_strategy_eliminates_everything() {
        let (g, sizes) = cycle_with_tail();
        for heuristic in [
            EliminationHeuristic::MinFill,
            EliminationHeuristic::MinDegree,
            EliminationHeuristic::WeightedMinFill,
            EliminationHeuristic::MinWeight,
            EliminationHeuristic::FixedOrder(vec![3]),
        ] {
            let mut strategy = heuristic.build();
            let mut order = elimination_order(strategy.as_mut(), &g, &sizes).unwrap();
            assert!(strategy.next_node_to_eliminate().is_err());
            order.sort_unstable();
            assert_eq!(order, vec![0, 1, 2, 3, 4], "{}", strategy.name());
        }
    }
}
