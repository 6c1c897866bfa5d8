//! Graph triangulation.
//!
//! Triangulating a graph makes it chordal by running an elimination
//! strategy to exhaustion and adding the fill-ins it produces. The maximal
//! elimination cliques of the result are the nodes of the junction tree.
//!
//! # Example
//!
//! ```
//! use junction_infer::graph::UndiGraph;
//! use junction_infer::triangulation::StaticTriangulation;
//! use junction_infer::elimination::EliminationHeuristic;
//!
//! let mut g = UndiGraph::new();
//! for _ in 0..4 {
//!     g.add_node();
//! }
//! for (a, b) in [(0, 1), (1, 2), (2, 3), (3, 0)] {
//!     g.add_edge(a, b).unwrap();
//! }
//! let sizes = (0..4).map(|n| (n, 2)).collect();
//!
//! let tri = StaticTriangulation::new(EliminationHeuristic::MinFill)
//!     .triangulate(&g, &sizes)
//!     .unwrap();
//! assert_eq!(tri.fill_ins().len(), 1);
//! assert_eq!(tri.induced_width(), 2);
//! ```

mod budget;
mod chordal;
mod incremental;

pub use budget::{Budget, CancellationToken, DegradeReason, Optimality};
pub use chordal::{
    is_chordal, is_perfect_elimination_order, maximal_cliques_of_chordal,
    maximum_cardinality_search, minimize_fill_ins,
};
pub use incremental::{GraphDelta, Triangulator};

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::elimination::EliminationHeuristic;
use crate::error::Result;
use crate::graph::{DomainSizes, Edge, NodeId, UndiGraph};

/// A maximal clique of the triangulated graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxClique {
    /// Node whose elimination produced this clique.
    pub creator: NodeId,
    /// Variables of the clique.
    pub nodes: BTreeSet<NodeId>,
}

/// Output of a triangulation.
#[derive(Debug, Clone)]
pub struct Triangulation {
    elimination_order: Vec<NodeId>,
    fill_ins: Vec<Edge>,
    graph: UndiGraph,
    elimination_cliques: BTreeMap<NodeId, BTreeSet<NodeId>>,
    max_cliques: Vec<MaxClique>,
    domain_sizes: DomainSizes,
    optimality: Optimality,
    elapsed: Duration,
}

impl Triangulation {
    /// Build the clique bookkeeping for a chordal `graph` eliminated in
    /// `order` (which must be a perfect elimination ordering of it).
    fn from_chordal(
        graph: UndiGraph,
        order: Vec<NodeId>,
        fill_ins: Vec<Edge>,
        domain_sizes: DomainSizes,
        optimality: Optimality,
        elapsed: Duration,
    ) -> Self {
        let cliques = chordal::elimination_cliques(&graph, &order);
        let max_cliques = chordal::keep_maximal(cliques.clone())
            .into_iter()
            .map(|(creator, nodes)| MaxClique { creator, nodes })
            .collect();
        Self {
            elimination_order: order,
            fill_ins,
            graph,
            elimination_cliques: cliques.into_iter().collect(),
            max_cliques,
            domain_sizes,
            optimality,
            elapsed,
        }
    }

    /// Nodes in the order they were eliminated.
    pub fn elimination_order(&self) -> &[NodeId] {
        &self.elimination_order
    }

    /// Edges added to make the graph chordal.
    pub fn fill_ins(&self) -> &[Edge] {
        &self.fill_ins
    }

    /// The original graph plus every fill-in.
    pub fn triangulated_graph(&self) -> &UndiGraph {
        &self.graph
    }

    /// `{node} ∪ later neighbours` at the time `node` was eliminated.
    pub fn elimination_clique(&self, node: NodeId) -> Option<&BTreeSet<NodeId>> {
        self.elimination_cliques.get(&node)
    }

    /// Maximal cliques, in elimination order of their creators.
    pub fn max_cliques(&self) -> &[MaxClique] {
        &self.max_cliques
    }

    /// Largest clique size minus one; 0 for an empty graph.
    pub fn induced_width(&self) -> usize {
        self.max_cliques
            .iter()
            .map(|c| c.nodes.len().saturating_sub(1))
            .max()
            .unwrap_or(0)
    }

    /// Σ over maximal cliques of the product of their domain sizes.
    pub fn total_weight(&self) -> f64 {
        self.max_cliques
            .iter()
            .map(|c| {
                c.nodes
                    .iter()
                    .map(|n| self.domain_sizes.get(n).copied().unwrap_or(1) as f64)
                    .product::<f64>()
            })
            .sum()
    }

    pub fn domain_sizes(&self) -> &DomainSizes {
        &self.domain_sizes
    }

    /// Whether the heuristic placed every node.
    pub fn optimality(&self) -> Optimality {
        self.optimality
    }

    /// True when the budget cut the heuristic short.
    pub fn is_degraded(&self) -> bool {
        matches!(self.optimality, Optimality::Degraded(_))
    }

    /// Wall-clock time spent triangulating.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// One-shot triangulation of a fixed graph.
#[derive(Debug, Clone, Default)]
pub struct StaticTriangulation {
    heuristic: EliminationHeuristic,
    minimality: bool,
    budget: Budget,
}

impl StaticTriangulation {
    /// Unlimited budget, no minimality pass.
    pub fn new(heuristic: EliminationHeuristic) -> Self {
        Self {
            heuristic,
            minimality: false,
            budget: Budget::unlimited(),
        }
    }

    /// Drop every fill-in that is not needed for chordality.
    pub fn with_minimality(mut self, minimality: bool) -> Self {
        self.minimality = minimality;
        self
    }

    /// Time and cancellation limits checked between eliminations.
    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn heuristic(&self) -> &EliminationHeuristic {
        &self.heuristic
    }

    pub fn minimality(&self) -> bool {
        self.minimality
    }

    /// Triangulate `graph`. Every node needs an entry in `domain_sizes`.
    ///
    /// Running out of budget is not an error: the nodes left are eliminated
    /// in ascending id order and the result is marked degraded.
    pub fn triangulate(&self, graph: &UndiGraph, domain_sizes: &DomainSizes) -> Result<Triangulation> {
        let started = Instant::now();
        let mut strategy = self.heuristic.build();
        strategy.set_graph(graph, domain_sizes)?;

        let mut remaining: BTreeSet<NodeId> = graph.nodes().collect();
        let mut order = Vec::with_capacity(remaining.len());
        let mut fill_ins = Vec::new();
        let mut optimality = Optimality::Heuristic;

        while let Some(&smallest) = remaining.first() {
            if optimality == Optimality::Heuristic {
                if let Some(reason) = self.budget.exceeded(started) {
                    warn!(
                        strategy = strategy.name(),
                        eliminated = order.len(),
                        remaining = remaining.len(),
                        ?reason,
                        "triangulation budget exhausted, finishing in id order"
                    );
                    optimality = Optimality::Degraded(reason);
                }
            }
            let node = match optimality {
                Optimality::Heuristic => strategy.next_node_to_eliminate()?,
                Optimality::Degraded(_) => smallest,
            };
            let step = strategy.eliminate(node)?;
            trace!(
                node,
                clique = ?step.clique,
                fill_ins = step.fill_ins.len(),
                "eliminated"
            );
            remaining.remove(&node);
            order.push(node);
            fill_ins.extend(step.fill_ins);
        }

        let mut triangulated = graph.clone();
        for edge in &fill_ins {
            triangulated.add_edge(edge.first(), edge.second())?;
        }

        let sizes: DomainSizes = graph
            .nodes()
            .map(|n| (n, domain_sizes.get(&n).copied().unwrap_or(1)))
            .collect();

        let result = if self.minimality {
            let before = fill_ins.len();
            let kept = minimize_fill_ins(&mut triangulated, &fill_ins);
            debug!(removed = before - kept.len(), "minimality pass");
            let peo = maximum_cardinality_search(&triangulated);
            Triangulation::from_chordal(triangulated, peo, kept, sizes, optimality, started.elapsed())
        } else {
            Triangulation::from_chordal(triangulated, order, fill_ins, sizes, optimality, started.elapsed())
        };

        debug!(
            strategy = strategy.name(),
            nodes = graph.size(),
            fill_ins = result.fill_ins.len(),
            cliques = result.max_cliques.len(),
            width = result.induced_width(),
            "triangulated"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elimination::tests::cycle_with_tail;

    fn grid(n: usize) -> (UndiGraph, DomainSizes) {
        let mut g = UndiGraph::new();
        for _ in 0..n * n {
            g.add_node();
        }
        for r in 0..n {
            for c in 0..n {
                let id = r * n + c;
                if c + 1 < n {
                    g.add_edge(id, id + 1).unwrap();
                }
                if r + 1 < n {
                    g.add_edge(id, id + n).unwrap();
                }
            }
        }
        let sizes = (0..n * n).map(|i| (i, 2)).collect();
        (g, sizes)
    }

    #[test]
    fn test_cycle_with_tail() {
        let (g, sizes) = cycle_with_tail();
        let tri = StaticTriangulation::new(EliminationHeuristic::MinFill)
            .triangulate(&g, &sizes)
            .unwrap();
        assert_eq!(tri.elimination_order()[0], 4);
        assert_eq!(tri.fill_ins().len(), 1);
        assert!(is_chordal(tri.triangulated_graph()));
        assert!(is_perfect_elimination_order(
            tri.triangulated_graph(),
            tri.elimination_order()
        ));
        assert_eq!(tri.max_cliques().len(), 3);
        assert_eq!(tri.max_cliques()[0].creator, 4);
        assert_eq!(tri.induced_width(), 2);
        assert_eq!(tri.total_weight(), 4.0 + 8.0 + 8.0);
        assert_eq!(tri.optimality(), Optimality::Heuristic);
        assert_eq!(tri.elimination_clique(4), Some(&BTreeSet::from([0, 4])));
    }

    #[test]
    fn test_every_heuristic_yields_chordal_graph() {
        let (g, sizes) = grid(4);
        for heuristic in [
            EliminationHeuristic::MinFill,
            EliminationHeuristic::MinDegree,
            EliminationHeuristic::WeightedMinFill,
            EliminationHeuristic::MinWeight,
            EliminationHeuristic::FixedOrder((0..16).collect()),
        ] {
            for minimality in [false, true] {
                let tri = StaticTriangulation::new(heuristic.clone())
                    .with_minimality(minimality)
                    .triangulate(&g, &sizes)
                    .unwrap();
                let h = tri.triangulated_graph();
                assert!(is_chordal(h));
                assert!(is_perfect_elimination_order(h, tri.elimination_order()));
                for edge in g.edges() {
                    assert!(h.exists_edge(edge.first(), edge.second()));
                }
                assert_eq!(h.size_edges(), g.size_edges() + tri.fill_ins().len());
            }
        }
    }

    #[test]
    fn test_minimality_never_adds_fill() {
        let (g, sizes) = grid(4);
        // row-major order is a poor order on a grid
        let order = EliminationHeuristic::FixedOrder((0..16).collect());
        let plain = StaticTriangulation::new(order.clone())
            .triangulate(&g, &sizes)
            .unwrap();
        let minimal = StaticTriangulation::new(order)
            .with_minimality(true)
            .triangulate(&g, &sizes)
            .unwrap();
        assert!(minimal.fill_ins().len() <= plain.fill_ins().len());
    }

    #[test]
    fn test_cancelled_budget_degrades() {
        let (g, sizes) = grid(3);
        let token = CancellationToken::new();
        token.cancel();
        let tri = StaticTriangulation::new(EliminationHeuristic::MinFill)
            .with_budget(Budget::unlimited().with_cancellation(token))
            .triangulate(&g, &sizes)
            .unwrap();
        assert_eq!(
            tri.optimality(),
            Optimality::Degraded(DegradeReason::Cancelled)
        );
        assert_eq!(tri.elimination_order(), &(0..9).collect::<Vec<_>>()[..]);
        assert!(is_chordal(tri.triangulated_graph()));
    }

    #[test]
    fn test_zero_timeout_degrades() {
        let (g, sizes) = grid(3);
        let tri = StaticTriangulation::new(EliminationHeuristic::MinFill)
            .with_budget(Budget::unlimited().with_timeout(Duration::ZERO))
            .triangulate(&g, &sizes)
            .unwrap();
        assert!(tri.is_degraded());
    }

    #[test]
    fn test_empty_graph() {
        let tri = StaticTriangulation::default()
            .triangulate(&UndiGraph::new(), &DomainSizes::new())
            .unwrap();
        assert!(tri.max_cliques().is_empty());
        assert_eq!(tri.induced_width(), 0);
    }
}
