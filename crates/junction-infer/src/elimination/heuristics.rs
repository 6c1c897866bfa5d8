//! Greedy scoring heuristics.

use std::cmp::Ordering;

use super::{not_ready, EliminationGraph, EliminationSequenceStrategy, EliminationStep};
use crate::error::Result;
use crate::graph::{DomainSizes, NodeId, UndiGraph};

/// Shared state handling for the greedy strategies: each only differs in
/// how it scores a candidate node.
macro_rules! greedy_strategy {
    ($ty:ident, $name:literal, |$graph:ident, $node:ident| $score:expr) => {
        impl $ty {
            pub fn new() -> Self {
                Self { graph: None }
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl EliminationSequenceStrategy for $ty {
            fn set_graph(&mut self, graph: &UndiGraph, domain_sizes: &DomainSizes) -> Result<()> {
                self.graph = Some(EliminationGraph::new(graph, domain_sizes)?);
                Ok(())
            }

            fn next_node_to_eliminate(&self) -> Result<NodeId> {
                let $graph = self.graph.as_ref().ok_or_else(|| not_ready($name))?;
                $graph
                    .argmin(|$node| $score)
                    .ok_or_else(|| not_ready($name))
            }

            fn eliminate(&mut self, node: NodeId) -> Result<EliminationStep> {
                self.graph
                    .as_mut()
                    .ok_or_else(|| not_ready($name))?
                    .eliminate(node)
            }

            fn is_exhausted(&self) -> bool {
                self.graph.as_ref().map_or(true, |g| g.is_empty())
            }

            fn clear(&mut self) {
                self.graph = None;
            }

            fn name(&self) -> &'static str {
                $name
            }
        }
    };
}

/// Eliminate the node with the fewest remaining neighbours.
#[derive(Debug, Clone)]
pub struct MinDegree {
    graph: Option<EliminationGraph>,
}

greedy_strategy!(MinDegree, "min-degree", |g, node| g.degree(node));

/// Eliminate the node whose elimination adds the fewest fill-ins.
#[derive(Debug, Clone)]
pub struct MinFill {
    graph: Option<EliminationGraph>,
}

greedy_strategy!(MinFill, "min-fill", |g, node| g.fill_count(node));

/// Min-fill where each fill-in `ab` costs `dom(a)·dom(b)`; ties go to the
/// lighter elimination clique.
#[derive(Debug, Clone)]
pub struct WeightedMinFill {
    graph: Option<EliminationGraph>,
}

greedy_strategy!(WeightedMinFill, "weighted-min-fill", |g, node| Score(
    g.weighted_fill(node),
    g.clique_weight(node)
));

/// Simplicial nodes first, otherwise the lightest elimination clique.
#[derive(Debug, Clone)]
pub struct MinWeight {
    graph: Option<EliminationGraph>,
}

greedy_strategy!(MinWeight, "min-weight", |g, node| Score(
    if g.is_simplicial(node) { 0.0 } else { 1.0 },
    g.clique_weight(node)
));

/// Lexicographic pair of floating-point costs.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Score(f64, f64);

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.0.partial_cmp(&other.0)? {
            Ordering::Equal => self.1.partial_cmp(&other.1),
            ord => Some(ord),
        }
    }
}
