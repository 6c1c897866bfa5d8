//! Triangulation of a graph that changes over time.

use tracing::debug;

use super::{StaticTriangulation, Triangulation};
use crate::error::{PgmError, Result};
use crate::graph::{DomainSizes, Edge, NodeId, UndiGraph};

/// A single change to the graph being triangulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphDelta {
    /// Insert an isolated node with the given domain size.
    AddNode { node: NodeId, domain_size: usize },
    /// Remove a node and every edge touching it.
    RemoveNode(NodeId),
    /// Connect two existing nodes. A no-op if they are already adjacent.
    AddEdge(NodeId, NodeId),
    /// Disconnect two nodes. A no-op if they are not adjacent.
    RemoveEdge(NodeId, NodeId),
}

/// Owns a graph and keeps a triangulation of it up to date.
///
/// Deltas that leave the current triangulation valid are patched in place:
/// adding an edge that already is a fill-in, removing an edge (the old
/// triangulation stays chordal and gains one fill-in) or adding an isolated
/// node. Anything else drops the triangulation, which is then recomputed on
/// the next call to [`triangulation`](Self::triangulation).
#[derive(Debug)]
pub struct Triangulator {
    graph: UndiGraph,
    domain_sizes: DomainSizes,
    config: StaticTriangulation,
    current: Option<Triangulation>,
    recomputations: usize,
}

impl Triangulator {
    /// Wrap `graph`; nothing is triangulated until first asked.
    pub fn new(graph: UndiGraph, domain_sizes: DomainSizes, config: StaticTriangulation) -> Self {
        Self {
            graph,
            domain_sizes,
            config,
            current: None,
            recomputations: 0,
        }
    }

    /// The graph as updated by every delta applied so far.
    pub fn graph(&self) -> &UndiGraph {
        &self.graph
    }

    /// How many full triangulations have been run.
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    /// Current triangulation, computed if needed.
    pub fn triangulation(&mut self) -> Result<&Triangulation> {
        if self.current.is_none() {
            let tri = self.config.triangulate(&self.graph, &self.domain_sizes)?;
            self.recomputations += 1;
            self.current = Some(tri);
        }
        self.current
            .as_ref()
            .ok_or_else(|| PgmError::OperationNotAllowed("no triangulation".to_string()))
    }

    /// Apply `delta` to the graph and update the triangulation.
    pub fn update_triangulation(&mut self, delta: GraphDelta) -> Result<()> {
        match delta {
            GraphDelta::AddNode { node, domain_size } => {
                self.graph.add_node_with_id(node)?;
                self.domain_sizes.insert(node, domain_size);
                if let Some(tri) = self.current.as_mut() {
                    tri.graph.add_node_with_id(node)?;
                    tri.domain_sizes.insert(node, domain_size);
                    let clique = [node].into_iter().collect();
                    tri.elimination_order.push(node);
                    tri.elimination_cliques.insert(node, clique);
                    tri.max_cliques.push(super::MaxClique {
                        creator: node,
                        nodes: [node].into_iter().collect(),
                    });
                }
            }
            GraphDelta::RemoveNode(node) => {
                if !self.graph.exists_node(node) {
                    return Err(PgmError::NodeNotFound(node));
                }
                self.graph.remove_node(node);
                self.domain_sizes.remove(&node);
                self.invalidate("node removed");
            }
            GraphDelta::AddEdge(u, v) => {
                if self.graph.exists_edge(u, v) {
                    return Ok(());
                }
                self.graph.add_edge(u, v)?;
                let edge = Edge::new(u, v);
                let absorbed = match self.current.as_mut() {
                    Some(tri) => match tri.fill_ins.iter().position(|e| *e == edge) {
                        Some(i) => {
                            tri.fill_ins.remove(i);
                            true
                        }
                        None => false,
                    },
                    None => true,
                };
                if !absorbed {
                    self.invalidate("edge added");
                }
            }
            GraphDelta::RemoveEdge(u, v) => {
                if !self.graph.exists_edge(u, v) {
                    return Ok(());
                }
                self.graph.remove_edge(u, v);
                if self.config.minimality() {
                    self.invalidate("edge removed under minimality");
                } else if let Some(tri) = self.current.as_mut() {
                    tri.fill_ins.push(Edge::new(u, v));
                }
            }
        }
        Ok(())
    }

    fn invalidate(&mut self, reason: &str) {
        if self.current.take().is_some() {
            debug!(reason, "triangulation invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elimination::tests::cycle_with_tail;
    use crate::elimination::EliminationHeuristic;
    use crate::triangulation::is_chordal;

    fn triangulator() -> Triangulator {
        let (g, sizes) = cycle_with_tail();
        Triangulator::new(
            g,
            sizes,
            StaticTriangulation::new(EliminationHeuristic::MinFill),
        )
    }

    #[test]
    fn test_lazy_recomputation() {
        let mut t = triangulator();
        assert_eq!(t.triangulation().unwrap().fill_ins().len(), 1);
        assert_eq!(t.recomputations(), 1);
        t.triangulation().unwrap();
        assert_eq!(t.recomputations(), 1);

        t.update_triangulation(GraphDelta::RemoveNode(4)).unwrap();
        let tri = t.triangulation().unwrap();
        assert_eq!(tri.elimination_order().len(), 4);
        assert_eq!(t.recomputations(), 2);
    }

    #[test]
    fn test_adding_the_fill_in_keeps_triangulation() {
        let mut t = triangulator();
        let fill = t.triangulation().unwrap().fill_ins()[0];
        t.update_triangulation(GraphDelta::AddEdge(fill.first(), fill.second()))
            .unwrap();
        let tri = t.triangulation().unwrap();
        assert!(tri.fill_ins().is_empty());
        assert_eq!(t.recomputations(), 1);
    }

    #[test]
    fn test_edge_removal_and_isolated_node() {
        let mut t = triangulator();
        t.triangulation().unwrap();
        t.update_triangulation(GraphDelta::RemoveEdge(0, 4)).unwrap();
        t.update_triangulation(GraphDelta::AddNode {
            node: 9,
            domain_size: 3,
        })
        .unwrap();
        let tri = t.triangulation().unwrap();
        assert_eq!(tri.fill_ins().len(), 2);
        assert!(is_chordal(tri.triangulated_graph()));
        assert_eq!(tri.max_cliques().last().map(|c| c.creator), Some(9));
        assert_eq!(t.recomputations(), 1);

        t.update_triangulation(GraphDelta::AddEdge(9, 0)).unwrap();
        t.triangulation().unwrap();
        assert_eq!(t.recomputations(), 2);
    }
}
