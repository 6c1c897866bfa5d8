//! Caller-supplied elimination order.

use std::collections::BTreeSet;

use super::{not_ready, EliminationGraph, EliminationSequenceStrategy, EliminationStep};
use crate::error::{PgmError, Result};
use crate::graph::{DomainSizes, NodeId, UndiGraph};

/// Eliminates the listed nodes first, in order. Nodes missing from the list
/// are unconstrained and follow by min-fill.
#[derive(Debug, Clone, Default)]
pub struct FixedOrder {
    order: Vec<NodeId>,
    graph: Option<EliminationGraph>,
}

impl FixedOrder {
    pub fn new(order: Vec<NodeId>) -> Self {
        Self { order, graph: None }
    }

    pub fn order(&self) -> &[NodeId] {
        &self.order
    }
}

impl EliminationSequenceStrategy for FixedOrder {
    fn set_graph(&mut self, graph: &UndiGraph, domain_sizes: &DomainSizes) -> Result<()> {
        let mut seen = BTreeSet::new();
        for &node in &self.order {
            if !graph.exists_node(node) {
                return Err(PgmError::NodeNotFound(node));
            }
            if !seen.insert(node) {
                return Err(PgmError::DuplicateNode(node));
            }
        }
        self.graph = Some(EliminationGraph::new(graph, domain_sizes)?);
        Ok(())
    }

    fn next_node_to_eliminate(&self) -> Result<NodeId> {
        let graph = self.graph.as_ref().ok_or_else(|| not_ready(self.name()))?;
        if let Some(&node) = self.order.iter().find(|&&n| graph.contains(n)) {
            return Ok(node);
        }
        graph
            .argmin(|node| graph.fill_count(node))
            .ok_or_else(|| not_ready(self.name()))
    }

    fn eliminate(&mut self, node: NodeId) -> Result<EliminationStep> {
        self.graph
            .as_mut()
            .ok_or_else(|| not_ready("fixed-order"))?
            .eliminate(node)
    }

    fn is_exhausted(&self) -> bool {
        self.graph.as_ref().map_or(true, |g| g.is_empty())
    }

    fn clear(&mut self) {
        self.graph = None;
    }

    fn name(&self) -> &'static str {
        "fixed-order"
    }
}
