//! Graph primitives: undirected graphs, DAGs and clique graphs.

mod clique_graph;
mod dag;
mod undirected;

pub use clique_graph::{CliqueGraph, CliqueId};
pub use dag::Dag;
pub use undirected::{GraphEvent, GraphListener, UndiGraph};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of a node (and of the model variable it stands for).
pub type NodeId = usize;

/// Domain size of every variable, keyed by node.
pub type DomainSizes = BTreeMap<NodeId, usize>;

/// Unordered pair of nodes, stored with `first < second`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    first: NodeId,
    second: NodeId,
}

impl Edge {
    /// Edge between `u` and `v`, in either order.
    pub fn new(u: NodeId, v: NodeId) -> Self {
        if u <= v {
            Self {
                first: u,
                second: v,
            }
        } else {
            Self {
                first: v,
                second: u,
            }
        }
    }

    /// Smaller endpoint.
    pub fn first(&self) -> NodeId {
        self.first
    }

    /// Larger endpoint.
    pub fn second(&self) -> NodeId {
        self.second
    }

    /// The endpoint opposite to `node`.
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if node == self.first {
            Some(self.second)
        } else if node == self.second {
            Some(self.first)
        } else {
            None
        }
    }
}

/// Directed pair of nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DirectedEdge {
    pub tail: NodeId,
    pub head: NodeId,
}

impl DirectedEdge {
    pub fn new(tail: NodeId, head: NodeId) -> Self {
        Self { tail, head }
    }
}
