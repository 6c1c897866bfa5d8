//! Undirected graph with ordered adjacency sets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{PgmError, Result};
use crate::graph::{Edge, NodeId};

/// Mutation notification emitted by an [`UndiGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphEvent {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    EdgeAdded(Edge),
    EdgeRemoved(Edge),
}

/// Callback invoked synchronously after each mutation.
pub type GraphListener = Arc<dyn Fn(&GraphEvent) + Send + Sync>;

/// Undirected graph.
///
/// Node ids are allocated monotonically by [`UndiGraph::add_node`] and never
/// reused by the allocator. Iteration over nodes and neighbours is ordered by
/// id, which keeps every heuristic built on top of it deterministic.
#[derive(Default)]
pub struct UndiGraph {
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
    num_edges: usize,
    next_id: NodeId,
    listeners: Vec<GraphListener>,
}

impl UndiGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback called after every node/edge mutation.
    pub fn on_change<F>(&mut self, listener: F)
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Drop every registered callback.
    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    fn notify(&self, event: GraphEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }

    /// Add a node with a fresh id.
    pub fn add_node(&mut self) -> NodeId {
        let id = self.next_id;
        self.adjacency.insert(id, BTreeSet::new());
        self.next_id += 1;
        self.notify(GraphEvent::NodeAdded(id));
        id
    }

    /// Add a node with a caller-chosen id.
    pub fn add_node_with_id(&mut self, id: NodeId) -> Result<()> {
        if self.adjacency.contains_key(&id) {
            return Err(PgmError::DuplicateNode(id));
        }
        self.adjacency.insert(id, BTreeSet::new());
        self.next_id = self.next_id.max(id + 1);
        self.notify(GraphEvent::NodeAdded(id));
        Ok(())
    }

    /// Remove a node and all its edges. Removing a missing node is a no-op.
    pub fn remove_node(&mut self, id: NodeId) {
        let Some(neighbours) = self.adjacency.remove(&id) else {
            return;
        };
        for n in &neighbours {
            if let Some(adj) = self.adjacency.get_mut(n) {
                adj.remove(&id);
            }
            self.num_edges -= 1;
            self.notify(GraphEvent::EdgeRemoved(Edge::new(id, *n)));
        }
        self.notify(GraphEvent::NodeRemoved(id));
    }

    /// Add the edge `u - v`. Adding an existing edge is a no-op.
    pub fn add_edge(&mut self, u: NodeId, v: NodeId) -> Result<()> {
        if u == v {
            return Err(PgmError::OperationNotAllowed(format!(
                "self loop on node {}",
                u
            )));
        }
        if !self.adjacency.contains_key(&v) {
            return Err(PgmError::NodeNotFound(v));
        }
        let inserted = self
            .adjacency
            .get_mut(&u)
            .ok_or(PgmError::NodeNotFound(u))?
            .insert(v);
        if inserted {
            if let Some(adj) = self.adjacency.get_mut(&v) {
                adj.insert(u);
            }
            self.num_edges += 1;
            self.notify(GraphEvent::EdgeAdded(Edge::new(u, v)));
        }
        Ok(())
    }

    /// Remove the edge `u - v` if present.
    pub fn remove_edge(&mut self, u: NodeId, v: NodeId) {
        let removed = self
            .adjacency
            .get_mut(&u)
            .map(|adj| adj.remove(&v))
            .unwrap_or(false);
        if removed {
            if let Some(adj) = self.adjacency.get_mut(&v) {
                adj.remove(&u);
            }
            self.num_edges -= 1;
            self.notify(GraphEvent::EdgeRemoved(Edge::new(u, v)));
        }
    }

    pub fn exists_node(&self, id: NodeId) -> bool {
        self.adjacency.contains_key(&id)
    }

    pub fn exists_edge(&self, u: NodeId, v: NodeId) -> bool {
        self.adjacency
            .get(&u)
            .map(|adj| adj.contains(&v))
            .unwrap_or(false)
    }

    /// Neighbours of a node (empty for unknown nodes).
    pub fn neighbours(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency.get(&id).into_iter().flatten().copied()
    }

    /// Neighbour set of a node, if the node exists.
    pub fn neighbour_set(&self, id: NodeId) -> Option<&BTreeSet<NodeId>> {
        self.adjacency.get(&id)
    }

    /// Number of neighbours; 0 for unknown nodes.
    pub fn degree(&self, id: NodeId) -> usize {
        self.adjacency.get(&id).map(|adj| adj.len()).unwrap_or(0)
    }

    /// Node ids in increasing order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency.keys().copied()
    }

    /// Edges in lexicographic order, each reported once.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.adjacency.iter().flat_map(|(&u, adj)| {
            adj.iter()
                .filter(move |&&v| u < v)
                .map(move |&v| Edge::new(u, v))
        })
    }

    /// Number of nodes.
    pub fn size(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of edges.
    pub fn size_edges(&self) -> usize {
        self.num_edges
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Check whether the given nodes are pairwise adjacent.
    pub fn is_complete<'a, I>(&self, nodes: I) -> bool
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        let nodes: Vec<NodeId> = nodes.into_iter().copied().collect();
        for (i, &u) in nodes.iter().enumerate() {
            for &v in &nodes[i + 1..] {
                if !self.exists_edge(u, v) {
                    return false;
                }
            }
        }
        true
    }

    /// Connected components, each listed in increasing id order.
    pub fn connected_components(&self) -> Vec<Vec<NodeId>> {
        let mut seen = BTreeSet::new();
        let mut components = Vec::new();
        for start in self.nodes() {
            if !seen.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut stack = vec![start];
            while let Some(u) = stack.pop() {
                for v in self.neighbours(u) {
                    if seen.insert(v) {
                        component.push(v);
                        stack.push(v);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }
}

impl Clone for UndiGraph {
    /// Listeners are not carried over to clones.
    fn clone(&self) -> Self {
        Self {
            adjacency: self.adjacency.clone(),
            num_edges: self.num_edges,
            next_id: self.next_id,
            listeners: Vec::new(),
        }
    }
}

impl PartialEq for UndiGraph {
    fn eq(&self, other: &Self) -> bool {
        self.adjacency == other.adjacency
    }
}

impl fmt::Debug for UndiGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndiGraph")
            .field("nodes", &self.adjacency.keys().collect::<Vec<_>>())
            .field("edges", &self.edges().collect::<Vec<_>>())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
