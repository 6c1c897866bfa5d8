//! Directed acyclic graph.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{PgmError, Result};
use crate::graph::{DirectedEdge, NodeId, UndiGraph};

/// Directed acyclic graph. Acyclicity is checked on every arc insertion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dag {
    parents: BTreeMap<NodeId, BTreeSet<NodeId>>,
    children: BTreeMap<NodeId, BTreeSet<NodeId>>,
    next_id: NodeId,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with a fresh id.
    pub fn add_node(&mut self) -> NodeId {
        let id = self.next_id;
        self.parents.insert(id, BTreeSet::new());
        self.children.insert(id, BTreeSet::new());
        self.next_id += 1;
        id
    }

    /// Add a node with a caller-chosen id.
    pub fn add_node_with_id(&mut self, id: NodeId) -> Result<()> {
        if self.parents.contains_key(&id) {
            return Err(PgmError::DuplicateNode(id));
        }
        self.parents.insert(id, BTreeSet::new());
        self.children.insert(id, BTreeSet::new());
        self.next_id = self.next_id.max(id + 1);
        Ok(())
    }

    /// Remove a node and its incident arcs.
    pub fn remove_node(&mut self, id: NodeId) {
        if let Some(parents) = self.parents.remove(&id) {
            for p in parents {
                if let Some(ch) = self.children.get_mut(&p) {
                    ch.remove(&id);
                }
            }
        }
        if let Some(children) = self.children.remove(&id) {
            for c in children {
                if let Some(pa) = self.parents.get_mut(&c) {
                    pa.remove(&id);
                }
            }
        }
    }

    /// Add the arc `tail -> head`, rejecting it if it would close a cycle.
    pub fn add_arc(&mut self, tail: NodeId, head: NodeId) -> Result<()> {
        if !self.exists_node(tail) {
            return Err(PgmError::NodeNotFound(tail));
        }
        if !self.exists_node(head) {
            return Err(PgmError::NodeNotFound(head));
        }
        if self.exists_arc(tail, head) {
            return Ok(());
        }
        if tail == head || self.has_directed_path(head, tail) {
            return Err(PgmError::CyclicArc {
                from: tail,
                to: head,
            });
        }
        if let Some(ch) = self.children.get_mut(&tail) {
            ch.insert(head);
        }
        if let Some(pa) = self.parents.get_mut(&head) {
            pa.insert(tail);
        }
        Ok(())
    }

    /// Remove the arc `tail -> head` if present.
    pub fn remove_arc(&mut self, tail: NodeId, head: NodeId) {
        if let Some(ch) = self.children.get_mut(&tail) {
            ch.remove(&head);
        }
        if let Some(pa) = self.parents.get_mut(&head) {
            pa.remove(&tail);
        }
    }

    pub fn exists_node(&self, id: NodeId) -> bool {
        self.parents.contains_key(&id)
    }

    pub fn exists_arc(&self, tail: NodeId, head: NodeId) -> bool {
        self.children
            .get(&tail)
            .map(|ch| ch.contains(&head))
            .unwrap_or(false)
    }

    /// Whether `to` is reachable from `from` following arcs.
    pub fn has_directed_path(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(u) = stack.pop() {
            if u == to {
                return true;
            }
            if !seen.insert(u) {
                continue;
            }
            if let Some(ch) = self.children.get(&u) {
                stack.extend(ch.iter().copied());
            }
        }
        false
    }

    /// Parents of `id` in increasing order.
    pub fn parents(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.parents.get(&id).into_iter().flatten().copied()
    }

    /// Children of `id` in increasing order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children.get(&id).into_iter().flatten().copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.parents.keys().copied()
    }

    pub fn arcs(&self) -> impl Iterator<Item = DirectedEdge> + '_ {
        self.children
            .iter()
            .flat_map(|(&t, ch)| ch.iter().map(move |&h| DirectedEdge::new(t, h)))
    }

    pub fn size(&self) -> usize {
        self.parents.len()
    }

    /// Number of arcs.
    pub fn size_arcs(&self) -> usize {
        self.children.values().map(|c| c.len()).sum()
    }

    /// Topological order; among ready nodes the smallest id comes first.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut in_degree: BTreeMap<NodeId, usize> = self
            .parents
            .iter()
            .map(|(&n, p)| (n, p.len()))
            .collect();
        let mut ready: BTreeSet<NodeId> = in_degree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(&n, _)| n)
            .collect();
        let mut order = Vec::with_capacity(self.size());

        while let Some(node) = ready.pop_first() {
            order.push(node);
            for child in self.children(node) {
                if let Some(d) = in_degree.get_mut(&child) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(child);
                    }
                }
            }
        }
        order
    }

    /// Moral graph: parents of every node are married and directions dropped.
    pub fn moral_graph(&self) -> Result<UndiGraph> {
        let mut moral = UndiGraph::new();
        for node in self.nodes() {
            moral.add_node_with_id(node)?;
        }
        for arc in self.arcs() {
            moral.add_edge(arc.tail, arc.head)?;
        }
        for node in self.nodes() {
            let parents: Vec<NodeId> = self.parents(node).collect();
            for (i, &p) in parents.iter().enumerate() {
                for &q in &parents[i + 1..] {
                    moral.add_edge(p, q)?;
                }
            }
        }
        Ok(moral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v_structure() -> Dag {
        // 0 -> 2 <- 1, 2 -> 3
        let mut dag = Dag::new();
        for _ in 0..4 {
            dag.add_node();
        }
        dag.add_arc(0, 2).unwrap();
        dag.add_arc(1, 2).unwrap();
        dag.add_arc(2, 3).unwrap();
        dag
    }

    #[test]
    fn test_cycle_rejected() {
        let mut dag = v_structure();
        let err = dag.add_arc(3, 0).unwrap_err();
        assert!(matches!(err, PgmError::CyclicArc { from: 3, to: 0 }));
        assert!(dag.add_arc(2, 2).is_err());
        assert_eq!(dag.size_arcs(), 3);
    }

    #[test]
    fn test_topological_order() {
        let dag = v_structure();
        assert_eq!(dag.topological_order(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_moral_graph_marries_parents() {
        let moral = v_structure().moral_graph().unwrap();
        assert!(moral.exists_edge(0, 1));
        assert!(moral.exists_edge(0, 2));
        assert!(moral.exists_edge(2, 3));
        assert!(!moral.exists_edge(0, 3));
        assert_eq!(moral.size_edges(), 4);
    }

    #[test]
    fn test_remove_node() {
        let mut dag = v_structure();
        dag.remove_node(2);
        assert_eq!(dag.size_arcs(), 0);
        assert_eq!(dag.children(0).count(), 0);

        let moral = dag.moral_graph().unwrap();
        assert_eq!(moral.size(), 3);
        assert!(!moral.exists_node(2));
        assert!(moral.exists_node(3));
    }
}
