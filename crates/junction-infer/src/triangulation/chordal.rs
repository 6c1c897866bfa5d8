//! Chordal graph utilities.
//!
//! A graph is chordal iff it admits a perfect elimination ordering (PEO):
//! an order in which every node's later neighbours form a clique. Maximum
//! cardinality search finds one whenever it exists.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::{Edge, NodeId, UndiGraph};

/// Maximum cardinality search.
///
/// Visits nodes by decreasing number of already-visited neighbours (ties to
/// the smallest id) and returns the *reverse* visit order, which is a perfect
/// elimination ordering whenever `graph` is chordal.
pub fn maximum_cardinality_search(graph: &UndiGraph) -> Vec<NodeId> {
    let mut weight: BTreeMap<NodeId, usize> = graph.nodes().map(|n| (n, 0)).collect();
    let mut visit = Vec::with_capacity(graph.size());

    while !weight.is_empty() {
        let mut best: Option<(NodeId, usize)> = None;
        for (&node, &w) in &weight {
            if best.map_or(true, |(_, bw)| w > bw) {
                best = Some((node, w));
            }
        }
        let Some((node, _)) = best else { break };
        weight.remove(&node);
        for n in graph.neighbours(node) {
            if let Some(w) = weight.get_mut(&n) {
                *w += 1;
            }
        }
        visit.push(node);
    }

    visit.reverse();
    visit
}

/// Whether `order` is a perfect elimination ordering of `graph`.
///
/// `order` must list every node exactly once.
pub fn is_perfect_elimination_order(graph: &UndiGraph, order: &[NodeId]) -> bool {
    if order.len() != graph.size() {
        return false;
    }
    let mut position = BTreeMap::new();
    for (i, &node) in order.iter().enumerate() {
        if !graph.exists_node(node) || position.insert(node, i).is_some() {
            return false;
        }
    }

    // Checking that the remaining later neighbours are adjacent to the
    // earliest one is enough.
    for (i, &node) in order.iter().enumerate() {
        let later: Vec<NodeId> = graph
            .neighbours(node)
            .filter(|n| position[n] > i)
            .collect();
        let Some(&parent) = later.iter().min_by_key(|n| position[*n]) else {
            continue;
        };
        if later
            .iter()
            .any(|&n| n != parent && !graph.exists_edge(parent, n))
        {
            return false;
        }
    }
    true
}

/// Whether every cycle of length four or more in `graph` has a chord.
pub fn is_chordal(graph: &UndiGraph) -> bool {
    is_perfect_elimination_order(graph, &maximum_cardinality_search(graph))
}

/// `{node} ∪ later neighbours` for each node of a perfect elimination order.
pub(crate) fn elimination_cliques(
    graph: &UndiGraph,
    order: &[NodeId],
) -> Vec<(NodeId, BTreeSet<NodeId>)> {
    let position: BTreeMap<NodeId, usize> =
        order.iter().enumerate().map(|(i, &n)| (n, i)).collect();
    order
        .iter()
        .enumerate()
        .map(|(i, &node)| {
            let mut clique: BTreeSet<NodeId> = graph
                .neighbours(node)
                .filter(|n| position.get(n).is_some_and(|&p| p > i))
                .collect();
            clique.insert(node);
            (node, clique)
        })
        .collect()
}

/// Keep the cliques not contained in another; among equal sets the first
/// one wins. Input order is preserved.
pub(crate) fn keep_maximal(
    cliques: Vec<(NodeId, BTreeSet<NodeId>)>,
) -> Vec<(NodeId, BTreeSet<NodeId>)> {
    let mut kept = Vec::with_capacity(cliques.len());
    for (i, (node, clique)) in cliques.iter().enumerate() {
        let dominated = cliques.iter().enumerate().any(|(j, (_, other))| {
            i != j
                && clique.is_subset(other)
                && (clique.len() < other.len() || j < i)
        });
        if !dominated {
            kept.push((*node, clique.clone()));
        }
    }
    kept
}

/// Maximal cliques of a chordal graph.
///
/// On a non-chordal graph the result only covers the cliques induced by the
/// search order and is not meaningful.
pub fn maximal_cliques_of_chordal(graph: &UndiGraph) -> Vec<BTreeSet<NodeId>> {
    let order = maximum_cardinality_search(graph);
    keep_maximal(elimination_cliques(graph, &order))
        .into_iter()
        .map(|(_, clique)| clique)
        .collect()
}

/// Remove fill-in edges until none can go without breaking chordality.
///
/// `graph` must be chordal. An edge `uv` of a chordal graph can be removed
/// while keeping it chordal iff the common neighbours of `u` and `v` are
/// pairwise adjacent. Returns the fill-ins that remain.
pub fn minimize_fill_ins(graph: &mut UndiGraph, fill_ins: &[Edge]) -> Vec<Edge> {
    let mut remaining: Vec<Edge> = fill_ins.to_vec();
    loop {
        let removable = remaining.iter().position(|e| {
            let (u, v) = (e.first(), e.second());
            let common: Vec<NodeId> = match (graph.neighbour_set(u), graph.neighbour_set(v)) {
                (Some(a), Some(b)) => a.intersection(b).copied().collect(),
                _ => return false,
            };
            graph.is_complete(&common)
        });
        match removable {
            Some(i) => {
                let edge = remaining.remove(i);
                graph.remove_edge(edge.first(), edge.second());
            }
            None => return remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(n: usize, edges: &[(NodeId, NodeId)]) -> UndiGraph {
        let mut g = UndiGraph::new();
        for _ in 0..n {
            g.add_node();
        }
        for &(a, b) in edges {
            g.add_edge(a, b).unwrap();
        }
        g
    }

    #[test]
    fn test_cycle_is_not_chordal() {
        let mut g = graph(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]);
        assert!(!is_chordal(&g));
        g.add_edge(0, 2).unwrap();
        assert!(is_chordal(&g));
        let order = maximum_cardinality_search(&g);
        assert!(is_perfect_elimination_order(&g, &order));
    }

    #[test]
    fn test_peo_check() {
        // path 0-1-2
        let g = graph(3, &[(0, 1), (1, 2)]);
        assert!(is_perfect_elimination_order(&g, &[0, 1, 2]));
        // eliminating the middle first needs 0-2
        assert!(!is_perfect_elimination_order(&g, &[1, 0, 2]));
        assert!(!is_perfect_elimination_order(&g, &[0, 1]));
        assert!(!is_perfect_elimination_order(&g, &[0, 0, 2]));
    }

    #[test]
    fn test_maximal_cliques() {
        // two triangles sharing edge 1-2, plus isolated node 4
        let g = graph(5, &[(0, 1), (0, 2), (1, 2), (1, 3), (2, 3)]);
        let mut cliques = maximal_cliques_of_chordal(&g);
        cliques.sort();
        assert_eq!(
            cliques,
            vec![
                BTreeSet::from([0, 1, 2]),
                BTreeSet::from([1, 2, 3]),
                BTreeSet::from([4]),
            ]
        );
    }

    #[test]
    fn test_minimize_drops_redundant_fill() {
        // path 0-1-2 triangulated with a useless 0-2 fill-in
        let mut g = graph(3, &[(0, 1), (1, 2), (0, 2)]);
        let kept = minimize_fill_ins(&mut g, &[Edge::new(0, 2)]);
        assert!(kept.is_empty());
        assert!(!g.exists_edge(0, 2));

        // 4-cycle needs its chord
        let mut g = graph(4, &[(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)]);
        let kept = minimize_fill_ins(&mut g, &[Edge::new(0, 2)]);
        assert_eq!(kept, vec![Edge::new(0, 2)]);
    }
}
