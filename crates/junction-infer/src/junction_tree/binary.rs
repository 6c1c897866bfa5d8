//! Conversion to binary join trees.
//!
//! Some propagation schemes need every clique to have at most two children.
//! A clique with more children is split by repeatedly pulling two of them
//! under a new synthetic node holding the union of their separators.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use super::JunctionTree;
use crate::error::{PgmError, Result};
use crate::graph::{CliqueGraph, CliqueId, DomainSizes, NodeId};

/// Turns a junction tree into one where every node has at most two children.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryJoinTreeConverter;

impl BinaryJoinTreeConverter {
    pub fn new() -> Self {
        Self
    }

    /// Binarize `tree` rooted at `roots`.
    ///
    /// At most one root per connected component; components without one are
    /// rooted at their smallest clique. The pair of children merged first is
    /// the one whose separator union has the smallest domain product.
    pub fn convert(
        &self,
        tree: &JunctionTree,
        domain_sizes: &DomainSizes,
        roots: &[CliqueId],
    ) -> Result<JunctionTree> {
        let roots = Self::check_roots(tree, roots)?;
        let mut graph = tree.clique_graph().clone();
        let before = graph.size();

        for &root in &roots {
            let order = Self::top_down(&graph, root);
            let mut parent_of: BTreeMap<CliqueId, Option<CliqueId>> =
                order.iter().copied().collect();
            for (node, _) in order {
                let parent = parent_of.get(&node).copied().flatten();
                let mut children: Vec<CliqueId> =
                    graph.neighbours(node).filter(|&n| Some(n) != parent).collect();
                while children.len() > 2 {
                    let (i, j, union) = Self::cheapest_pair(&graph, node, &children, domain_sizes)?;
                    let b = children.remove(j);
                    let a = children.remove(i);
                    let synthetic = graph.add_clique(union);
                    graph.remove_edge(node, a);
                    graph.remove_edge(node, b);
                    graph.add_edge(node, synthetic)?;
                    graph.add_edge(synthetic, a)?;
                    graph.add_edge(synthetic, b)?;
                    parent_of.insert(a, Some(synthetic));
                    parent_of.insert(b, Some(synthetic));
                    children.push(synthetic);
                }
            }
        }

        debug!(
            added = graph.size() - before,
            roots = roots.len(),
            "binary join tree"
        );
        Ok(JunctionTree::from_parts(
            graph,
            tree.created.clone(),
            tree.domain_sizes().clone(),
            roots,
        ))
    }

    /// True when every node has at most two children under `roots`.
    pub fn is_binary(tree: &JunctionTree, roots: &[CliqueId]) -> bool {
        let graph = tree.clique_graph();
        roots.iter().all(|&root| {
            Self::top_down(graph, root).into_iter().all(|(node, parent)| {
                graph.neighbours(node).filter(|&n| Some(n) != parent).count() <= 2
            })
        })
    }

    fn check_roots(tree: &JunctionTree, roots: &[CliqueId]) -> Result<Vec<CliqueId>> {
        let components = tree.clique_graph().connected_components();
        let mut component_of = BTreeMap::new();
        for (index, component) in components.iter().enumerate() {
            for &id in component {
                component_of.insert(id, index);
            }
        }

        let mut chosen: BTreeMap<usize, CliqueId> = BTreeMap::new();
        for &root in roots {
            let component = *component_of.get(&root).ok_or_else(|| {
                PgmError::InvalidRoots(format!("clique {} is not in the tree", root))
            })?;
            if let Some(other) = chosen.insert(component, root) {
                return Err(PgmError::InvalidRoots(format!(
                    "cliques {} and {} are in the same component",
                    other, root
                )));
            }
        }
        for (index, component) in components.iter().enumerate() {
            if let Some(&smallest) = component.iter().min() {
                chosen.entry(index).or_insert(smallest);
            }
        }
        Ok(chosen.into_values().collect())
    }

    /// Breadth-first `(node, parent)` pairs from `root`.
    fn top_down(graph: &CliqueGraph, root: CliqueId) -> Vec<(CliqueId, Option<CliqueId>)> {
        let mut order = Vec::new();
        let mut seen = BTreeSet::from([root]);
        let mut queue = VecDeque::from([(root, None)]);
        while let Some((node, parent)) = queue.pop_front() {
            order.push((node, parent));
            for n in graph.neighbours(node) {
                if seen.insert(n) {
                    queue.push_back((n, Some(node)));
                }
            }
        }
        order
    }

    fn cheapest_pair(
        graph: &CliqueGraph,
        node: CliqueId,
        children: &[CliqueId],
        domain_sizes: &DomainSizes,
    ) -> Result<(usize, usize, BTreeSet<NodeId>)> {
        let separators = children
            .iter()
            .map(|&c| graph.separator(node, c))
            .collect::<Result<Vec<_>>>()?;

        let mut best: Option<(usize, usize, BTreeSet<NodeId>, f64)> = None;
        for i in 0..children.len() {
            for j in (i + 1)..children.len() {
                let union: BTreeSet<NodeId> =
                    separators[i].union(&separators[j]).copied().collect();
                let cost: f64 = union
                    .iter()
                    .map(|v| domain_sizes.get(v).copied().unwrap_or(1) as f64)
                    .product();
                if best.as_ref().map_or(true, |b| cost < b.3) {
                    best = Some((i, j, union, cost));
                }
            }
        }
        best.map(|(i, j, union, _)| (i, j, union))
            .ok_or_else(|| PgmError::OperationNotAllowed("fewer than two children".to_string()))
    }
}
