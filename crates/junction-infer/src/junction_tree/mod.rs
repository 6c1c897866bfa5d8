//! Junction-tree construction.
//!
//! A junction tree connects the maximal cliques of a triangulated graph so
//! that, for every variable, the cliques containing it form a connected
//! subtree (running intersection). Message passing on such a tree is exact.
//!
//! ```text
//! moral graph → triangulate → maximal cliques → spanning tree → junction tree
//! ```
//!
//! Two construction strategies are available:
//!
//! - [`JunctionTreeStrategy::MaxSpanningTree`]: Kruskal maximum-weight
//!   spanning forest over clique pairs, weighted by separator size.
//! - [`JunctionTreeStrategy::EliminationTree`]: each clique hangs off the
//!   clique of the first node eliminated after its creator. Linear in the
//!   number of cliques.
//!
//! Cliques sharing no variable are never joined, so a model with several
//! connected components yields a forest with one tree per component.

mod binary;

pub use binary::BinaryJoinTreeConverter;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PgmError, Result};
use crate::graph::{CliqueGraph, CliqueId, DomainSizes, NodeId};
use crate::triangulation::Triangulation;

/// How cliques are connected into a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JunctionTreeStrategy {
    #[default]
    MaxSpanningTree,
    EliminationTree,
}

/// A forest of cliques with the running-intersection property.
#[derive(Debug, Clone, Default)]
pub struct JunctionTree {
    cliques: CliqueGraph,
    created: BTreeMap<NodeId, CliqueId>,
    domain_sizes: DomainSizes,
    roots: Vec<CliqueId>,
}

impl JunctionTree {
    /// Build a junction tree from the maximal cliques of `triangulation`.
    pub fn build(triangulation: &Triangulation, strategy: JunctionTreeStrategy) -> Result<Self> {
        let order = triangulation.elimination_order();
        let position: BTreeMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        let mut elim_cliques = BTreeMap::new();
        for &node in order {
            let clique = triangulation
                .elimination_clique(node)
                .ok_or(PgmError::NodeNotFound(node))?;
            elim_cliques.insert(node, clique);
        }

        // parent(v): first node eliminated after v among its clique
        let parent: BTreeMap<NodeId, Option<NodeId>> = order
            .iter()
            .map(|&v| {
                let p = elim_cliques[&v]
                    .iter()
                    .filter(|&&u| u != v)
                    .min_by_key(|&&u| position[&u])
                    .copied();
                (v, p)
            })
            .collect();

        // A clique is non-maximal iff some child extends it by its own node;
        // such a clique is represented by that child's clique.
        let mut children: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for (&v, p) in &parent {
            if let Some(p) = p {
                children.entry(*p).or_default().push(v);
            }
        }
        let mut rep: BTreeMap<NodeId, NodeId> = BTreeMap::new();
        for &v in order {
            let own = elim_cliques[&v];
            let absorbing = children
                .get(&v)
                .into_iter()
                .flatten()
                .filter(|w| elim_cliques[*w].len() == own.len() + 1 && own.is_subset(elim_cliques[*w]))
                .min_by_key(|w| position[*w]);
            let r = match absorbing {
                Some(w) => rep[w],
                None => v,
            };
            rep.insert(v, r);
        }

        let mut tree = JunctionTree::default();
        let mut clique_of: BTreeMap<NodeId, CliqueId> = BTreeMap::new();
        for &v in order {
            if rep[&v] == v {
                let id = tree.cliques.add_clique(elim_cliques[&v].clone());
                clique_of.insert(v, id);
            }
        }
        for &v in order {
            tree.created.insert(v, clique_of[&rep[&v]]);
        }
        tree.domain_sizes = triangulation.domain_sizes().clone();

        match strategy {
            JunctionTreeStrategy::EliminationTree => {
                for (&v, &id) in &clique_of {
                    let mut p = parent[&v];
                    while let Some(pp) = p {
                        if rep[&pp] != v {
                            break;
                        }
                        p = parent[&pp];
                    }
                    if let Some(pp) = p {
                        tree.cliques.add_edge(id, clique_of[&rep[&pp]])?;
                    }
                }
            }
            JunctionTreeStrategy::MaxSpanningTree => tree.connect_max_spanning_tree()?,
        }

        tree.roots = tree.default_roots();
        debug!(
            ?strategy,
            cliques = tree.size(),
            edges = tree.cliques.size_edges(),
            treewidth = tree.treewidth(),
            "junction tree built"
        );
        Ok(tree)
    }

    /// Kruskal on all clique pairs with a non-empty separator. Heavier
    /// separators first, ties by clique ids.
    fn connect_max_spanning_tree(&mut self) -> Result<()> {
        let ids: Vec<CliqueId> = self.cliques.clique_ids().collect();
        let mut candidates = Vec::new();
        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                let weight = self.cliques.separator(a, b)?.len();
                if weight > 0 {
                    candidates.push((weight, a, b));
                }
            }
        }
        candidates.sort_by(|x, y| y.0.cmp(&x.0).then((x.1, x.2).cmp(&(y.1, y.2))));

        let mut sets = UnionFind::new(&ids);
        for (_, a, b) in candidates {
            if sets.union(a, b) {
                self.cliques.add_edge(a, b)?;
            }
        }
        Ok(())
    }

    fn default_roots(&self) -> Vec<CliqueId> {
        self.cliques
            .connected_components()
            .into_iter()
            .filter_map(|component| component.into_iter().min())
            .collect()
    }

    pub(crate) fn from_parts(
        cliques: CliqueGraph,
        created: BTreeMap<NodeId, CliqueId>,
        domain_sizes: DomainSizes,
        roots: Vec<CliqueId>,
    ) -> Self {
        Self {
            cliques,
            created,
            domain_sizes,
            roots,
        }
    }

    /// Underlying clique graph.
    pub fn clique_graph(&self) -> &CliqueGraph {
        &self.cliques
    }

    /// Variables of clique `id`.
    pub fn clique(&self, id: CliqueId) -> Option<&BTreeSet<NodeId>> {
        self.cliques.clique(id)
    }

    /// Clique ids in increasing order.
    pub fn clique_ids(&self) -> impl Iterator<Item = CliqueId> + '_ {
        self.cliques.clique_ids()
    }

    /// Cliques adjacent to `id` in the tree.
    pub fn neighbours(&self, id: CliqueId) -> impl Iterator<Item = CliqueId> + '_ {
        self.cliques.neighbours(id)
    }

    /// Separator of the tree edge between `a` and `b`.
    pub fn separator(&self, a: CliqueId, b: CliqueId) -> Result<BTreeSet<NodeId>> {
        self.cliques.separator(a, b)
    }

    /// Number of cliques.
    pub fn size(&self) -> usize {
        self.cliques.size()
    }

    pub fn is_empty(&self) -> bool {
        self.cliques.is_empty()
    }

    /// Domain size of every variable covered by the tree.
    pub fn domain_sizes(&self) -> &DomainSizes {
        &self.domain_sizes
    }

    /// Clique holding the elimination clique of `node`.
    pub fn created_clique(&self, node: NodeId) -> Option<CliqueId> {
        self.created.get(&node).copied()
    }

    /// Product of the domain sizes of a clique's variables.
    pub fn clique_weight(&self, id: CliqueId) -> f64 {
        self.cliques.clique(id).map_or(0.0, |c| {
            c.iter()
                .map(|v| self.domain_sizes.get(v).copied().unwrap_or(1) as f64)
                .product()
        })
    }

    /// Lightest clique containing every variable in `vars`; ties go to the
    /// smallest id.
    pub fn clique_containing(&self, vars: &[NodeId]) -> Option<CliqueId> {
        let mut best: Option<(CliqueId, f64)> = None;
        for (id, clique) in self.cliques.cliques() {
            if !vars.iter().all(|v| clique.contains(v)) {
                continue;
            }
            let weight = self.clique_weight(id);
            if best.map_or(true, |(_, w)| weight < w) {
                best = Some((id, weight));
            }
        }
        best.map(|(id, _)| id)
    }

    /// One root per connected component.
    pub fn roots(&self) -> &[CliqueId] {
        &self.roots
    }

    /// Size of the largest clique minus one.
    pub fn treewidth(&self) -> usize {
        self.cliques
            .cliques()
            .map(|(_, c)| c.len().saturating_sub(1))
            .max()
            .unwrap_or(0)
    }

    /// Whether every variable induces a connected subtree.
    pub fn has_running_intersection(&self) -> bool {
        self.cliques.has_running_intersection()
    }

    /// Whether the clique graph has no cycles.
    pub fn is_forest(&self) -> bool {
        self.cliques.is_forest()
    }
}

/// Disjoint sets over clique ids.
struct UnionFind {
    parent: BTreeMap<CliqueId, CliqueId>,
}

impl UnionFind {
    fn new(ids: &[CliqueId]) -> Self {
        Self {
            parent: ids.iter().map(|&i| (i, i)).collect(),
        }
    }

    fn find(&mut self, mut x: CliqueId) -> CliqueId {
        while let Some(&p) = self.parent.get(&x) {
            if p == x {
                break;
            }
            let grandparent = self.parent.get(&p).copied().unwrap_or(p);
            self.parent.insert(x, grandparent);
            x = p;
        }
        x
    }

    /// Merge the sets of `a` and `b`; false if already joined.
    fn union(&mut self, a: CliqueId, b: CliqueId) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        self.parent.insert(ra.max(rb), ra.min(rb));
        true
    }
}
