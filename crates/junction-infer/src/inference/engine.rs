//! Collect/diffuse propagation on a junction tree.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, info_span, trace};

use super::evidence::Evidence;
use super::scheduler::{Scheduler, SchedulerStats, SharedTable};
use crate::config::{InferenceConfig, NumericDomain, PropagationMode};
use crate::error::{PgmError, Result};
use crate::graph::{CliqueId, DomainSizes, NodeId};
use crate::junction_tree::{BinaryJoinTreeConverter, JunctionTree};
use crate::models::GraphicalModel;
use crate::potential::{CombineOp, Potential, ProjectOp};
use crate::triangulation::{Budget, CancellationToken, StaticTriangulation, Triangulation};

/// One directed message between adjacent cliques.
///
/// A task can run once every message into `from`, except the one coming
/// back from `to`, is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageTask {
    /// Sending clique.
    pub from: CliqueId,
    /// Receiving clique.
    pub to: CliqueId,
}

impl MessageTask {
    pub fn new(from: CliqueId, to: CliqueId) -> Self {
        Self { from, to }
    }

    /// The same edge in the other direction.
    pub fn reversed(self) -> Self {
        Self::new(self.to, self.from)
    }
}

/// Exact inference by message passing on a junction tree.
///
/// The tree is built once at construction. Messages are cached per directed
/// edge and survive evidence changes that do not affect them, so
/// re-running [`make_inference`](Self::make_inference) after observing one
/// variable only recomputes the messages flowing away from the clique that
/// holds it.
///
/// # Example
///
/// ```
/// use junction_infer::{BayesNet, Evidence, InferenceConfig, JunctionTreeInference, Variable};
///
/// let mut bn = BayesNet::new();
/// let rain = bn.add_variable(Variable::new("rain", 2).unwrap());
/// let wet = bn.add_variable(Variable::new("wet", 2).unwrap());
/// bn.add_arc(rain, wet).unwrap();
/// bn.set_cpt_values(rain, vec![0.8, 0.2]).unwrap();
/// bn.set_cpt_values(wet, vec![0.9, 0.1, 0.1, 0.9]).unwrap();
///
/// let mut engine = JunctionTreeInference::new(&bn, InferenceConfig::default()).unwrap();
/// engine.add_evidence(wet, Evidence::Hard(1)).unwrap();
/// engine.make_inference().unwrap();
///
/// let p = engine.posterior(rain).unwrap();
/// let expected = 0.2 * 0.9 / (0.8 * 0.1 + 0.2 * 0.9);
/// assert!((p.values()[[1]] - expected).abs() < 1e-12);
/// ```
#[derive(Debug)]
pub struct JunctionTreeInference {
    config: InferenceConfig,
    triangulation: Arc<Triangulation>,
    tree: Arc<JunctionTree>,
    domain_sizes: DomainSizes,
    roots: Vec<CliqueId>,
    scheduler: Scheduler,
    base_tables: BTreeMap<CliqueId, Vec<SharedTable>>,
    evidence: BTreeMap<NodeId, Evidence>,
    evidence_tables: BTreeMap<CliqueId, BTreeMap<NodeId, SharedTable>>,
    messages: Mutex<BTreeMap<(CliqueId, CliqueId), SharedTable>>,
    log_mass: BTreeMap<CliqueId, f64>,
    collected: BTreeSet<CliqueId>,
    diffused: BTreeSet<CliqueId>,
}

impl JunctionTreeInference {
    /// Build the junction tree of `model` and attach its tables.
    pub fn new<M: GraphicalModel>(model: &M, config: InferenceConfig) -> Result<Self> {
        Self::build(model, config, &[], None)
    }

    /// Like [`new`](Self::new), making sure every set in `targets` fits in
    /// one clique so it can be queried with
    /// [`joint_posterior`](Self::joint_posterior).
    pub fn with_joint_targets<M: GraphicalModel>(
        model: &M,
        config: InferenceConfig,
        targets: &[Vec<NodeId>],
    ) -> Result<Self> {
        Self::build(model, config, targets, None)
    }

    /// Full constructor; `cancel` stops a long triangulation early.
    pub fn build<M: GraphicalModel>(
        model: &M,
        config: InferenceConfig,
        targets: &[Vec<NodeId>],
        cancel: Option<CancellationToken>,
    ) -> Result<Self> {
        config.validate()?;
        let domain_sizes = model.domain_sizes();

        let mut graph = model.moral_graph()?;
        for target in targets {
            for (i, &a) in target.iter().enumerate() {
                if !domain_sizes.contains_key(&a) {
                    return Err(PgmError::NodeNotFound(a));
                }
                for &b in &target[i + 1..] {
                    if a != b {
                        graph.add_edge(a, b)?;
                    }
                }
            }
        }

        let mut budget = Budget::unlimited();
        if let Some(limit) = config.max_triangulation_time() {
            budget = budget.with_timeout(limit);
        }
        if let Some(token) = cancel {
            budget = budget.with_cancellation(token);
        }
        let triangulation = StaticTriangulation::new(config.elimination.clone())
            .with_minimality(config.minimality)
            .with_budget(budget)
            .triangulate(&graph, &domain_sizes)?;

        let mut tree = JunctionTree::build(&triangulation, config.junction_tree)?;
        if config.binary_join_tree {
            let roots = tree.roots().to_vec();
            tree = BinaryJoinTreeConverter::new().convert(&tree, &domain_sizes, &roots)?;
        }

        let scheduler = Scheduler::new();
        let mut base_tables: BTreeMap<CliqueId, Vec<SharedTable>> = BTreeMap::new();
        let mut covered: BTreeSet<NodeId> = BTreeSet::new();
        for table in model.tables() {
            covered.extend(table.variables().iter().copied());
            let clique = tree.clique_containing(table.variables()).ok_or_else(|| {
                PgmError::InvalidTable(format!(
                    "no clique holds the table over {:?}",
                    table.variables()
                ))
            })?;
            let table = match config.domain {
                NumericDomain::Linear => table.clone(),
                NumericDomain::Log => table.to_log(),
            };
            base_tables
                .entry(clique)
                .or_default()
                .push(scheduler.register(table));
        }
        // variables no table mentions get a uniform table so their
        // marginals are still defined
        for (&node, &size) in &domain_sizes {
            if covered.contains(&node) {
                continue;
            }
            let clique = tree
                .clique_containing(&[node])
                .ok_or(PgmError::NodeNotFound(node))?;
            let uniform = Potential::filled(vec![node], &[size], 1.0)?;
            let uniform = match config.domain {
                NumericDomain::Linear => uniform,
                NumericDomain::Log => uniform.to_log(),
            };
            base_tables
                .entry(clique)
                .or_default()
                .push(scheduler.register(uniform));
        }

        debug!(
            variables = domain_sizes.len(),
            cliques = tree.size(),
            treewidth = tree.treewidth(),
            degraded = triangulation.is_degraded(),
            "inference engine ready"
        );

        Ok(Self {
            roots: tree.roots().to_vec(),
            config,
            triangulation: Arc::new(triangulation),
            tree: Arc::new(tree),
            domain_sizes,
            scheduler,
            base_tables,
            evidence: BTreeMap::new(),
            evidence_tables: BTreeMap::new(),
            messages: Mutex::new(BTreeMap::new()),
            log_mass: BTreeMap::new(),
            collected: BTreeSet::new(),
            diffused: BTreeSet::new(),
        })
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Junction tree messages are passed over.
    pub fn junction_tree(&self) -> &JunctionTree {
        &self.tree
    }

    /// Shared handle on the (read-only) junction tree.
    pub fn shared_junction_tree(&self) -> Arc<JunctionTree> {
        Arc::clone(&self.tree)
    }

    /// Triangulation the junction tree was built from.
    pub fn triangulation(&self) -> &Triangulation {
        &self.triangulation
    }

    /// One root clique per connected component.
    pub fn roots(&self) -> &[CliqueId] {
        &self.roots
    }

    /// Current observations by node.
    pub fn evidence(&self) -> &BTreeMap<NodeId, Evidence> {
        &self.evidence
    }

    /// Counters of the current run.
    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    fn combine_op(&self) -> CombineOp {
        match self.config.domain {
            NumericDomain::Linear => CombineOp::Product,
            NumericDomain::Log => CombineOp::Sum,
        }
    }

    fn project_op(&self) -> ProjectOp {
        match (self.config.mode, self.config.domain) {
            (PropagationMode::MaxProduct, _) => ProjectOp::Max,
            (PropagationMode::SumProduct, NumericDomain::Linear) => ProjectOp::Sum,
            (PropagationMode::SumProduct, NumericDomain::Log) => ProjectOp::LogSumExp,
        }
    }

    fn domain_size(&self, node: NodeId) -> Result<usize> {
        self.domain_sizes
            .get(&node)
            .copied()
            .ok_or(PgmError::NodeNotFound(node))
    }

    // ---- evidence -------------------------------------------------------

    /// Observe `node`. Fails if it already has evidence.
    pub fn add_evidence(&mut self, node: NodeId, evidence: Evidence) -> Result<()> {
        self.domain_size(node)?;
        if self.evidence.contains_key(&node) {
            return Err(PgmError::OperationNotAllowed(format!(
                "node {} already has evidence; use change_evidence",
                node
            )));
        }
        self.set_evidence(node, evidence)
    }

    /// Replace the evidence on `node`. Fails if it has none.
    pub fn change_evidence(&mut self, node: NodeId, evidence: Evidence) -> Result<()> {
        self.domain_size(node)?;
        if !self.evidence.contains_key(&node) {
            return Err(PgmError::OperationNotAllowed(format!(
                "node {} has no evidence to change",
                node
            )));
        }
        self.set_evidence(node, evidence)
    }

    fn set_evidence(&mut self, node: NodeId, evidence: Evidence) -> Result<()> {
        let likelihood = evidence.likelihood(node, self.domain_size(node)?)?;
        let likelihood = match self.config.domain {
            NumericDomain::Linear => likelihood,
            NumericDomain::Log => likelihood.to_log(),
        };
        let clique = self
            .tree
            .clique_containing(&[node])
            .ok_or(PgmError::NodeNotFound(node))?;
        let table = self.scheduler.register(likelihood);
        self.evidence_tables
            .entry(clique)
            .or_default()
            .insert(node, table);
        self.evidence.insert(node, evidence);
        self.invalidate_from(clique);
        Ok(())
    }

    /// Drop the evidence on `node`, if any.
    pub fn erase_evidence(&mut self, node: NodeId) -> Result<()> {
        self.domain_size(node)?;
        if self.evidence.remove(&node).is_none() {
            return Ok(());
        }
        let holder = self
            .evidence_tables
            .iter_mut()
            .find_map(|(&c, tables)| tables.remove(&node).map(|_| c));
        if let Some(clique) = holder {
            self.invalidate_from(clique);
        }
        Ok(())
    }

    /// Drop every observation and invalidate the messages that depended
    /// on them.
    pub fn erase_all_evidence(&mut self) {
        let evidence = std::mem::take(&mut self.evidence);
        let cliques: Vec<CliqueId> = self
            .evidence_tables
            .iter()
            .filter(|(_, tables)| !tables.is_empty())
            .map(|(&c, _)| c)
            .collect();
        self.evidence_tables.clear();
        for clique in cliques {
            self.invalidate_from(clique);
        }
        trace!(erased = evidence.len(), "evidence cleared");
    }

    /// Forget every message directed away from `clique`.
    fn invalidate_from(&mut self, clique: CliqueId) {
        let messages = self.messages.get_mut();
        let mut stack: Vec<(CliqueId, Option<CliqueId>)> = vec![(clique, None)];
        let mut dropped = 0;
        while let Some((node, parent)) = stack.pop() {
            for next in self.tree.neighbours(node) {
                if Some(next) == parent {
                    continue;
                }
                if messages.remove(&(node, next)).is_some() {
                    dropped += 1;
                }
                stack.push((next, Some(node)));
            }
        }
        self.collected.clear();
        self.diffused.clear();
        trace!(clique, dropped, "messages invalidated");
    }

    // ---- propagation ----------------------------------------------------

    /// Run collect and diffuse from every root. Does nothing if the engine
    /// is already propagated.
    pub fn make_inference(&mut self) -> Result<()> {
        if self.is_propagated() {
            return Ok(());
        }
        let span = info_span!(
            "make_inference",
            cliques = self.tree.size(),
            evidence = self.evidence.len()
        );
        let _enter = span.enter();

        let roots = self.roots.clone();
        for &root in &roots {
            self.collect(root)?;
        }
        for &root in &roots {
            self.diffuse(root)?;
        }
        let stats = self.stats();
        debug!(
            messages = stats.messages_computed,
            operations = stats.operations_executed,
            memo_hits = stats.memo_hits,
            "propagation done"
        );
        Ok(())
    }

    /// True once every component has been collected and diffused.
    pub fn is_propagated(&self) -> bool {
        self.roots.iter().all(|r| self.diffused.contains(r))
    }

    fn check_root(&self, root: CliqueId) -> Result<()> {
        if self.roots.contains(&root) {
            Ok(())
        } else {
            Err(PgmError::InvalidRoots(format!(
                "clique {} is not a root of this engine",
                root
            )))
        }
    }

    /// Collect every message towards `root` and record the component's
    /// probability mass.
    pub fn collect(&mut self, root: CliqueId) -> Result<()> {
        self.check_root(root)?;
        if self.collected.is_empty() {
            self.scheduler.begin_run();
        }
        let neighbours: Vec<CliqueId> = self.tree.neighbours(root).collect();
        self.for_each_child(&neighbours, |&n| self.collect_towards(n, root))?;

        let belief = self.belief(root)?;
        let vars = belief.table().variables().to_vec();
        let total = self.scheduler.project(&belief, &vars, self.project_op())?;
        let mass = total.table().scalar_value().unwrap_or(f64::NAN);
        let log_mass = match self.config.domain {
            NumericDomain::Linear => mass.ln(),
            NumericDomain::Log => mass,
        };
        if log_mass.is_nan() || log_mass == f64::NEG_INFINITY {
            self.log_mass.remove(&root);
            return Err(PgmError::IncompatibleEvidence(format!(
                "the evidence has probability zero in the component rooted at clique {}",
                root
            )));
        }
        trace!(root, log_mass, "collected");
        self.log_mass.insert(root, log_mass);
        self.collected.insert(root);
        Ok(())
    }

    /// Push messages from `root` down to every clique of its component.
    pub fn diffuse(&mut self, root: CliqueId) -> Result<()> {
        self.check_root(root)?;
        if !self.collected.contains(&root) {
            return Err(PgmError::OperationNotAllowed(format!(
                "diffuse from clique {} before collecting it",
                root
            )));
        }
        self.diffuse_from(root, None)?;
        self.diffused.insert(root);
        Ok(())
    }

    fn for_each_child<F>(&self, children: &[CliqueId], f: F) -> Result<()>
    where
        F: Fn(&CliqueId) -> Result<()> + Send + Sync,
    {
        if self.config.parallel && children.len() > 1 {
            children.par_iter().try_for_each(f)
        } else {
            children.iter().try_for_each(f)
        }
    }

    /// Make sure `node -> parent` is available. A cached message implies the
    /// whole subtree behind it is up to date.
    fn collect_towards(&self, node: CliqueId, parent: CliqueId) -> Result<()> {
        let task = MessageTask::new(node, parent);
        if self.has_message(task) {
            return Ok(());
        }
        let children: Vec<CliqueId> = self.tree.neighbours(node).filter(|&n| n != parent).collect();
        self.for_each_child(&children, |&child| self.collect_towards(child, node))?;
        self.compute_message(task)
    }

    fn diffuse_from(&self, node: CliqueId, parent: Option<CliqueId>) -> Result<()> {
        let children: Vec<CliqueId> = self
            .tree
            .neighbours(node)
            .filter(|&n| Some(n) != parent)
            .collect();
        self.for_each_child(&children, |&child| {
            let task = MessageTask::new(node, child);
            if !self.has_message(task) {
                self.compute_message(task)?;
            }
            self.diffuse_from(child, Some(node))
        })
    }

    fn message(&self, from: CliqueId, to: CliqueId) -> Option<SharedTable> {
        self.messages.lock().get(&(from, to)).cloned()
    }

    /// Product of a clique's own tables and its evidence.
    fn local_table(&self, clique: CliqueId) -> Result<SharedTable> {
        let mut inputs: Vec<SharedTable> = self
            .base_tables
            .get(&clique)
            .map(|t| t.to_vec())
            .unwrap_or_default();
        if let Some(evidence) = self.evidence_tables.get(&clique) {
            inputs.extend(evidence.values().cloned());
        }
        self.scheduler.combine(&inputs, self.combine_op())
    }

    /// Local table combined with the messages from every neighbour except
    /// `skip`, in ascending source order.
    fn combined_with_messages(&self, clique: CliqueId, skip: Option<CliqueId>) -> Result<SharedTable> {
        let mut inputs = vec![self.local_table(clique)?];
        for n in self.tree.neighbours(clique) {
            if Some(n) == skip {
                continue;
            }
            let message = self.message(n, clique).ok_or_else(|| {
                PgmError::OperationNotAllowed(format!("message {} -> {} is missing", n, clique))
            })?;
            inputs.push(message);
        }
        self.scheduler.combine(&inputs, self.combine_op())
    }

    /// True when the message of `task` is cached and up to date.
    pub fn has_message(&self, task: MessageTask) -> bool {
        self.message(task.from, task.to).is_some()
    }

    /// Compute and cache one message. Fails with `OperationNotAllowed` if an
    /// input message is missing, so callers driving their own schedule
    /// must respect the tree order.
    pub fn compute_message(&self, task: MessageTask) -> Result<()> {
        let MessageTask { from, to } = task;
        if !self.tree.neighbours(from).any(|n| n == to) {
            return Err(PgmError::OperationNotAllowed(format!(
                "cliques {} and {} are not adjacent",
                from, to
            )));
        }
        let separator = self.tree.separator(from, to)?;
        let removed: Vec<NodeId> = self
            .tree
            .clique(from)
            .ok_or(PgmError::NodeNotFound(from))?
            .difference(&separator)
            .copied()
            .collect();
        let combined = self.combined_with_messages(from, Some(to))?;
        let message = self.scheduler.project(&combined, &removed, self.project_op())?;
        trace!(from, to, table = %message.id(), "message sent");
        self.scheduler.note_message();
        self.messages.lock().insert((from, to), message);
        Ok(())
    }

    /// Unnormalized joint over a clique: local table times every incoming
    /// message.
    fn belief(&self, clique: CliqueId) -> Result<SharedTable> {
        self.combined_with_messages(clique, None)
    }

    // ---- queries --------------------------------------------------------

    fn ensure_propagated(&self) -> Result<()> {
        if self.is_propagated() {
            Ok(())
        } else {
            Err(PgmError::OperationNotAllowed(
                "run make_inference (or collect and diffuse) before querying".to_string(),
            ))
        }
    }

    /// Back to a normalized linear-domain table.
    fn finish(&self, table: &Potential) -> Potential {
        let mut out = match self.config.domain {
            NumericDomain::Linear => table.clone(),
            NumericDomain::Log => table.to_linear(),
        };
        out.normalize();
        out
    }

    fn marginal_over(&self, clique: CliqueId, keep: &[NodeId]) -> Result<Potential> {
        let belief = self.belief(clique)?;
        let removed: Vec<NodeId> = belief
            .table()
            .variables()
            .iter()
            .copied()
            .filter(|v| !keep.contains(v))
            .collect();
        let marginal = self.scheduler.project(&belief, &removed, self.project_op())?;
        let ordered = marginal.table().reorder(keep)?;
        Ok(self.finish(&ordered))
    }

    /// Normalized posterior of one variable. In max-product mode this is
    /// the normalized max-marginal.
    pub fn posterior(&self, node: NodeId) -> Result<Potential> {
        self.domain_size(node)?;
        self.ensure_propagated()?;
        let clique = self
            .tree
            .clique_containing(&[node])
            .ok_or(PgmError::NodeNotFound(node))?;
        self.marginal_over(clique, &[node])
    }

    /// Normalized joint posterior of `nodes`, with axes in the given order.
    /// The set must lie inside one clique.
    pub fn joint_posterior(&self, nodes: &[NodeId]) -> Result<Potential> {
        let mut keep: Vec<NodeId> = Vec::with_capacity(nodes.len());
        for &node in nodes {
            self.domain_size(node)?;
            if !keep.contains(&node) {
                keep.push(node);
            }
        }
        self.ensure_propagated()?;
        let clique = self
            .tree
            .clique_containing(&keep)
            .ok_or_else(|| PgmError::NotInClique(keep.clone()))?;
        self.marginal_over(clique, &keep)
    }

    /// Normalized joint posterior over every variable of a clique.
    pub fn clique_posterior(&self, clique: CliqueId) -> Result<Potential> {
        let vars: Vec<NodeId> = self
            .tree
            .clique(clique)
            .ok_or(PgmError::NodeNotFound(clique))?
            .iter()
            .copied()
            .collect();
        self.ensure_propagated()?;
        self.marginal_over(clique, &vars)
    }

    /// ln P(evidence), summed over the components.
    pub fn log_evidence_probability(&self) -> Result<f64> {
        self.ensure_propagated()?;
        if self.config.mode == PropagationMode::MaxProduct {
            return Err(PgmError::OperationNotAllowed(
                "max-product propagation does not compute the evidence probability".to_string(),
            ));
        }
        Ok(self.roots.iter().filter_map(|r| self.log_mass.get(r)).sum())
    }

    /// P(evidence): the product of the root masses of all components.
    pub fn evidence_probability(&self) -> Result<f64> {
        Ok(self.log_evidence_probability()?.exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BayesNet;
    use crate::variable::Variable;
    use approx::assert_abs_diff_eq;

    /// a -> b -> c -> d, all binary.
    fn chain() -> (BayesNet, Vec<NodeId>) {
        let mut bn = BayesNet::new();
        let ids: Vec<NodeId> = ["a", "b", "c", "d"]
            .iter()
            .map(|n| bn.add_variable(Variable::new(*n, 2).unwrap()))
            .collect();
        for w in ids.windows(2) {
            bn.add_arc(w[0], w[1]).unwrap();
        }
        bn.set_cpt_values(ids[0], vec![0.3, 0.7]).unwrap();
        bn.set_cpt_values(ids[1], vec![0.9, 0.1, 0.2, 0.8]).unwrap();
        bn.set_cpt_values(ids[2], vec![0.6, 0.4, 0.5, 0.5]).unwrap();
        bn.set_cpt_values(ids[3], vec![0.7, 0.3, 0.1, 0.9]).unwrap();
        (bn, ids)
    }

    #[test]
    fn test_chain_marginals() {
        let (bn, ids) = chain();
        let mut engine = JunctionTreeInference::new(&bn, InferenceConfig::default()).unwrap();
        assert_eq!(engine.junction_tree().size(), 3);
        engine.make_inference().unwrap();

        let pb = engine.posterior(ids[1]).unwrap();
        assert_abs_diff_eq!(pb.values()[[0]], 0.41, epsilon = 1e-12);
        let pc = engine.posterior(ids[2]).unwrap();
        assert_abs_diff_eq!(pc.values()[[0]], 0.541, epsilon = 1e-12);
        assert_abs_diff_eq!(engine.evidence_probability().unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(engine.stats().messages_computed, 4);
    }

    #[test]
    fn test_evidence_on_leaf_recomputes_two_messages() {
        let (bn, ids) = chain();
        let mut engine = JunctionTreeInference::new(&bn, InferenceConfig::default()).unwrap();
        engine.make_inference().unwrap();

        engine.add_evidence(ids[3], Evidence::Hard(0)).unwrap();
        assert!(!engine.is_propagated());
        engine.make_inference().unwrap();
        assert_eq!(engine.stats().messages_computed, 2);

        // P(c=0 | d=0) = 0.541 * 0.7 / P(d=0)
        let pd0 = 0.541 * 0.7 + 0.459 * 0.1;
        let pc = engine.posterior(ids[2]).unwrap();
        assert_abs_diff_eq!(pc.values()[[0]], 0.541 * 0.7 / pd0, epsilon = 1e-12);
        assert_abs_diff_eq!(engine.evidence_probability().unwrap(), pd0, epsilon = 1e-12);
    }

    #[test]
    fn test_manual_message_schedule() {
        let (bn, _) = chain();
        let engine = JunctionTreeInference::new(&bn, InferenceConfig::default()).unwrap();
        let tree = engine.junction_tree();
        let leaf = tree
            .clique_ids()
            .find(|&c| tree.neighbours(c).count() == 1)
            .unwrap();
        let middle = tree.neighbours(leaf).next().unwrap();
        let far = tree.neighbours(middle).find(|&c| c != leaf).unwrap();

        // middle -> leaf needs far -> middle first
        let inward = MessageTask::new(middle, leaf);
        assert!(matches!(
            engine.compute_message(inward),
            Err(PgmError::OperationNotAllowed(_))
        ));
        engine.compute_message(MessageTask::new(far, middle)).unwrap();
        engine.compute_message(inward).unwrap();
        assert!(engine.has_message(inward));
        assert!(!engine.has_message(inward.reversed()));
        assert!(engine.compute_message(MessageTask::new(leaf, far)).is_err());
    }

    #[test]
    fn test_make_inference_is_idempotent() {
        let (bn, ids) = chain();
        let mut engine = JunctionTreeInference::new(&bn, InferenceConfig::default()).unwrap();
        engine.make_inference().unwrap();
        let before = engine.posterior(ids[0]).unwrap();
        let stats = engine.stats();
        engine.make_inference().unwrap();
        assert_eq!(engine.stats(), stats);
        assert_eq!(engine.posterior(ids[0]).unwrap(), before);
    }

    #[test]
    fn test_queries_before_propagation_fail() {
        let (bn, ids) = chain();
        let mut engine = JunctionTreeInference::new(&bn, InferenceConfig::default()).unwrap();
        assert!(matches!(
            engine.posterior(ids[0]),
            Err(PgmError::OperationNotAllowed(_))
        ));
        assert!(matches!(engine.posterior(42), Err(PgmError::NodeNotFound(42))));
        let root = engine.roots()[0];
        assert!(engine.diffuse(root).is_err());
        engine.collect(root).unwrap();
        engine.diffuse(root).unwrap();
        assert!(engine.is_propagated());
        engine.posterior(ids[0]).unwrap();
    }

    #[test]
    fn test_evidence_bookkeeping() {
        let (bn, ids) = chain();
        let mut engine = JunctionTreeInference::new(&bn, InferenceConfig::default()).unwrap();
        assert!(engine.change_evidence(ids[0], Evidence::Hard(1)).is_err());
        engine.add_evidence(ids[0], Evidence::Hard(1)).unwrap();
        assert!(engine.add_evidence(ids[0], Evidence::Hard(0)).is_err());
        engine.change_evidence(ids[0], Evidence::Hard(0)).unwrap();
        assert!(engine.add_evidence(ids[1], Evidence::Hard(5)).is_err());

        engine.make_inference().unwrap();
        assert_abs_diff_eq!(engine.posterior(ids[0]).unwrap().values()[[0]], 1.0);

        engine.erase_all_evidence();
        assert!(engine.evidence().is_empty());
        engine.make_inference().unwrap();
        assert_abs_diff_eq!(
            engine.posterior(ids[0]).unwrap().values()[[0]],
            0.3,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_erase_all_evidence_invalidates_only_when_needed() {
        let (bn, ids) = chain();
        let mut engine = JunctionTreeInference::new(&bn, InferenceConfig::default()).unwrap();
        engine.make_inference().unwrap();
        engine.erase_all_evidence();
        assert!(engine.is_propagated());

        engine.add_evidence(ids[1], Evidence::Hard(1)).unwrap();
        engine.add_evidence(ids[3], Evidence::Soft(vec![0.5, 2.0])).unwrap();
        engine.make_inference().unwrap();
        engine.erase_all_evidence();
        assert!(!engine.is_propagated());
        engine.make_inference().unwrap();
        assert_abs_diff_eq!(engine.posterior(ids[1]).unwrap().values()[[0]], 0.41, epsilon = 1e-12);
        assert_abs_diff_eq!(engine.evidence_probability().unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_probability_evidence() {
        let mut bn = BayesNet::new();
        let a = bn.add_variable(Variable::new("a", 2).unwrap());
        let b = bn.add_variable(Variable::new("b", 2).unwrap());
        bn.add_arc(a, b).unwrap();
        bn.set_cpt_values(a, vec![0.5, 0.5]).unwrap();
        bn.set_cpt_values(b, vec![1.0, 0.0, 0.0, 1.0]).unwrap();

        let mut engine = JunctionTreeInference::new(&bn, InferenceConfig::default()).unwrap();
        engine.add_evidence(a, Evidence::Hard(0)).unwrap();
        engine.add_evidence(b, Evidence::Hard(1)).unwrap();
        assert!(matches!(
            engine.make_inference(),
            Err(PgmError::IncompatibleEvidence(_))
        ));

        engine.change_evidence(b, Evidence::Hard(0)).unwrap();
        engine.make_inference().unwrap();
        assert_abs_diff_eq!(engine.evidence_probability().unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_unmentioned_variable_is_uniform() {
        let mut mn = crate::models::MarkovNet::new();
        let x = mn.add_variable(Variable::new("x", 2).unwrap());
        let y = mn.add_variable(Variable::new("y", 3).unwrap());
        mn.add_factor(Potential::from_vec(vec![x], &[2], vec![1.0, 3.0]).unwrap())
            .unwrap();

        let mut engine = JunctionTreeInference::new(&mn, InferenceConfig::default()).unwrap();
        engine.make_inference().unwrap();
        assert_abs_diff_eq!(engine.posterior(x).unwrap().values()[[1]], 0.75, epsilon = 1e-12);
        let py = engine.posterior(y).unwrap();
        for v in py.values().iter() {
            assert_abs_diff_eq!(*v, 1.0 / 3.0, epsilon = 1e-12);
        }
    }
}
