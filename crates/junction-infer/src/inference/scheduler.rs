//! Memoizing executor for table operations.
//!
//! Every table taking part in inference gets a [`TableId`]. An operation is
//! identified by its kind, operator and input ids, so two requests for the
//! same combination or projection within one run share one result:
//!
//! ```text
//! combine(Product, {#3, #7})      -> #12   computed
//! combine(Product, {#7, #3})      -> #12   memo hit
//! project(Sum, #12, remove [4])   -> #13   computed
//! ```
//!
//! Concurrent requests for the same key wait on a per-key slot, so an
//! operation is computed at most once even under parallel propagation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::graph::NodeId;
use crate::potential::{CombineOp, Potential, ProjectOp};

/// Identity of a table inside a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u64);

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reference-counted table with its scheduler identity.
#[derive(Debug, Clone)]
pub struct SharedTable {
    id: TableId,
    table: Arc<Potential>,
}

impl SharedTable {
    /// Id used in operation keys.
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Borrow the underlying potential.
    pub fn table(&self) -> &Potential {
        &self.table
    }

    /// Another handle on the same potential.
    pub fn shared(&self) -> Arc<Potential> {
        Arc::clone(&self.table)
    }
}

/// Signature of a table operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationKey {
    /// Input ids are sorted, so the key ignores argument order.
    Combine { op: CombineOp, inputs: Vec<TableId> },
    /// Removed variables are sorted.
    Project {
        op: ProjectOp,
        input: TableId,
        removed: Vec<NodeId>,
    },
}

impl OperationKey {
    /// Key for combining `inputs` with `op`.
    pub fn combine(op: CombineOp, inputs: &[SharedTable]) -> Self {
        let mut ids: Vec<TableId> = inputs.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        OperationKey::Combine { op, inputs: ids }
    }

    /// Key for projecting `removed` out of `input` with `op`.
    pub fn project(op: ProjectOp, input: &SharedTable, removed: &[NodeId]) -> Self {
        let mut removed = removed.to_vec();
        removed.sort_unstable();
        removed.dedup();
        OperationKey::Project {
            op,
            input: input.id,
            removed,
        }
    }
}

/// Counters reported by [`Scheduler::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Combine/project operations actually computed.
    pub operations_executed: usize,
    /// Requests answered from the memo table.
    pub memo_hits: usize,
    /// Messages sent between cliques.
    pub messages_computed: usize,
}

type Slot = Arc<Mutex<Option<SharedTable>>>;

/// Allocates table ids and memoizes operations for the current run.
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: AtomicU64,
    memo: Mutex<HashMap<OperationKey, Slot>>,
    operations: AtomicUsize,
    hits: AtomicUsize,
    messages: AtomicUsize,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `table` a fresh id.
    pub fn register(&self, table: Potential) -> SharedTable {
        SharedTable {
            id: TableId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            table: Arc::new(table),
        }
    }

    /// Start a new run: forget memoized results and reset the counters.
    /// Registered tables keep their ids.
    pub fn begin_run(&self) {
        self.memo.lock().clear();
        self.operations.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.messages.store(0, Ordering::Relaxed);
    }

    /// Number of memoized operations.
    pub fn memo_len(&self) -> usize {
        self.memo.lock().len()
    }

    /// Combine `inputs`; a single input is returned as is.
    pub fn combine(&self, inputs: &[SharedTable], op: CombineOp) -> Result<SharedTable> {
        if let [single] = inputs {
            return Ok(single.clone());
        }
        self.memoize(OperationKey::combine(op, inputs), || {
            let tables: Vec<&Potential> = inputs.iter().map(|t| t.table()).collect();
            Potential::combine_all(&tables, op)
        })
    }

    /// Remove `removed` from `input`; variables not in the table are ignored.
    pub fn project(&self, input: &SharedTable, removed: &[NodeId], op: ProjectOp) -> Result<SharedTable> {
        let present: Vec<NodeId> = removed
            .iter()
            .copied()
            .filter(|&v| input.table().contains(v))
            .collect();
        if present.is_empty() {
            return Ok(input.clone());
        }
        self.memoize(OperationKey::project(op, input, &present), || {
            input.table().project(&present, op)
        })
    }

    /// Run `compute` unless `key` already has a result in this run.
    pub fn memoize<F>(&self, key: OperationKey, compute: F) -> Result<SharedTable>
    where
        F: FnOnce() -> Result<Potential>,
    {
        let slot = Arc::clone(self.memo.lock().entry(key).or_default());
        let mut guard = slot.lock();
        if let Some(table) = guard.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(table.clone());
        }
        let table = self.register(compute()?);
        self.operations.fetch_add(1, Ordering::Relaxed);
        *guard = Some(table.clone());
        Ok(table)
    }

    pub(crate) fn note_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Counters accumulated since construction.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            operations_executed: self.operations.load(Ordering::Relaxed),
            memo_hits: self.hits.load(Ordering::Relaxed),
            messages_computed: self.messages.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    fn tables(s: &Scheduler) -> (SharedTable, SharedTable) {
        let a = Potential::from_vec(vec![0], &[2], vec![0.4, 0.6]).unwrap();
        let b = Potential::from_vec(vec![0, 1], &[2, 2], vec![0.9, 0.1, 0.3, 0.7]).unwrap();
        (s.register(a), s.register(b))
    }

    #[test]
    fn test_combine_is_memoized_regardless_of_order() {
        let s = Scheduler::new();
        let (a, b) = tables(&s);
        let ab = s.combine(&[a.clone(), b.clone()], CombineOp::Product).unwrap();
        let ba = s.combine(&[b, a], CombineOp::Product).unwrap();
        assert_eq!(ab.id(), ba.id());
        assert_eq!(s.stats().operations_executed, 1);
        assert_eq!(s.stats().memo_hits, 1);
    }

    #[test]
    fn test_projection_key_and_shortcuts() {
        let s = Scheduler::new();
        let (a, b) = tables(&s);
        let m1 = s.project(&b, &[0, 9], ProjectOp::Sum).unwrap();
        let m2 = s.project(&b, &[0], ProjectOp::Sum).unwrap();
        assert_eq!(m1.id(), m2.id());
        let m3 = s.project(&b, &[0], ProjectOp::Max).unwrap();
        assert_ne!(m1.id(), m3.id());

        // nothing to remove, single input: no work
        assert_eq!(s.project(&a, &[7], ProjectOp::Sum).unwrap().id(), a.id());
        assert_eq!(s.combine(&[a.clone()], CombineOp::Product).unwrap().id(), a.id());
        assert_eq!(s.stats().operations_executed, 2);
    }

    #[test]
    fn test_begin_run_clears_memo() {
        let s = Scheduler::new();
        let (a, b) = tables(&s);
        let first = s.combine(&[a.clone(), b.clone()], CombineOp::Product).unwrap();
        s.begin_run();
        assert_eq!(s.memo_len(), 0);
        let second = s.combine(&[a, b], CombineOp::Product).unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(s.stats().operations_executed, 1);
    }

    #[test]
    fn test_concurrent_requests_compute_once() {
        let s = Scheduler::new();
        let (a, b) = tables(&s);
        let ids: Vec<TableId> = (0..64)
            .into_par_iter()
            .map(|_| {
                s.combine(&[a.clone(), b.clone()], CombineOp::Product)
                    .unwrap()
                    .id()
            })
            .collect();
        assert!(ids.iter().all(|&id| id == ids[0]));
        assert_eq!(s.stats().operations_executed, 1);
        assert_eq!(s.stats().memo_hits, 63);
    }
}
