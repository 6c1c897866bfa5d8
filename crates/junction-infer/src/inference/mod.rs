//! Exact inference on junction trees.
//!
//! # Architecture
//!
//! ```text
//! model ─► moral graph ─► triangulation ─► junction tree ─► (binary tree)
//!                                                              │
//!                tables + evidence ─► cliques ─► collect ─► diffuse ─► posteriors
//! ```
//!
//! Every table operation goes through a [`Scheduler`] that memoizes
//! combinations and projections for the duration of a run. Messages are
//! kept between runs and only those downstream of changed evidence are
//! recomputed.

mod engine;
mod evidence;
mod scheduler;

pub use engine::{JunctionTreeInference, MessageTask};
pub use evidence::Evidence;
pub use scheduler::{OperationKey, Scheduler, SchedulerStats, SharedTable, TableId};
