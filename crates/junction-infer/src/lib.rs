//! Exact inference in discrete graphical models with junction trees.
//!
//! The crate covers the whole pipeline from a model to posteriors:
//!
//! - **Graphs**: undirected graphs, DAGs with moralization, clique graphs
//! - **Potentials**: dense tables with combination and projection
//! - **Elimination**: min-fill, min-degree, weighted and fixed orders
//! - **Triangulation**: static and incremental, with optional minimality
//! - **Junction trees**: max-spanning-tree and elimination-tree builders,
//!   binary join tree conversion
//! - **Inference**: collect/diffuse propagation with memoized operations
//!   and incremental evidence updates
//!
//! # Architecture
//!
//! ```text
//! BayesNet / MarkovNet
//!        │ moral_graph()
//!        ▼
//!   UndiGraph ── EliminationSequenceStrategy ──► Triangulation
//!                                                    │
//!                                                    ▼
//!                                              JunctionTree ──► JunctionTreeInference
//! ```

pub mod config;
pub mod elimination;
pub mod error;
pub mod graph;
pub mod inference;
pub mod junction_tree;
pub mod models;
pub mod potential;
pub mod triangulation;
pub mod variable;

pub use config::{InferenceConfig, NumericDomain, PropagationMode};
pub use elimination::{EliminationHeuristic, EliminationSequenceStrategy};
pub use error::{PgmError, Result};
pub use graph::{CliqueGraph, CliqueId, Dag, DomainSizes, Edge, NodeId, UndiGraph};
pub use inference::{Evidence, JunctionTreeInference, MessageTask, SchedulerStats};
pub use junction_tree::{BinaryJoinTreeConverter, JunctionTree, JunctionTreeStrategy};
pub use models::{BayesNet, GraphicalModel, MarkovNet};
pub use potential::{CombineOp, Potential, ProjectOp};
pub use triangulation::{
    Budget, CancellationToken, GraphDelta, StaticTriangulation, Triangulation, Triangulator,
};
pub use variable::Variable;
