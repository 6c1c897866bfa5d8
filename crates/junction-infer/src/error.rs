//! Error types for triangulation, junction-tree and inference operations.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors that can occur while building or querying a junction tree.
#[derive(Error, Debug)]
pub enum PgmError {
    /// A node id is not part of the graph or model.
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    /// A node id was inserted twice.
    #[error("Node {0} already exists")]
    DuplicateNode(NodeId),

    /// Two tables disagree on the domain size of a shared variable.
    #[error("Domain mismatch for variable {var}: {left} vs {right}")]
    DomainMismatch {
        var: NodeId,
        left: usize,
        right: usize,
    },

    /// Inserting this arc would close a directed cycle.
    #[error("Arc {from} -> {to} would create a directed cycle")]
    CyclicArc { from: NodeId, to: NodeId },

    /// The root set handed to the binary join-tree converter is invalid.
    #[error("Invalid roots: {0}")]
    InvalidRoots(String),

    /// A table was built with inconsistent variables or values.
    #[error("Invalid table: {0}")]
    InvalidTable(String),

    /// Evidence does not match the variable's domain.
    #[error("Invalid evidence on node {node}: {reason}")]
    InvalidEvidence { node: NodeId, reason: String },

    /// A joint query spans variables that no single clique contains.
    #[error("No clique contains all of {0:?}")]
    NotInClique(Vec<NodeId>),

    /// The call is not allowed in the current state.
    #[error("Operation not allowed: {0}")]
    OperationNotAllowed(String),

    /// The evidence has probability zero under the model.
    #[error("Incompatible evidence: {0}")]
    IncompatibleEvidence(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Result type for junction-tree operations.
pub type Result<T> = std::result::Result<T, PgmError>;
