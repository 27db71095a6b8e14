//! Error types for variable universes, parameter registries and DAGs.

use thiserror::Error;

/// Misuse of a registry, a variable universe or a DAG.
///
/// These are configuration bugs on the caller's side; nothing in the
/// learning code tries to recover from them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VarsError {
    /// A variable with the same name already exists in the registry.
    #[error("variable list contains duplicated names: {0}")]
    DuplicateName(String),

    /// Name lookup failed.
    #[error("variable {0} is not part of the list of variables")]
    UnknownName(String),

    /// Id lookup outside `[base, base + len)`.
    #[error("variable id {id} is out of range (base {base}, {len} variables)")]
    OutOfRange {
        /// requested id
        id: usize,
        /// first id owned by the registry
        base: usize,
        /// number of variables in the registry
        len: usize,
    },

    /// Creation attempted after `block()`.
    #[error("registry is blocked; cannot create parameter variable {0}")]
    RegistrySealed(String),

    /// A structure strategy was given a variable id that does not exist.
    #[error("unknown variable id {0}")]
    UnknownVariable(usize),

    /// Self-parent or duplicated parent edge.
    #[error("invalid edge {parent} -> {child}")]
    InvalidEdge {
        /// parent variable name
        parent: String,
        /// child variable name
        child: String,
    },
}
