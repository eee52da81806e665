//! Error types for the two public surfaces: the graph store and the observable
//! operation.

use gql_cache_ast::MissingFragmentError;

/// Failure modes of [`crate::Store::write`], [`crate::Store::read`], and watch
/// dispatch.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A read could not be completed because a value the selection set expects
    /// is not present in the graph. Caller-recoverable: [`crate::ObservableOperation::maybe_execute`]
    /// uses this to decide whether to fall back to a full execution.
    #[error("No {what} found for field '{field}'.")]
    PartialRead { field: String, what: PartialReadKind },

    /// The input `data` object did not match the shape implied by the selection
    /// set (e.g. a scalar selection received an object, or vice versa).
    #[error("Shape mismatch for field '{field}': {detail}")]
    WriteShape { field: String, detail: String },

    /// A fragment spread named a fragment absent from the supplied fragment map.
    #[error(transparent)]
    MissingFragment(#[from] MissingFragmentError),
}

impl GraphError {
    /// A proper method standing in for a duck-typed `_partialRead === true`
    /// flag (§7): lets `ObservableOperation::maybe_execute` tell a recoverable
    /// cache miss apart from every other store failure.
    pub fn is_partial_read(&self) -> bool {
        matches!(self, GraphError::PartialRead { .. })
    }
}

/// Whether a [`GraphError::PartialRead`] was raised by a missing scalar or a
/// missing reference; only affects the rendered message (§4.B `read`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialReadKind {
    Scalar,
    Reference,
}

impl std::fmt::Display for PartialReadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartialReadKind::Scalar => write!(f, "scalar value"),
            PartialReadKind::Reference => write!(f, "graph reference"),
        }
    }
}

/// Failure modes of [`crate::ObservableOperation`]'s public methods.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("Cannot start a new execution when another execution is currently running.")]
    AlreadyExecuting,

    #[error("Mutations may not be observed.")]
    MutationNotObservable,

    /// The one case (`maybe_execute`) where a non-partial-read store error must
    /// propagate rather than be consumed.
    #[error(transparent)]
    Store(#[from] GraphError),
}
