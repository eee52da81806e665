//! A reactive, normalized cache for GraphQL operation results.
//!
//! [`Store`] holds a content-addressed entity graph and exposes `write`/`read`/
//! `watch`. [`ObservableOperation`] layers a per-operation state machine on top,
//! combining a user-supplied [`Executor`] with a live store watch into a single
//! stream of [`OperationState`] values.

pub mod error;
pub mod observable;
pub mod operation;
pub mod response;
pub mod scheduler;
pub mod store;

pub use error::{GraphError, OperationError, PartialReadKind};
pub use observable::{Observable, Observer, Subscription};
pub use operation::{
    ExecutorError, ExecutorRequest, ExecutorResult, NewOperationParams, ObservableOperation, OperationObserver,
    OperationState,
};
pub use response::{ErrorLocation, GraphQLError, JsonMap, JsonValue, ResponseDataPathSegment};
pub use scheduler::{DeterministicScheduler, Scheduler};
pub use store::{
    DataIdResolver, EntityId, EntityNode, NoDataId, Path, PathSegment, Projection, ReadInput, ReadOutput, ReferenceValue,
    SharedJson, Snapshot, Store, WatchInput, WatchResult, WriteInput,
};

pub use gql_cache_ast::ast;
pub use gql_cache_ast::{field_storage_key, walk_selections, EffectiveFieldSelection, MissingFragmentError, Node};
