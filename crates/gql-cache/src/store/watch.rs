use super::journal::ReadPlan;
use super::types::{EntityId, Path, Projection, SharedJson};
use crate::observable::Observer;
use gql_cache_ast::ast::{FragmentMap, SelectionSet, VariableValues};
use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::rc::Rc;

/// Input to [`super::Store::watch`].
#[derive(Clone)]
pub struct WatchInput {
    pub id: EntityId,
    pub selection_set: SelectionSet,
    pub variables: VariableValues,
    pub fragments: FragmentMap,
    pub initial_data: Option<Projection>,
}

/// What a watch observable emits: the read result shape, `{ data, stale }`
/// (§4.B `watch`). Never errors — a failed re-read is suppressed rather than
/// surfaced (§4.B "the watch suppresses that emission").
/// Carries the identity table alongside `data` (§4.B.1) so a subscriber that
/// needs to chain further reads (e.g. `ObservableOperation::maybe_execute`)
/// can reconstitute a full [`Projection`] without re-reading the store.
#[derive(Clone, Debug)]
pub struct WatchResult {
    pub data: SharedJson,
    pub stale: bool,
    pub identities: HashMap<Path, EntityId>,
}

impl WatchResult {
    pub fn into_projection(self) -> Projection {
        Projection {
            data: self.data,
            identities: self.identities,
        }
    }
}

pub(super) type WatchObserverHandle = Rc<RefCell<Observer<WatchResult, Infallible>>>;

/// A live registration created by [`super::Store::watch`]: the inputs needed
/// to re-read on demand, plus the read-plan and last emission used for
/// change-detection and stale-chain continuation.
pub(super) struct Watcher {
    pub root_id: EntityId,
    pub selection_set: SelectionSet,
    pub fragments: FragmentMap,
    pub variables: VariableValues,
    pub plan: ReadPlan,
    pub last_projection: Projection,
    pub observer: WatchObserverHandle,
}
