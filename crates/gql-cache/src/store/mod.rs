//! The normalized graph store (§2 component B, §4.B): `write` / `read` / `watch`
//! over a content-addressed, field-level entity graph.

mod id;
mod journal;
mod types;
mod watch;

pub use journal::{Journal, ReadPlan};
pub use types::{DataIdResolver, EntityId, EntityNode, NoDataId, Path, PathSegment, Projection, ReferenceValue, SharedJson, Snapshot};
pub use watch::{WatchInput, WatchResult};

use crate::error::{GraphError, PartialReadKind};
use crate::JsonMap;
use gql_cache_ast::ast::{FragmentMap, SelectionSet, VariableValues};
use id::derive_entity_id;
use serde_json_bytes::Value as JsonValue;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use watch::Watcher;

/// A normalized graph store. Cheaply `Clone`-able (an `Rc` handle): every
/// `ObservableOperation` sharing a graph holds one of these clones (§5 "the
/// graph snapshot is shared across all operations").
pub struct Store(Rc<RefCell<Inner>>);

struct Inner {
    snapshot: Snapshot,
    data_id: Box<dyn DataIdResolver>,
    watchers: indexmap::IndexMap<u64, Watcher>,
    next_watcher_id: u64,
}

impl Clone for Store {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// Input to [`Store::write`].
pub struct WriteInput<'a> {
    pub id: EntityId,
    pub selection_set: &'a SelectionSet,
    pub variables: &'a VariableValues,
    pub fragments: &'a FragmentMap,
    pub data: JsonMap,
}

/// Input to [`Store::read`].
pub struct ReadInput<'a> {
    pub id: EntityId,
    pub selection_set: &'a SelectionSet,
    pub variables: &'a VariableValues,
    pub fragments: &'a FragmentMap,
    pub previous_data: Option<Projection>,
}

/// Output of [`Store::read`] (and, modulo the journal, [`Store::write`]): §4.B
/// `{ data, stale }`.
pub struct ReadOutput {
    pub projection: Projection,
    pub stale: bool,
    pub plan: ReadPlan,
}

impl Store {
    pub fn new(data_id: impl DataIdResolver + 'static) -> Self {
        Self(Rc::new(RefCell::new(Inner {
            snapshot: Snapshot::new(),
            data_id: Box::new(data_id),
            watchers: indexmap::IndexMap::new(),
            next_watcher_id: 0,
        })))
    }

    /// Writes `input.data` into the graph, producing a new snapshot and
    /// dispatching the resulting change journal to every intersecting watcher
    /// (§4.B `write`).
    #[tracing::instrument(level = "debug", skip_all, fields(id = %input.id))]
    pub fn write(&self, input: WriteInput<'_>) -> Result<Projection, GraphError> {
        let mut journal = Journal::new();
        let mut identities = HashMap::new();
        let mut path = Path::new();
        let data = {
            let mut inner = self.0.borrow_mut();
            write_object(
                &mut inner,
                &input.id,
                input.selection_set,
                input.fragments,
                input.variables,
                &input.data,
                &mut path,
                &mut identities,
                &mut journal,
            )?
        };
        identities.insert(Path::new(), input.id.clone());
        let projection = Projection {
            data: SharedJson::new(data),
            identities,
        };
        tracing::debug!(changed = journal.len(), "write committed");
        self.dispatch(&journal);
        Ok(projection)
    }

    /// Reads `input.selection_set` starting at `input.id` against the current
    /// snapshot (§4.B `read`).
    #[tracing::instrument(level = "debug", skip_all, fields(id = %input.id))]
    pub fn read(&self, input: ReadInput<'_>) -> Result<ReadOutput, GraphError> {
        let (result, stale, plan) = self.read_internal(
            &input.id,
            input.selection_set,
            input.fragments,
            input.variables,
            input.previous_data.as_ref(),
        );
        let (data, identities) = result?;
        tracing::debug!(stale, "read completed");
        Ok(ReadOutput {
            projection: Projection {
                data: SharedJson::new(data),
                identities,
            },
            stale,
            plan,
        })
    }

    /// Registers a live watch over the same read as [`Store::read`] (§4.B
    /// `watch`). The returned observable emits synchronously on subscribe and
    /// again whenever a write's change journal intersects this watch's
    /// read-plan.
    pub fn watch(&self, input: WatchInput) -> crate::observable::Observable<WatchResult, std::convert::Infallible> {
        let store = self.clone();
        crate::observable::Observable::new(move |observer| {
            let observer: watch::WatchObserverHandle = Rc::new(RefCell::new(observer));
            let WatchInput {
                id,
                selection_set,
                variables,
                fragments,
                initial_data,
            } = input.clone();

            let (result, stale, plan) = store.read_internal(&id, &selection_set, &fragments, &variables, initial_data.as_ref());

            let watcher_id = match result {
                Ok((data, identities)) => {
                    let projection = Projection {
                        data: SharedJson::new(data),
                        identities,
                    };
                    let suppress = !stale
                        && initial_data
                            .as_ref()
                            .map(|initial| initial.data == projection.data)
                            .unwrap_or(false);

                    let id_in_table = {
                        let mut inner = store.0.borrow_mut();
                        let watcher_id = inner.next_watcher_id;
                        inner.next_watcher_id += 1;
                        inner.watchers.insert(
                            watcher_id,
                            Watcher {
                                root_id: id.clone(),
                                selection_set,
                                fragments,
                                variables,
                                plan,
                                last_projection: projection.clone(),
                                observer: observer.clone(),
                            },
                        );
                        watcher_id
                    };

                    if !suppress {
                        observer.borrow_mut().next(WatchResult {
                            data: projection.data.clone(),
                            stale,
                            identities: projection.identities.clone(),
                        });
                    }
                    Some(id_in_table)
                }
                Err(error) => {
                    tracing::warn!(%error, "initial watch read failed; registering with an empty projection");
                    let mut inner = store.0.borrow_mut();
                    let watcher_id = inner.next_watcher_id;
                    inner.next_watcher_id += 1;
                    inner.watchers.insert(
                        watcher_id,
                        Watcher {
                            root_id: id,
                            selection_set,
                            fragments,
                            variables,
                            plan,
                            last_projection: Projection::null(),
                            observer: observer.clone(),
                        },
                    );
                    Some(watcher_id)
                }
            };

            let teardown_store = store.clone();
            Box::new(move || {
                if let Some(watcher_id) = watcher_id {
                    teardown_store.0.borrow_mut().watchers.shift_remove(&watcher_id);
                }
            })
        })
    }

    #[allow(clippy::type_complexity)]
    fn read_internal(
        &self,
        id: &EntityId,
        selection_set: &SelectionSet,
        fragments: &FragmentMap,
        variables: &VariableValues,
        previous: Option<&Projection>,
    ) -> (Result<(JsonValue, HashMap<Path, EntityId>), GraphError>, bool, ReadPlan) {
        let inner = self.0.borrow();
        let mut plan = ReadPlan::new();
        let mut identities = HashMap::new();
        let mut stale = false;
        let mut path = Path::new();
        let result = read_object(
            &inner,
            id,
            selection_set,
            fragments,
            variables,
            &mut path,
            previous,
            &mut plan,
            &mut identities,
            &mut stale,
        )
        .map(|data| {
            identities.insert(Path::new(), id.clone());
            (data, identities)
        });
        (result, stale, plan)
    }

    /// Re-reads every watcher whose read-plan intersects `journal` and
    /// delivers a fresh emission (§4.B "Change-detection policy").
    fn dispatch(&self, journal: &Journal) {
        if journal.is_empty() {
            return;
        }
        let watcher_ids: Vec<u64> = {
            let inner = self.0.borrow();
            inner.watchers.keys().copied().collect()
        };
        for watcher_id in watcher_ids {
            self.dispatch_one(watcher_id, journal);
        }
    }

    fn dispatch_one(&self, watcher_id: u64, journal: &Journal) {
        let snapshot = {
            let inner = self.0.borrow();
            let watcher = match inner.watchers.get(&watcher_id) {
                Some(w) => w,
                None => return,
            };
            if !journal.intersects(&watcher.plan) {
                return;
            }
            (
                watcher.root_id.clone(),
                watcher.selection_set.clone(),
                watcher.fragments.clone(),
                watcher.variables.clone(),
                watcher.last_projection.clone(),
                watcher.observer.clone(),
            )
        };
        let (root_id, selection_set, fragments, variables, last_projection, observer) = snapshot;

        let (result, stale, plan) = self.read_internal(&root_id, &selection_set, &fragments, &variables, Some(&last_projection));

        match result {
            Ok((data, identities)) => {
                let projection = Projection {
                    data: SharedJson::new(data),
                    identities,
                };
                {
                    let mut inner = self.0.borrow_mut();
                    if let Some(watcher) = inner.watchers.get_mut(&watcher_id) {
                        watcher.plan = plan;
                        watcher.last_projection = projection.clone();
                    }
                }
                observer.borrow_mut().next(WatchResult {
                    data: projection.data.clone(),
                    stale,
                    identities: projection.identities.clone(),
                });
            }
            Err(error) => {
                tracing::debug!(%error, "watch re-read suppressed");
                let mut inner = self.0.borrow_mut();
                if let Some(watcher) = inner.watchers.get_mut(&watcher_id) {
                    watcher.plan = plan;
                }
            }
        }
    }
}

fn write_object(
    inner: &mut Inner,
    entity_id: &EntityId,
    selection_set: &SelectionSet,
    fragments: &FragmentMap,
    variables: &VariableValues,
    data: &JsonMap,
    path: &mut Path,
    identities: &mut HashMap<Path, EntityId>,
    journal: &mut Journal,
) -> Result<JsonValue, GraphError> {
    let effective = gql_cache_ast::walk_selections(selection_set, fragments, variables)?;
    let mut node = inner.snapshot.get(entity_id).cloned().unwrap_or_default();
    let mut output = JsonMap::new();

    for selection in &effective {
        let storage_key = selection.storage_key.as_str();
        let input_value = data
            .get(selection.response_key.as_str())
            .cloned()
            .unwrap_or(JsonValue::Null);

        path.push(PathSegment::Field(selection.response_key.to_string()));

        if !selection.field.has_selections() {
            let changed = node.scalars.get(storage_key) != Some(&input_value);
            if changed {
                journal.mark(entity_id.clone(), storage_key);
            }
            node.scalars.insert(storage_key.to_string(), input_value.clone());
            output.insert(selection.response_key.to_string(), input_value);
        } else {
            let (reference, value) = write_reference_field(
                inner,
                entity_id,
                storage_key,
                &selection.merged_selection_set,
                fragments,
                variables,
                &input_value,
                path,
                identities,
                journal,
            )?;
            let changed = node.references.get(storage_key) != Some(&reference);
            if changed {
                journal.mark(entity_id.clone(), storage_key);
            }
            node.references.insert(storage_key.to_string(), reference);
            output.insert(selection.response_key.to_string(), value);
        }

        path.pop();
    }

    inner.snapshot.insert(entity_id.clone(), node);
    Ok(JsonValue::Object(output))
}

fn write_reference_field(
    inner: &mut Inner,
    parent_id: &EntityId,
    storage_key: &str,
    child_selection_set: &SelectionSet,
    fragments: &FragmentMap,
    variables: &VariableValues,
    input_value: &JsonValue,
    path: &mut Path,
    identities: &mut HashMap<Path, EntityId>,
    journal: &mut Journal,
) -> Result<(ReferenceValue, JsonValue), GraphError> {
    match input_value {
        JsonValue::Null => Ok((ReferenceValue::Single(None), JsonValue::Null)),
        JsonValue::Object(object) => {
            let child_id = derive_entity_id(object, inner.data_id.as_ref(), Some((parent_id, storage_key)), parent_id);
            identities.insert(path.clone(), child_id.clone());
            let value = write_object(
                inner,
                &child_id,
                child_selection_set,
                fragments,
                variables,
                object,
                path,
                identities,
                journal,
            )?;
            Ok((ReferenceValue::Single(Some(child_id)), value))
        }
        JsonValue::Array(items) => {
            let mut ids = Vec::with_capacity(items.len());
            let mut values = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                path.push(PathSegment::Index(index));
                match item {
                    JsonValue::Null => {
                        ids.push(None);
                        values.push(JsonValue::Null);
                    }
                    JsonValue::Object(object) => {
                        let child_id =
                            derive_entity_id(object, inner.data_id.as_ref(), Some((parent_id, storage_key)), parent_id);
                        identities.insert(path.clone(), child_id.clone());
                        let value = write_object(
                            inner,
                            &child_id,
                            child_selection_set,
                            fragments,
                            variables,
                            object,
                            path,
                            identities,
                            journal,
                        )?;
                        ids.push(Some(child_id));
                        values.push(value);
                    }
                    other => {
                        path.pop();
                        return Err(GraphError::WriteShape {
                            field: storage_key.to_string(),
                            detail: format!("expected object or null in list, found {other:?}"),
                        });
                    }
                }
                path.pop();
            }
            Ok((ReferenceValue::List(ids), JsonValue::Array(values)))
        }
        other => Err(GraphError::WriteShape {
            field: storage_key.to_string(),
            detail: format!("expected object, null, or array, found {other:?}"),
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn read_object(
    inner: &Inner,
    entity_id: &EntityId,
    selection_set: &SelectionSet,
    fragments: &FragmentMap,
    variables: &VariableValues,
    path: &mut Path,
    previous: Option<&Projection>,
    plan: &mut ReadPlan,
    identities: &mut HashMap<Path, EntityId>,
    stale: &mut bool,
) -> Result<JsonValue, GraphError> {
    let effective = gql_cache_ast::walk_selections(selection_set, fragments, variables)?;
    let node = inner.snapshot.get(entity_id);
    let mut output = JsonMap::new();

    for selection in &effective {
        let storage_key = selection.storage_key.as_str();
        plan.visit(entity_id.clone(), storage_key);
        path.push(PathSegment::Field(selection.response_key.to_string()));

        let result = if !selection.field.has_selections() {
            node.and_then(|n| n.scalars.get(storage_key))
                .cloned()
                .ok_or_else(|| GraphError::PartialRead {
                    field: selection.field.name.to_string(),
                    what: PartialReadKind::Scalar,
                })
        } else {
            let reference = node
                .and_then(|n| n.references.get(storage_key))
                .cloned()
                .ok_or_else(|| GraphError::PartialRead {
                    field: selection.field.name.to_string(),
                    what: PartialReadKind::Reference,
                })?;
            read_reference_field(
                inner,
                &reference,
                &selection.merged_selection_set,
                fragments,
                variables,
                path,
                previous,
                plan,
                identities,
                stale,
            )
        };

        path.pop();
        output.insert(selection.response_key.to_string(), result?);
    }

    Ok(JsonValue::Object(output))
}

#[allow(clippy::too_many_arguments)]
fn read_reference_field(
    inner: &Inner,
    reference: &ReferenceValue,
    child_selection_set: &SelectionSet,
    fragments: &FragmentMap,
    variables: &VariableValues,
    path: &mut Path,
    previous: Option<&Projection>,
    plan: &mut ReadPlan,
    identities: &mut HashMap<Path, EntityId>,
    stale: &mut bool,
) -> Result<JsonValue, GraphError> {
    match reference {
        ReferenceValue::Single(None) => Ok(JsonValue::Null),
        ReferenceValue::Single(Some(child_id)) => read_child_at_path(
            inner,
            child_id,
            child_selection_set,
            fragments,
            variables,
            path,
            previous,
            plan,
            identities,
            stale,
        ),
        ReferenceValue::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                path.push(PathSegment::Index(index));
                let value = match item {
                    None => Ok(JsonValue::Null),
                    Some(child_id) => read_child_at_path(
                        inner,
                        child_id,
                        child_selection_set,
                        fragments,
                        variables,
                        path,
                        previous,
                        plan,
                        identities,
                        stale,
                    ),
                };
                path.pop();
                values.push(value?);
            }
            Ok(JsonValue::Array(values))
        }
    }
}

/// Reads the entity at `child_id`, or — if `previous`'s identity table records
/// a *different* entity at this path (the identity chain diverged since the
/// caller's last read) — falls back to `previous`'s subtree wholesale and
/// marks the overall read `stale` (§4.B.1).
#[allow(clippy::too_many_arguments)]
fn read_child_at_path(
    inner: &Inner,
    child_id: &EntityId,
    child_selection_set: &SelectionSet,
    fragments: &FragmentMap,
    variables: &VariableValues,
    path: &mut Path,
    previous: Option<&Projection>,
    plan: &mut ReadPlan,
    identities: &mut HashMap<Path, EntityId>,
    stale: &mut bool,
) -> Result<JsonValue, GraphError> {
    if let Some(prev) = previous {
        if let Some(prev_id) = prev.identities.get(path.as_slice()) {
            if prev_id != child_id {
                *stale = true;
                copy_prefixed(prev, path, identities);
                return Ok(json_at_path(&prev.data, path).unwrap_or(JsonValue::Null));
            }
        }
    }
    identities.insert(path.clone(), child_id.clone());
    read_object(
        inner,
        child_id,
        child_selection_set,
        fragments,
        variables,
        path,
        previous,
        plan,
        identities,
        stale,
    )
}

fn copy_prefixed(previous: &Projection, prefix: &Path, identities: &mut HashMap<Path, EntityId>) {
    for (candidate, id) in &previous.identities {
        if candidate.starts_with(prefix.as_slice()) {
            identities.insert(candidate.clone(), id.clone());
        }
    }
}

fn json_at_path(data: &JsonValue, path: &Path) -> Option<JsonValue> {
    let mut current = data;
    for segment in path {
        current = match (segment, current) {
            (PathSegment::Field(name), JsonValue::Object(object)) => object.get(name.as_str())?,
            (PathSegment::Index(index), JsonValue::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current.clone())
}
