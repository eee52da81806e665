//! The per-operation state machine (§2 component D, §4.D): combines an
//! executor's result stream with a live store watch into a single
//! `OperationState` sequence, fanned out to every subscriber.

use crate::error::OperationError;
use crate::observable::{Observable, Observer, Subscription};
use crate::response::GraphQLError;
use crate::scheduler::Scheduler;
use crate::store::{EntityId, Projection, ReadInput, Store, WatchInput, WatchResult, WriteInput};
use crate::JsonMap;
use gql_cache_ast::ast::{FragmentMap, Operation, OperationType, VariableValues};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// What an executor's observable resolves/errors with (§6 "Executor contract").
pub struct ExecutorResult {
    pub data: JsonMap,
    pub errors: Vec<GraphQLError>,
}

/// The executor error type delivered to `ObservableOperation` subscribers.
/// `Rc`, not `Box`, because one error is fanned out to every subscriber
/// (§4.D "Error delivery goes to every observer").
pub type ExecutorError = Rc<dyn std::error::Error>;

/// Request shape handed to an executor (§6).
pub struct ExecutorRequest {
    pub operation: Operation,
    pub fragments: FragmentMap,
    pub variables: VariableValues,
}

/// A user-provided transport (HTTP, websocket, in-process resolver) consumed
/// as an opaque collaborator (§1 "Out of scope").
pub trait Executor {
    fn execute(&self, request: ExecutorRequest) -> Observable<ExecutorResult, ExecutorError>;
}

impl<F> Executor for F
where
    F: Fn(ExecutorRequest) -> Observable<ExecutorResult, ExecutorError>,
{
    fn execute(&self, request: ExecutorRequest) -> Observable<ExecutorResult, ExecutorError> {
        self(request)
    }
}

/// Construction parameters for [`ObservableOperation::new`] (§4.D "Construction").
pub struct NewOperationParams {
    pub graph: Store,
    pub executor: Rc<dyn Executor>,
    pub operation: Operation,
    pub fragments: Option<FragmentMap>,
    pub initial_variables: Option<VariableValues>,
}

/// Everything a subscriber to [`ObservableOperation`] observes (§3 "OperationState").
#[derive(Clone, Debug, Default)]
pub struct OperationState {
    pub loading: bool,
    pub executing: bool,
    pub variables: VariableValues,
    pub canonical: bool,
    pub stale: bool,
    pub errors: Vec<GraphQLError>,
    pub data: Option<crate::store::SharedJson>,
}

/// The `{next?, error?, complete?}` bag a caller supplies to
/// [`ObservableOperation::subscribe`]. A dedicated type rather than a reuse of
/// [`crate::observable::Observer`]: unlike that primitive's terminal `error`,
/// an operation's `error` is not terminal — a later successful execution still
/// reaches this same observer (§9 "preserve this behavior — it is load-bearing").
#[derive(Default)]
pub struct OperationObserver {
    next: Option<Box<dyn FnMut(OperationState)>>,
    error: Option<Box<dyn FnMut(ExecutorError)>>,
    complete: Option<Box<dyn FnMut()>>,
}

impl OperationObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_next(mut self, f: impl FnMut(OperationState) + 'static) -> Self {
        self.next = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(ExecutorError) + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnMut() + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }
}

struct ObserverEntry {
    observer: Rc<RefCell<OperationObserver>>,
    /// Bumped every time a new delivery is scheduled for this observer; a
    /// scheduled delivery only fires if this still matches the stamp it
    /// captured (§9 "Deferred delivery + state collapse").
    latest_stamp: Rc<Cell<u64>>,
}

struct Inner {
    store: Store,
    executor: Rc<dyn Executor>,
    scheduler: Rc<dyn Scheduler>,
    root_id: EntityId,
    operation: Operation,
    fragments: FragmentMap,
    state: OperationState,
    projection: Option<Projection>,
    execution: Option<Subscription>,
    watch: Option<Subscription>,
    observers: indexmap::IndexMap<u64, ObserverEntry>,
    next_observer_id: u64,
}

/// A hot state machine per operation (§2 component D, §4.D). Cheaply
/// `Clone`-able (an `Rc` handle): every clone shares the same execution,
/// watch, and subscriber set.
pub struct ObservableOperation(Rc<RefCell<Inner>>);

impl Clone for ObservableOperation {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl ObservableOperation {
    pub fn new(params: NewOperationParams, scheduler: Rc<dyn Scheduler>) -> Result<Self, OperationError> {
        if params.operation.operation_type == OperationType::Mutation {
            return Err(OperationError::MutationNotObservable);
        }
        let root_id = EntityId::from(params.operation.operation_type.default_root_id());
        let variables = params.initial_variables.unwrap_or_default();
        let state = OperationState {
            loading: false,
            executing: false,
            variables,
            canonical: false,
            stale: false,
            errors: Vec::new(),
            data: None,
        };
        let op = Self(Rc::new(RefCell::new(Inner {
            store: params.graph,
            executor: params.executor,
            scheduler,
            root_id,
            operation: params.operation,
            fragments: params.fragments.unwrap_or_default(),
            state,
            projection: None,
            execution: None,
            watch: None,
            observers: indexmap::IndexMap::new(),
            next_observer_id: 0,
        })));
        op.start_watch();
        Ok(op)
    }

    pub fn get_state(&self) -> OperationState {
        self.0.borrow().state.clone()
    }

    /// §4.D `execute`: a full (re)run through the executor.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn execute(&self, variables: Option<VariableValues>) -> Result<(), OperationError> {
        {
            let inner = self.0.borrow();
            if inner.execution.is_some() {
                return Err(OperationError::AlreadyExecuting);
            }
        }
        let variables = variables.unwrap_or_else(|| self.0.borrow().state.variables.clone());

        self.update_state(|state| {
            state.loading = true;
            state.executing = true;
            state.variables = variables.clone();
        });

        let (executor, operation, fragments) = {
            let inner = self.0.borrow();
            (inner.executor.clone(), inner.operation.clone(), inner.fragments.clone())
        };

        let request = ExecutorRequest {
            operation,
            fragments,
            variables: variables.clone(),
        };

        // An executor observable may `complete` synchronously inside
        // `subscribe`, before the line below has a chance to record the
        // subscription — `on_executor_complete` would already have cleared
        // `execution` back to `None`. This flag lets us notice that and avoid
        // re-storing a subscription to an execution that has already ended.
        // A synchronous `error`, by contrast, does not end the execution
        // (§4.D), so it does not set this flag.
        let settled = Rc::new(Cell::new(false));

        let op_next = self.clone();
        let variables_next = variables.clone();
        let op_error = self.clone();
        let op_complete = self.clone();
        let settled_for_complete = settled.clone();

        let observable = executor.execute(request);
        let subscription = observable.subscribe(
            Observer::new()
                .on_next(move |result: ExecutorResult| op_next.on_executor_next(result, variables_next.clone()))
                .on_error(move |error: ExecutorError| op_error.on_executor_error(error))
                .on_complete(move || {
                    settled_for_complete.set(true);
                    op_complete.on_executor_complete();
                }),
        );

        if settled.get() {
            subscription.unsubscribe();
        } else {
            self.0.borrow_mut().execution = Some(subscription);
        }
        Ok(())
    }

    fn on_executor_next(&self, result: ExecutorResult, variables: VariableValues) {
        self.stop_watch();

        let (store, root_id, operation, fragments) = {
            let inner = self.0.borrow();
            (inner.store.clone(), inner.root_id.clone(), inner.operation.clone(), inner.fragments.clone())
        };

        if result.errors.is_empty() {
            let write_result = store.write(WriteInput {
                id: root_id,
                selection_set: &operation.selection_set,
                variables: &variables,
                fragments: &fragments,
                data: result.data,
            });
            match write_result {
                Ok(projection) => {
                    self.0.borrow_mut().projection = Some(projection.clone());
                    self.update_state(|state| {
                        state.loading = false;
                        state.variables = variables.clone();
                        state.canonical = true;
                        state.stale = false;
                        state.errors = Vec::new();
                        state.data = Some(projection.data.clone());
                    });
                    self.start_watch();
                }
                Err(error) => {
                    tracing::warn!(%error, "executor result did not match the operation's selection set");
                }
            }
        } else {
            self.update_state(|state| {
                state.loading = false;
                state.variables = variables.clone();
                state.canonical = true;
                state.stale = false;
                state.errors = result.errors.clone();
                state.data = Some(crate::store::SharedJson::new(serde_json_bytes::Value::Object(result.data.clone())));
            });
            // Quarantined: the watch stays stopped until a subsequent
            // error-free result restarts it (§9 open question).
        }
    }

    /// §4.D "On error(e): propagate `e` to this operation's observers; do
    /// nothing else." State and the execution handle are left exactly as they
    /// were — `executing` stays true until `complete` or `stopExecuting`
    /// arrives (§9 "preserve this behavior — it is load-bearing"), and a
    /// concurrent `execute()` call must keep failing with `AlreadyExecuting`
    /// until then.
    fn on_executor_error(&self, error: ExecutorError) {
        let observers: Vec<Rc<RefCell<OperationObserver>>> = self
            .0
            .borrow()
            .observers
            .values()
            .map(|entry| entry.observer.clone())
            .collect();
        for observer in observers {
            let mut observer = observer.borrow_mut();
            if let Some(f) = observer.error.as_mut() {
                f(error.clone());
            }
        }
    }

    fn on_executor_complete(&self) {
        self.update_state(|state| {
            state.loading = false;
            state.executing = false;
        });
        self.0.borrow_mut().execution = None;
    }

    /// §4.D `stopExecuting`.
    pub fn stop_executing(&self) {
        let subscription = self.0.borrow_mut().execution.take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        self.update_state(|state| {
            state.loading = false;
            state.executing = false;
        });
    }

    /// §4.D `maybeExecute`: try the cache first, fall back to a full `execute`
    /// on a partial read.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn maybe_execute(&self, variables: Option<VariableValues>) -> Result<(), OperationError> {
        {
            let inner = self.0.borrow();
            if inner.execution.is_some() {
                return Err(OperationError::AlreadyExecuting);
            }
        }
        let variables = variables.unwrap_or_else(|| self.0.borrow().state.variables.clone());

        let (store, root_id, operation, fragments, previous_data) = {
            let inner = self.0.borrow();
            (
                inner.store.clone(),
                inner.root_id.clone(),
                inner.operation.clone(),
                inner.fragments.clone(),
                inner.projection.clone(),
            )
        };

        let read_result = store.read(ReadInput {
            id: root_id,
            selection_set: &operation.selection_set,
            variables: &variables,
            fragments: &fragments,
            previous_data,
        });

        match read_result {
            Ok(output) => {
                self.0.borrow_mut().projection = Some(output.projection.clone());
                self.update_state(|state| {
                    state.variables = variables.clone();
                    state.canonical = false;
                    state.stale = output.stale;
                    state.data = Some(output.projection.data.clone());
                });
                self.stop_watch();
                self.start_watch();
                Ok(())
            }
            Err(error) if error.is_partial_read() => self.execute(Some(variables)),
            Err(error) => Err(OperationError::Store(error)),
        }
    }

    /// §6 `subscribe`: delivers the current state once (asynchronously), then
    /// registers the observer for future updates.
    pub fn subscribe(&self, observer: OperationObserver) -> Subscription {
        let id = {
            let mut inner = self.0.borrow_mut();
            let id = inner.next_observer_id;
            inner.next_observer_id += 1;
            inner.observers.insert(
                id,
                ObserverEntry {
                    observer: Rc::new(RefCell::new(observer)),
                    latest_stamp: Rc::new(Cell::new(0)),
                },
            );
            id
        };
        self.prime_one(id);

        let op = self.clone();
        Subscription::new_for(move || {
            op.0.borrow_mut().observers.shift_remove(&id);
        })
    }

    fn prime_one(&self, id: u64) {
        let (stamp_cell, observer, state, scheduler) = {
            let inner = self.0.borrow();
            let entry = match inner.observers.get(&id) {
                Some(entry) => entry,
                None => return,
            };
            let stamp = entry.latest_stamp.get() + 1;
            entry.latest_stamp.set(stamp);
            (entry.latest_stamp.clone(), entry.observer.clone(), inner.state.clone(), inner.scheduler.clone())
        };
        let stamp = stamp_cell.get();
        scheduler.schedule(Box::new(move || {
            if stamp_cell.get() != stamp {
                return;
            }
            if let Some(f) = observer.borrow_mut().next.as_mut() {
                f(state);
            }
        }));
    }

    /// §4.D "_updateState": merges into the current state, then schedules a
    /// deferred, collapse-on-supersede delivery to every observer.
    fn update_state(&self, mutate: impl FnOnce(&mut OperationState)) {
        let (snapshot, deliveries, scheduler) = {
            let mut inner = self.0.borrow_mut();
            mutate(&mut inner.state);
            let snapshot = inner.state.clone();
            let deliveries: Vec<(Rc<Cell<u64>>, u64, Rc<RefCell<OperationObserver>>)> = inner
                .observers
                .values()
                .map(|entry| {
                    let stamp = entry.latest_stamp.get() + 1;
                    entry.latest_stamp.set(stamp);
                    (entry.latest_stamp.clone(), stamp, entry.observer.clone())
                })
                .collect();
            (snapshot, deliveries, inner.scheduler.clone())
        };
        for (stamp_cell, stamp, observer) in deliveries {
            let snapshot = snapshot.clone();
            scheduler.schedule(Box::new(move || {
                if stamp_cell.get() != stamp {
                    return;
                }
                if let Some(f) = observer.borrow_mut().next.as_mut() {
                    f(snapshot);
                }
            }));
        }
    }

    /// §4.D "Watch lifecycle": at most one active watcher; illegal to start a
    /// second one (an internal invariant violation, not a caller mistake).
    fn start_watch(&self) {
        let (store, root_id, operation, fragments, variables, initial_data) = {
            let inner = self.0.borrow();
            if inner.watch.is_some() {
                panic!("_watch() called while a watch is already active");
            }
            (
                inner.store.clone(),
                inner.root_id.clone(),
                inner.operation.clone(),
                inner.fragments.clone(),
                inner.state.variables.clone(),
                inner.projection.clone(),
            )
        };

        let op = self.clone();
        let watched_variables = variables.clone();
        let subscription = store
            .watch(WatchInput {
                id: root_id,
                selection_set: operation.selection_set,
                variables,
                fragments,
                initial_data,
            })
            .subscribe(Observer::new().on_next(move |result: WatchResult| {
                op.on_watch_emission(result, &watched_variables);
            }));

        self.0.borrow_mut().watch = Some(subscription);
    }

    fn stop_watch(&self) {
        let subscription = self.0.borrow_mut().watch.take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }

    fn on_watch_emission(&self, result: WatchResult, watched_variables: &VariableValues) {
        debug_assert!(
            self.0.borrow().state.variables == *watched_variables,
            "a watch must be stopped before its operation's variables change"
        );
        let stale = result.stale;
        let projection = result.into_projection();
        self.0.borrow_mut().projection = Some(projection.clone());
        self.update_state(|state| {
            state.canonical = false;
            state.stale = stale;
            state.data = Some(projection.data.clone());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::DeterministicScheduler;
    use crate::store::{NoDataId, Store};
    use gql_cache_ast::ast::{Field, Name, OperationType, Selection};
    use std::rc::Rc;

    type ManualHandle = Rc<RefCell<Observer<ExecutorResult, ExecutorError>>>;

    /// A test-double [`Executor`] whose resolution is driven explicitly by the
    /// test, rather than resolving synchronously or via a real transport.
    #[derive(Default)]
    struct ManualExecutor {
        last: Rc<RefCell<Option<ManualHandle>>>,
        call_count: Rc<Cell<u32>>,
    }

    impl ManualExecutor {
        fn new() -> Self {
            Self::default()
        }

        fn emit(&self, result: ExecutorResult) {
            let handle = self.last.borrow().clone().expect("executor not subscribed yet");
            handle.borrow_mut().next(result);
        }

        fn complete(&self) {
            let handle = self.last.borrow().clone().expect("executor not subscribed yet");
            handle.borrow_mut().complete();
        }

        fn error(&self, error: ExecutorError) {
            let handle = self.last.borrow().clone().expect("executor not subscribed yet");
            handle.borrow_mut().error(error);
        }
    }

    impl Executor for ManualExecutor {
        fn execute(&self, _request: ExecutorRequest) -> Observable<ExecutorResult, ExecutorError> {
            self.call_count.set(self.call_count.get() + 1);
            let last = self.last.clone();
            Observable::new(move |observer| {
                *last.borrow_mut() = Some(Rc::new(RefCell::new(observer)));
                Box::new(|| {})
            })
        }
    }

    fn leaf(name: &str) -> Selection {
        Selection::Field(gql_cache_ast::Node::new(Field {
            alias: None,
            name: Name::from(name),
            arguments: Vec::new(),
            directives: Vec::new(),
            selection_set: gql_cache_ast::ast::SelectionSet::default(),
        }))
    }

    fn query(selections: Vec<Selection>) -> Operation {
        Operation {
            operation_type: OperationType::Query,
            name: None,
            variables: Vec::new(),
            selection_set: gql_cache_ast::ast::SelectionSet { selections },
        }
    }

    fn result_of(pairs: Vec<(&str, JsonValue)>) -> JsonMap {
        let mut map = JsonMap::new();
        for (key, value) in pairs {
            map.insert(key, value);
        }
        map
    }

    fn new_operation(
        operation: Operation,
        executor: Rc<dyn Executor>,
        scheduler: Rc<DeterministicScheduler>,
    ) -> ObservableOperation {
        ObservableOperation::new(
            NewOperationParams {
                graph: Store::new(NoDataId),
                executor,
                operation,
                fragments: None,
                initial_variables: None,
            },
            scheduler as Rc<dyn Scheduler>,
        )
        .unwrap()
    }

    #[test]
    fn rejects_mutations_at_construction() {
        let scheduler = Rc::new(DeterministicScheduler::new());
        let executor: Rc<dyn Executor> = Rc::new(ManualExecutor::new());
        let mut operation = query(vec![leaf("a")]);
        operation.operation_type = OperationType::Mutation;
        let err = ObservableOperation::new(
            NewOperationParams {
                graph: Store::new(NoDataId),
                executor,
                operation,
                fragments: None,
                initial_variables: None,
            },
            scheduler as Rc<dyn Scheduler>,
        )
        .unwrap_err();
        assert_eq!(err, OperationError::MutationNotObservable);
    }

    #[test]
    fn subscribe_primes_with_the_initial_passive_state() {
        let scheduler = Rc::new(DeterministicScheduler::new());
        let executor: Rc<dyn Executor> = Rc::new(ManualExecutor::new());
        let op = new_operation(query(vec![leaf("a"), leaf("b"), leaf("c")]), executor, scheduler.clone());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_for_sub = seen.clone();
        let _sub = op.subscribe(OperationObserver::new().on_next(move |state| seen_for_sub.borrow_mut().push(state)));

        scheduler.run_until_idle();
        assert_eq!(seen.borrow().len(), 1);
        let initial = &seen.borrow()[0];
        assert!(!initial.loading);
        assert!(!initial.executing);
        assert!(!initial.canonical);
        assert!(!initial.stale);
        assert!(initial.errors.is_empty());
        assert!(initial.data.is_none());
    }

    #[test]
    fn execute_reports_loading_then_canonical_data() {
        let scheduler = Rc::new(DeterministicScheduler::new());
        let manual = Rc::new(ManualExecutor::new());
        let executor: Rc<dyn Executor> = manual.clone();
        let op = new_operation(query(vec![leaf("a"), leaf("b"), leaf("c")]), executor, scheduler.clone());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_for_sub = seen.clone();
        let _sub = op.subscribe(OperationObserver::new().on_next(move |state| seen_for_sub.borrow_mut().push(state)));
        scheduler.run_until_idle();
        assert_eq!(seen.borrow().len(), 1);

        op.execute(None).unwrap();
        scheduler.run_until_idle();
        assert_eq!(seen.borrow().len(), 2);
        assert!(seen.borrow()[1].loading);
        assert!(seen.borrow()[1].executing);

        manual.emit(ExecutorResult {
            data: result_of(vec![("a", 1.into()), ("b", 2.into()), ("c", 3.into())]),
            errors: Vec::new(),
        });
        manual.complete();
        scheduler.run_until_idle();

        let final_state = seen.borrow().last().unwrap().clone();
        assert!(!final_state.loading);
        assert!(!final_state.executing);
        assert!(final_state.canonical);
        assert!(!final_state.stale);
        assert!(final_state.errors.is_empty());
        assert_eq!(
            final_state.data.unwrap().as_ref(),
            &JsonValue::Object(result_of(vec![("a", 1.into()), ("b", 2.into()), ("c", 3.into())]))
        );
    }

    #[test]
    fn cannot_execute_while_an_execution_is_already_in_flight() {
        let scheduler = Rc::new(DeterministicScheduler::new());
        let executor: Rc<dyn Executor> = Rc::new(ManualExecutor::new());
        let op = new_operation(query(vec![leaf("a")]), executor, scheduler);

        op.execute(None).unwrap();
        let err = op.execute(None).unwrap_err();
        assert_eq!(err, OperationError::AlreadyExecuting);
    }

    #[test]
    fn executor_errors_with_data_quarantine_the_operation_without_terminating_the_observer() {
        let scheduler = Rc::new(DeterministicScheduler::new());
        let manual = Rc::new(ManualExecutor::new());
        let executor: Rc<dyn Executor> = manual.clone();
        let op = new_operation(query(vec![leaf("a")]), executor, scheduler.clone());

        let next_count = Rc::new(Cell::new(0));
        let next_count_for_sub = next_count.clone();
        let _sub = op.subscribe(OperationObserver::new().on_next(move |_| next_count_for_sub.set(next_count_for_sub.get() + 1)));
        scheduler.run_until_idle();
        assert_eq!(next_count.get(), 1);

        op.execute(None).unwrap();
        manual.emit(ExecutorResult {
            data: JsonMap::new(),
            errors: vec![GraphQLError::new("boom")],
        });
        scheduler.run_until_idle();

        let state = op.get_state();
        assert!(state.canonical);
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].message, "boom");
        // the observer is still live: a later successful execute still reaches it.
        assert!(next_count.get() >= 2);
    }

    #[test]
    fn a_transport_error_leaves_execution_state_untouched() {
        let scheduler = Rc::new(DeterministicScheduler::new());
        let manual = Rc::new(ManualExecutor::new());
        let executor: Rc<dyn Executor> = manual.clone();
        let op = new_operation(query(vec![leaf("a")]), executor, scheduler.clone());

        let errors_seen = Rc::new(Cell::new(0));
        let errors_seen_for_sub = errors_seen.clone();
        let _sub = op.subscribe(OperationObserver::new().on_error(move |_| errors_seen_for_sub.set(errors_seen_for_sub.get() + 1)));
        scheduler.run_until_idle();

        op.execute(None).unwrap();
        scheduler.run_until_idle();
        assert!(op.get_state().executing);

        manual.error(Rc::new(std::io::Error::other("transport down")));
        scheduler.run_until_idle();

        assert_eq!(errors_seen.get(), 1);
        let state = op.get_state();
        assert!(state.loading, "loading must stay true until complete or stopExecuting");
        assert!(state.executing, "executing must stay true until complete or stopExecuting");
        // a concurrent execute must still be refused: the execution is still in flight.
        assert_eq!(op.execute(None).unwrap_err(), OperationError::AlreadyExecuting);
    }

    #[test]
    fn maybe_execute_reads_straight_from_the_cache_on_a_hit() {
        let scheduler = Rc::new(DeterministicScheduler::new());
        let manual = Rc::new(ManualExecutor::new());
        let executor: Rc<dyn Executor> = manual.clone();
        let graph = Store::new(NoDataId);
        graph
            .write(WriteInput {
                id: EntityId::from("query"),
                selection_set: &query(vec![leaf("a")]).selection_set,
                variables: &VariableValues::new(),
                fragments: &FragmentMap::new(),
                data: result_of(vec![("a", 1.into())]),
            })
            .unwrap();

        let op = ObservableOperation::new(
            NewOperationParams {
                graph,
                executor,
                operation: query(vec![leaf("a")]),
                fragments: None,
                initial_variables: None,
            },
            scheduler.clone() as Rc<dyn Scheduler>,
        )
        .unwrap();

        op.maybe_execute(None).unwrap();
        scheduler.run_until_idle();

        assert_eq!(manual.call_count.get(), 0, "a cache hit must never reach the executor");
        let state = op.get_state();
        assert!(!state.canonical);
        assert!(!state.stale);
        assert_eq!(state.data.unwrap().as_ref(), &JsonValue::Object(result_of(vec![("a", 1.into())])));
    }

    #[test]
    fn maybe_execute_falls_back_to_execute_on_a_partial_read() {
        let scheduler = Rc::new(DeterministicScheduler::new());
        let manual = Rc::new(ManualExecutor::new());
        let executor: Rc<dyn Executor> = manual.clone();
        let op = new_operation(query(vec![leaf("a")]), executor, scheduler.clone());

        op.maybe_execute(None).unwrap();
        scheduler.run_until_idle();

        assert_eq!(manual.call_count.get(), 1, "a partial read must fall back to a full execution");
        assert!(op.get_state().executing);

        manual.emit(ExecutorResult {
            data: result_of(vec![("a", 1.into())]),
            errors: Vec::new(),
        });
        manual.complete();
        scheduler.run_until_idle();

        let state = op.get_state();
        assert!(state.canonical);
        assert_eq!(state.data.unwrap().as_ref(), &JsonValue::Object(result_of(vec![("a", 1.into())])));
    }

    #[test]
    fn stop_executing_unsubscribes_and_resets_flags() {
        let scheduler = Rc::new(DeterministicScheduler::new());
        let manual = Rc::new(ManualExecutor::new());
        let executor: Rc<dyn Executor> = manual.clone();
        let op = new_operation(query(vec![leaf("a")]), executor, scheduler.clone());

        op.execute(None).unwrap();
        scheduler.run_until_idle();
        assert!(op.get_state().loading);
        assert!(op.get_state().executing);

        op.stop_executing();
        let state = op.get_state();
        assert!(!state.loading);
        assert!(!state.executing);

        // a late result from the now-unsubscribed executor must not resurrect state.
        manual.emit(ExecutorResult {
            data: result_of(vec![("a", 1.into())]),
            errors: Vec::new(),
        });
        scheduler.run_until_idle();
        assert!(!op.get_state().loading);

        // a new execute is accepted immediately: stopExecuting cleared `execution`.
        op.execute(None).unwrap();

        // calling stop_executing again is a no-op.
        op.stop_executing();
        op.stop_executing();
        assert!(!op.get_state().executing);
    }
}
