//! Minimal observable primitive (§4.C): a factory takes a subscriber function
//! `(observer) -> teardown`. `subscribe` accepts `{next?, error?, complete?}`
//! and returns a handle whose `unsubscribe` is idempotent. `error`/`complete`
//! are terminal: no further `next` is delivered after either.
//!
//! Single-threaded per §5 — no `Send`/`Sync` bounds, `Rc`/`RefCell` throughout.

use std::cell::RefCell;
use std::rc::Rc;

/// The `{next?, error?, complete?}` bag a subscriber supplies to `subscribe`.
pub struct Observer<T, E> {
    next: Option<Box<dyn FnMut(T)>>,
    error: Option<Box<dyn FnMut(E)>>,
    complete: Option<Box<dyn FnMut()>>,
    terminated: bool,
}

impl<T, E> Default for Observer<T, E> {
    fn default() -> Self {
        Self {
            next: None,
            error: None,
            complete: None,
            terminated: false,
        }
    }
}

impl<T, E> Observer<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_next(mut self, f: impl FnMut(T) + 'static) -> Self {
        self.next = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(E) + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnMut() + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }

    /// Delivers `value` via the `next` callback, if any and not yet terminated.
    pub fn next(&mut self, value: T) {
        if self.terminated {
            return;
        }
        if let Some(f) = self.next.as_mut() {
            f(value);
        }
    }

    /// Delivers `err` via the `error` callback and terminates this observer.
    pub fn error(&mut self, err: E) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        if let Some(f) = self.error.as_mut() {
            f(err);
        }
    }

    /// Delivers completion and terminates this observer.
    pub fn complete(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        if let Some(f) = self.complete.as_mut() {
            f();
        }
    }
}

type Teardown = Box<dyn FnMut()>;

/// A cold observable: nothing happens until [`Observable::subscribe`] is called.
pub struct Observable<T, E> {
    subscribe_fn: Rc<dyn Fn(Observer<T, E>) -> Teardown>,
}

impl<T, E> Clone for Observable<T, E> {
    fn clone(&self) -> Self {
        Self {
            subscribe_fn: self.subscribe_fn.clone(),
        }
    }
}

impl<T: 'static, E: 'static> Observable<T, E> {
    pub fn new(f: impl Fn(Observer<T, E>) -> Teardown + 'static) -> Self {
        Self {
            subscribe_fn: Rc::new(f),
        }
    }

    pub fn subscribe(&self, observer: Observer<T, E>) -> Subscription {
        let teardown = (self.subscribe_fn)(observer);
        Subscription::new(teardown)
    }
}

/// Handle returned by [`Observable::subscribe`]. `unsubscribe` is idempotent:
/// calling it twice only runs the teardown once.
pub struct Subscription {
    teardown: Rc<RefCell<Option<Teardown>>>,
}

impl Subscription {
    fn new(teardown: Teardown) -> Self {
        Self {
            teardown: Rc::new(RefCell::new(Some(teardown))),
        }
    }

    /// Builds a subscription straight from a teardown closure, for callers that
    /// manage their own subscriber list instead of going through an [`Observable`]
    /// (e.g. [`crate::operation::ObservableOperation::subscribe`]).
    pub fn new_for(teardown: impl FnMut() + 'static) -> Self {
        Self::new(Box::new(teardown))
    }

    pub fn unsubscribe(&self) {
        if let Some(mut teardown) = self.teardown.borrow_mut().take() {
            teardown();
        }
    }
}
