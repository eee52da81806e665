//! The one configuration seam this crate exposes (§10.3): how deferred state
//! delivery (§3, §5) is scheduled. A host wires this to whatever turns its
//! event loop — `tokio::task::spawn_local`, a GUI's idle callback, or, in
//! tests, the bundled [`DeterministicScheduler`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Schedules a unit of work to run on a later turn of whatever loop hosts this
/// crate. `!Send` by design — the core is single-threaded (§5).
pub trait Scheduler {
    fn schedule(&self, task: Box<dyn FnOnce() + 'static>);
}

/// A [`Scheduler`] that queues tasks instead of running them, for tests that
/// want to assert on `OperationState` transitions one deferred delivery at a
/// time (§10.4). Also usable by an embedder's own UI-binding tests that want
/// synchronous-enough behavior without a real async runtime.
#[derive(Clone, Default)]
pub struct DeterministicScheduler {
    queue: Rc<RefCell<VecDeque<Box<dyn FnOnce()>>>>,
}

impl DeterministicScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every task currently queued, including any newly queued by running
    /// them (so that a chain of deferred updates drains completely).
    pub fn run_until_idle(&self) {
        loop {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(task) => task(),
                None => break,
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl Scheduler for DeterministicScheduler {
    fn schedule(&self, task: Box<dyn FnOnce() + 'static>) {
        self.queue.borrow_mut().push_back(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn runs_tasks_in_fifo_order() {
        let scheduler = DeterministicScheduler::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let seen = seen.clone();
            scheduler.schedule(Box::new(move || seen.borrow_mut().push(i)));
        }
        scheduler.run_until_idle();
        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn drains_tasks_scheduled_by_running_tasks() {
        let scheduler = DeterministicScheduler::new();
        let depth = Rc::new(Cell::new(0));
        let scheduler_for_task = scheduler.clone();
        let depth_for_task = depth.clone();
        scheduler.schedule(Box::new(move || {
            depth_for_task.set(depth_for_task.get() + 1);
            if depth_for_task.get() < 3 {
                let depth_inner = depth_for_task.clone();
                scheduler_for_task.schedule(Box::new(move || depth_inner.set(depth_inner.get() + 1)));
            }
        }));
        scheduler.run_until_idle();
        assert!(depth.get() >= 3);
        assert_eq!(scheduler.pending(), 0);
    }
}
