//! Per-evaluation transactions.
//!
//! A transaction bounds one evaluation of one atom. While it is live, every
//! `watch` performed by the producer records a dependency edge against the
//! transaction's key. Its two closure slots carry the graph bookkeeping:
//! the begin slot detaches the previous run's dependency edges (capturing
//! the old set), and the cleanup slot it returns diffs that set against the
//! freshly recorded one, releasing upstreams the new run no longer reads.
//!
//! Creating a new transaction for a key terminates the prior one first.
//! Termination also gates late async results: a refresh whose transaction
//! was terminated discards its value instead of writing the cache.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use covalent_core::AtomKey;

type Cleanup = Box<dyn FnOnce()>;
type Begin = Box<dyn FnOnce() -> Cleanup>;

/// One evaluation of one atom.
pub struct Transaction {
    key: AtomKey,
    terminated: Cell<bool>,
    begin: RefCell<Option<Begin>>,
    cleanup: RefCell<Option<Cleanup>>,
    termination_hooks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl Transaction {
    /// Creates a transaction for `key` with its begin step.
    pub(crate) fn new(key: AtomKey, begin: impl FnOnce() -> Cleanup + 'static) -> Rc<Self> {
        Rc::new(Transaction {
            key,
            terminated: Cell::new(false),
            begin: RefCell::new(Some(Box::new(begin))),
            cleanup: RefCell::new(None),
            termination_hooks: RefCell::new(Vec::new()),
        })
    }

    /// Returns the key under evaluation.
    #[inline]
    pub fn key(&self) -> &AtomKey {
        &self.key
    }

    /// Returns true once the transaction has been terminated.
    ///
    /// Producers and refreshes check this before writing results; a
    /// terminated transaction's value is discarded.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.terminated.get()
    }

    /// Registers extra teardown to run if the transaction is terminated.
    ///
    /// Used by async producers to cancel in-flight work when a newer
    /// evaluation supersedes this one.
    pub fn on_termination(&self, hook: impl FnOnce() + 'static) {
        if self.terminated.get() {
            hook();
        } else {
            self.termination_hooks.borrow_mut().push(Box::new(hook));
        }
    }

    /// Runs the begin step once, retaining the cleanup it returns.
    pub(crate) fn begin(&self) {
        let begin = self.begin.borrow_mut().take();
        if let Some(begin) = begin {
            let cleanup = begin();
            *self.cleanup.borrow_mut() = Some(cleanup);
        }
    }

    /// Runs the retained cleanup once.
    pub(crate) fn commit(&self) {
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }

    /// Terminates the transaction: flips the flag, runs termination hooks,
    /// and forces any outstanding begin/cleanup so the graph bookkeeping
    /// still completes.
    pub(crate) fn terminate(&self) {
        if self.terminated.replace(true) {
            return;
        }
        let hooks: Vec<_> = self.termination_hooks.borrow_mut().drain(..).collect();
        for hook in hooks {
            hook();
        }
        self.begin();
        self.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use core::cell::RefCell;

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    struct Probe;

    fn probe_key() -> AtomKey {
        AtomKey::new(&Probe, None)
    }

    #[test]
    fn test_begin_then_commit_runs_each_step_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let begin_log = log.clone();

        let transaction = Transaction::new(probe_key(), move || {
            begin_log.borrow_mut().push("begin");
            let cleanup_log = begin_log.clone();
            Box::new(move || cleanup_log.borrow_mut().push("cleanup"))
        });

        transaction.begin();
        transaction.begin(); // second call is a no-op
        transaction.commit();
        transaction.commit(); // cleanup already consumed

        assert_eq!(*log.borrow(), ["begin", "cleanup"]);
    }

    #[test]
    fn test_terminate_forces_outstanding_steps() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let begin_log = log.clone();

        let transaction = Transaction::new(probe_key(), move || {
            begin_log.borrow_mut().push("begin");
            let cleanup_log = begin_log.clone();
            Box::new(move || cleanup_log.borrow_mut().push("cleanup"))
        });

        assert!(!transaction.is_terminated());
        transaction.terminate();

        assert!(transaction.is_terminated());
        assert_eq!(*log.borrow(), ["begin", "cleanup"]);
    }

    #[test]
    fn test_terminate_twice_is_idempotent() {
        let count = Rc::new(RefCell::new(0));
        let begin_count = count.clone();

        let transaction = Transaction::new(probe_key(), move || {
            *begin_count.borrow_mut() += 1;
            Box::new(|| {})
        });

        transaction.terminate();
        transaction.terminate();

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_termination_hooks_run_on_terminate() {
        let count = Rc::new(RefCell::new(0));
        let hook_count = count.clone();

        let transaction = Transaction::new(probe_key(), || Box::new(|| {}));
        transaction.on_termination(move || *hook_count.borrow_mut() += 1);

        transaction.begin();
        transaction.commit();
        assert_eq!(*count.borrow(), 0); // a committed run is not a termination

        transaction.terminate();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_hook_registered_after_termination_runs_immediately() {
        let count = Rc::new(RefCell::new(0));
        let hook_count = count.clone();

        let transaction = Transaction::new(probe_key(), || Box::new(|| {}));
        transaction.terminate();
        transaction.on_termination(move || *hook_count.borrow_mut() += 1);

        assert_eq!(*count.borrow(), 1);
    }
}
