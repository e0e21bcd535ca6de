//! Store observers.
//!
//! An observer receives an immutable snapshot after every operation that
//! may have changed the externally visible graph: cache creation, release,
//! subscription, update, unsubscription, and restore. Observers are a
//! debugging and tooling aid, not a commit log; consecutive snapshots may
//! describe the same state.

use crate::snapshot::Snapshot;
use alloc::rc::Rc;

/// A hook receiving a snapshot after each store mutation.
#[derive(Clone)]
pub struct Observer {
    on_update: Rc<dyn Fn(&Snapshot)>,
}

impl Observer {
    /// Creates an observer from a snapshot callback.
    pub fn new(on_update: impl Fn(&Snapshot) + 'static) -> Self {
        Observer {
            on_update: Rc::new(on_update),
        }
    }

    /// Delivers one snapshot.
    pub(crate) fn notify(&self, snapshot: &Snapshot) {
        (self.on_update)(snapshot);
    }
}
