//! The store's mutable tables.
//!
//! `AtomStore` is the plain data record behind every context: the
//! dependency graph, the per-key value caches, the per-key coordinator
//! states, and the per-key subscription maps. Caches and coordinators are
//! heterogeneous, so they are stored type-erased and recovered by downcast
//! on retrieval; a failed downcast is a user key collision, which the
//! kernel logs and answers by releasing the entry.

use crate::atom::Atom;
use crate::context::StoreContext;
use crate::overrides::OverrideFn;
use crate::subscription::Subscription;
use crate::transaction::Transaction;
use alloc::boxed::Box;
use alloc::rc::Rc;
use core::any::Any;
use covalent_core::{AtomKey, DependencyGraph, SubscriberKey};
use hashbrown::HashMap;

/// The cached value of one atom under one key.
///
/// The stored atom instance is the descriptor that produced the current
/// value. When the cell was created through an override, the override
/// producer rides along so propagation can re-evaluate this cell at its
/// existing key from any context.
pub(crate) struct AtomCache<N: Atom> {
    pub atom: N,
    pub value: N::Value,
    pub overridden: Option<Rc<OverrideFn<N>>>,
}

impl<N: Atom> Clone for AtomCache<N> {
    fn clone(&self) -> Self {
        AtomCache {
            atom: self.atom.clone(),
            value: self.value.clone(),
            overridden: self.overridden.clone(),
        }
    }
}

/// Type-erased cache entry.
///
/// `reset` is the typed re-evaluation entry point used by update
/// propagation: the concrete atom type is closed over at insertion time,
/// so children can be rebuilt without knowing their types.
pub(crate) trait AnyAtomCache {
    fn as_any(&self) -> &dyn Any;

    fn clone_boxed(&self) -> Box<dyn AnyAtomCache>;

    /// Whether the stored atom requests keep-alive.
    fn keep_alive(&self) -> bool;

    /// Re-evaluates the stored atom at `key` and propagates the change.
    fn reset(&self, context: &StoreContext, key: &AtomKey);
}

impl<N: Atom> AnyAtomCache for AtomCache<N> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn AnyAtomCache> {
        Box::new(self.clone())
    }

    fn keep_alive(&self) -> bool {
        self.atom.keep_alive()
    }

    fn reset(&self, context: &StoreContext, key: &AtomKey) {
        context.reset_existing(self.atom.clone(), key, self.overridden.clone());
    }
}

/// Per-key coordinator state and the in-flight evaluation, if any.
pub(crate) struct AtomStateEntry {
    /// Type-erased `Rc<RefCell<N::Coordinator>>`.
    pub coordinator: Rc<dyn Any>,
    pub transaction: Option<Rc<Transaction>>,
}

impl AtomStateEntry {
    pub(crate) fn new(coordinator: Rc<dyn Any>) -> Self {
        AtomStateEntry {
            coordinator,
            transaction: None,
        }
    }
}

/// The shared mutable record behind every context.
#[derive(Default)]
pub(crate) struct AtomStore {
    pub graph: DependencyGraph,
    pub caches: HashMap<AtomKey, Box<dyn AnyAtomCache>>,
    pub states: HashMap<AtomKey, AtomStateEntry>,
    pub subscriptions: HashMap<AtomKey, HashMap<SubscriberKey, Subscription>>,
}

impl AtomStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// True when `key` has no live subscriptions.
    pub(crate) fn has_no_subscriptions(&self, key: &AtomKey) -> bool {
        self.subscriptions.get(key).map_or(true, HashMap::is_empty)
    }
}
