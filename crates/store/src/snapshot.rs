//! Point-in-time store snapshots.
//!
//! A snapshot is an immutable copy of the graph, the caches, and the
//! subscription map, taken after a store mutation or on demand. It can look
//! up cached values, restore the store to the captured state, and render
//! the dependency graph in DOT form for debugging.

use crate::atom::Atom;
use crate::context::StoreContext;
use crate::observer::Observer;
use crate::state::{AnyAtomCache, AtomCache, AtomStore};
use crate::subscription::Subscription;
use alloc::boxed::Box;
use alloc::collections::BTreeSet;
use alloc::format;
use alloc::rc::Weak;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use covalent_core::{AtomKey, DependencyGraph, SubscriberKey};
use hashbrown::HashMap;

/// An immutable copy of the store's observable state.
pub struct Snapshot {
    graph: DependencyGraph,
    caches: HashMap<AtomKey, Box<dyn AnyAtomCache>>,
    subscriptions: HashMap<AtomKey, HashMap<SubscriberKey, Subscription>>,
    store: Weak<RefCell<AtomStore>>,
    observers: Vec<Observer>,
}

impl Snapshot {
    pub(crate) fn new(
        graph: DependencyGraph,
        caches: HashMap<AtomKey, Box<dyn AnyAtomCache>>,
        subscriptions: HashMap<AtomKey, HashMap<SubscriberKey, Subscription>>,
        store: Weak<RefCell<AtomStore>>,
        observers: Vec<Observer>,
    ) -> Self {
        Snapshot {
            graph,
            caches,
            subscriptions,
            store,
            observers,
        }
    }

    /// Returns the captured value of `atom`, if it was cached.
    ///
    /// Lookup uses the unscoped key: a snapshot is captured per store, not
    /// per scope. Scoped entries remain visible in `graph_description`.
    pub fn lookup<N: Atom>(&self, atom: &N) -> Option<N::Value> {
        let key = AtomKey::unscoped(atom);
        self.caches
            .get(&key)?
            .as_any()
            .downcast_ref::<AtomCache<N>>()
            .map(|cache| cache.value.clone())
    }

    /// Returns true if nothing was cached when the snapshot was taken.
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Returns the number of captured caches.
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    /// Restores the originating store to this snapshot's state.
    ///
    /// Every captured key gets its cache and edges written back; upstreams
    /// the captured graph no longer references are released, and each
    /// restored key's current subscriptions fire exactly once. A snapshot
    /// outliving its store is a quiet no-op.
    pub fn restore(&self) {
        if let Some(store) = self.store.upgrade() {
            StoreContext::from_store(store, self.observers.clone()).restore(self);
        }
    }

    /// Renders the captured graph as a DOT digraph.
    ///
    /// Statements are deduplicated and alphabetically sorted so the output
    /// is stable across runs.
    pub fn graph_description(&self) -> String {
        let mut statements = BTreeSet::new();

        for key in self.caches.keys() {
            statements.insert(format!("\"{}\";", key.description()));
        }
        for (upstream, child) in self.graph.edges() {
            statements.insert(format!(
                "\"{}\" -> \"{}\";",
                upstream.description(),
                child.description()
            ));
        }
        for (key, subscriptions) in &self.subscriptions {
            for subscription in subscriptions.values() {
                let location = subscription.location();
                statements.insert(format!("\"{}\" [style=filled];", location.file()));
                statements.insert(format!(
                    "\"{}\" -> \"{}\" [label=\"line:{}\"];",
                    key.description(),
                    location.file(),
                    location.line()
                ));
            }
        }

        let mut output = String::from("digraph {\n  node [shape=box]\n");
        for statement in &statements {
            output.push_str("  ");
            output.push_str(statement);
            output.push('\n');
        }
        output.push('}');
        output
    }

    /// Returns the captured dependency graph.
    #[inline]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub(crate) fn cache_keys(&self) -> Vec<AtomKey> {
        self.caches.keys().cloned().collect()
    }

    pub(crate) fn cache(&self, key: &AtomKey) -> Option<&dyn AnyAtomCache> {
        self.caches.get(key).map(|cache| &**cache)
    }
}
