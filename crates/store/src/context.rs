//! The store kernel.
//!
//! `StoreContext` mediates every interaction with the atom store: reads,
//! watches, writes, refreshes, resets, snapshots, and scope derivation. A
//! context is a lightweight handle: a shared reference to the store's
//! tables plus the scope inheritance, observer list, and override table of
//! the position it was derived at. Deriving a scope clones the handle;
//! the underlying tables are shared by every context of one store.
//!
//! All operations run on one thread and are reentrant: an update resets
//! children, which re-enters `watch`, which may build caches and run
//! producers. The rule that makes this safe is simple and absolute: no
//! borrow of the store's tables is ever held across user code (producers,
//! subscription callbacks, observers, hooks).

use crate::atom::{Atom, RefreshableAtom, ResettableAtom, WritableAtom};
use crate::observer::Observer;
use crate::overrides::{OverrideFn, OverrideTable, Overrides, ResolvedOverride};
use crate::snapshot::Snapshot;
use crate::state::{AnyAtomCache, AtomCache, AtomStateEntry, AtomStore};
use crate::subscription::{Subscriber, Subscription};
use crate::transaction::Transaction;
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell, RefMut};
use core::panic::Location;
use covalent_core::{AtomKey, Error, ScopeId, ScopeKey, SubscriberKey};
use hashbrown::{HashMap, HashSet};

/// Handle to the store from one scope position.
#[derive(Clone)]
pub struct StoreContext {
    store: Rc<RefCell<AtomStore>>,
    scope_key: Option<ScopeKey>,
    inherited_scope_keys: HashMap<ScopeId, ScopeKey>,
    observers: Vec<Observer>,
    overrides: OverrideTable,
}

impl StoreContext {
    /// Creates a fresh store with a root context.
    pub fn new() -> Self {
        Self::with(Vec::new(), Overrides::new())
    }

    /// Creates a fresh store with root observers and overrides.
    ///
    /// Root overrides are unscoped: matched atoms keep their plain keys.
    pub fn with(observers: Vec<Observer>, overrides: Overrides) -> Self {
        let mut table = OverrideTable::default();
        table.extend(overrides, false);
        StoreContext {
            store: Rc::new(RefCell::new(AtomStore::new())),
            scope_key: None,
            inherited_scope_keys: HashMap::new(),
            observers,
            overrides: table,
        }
    }

    /// Rebuilds a bare context over an existing store.
    ///
    /// Used by detached callbacks (transaction cleanups, subscriber
    /// disposal, snapshot restore) which operate on the shared tables
    /// without any scope information.
    pub(crate) fn from_store(store: Rc<RefCell<AtomStore>>, observers: Vec<Observer>) -> Self {
        StoreContext {
            store,
            scope_key: None,
            inherited_scope_keys: HashMap::new(),
            observers,
            overrides: OverrideTable::default(),
        }
    }

    /// Derives a child context for a new scope.
    ///
    /// Atoms declaring `scope_id`, and atoms matched by one of `overrides`
    /// (which are installed as scoped), are re-keyed under `scope_key`.
    /// Observers accumulate: the child's observers receive snapshots in
    /// addition to every inherited one.
    pub fn scoped(
        &self,
        scope_key: ScopeKey,
        scope_id: ScopeId,
        observers: Vec<Observer>,
        overrides: Overrides,
    ) -> StoreContext {
        let mut inherited_scope_keys = self.inherited_scope_keys.clone();
        inherited_scope_keys.insert(scope_id, scope_key);
        let mut table = self.overrides.clone();
        table.extend(overrides, true);
        let mut merged_observers = self.observers.clone();
        merged_observers.extend(observers);
        StoreContext {
            store: self.store.clone(),
            scope_key: Some(scope_key),
            inherited_scope_keys,
            observers: merged_observers,
            overrides: table,
        }
    }

    /// Derives a child context in the same scope.
    ///
    /// Observers accumulate; `overrides` are installed unscoped.
    pub fn inherited(&self, observers: Vec<Observer>, overrides: Overrides) -> StoreContext {
        let mut table = self.overrides.clone();
        table.extend(overrides, false);
        let mut merged_observers = self.observers.clone();
        merged_observers.extend(observers);
        StoreContext {
            store: self.store.clone(),
            scope_key: self.scope_key,
            inherited_scope_keys: self.inherited_scope_keys.clone(),
            observers: merged_observers,
            overrides: table,
        }
    }

    /// Reads `atom` once, without retaining it.
    ///
    /// If no cache exists one is built, but since reading records neither
    /// an edge nor a subscription the new cache is immediately re-checked
    /// for release; only `keep_alive` (unscoped) atoms survive a bare read.
    pub fn read<N: Atom>(&self, atom: N) -> N::Value {
        let (key, overridden) = self.resolve(&atom);
        let value = self.get_or_create_value(atom, &key, overridden);
        self.check_and_release(&key);
        value
    }

    /// Watches `atom` from a producer's transaction.
    ///
    /// Ensures a cache exists and records the dependency edge
    /// `transaction.key → atom`. A terminated transaction records nothing
    /// and degrades to a bare read.
    pub fn watch_in<N: Atom>(&self, atom: N, transaction: &Rc<Transaction>) -> N::Value {
        if transaction.is_terminated() {
            return self.read(atom);
        }
        let (key, overridden) = self.resolve(&atom);
        let value = self.get_or_create_value(atom, &key, overridden);
        self.store
            .borrow_mut()
            .graph
            .add_edge(transaction.key(), &key);
        value
    }

    /// Watches `atom` on behalf of a view subscriber.
    ///
    /// The first watch per subscriber installs the subscription, wires the
    /// subscriber's drop-time unsubscribe, and notifies observers; repeats
    /// are idempotent and just return the value.
    #[track_caller]
    pub fn watch<N: Atom>(
        &self,
        atom: N,
        subscriber: &Subscriber,
        update: impl Fn() + 'static,
    ) -> N::Value {
        let location = Location::caller();
        let (key, overridden) = self.resolve(&atom);
        let value = self.get_or_create_value(atom, &key, overridden);

        if subscriber.insert_subscribing(&key) {
            self.store
                .borrow_mut()
                .subscriptions
                .entry(key.clone())
                .or_default()
                .insert(
                    subscriber.key(),
                    Subscription::new(Rc::new(update), location),
                );

            let store = Rc::downgrade(&self.store);
            let observers = self.observers.clone();
            let subscriber_key = subscriber.key();
            subscriber.set_unsubscribe(move |keys: HashSet<AtomKey>| {
                if let Some(store) = store.upgrade() {
                    StoreContext::from_store(store, observers)
                        .unsubscribe_keys(keys, subscriber_key);
                }
            });

            self.notify_observers();
        }
        value
    }

    /// Removes `subscriber`'s subscription to `atom` and re-checks release.
    pub fn unwatch<N: Atom>(&self, atom: &N, subscriber: &Subscriber) {
        let (key, _) = self.resolve(atom);
        subscriber.remove_subscribing(&key);
        self.unsubscribe_keys([key], subscriber.key());
    }

    /// Writes `value` into `atom`'s cache and propagates.
    ///
    /// A write terminates the key's in-flight evaluation, so a concurrent
    /// refresh that completes later finds its transaction terminated and
    /// discards its result. Writing an atom with no cache is a no-op:
    /// nothing retains it and there is no one to tell.
    pub fn set<N: WritableAtom>(&self, atom: N, value: N::Value) {
        let (key, _) = self.resolve(&atom);
        self.terminate_transaction(&key);
        self.update_value(atom, &key, value);
    }

    /// Read–modify–write on `atom`'s cached value.
    pub fn modify<N: WritableAtom>(&self, atom: N, body: impl FnOnce(&mut N::Value)) {
        let (key, _) = self.resolve(&atom);
        let Some(cache) = self.lookup_cache::<N>(&key) else {
            return;
        };
        self.terminate_transaction(&key);
        let mut value = cache.value;
        body(&mut value);
        self.update_value(atom, &key, value);
    }

    /// Recomputes `atom` asynchronously.
    ///
    /// The produced value is returned either way; it is written to the
    /// cache and propagated only if the refresh transaction survived.
    /// Dropping the returned future cancels the refresh outright.
    pub async fn refresh<N: RefreshableAtom>(&self, atom: N) -> N::Value {
        let (key, overridden) = self.resolve(&atom);
        let producer = overridden.map(|o| o.producer);
        let context = self.prepare_transaction::<N>(&key);
        context.transaction().begin();
        let value = match &producer {
            Some(produce) => atom.manage_overridden(produce.value(&atom), &context),
            None => atom.refresh(&context).await,
        };
        context.transaction().commit();
        if context.transaction().is_terminated() {
            return value;
        }
        if self.lookup_cache::<N>(&key).is_some() {
            self.update_value(atom, &key, value.clone());
        }
        value
    }

    /// Rebuilds `atom`'s cache as if first created and propagates.
    pub fn reset<N: Atom>(&self, atom: N) {
        let (key, overridden) = self.resolve(&atom);
        if let Some(old) = self.lookup_cache::<N>(&key) {
            let new_value = self.make_cache_value(atom.clone(), &key, overridden);
            self.propagate_update(&atom, &key, new_value, old.value);
        }
    }

    /// Invokes `atom`'s user reset hook.
    ///
    /// The hook acts through this context, typically writing or resetting
    /// other atoms. It never creates or destroys `atom`'s own cache, so
    /// an overridden cell keeps its override value.
    pub fn custom_reset<N: ResettableAtom>(&self, atom: N) {
        atom.reset(self);
    }

    /// Returns `atom`'s cached value without creating one.
    pub fn lookup<N: Atom>(&self, atom: &N) -> Option<N::Value> {
        let (key, _) = self.resolve(atom);
        self.lookup_cache::<N>(&key).map(|cache| cache.value)
    }

    /// Captures an immutable snapshot of graph, caches, and subscriptions.
    pub fn snapshot(&self) -> Snapshot {
        let store = self.store.borrow();
        let caches = store
            .caches
            .iter()
            .map(|(key, cache)| (key.clone(), cache.clone_boxed()))
            .collect();
        Snapshot::new(
            store.graph.clone(),
            caches,
            store.subscriptions.clone(),
            Rc::downgrade(&self.store),
            self.observers.clone(),
        )
    }

    /// Restores the store to `snapshot`'s state.
    ///
    /// Overwrites the cache and edges of every captured key, releases
    /// upstreams the captured graph no longer references, fires each
    /// restored key's current subscriptions exactly once, and notifies
    /// observers once at the end.
    pub fn restore(&self, snapshot: &Snapshot) {
        let keys = snapshot.cache_keys();
        let mut obsoleted = Vec::new();
        {
            let mut store = self.store.borrow_mut();
            for key in &keys {
                let old_dependencies = store.graph.dependencies(key).cloned().unwrap_or_default();
                let new_dependencies = snapshot
                    .graph()
                    .dependencies(key)
                    .cloned()
                    .unwrap_or_default();
                if let Some(cache) = snapshot.cache(key) {
                    store.caches.insert(key.clone(), cache.clone_boxed());
                }
                store.graph.set_dependencies(key, new_dependencies.clone());
                store
                    .graph
                    .set_children(key, snapshot.graph().children(key).cloned().unwrap_or_default());
                obsoleted.extend(
                    old_dependencies
                        .difference(&new_dependencies)
                        .cloned(),
                );
            }
        }
        for key in obsoleted {
            self.check_and_release(&key);
        }
        let subscriptions: Vec<Subscription> = {
            let store = self.store.borrow();
            keys.iter()
                .filter_map(|key| store.subscriptions.get(key))
                .flat_map(|subscriptions| subscriptions.values().cloned())
                .collect()
        };
        for subscription in subscriptions {
            subscription.notify();
        }
        self.notify_observers();
    }

    // ---- effective-key resolution -------------------------------------

    /// Resolves `atom`'s effective key and override.
    ///
    /// A scoped override re-keys the atom into the current scope; failing
    /// that, a declared `scope_id` re-keys it into the matching inherited
    /// scope; otherwise the key is plain.
    fn resolve<N: Atom>(&self, atom: &N) -> (AtomKey, Option<ResolvedOverride<N>>) {
        let overridden = self.overrides.lookup(atom);
        let scope = match &overridden {
            Some(o) if o.is_scoped => self.scope_key,
            _ => atom
                .scope_id()
                .and_then(|id| self.inherited_scope_keys.get(&id).copied()),
        };
        (AtomKey::new(atom, scope), overridden)
    }

    // ---- cache management ---------------------------------------------

    /// Typed cache retrieval with the collision guard.
    ///
    /// A stored entry of the wrong concrete type means two atom types
    /// materialised under one key; the entry is logged and released so the
    /// caller sees it as absent and recreates it.
    fn lookup_cache<N: Atom>(&self, key: &AtomKey) -> Option<AtomCache<N>> {
        let cache = {
            let store = self.store.borrow();
            match store.caches.get(key) {
                None => return None,
                Some(boxed) => boxed.as_any().downcast_ref::<AtomCache<N>>().cloned(),
            }
        };
        if cache.is_none() {
            log::warn!(
                "{}",
                Error::key_collision(key.description(), core::any::type_name::<N>())
            );
            self.release(key);
        }
        cache
    }

    fn get_or_create_value<N: Atom>(
        &self,
        atom: N,
        key: &AtomKey,
        overridden: Option<ResolvedOverride<N>>,
    ) -> N::Value {
        match self.lookup_cache::<N>(key) {
            Some(cache) => cache.value,
            None => self.make_cache_value(atom, key, overridden),
        }
    }

    fn make_cache_value<N: Atom>(
        &self,
        atom: N,
        key: &AtomKey,
        overridden: Option<ResolvedOverride<N>>,
    ) -> N::Value {
        self.rebuild_value(atom, key, overridden.map(|o| o.producer))
    }

    /// Runs the producer inside a fresh transaction and writes the cache.
    fn rebuild_value<N: Atom>(
        &self,
        atom: N,
        key: &AtomKey,
        producer: Option<Rc<OverrideFn<N>>>,
    ) -> N::Value {
        let context = self.prepare_transaction::<N>(key);
        context.transaction().begin();
        let value = match &producer {
            Some(produce) => atom.manage_overridden(produce.value(&atom), &context),
            None => atom.produce(&context),
        };
        context.transaction().commit();

        let cache = AtomCache {
            atom,
            value: value.clone(),
            overridden: producer,
        };
        self.store
            .borrow_mut()
            .caches
            .insert(key.clone(), Box::new(cache));
        self.notify_observers();
        value
    }

    /// Re-evaluates an existing cell at its key during propagation.
    ///
    /// Called through the type-erased cache entry, so scoped and
    /// overridden children rebuild correctly from any context.
    pub(crate) fn reset_existing<N: Atom>(
        &self,
        atom: N,
        key: &AtomKey,
        producer: Option<Rc<OverrideFn<N>>>,
    ) {
        if let Some(old) = self.lookup_cache::<N>(key) {
            let new_value = self.rebuild_value(atom.clone(), key, producer);
            self.propagate_update(&atom, key, new_value, old.value);
        }
    }

    // ---- transactions ---------------------------------------------------

    /// Terminates the key's in-flight evaluation, if any.
    fn terminate_transaction(&self, key: &AtomKey) {
        let transaction = {
            let mut store = self.store.borrow_mut();
            store
                .states
                .get_mut(key)
                .and_then(|state| state.transaction.take())
        };
        if let Some(transaction) = transaction {
            transaction.terminate();
        }
    }

    /// Opens a fresh evaluation of `key`, terminating the prior one.
    ///
    /// The transaction's begin step detaches the previous run's dependency
    /// edges; its cleanup diffs them against the freshly recorded set and
    /// releases upstreams no longer read.
    fn prepare_transaction<N: Atom>(&self, key: &AtomKey) -> TransactionContext<'_, N> {
        self.terminate_transaction(key);
        let coordinator = self.coordinator_handle::<N>(key);

        let store = Rc::downgrade(&self.store);
        let observers = self.observers.clone();
        let begin_key = key.clone();
        let transaction = Transaction::new(key.clone(), move || {
            let old_dependencies = match store.upgrade() {
                Some(store) => store.borrow_mut().graph.detach_dependencies(&begin_key),
                None => HashSet::new(),
            };
            let store = store.clone();
            Box::new(move || {
                let Some(store) = store.upgrade() else { return };
                let context = StoreContext::from_store(store, observers);
                let new_dependencies = context
                    .store
                    .borrow()
                    .graph
                    .dependencies(&begin_key)
                    .cloned()
                    .unwrap_or_default();
                for upstream in old_dependencies.difference(&new_dependencies) {
                    context.check_and_release(upstream);
                }
            })
        });

        {
            let mut store = self.store.borrow_mut();
            if let Some(state) = store.states.get_mut(key) {
                state.transaction = Some(transaction.clone());
            }
        }
        TransactionContext {
            store: self,
            transaction,
            coordinator,
        }
    }

    /// Gets or creates the coordinator for `key`, with the collision guard.
    fn coordinator_handle<N: Atom>(&self, key: &AtomKey) -> Rc<RefCell<N::Coordinator>> {
        let existing = {
            let store = self.store.borrow();
            store.states.get(key).map(|state| state.coordinator.clone())
        };
        if let Some(coordinator) = existing {
            match coordinator.downcast::<RefCell<N::Coordinator>>() {
                Ok(coordinator) => return coordinator,
                Err(_) => {
                    log::warn!(
                        "{}",
                        Error::key_collision(
                            key.description(),
                            core::any::type_name::<N::Coordinator>(),
                        )
                    );
                    self.release(key);
                }
            }
        }
        let coordinator = Rc::new(RefCell::new(N::Coordinator::default()));
        self.store
            .borrow_mut()
            .states
            .insert(key.clone(), AtomStateEntry::new(coordinator.clone()));
        coordinator
    }

    // ---- update propagation ---------------------------------------------

    /// Writes a new value into an existing cache and propagates.
    fn update_value<N: Atom>(&self, atom: N, key: &AtomKey, value: N::Value) {
        let Some(old) = self.lookup_cache::<N>(key) else {
            return;
        };
        {
            let mut store = self.store.borrow_mut();
            store.caches.insert(
                key.clone(),
                Box::new(AtomCache {
                    atom: atom.clone(),
                    value: value.clone(),
                    overridden: old.overridden,
                }),
            );
        }
        self.propagate_update(&atom, key, value, old.value);
    }

    /// The propagation body: subscribers, then children, then observers,
    /// then the atom's own `updated` hook.
    ///
    /// Subscribers must see the new value before derived atoms fire, and
    /// children re-record their edges against the freshly written cache.
    fn propagate_update<N: Atom>(
        &self,
        atom: &N,
        key: &AtomKey,
        new_value: N::Value,
        old_value: N::Value,
    ) {
        if !atom.should_update(&new_value, &old_value) {
            return;
        }
        atom.perform_update(|| {
            let subscriptions: Vec<Subscription> = {
                let store = self.store.borrow();
                store
                    .subscriptions
                    .get(key)
                    .map(|subscriptions| subscriptions.values().cloned().collect())
                    .unwrap_or_default()
            };
            for subscription in subscriptions {
                subscription.notify();
            }

            let children: Vec<AtomKey> = {
                let store = self.store.borrow();
                store
                    .graph
                    .children(key)
                    .map(|children| children.iter().cloned().collect())
                    .unwrap_or_default()
            };
            for child in children {
                let cache = {
                    let store = self.store.borrow();
                    store.caches.get(&child).map(|cache| cache.clone_boxed())
                };
                if let Some(cache) = cache {
                    cache.reset(self, &child);
                }
            }

            self.notify_observers();
            atom.updated(&new_value, &old_value, self);
        });
    }

    // ---- release ---------------------------------------------------------

    /// Releases `key` if nothing retains it.
    ///
    /// A key is retained by downstream children, by view subscriptions, or
    /// by `keep_alive`. Scoping disables keep-alive: a scope's entries
    /// must die with the scope's watchers.
    pub(crate) fn check_and_release(&self, key: &AtomKey) {
        let releasable = {
            let store = self.store.borrow();
            let keep_alive = store
                .caches
                .get(key)
                .map(|cache| cache.keep_alive() && !key.is_scoped())
                .unwrap_or(false);
            !keep_alive
                && store.graph.has_no_children(key)
                && store.has_no_subscriptions(key)
        };
        if releasable {
            self.release(key);
        }
    }

    /// Unconditionally removes `key`'s cache, state, subscriptions, and
    /// edges, then re-checks each former upstream for release.
    fn release(&self, key: &AtomKey) {
        let (dependencies, transaction) = {
            let mut store = self.store.borrow_mut();
            let dependencies = store.graph.remove_key(key);
            store.caches.remove(key);
            let transaction = store
                .states
                .remove(key)
                .and_then(|state| state.transaction);
            store.subscriptions.remove(key);
            (dependencies, transaction)
        };
        if let Some(transaction) = transaction {
            transaction.terminate();
        }
        for upstream in dependencies {
            self.check_and_release(&upstream);
        }
        self.notify_observers();
    }

    /// Drops one subscriber's subscriptions and re-checks each key.
    fn unsubscribe_keys(
        &self,
        keys: impl IntoIterator<Item = AtomKey>,
        subscriber: SubscriberKey,
    ) {
        for key in keys {
            {
                let mut store = self.store.borrow_mut();
                if let Some(subscriptions) = store.subscriptions.get_mut(&key) {
                    subscriptions.remove(&subscriber);
                    if subscriptions.is_empty() {
                        store.subscriptions.remove(&key);
                    }
                }
            }
            self.check_and_release(&key);
        }
        self.notify_observers();
    }

    // ---- observers -------------------------------------------------------

    /// Delivers a fresh snapshot to every observer of this context.
    ///
    /// Skipped entirely, including snapshot construction, when no
    /// observer is registered.
    pub(crate) fn notify_observers(&self) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for observer in &self.observers {
            observer.notify(&snapshot);
        }
    }
}

impl Default for StoreContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The producer-side view of one evaluation.
///
/// Carries the kernel handle, the transaction bounding the run, and the
/// atom's coordinator. Passed by reference through every producer hook.
pub struct TransactionContext<'a, N: Atom> {
    store: &'a StoreContext,
    transaction: Rc<Transaction>,
    coordinator: Rc<RefCell<N::Coordinator>>,
}

impl<'a, N: Atom> TransactionContext<'a, N> {
    /// Watches an upstream atom, recording the dependency edge.
    pub fn watch<U: Atom>(&self, atom: U) -> U::Value {
        self.store.watch_in(atom, &self.transaction)
    }

    /// Borrows the coordinator.
    pub fn coordinator(&self) -> Ref<'_, N::Coordinator> {
        self.coordinator.borrow()
    }

    /// Mutably borrows the coordinator.
    pub fn coordinator_mut(&self) -> RefMut<'_, N::Coordinator> {
        self.coordinator.borrow_mut()
    }

    /// True once a newer evaluation or a write superseded this run.
    pub fn is_terminated(&self) -> bool {
        self.transaction.is_terminated()
    }

    /// Registers teardown to run if this evaluation is terminated.
    pub fn on_termination(&self, hook: impl FnOnce() + 'static) {
        self.transaction.on_termination(hook);
    }

    pub(crate) fn transaction(&self) -> &Rc<Transaction> {
        &self.transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use core::cell::RefCell;

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    struct Count;

    impl Atom for Count {
        type Value = i64;
        type Coordinator = ();

        fn produce(&self, _context: &TransactionContext<'_, Self>) -> i64 {
            0
        }
    }

    impl WritableAtom for Count {}

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    struct Plus(i64);

    impl Atom for Plus {
        type Value = i64;
        type Coordinator = ();

        fn produce(&self, context: &TransactionContext<'_, Self>) -> i64 {
            context.watch(Count) + self.0
        }
    }

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    struct Pinned;

    impl Atom for Pinned {
        type Value = i64;
        type Coordinator = ();

        fn produce(&self, _context: &TransactionContext<'_, Self>) -> i64 {
            7
        }

        fn keep_alive(&self) -> bool {
            true
        }
    }

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    struct Distinct;

    impl Atom for Distinct {
        type Value = i64;
        type Coordinator = ();

        fn produce(&self, _context: &TransactionContext<'_, Self>) -> i64 {
            0
        }

        fn should_update(&self, new: &i64, old: &i64) -> bool {
            new != old
        }
    }

    impl WritableAtom for Distinct {}

    #[test]
    fn test_read_does_not_retain() {
        let store = StoreContext::new();
        assert_eq!(store.read(Count), 0);
        assert_eq!(store.lookup(&Count), None);
    }

    #[test]
    fn test_read_keep_alive_retains() {
        let store = StoreContext::new();
        assert_eq!(store.read(Pinned), 7);
        assert_eq!(store.lookup(&Pinned), Some(7));
    }

    #[test]
    fn test_watch_then_set_notifies() {
        let store = StoreContext::new();
        let subscriber = Subscriber::new();
        let updates = Rc::new(RefCell::new(0));
        let subscription_updates = updates.clone();

        let value = store.watch(Count, &subscriber, move || {
            *subscription_updates.borrow_mut() += 1;
        });
        assert_eq!(value, 0);

        store.set(Count, 5);
        assert_eq!(*updates.borrow(), 1);
        assert_eq!(store.lookup(&Count), Some(5));
    }

    #[test]
    fn test_watch_is_idempotent_per_subscriber() {
        let store = StoreContext::new();
        let subscriber = Subscriber::new();
        let updates = Rc::new(RefCell::new(0));

        for _ in 0..3 {
            let subscription_updates = updates.clone();
            let value = store.watch(Count, &subscriber, move || {
                *subscription_updates.borrow_mut() += 1;
            });
            assert_eq!(value, 0);
        }
        assert_eq!(subscriber.subscription_count(), 1);

        store.set(Count, 1);
        assert_eq!(*updates.borrow(), 1);
    }

    #[test]
    fn test_set_without_cache_is_noop() {
        let store = StoreContext::new();
        store.set(Count, 9);
        assert_eq!(store.lookup(&Count), None);
    }

    #[test]
    fn test_modify_routes_through_update_path() {
        let store = StoreContext::new();
        let subscriber = Subscriber::new();
        let updates = Rc::new(RefCell::new(0));
        let subscription_updates = updates.clone();

        store.watch(Count, &subscriber, move || {
            *subscription_updates.borrow_mut() += 1;
        });
        store.modify(Count, |value| *value += 40);

        assert_eq!(store.lookup(&Count), Some(40));
        assert_eq!(*updates.borrow(), 1);
    }

    #[test]
    fn test_derived_atom_recomputes_on_upstream_change() {
        let store = StoreContext::new();
        let subscriber = Subscriber::new();
        let seen = Rc::new(RefCell::new(alloc::vec::Vec::new()));

        let subscription_store = store.clone();
        let subscription_seen = seen.clone();
        let value = store.watch(Plus(10), &subscriber, move || {
            subscription_seen
                .borrow_mut()
                .push(subscription_store.lookup(&Plus(10)).unwrap());
        });
        assert_eq!(value, 10);

        store.set(Count, 5);

        assert_eq!(store.lookup(&Plus(10)), Some(15));
        assert_eq!(*seen.borrow(), [15]);
    }

    #[test]
    fn test_unwatch_releases_chain() {
        let store = StoreContext::new();
        let subscriber = Subscriber::new();

        store.watch(Plus(1), &subscriber, || {});
        assert!(store.lookup(&Count).is_some());

        store.unwatch(&Plus(1), &subscriber);

        assert_eq!(store.lookup(&Plus(1)), None);
        // The upstream lost its last child and goes with it.
        assert_eq!(store.lookup(&Count), None);
    }

    #[test]
    fn test_should_update_gates_propagation() {
        let store = StoreContext::new();
        let subscriber = Subscriber::new();
        let updates = Rc::new(RefCell::new(0));
        let subscription_updates = updates.clone();

        store.watch(Distinct, &subscriber, move || {
            *subscription_updates.borrow_mut() += 1;
        });

        store.set(Distinct, 0); // unchanged: cache written, nothing fires
        assert_eq!(*updates.borrow(), 0);

        store.set(Distinct, 3);
        assert_eq!(*updates.borrow(), 1);
    }

    #[test]
    fn test_reset_rebuilds_from_producer() {
        let store = StoreContext::new();
        let subscriber = Subscriber::new();

        store.watch(Count, &subscriber, || {});
        store.set(Count, 42);
        assert_eq!(store.lookup(&Count), Some(42));

        store.reset(Count);
        assert_eq!(store.lookup(&Count), Some(0));
    }

    #[test]
    fn test_override_applies_on_creation() {
        let store = StoreContext::with(
            Vec::new(),
            Overrides::new().with(Count, |_| 99),
        );
        assert_eq!(store.read(Count), 99);
    }

    #[test]
    fn test_scoped_override_rekeys_into_scope() {
        let root = StoreContext::new();
        let subscriber = Subscriber::new();
        root.watch(Count, &subscriber, || {});

        struct Marker;
        let scope = root.scoped(
            ScopeKey::new(),
            ScopeId::of::<Marker>(),
            Vec::new(),
            Overrides::new().with(Count, |_| 42),
        );
        let scope_subscriber = Subscriber::new();

        assert_eq!(scope.watch(Count, &scope_subscriber, || {}), 42);
        assert_eq!(root.lookup(&Count), Some(0));
        // The scoped entry lives under its own key.
        assert_eq!(scope.lookup(&Count), Some(42));
    }

    #[test]
    fn test_observer_sees_create_and_release() {
        let snapshots = Rc::new(RefCell::new(0));
        let observer_snapshots = snapshots.clone();
        let store = StoreContext::with(
            alloc::vec![Observer::new(move |_| *observer_snapshots.borrow_mut() += 1)],
            Overrides::new(),
        );

        store.read(Count);
        // One snapshot for the creation, one for the immediate release.
        assert_eq!(*snapshots.borrow(), 2);
    }

    #[test]
    fn test_updated_hook_runs_after_propagation() {
        #[derive(Clone, PartialEq, Eq)]
        struct Hooked {
            log: Rc<RefCell<alloc::vec::Vec<(i64, i64)>>>,
        }

        impl core::fmt::Debug for Hooked {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str("Hooked")
            }
        }

        impl core::hash::Hash for Hooked {
            fn hash<H: core::hash::Hasher>(&self, _state: &mut H) {}
        }

        impl Atom for Hooked {
            type Value = i64;
            type Coordinator = ();

            fn produce(&self, _context: &TransactionContext<'_, Self>) -> i64 {
                0
            }

            fn updated(&self, new: &i64, old: &i64, _store: &StoreContext) {
                self.log.borrow_mut().push((*new, *old));
            }
        }

        impl WritableAtom for Hooked {}

        let log = Rc::new(RefCell::new(alloc::vec::Vec::new()));
        let atom = Hooked { log: log.clone() };
        let store = StoreContext::new();
        let subscriber = Subscriber::new();

        store.watch(atom.clone(), &subscriber, || {});
        store.set(atom, 8);

        assert_eq!(*log.borrow(), [(8, 0)]);
    }

    #[test]
    fn test_coordinator_persists_across_reevaluation() {
        #[derive(Clone, PartialEq, Eq, Hash, Debug)]
        struct Runs;

        impl Atom for Runs {
            type Value = u32;
            type Coordinator = u32;

            fn produce(&self, context: &TransactionContext<'_, Self>) -> u32 {
                let _ = context.watch(Count);
                let mut runs = context.coordinator_mut();
                *runs += 1;
                *runs
            }
        }

        let store = StoreContext::new();
        let subscriber = Subscriber::new();

        assert_eq!(store.watch(Runs, &subscriber, || {}), 1);
        store.set(Count, 1);
        // Same coordinator, fresh evaluation.
        assert_eq!(store.lookup(&Runs), Some(2));
    }
}
