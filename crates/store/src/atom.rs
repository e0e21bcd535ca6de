//! The atom producer protocol.
//!
//! An atom is a value-typed descriptor of one state cell. Its identity is
//! itself (type plus `Hash`/`Eq`), and its `Atom` implementation is the
//! producer: how the value is computed, when an update propagates, and what
//! side effects follow one. The store treats every atom uniformly through
//! this trait; capability subtraits gate the operations that only some
//! atoms support (`set`, `refresh`, custom `reset`).
//!
//! Dependencies are not declared; they are observed. A producer calls
//! `context.watch(other)` while it runs, and the store records the edge for
//! exactly the upstreams the current run actually read.

use crate::context::{StoreContext, TransactionContext};
use core::fmt;
use core::future::Future;
use core::hash::Hash;
use covalent_core::ScopeId;

/// A state cell descriptor and its producer.
///
/// Two atoms denote the same cell when their types and values compare
/// equal. The atom value itself is the key, so implementations are small
/// `Clone + Eq + Hash` types, typically unit or near-unit structs.
pub trait Atom: Clone + Eq + Hash + fmt::Debug + 'static {
    /// The produced value.
    type Value: Clone + 'static;

    /// Long-lived per-cell scratch state, created once per key and kept
    /// until the cell is released.
    type Coordinator: Default + 'static;

    /// Computes the value, registering dependencies via `context.watch`.
    fn produce(&self, context: &TransactionContext<'_, Self>) -> Self::Value;

    /// Adapts an override-supplied value before it is stored.
    ///
    /// Flavors that own side resources (task handles, stream
    /// subscriptions) install them here so an overridden cell still
    /// behaves like a produced one.
    fn manage_overridden(
        &self,
        value: Self::Value,
        _context: &TransactionContext<'_, Self>,
    ) -> Self::Value {
        value
    }

    /// Equality policy for update propagation. Defaults to always update.
    fn should_update(&self, _new: &Self::Value, _old: &Self::Value) -> bool {
        true
    }

    /// Schedules the propagation body. Defaults to running it in place.
    fn perform_update(&self, body: impl FnOnce()) {
        body();
    }

    /// Side effect after a successful update.
    fn updated(&self, _new: &Self::Value, _old: &Self::Value, _store: &StoreContext) {}

    /// Scope identity this atom is re-keyed into, if any.
    fn scope_id(&self) -> Option<ScopeId> {
        None
    }

    /// Pins the cell in memory even with no watchers. Ignored for scoped
    /// (or scoped-overridden) cells.
    fn keep_alive(&self) -> bool {
        false
    }
}

/// Atoms whose value can be written directly with `set`/`modify`.
pub trait WritableAtom: Atom {}

/// Atoms supporting asynchronous recomputation via `refresh`.
///
/// The returned future runs cooperatively on the store's thread; awaiting
/// inside it is the only suspension point in the system. A result arriving
/// after the transaction was terminated is discarded.
pub trait RefreshableAtom: Atom {
    /// Recomputes the value asynchronously.
    fn refresh(&self, context: &TransactionContext<'_, Self>)
        -> impl Future<Output = Self::Value>;
}

/// Atoms declaring a custom reset hook.
///
/// The store invokes the hook instead of rebuilding the cell; the hook
/// typically writes or resets *other* atoms through the given context. It
/// never creates or destroys this atom's own cache.
pub trait ResettableAtom: Atom {
    /// The user reset action.
    fn reset(&self, store: &StoreContext);
}
