//! Covalent Store - The reactive atom store kernel.
//!
//! This crate implements the store kernel: atoms with inferred
//! dependencies, per-scope value caches, transactional evaluation,
//! update propagation, garbage collection of unobserved cells, override
//! injection, and observable snapshots.
//!
//! # Core Concepts
//!
//! - `Atom`: a value-typed descriptor of one state cell and its producer
//! - `StoreContext`: the kernel handle for read, watch, write, refresh,
//!   reset, snapshot, and scope derivation
//! - `Subscriber`/`Subscription`: the back-channel to view consumers,
//!   unsubscribed automatically on drop
//! - `Overrides`: substitute producers for testing and injection
//! - `Snapshot`/`Observer`: immutable views of the whole graph
//!
//! # Example
//!
//! ```ignore
//! use covalent_store::{Atom, StoreContext, Subscriber, TransactionContext};
//!
//! #[derive(Clone, PartialEq, Eq, Hash, Debug)]
//! struct Counter;
//!
//! impl Atom for Counter {
//!     type Value = i64;
//!     type Coordinator = ();
//!
//!     fn produce(&self, _context: &TransactionContext<'_, Self>) -> i64 {
//!         0
//!     }
//! }
//!
//! #[derive(Clone, PartialEq, Eq, Hash, Debug)]
//! struct Doubled;
//!
//! impl Atom for Doubled {
//!     type Value = i64;
//!     type Coordinator = ();
//!
//!     fn produce(&self, context: &TransactionContext<'_, Self>) -> i64 {
//!         context.watch(Counter) * 2
//!     }
//! }
//!
//! let store = StoreContext::new();
//! let subscriber = Subscriber::new();
//!
//! // Watching materialises the cell and records the dependency edge.
//! let doubled = store.watch(Doubled, &subscriber, || {});
//! assert_eq!(doubled, 0);
//! ```

#![no_std]

extern crate alloc;

pub mod atom;
pub mod context;
pub mod observer;
pub mod overrides;
pub mod snapshot;
mod state;
pub mod subscription;
pub mod transaction;

pub use atom::{Atom, RefreshableAtom, ResettableAtom, WritableAtom};
pub use context::{StoreContext, TransactionContext};
pub use observer::Observer;
pub use overrides::Overrides;
pub use snapshot::Snapshot;
pub use subscription::{Subscriber, Subscription};
pub use transaction::Transaction;

// Re-export the identity layer so downstream crates need only this one.
pub use covalent_core::{AtomKey, DependencyGraph, ScopeId, ScopeKey, SubscriberKey};
