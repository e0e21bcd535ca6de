//! Covalent Core - Foundation types for the Covalent atom store.
//!
//! This crate provides the identity and graph layer underneath the store
//! kernel:
//!
//! - `AtomKey`: identity of one materialised atom (type × key × scope)
//! - `SubscriberKey`, `ScopeKey`, `ScopeId`: tokens for subscribers and scopes
//! - `DependencyGraph`: the mirror-maintained dependency/children maps
//! - `Error`: diagnostics logged on the store's non-recoverable paths
//!
//! # Example
//!
//! ```rust
//! use covalent_core::{AtomKey, DependencyGraph};
//!
//! #[derive(Clone, PartialEq, Eq, Hash, Debug)]
//! struct Counter;
//!
//! #[derive(Clone, PartialEq, Eq, Hash, Debug)]
//! struct Doubled;
//!
//! let mut graph = DependencyGraph::new();
//! let counter = AtomKey::new(&Counter, None);
//! let doubled = AtomKey::new(&Doubled, None);
//!
//! // Doubled reads Counter.
//! graph.add_edge(&doubled, &counter);
//!
//! assert!(graph.dependencies(&doubled).unwrap().contains(&counter));
//! assert!(graph.children(&counter).unwrap().contains(&doubled));
//! ```

#![no_std]

extern crate alloc;

mod error;
mod graph;
mod key;

pub use error::{Error, Result};
pub use graph::DependencyGraph;
pub use key::{AtomKey, ErasedKey, ScopeId, ScopeKey, SubscriberKey};
