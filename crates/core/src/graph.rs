//! The atom dependency graph.
//!
//! Two mirror-maintained adjacency maps over `AtomKey`:
//!
//! - `dependencies[k]`: the keys `k` reads (upstream)
//! - `children[k]`: the keys that read `k` (downstream)
//!
//! Invariant: `b ∈ dependencies[a] ⇔ a ∈ children[b]` after every public
//! method. Edges are inferred at evaluation time, so the graph also supports
//! the transaction protocol's bulk detach: all of a key's upstream edges are
//! removed when its re-evaluation begins and re-recorded as the producer
//! runs.

use crate::key::AtomKey;
use hashbrown::{HashMap, HashSet};

/// The mutable dependency graph of the store.
#[derive(Clone, Default)]
pub struct DependencyGraph {
    dependencies: HashMap<AtomKey, HashSet<AtomKey>>,
    children: HashMap<AtomKey, HashSet<AtomKey>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `child` depends on `upstream`.
    ///
    /// A key never depends on itself; producers cannot watch their own atom
    /// mid-evaluation.
    pub fn add_edge(&mut self, child: &AtomKey, upstream: &AtomKey) {
        debug_assert!(child != upstream, "an atom cannot depend on itself");
        self.dependencies
            .entry(child.clone())
            .or_default()
            .insert(upstream.clone());
        self.children
            .entry(upstream.clone())
            .or_default()
            .insert(child.clone());
    }

    /// Removes the single edge `child → upstream`, if present.
    pub fn remove_edge(&mut self, child: &AtomKey, upstream: &AtomKey) {
        if let Some(set) = self.dependencies.get_mut(child) {
            set.remove(upstream);
        }
        if let Some(set) = self.children.get_mut(upstream) {
            set.remove(child);
        }
    }

    /// Returns the keys `key` depends on.
    #[inline]
    pub fn dependencies(&self, key: &AtomKey) -> Option<&HashSet<AtomKey>> {
        self.dependencies.get(key)
    }

    /// Returns the keys depending on `key`.
    #[inline]
    pub fn children(&self, key: &AtomKey) -> Option<&HashSet<AtomKey>> {
        self.children.get(key)
    }

    /// Returns true if `key` has no downstream dependents.
    pub fn has_no_children(&self, key: &AtomKey) -> bool {
        self.children.get(key).map_or(true, HashSet::is_empty)
    }

    /// Detaches every upstream edge of `key`, returning the old set.
    ///
    /// This is the transaction-start step: the previous run's dependencies
    /// are removed wholesale, then re-recorded one by one as the new run
    /// watches its upstreams.
    pub fn detach_dependencies(&mut self, key: &AtomKey) -> HashSet<AtomKey> {
        let old = self.dependencies.remove(key).unwrap_or_default();
        for upstream in &old {
            if let Some(set) = self.children.get_mut(upstream) {
                set.remove(key);
            }
        }
        old
    }

    /// Removes `key` and every edge touching it, returning its former
    /// upstream set so the caller can re-check each for release.
    pub fn remove_key(&mut self, key: &AtomKey) -> HashSet<AtomKey> {
        let dependencies = self.dependencies.remove(key).unwrap_or_default();
        for upstream in &dependencies {
            if let Some(set) = self.children.get_mut(upstream) {
                set.remove(key);
            }
        }
        // A released key normally has no children left; the type-collision
        // fallback can release one that does, so strip those mirrors too.
        if let Some(children) = self.children.remove(key) {
            for child in &children {
                if let Some(set) = self.dependencies.get_mut(child) {
                    set.remove(key);
                }
            }
        }
        dependencies
    }

    /// Overwrites `key`'s upstream set, maintaining both mirrors.
    ///
    /// Used by snapshot restore, which replaces a key's edges wholesale.
    pub fn set_dependencies(&mut self, key: &AtomKey, upstream: HashSet<AtomKey>) {
        self.detach_dependencies(key);
        for dependency in &upstream {
            self.children
                .entry(dependency.clone())
                .or_default()
                .insert(key.clone());
        }
        if !upstream.is_empty() {
            self.dependencies.insert(key.clone(), upstream);
        }
    }

    /// Overwrites `key`'s downstream set, maintaining both mirrors.
    pub fn set_children(&mut self, key: &AtomKey, children: HashSet<AtomKey>) {
        if let Some(old) = self.children.remove(key) {
            for child in &old {
                if let Some(set) = self.dependencies.get_mut(child) {
                    set.remove(key);
                }
            }
        }
        for child in &children {
            self.dependencies
                .entry(child.clone())
                .or_default()
                .insert(key.clone());
        }
        if !children.is_empty() {
            self.children.insert(key.clone(), children);
        }
    }

    /// Returns every key appearing in either map.
    pub fn keys(&self) -> impl Iterator<Item = &AtomKey> {
        self.dependencies
            .keys()
            .chain(self.children.keys().filter(move |k| !self.dependencies.contains_key(*k)))
    }

    /// Returns every `(upstream, child)` edge once.
    pub fn edges(&self) -> impl Iterator<Item = (&AtomKey, &AtomKey)> {
        self.children
            .iter()
            .flat_map(|(upstream, children)| children.iter().map(move |child| (upstream, child)))
    }

    /// Returns true if the graph holds no edges at all.
    pub fn is_empty(&self) -> bool {
        self.dependencies.values().all(HashSet::is_empty)
            && self.children.values().all(HashSet::is_empty)
    }

    /// Checks the mirror invariant; test support.
    pub fn is_symmetric(&self) -> bool {
        let forward = self.dependencies.iter().all(|(child, upstream)| {
            upstream.iter().all(|u| {
                self.children
                    .get(u)
                    .map_or(false, |set| set.contains(child))
            })
        });
        let backward = self.children.iter().all(|(upstream, children)| {
            children.iter().all(|c| {
                self.dependencies
                    .get(c)
                    .map_or(false, |set| set.contains(upstream))
            })
        });
        forward && backward
    }
}
