//! Atom overrides.
//!
//! An override substitutes an atom's producer with a caller-supplied
//! closure, keyed either by a concrete atom value or by the atom type as a
//! whole. Overrides installed through a scope are marked scoped: atoms they
//! match are re-keyed into that scope, so the substituted value never
//! leaks into ancestor contexts. Lookup precedence: concrete key before
//! type key, and a scope's own entries shadow inherited ones.

use crate::atom::Atom;
use alloc::boxed::Box;
use alloc::rc::Rc;
use core::any::{Any, TypeId};
use covalent_core::{AtomKey, Error};
use hashbrown::HashMap;

/// Type-recovered override producer for one atom type.
pub(crate) struct OverrideFn<N: Atom> {
    produce: Box<dyn Fn(&N) -> N::Value>,
}

impl<N: Atom> OverrideFn<N> {
    fn new(produce: impl Fn(&N) -> N::Value + 'static) -> Self {
        OverrideFn {
            produce: Box::new(produce),
        }
    }

    /// Produces the override value for `atom`.
    pub(crate) fn value(&self, atom: &N) -> N::Value {
        (self.produce)(atom)
    }
}

/// Index of one override registration.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) enum OverrideKey {
    /// Matches one concrete atom value (scope-less key).
    Atom(AtomKey),
    /// Matches every atom of one type.
    AtomType(TypeId),
}

#[derive(Clone)]
struct Registration {
    producer: Rc<dyn Any>,
    type_name: &'static str,
}

/// Override registrations to install on a context.
///
/// Whether the entries end up scoped is decided by how they are installed:
/// through `StoreContext::scoped` they re-key matched atoms into the new
/// scope, through the root or `inherited` they do not.
#[derive(Clone, Default)]
pub struct Overrides {
    entries: HashMap<OverrideKey, Registration>,
}

impl Overrides {
    /// Creates an empty registration set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides one concrete atom.
    pub fn with<N: Atom>(mut self, atom: N, produce: impl Fn(&N) -> N::Value + 'static) -> Self {
        self.entries.insert(
            OverrideKey::Atom(AtomKey::unscoped(&atom)),
            Registration {
                producer: Rc::new(OverrideFn::new(produce)),
                type_name: core::any::type_name::<N>(),
            },
        );
        self
    }

    /// Overrides every atom of type `N`.
    pub fn with_type<N: Atom>(mut self, produce: impl Fn(&N) -> N::Value + 'static) -> Self {
        self.entries.insert(
            OverrideKey::AtomType(TypeId::of::<N>()),
            Registration {
                producer: Rc::new(OverrideFn::new(produce)),
                type_name: core::any::type_name::<N>(),
            },
        );
        self
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone)]
struct Entry {
    is_scoped: bool,
    producer: Rc<dyn Any>,
    type_name: &'static str,
}

/// An override resolved for one atom.
pub(crate) struct ResolvedOverride<N: Atom> {
    pub is_scoped: bool,
    pub producer: Rc<OverrideFn<N>>,
}

/// The merged override view of one context.
///
/// Derived contexts start from their parent's table and layer their own
/// registrations on top, so the innermost registration wins.
#[derive(Clone, Default)]
pub(crate) struct OverrideTable {
    entries: HashMap<OverrideKey, Entry>,
}

impl OverrideTable {
    /// Layers `overrides` onto the table, flagging each entry.
    pub(crate) fn extend(&mut self, overrides: Overrides, is_scoped: bool) {
        for (key, registration) in overrides.entries {
            self.entries.insert(
                key,
                Entry {
                    is_scoped,
                    producer: registration.producer,
                    type_name: registration.type_name,
                },
            );
        }
    }

    /// Resolves the override for `atom`: concrete key first, then type key.
    ///
    /// A stored producer that fails its downcast is logged and treated as
    /// absent; the only way to get here is registering through a raw key
    /// that collides across atom types.
    pub(crate) fn lookup<N: Atom>(&self, atom: &N) -> Option<ResolvedOverride<N>> {
        let entry = self
            .entries
            .get(&OverrideKey::Atom(AtomKey::unscoped(atom)))
            .or_else(|| self.entries.get(&OverrideKey::AtomType(TypeId::of::<N>())))?;

        match entry.producer.clone().downcast::<OverrideFn<N>>() {
            Ok(producer) => Some(ResolvedOverride {
                is_scoped: entry.is_scoped,
                producer,
            }),
            Err(_) => {
                log::warn!(
                    "{}",
                    Error::illegal_override(entry.type_name, core::any::type_name::<N>())
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TransactionContext;

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    struct Counter(u8);

    impl Atom for Counter {
        type Value = i64;
        type Coordinator = ();

        fn produce(&self, _context: &TransactionContext<'_, Self>) -> i64 {
            0
        }
    }

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    struct Label;

    impl Atom for Label {
        type Value = &'static str;
        type Coordinator = ();

        fn produce(&self, _context: &TransactionContext<'_, Self>) -> &'static str {
            "plain"
        }
    }

    #[test]
    fn test_concrete_override_beats_type_override() {
        let mut table = OverrideTable::default();
        table.extend(
            Overrides::new()
                .with_type::<Counter>(|_| 1)
                .with(Counter(7), |_| 2),
            false,
        );

        let resolved = table.lookup(&Counter(7)).unwrap();
        assert_eq!(resolved.producer.value(&Counter(7)), 2);

        let resolved = table.lookup(&Counter(0)).unwrap();
        assert_eq!(resolved.producer.value(&Counter(0)), 1);
    }

    #[test]
    fn test_child_entries_shadow_inherited() {
        let mut table = OverrideTable::default();
        table.extend(Overrides::new().with(Counter(1), |_| 10), false);
        table.extend(Overrides::new().with(Counter(1), |_| 20), true);

        let resolved = table.lookup(&Counter(1)).unwrap();
        assert!(resolved.is_scoped);
        assert_eq!(resolved.producer.value(&Counter(1)), 20);
    }

    #[test]
    fn test_unmatched_atom_resolves_to_none() {
        let mut table = OverrideTable::default();
        table.extend(Overrides::new().with(Counter(1), |_| 10), false);

        assert!(table.lookup(&Label).is_none());
        assert!(table.lookup(&Counter(2)).is_none());
    }

    #[test]
    fn test_override_receives_the_atom() {
        let mut table = OverrideTable::default();
        table.extend(
            Overrides::new().with_type::<Counter>(|atom| atom.0 as i64 * 100),
            false,
        );

        let resolved = table.lookup(&Counter(3)).unwrap();
        assert_eq!(resolved.producer.value(&Counter(3)), 300);
    }
}
