//! Identity keys for atoms, subscribers, and scopes.
//!
//! Every table in the store is keyed by one of the types in this module:
//!
//! - `AtomKey`: identity of one materialised atom: its type, its user key,
//!   and the scope it was re-keyed into (if any)
//! - `SubscriberKey`: identity of one external subscriber
//! - `ScopeKey`: unique token minted for each scope instantiation
//! - `ScopeId`: user-declared scope identity, shared by all instantiations
//!   of the same scope type

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use core::any::{Any, TypeId};
use core::fmt;
use core::hash::{Hash, Hasher};
use core::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Mints a process-unique token value.
fn next_token() -> u64 {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// Unique token identifying one scope instantiation.
///
/// Two scopes declared with the same `ScopeId` still get distinct
/// `ScopeKey`s, so their atoms never share caches.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey(u64);

impl ScopeKey {
    /// Mints a fresh scope key.
    pub fn new() -> Self {
        ScopeKey(next_token())
    }
}

impl fmt::Debug for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope:{}", self.0)
    }
}

/// User-declared scope identity.
///
/// Atoms declaring a `ScopeId` are re-keyed into the innermost enclosing
/// scope declared with the same identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ScopeId(TypeId);

impl ScopeId {
    /// Derives the scope identity from a marker type.
    pub fn of<T: 'static>() -> Self {
        ScopeId(TypeId::of::<T>())
    }
}

/// Unique token identifying one subscriber.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberKey(u64);

impl SubscriberKey {
    /// Mints a fresh subscriber key.
    pub fn new() -> Self {
        SubscriberKey(next_token())
    }
}

impl fmt::Debug for SubscriberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber:{}", self.0)
    }
}

/// Object-safe bridge over `Hash + Eq + Clone + Debug` key values.
///
/// An atom is its own key: the store erases the atom value behind this
/// trait so keys of different atom types can share one map.
pub trait ErasedKey {
    /// Concrete value for downcast-based equality.
    fn as_any(&self) -> &dyn Any;

    /// Equality across erased values; false when types differ.
    fn eq_erased(&self, other: &dyn ErasedKey) -> bool;

    /// Feeds the value's hash into `state`.
    fn hash_erased(&self, state: &mut dyn Hasher);

    /// Clones the value behind a fresh box.
    fn clone_erased(&self) -> Box<dyn ErasedKey>;

    /// Display form used in diagnostics and graph dumps.
    fn describe(&self) -> String;
}

impl<T> ErasedKey for T
where
    T: Any + Hash + Eq + Clone + fmt::Debug,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_erased(&self, other: &dyn ErasedKey) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| self == other)
    }

    fn hash_erased(&self, mut state: &mut dyn Hasher) {
        self.hash(&mut state);
    }

    fn clone_erased(&self) -> Box<dyn ErasedKey> {
        Box::new(self.clone())
    }

    fn describe(&self) -> String {
        format!("{:?}", self)
    }
}

/// Identity of one materialised atom.
///
/// `(atom type, erased atom key value, scope)`. The sole map key used
/// throughout the store: caches, states, subscriptions, and both halves of
/// the dependency graph are all indexed by `AtomKey`.
pub struct AtomKey {
    type_id: TypeId,
    type_name: &'static str,
    key: Box<dyn ErasedKey>,
    scope: Option<ScopeKey>,
}

impl AtomKey {
    /// Builds the key for `atom` under `scope`.
    pub fn new<T>(atom: &T, scope: Option<ScopeKey>) -> Self
    where
        T: Any + Hash + Eq + Clone + fmt::Debug,
    {
        AtomKey {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            key: Box::new(atom.clone()),
            scope,
        }
    }

    /// Builds the scope-less key for `atom`, used for override matching.
    pub fn unscoped<T>(atom: &T) -> Self
    where
        T: Any + Hash + Eq + Clone + fmt::Debug,
    {
        Self::new(atom, None)
    }

    /// Returns the atom type's `TypeId`.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the atom type's name, for diagnostics.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns true if this key was re-keyed into a scope.
    #[inline]
    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    /// Display form used by the DOT printer.
    pub fn description(&self) -> String {
        match self.scope {
            Some(scope) => format!("{}#{:?}", self.key.describe(), scope),
            None => self.key.describe(),
        }
    }
}

impl Clone for AtomKey {
    fn clone(&self) -> Self {
        AtomKey {
            type_id: self.type_id,
            type_name: self.type_name,
            key: self.key.clone_erased(),
            scope: self.scope,
        }
    }
}

impl PartialEq for AtomKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
            && self.scope == other.scope
            && self.key.eq_erased(&*other.key)
    }
}

impl Eq for AtomKey {}

impl Hash for AtomKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.scope.hash(state);
        self.key.hash_erased(state);
    }
}

impl fmt::Debug for AtomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
