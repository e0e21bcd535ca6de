//! Subscriptions and subscribers.
//!
//! A `Subscription` is the back-channel to one view consumer of one atom:
//! an update callback plus the source location that created it (shown by
//! the snapshot's graph dump). A `Subscriber` is the owner handle a view
//! holds; it tracks the keys it is subscribed to and, when dropped, runs
//! the unsubscribe closure the store wired in, releasing every key.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;
use core::panic::Location;
use covalent_core::{AtomKey, SubscriberKey};
use hashbrown::HashSet;

/// The update back-channel for one subscriber of one atom.
#[derive(Clone)]
pub struct Subscription {
    update: Rc<dyn Fn()>,
    location: &'static Location<'static>,
}

impl Subscription {
    /// Creates a subscription with the given update callback.
    pub(crate) fn new(update: Rc<dyn Fn()>, location: &'static Location<'static>) -> Self {
        Subscription { update, location }
    }

    /// Invokes the update callback.
    pub fn notify(&self) {
        (self.update)();
    }

    /// Returns the source location that created the subscription.
    #[inline]
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

type Unsubscribe = Box<dyn FnOnce(HashSet<AtomKey>)>;

struct SubscriberInner {
    key: SubscriberKey,
    subscribing: RefCell<HashSet<AtomKey>>,
    unsubscribe: RefCell<Option<Unsubscribe>>,
}

impl Drop for SubscriberInner {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.get_mut().take() {
            let keys = core::mem::take(self.subscribing.get_mut());
            unsubscribe(keys);
        }
    }
}

/// Owner handle for a view consumer.
///
/// Dropping the subscriber unsubscribes it from every atom it watches and
/// lets the store release caches nothing else retains.
pub struct Subscriber {
    inner: Rc<SubscriberInner>,
}

impl Subscriber {
    /// Creates a subscriber with a fresh key.
    pub fn new() -> Self {
        Subscriber {
            inner: Rc::new(SubscriberInner {
                key: SubscriberKey::new(),
                subscribing: RefCell::new(HashSet::new()),
                unsubscribe: RefCell::new(None),
            }),
        }
    }

    /// Returns the subscriber's key.
    #[inline]
    pub fn key(&self) -> SubscriberKey {
        self.inner.key
    }

    /// Returns the number of atoms this subscriber watches.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscribing.borrow().len()
    }

    /// Records `key` in the subscribed set; true if it was not present.
    pub(crate) fn insert_subscribing(&self, key: &AtomKey) -> bool {
        self.inner.subscribing.borrow_mut().insert(key.clone())
    }

    /// Drops `key` from the subscribed set; true if it was present.
    pub(crate) fn remove_subscribing(&self, key: &AtomKey) -> bool {
        self.inner.subscribing.borrow_mut().remove(key)
    }

    /// Installs the store-side unsubscribe closure run on drop.
    pub(crate) fn set_unsubscribe(&self, unsubscribe: impl FnOnce(HashSet<AtomKey>) + 'static) {
        *self.inner.unsubscribe.borrow_mut() = Some(Box::new(unsubscribe));
    }
}

impl Default for Subscriber {
    fn default() -> Self {
        Self::new()
    }
}
