//! The event source capability observers subscribe to.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::observer::Observer;
use crate::options::ObserverOptions;

/// A callback registered at an [`EventSource`].
///
/// Cloning a `Listener` yields a handle to the same callback. Sources must
/// compare listeners with [`Listener::same`] so that `unregister` removes
/// exactly the registration made by `register`.
pub struct Listener<E> {
    callback: Rc<dyn Fn(&E)>,
}

impl<E> Listener<E> {
    pub fn new(callback: impl Fn(&E) + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    pub fn call(&self, event: &E) {
        (self.callback)(event)
    }

    /// Returns true if both handles refer to the same callback.
    pub fn same(&self, other: &Listener<E>) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }

    pub(crate) fn downgrade(&self) -> WeakListener<E> {
        WeakListener {
            callback: Rc::downgrade(&self.callback),
        }
    }
}

/// A listener handle that does not keep the callback alive.
pub(crate) struct WeakListener<E> {
    callback: Weak<dyn Fn(&E)>,
}

impl<E> WeakListener<E> {
    pub(crate) fn upgrade(&self) -> Option<Listener<E>> {
        self.callback.upgrade().map(|callback| Listener { callback })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.callback.strong_count() > 0
    }
}

impl<E> Clone for Listener<E> {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<E> fmt::Debug for Listener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener")
            .field(&Rc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

/// Anything that can register and unregister a callback for a named event.
///
/// Implementations adapt a concrete producer (an in-process emitter, a
/// socket, a UI element) to the shape observers need. A `(type, capture)`
/// pair is an independent subscription: registering the same listener for
/// the same type with a different `capture` flag is a separate registration.
///
/// A source must hold on to a registered listener until it is unregistered.
/// The listener of a connected root observer owns that observer, so a source
/// that drops listeners early ends the subscription.
pub trait EventSource<E> {
    fn register(&self, event_type: &str, listener: &Listener<E>, capture: bool);

    fn unregister(&self, event_type: &str, listener: &Listener<E>);
}

/// Entry point for building observer chains directly on a shared source.
pub trait EventSourceExt<E> {
    /// Creates a root observer for the whitespace-separated `types`, with
    /// default options.
    fn on(&self, types: &str) -> Observer<E> {
        self.on_with(types, ObserverOptions::default())
    }

    fn on_with(&self, types: &str, options: ObserverOptions) -> Observer<E>;
}

impl<E, S> EventSourceExt<E> for Rc<S>
where
    E: 'static,
    S: EventSource<E> + 'static,
{
    fn on_with(&self, types: &str, options: ObserverOptions) -> Observer<E> {
        let source: Rc<dyn EventSource<E>> = Rc::clone(self) as Rc<dyn EventSource<E>>;
        Observer::new(source, types, options)
    }
}
