//! In-process event source for strand observer chains.
//!
//! [`Emitter`] implements [`EventSource`] with the listener semantics of a
//! DOM event target dispatching at its own target phase:
//!
//! - a `(type, listener, capture)` triple is registered at most once;
//!   registering it again is a no-op,
//! - `unregister(type, listener)` removes that listener for that type,
//! - [`Emitter::dispatch`] calls capture listeners first, then the others,
//!   each group in registration order,
//! - listeners removed during a dispatch are skipped for the rest of it, and
//!   listeners added during a dispatch wait for the next one.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use strand_core::EventSourceExt;
//! use strand_emitter::Emitter;
//!
//! let emitter = Rc::new(Emitter::new());
//! let keys = emitter.on("keydown").for_each(|key: &char, _| print!("{key}"));
//! emitter.dispatch("keydown", &'x');
//! ```

use std::cell::RefCell;
use std::fmt;

use strand_core::{EventSource, Listener};

struct Registration<E> {
    event_type: String,
    listener: Listener<E>,
    capture: bool,
}

/// A single-threaded event source that delivers events synchronously.
pub struct Emitter<E> {
    registrations: RefCell<Vec<Registration<E>>>,
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self {
            registrations: RefCell::new(Vec::new()),
        }
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("registrations", &self.registrations.borrow().len())
            .finish()
    }
}

impl<E> Emitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to the listeners registered for `event_type`.
    ///
    /// Returns the number of listeners invoked. A panicking listener aborts
    /// the dispatch and the panic propagates to the caller.
    pub fn dispatch(&self, event_type: &str, event: &E) -> usize {
        let snapshot: Vec<Listener<E>> = {
            let registrations = self.registrations.borrow();
            let (capture, bubble): (Vec<&Registration<E>>, Vec<&Registration<E>>) = registrations
                .iter()
                .filter(|r| r.event_type == event_type)
                .partition(|r| r.capture);
            capture
                .into_iter()
                .chain(bubble)
                .map(|r| r.listener.clone())
                .collect()
        };

        let mut delivered = 0;
        for listener in &snapshot {
            if !self.is_registered(event_type, listener) {
                continue;
            }
            listener.call(event);
            delivered += 1;
        }

        tracing::trace!(event_type, delivered, "event dispatched");
        delivered
    }

    /// Number of listeners currently registered for `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.registrations
            .borrow()
            .iter()
            .filter(|r| r.event_type == event_type)
            .count()
    }

    /// Returns true if no listener is registered for any type.
    pub fn is_empty(&self) -> bool {
        self.registrations.borrow().is_empty()
    }

    fn is_registered(&self, event_type: &str, listener: &Listener<E>) -> bool {
        self.registrations
            .borrow()
            .iter()
            .any(|r| r.event_type == event_type && r.listener.same(listener))
    }
}

impl<E> EventSource<E> for Emitter<E> {
    fn register(&self, event_type: &str, listener: &Listener<E>, capture: bool) {
        let mut registrations = self.registrations.borrow_mut();
        let duplicate = registrations.iter().any(|r| {
            r.event_type == event_type && r.capture == capture && r.listener.same(listener)
        });
        if duplicate {
            return;
        }

        registrations.push(Registration {
            event_type: event_type.to_string(),
            listener: listener.clone(),
            capture,
        });
        tracing::debug!(event_type, capture, "listener registered");
    }

    fn unregister(&self, event_type: &str, listener: &Listener<E>) {
        let mut registrations = self.registrations.borrow_mut();
        let before = registrations.len();
        registrations.retain(|r| !(r.event_type == event_type && r.listener.same(listener)));
        let removed = before - registrations.len();
        tracing::debug!(event_type, removed, "listener unregistered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn recorder(
        log: &Rc<RefCell<Vec<&'static str>>>,
        name: &'static str,
    ) -> Listener<u8> {
        let log = Rc::clone(log);
        Listener::new(move |_| log.borrow_mut().push(name))
    }

    #[test]
    fn dispatch_reaches_only_matching_type() {
        let emitter = Emitter::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        emitter.register("a", &recorder(&log, "a"), false);
        emitter.register("b", &recorder(&log, "b"), false);

        assert_eq!(emitter.dispatch("a", &0), 1);
        assert_eq!(emitter.dispatch("c", &0), 0);
        assert_eq!(*log.borrow(), vec!["a"]);
    }

    #[test]
    fn capture_listeners_run_first() {
        let emitter = Emitter::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        emitter.register("a", &recorder(&log, "bubble-1"), false);
        emitter.register("a", &recorder(&log, "capture-1"), true);
        emitter.register("a", &recorder(&log, "bubble-2"), false);
        emitter.register("a", &recorder(&log, "capture-2"), true);

        emitter.dispatch("a", &0);
        assert_eq!(
            *log.borrow(),
            vec!["capture-1", "capture-2", "bubble-1", "bubble-2"]
        );
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let emitter = Emitter::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let listener = recorder(&log, "x");

        emitter.register("a", &listener, false);
        emitter.register("a", &listener.clone(), false);
        assert_eq!(emitter.listener_count("a"), 1);

        // A different capture flag is a separate subscription.
        emitter.register("a", &listener, true);
        assert_eq!(emitter.listener_count("a"), 2);
    }

    #[test]
    fn unregister_matches_listener_identity() {
        let emitter = Emitter::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let kept = recorder(&log, "kept");
        let removed = recorder(&log, "removed");
        emitter.register("a", &kept, false);
        emitter.register("a", &removed, false);

        emitter.unregister("a", &removed);
        emitter.unregister("b", &kept);

        emitter.dispatch("a", &0);
        assert_eq!(*log.borrow(), vec!["kept"]);
        assert_eq!(emitter.listener_count("a"), 1);
    }

    #[test]
    fn listener_removed_during_dispatch_is_skipped() {
        let emitter = Rc::new(Emitter::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let victim = recorder(&log, "victim");

        let remover = {
            let emitter = Rc::clone(&emitter);
            let victim = victim.clone();
            let log = Rc::clone(&log);
            Listener::new(move |_: &u8| {
                log.borrow_mut().push("remover");
                emitter.unregister("a", &victim);
            })
        };
        emitter.register("a", &remover, false);
        emitter.register("a", &victim, false);

        assert_eq!(emitter.dispatch("a", &0), 1);
        assert_eq!(*log.borrow(), vec!["remover"]);
        assert!(!emitter.is_empty());
    }

    #[test]
    fn listener_added_during_dispatch_waits() {
        let emitter = Rc::new(Emitter::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let late = recorder(&log, "late");

        let adder = {
            let emitter = Rc::clone(&emitter);
            Listener::new(move |_: &u8| emitter.register("a", &late, false))
        };
        emitter.register("a", &adder, false);

        assert_eq!(emitter.dispatch("a", &0), 1);
        assert!(log.borrow().is_empty());

        assert_eq!(emitter.dispatch("a", &0), 2);
        assert_eq!(*log.borrow(), vec!["late"]);
    }
}
