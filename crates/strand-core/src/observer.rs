//! Observer nodes and the connect/disconnect protocol.
//!
//! # Ownership
//!
//! An [`Observer`] is a cheap handle to a shared node. Handles are optional:
//! a connected chain stays subscribed whether or not anything holds one.
//!
//! - While a root is connected, the listener it registered owns it, so the
//!   source keeps the root alive. A root only holds its source weakly.
//! - While a derived node is connected, its parent owns it.
//! - A node always owns its parent, so holding the tail of a stopped chain
//!   is enough to restart it.
//!
//! A chain is therefore released by `stop`, by `until`, by disconnecting an
//! ancestor, or by dropping the source. The forwarding entry an operator
//! installs on a parent only holds the new node weakly; entries whose node
//! is gone are pruned outside of fan-out.
//!
//! # Branches
//!
//! Several nodes can be built from the same parent. A parent tracks which of
//! them are connected: disconnecting one branch only disconnects the parent
//! when no other branch still depends on it, and disconnecting the parent
//! disconnects every branch built on it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use crate::error::ObserverError;
use crate::options::ObserverOptions;
use crate::source::{EventSource, Listener, WeakListener};
use crate::types::EventTypes;

type Callback<E> = Rc<dyn Fn(&E, usize)>;

/// What a node subscribes to when it connects.
enum Parent<E: 'static> {
    /// An external event source. The node registers its listener here.
    Source(Weak<dyn EventSource<E>>),
    /// Another node. The node connects it instead of touching any source.
    Upstream(Rc<dyn Link>),
}

/// Type-erased view of a node, used by downstream nodes whose event type
/// may differ (after `map`).
trait Link {
    /// Connects this node and records `dependent` as connected to it.
    ///
    /// Returns `false` if this node could not be connected.
    fn attach(&self, dependent: Rc<dyn Link>) -> bool;

    /// Forgets `dependent`; disconnects this node if nothing else depends
    /// on it.
    fn detach(&self, dependent: &dyn Link);

    /// Disconnects this node because its parent went away. Does not touch
    /// the parent.
    fn sever(&self);
}

fn link_addr(link: &dyn Link) -> *const () {
    (link as *const dyn Link).cast()
}

struct Entry<E> {
    callback: Callback<E>,
    /// Node a `filter` or `map` entry forwards to.
    target: Option<Weak<dyn Link>>,
}

impl<E> Entry<E> {
    fn is_dead(&self) -> bool {
        self.target
            .as_ref()
            .is_some_and(|target| target.strong_count() == 0)
    }
}

/// Marks a fan-out in progress for as long as it is held, unwinding included.
struct FanOut<'a>(&'a Cell<usize>);

impl<'a> FanOut<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }
}

impl Drop for FanOut<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

struct Node<E: 'static> {
    parent: Parent<E>,
    types: EventTypes,
    capture: bool,
    callbacks: RefCell<Vec<Entry<E>>>,
    connected: Cell<bool>,
    firing: Cell<usize>,
    /// The listener registered at the source while a root is connected.
    listener: RefCell<Option<WeakListener<E>>>,
    dependents: RefCell<Vec<Rc<dyn Link>>>,
    this: Weak<Node<E>>,
}

/// Owns a root on behalf of the listener it registered.
///
/// If the source lets go of the listener while the root still counts itself
/// connected, the source itself was dropped: the root and everything built
/// on it are severed so the chain can be freed.
struct Keepalive<E: 'static> {
    node: Rc<Node<E>>,
}

impl<E: 'static> Drop for Keepalive<E> {
    fn drop(&mut self) {
        let released = self.node.connected.get()
            && self
                .node
                .listener
                .borrow()
                .as_ref()
                .is_some_and(|listener| !listener.is_alive());
        if released {
            tracing::debug!(types = %self.node.types, "event source released a connected observer");
            self.node.sever();
        }
    }
}

impl<E: 'static> Node<E> {
    fn new(parent: Parent<E>, types: EventTypes, capture: bool) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Node<E>>| Node {
            parent,
            types,
            capture,
            callbacks: RefCell::new(Vec::new()),
            connected: Cell::new(false),
            firing: Cell::new(0),
            listener: RefCell::new(None),
            dependents: RefCell::new(Vec::new()),
            this: this.clone(),
        })
    }

    fn connect(&self) -> bool {
        if self.connected.get() {
            return false;
        }

        match &self.parent {
            Parent::Upstream(parent) => {
                let Some(this) = self.this.upgrade() else {
                    return false;
                };
                if !parent.attach(this) {
                    return false;
                }
                self.connected.set(true);
            }
            Parent::Source(source) => {
                let (Some(source), Some(node)) = (source.upgrade(), self.this.upgrade()) else {
                    tracing::debug!(types = %self.types, "event source is gone, observer stays disconnected");
                    return false;
                };
                self.connected.set(true);

                let keepalive = Keepalive { node };
                let listener = Listener::new(move |event: &E| keepalive.node.fire(event));
                *self.listener.borrow_mut() = Some(listener.downgrade());

                for event_type in self.types.iter() {
                    source.register(event_type, &listener, self.capture);
                }
                tracing::debug!(
                    types = %self.types,
                    capture = self.capture,
                    "observer subscribed at source"
                );
            }
        }

        true
    }

    fn disconnect(&self) -> bool {
        if !self.connected.replace(false) {
            return false;
        }

        self.sever_dependents();

        match &self.parent {
            Parent::Upstream(parent) => parent.detach(self),
            Parent::Source(source) => {
                let listener = self
                    .listener
                    .borrow_mut()
                    .take()
                    .and_then(|listener| listener.upgrade());
                if let (Some(source), Some(listener)) = (source.upgrade(), listener) {
                    for event_type in self.types.iter().rev() {
                        source.unregister(event_type, &listener);
                    }
                    tracing::debug!(types = %self.types, "observer unsubscribed at source");
                }
            }
        }

        self.clear_callbacks();
        true
    }

    fn sever_dependents(&self) {
        let dependents = mem::take(&mut *self.dependents.borrow_mut());
        for dependent in &dependents {
            dependent.sever();
        }
    }

    fn clear_callbacks(&self) {
        let cleared = mem::take(&mut *self.callbacks.borrow_mut());
        drop(cleared);
    }

    fn add(&self, callback: Callback<E>, target: Option<Weak<dyn Link>>) {
        if self.firing.get() == 0 {
            self.prune();
        }
        self.callbacks.borrow_mut().push(Entry { callback, target });
    }

    /// Drops forwarding entries whose node is gone. Only called outside of
    /// a fan-out, where indices may shift.
    fn prune(&self) {
        let pruned = {
            let mut callbacks = self.callbacks.borrow_mut();
            if !callbacks.iter().any(Entry::is_dead) {
                return;
            }
            let (live, dead): (Vec<_>, Vec<_>) = mem::take(&mut *callbacks)
                .into_iter()
                .partition(|entry| !entry.is_dead());
            *callbacks = live;
            dead
        };
        tracing::trace!(pruned = pruned.len(), types = %self.types, "released forwarding callbacks pruned");
    }

    /// Delivers `event` to every callback in registration order.
    ///
    /// The length is fixed before the first call and each entry is re-read
    /// by index with the borrow released while it runs, so a callback may
    /// add callbacks or disconnect the node. Callbacks added during the
    /// fan-out do not see the current event; clearing the list ends it.
    fn fire(&self, event: &E) {
        if self.firing.get() == 0 {
            self.prune();
        }
        let _fan_out = FanOut::enter(&self.firing);

        let len = self.callbacks.borrow().len();
        tracing::trace!(callbacks = len, types = %self.types, "observer fan-out");

        for index in 0..len {
            let callback = self
                .callbacks
                .borrow()
                .get(index)
                .map(|entry| Rc::clone(&entry.callback));
            let Some(callback) = callback else {
                break;
            };
            callback(event, index);
        }
    }
}

impl<E: 'static> Link for Node<E> {
    fn attach(&self, dependent: Rc<dyn Link>) -> bool {
        if !self.connected.get() && !self.connect() {
            return false;
        }
        let mut dependents = self.dependents.borrow_mut();
        let addr = link_addr(&*dependent);
        if !dependents.iter().any(|d| link_addr(&**d) == addr) {
            dependents.push(dependent);
        }
        true
    }

    fn detach(&self, dependent: &dyn Link) {
        let addr = link_addr(dependent);
        let (removed, orphaned) = {
            let mut dependents = self.dependents.borrow_mut();
            let removed = dependents
                .iter()
                .position(|d| link_addr(&**d) == addr)
                .map(|position| dependents.remove(position));
            (removed, dependents.is_empty())
        };
        if orphaned {
            self.disconnect();
        }
        drop(removed);
    }

    fn sever(&self) {
        if !self.connected.replace(false) {
            return;
        }
        self.sever_dependents();
        self.listener.borrow_mut().take();
        self.clear_callbacks();
    }
}

/// A node in an observer chain.
///
/// Cloning an `Observer` yields another handle to the same node.
pub struct Observer<E: 'static> {
    node: Rc<Node<E>>,
}

impl<E: 'static> Clone for Observer<E> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
        }
    }
}

impl<E: 'static> fmt::Debug for Observer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("types", &self.node.types)
            .field("capture", &self.node.capture)
            .field("connected", &self.node.connected.get())
            .field("callbacks", &self.node.callbacks.borrow().len())
            .finish()
    }
}

impl<E: 'static> Observer<E> {
    /// Creates a root observer over `source` for the whitespace-separated
    /// event `types`. Nothing is registered until the observer connects.
    ///
    /// The observer does not keep `source` alive.
    pub fn new(source: Rc<dyn EventSource<E>>, types: &str, options: ObserverOptions) -> Self {
        Self {
            node: Node::new(
                Parent::Source(Rc::downgrade(&source)),
                EventTypes::parse(types),
                options.capture,
            ),
        }
    }

    /// Builds a node parented on `self` with the same types and capture flag.
    fn downstream<U: 'static>(&self) -> Observer<U> {
        let parent: Rc<dyn Link> = Rc::clone(&self.node) as Rc<dyn Link>;
        Observer {
            node: Node::new(
                Parent::Upstream(parent),
                self.node.types.clone(),
                self.node.capture,
            ),
        }
    }

    /// Activates the chain up to the source.
    ///
    /// Returns `false` if the observer was already connected, in which case
    /// nothing happens, or if the source has been dropped.
    pub fn connect(&self) -> bool {
        self.node.connect()
    }

    /// Deactivates the observer, unsubscribing from the source if it is the
    /// root, and clears its callbacks.
    ///
    /// Returns `false` if the observer was not connected, in which case
    /// nothing happens.
    pub fn disconnect(&self) -> bool {
        self.node.disconnect()
    }

    /// Calls `callback(event, index)` for every event reaching this node.
    pub fn for_each<F>(&self, callback: F) -> Observer<E>
    where
        F: Fn(&E, usize) + 'static,
    {
        self.node.connect();
        self.node.add(Rc::new(callback), None);
        self.clone()
    }

    /// Returns a node receiving, unchanged, the events `predicate` accepts.
    #[must_use = "the filtered node delivers nothing until a callback is attached to it"]
    pub fn filter<F>(&self, predicate: F) -> Observer<E>
    where
        F: Fn(&E, usize) -> bool + 'static,
    {
        self.node.connect();

        let next = self.downstream::<E>();
        let target = Rc::downgrade(&next.node);
        let link: Weak<dyn Link> = target.clone();
        self.node.add(
            Rc::new(move |event: &E, index| {
                if predicate(event, index) {
                    if let Some(next) = target.upgrade() {
                        next.fire(event);
                    }
                }
            }),
            Some(link),
        );

        next
    }

    /// Returns a node receiving `mapper(event, index)` for every event.
    #[must_use = "the mapped node delivers nothing until a callback is attached to it"]
    pub fn map<U, F>(&self, mapper: F) -> Observer<U>
    where
        U: 'static,
        F: Fn(&E, usize) -> U + 'static,
    {
        self.node.connect();

        let next = self.downstream::<U>();
        let target = Rc::downgrade(&next.node);
        let link: Weak<dyn Link> = target.clone();
        self.node.add(
            Rc::new(move |event: &E, index| {
                let result = mapper(event, index);
                if let Some(next) = target.upgrade() {
                    next.fire(&result);
                }
            }),
            Some(link),
        );

        next
    }

    /// Disconnects this observer the first time `predicate` accepts an event.
    ///
    /// Callbacks registered after this one do not see the triggering event.
    pub fn until<F>(&self, predicate: F) -> Observer<E>
    where
        F: Fn(&E, usize) -> bool + 'static,
    {
        self.node.connect();

        let target = Rc::downgrade(&self.node);
        self.node.add(
            Rc::new(move |event: &E, index| {
                if predicate(event, index) {
                    if let Some(node) = target.upgrade() {
                        node.disconnect();
                    }
                }
            }),
            None,
        );

        self.clone()
    }

    /// Connects the observer and returns it.
    pub fn start(&self) -> Observer<E> {
        self.node.connect();
        self.clone()
    }

    /// Disconnects the observer and returns it. Restarting it later does
    /// not bring back the callbacks it had.
    pub fn stop(&self) -> Observer<E> {
        self.node.disconnect();
        self.clone()
    }

    /// Returns true between a connect and the matching disconnect.
    pub fn is_connected(&self) -> bool {
        self.node.connected.get()
    }

    /// Number of callbacks this node currently fans out to, forwarding
    /// entries of derived nodes included.
    pub fn callback_count(&self) -> usize {
        self.node.callbacks.borrow().len()
    }

    /// The event types the chain subscribes to at its source.
    pub fn event_types(&self) -> &EventTypes {
        &self.node.types
    }

    /// The capture flag passed to the source on registration.
    pub fn capture(&self) -> bool {
        self.node.capture
    }

    /// Returns a handle that does not keep the node alive.
    pub fn downgrade(&self) -> WeakObserver<E> {
        WeakObserver {
            node: Rc::downgrade(&self.node),
        }
    }

    /// Delivers `event` to this node's callbacks as if it had arrived from
    /// upstream.
    pub fn emit(&self, event: &E) {
        self.node.fire(event);
    }

    /// Returns true if both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Observer<E>) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

/// A non-owning observer handle.
///
/// Every operation fails with [`ObserverError::InvalidTarget`] once the node
/// has been dropped, which happens when it is disconnected and no strong
/// handle to it remains.
pub struct WeakObserver<E: 'static> {
    node: Weak<Node<E>>,
}

impl<E: 'static> Clone for WeakObserver<E> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<E: 'static> fmt::Debug for WeakObserver<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObserver")
            .field("alive", &(self.node.strong_count() > 0))
            .finish()
    }
}

impl<E: 'static> WeakObserver<E> {
    /// Returns a strong handle to the node.
    ///
    /// # Errors
    ///
    /// Fails with [`ObserverError::InvalidTarget`] if the node is gone.
    pub fn upgrade(&self) -> Result<Observer<E>, ObserverError> {
        self.node
            .upgrade()
            .map(|node| Observer { node })
            .ok_or(ObserverError::InvalidTarget {
                construct: "Observer",
            })
    }

    pub fn for_each<F>(&self, callback: F) -> Result<Observer<E>, ObserverError>
    where
        F: Fn(&E, usize) + 'static,
    {
        Ok(self.upgrade()?.for_each(callback))
    }

    pub fn filter<F>(&self, predicate: F) -> Result<Observer<E>, ObserverError>
    where
        F: Fn(&E, usize) -> bool + 'static,
    {
        Ok(self.upgrade()?.filter(predicate))
    }

    pub fn map<U, F>(&self, mapper: F) -> Result<Observer<U>, ObserverError>
    where
        U: 'static,
        F: Fn(&E, usize) -> U + 'static,
    {
        Ok(self.upgrade()?.map(mapper))
    }

    pub fn until<F>(&self, predicate: F) -> Result<Observer<E>, ObserverError>
    where
        F: Fn(&E, usize) -> bool + 'static,
    {
        Ok(self.upgrade()?.until(predicate))
    }

    pub fn start(&self) -> Result<Observer<E>, ObserverError> {
        Ok(self.upgrade()?.start())
    }

    pub fn stop(&self) -> Result<Observer<E>, ObserverError> {
        Ok(self.upgrade()?.stop())
    }
}
