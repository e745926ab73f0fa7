//! Lazy, composable observer chains over discrete event sources.
//!
//! An [`Observer`] is a node in a chain. The root node sits on top of an
//! external [`EventSource`]; every other node sits on top of another
//! observer. Operators build the chain:
//!
//! | Operator | Builds a node | Forwarding policy |
//! |----------|---------------|-------------------|
//! | [`Observer::for_each`] | no | calls the callback for every event |
//! | [`Observer::filter`] | yes | forwards events the predicate accepts |
//! | [`Observer::map`] | yes | forwards the mapped value of every event |
//! | [`Observer::until`] | no | disconnects the node once the predicate accepts |
//! | [`Observer::start`] / [`Observer::stop`] | no | connect / disconnect only |
//!
//! Nothing is subscribed at the source until an operator (or `start`)
//! connects the chain. Connecting a node connects its ancestors first, and
//! only the node whose parent is the source registers listeners there, once
//! per event type. Disconnecting unregisters in reverse order and clears the
//! node's callbacks.
//!
//! Delivery is synchronous and single-threaded: every stage of a chain runs
//! inline on the thread that dispatched the event.
//!
//! # Lifetime
//!
//! A connected chain is owned by the listener its root registered at the
//! source, so `emitter.on("click").for_each(f);` keeps delivering after the
//! returned handle is dropped. A chain ends when it is stopped, when an
//! `until` predicate accepts, when an ancestor disconnects, or when the
//! source itself is dropped. Observers never keep their source alive.
//!
//! # Usage
//!
//! ```rust,ignore
//! use strand_core::EventSourceExt;
//!
//! let clicks = emitter
//!     .on("click")
//!     .filter(|event: &Click, _| event.button == 0)
//!     .map(|event, _| (event.x, event.y))
//!     .for_each(|(x, y), _| println!("clicked at {x},{y}"));
//! ```

mod error;
mod observer;
mod options;
mod pipeline;
mod source;
mod types;

pub use error::ObserverError;
pub use observer::{Observer, WeakObserver};
pub use options::ObserverOptions;
pub use pipeline::{assemble, Mapper, Predicate, Registry, Sink, StageOp, StageSpec};
pub use source::{EventSource, EventSourceExt, Listener};
pub use types::EventTypes;
