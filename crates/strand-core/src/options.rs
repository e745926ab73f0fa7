//! Per-observer configuration.

use serde::{Deserialize, Serialize};

/// Options fixed at construction of a root observer.
///
/// Derived nodes built by `filter` and `map` inherit the options of the node
/// they were built from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverOptions {
    /// Passed through to [`EventSource::register`](crate::EventSource::register).
    /// Default: `false`.
    pub capture: bool,
}

impl ObserverOptions {
    pub fn with_capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }
}
