//! Error types for observer chains.

/// Errors raised by observer operations.
///
/// Both kinds are programmer errors: they are reported synchronously at the
/// start of the offending call and the call has no side effects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObserverError {
    /// The operation was invoked on something that is not a live observer.
    #[error("{construct} requires a valid target")]
    InvalidTarget {
        /// Name of the construct the operation belongs to.
        construct: &'static str,
    },

    /// The operation needs a callback and none could be resolved.
    #[error("{operation}() requires a valid callback")]
    InvalidCallback {
        /// Name of the operation that required the callback.
        operation: &'static str,
    },
}
