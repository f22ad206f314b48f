//! Metric event infrastructure.
//!
//! Components emit typed event structs rather than calling the metrics
//! macros inline; the struct names what happened and the `emit` impl
//! owns the counter names and labels. Each crate defines its own events
//! against the shared [`InternalEvent`] trait.

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}
