use std::sync::Arc;
use std::time::Duration;

use crate::protocol::Event;

/// The trait for transports.
///
/// A transport is responsible for delivering events to the collector.  This
/// crate ships none; it only hands finished events over.  Retries, batching
/// and encoding are entirely up to the implementation.
pub trait Transport: Send + Sync + 'static {
    /// Hands an event over for delivery.
    ///
    /// Returns whether the event was accepted, which does not mean it was
    /// delivered.  Implementations must not panic on ordinary delivery
    /// failures.
    fn send(&self, event: Event<'static>) -> bool;

    /// Flushes pending events.
    ///
    /// Blocks until everything queued so far was attempted or `timeout`
    /// elapsed, returning `false` on timeout.
    fn flush(&self, _timeout: Option<Duration>) -> bool {
        true
    }

    /// Flushes pending events and releases resources.
    ///
    /// The client calls this at most once.
    fn close(&self, timeout: Option<Duration>) -> bool {
        self.flush(timeout)
    }
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, event: Event<'static>) -> bool {
        (**self).send(event)
    }

    fn flush(&self, timeout: Option<Duration>) -> bool {
        (**self).flush(timeout)
    }

    fn close(&self, timeout: Option<Duration>) -> bool {
        (**self).close(timeout)
    }
}
