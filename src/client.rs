use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use rand::random;
use uuid::Uuid;

use crate::backtrace::{current_stacktrace, process_event_stacktrace};
use crate::clientoptions::BeforeCallback;
use crate::constants::SDK_INFO;
use crate::exception::event_from_error;
use crate::protocol::{Breadcrumb, Event, Exception, Level, Mechanism, User, Value};
use crate::{ClientOptions, Scope, Transport};

impl<T: Into<ClientOptions>> From<T> for Client {
    fn from(o: T) -> Client {
        Client::with_options(o.into())
    }
}

/// The Statly Observe client.
///
/// The client owns a root [`Scope`] and the [`Transport`].  Every capture
/// runs the same pipeline:
///
/// 1. an event is built and the scope is applied to it (event values win),
///    client defaults are filled in and stacktraces are processed;
/// 2. the event is sampled according to `sample_rate`;
/// 3. `before_send` may modify or drop it;
/// 4. the transport receives it.
///
/// Captures return the id of the sent event, or the nil id if it was
/// dropped or the client has no transport.  Capturing never modifies the
/// scope.
///
/// # Examples
///
/// ```
/// let client = statly_observe::Client::from(statly_observe::ClientOptions::default());
/// assert!(!client.is_enabled());
/// assert!(client
///     .capture_message("nobody listens", statly_observe::Level::Info)
///     .is_nil());
/// ```
pub struct Client {
    options: ClientOptions,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    scope: RwLock<Scope>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("dsn", &self.dsn())
            .field("options", &self.options)
            .finish()
    }
}

impl Client {
    /// Creates a new client for the given options.
    ///
    /// If no transport is set on the options the client is disabled.
    pub fn with_options(options: ClientOptions) -> Client {
        statly_debug!(
            "[Client] Creating new client with options: dsn={:?}, sample_rate={}",
            options.dsn,
            options.sample_rate
        );

        let transport = options.transport.clone();
        if transport.is_none() {
            statly_debug!("[Client] No transport available (client will be disabled)");
        }
        let scope = Scope::with_max_breadcrumbs(options.max_breadcrumbs);

        Client {
            options,
            transport: RwLock::new(transport),
            scope: RwLock::new(scope),
        }
    }

    /// Returns the options of this client.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Returns the DSN that constructed this client.
    pub fn dsn(&self) -> Option<&str> {
        self.options.dsn.as_deref()
    }

    /// Quick check to see if the client is enabled.
    ///
    /// The client is enabled while it holds a transport, that is until it
    /// is closed.
    pub fn is_enabled(&self) -> bool {
        self.transport().is_some()
    }

    fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns a snapshot of the root scope.
    pub fn scope(&self) -> Scope {
        self.scope
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Invokes a function that can modify the root scope.
    pub fn configure_scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Scope) -> R,
    {
        let mut scope = self.scope.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut scope)
    }

    /// Sets the user on the root scope.
    pub fn set_user(&self, user: Option<User>) {
        self.configure_scope(|scope| scope.set_user(user))
    }

    /// Sets a tag on the root scope.
    pub fn set_tag<V: ToString>(&self, key: &str, value: V) {
        self.configure_scope(|scope| scope.set_tag(key, value))
    }

    /// Sets multiple tags on the root scope, keeping the others.
    pub fn set_tags<I, K, V>(&self, tags: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        self.configure_scope(|scope| scope.set_tags(tags))
    }

    /// Sets extra data on the root scope.
    pub fn set_extra(&self, key: &str, value: Value) {
        self.configure_scope(|scope| scope.set_extra(key, value))
    }

    /// Records a breadcrumb on the root scope.
    ///
    /// The breadcrumb passes through `before_breadcrumb` first, which may
    /// drop it.
    pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
        if let Some(breadcrumb) = self.process_breadcrumb(breadcrumb) {
            self.configure_scope(|scope| scope.add_breadcrumb(breadcrumb))
        }
    }

    pub(crate) fn process_breadcrumb(&self, breadcrumb: Breadcrumb) -> Option<Breadcrumb> {
        match self.options.before_breadcrumb {
            Some(ref func) => match call_isolated(func, breadcrumb.clone()) {
                Some(Some(breadcrumb)) => Some(breadcrumb),
                Some(None) => {
                    statly_debug!("[Client] before_breadcrumb callback dropped breadcrumb");
                    None
                }
                None => {
                    statly_debug!("[Client] before_breadcrumb callback panicked, keeping breadcrumb");
                    Some(breadcrumb)
                }
            },
            None => Some(breadcrumb),
        }
    }

    /// Captures a `std::error::Error` together with its `source()` chain.
    pub fn capture_error<E: Error + ?Sized>(&self, error: &E) -> Uuid {
        if !self.is_enabled() {
            return Uuid::nil();
        }
        self.capture_event(error_event(error), None)
    }

    /// Captures an error using the given scope instead of the root scope.
    pub fn capture_error_with_scope<E: Error + ?Sized>(&self, error: &E, scope: &Scope) -> Uuid {
        if !self.is_enabled() {
            return Uuid::nil();
        }
        self.capture_event(error_event(error), Some(scope))
    }

    /// Captures an arbitrary message.
    pub fn capture_message(&self, msg: &str, level: Level) -> Uuid {
        self.capture_event(Event::from_message(msg, level), None)
    }

    /// Captures a message using the given scope instead of the root scope.
    pub fn capture_message_with_scope(&self, msg: &str, level: Level, scope: &Scope) -> Uuid {
        self.capture_event(Event::from_message(msg, level), Some(scope))
    }

    /// Captures an event and hands it to the transport.
    ///
    /// When `scope` is `None` a snapshot of the root scope is applied.
    pub fn capture_event(&self, event: Event<'static>, scope: Option<&Scope>) -> Uuid {
        statly_debug!("[Client] Capturing event: {}", event.event_id);

        let transport = match self.transport() {
            Some(transport) => transport,
            None => {
                statly_debug!("[Client] No transport available, cannot capture event");
                return Uuid::nil();
            }
        };

        let snapshot;
        let scope = match scope {
            Some(scope) => scope,
            None => {
                snapshot = self.scope();
                &snapshot
            }
        };

        match self.prepare_event(event, scope) {
            Some(event) => {
                let event_id = event.event_id;
                statly_debug!("[Client] Sending {}", event);
                if transport.send(event) {
                    statly_debug!("[Client] Sent event {}", event_id);
                } else {
                    statly_debug!("[Client] Transport rejected event {}", event_id);
                }
                event_id
            }
            None => Uuid::nil(),
        }
    }

    /// Prepares an event for transmission.
    ///
    /// Returns `None` if the event was dropped by sampling or by
    /// `before_send`.
    pub fn prepare_event(&self, event: Event<'static>, scope: &Scope) -> Option<Event<'static>> {
        let mut event = self.build_event(event, scope);

        if !self.sample_should_send(self.options.sample_rate) {
            statly_debug!(
                "[Client] Event {} dropped due to sampling (rate: {})",
                event.event_id,
                self.options.sample_rate
            );
            return None;
        }

        if let Some(ref func) = self.options.before_send {
            statly_debug!("[Client] Invoking before_send callback for event {}", event.event_id);
            let id = event.event_id;
            match call_isolated(func, event.clone()) {
                Some(Some(mut processed_event)) => {
                    if processed_event.event_id != id {
                        statly_debug!("[Client] before_send callback changed the event id, restoring {}", id);
                        processed_event.event_id = id;
                    }
                    event = processed_event;
                }
                Some(None) => {
                    statly_debug!("[Client] before_send callback dropped event {}", id);
                    return None;
                }
                None => {
                    statly_debug!("[Client] before_send callback panicked, sending event {} unmodified", id);
                }
            }
        }

        Some(event)
    }

    fn build_event(&self, event: Event<'static>, scope: &Scope) -> Event<'static> {
        let mut event = scope.apply_to_event(event);

        if event.event_id.is_nil() {
            event.event_id = Uuid::new_v4();
        }
        if event.sdk.is_none() {
            event.sdk = Some(Cow::Borrowed(&*SDK_INFO));
        }
        if event.release.is_none() {
            event.release.clone_from(&self.options.release);
        }
        if event.environment.is_none() {
            event.environment.clone_from(&self.options.environment);
        }
        if event.server_name.is_none() {
            event.server_name.clone_from(&self.options.server_name);
        }

        if self.options.attach_stacktrace && !has_stacktrace(&event) {
            event.stacktrace = current_stacktrace();
        }

        for exc in event.exception.iter_mut() {
            if let Some(ref mut stacktrace) = exc.stacktrace {
                process_event_stacktrace(stacktrace, &self.options);
            }
        }
        if let Some(ref mut stacktrace) = event.stacktrace {
            process_event_stacktrace(stacktrace, &self.options);
        }

        event
    }

    /// Drains all pending events without shutting down.
    ///
    /// The timeout is passed to the transport as given.
    pub fn flush(&self, timeout: Option<Duration>) -> bool {
        statly_debug!("[Client] Flushing all pending events (timeout: {:?})", timeout);
        match self.transport() {
            Some(transport) => transport.flush(timeout),
            None => {
                statly_debug!("[Client] No transport to flush");
                true
            }
        }
    }

    /// Drains all pending events and closes the transport behind the
    /// client.  After closing the transport is removed and the client is
    /// disabled, so closing again does nothing and returns `true`.
    pub fn close(&self, timeout: Option<Duration>) -> bool {
        statly_debug!("[Client] Closing client (timeout: {:?})", timeout);
        let transport = self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match transport {
            Some(transport) => transport.close(timeout),
            None => {
                statly_debug!("[Client] No transport to close");
                true
            }
        }
    }

    /// Returns a random boolean with a probability defined
    /// by rate
    pub fn sample_should_send(&self, rate: f32) -> bool {
        if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            random::<f32>() < rate
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let transport = self
            .transport
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(transport) = transport {
            statly_debug!("[Client] Dropping client, closing transport");
            transport.close(Some(self.options.shutdown_timeout));
        }
    }
}

/// Runs a user callback, returning `None` if it panicked.
fn call_isolated<T>(func: &BeforeCallback<T>, value: T) -> Option<Option<T>> {
    panic::catch_unwind(AssertUnwindSafe(|| func(value))).ok()
}

/// Builds the event for an error.
///
/// Should extraction itself panic, a bare exception is captured instead.
fn error_event<E: Error + ?Sized>(error: &E) -> Event<'static> {
    panic::catch_unwind(AssertUnwindSafe(|| event_from_error(error))).unwrap_or_else(|_| {
        statly_debug!("[Client] Error extraction panicked, capturing a bare exception");
        Event {
            exception: vec![Exception {
                ty: "<unknown>".into(),
                mechanism: Some(Mechanism {
                    ty: "generic".into(),
                    handled: Some(true),
                }),
                ..Default::default()
            }]
            .into(),
            level: Level::Error,
            ..Default::default()
        }
    })
}

fn has_stacktrace(event: &Event) -> bool {
    event.stacktrace.is_some() || event.exception.iter().any(|exc| exc.stacktrace.is_some())
}
