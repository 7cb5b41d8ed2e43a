use std::error::Error;
use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use crate::protocol::{Breadcrumb, Event, Level};
use crate::{Client, Scope};

/// Pairs a shared client with the scope of one unit of work.
///
/// A hub is created per request, job or thread, seeded from the client's
/// root scope.  Changes made through the hub stay in the hub; the client's
/// root scope is never touched.  Nothing is looked up implicitly: the hub
/// is passed along explicitly to whatever code should report through it.
///
/// The hub is internally synchronized, so it can be shared between threads
/// if needed.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use statly_observe::{Client, ClientOptions, Hub, Level};
///
/// let client = Arc::new(Client::from(ClientOptions::default()));
/// let hub = Hub::new(client);
/// hub.configure_scope(|scope| scope.set_tag("request_id", "r-42"));
/// hub.capture_message("handled request", Level::Info);
/// ```
#[derive(Debug)]
pub struct Hub {
    client: Arc<Client>,
    scope: RwLock<Scope>,
    last_event_id: RwLock<Option<Uuid>>,
}

impl Hub {
    /// Creates a new hub starting from a snapshot of the client's root scope.
    pub fn new(client: Arc<Client>) -> Hub {
        let scope = client.scope();
        Hub::with_client_and_scope(client, scope)
    }

    /// Creates a new hub from the given client and scope.
    pub fn with_client_and_scope(client: Arc<Client>, scope: Scope) -> Hub {
        Hub {
            client,
            scope: RwLock::new(scope),
            last_event_id: RwLock::new(None),
        }
    }

    /// Returns the client of this hub.
    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    /// Returns a snapshot of the hub's scope.
    pub fn scope(&self) -> Scope {
        self.scope
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Invokes a function that can modify the hub's scope.
    pub fn configure_scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Scope) -> R,
    {
        let mut scope = self.scope.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut scope)
    }

    /// Runs `callback` with a temporary hub whose scope is a copy of this
    /// one, reconfigured by `scope_config`.
    ///
    /// Nothing done through the temporary hub affects this one.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use statly_observe::{Client, ClientOptions, Hub, Level};
    ///
    /// let hub = Hub::new(Arc::new(Client::from(ClientOptions::default())));
    /// hub.with_scope(
    ///     |scope| scope.set_tag("step", "import"),
    ///     |hub| hub.capture_message("importing", Level::Info),
    /// );
    /// assert_eq!(hub.scope().tags().count(), 0);
    /// ```
    pub fn with_scope<C, F, R>(&self, scope_config: C, callback: F) -> R
    where
        C: FnOnce(&mut Scope),
        F: FnOnce(&Hub) -> R,
    {
        let mut scope = self.scope();
        scope_config(&mut scope);
        let child = Hub::with_client_and_scope(self.client.clone(), scope);
        let rv = callback(&child);
        if let Some(id) = child.last_event_id() {
            self.set_last_event_id(id);
        }
        rv
    }

    /// Adds a new breadcrumb to the hub's scope.
    ///
    /// The client's `before_breadcrumb` callback applies.
    pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
        if let Some(breadcrumb) = self.client.process_breadcrumb(breadcrumb) {
            self.configure_scope(|scope| scope.add_breadcrumb(breadcrumb))
        }
    }

    /// Sends the event to the client with the hub's scope.
    pub fn capture_event(&self, event: Event<'static>) -> Uuid {
        let scope = self.scope();
        let event_id = self.client.capture_event(event, Some(&scope));
        if !event_id.is_nil() {
            self.set_last_event_id(event_id);
        }
        event_id
    }

    /// Captures an arbitrary message with the hub's scope.
    pub fn capture_message(&self, msg: &str, level: Level) -> Uuid {
        self.capture_event(Event::from_message(msg, level))
    }

    /// Captures a `std::error::Error` with the hub's scope.
    pub fn capture_error<E: Error + ?Sized>(&self, error: &E) -> Uuid {
        let scope = self.scope();
        let event_id = self.client.capture_error_with_scope(error, &scope);
        if !event_id.is_nil() {
            self.set_last_event_id(event_id);
        }
        event_id
    }

    /// Returns the id of the last event sent through this hub.
    pub fn last_event_id(&self) -> Option<Uuid> {
        *self
            .last_event_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_last_event_id(&self, event_id: Uuid) {
        *self
            .last_event_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(event_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestTransport;
    use crate::ClientOptions;

    #[test]
    fn test_hub_scope_is_isolated() {
        let transport = TestTransport::new();
        let client = Arc::new(Client::from(ClientOptions {
            transport: Some(transport.clone()),
            ..Default::default()
        }));
        client.set_tag("service", "api");

        let hub = Hub::new(client.clone());
        hub.configure_scope(|scope| scope.set_tag("request_id", "r-1"));
        let id = hub.capture_message("from hub", Level::Info);
        client.capture_message("from client", Level::Info);

        let events = transport.fetch_and_clear_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].tags["service"], "api");
        assert_eq!(events[0].tags["request_id"], "r-1");
        assert_eq!(events[1].tags.get("request_id"), None);
        assert_eq!(hub.last_event_id(), Some(id));
    }

    #[test]
    fn test_with_scope_does_not_leak() {
        let transport = TestTransport::new();
        let hub = Hub::new(Arc::new(Client::from(ClientOptions {
            transport: Some(transport.clone()),
            ..Default::default()
        })));

        let id = hub.with_scope(
            |scope| scope.set_tag("temporary", "yes"),
            |hub| hub.capture_message("inside", Level::Info),
        );
        hub.capture_message("outside", Level::Info);

        let events = transport.fetch_and_clear_events();
        assert_eq!(events[0].tags["temporary"], "yes");
        assert!(events[1].tags.is_empty());
        assert_eq!(events[0].event_id, id);
    }
}
