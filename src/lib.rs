//! This crate provides the client side of [Statly Observe]: it captures
//! errors and messages from a running process, enriches them with contextual
//! data and hands them to a transport for delivery.
//!
//! # Core Concepts
//!
//! The crate is centered around the [`Client`], the [`Scope`] and the
//! [`Transport`] trait:
//!
//! * The [`Scope`] holds the data that is relevant to everything that gets
//!   captured: the user, tags, extra data and a bounded list of breadcrumbs.
//! * The [`Client`] owns a root scope and a transport.  Every capture takes a
//!   snapshot of the scope, builds an [`Event`], runs it through sampling and
//!   the `before_send` hook and finally sends it.
//! * The [`Transport`] does the actual delivery.  This crate does not ship a
//!   network transport; applications provide one.
//!
//! For data that only belongs to a single request or job, a [`Hub`] pairs a
//! shared client with its own scope.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use statly_observe::{Client, ClientOptions, Event, Level, Transport};
//!
//! #[derive(Default)]
//! struct PrintTransport(Mutex<Vec<Event<'static>>>);
//!
//! impl Transport for PrintTransport {
//!     fn send(&self, event: Event<'static>) -> bool {
//!         println!("{}", event.to_value());
//!         self.0.lock().unwrap().push(event);
//!         true
//!     }
//! }
//!
//! let transport = Arc::new(PrintTransport::default());
//! let client = Client::from(ClientOptions {
//!     dsn: Some("https://sk_test_xxx@statly.live/test".into()),
//!     transport: Some(transport.clone()),
//!     ..Default::default()
//! });
//!
//! client.set_tag("worker", "worker1");
//! let event_id = client.capture_message("Hello World!", Level::Warning);
//! assert!(!event_id.is_nil());
//!
//! let events = transport.0.lock().unwrap();
//! assert_eq!(events[0].tags["worker"], "worker1");
//! ```
//!
//! # Features
//!
//! - `feature = "test"`: Activates the [`test`] module, which comes with a
//!   test transport that collects all sent events for inspection.
//!
//! [Statly Observe]: https://statly.live/
//! [`test`]: test/index.html

#![warn(missing_docs)]

// macros; these need to be first to be used by other modules
#[macro_use]
mod macros;

mod backtrace;
mod client;
mod clientoptions;
mod constants;
mod exception;
mod hub;
pub mod protocol;
mod scope;
mod transport;
pub mod utils;


pub use crate::backtrace::{current_stacktrace, process_event_stacktrace, trim_stacktrace};
pub use crate::client::Client;
pub use crate::clientoptions::{BeforeCallback, ClientOptions};
pub use crate::constants::{SDK_INFO, VERSION};
pub use crate::exception::{
    event_from_error, exception_from_error, exceptions_from_error, MAX_CHAIN_DEPTH,
};
pub use crate::hub::Hub;
pub use crate::protocol::{Breadcrumb, Event, Exception, Level, User, Value};
pub use crate::scope::Scope;
pub use crate::transport::Transport;

pub use uuid::Uuid;
