//! The event protocol.
//!
//! Most constructs in the protocol map directly to types here.  All types
//! are serializable to JSON with `serde` and try to implement `Default`, so
//! objects can be created conveniently and missing attributes filled in:
//!
//! ```rust
//! use statly_observe::protocol::{Event, Level};
//!
//! let event = Event {
//!     message: Some("Hello World!".to_string()),
//!     level: Level::Info,
//!     ..Default::default()
//! };
//! assert_eq!(event.to_value()["level"], "info");
//! ```
//!
//! Ordering conventions: `Event::exception` lists the innermost (root)
//! cause first and the outermost error last, and `Stacktrace::frames` lists
//! the outermost call first and the innermost frame last.

mod utils;
mod v1;

pub use self::v1::*;
