//! The types of the event protocol.
//!
//! Everything here is plain data: events carry no reference back to the
//! scope or client that produced them.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::ops;
use std::str;
use std::time::SystemTime;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

use super::utils::{to_rfc3339, ts_seconds_float};

/// An arbitrary (JSON) value.
pub use serde_json::Value;

/// The map type used for tags, extra data and other free-form attributes.
pub type Map<K, V> = BTreeMap<K, V>;

/// A list that serializes as `{"values": [...]}`.
///
/// Exceptions and breadcrumbs are sent in this shape.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Values<T> {
    /// The wrapped items.
    pub values: Vec<T>,
}

impl<T> Values<T> {
    /// Checks whether there are no items.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T> Default for Values<T> {
    fn default() -> Self {
        Values { values: Vec::new() }
    }
}

impl<T> From<Vec<T>> for Values<T> {
    fn from(values: Vec<T>) -> Self {
        Values { values }
    }
}

impl<T> FromIterator<T> for Values<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Values {
            values: iter.into_iter().collect(),
        }
    }
}

impl<T> ops::Deref for Values<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.values
    }
}

impl<T> ops::DerefMut for Values<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.values
    }
}

impl<'a, T> IntoIterator for &'a Values<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut Values<T> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter_mut()
    }
}

/// Raised when an instruction address is not a hex number.
#[derive(Debug, Error)]
#[error("invalid instruction address {0:?}")]
pub struct ParseAddrError(String);

/// An instruction address, sent as a `0x`-prefixed hex string.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Addr(pub u64);

impl From<Addr> for String {
    fn from(addr: Addr) -> String {
        format!("{:#x}", addr.0)
    }
}

impl TryFrom<String> for Addr {
    type Error = ParseAddrError;

    fn try_from(value: String) -> Result<Addr, ParseAddrError> {
        let digits = value.trim_start_matches("0x").trim_start_matches("0X");
        match u64::from_str_radix(digits, 16) {
            Ok(addr) => Ok(Addr(addr)),
            Err(_) => Err(ParseAddrError(value)),
        }
    }
}

/// A single stack frame.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct Frame {
    /// The demangled function name, without the trailing hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// The raw symbol, when it differs from `function`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// The crate the function belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Base name of the source file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Full path of the source file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abs_path: Option<String>,
    /// Line number, 1-based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u64>,
    /// Column number, 1-based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colno: Option<u64>,
    /// Source lines before `context_line`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_context: Vec<String>,
    /// The source line of this frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_line: Option<String>,
    /// Source lines after `context_line`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_context: Vec<String>,
    /// Whether the frame belongs to the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_app: Option<bool>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_addr: Option<Addr>,
}

/// A stacktrace.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Stacktrace {
    /// The frames, outermost call first.
    #[serde(default)]
    pub frames: Vec<Frame>,
}

/// Describes how an exception was captured.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Mechanism {
    /// The mechanism identifier, `generic` for captured errors.
    #[serde(rename = "type")]
    pub ty: String,
    /// Whether the application handled the error itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handled: Option<bool>,
}

/// One error of a captured chain.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Exception {
    /// The type name of the error.
    #[serde(rename = "type")]
    pub ty: String,
    /// The `Display` output of the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// The module path the error type is defined in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Stacktrace>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<Mechanism>,
}

/// An error used when parsing `Level`.
#[derive(Debug, Error)]
#[error("invalid level")]
pub struct ParseLevelError;

/// The severity of an event or breadcrumb.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Debug information.
    Debug,
    /// Informational messages.
    #[default]
    #[serde(alias = "log")]
    Info,
    /// A warning.
    #[serde(alias = "warn")]
    Warning,
    /// An error.
    Error,
    /// An error that usually ends the process.
    #[serde(alias = "critical")]
    Fatal,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

impl str::FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Level, ParseLevelError> {
        match s {
            "debug" => Ok(Level::Debug),
            "info" | "log" => Ok(Level::Info),
            "warning" | "warn" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "fatal" | "critical" => Ok(Level::Fatal),
            _ => Err(ParseLevelError),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_breadcrumb_type() -> String {
    "default".into()
}

fn is_default_breadcrumb_type(ty: &str) -> bool {
    ty == "default"
}

/// A timestamped record of something that happened before an event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Breadcrumb {
    #[allow(missing_docs)]
    #[serde(default = "SystemTime::now", with = "ts_seconds_float")]
    pub timestamp: SystemTime,
    /// The breadcrumb type, `default` unless set.
    #[serde(
        rename = "type",
        default = "default_breadcrumb_type",
        skip_serializing_if = "is_default_breadcrumb_type"
    )]
    pub ty: String,
    /// A dotted category such as `ui.click`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Defaults to `info`.
    #[serde(default)]
    pub level: Level,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Free-form data attached to the breadcrumb.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl Default for Breadcrumb {
    fn default() -> Breadcrumb {
        Breadcrumb {
            timestamp: SystemTime::now(),
            ty: default_breadcrumb_type(),
            category: None,
            level: Level::Info,
            message: None,
            data: Map::new(),
        }
    }
}

/// The user affected by an event.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct User {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Any other attributes, serialized next to the known ones.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Names the library that produced an event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClientSdkInfo {
    #[allow(missing_docs)]
    pub name: String,
    #[allow(missing_docs)]
    pub version: String,
}

fn new_event_id() -> Uuid {
    Uuid::new_v4()
}

fn serialize_event_id<S: Serializer>(id: &Uuid, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&id.as_simple())
}

fn default_event_level() -> Level {
    Level::Error
}

fn default_platform() -> Cow<'static, str> {
    Cow::Borrowed(crate::constants::PLATFORM)
}

/// A captured error or message.
///
/// An event is one captured occurrence, either an error (with `exception`
/// set) or a message.  Once built by the client its `event_id` never
/// changes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Event<'a> {
    /// Random id, sent as 32 hex digits without dashes.
    #[serde(default = "new_event_id", serialize_with = "serialize_event_id")]
    pub event_id: Uuid,
    /// When the event happened, sent as float seconds since the epoch.
    #[serde(default = "SystemTime::now", with = "ts_seconds_float")]
    pub timestamp: SystemTime,
    /// Defaults to `error`.
    #[serde(default = "default_event_level")]
    pub level: Level,
    /// Always `rust` for events built here.
    #[serde(default = "default_platform")]
    pub platform: Cow<'a, str>,
    /// The message of a message event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The error chain, innermost cause first.
    #[serde(default, skip_serializing_if = "Values::is_empty")]
    pub exception: Values<Exception>,
    /// A stacktrace of the capturing thread, for message events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Stacktrace>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<Cow<'a, str>>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<Cow<'a, str>>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Cow<'a, str>>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub tags: Map<String, String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
    /// Breadcrumbs, oldest first.
    #[serde(default, skip_serializing_if = "Values::is_empty")]
    pub breadcrumbs: Values<Breadcrumb>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk: Option<Cow<'a, ClientSdkInfo>>,
}

impl<'a> Default for Event<'a> {
    fn default() -> Self {
        Event {
            event_id: new_event_id(),
            timestamp: SystemTime::now(),
            level: default_event_level(),
            platform: default_platform(),
            message: None,
            exception: Values::default(),
            stacktrace: None,
            server_name: None,
            release: None,
            environment: None,
            user: None,
            tags: Map::new(),
            extra: Map::new(),
            breadcrumbs: Values::default(),
            sdk: None,
        }
    }
}

impl<'a> Event<'a> {
    /// Creates an empty event with a fresh id and the current time.
    pub fn new() -> Event<'a> {
        Default::default()
    }

    /// Creates a message event.
    pub fn from_message<M: Into<String>>(message: M, level: Level) -> Event<'a> {
        Event {
            message: Some(message.into()),
            level,
            ..Default::default()
        }
    }

    /// Serializes the event into its JSON mapping.
    ///
    /// This is the payload shape a transport puts on the wire.  Should
    /// serialization fail, the identifying fields are still returned.
    pub fn to_value(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(value) => value,
            Err(err) => {
                statly_debug!("[Event] Failed to serialize event {}: {}", self.event_id, err);
                serde_json::json!({
                    "event_id": self.event_id.as_simple().to_string(),
                    "level": self.level.as_str(),
                    "platform": self.platform,
                })
            }
        }
    }
}

impl<'a> fmt::Display for Event<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Event({}, {}, {})",
            self.event_id.as_simple(),
            self.level,
            to_rfc3339(&self.timestamp)
        )
    }
}
