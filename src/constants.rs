use crate::protocol::ClientSdkInfo;

/// The version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The platform reported on every event.
pub(crate) const PLATFORM: &str = "rust";

lazy_static::lazy_static! {
    /// The SDK information attached to every event.
    pub static ref SDK_INFO: ClientSdkInfo = ClientSdkInfo {
        name: "statly-observe.rust".into(),
        version: VERSION.into(),
    };
}
