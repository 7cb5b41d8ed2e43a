/// Returns the intended release as an `Option<Cow<'static, str>>`.
///
/// This can be used with `ClientOptions` to set the release name.  It uses
/// the information supplied by cargo to calculate a release.
///
/// # Examples
///
/// ```
/// # #[macro_use] extern crate statly_observe;
/// # fn main() {
/// let options = statly_observe::ClientOptions {
///     release: statly_observe::release_name!(),
///     ..Default::default()
/// };
/// assert!(options.release.unwrap().contains('@'));
/// # }
/// ```
#[macro_export]
macro_rules! release_name {
    () => {{
        use std::sync::OnceLock;
        static RELEASE: OnceLock<Option<String>> = OnceLock::new();
        RELEASE
            .get_or_init(|| {
                option_env!("CARGO_PKG_NAME").and_then(|name| {
                    option_env!("CARGO_PKG_VERSION").map(|version| format!("{}@{}", name, version))
                })
            })
            .as_deref()
            .map(::std::borrow::Cow::Borrowed)
    }};
}

/// Internal diagnostics, routed to the `log` crate under the
/// `statly_observe` target.
macro_rules! statly_debug {
    ($($arg:tt)*) => {
        ::log::debug!(target: "statly_observe", $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn release_name_uses_cargo_metadata() {
        let release = release_name!().unwrap();
        assert_eq!(
            release,
            format!("statly-observe@{}", env!("CARGO_PKG_VERSION"))
        );
    }
}
