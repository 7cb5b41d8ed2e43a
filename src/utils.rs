//! Useful utilities for working with events.

use std::fmt::{self, Write};
use std::panic::{self, AssertUnwindSafe};

const UNKNOWN_TYPE: &str = "<unknown>";

/// Parse the types name from `Debug` output.
///
/// If the `Debug` implementation fails or panics, `<unknown>` is returned.
///
/// # Examples
///
/// ```
/// use statly_observe::utils::parse_type_from_debug;
///
/// let err = "NaN".parse::<usize>().unwrap_err();
/// assert_eq!(&parse_type_from_debug(&err), "ParseIntError");
/// ```
pub fn parse_type_from_debug<D: fmt::Debug + ?Sized>(d: &D) -> String {
    let dbg = match try_format(|buf| write!(buf, "{:#?}", d)) {
        Some(dbg) => dbg,
        None => return UNKNOWN_TYPE.to_owned(),
    };

    dbg.split(&[' ', '(', '{', '\r', '\n'][..])
        .next()
        .unwrap_or(&dbg)
        .trim()
        .to_owned()
}

/// Runs a formatting function into a fresh string.
///
/// Returns `None` if formatting reports an error or panics.
pub(crate) fn try_format<F>(f: F) -> Option<String>
where
    F: FnOnce(&mut String) -> fmt::Result,
{
    let mut buf = String::new();
    match panic::catch_unwind(AssertUnwindSafe(|| f(&mut buf))) {
        Ok(Ok(())) => Some(buf),
        _ => None,
    }
}

const SMART_POINTERS: &[&str] = &["alloc::boxed::Box<", "alloc::sync::Arc<", "alloc::rc::Rc<"];

/// Extracts the module path from a fully qualified type name.
///
/// References and standard smart pointers are looked through, generic
/// arguments are ignored.  Trait objects and types without a path yield
/// `None`.
///
/// # Examples
///
/// ```
/// use statly_observe::utils::module_from_type_name;
///
/// assert_eq!(
///     module_from_type_name("core::num::error::ParseIntError").as_deref(),
///     Some("core::num::error")
/// );
/// assert_eq!(module_from_type_name("dyn core::error::Error"), None);
/// ```
pub fn module_from_type_name(type_name: &str) -> Option<String> {
    let mut name = type_name;
    loop {
        name = name.trim_start_matches('&').trim_start_matches("mut ");
        match SMART_POINTERS.iter().find_map(|p| name.strip_prefix(p)) {
            Some(inner) => name = inner,
            None => break,
        }
    }
    if name.starts_with("dyn ") {
        return None;
    }
    let path = name.split('<').next().unwrap_or(name);
    path.rsplit_once("::")
        .map(|(module, _)| module)
        .filter(|module| !module.is_empty())
        .map(str::to_owned)
}

#[test]
fn test_parse_type_from_debug() {
    use parse_type_from_debug as parse;
    #[derive(Debug)]
    struct MyStruct;
    assert_eq!(&parse(&MyStruct), "MyStruct");

    let err = "NaN".parse::<usize>().unwrap_err();
    assert_eq!(&parse(&err), "ParseIntError");

    let err = anyhow::Error::from(err);
    assert_eq!(&parse(&err), "ParseIntError");

    let err = "x".parse::<crate::Level>().unwrap_err();
    assert_eq!(&parse(&err), "ParseLevelError");

    struct FailingDebug;
    impl fmt::Debug for FailingDebug {
        fn fmt(&self, _: &mut fmt::Formatter) -> fmt::Result {
            Err(fmt::Error)
        }
    }
    assert_eq!(&parse(&FailingDebug), "<unknown>");

    struct PanickingDebug;
    impl fmt::Debug for PanickingDebug {
        fn fmt(&self, _: &mut fmt::Formatter) -> fmt::Result {
            panic!("no debug output");
        }
    }
    assert_eq!(&parse(&PanickingDebug), "<unknown>");
}

#[test]
fn test_module_from_type_name() {
    assert_eq!(
        module_from_type_name("std::io::error::Error").as_deref(),
        Some("std::io::error")
    );
    assert_eq!(
        module_from_type_name("my_app::Wrapper<alloc::string::String>").as_deref(),
        Some("my_app")
    );
    assert_eq!(
        module_from_type_name("&alloc::boxed::Box<std::io::error::Error>").as_deref(),
        Some("std::io::error")
    );
    assert_eq!(
        module_from_type_name("alloc::boxed::Box<dyn core::error::Error + Send>"),
        None
    );
    assert_eq!(module_from_type_name("Local"), None);
}
