use std::any::type_name;
use std::error::Error;
use std::fmt::Write;

use crate::backtrace::current_stacktrace;
use crate::protocol::{Event, Exception, Level, Mechanism};
use crate::utils::{module_from_type_name, parse_type_from_debug, try_format};

/// The maximum number of errors taken from a `source()` chain.
pub const MAX_CHAIN_DEPTH: usize = 32;

/// Creates an `Exception` from a single `std::error::Error`.
///
/// The type is parsed from the `Debug` output, the value is the `Display`
/// output and the module is derived from the concrete type of `err`.  The
/// stack of the calling thread is attached.  A failing `Display` leaves the
/// value empty and a failing `Debug` reports the type as `<unknown>`.  The `source()` chain is not
/// followed; see [`exceptions_from_error`] for that.
///
/// # Examples
///
/// ```
/// let err = "NaN".parse::<usize>().unwrap_err();
/// let exc = statly_observe::exception_from_error(&err);
/// assert_eq!(exc.ty, "ParseIntError");
/// assert_eq!(exc.value.as_deref(), Some("invalid digit found in string"));
/// assert_eq!(exc.module.as_deref(), Some("core::num::error"));
/// ```
pub fn exception_from_error<E: Error + ?Sized>(err: &E) -> Exception {
    Exception {
        stacktrace: current_stacktrace(),
        ..exception_record(err, module_from_type_name(type_name::<E>()))
    }
}

fn exception_record<E: Error + ?Sized>(err: &E, module: Option<String>) -> Exception {
    Exception {
        ty: parse_type_from_debug(err),
        value: try_format(|buf| write!(buf, "{}", err)),
        module,
        ..Default::default()
    }
}

/// Creates the list of exceptions for an error and its `source()` chain.
///
/// The list is sorted innermost cause first, so the error that was passed
/// in comes last.  Only that outermost exception carries a stacktrace and a
/// mechanism.
///
/// At most [`MAX_CHAIN_DEPTH`] errors are taken, and walking stops as soon
/// as a chain leads back to an error it already visited.
pub fn exceptions_from_error<E: Error + ?Sized>(err: &E) -> Vec<Exception> {
    let mut outermost = exception_from_error(err);
    outermost.mechanism = Some(Mechanism {
        ty: "generic".into(),
        handled: Some(true),
        ..Default::default()
    });

    let mut visited = vec![(err as *const E as *const () as usize, outermost.ty.clone())];
    let mut exceptions = vec![outermost];

    let mut source = err.source();
    while let Some(cause) = source {
        if exceptions.len() >= MAX_CHAIN_DEPTH {
            statly_debug!(
                "[Exception] Error chain exceeds {} entries, truncating",
                MAX_CHAIN_DEPTH
            );
            break;
        }

        let exception = exception_record(cause, None);
        let identity = (cause as *const dyn Error as *const () as usize, exception.ty.clone());
        if visited.contains(&identity) {
            statly_debug!("[Exception] Error chain loops back to {}", exception.ty);
            break;
        }
        visited.push(identity);
        exceptions.push(exception);
        source = cause.source();
    }

    exceptions.reverse();
    exceptions
}

/// Create an `Event` from a `std::error::Error`.
///
/// A chain of errors will be resolved as well, sorted innermost cause
/// first.
///
/// # Examples
///
/// ```
/// use thiserror::Error;
///
/// #[derive(Debug, Error)]
/// #[error("inner")]
/// struct InnerError;
///
/// #[derive(Debug, Error)]
/// #[error("outer")]
/// struct OuterError(#[from] InnerError);
///
/// let event = statly_observe::event_from_error(&OuterError(InnerError));
/// assert_eq!(event.level, statly_observe::Level::Error);
/// assert_eq!(event.exception.len(), 2);
/// assert_eq!(&event.exception[0].ty, "InnerError");
/// assert_eq!(event.exception[0].value, Some("inner".into()));
/// assert_eq!(&event.exception[1].ty, "OuterError");
/// assert_eq!(event.exception[1].value, Some("outer".into()));
/// ```
pub fn event_from_error<E: Error + ?Sized>(err: &E) -> Event<'static> {
    Event {
        exception: exceptions_from_error(err).into(),
        level: Level::Error,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::io;

    use super::*;

    #[derive(Debug)]
    struct Looping(u8);

    impl fmt::Display for Looping {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "looping")
        }
    }

    impl Error for Looping {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            static SELF: Looping = Looping(0);
            Some(&SELF)
        }
    }

    #[derive(Debug)]
    struct Deep(usize, Option<Box<Deep>>);

    impl fmt::Display for Deep {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "level {}", self.0)
        }
    }

    impl Error for Deep {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            self.1.as_deref().map(|e| e as &(dyn Error + 'static))
        }
    }

    #[derive(Debug)]
    struct BrokenDisplay;

    impl fmt::Display for BrokenDisplay {
        fn fmt(&self, _: &mut fmt::Formatter) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    impl Error for BrokenDisplay {}

    struct PanickingFormat;

    impl fmt::Debug for PanickingFormat {
        fn fmt(&self, _: &mut fmt::Formatter) -> fmt::Result {
            panic!("debug exploded")
        }
    }

    impl fmt::Display for PanickingFormat {
        fn fmt(&self, _: &mut fmt::Formatter) -> fmt::Result {
            panic!("display exploded")
        }
    }

    impl Error for PanickingFormat {}

    #[test]
    fn test_failing_display_leaves_value_empty() {
        let exceptions = exceptions_from_error(&BrokenDisplay);

        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].ty, "BrokenDisplay");
        assert_eq!(exceptions[0].value, None);
    }

    #[test]
    fn test_panicking_formatters_degrade() {
        let event = event_from_error(&PanickingFormat);

        assert_eq!(event.exception.len(), 1);
        assert_eq!(event.exception[0].ty, "<unknown>");
        assert_eq!(event.exception[0].value, None);
        assert_eq!(
            event.exception[0].module.as_deref(),
            Some("statly_observe::exception::tests")
        );
    }

    #[test]
    fn test_io_error() {
        let err = io::Error::new(io::ErrorKind::Other, "disk on fire");
        let exceptions = exceptions_from_error(&err);

        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].ty, "Custom");
        assert_eq!(exceptions[0].value.as_deref(), Some("disk on fire"));
        assert_eq!(exceptions[0].module.as_deref(), Some("std::io::error"));
        assert_eq!(
            exceptions[0].mechanism.as_ref().map(|m| m.ty.as_str()),
            Some("generic")
        );
    }

    #[test]
    fn test_self_referencing_source_terminates() {
        let exceptions = exceptions_from_error(&Looping(1));
        assert_eq!(exceptions.len(), 2);
        assert!(exceptions.iter().all(|e| e.ty == "Looping"));
    }

    #[test]
    fn test_chain_depth_is_bounded() {
        let err = (0..100).fold(None, |inner, i| Some(Box::new(Deep(i, inner))));
        let err = err.unwrap();
        let exceptions = exceptions_from_error(&*err);

        assert_eq!(exceptions.len(), MAX_CHAIN_DEPTH);
        assert_eq!(exceptions.last().unwrap().value.as_deref(), Some("level 99"));
        assert_eq!(
            exceptions[0].value.as_deref(),
            Some(format!("level {}", 99 - MAX_CHAIN_DEPTH + 1).as_str())
        );
    }

    #[test]
    fn test_only_outermost_has_stacktrace() {
        let err = (0..3).fold(None, |inner, i| Some(Box::new(Deep(i, inner))));
        let exceptions = exceptions_from_error(&*err.unwrap());

        assert!(exceptions[..2].iter().all(|e| e.stacktrace.is_none()));
        assert!(exceptions[..2].iter().all(|e| e.mechanism.is_none()));
        assert!(exceptions[..2].iter().all(|e| e.module.is_none()));
        assert_eq!(
            exceptions[2].module.as_deref(),
            Some("statly_observe::exception::tests")
        );
    }
}
