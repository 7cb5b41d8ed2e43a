//! Capturing, converting and post-processing of stacktraces.

use std::collections::HashMap;
use std::fs;

use backtrace::{Backtrace, BacktraceSymbol};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::protocol::{Addr, Frame, Stacktrace};
use crate::ClientOptions;

/// Leading crate name of a demangled function, also inside
/// `<T as crate::Trait>` impl paths.
static CRATE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:_?<)?(?:\w+ as )?([A-Za-z0-9_]+?)(?:::|\.\.|\[)").unwrap()
});

/// Crates whose frames never count as application code.
const NOT_IN_APP: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "backtrace::",
    "statly_observe::",
    "__rust_",
    "___rust_",
    "_rust_begin_unwind",
    "anyhow::",
    "log::",
];

/// Frames from which on everything further in is panic machinery.
const BORDER_FRAMES: &[&str] = &[
    "std::panicking::begin_panic",
    "core::panicking::panic",
    "anyhow::",
];

/// Frames belonging to the capturing machinery itself.
const CAPTURE_FRAMES: &[&str] = &["backtrace::", "statly_observe::"];

const UNKNOWN_FUNCTION: &str = "<unknown>";

/// Returns the crate a demangled function belongs to.
pub(crate) fn parse_crate_name(function: &str) -> Option<String> {
    CRATE_NAME
        .captures(function)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Checks whether `function` lives under the module path `prefix`.
///
/// Impl blocks (`<statly_observe::Hub>::run`) are looked into, and legacy
/// symbols writing `..` for `::` are accepted.
pub(crate) fn function_has_prefix(function: &str, prefix: &str) -> bool {
    let function = function
        .strip_prefix("_<")
        .or_else(|| function.strip_prefix('<'))
        .unwrap_or(function);
    let prefix = prefix.strip_prefix('<').unwrap_or(prefix);
    function.starts_with(prefix) || function.replace("..", "::").starts_with(prefix)
}

fn has_any_prefix(function: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| function_has_prefix(function, p))
}

fn frame_from_symbol(symbol: &BacktraceSymbol, addr: Addr) -> Frame {
    let (function, raw) = match symbol.name() {
        Some(name) => (format!("{:#}", name), name.as_str().map(str::to_owned)),
        None => (UNKNOWN_FUNCTION.to_owned(), None),
    };
    let path = symbol.filename();
    Frame {
        symbol: raw.filter(|raw| *raw != function),
        function: Some(function),
        filename: path
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned()),
        abs_path: path.map(|p| p.to_string_lossy().into_owned()),
        lineno: symbol.lineno().map(u64::from),
        colno: symbol.colno().map(u64::from),
        instruction_addr: Some(addr),
        ..Default::default()
    }
}

/// Converts a `backtrace::Backtrace` into a stacktrace, outermost call first.
///
/// Inlined functions get one frame each.  Frames that could not be resolved
/// are kept as `<unknown>` with their instruction address.
pub(crate) fn backtrace_to_stacktrace(bt: &Backtrace) -> Option<Stacktrace> {
    let mut frames = Vec::new();
    for frame in bt.frames() {
        let addr = Addr(frame.ip() as usize as u64);
        if frame.symbols().is_empty() {
            frames.push(Frame {
                function: Some(UNKNOWN_FUNCTION.to_owned()),
                instruction_addr: Some(addr),
                ..Default::default()
            });
        }
        frames.extend(frame.symbols().iter().map(|sym| frame_from_symbol(sym, addr)));
    }
    if frames.is_empty() {
        return None;
    }
    frames.reverse();
    Some(Stacktrace { frames })
}

/// Returns the stack of the calling thread, without the frames of the
/// capturing machinery.
pub fn current_stacktrace() -> Option<Stacktrace> {
    let mut stacktrace = backtrace_to_stacktrace(&Backtrace::new())?;
    strip_capture_frames(&mut stacktrace);
    if stacktrace.frames.is_empty() {
        None
    } else {
        Some(stacktrace)
    }
}

/// Removes the innermost frames that belong to this crate or the
/// backtrace walker.
fn strip_capture_frames(stacktrace: &mut Stacktrace) {
    let keep = stacktrace
        .frames
        .iter()
        .rposition(|frame| match frame.function.as_deref() {
            Some(UNKNOWN_FUNCTION) => false,
            Some(func) => !has_any_prefix(func, CAPTURE_FRAMES),
            None => true,
        })
        .map_or(0, |idx| idx + 1);
    stacktrace.frames.truncate(keep);
}

/// Cuts a stacktrace at its innermost border frame.
///
/// The border frame and everything called from it is removed.  Panic entry
/// points are always border frames; `is_border` can name more.
pub fn trim_stacktrace<F>(stacktrace: &mut Stacktrace, is_border: F)
where
    F: Fn(&Frame) -> bool,
{
    let border = stacktrace.frames.iter().rposition(|frame| {
        frame
            .function
            .as_deref()
            .map_or(false, |func| has_any_prefix(func, BORDER_FRAMES) || is_border(frame))
    });
    if let Some(idx) = border {
        stacktrace.frames.truncate(idx);
    }
}

/// Processes a stacktrace according to the client options.
///
/// Trims border frames if `trim_backtraces` is set, fills in the package of
/// each frame, classifies frames as in-app using `in_app_include` and
/// `in_app_exclude`, and loads source context when `source_context_lines`
/// is non-zero.
pub fn process_event_stacktrace(stacktrace: &mut Stacktrace, options: &ClientOptions) {
    if options.trim_backtraces {
        trim_stacktrace(stacktrace, |frame| {
            frame
                .function
                .as_deref()
                .map_or(false, |func| options.extra_border_frames.iter().any(|b| *b == func))
        });
    }

    for frame in &mut stacktrace.frames {
        let func = match frame.function.as_deref() {
            Some(func) => func,
            None => continue,
        };
        if frame.package.is_none() {
            frame.package = parse_crate_name(func);
        }
        if frame.in_app.is_none() {
            frame.in_app = if has_any_prefix(func, &options.in_app_include) {
                Some(true)
            } else if has_any_prefix(func, &options.in_app_exclude) || has_any_prefix(func, NOT_IN_APP)
            {
                Some(false)
            } else {
                None
            };
        }
    }

    // without a single positive match, every unclassified frame is the app
    if !stacktrace.frames.iter().any(|f| f.in_app == Some(true)) {
        for frame in &mut stacktrace.frames {
            frame.in_app.get_or_insert(true);
        }
    }

    if options.source_context_lines > 0 {
        add_source_context(stacktrace, options.source_context_lines);
    }
}

/// Loads the lines around each frame's line from its source file.
///
/// Frames without a readable file are left untouched.
fn add_source_context(stacktrace: &mut Stacktrace, context_lines: usize) {
    let mut sources: HashMap<String, Option<Vec<String>>> = HashMap::new();

    for frame in &mut stacktrace.frames {
        let (path, lineno) = match (&frame.abs_path, frame.lineno) {
            (Some(path), Some(lineno)) if lineno > 0 => (path.clone(), lineno as usize),
            _ => continue,
        };

        let lines = sources.entry(path).or_insert_with_key(|path| {
            match fs::read_to_string(path) {
                Ok(contents) => Some(contents.lines().map(str::to_owned).collect()),
                Err(err) => {
                    statly_debug!("[Backtrace] Cannot read source of {}: {}", path, err);
                    None
                }
            }
        });
        let lines = match lines {
            Some(lines) if lineno <= lines.len() => lines,
            _ => continue,
        };

        let idx = lineno - 1;
        let start = idx.saturating_sub(context_lines);
        let end = (idx + 1 + context_lines).min(lines.len());
        frame.pre_context = lines[start..idx].to_vec();
        frame.context_line = Some(lines[idx].clone());
        frame.post_context = lines[idx + 1..end].to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(function: &str) -> Frame {
        Frame {
            function: Some(function.into()),
            ..Default::default()
        }
    }

    fn stacktrace(functions: &[&str]) -> Stacktrace {
        Stacktrace {
            frames: functions.iter().map(|f| frame(f)).collect(),
        }
    }

    fn functions(stacktrace: &Stacktrace) -> Vec<&str> {
        stacktrace
            .frames
            .iter()
            .filter_map(|f| f.function.as_deref())
            .collect()
    }

    #[test]
    fn test_function_has_prefix() {
        let send = "<statly_observe::test::TestTransport as statly_observe::transport::Transport>::send";
        assert!(function_has_prefix(send, "statly_observe::"));
        assert!(function_has_prefix(send, "<statly_observe::test::"));
        assert!(function_has_prefix(
            "_<statly_observe..hub..Hub>::capture_event",
            "statly_observe::hub::"
        ));
        assert!(!function_has_prefix(
            "statly_observe_ext::hook",
            "statly_observe::"
        ));
        assert!(!function_has_prefix("app::main", "statly_observe::"));
    }

    #[test]
    fn test_parse_crate_name() {
        assert_eq!(
            parse_crate_name("statly_observe::hub::Hub::new").as_deref(),
            Some("statly_observe")
        );
        assert_eq!(
            parse_crate_name("<app::Job as worker::Task>::run").as_deref(),
            Some("app")
        );
        assert_eq!(
            parse_crate_name("_<app..Job as worker..Task>::run").as_deref(),
            Some("app")
        );
        assert_eq!(parse_crate_name("main"), None);
    }

    #[test]
    fn test_trim_at_border_frame() {
        let mut st = stacktrace(&[
            "main",
            "app::run",
            "std::panicking::begin_panic",
            "std::panicking::rust_panic_with_hook",
        ]);
        trim_stacktrace(&mut st, |_| false);
        assert_eq!(functions(&st), vec!["main", "app::run"]);

        let mut st = stacktrace(&["main", "app::run", "app::report", "app::report::inner"]);
        trim_stacktrace(&mut st, |f| f.function.as_deref() == Some("app::report"));
        assert_eq!(functions(&st), vec!["main", "app::run"]);
    }

    #[test]
    fn test_strip_capture_frames() {
        let mut st = stacktrace(&[
            "main",
            "app::run",
            "statly_observe::client::Client::capture_error",
            "statly_observe::exception::exceptions_from_error",
            "backtrace::capture::Backtrace::new",
            "<unknown>",
        ]);
        strip_capture_frames(&mut st);
        assert_eq!(functions(&st), vec!["main", "app::run"]);
    }

    #[test]
    fn test_strip_keeps_outer_crate_frames() {
        // only the innermost run is machinery; outer frames of this crate
        // (a hub running user code) stay
        let mut st = stacktrace(&[
            "main",
            "statly_observe::hub::Hub::with_scope",
            "app::job",
            "statly_observe::hub::Hub::capture_message",
        ]);
        strip_capture_frames(&mut st);
        assert_eq!(
            functions(&st),
            vec!["main", "statly_observe::hub::Hub::with_scope", "app::job"]
        );
    }

    #[test]
    fn test_in_app_classification() {
        let mut st = stacktrace(&[
            "std::rt::lang_start",
            "app::main",
            "vendored::helper",
            "statly_observe::client::Client::capture_message",
            "app::inner",
        ]);
        let options = ClientOptions {
            in_app_include: vec!["app::"],
            in_app_exclude: vec!["vendored::"],
            ..Default::default()
        };
        process_event_stacktrace(&mut st, &options);

        let in_app: Vec<_> = st.frames.iter().map(|f| f.in_app).collect();
        assert_eq!(
            in_app,
            vec![Some(false), Some(true), Some(false), Some(false), Some(true)]
        );
        assert_eq!(st.frames[1].package.as_deref(), Some("app"));
        assert_eq!(st.frames[3].package.as_deref(), Some("statly_observe"));
    }

    #[test]
    fn test_everything_in_app_without_hints() {
        let mut st = stacktrace(&["std::rt::lang_start", "main", "worker::step"]);
        process_event_stacktrace(&mut st, &ClientOptions::default());
        let in_app: Vec<_> = st.frames.iter().map(|f| f.in_app).collect();
        assert_eq!(in_app, vec![Some(false), Some(true), Some(true)]);
    }

    #[test]
    fn test_source_context() {
        let mut st = Stacktrace {
            frames: vec![Frame {
                function: Some("app::main".into()),
                abs_path: Some(file!().into()),
                lineno: Some(1),
                ..Default::default()
            }],
        };
        let options = ClientOptions {
            source_context_lines: 2,
            ..Default::default()
        };
        process_event_stacktrace(&mut st, &options);

        let frame = &st.frames[0];
        if frame.context_line.is_some() {
            assert_eq!(
                frame.context_line.as_deref(),
                Some("//! Capturing, converting and post-processing of stacktraces.")
            );
            assert!(frame.pre_context.is_empty());
            assert_eq!(frame.post_context.len(), 2);
        }
    }

    #[test]
    fn test_current_stacktrace_has_no_capture_frames() {
        if let Some(st) = current_stacktrace() {
            let innermost = st.frames.last().and_then(|f| f.function.as_deref());
            if let Some(func) = innermost {
                assert!(!has_any_prefix(func, CAPTURE_FRAMES));
            }
            assert!(st.frames.iter().all(|f| f.instruction_addr.is_some()));
        }
    }
}
