use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::protocol::{Breadcrumb, Event};
use crate::scope::DEFAULT_MAX_BREADCRUMBS;
use crate::Transport;

/// Type alias for before event/breadcrumb handlers.
pub type BeforeCallback<T> = Arc<dyn Fn(T) -> Option<T> + Send + Sync>;

/// Configuration settings for the client.
///
/// Options are fixed once a [`Client`](crate::Client) has been created from
/// them.
///
/// # Examples
///
/// ```
/// let options = statly_observe::ClientOptions {
///     environment: Some("production".into()),
///     sample_rate: 0.5,
///     ..Default::default()
/// };
/// assert_eq!(options.max_breadcrumbs, 100);
/// ```
#[derive(Clone)]
pub struct ClientOptions {
    /// The DSN to use.  It is passed through to the transport unparsed.
    pub dsn: Option<Cow<'static, str>>,
    /// The release to be sent with events.
    pub release: Option<Cow<'static, str>>,
    /// The environment to be sent with events.
    pub environment: Option<Cow<'static, str>>,
    /// The server name to be reported.
    pub server_name: Option<Cow<'static, str>>,
    /// The sample rate for event submission. (0.0 - 1.0, defaults to 1.0)
    pub sample_rate: f32,
    /// Maximum number of breadcrumbs. (defaults to 100)
    pub max_breadcrumbs: usize,
    /// Attaches stacktraces to messages.
    pub attach_stacktrace: bool,
    /// Module prefixes that are always considered "in_app".
    pub in_app_include: Vec<&'static str>,
    /// Module prefixes that are never "in_app".
    pub in_app_exclude: Vec<&'static str>,
    /// Border frames which indicate a border from a backtrace to
    /// useless internals. Some are automatically included.
    pub extra_border_frames: Vec<&'static str>,
    /// Automatically trim backtraces of junk before sending. (defaults to true)
    pub trim_backtraces: bool,
    /// Number of source lines loaded around each frame. (defaults to 0, off)
    pub source_context_lines: usize,
    /// Callback that is executed before event sending.
    pub before_send: Option<BeforeCallback<Event<'static>>>,
    /// Callback that is executed for each Breadcrumb being added.
    pub before_breadcrumb: Option<BeforeCallback<Breadcrumb>>,
    /// The transport to use.  Without one the client is disabled.
    pub transport: Option<Arc<dyn Transport>>,
    /// The timeout on client close for draining events.
    pub shutdown_timeout: Duration,
}

impl ClientOptions {
    /// Creates new Options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates new Options and immediately configures them.
    ///
    /// ```
    /// let options = statly_observe::ClientOptions::configure(|o| {
    ///     o.set_release(Some("app@1.0.0".into())).set_sample_rate(0.25)
    /// });
    /// assert_eq!(options.release.as_deref(), Some("app@1.0.0"));
    /// ```
    pub fn configure<F>(f: F) -> Self
    where
        F: FnOnce(&mut ClientOptions) -> &mut ClientOptions,
    {
        let mut opts = Self::new();
        f(&mut opts);
        opts
    }

    /// Set the DSN.
    pub fn set_dsn(&mut self, dsn: Option<Cow<'static, str>>) -> &mut Self {
        self.dsn = dsn;
        self
    }

    /// Set the release to be sent with events.
    pub fn set_release(&mut self, release: Option<Cow<'static, str>>) -> &mut Self {
        self.release = release;
        self
    }

    /// Set the environment to be sent with events.
    pub fn set_environment(&mut self, environment: Option<Cow<'static, str>>) -> &mut Self {
        self.environment = environment;
        self
    }

    /// Set the server name to be reported.
    pub fn set_server_name(&mut self, server_name: Option<Cow<'static, str>>) -> &mut Self {
        self.server_name = server_name;
        self
    }

    /// Set the sample rate for event submission.
    pub fn set_sample_rate(&mut self, sample_rate: f32) -> &mut Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the maximum number of breadcrumbs.
    pub fn set_max_breadcrumbs(&mut self, max_breadcrumbs: usize) -> &mut Self {
        self.max_breadcrumbs = max_breadcrumbs;
        self
    }

    /// Attach stacktraces to messages.
    pub fn set_attach_stacktrace(&mut self, attach_stacktrace: bool) -> &mut Self {
        self.attach_stacktrace = attach_stacktrace;
        self
    }

    /// Add module prefixes that are always considered "in_app".
    pub fn add_in_app_include(&mut self, in_app_include: &[&'static str]) -> &mut Self {
        self.in_app_include.extend_from_slice(in_app_include);
        self
    }

    /// Add module prefixes that are never "in_app".
    pub fn add_in_app_exclude(&mut self, in_app_exclude: &[&'static str]) -> &mut Self {
        self.in_app_exclude.extend_from_slice(in_app_exclude);
        self
    }

    /// Add border frames which indicate a border from a backtrace to
    /// useless internals.
    pub fn add_extra_border_frames(&mut self, extra_border_frames: &[&'static str]) -> &mut Self {
        self.extra_border_frames
            .extend_from_slice(extra_border_frames);
        self
    }

    /// Automatically trim backtraces of junk before sending.
    pub fn set_trim_backtraces(&mut self, trim_backtraces: bool) -> &mut Self {
        self.trim_backtraces = trim_backtraces;
        self
    }

    /// Set the number of source lines loaded around each frame.
    pub fn set_source_context_lines(&mut self, source_context_lines: usize) -> &mut Self {
        self.source_context_lines = source_context_lines;
        self
    }

    /// Set a callback that is executed before event sending.
    pub fn set_before_send<F>(&mut self, before_send: F) -> &mut Self
    where
        F: Fn(Event<'static>) -> Option<Event<'static>> + Send + Sync + 'static,
    {
        self.before_send = Some(Arc::new(before_send));
        self
    }

    /// Set a callback that is executed for each Breadcrumb being added.
    pub fn set_before_breadcrumb<F>(&mut self, before_breadcrumb: F) -> &mut Self
    where
        F: Fn(Breadcrumb) -> Option<Breadcrumb> + Send + Sync + 'static,
    {
        self.before_breadcrumb = Some(Arc::new(before_breadcrumb));
        self
    }

    /// The transport to use.
    pub fn set_transport<T>(&mut self, transport: Arc<T>) -> &mut Self
    where
        T: Transport + 'static,
    {
        self.transport = Some(transport);
        self
    }

    /// Set the timeout on client close for draining events.
    pub fn set_shutdown_timeout(&mut self, shutdown_timeout: Duration) -> &mut Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct BeforeSend;
        let before_send = self.before_send.as_ref().map(|_| BeforeSend);
        #[derive(Debug)]
        struct BeforeBreadcrumb;
        let before_breadcrumb = self.before_breadcrumb.as_ref().map(|_| BeforeBreadcrumb);
        #[derive(Debug)]
        struct Transport;
        let transport = self.transport.as_ref().map(|_| Transport);

        f.debug_struct("ClientOptions")
            .field("dsn", &self.dsn)
            .field("release", &self.release)
            .field("environment", &self.environment)
            .field("server_name", &self.server_name)
            .field("sample_rate", &self.sample_rate)
            .field("max_breadcrumbs", &self.max_breadcrumbs)
            .field("attach_stacktrace", &self.attach_stacktrace)
            .field("in_app_include", &self.in_app_include)
            .field("in_app_exclude", &self.in_app_exclude)
            .field("extra_border_frames", &self.extra_border_frames)
            .field("trim_backtraces", &self.trim_backtraces)
            .field("source_context_lines", &self.source_context_lines)
            .field("before_send", &before_send)
            .field("before_breadcrumb", &before_breadcrumb)
            .field("transport", &transport)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> ClientOptions {
        ClientOptions {
            dsn: None,
            release: None,
            environment: None,
            server_name: None,
            sample_rate: 1.0,
            max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
            attach_stacktrace: false,
            in_app_include: vec![],
            in_app_exclude: vec![],
            extra_border_frames: vec![],
            trim_backtraces: true,
            source_context_lines: 0,
            before_send: None,
            before_breadcrumb: None,
            transport: None,
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

impl From<&'static str> for ClientOptions {
    fn from(dsn: &'static str) -> ClientOptions {
        ClientOptions {
            dsn: Some(dsn.into()),
            ..ClientOptions::default()
        }
    }
}

impl From<String> for ClientOptions {
    fn from(dsn: String) -> ClientOptions {
        ClientOptions {
            dsn: Some(dsn.into()),
            ..ClientOptions::default()
        }
    }
}

impl<T: Into<Cow<'static, str>>> From<(T, ClientOptions)> for ClientOptions {
    fn from((dsn, mut opts): (T, ClientOptions)) -> ClientOptions {
        opts.dsn = Some(dsn.into());
        opts
    }
}
