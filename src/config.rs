//! Logging policy.
//!
//! [`LoggerConfig`] is a plain value built by the host. [`SharedConfig`] wraps
//! it so it can be changed while traffic flows: every call through the layer
//! takes a snapshot when it starts, so an update applies from the next call on
//! and never to one already in flight.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::Level;

use crate::error::ConfigError;
use crate::filter::{Pattern, PatternSet, UrlFilter};
use crate::sink::Sink;

/// Bodies at or above this many bytes are collapsed to head and tail.
pub const DEFAULT_COLLAPSE_BODY_LIMIT: i64 = 5000;

/// Largest body the middleware will hold in memory to log it (1MB).
pub const DEFAULT_MAX_BUFFERED_BODY: usize = 1024 * 1024;

/// What to log and where.
///
/// ```rust
/// use tapline::{LoggerConfig, TracingSink};
///
/// let config = LoggerConfig::default()
///     .log_request_headers(true)
///     .collapse_body_limit(2048)
///     .ignore("/health")
///     .unwrap()
///     .sink(TracingSink);
/// assert!(config.has_sink());
/// ```
#[derive(Clone)]
pub struct LoggerConfig {
    pub log_request_headers: bool,
    pub log_response_headers: bool,
    pub log_request_body: bool,
    pub log_response_body: bool,
    pub colorize: bool,
    /// Truncation threshold in bytes; zero or less disables truncation
    pub collapse_body_limit: i64,
    /// Exchanges whose URL matches any of these are never logged
    pub ignore: PatternSet,
    /// When non-empty, only matching exchanges are logged
    pub only: PatternSet,
    /// Where lines go; `None` turns logging off entirely
    pub sink: Option<Arc<dyn Sink>>,
    /// Level used for every emitted line
    pub level: Level,
    pub max_buffered_body: usize,
    /// Lowercase header names whose values are hidden in the output
    pub redacted_headers: HashSet<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_request_headers: false,
            log_response_headers: false,
            log_request_body: true,
            log_response_body: true,
            colorize: true,
            collapse_body_limit: DEFAULT_COLLAPSE_BODY_LIMIT,
            ignore: PatternSet::new(),
            only: PatternSet::new(),
            sink: None,
            level: Level::DEBUG,
            max_buffered_body: DEFAULT_MAX_BUFFERED_BODY,
            redacted_headers: HashSet::new(),
        }
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("log_request_headers", &self.log_request_headers)
            .field("log_response_headers", &self.log_response_headers)
            .field("log_request_body", &self.log_request_body)
            .field("log_response_body", &self.log_response_body)
            .field("colorize", &self.colorize)
            .field("collapse_body_limit", &self.collapse_body_limit)
            .field("ignore", &self.ignore.len())
            .field("only", &self.only.len())
            .field("sink", &self.sink.is_some())
            .field("level", &self.level)
            .field("max_buffered_body", &self.max_buffered_body)
            .field("redacted_headers", &self.redacted_headers)
            .finish()
    }
}

impl LoggerConfig {
    pub fn log_request_headers(mut self, enabled: bool) -> Self {
        self.log_request_headers = enabled;
        self
    }

    pub fn log_response_headers(mut self, enabled: bool) -> Self {
        self.log_response_headers = enabled;
        self
    }

    pub fn log_request_body(mut self, enabled: bool) -> Self {
        self.log_request_body = enabled;
        self
    }

    pub fn log_response_body(mut self, enabled: bool) -> Self {
        self.log_response_body = enabled;
        self
    }

    pub fn colorize(mut self, enabled: bool) -> Self {
        self.colorize = enabled;
        self
    }

    pub fn collapse_body_limit(mut self, limit: i64) -> Self {
        self.collapse_body_limit = limit;
        self
    }

    /// Add a regex to the ignore set.
    pub fn ignore(mut self, pattern: &str) -> Result<Self, ConfigError> {
        self.ignore.push(Pattern::regex(pattern)?);
        Ok(self)
    }

    /// Add a regex to the allow set.
    pub fn only(mut self, pattern: &str) -> Result<Self, ConfigError> {
        self.only.push(Pattern::regex(pattern)?);
        Ok(self)
    }

    pub fn ignore_pattern(mut self, pattern: Pattern) -> Self {
        self.ignore.push(pattern);
        self
    }

    pub fn only_pattern(mut self, pattern: Pattern) -> Self {
        self.only.push(pattern);
        self
    }

    pub fn sink<S: Sink>(mut self, sink: S) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_buffered_body(mut self, bytes: usize) -> Self {
        self.max_buffered_body = bytes;
        self
    }

    /// Hide the value of `name` wherever it is logged.
    pub fn redact_header(mut self, name: impl AsRef<str>) -> Self {
        self.redacted_headers
            .insert(name.as_ref().to_ascii_lowercase());
        self
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    pub fn filter(&self) -> UrlFilter<'_> {
        UrlFilter {
            ignore: &self.ignore,
            only: &self.only,
        }
    }

    /// Read options from `TAPLINE_*` environment variables on top of the
    /// defaults. The sink is never configured from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let flags: [(&str, &mut bool); 5] = [
            ("TAPLINE_LOG_REQUEST_HEADERS", &mut config.log_request_headers),
            ("TAPLINE_LOG_RESPONSE_HEADERS", &mut config.log_response_headers),
            ("TAPLINE_LOG_REQUEST_BODY", &mut config.log_request_body),
            ("TAPLINE_LOG_RESPONSE_BODY", &mut config.log_response_body),
            ("TAPLINE_COLORIZE", &mut config.colorize),
        ];
        for (name, slot) in flags {
            if let Some(value) = lookup(name) {
                *slot = parse_flag(name, &value)?;
            }
        }

        if let Some(value) = lookup("TAPLINE_COLLAPSE_BODY_LIMIT") {
            config.collapse_body_limit = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid_value("TAPLINE_COLLAPSE_BODY_LIMIT", &value))?;
        }

        if let Some(value) = lookup("TAPLINE_LEVEL") {
            config.level = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid_value("TAPLINE_LEVEL", &value))?;
        }

        if let Some(value) = lookup("TAPLINE_IGNORE") {
            config.ignore = PatternSet::from_regexes(split_list(&value))?;
        }
        if let Some(value) = lookup("TAPLINE_ONLY") {
            config.only = PatternSet::from_regexes(split_list(&value))?;
        }

        Ok(config)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(name, value)),
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|p| !p.is_empty())
}

/// Handle to a [`LoggerConfig`] that can be updated while in use.
///
/// Clones share the same configuration.
#[derive(Clone, Debug, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<Arc<LoggerConfig>>>,
}

impl SharedConfig {
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// The configuration as of now.
    pub fn snapshot(&self) -> Arc<LoggerConfig> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change options for every call that starts after this returns.
    pub fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut LoggerConfig),
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = LoggerConfig::clone(&guard);
        change(&mut next);
        *guard = Arc::new(next);
    }

    pub fn replace(&self, config: LoggerConfig) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    /// Drop the sink, turning the layer into a pass-through.
    pub fn detach_sink(&self) {
        self.update(|config| config.sink = None);
    }
}

impl From<LoggerConfig> for SharedConfig {
    fn from(config: LoggerConfig) -> Self {
        Self::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::TracingSink;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LoggerConfig::default();
        assert!(!config.log_request_headers);
        assert!(!config.log_response_headers);
        assert!(config.log_request_body);
        assert!(config.log_response_body);
        assert!(config.colorize);
        assert_eq!(config.collapse_body_limit, 5000);
        assert!(config.ignore.is_empty());
        assert!(config.only.is_empty());
        assert!(!config.has_sink());
        assert_eq!(config.level, Level::DEBUG);
    }

    #[test]
    fn test_builder() {
        let config = LoggerConfig::default()
            .log_response_headers(true)
            .colorize(false)
            .level(Level::INFO)
            .redact_header("Authorization")
            .ignore("/health")
            .unwrap()
            .only("example")
            .unwrap()
            .sink(TracingSink);

        assert!(config.log_response_headers);
        assert!(!config.colorize);
        assert_eq!(config.level, Level::INFO);
        assert!(config.redacted_headers.contains("authorization"));
        assert!(!config.filter().should_log("http://example/health"));
        assert!(config.filter().should_log("http://example/status"));
        assert!(config.has_sink());
    }

    #[test]
    fn test_invalid_pattern_in_builder() {
        assert!(LoggerConfig::default().ignore("[").is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = LoggerConfig::from_lookup(lookup(&[
            ("TAPLINE_LOG_REQUEST_HEADERS", "yes"),
            ("TAPLINE_LOG_RESPONSE_BODY", "0"),
            ("TAPLINE_COLORIZE", "off"),
            ("TAPLINE_COLLAPSE_BODY_LIMIT", " -1 "),
            ("TAPLINE_LEVEL", "info"),
            ("TAPLINE_IGNORE", "/health, /metrics,"),
        ]))
        .unwrap();

        assert!(config.log_request_headers);
        assert!(!config.log_response_body);
        assert!(!config.colorize);
        assert_eq!(config.collapse_body_limit, -1);
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.ignore.len(), 2);
        assert!(config.only.is_empty());
        assert!(!config.has_sink());
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = LoggerConfig::from_lookup(lookup(&[("TAPLINE_COLORIZE", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref name, .. } if name == "TAPLINE_COLORIZE"));

        assert!(LoggerConfig::from_lookup(lookup(&[("TAPLINE_COLLAPSE_BODY_LIMIT", "lots")])).is_err());
        assert!(LoggerConfig::from_lookup(lookup(&[("TAPLINE_LEVEL", "loud")])).is_err());
        assert!(matches!(
            LoggerConfig::from_lookup(lookup(&[("TAPLINE_ONLY", "ok,(")])),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_from_env_without_variables() {
        // No TAPLINE_* variables are set by the test harness
        let config = LoggerConfig::from_env().unwrap();
        assert!(!config.has_sink());
    }

    #[test]
    fn test_update_does_not_touch_existing_snapshots() {
        let shared = SharedConfig::new(LoggerConfig::default().sink(TracingSink));
        let before = shared.snapshot();

        shared.update(|config| config.log_request_headers = true);
        shared.detach_sink();

        assert!(!before.log_request_headers);
        assert!(before.has_sink());

        let after = shared.snapshot();
        assert!(after.log_request_headers);
        assert!(!after.has_sink());
    }

    #[test]
    fn test_clones_share_state() {
        let shared = SharedConfig::default();
        let other = shared.clone();
        other.replace(LoggerConfig::default().collapse_body_limit(10));
        assert_eq!(shared.snapshot().collapse_body_limit, 10);
    }
}
