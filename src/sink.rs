//! Destinations for rendered lines.
//!
//! A [`Sink`] receives each line already rendered, at the level configured on
//! [`LoggerConfig`](crate::LoggerConfig). [`TracingSink`] forwards into the
//! `tracing` ecosystem and [`FanoutSink`] writes every line to several sinks.
//!
//! # Examples
//!
//! ```rust
//! use tapline::{FanoutSink, LoggerConfig, TracingSink};
//!
//! let config = LoggerConfig::default()
//!     .sink(FanoutSink::new().with(TracingSink).with(TracingSink));
//! assert!(config.has_sink());
//! ```

use std::sync::Arc;
use tracing::Level;

/// A leveled write target.
///
/// One method per level; each receives a single pre-rendered line. Anything
/// a sink does on failure is its own business: the middleware never inspects
/// or retries writes.
pub trait Sink: Send + Sync + 'static {
    fn trace(&self, line: &str);
    fn debug(&self, line: &str);
    fn info(&self, line: &str);
    fn warn(&self, line: &str);
    fn error(&self, line: &str);
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn trace(&self, line: &str) {
        (**self).trace(line)
    }

    fn debug(&self, line: &str) {
        (**self).debug(line)
    }

    fn info(&self, line: &str) {
        (**self).info(line)
    }

    fn warn(&self, line: &str) {
        (**self).warn(line)
    }

    fn error(&self, line: &str) {
        (**self).error(line)
    }
}

/// Dispatch `line` to the method of `sink` matching `level`.
pub(crate) fn write(sink: &dyn Sink, level: Level, line: &str) {
    match level {
        Level::TRACE => sink.trace(line),
        Level::DEBUG => sink.debug(line),
        Level::INFO => sink.info(line),
        Level::WARN => sink.warn(line),
        _ => sink.error(line),
    }
}

/// Sink that emits every line as a `tracing` event with target
/// `tapline::exchange`, apart from the layer's own diagnostics under `tapline`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn trace(&self, line: &str) {
        tracing::trace!(target: "tapline::exchange", "{line}");
    }

    fn debug(&self, line: &str) {
        tracing::debug!(target: "tapline::exchange", "{line}");
    }

    fn info(&self, line: &str) {
        tracing::info!(target: "tapline::exchange", "{line}");
    }

    fn warn(&self, line: &str) {
        tracing::warn!(target: "tapline::exchange", "{line}");
    }

    fn error(&self, line: &str) {
        tracing::error!(target: "tapline::exchange", "{line}");
    }
}

/// Writes each line to every inner sink, in the order they were added.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn Sink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink. Returns self for builder pattern.
    pub fn with<S: Sink>(mut self, sink: S) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    fn each(&self, level: Level, line: &str) {
        for sink in &self.sinks {
            write(sink.as_ref(), level, line);
        }
    }
}

impl Sink for FanoutSink {
    fn trace(&self, line: &str) {
        self.each(Level::TRACE, line)
    }

    fn debug(&self, line: &str) {
        self.each(Level::DEBUG, line)
    }

    fn info(&self, line: &str) {
        self.each(Level::INFO, line)
    }

    fn warn(&self, line: &str) {
        self.each(Level::WARN, line)
    }

    fn error(&self, line: &str) {
        self.each(Level::ERROR, line)
    }
}
