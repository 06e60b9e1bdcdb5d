//! Turning an exchange into log lines.
//!
//! The block written for one exchange looks like this (plain rendering, with
//! header logging enabled):
//!
//! ```text
//!
//! HTTP POST (12.37ms)  https://api.example.com/v1/items
//! Request body  {"name":"widget"}
//!
//! HTTP request headers
//!     Content-Type: application/json
//!
//! Response status  Created (201)
//!
//! HTTP response headers
//!     Location: /v1/items/7
//!
//! Response body  {"id":7}
//!
//! ```

use axum::http::{HeaderMap, Method};
use std::sync::{Mutex, PoisonError};

use crate::config::LoggerConfig;
use crate::format::Formatter;
use crate::payload::render_body;
use crate::sink::{self, Sink};
use crate::types::{Exchange, ResponseBody};

/// Value rendered in place of a response body that could not be read.
pub const NOT_CAPTURABLE: &str = "<impossible to log>";

/// Value rendered in place of a redacted header value.
pub const REDACTED: &str = "[REDACTED]";

/// Writes exchange blocks to the configured sink.
///
/// Lines of one block are written while holding a lock, so blocks from
/// concurrent exchanges sharing a recorder never interleave.
#[derive(Debug, Default)]
pub struct Recorder {
    emit_lock: Mutex<()>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an exchange for `url` passes the sink and URL filter checks.
    ///
    /// The filter is not consulted when no sink is configured.
    pub fn admits(config: &LoggerConfig, url: &str) -> bool {
        config.has_sink() && config.filter().should_log(url)
    }

    /// Log `exchange` if `config` has a sink and its URL passes the filter.
    ///
    /// Whether the call reached the network is not judged here: the layer
    /// applies its [`ConnectionCheck`](crate::ConnectionCheck) before calling
    /// this, and direct callers are expected to do the same.
    pub fn record(&self, config: &LoggerConfig, exchange: &Exchange) {
        let Some(sink) = config.sink.as_deref() else {
            return;
        };
        if !config.filter().should_log(&exchange.url()) {
            return;
        }
        self.emit(config, sink, exchange);
    }

    /// Write the block for an exchange that already passed the checks.
    fn emit(&self, config: &LoggerConfig, sink: &dyn Sink, exchange: &Exchange) {
        let lines = render(config, exchange);
        let _guard = self.emit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        for line in &lines {
            sink::write(sink, config.level, line);
        }
    }
}

/// Render the full block of lines for `exchange`, unconditionally.
///
/// Elapsed time is measured from `exchange.started` to this call.
pub fn render(config: &LoggerConfig, exchange: &Exchange) -> Vec<String> {
    let fmt = Formatter::new(config.colorize);
    let mut lines = Vec::new();

    lines.push(String::new());

    let elapsed_ms = exchange.started.elapsed().as_secs_f64() * 1000.0;
    lines.push(fmt.format(
        Some(&format!("HTTP {} ({:.2}ms)", exchange.method, elapsed_ms)),
        Some(&exchange.url()),
    ));

    if config.log_request_body && logs_request_body(&exchange.method) {
        if let Some(payload) = exchange.request_body.as_ref().filter(|p| !p.is_empty()) {
            let body = render_body(&payload.bytes, &payload.encoding, config.collapse_body_limit);
            lines.push(fmt.format(Some("Request body"), Some(&body)));
        }
    }

    lines.push(String::new());

    if config.log_request_headers {
        lines.push(fmt.format(Some("HTTP request headers"), None));
        push_headers(&mut lines, &fmt, config, &exchange.request_headers);
    }

    if let Some(response) = &exchange.response {
        lines.push(String::new());
        let status = format!(
            "{} ({})",
            response.status.canonical_reason().unwrap_or("Response"),
            response.status.as_u16()
        );
        lines.push(fmt.format(Some("Response status"), Some(&status)));

        if config.log_response_headers {
            lines.push(String::new());
            lines.push(fmt.format(Some("HTTP response headers"), None));
            push_headers(&mut lines, &fmt, config, &response.headers);
        }

        if config.log_response_body {
            match &response.body {
                ResponseBody::NotCapturable => {
                    lines.push(String::new());
                    lines.push(fmt.format(Some("Response body"), Some(NOT_CAPTURABLE)));
                }
                ResponseBody::Captured(payload) if !payload.is_empty() => {
                    let body =
                        render_body(&payload.bytes, &payload.encoding, config.collapse_body_limit);
                    lines.push(String::new());
                    lines.push(fmt.format(Some("Response body"), Some(&body)));
                }
                _ => {}
            }
        }
    }

    lines.push(String::new());
    lines
}

/// Methods whose request body is logged.
pub(crate) fn logs_request_body(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::GET | Method::PATCH
    )
}

fn push_headers(lines: &mut Vec<String>, fmt: &Formatter, config: &LoggerConfig, headers: &HeaderMap) {
    for (name, value) in headers {
        let value = if config.redacted_headers.contains(name.as_str()) {
            REDACTED.into()
        } else {
            String::from_utf8_lossy(value.as_bytes())
        };
        let line = format!("{}: {}", display_name(name.as_str()), value);
        lines.push(fmt.format(Some("  "), Some(&line)));
    }
}

/// `content-type` -> `Content-Type`
fn display_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
