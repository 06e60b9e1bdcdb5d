//! Data types for a captured HTTP exchange.
//!
//! An [`Exchange`] is assembled by the middleware for a single call and handed
//! to the recorder; it is dropped as soon as its lines have been written.

use axum::http::{header, HeaderMap, Method, Request, StatusCode, Uri};
use bytes::Bytes;
use std::time::Instant;

/// How the bytes of a captured body should be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyEncoding {
    /// Text in the named charset
    Text { charset: String },
    /// No text charset applies; rendered as base64
    Binary,
}

impl BodyEncoding {
    pub fn utf8() -> Self {
        BodyEncoding::Text {
            charset: "utf-8".to_string(),
        }
    }

    /// Decide the encoding of `bytes` from the `Content-Type` in `headers`.
    ///
    /// An explicit `charset` parameter wins. Textual media types default to
    /// UTF-8 and any other declared media type is binary. Without a
    /// `Content-Type` the bytes themselves decide.
    pub fn detect(headers: &HeaderMap, bytes: &[u8]) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        let Some(content_type) = content_type else {
            return if std::str::from_utf8(bytes).is_ok() {
                Self::utf8()
            } else {
                BodyEncoding::Binary
            };
        };

        let mut parts = content_type.split(';');
        let mime = parts.next().unwrap_or_default().trim();
        let charset = parts.find_map(|param| {
            let (key, value) = param.split_once('=')?;
            (key.trim() == "charset").then(|| value.trim().trim_matches('"').to_string())
        });

        match charset {
            Some(charset) if !charset.is_empty() => BodyEncoding::Text { charset },
            _ if is_textual(mime) => Self::utf8(),
            _ => BodyEncoding::Binary,
        }
    }
}

fn is_textual(mime: &str) -> bool {
    mime.starts_with("text/")
        || mime.ends_with("json")
        || mime.ends_with("xml")
        || matches!(
            mime,
            "application/x-www-form-urlencoded" | "application/javascript" | "application/graphql"
        )
}

/// A captured body together with its encoding tag.
#[derive(Debug, Clone)]
pub struct Payload {
    pub bytes: Bytes,
    pub encoding: BodyEncoding,
}

impl Payload {
    pub fn new(bytes: Bytes, encoding: BodyEncoding) -> Self {
        Self { bytes, encoding }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Bytes::from(text.into()), BodyEncoding::utf8())
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// What the middleware obtained of a response body.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    Captured(Payload),
    /// The body could not be read without disturbing the caller
    NotCapturable,
    /// Response body logging was off when the exchange started
    Skipped,
}

/// Scheme, host and port of the connection a request is sent over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub scheme: String,
    pub host: String,
    /// Only set when the request names a port explicitly
    pub port: Option<u16>,
    pub tls: bool,
}

impl ClientContext {
    /// Derive the context from an outbound request.
    ///
    /// Absolute URIs carry everything. For origin-form URIs the host comes
    /// from the `Host` header and the scheme defaults to `http`.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let uri = request.uri();
        let host_header = request
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok());

        let (host, port) = match uri.authority() {
            Some(authority) => (authority.host().to_string(), authority.port_u16()),
            None => match host_header {
                Some(value) => split_host_port(value),
                None => (String::new(), None),
            },
        };

        let scheme = uri.scheme_str().unwrap_or("http").to_ascii_lowercase();
        let tls = matches!(scheme.as_str(), "https" | "wss");

        Self {
            scheme,
            host,
            port,
            tls,
        }
    }

    /// Full URL of `uri` as seen through this connection.
    pub fn url(&self, uri: &Uri) -> String {
        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        match self.port {
            Some(port) => format!("{}://{}:{}{}", self.scheme, self.host, port, path),
            None => format!("{}://{}{}", self.scheme, self.host, path),
        }
    }
}

fn split_host_port(value: &str) -> (String, Option<u16>) {
    match value.rsplit_once(':') {
        // `]` guards bracketed IPv6 literals without a port
        Some((host, port)) if !port.contains(']') => match port.parse() {
            Ok(port) => (host.to_string(), Some(port)),
            Err(_) => (value.to_string(), None),
        },
        _ => (value.to_string(), None),
    }
}

/// Status, headers and body of an obtained response.
#[derive(Debug, Clone)]
pub struct ResponseSummary {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

/// One observed request and, if the transport produced one, its response.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub context: ClientContext,
    pub method: Method,
    /// Path and query exactly as sent
    pub path: String,
    pub request_headers: HeaderMap,
    pub request_body: Option<Payload>,
    pub started: Instant,
    pub response: Option<ResponseSummary>,
}

impl Exchange {
    pub fn url(&self) -> String {
        match self.path.parse::<Uri>() {
            Ok(uri) => self.context.url(&uri),
            Err(_) => format!(
                "{}://{}{}",
                self.context.scheme, self.context.host, self.path
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(content_type).unwrap(),
        );
        headers
    }

    #[test]
    fn test_detect_charset_parameter() {
        let headers = headers_with("text/plain; charset=\"ISO-8859-1\"");
        assert_eq!(
            BodyEncoding::detect(&headers, b"abc"),
            BodyEncoding::Text {
                charset: "iso-8859-1".to_string()
            }
        );
    }

    #[test]
    fn test_detect_textual_media_types() {
        for mime in [
            "application/json",
            "application/problem+json",
            "text/html",
            "application/xml",
            "application/x-www-form-urlencoded",
        ] {
            assert_eq!(
                BodyEncoding::detect(&headers_with(mime), b"{}"),
                BodyEncoding::utf8(),
                "{mime}"
            );
        }
    }

    #[test]
    fn test_detect_binary_media_types() {
        let headers = headers_with("image/png");
        assert_eq!(BodyEncoding::detect(&headers, b"abc"), BodyEncoding::Binary);
    }

    #[test]
    fn test_detect_without_content_type() {
        let headers = HeaderMap::new();
        assert_eq!(BodyEncoding::detect(&headers, b"plain"), BodyEncoding::utf8());
        assert_eq!(
            BodyEncoding::detect(&headers, &[0xff, 0xfe, 0x00]),
            BodyEncoding::Binary
        );
    }

    #[test]
    fn test_context_from_absolute_uri() {
        let request = Request::get("https://api.example.com:8443/v1/items?page=2")
            .body(())
            .unwrap();
        let context = ClientContext::from_request(&request);
        assert_eq!(context.scheme, "https");
        assert_eq!(context.host, "api.example.com");
        assert_eq!(context.port, Some(8443));
        assert!(context.tls);
        assert_eq!(
            context.url(request.uri()),
            "https://api.example.com:8443/v1/items?page=2"
        );
    }

    #[test]
    fn test_context_from_host_header() {
        let request = Request::get("/status")
            .header(header::HOST, "x:8080")
            .body(())
            .unwrap();
        let context = ClientContext::from_request(&request);
        assert_eq!(context.host, "x");
        assert_eq!(context.port, Some(8080));
        assert!(!context.tls);
        assert_eq!(context.url(request.uri()), "http://x:8080/status");
    }

    #[test]
    fn test_split_host_port_ipv6() {
        assert_eq!(split_host_port("[::1]"), ("[::1]".to_string(), None));
        assert_eq!(split_host_port("[::1]:81"), ("[::1]".to_string(), Some(81)));
    }
}
