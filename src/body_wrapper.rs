//! Body capture utilities.
//!
//! Bodies are streams, so logging one means reading it. [`capture_body`] reads
//! a bounded body to the end and hands back a replacement that replays exactly
//! what was read, so the consumer on the other side sees the same frames,
//! trailers and errors it would have seen without the middleware.

use axum::body::{Body, Bytes, HttpBody};
use bytes::BytesMut;
use futures::stream;
use http_body::Frame;
use http_body_util::{BodyExt, StreamBody};
use tracing::debug;

/// Result of trying to capture a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// The body carried no data
    Empty,
    Captured(Bytes),
    /// The body was left alone: unknown length, too large, or it failed mid-read
    NotCapturable,
}

/// Read `body` for logging if it is known to be at most `limit` bytes.
///
/// Returns the body to pass on in place of the original together with what
/// was captured. Bodies of unknown or excessive length are returned untouched.
///
/// # Examples
///
/// ```rust
/// use tapline::body_wrapper::{capture_body, Capture};
/// use axum::body::Body;
///
/// # async fn example() {
/// let (body, captured) = capture_body(Body::from("Hello, World!"), 1024).await;
/// assert_eq!(captured, Capture::Captured("Hello, World!".into()));
/// // `body` still yields "Hello, World!"
/// # }
/// ```
pub async fn capture_body(body: Body, limit: usize) -> (Body, Capture) {
    if body.is_end_stream() {
        return (body, Capture::Empty);
    }

    match body.size_hint().upper() {
        Some(upper) if upper <= limit as u64 => {}
        upper => {
            debug!(?upper, limit, "Body length unknown or over limit, not capturing");
            return (body, Capture::NotCapturable);
        }
    }

    let mut body = body;
    let mut frames = Vec::new();
    let mut data = BytesMut::new();

    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                if let Some(chunk) = frame.data_ref() {
                    data.extend_from_slice(chunk);
                }
                frames.push(frame);
            }
            Some(Err(e)) => {
                debug!(error = %e, "Body stream error during capture");
                return (replay(frames, Some(e)), Capture::NotCapturable);
            }
            None => break,
        }
    }

    let bytes = data.freeze();
    let body = if frames.iter().all(Frame::is_data) {
        // Keeps an exact size hint for the consumer
        Body::from(bytes.clone())
    } else {
        replay(frames, None)
    };

    let capture = if bytes.is_empty() {
        Capture::Empty
    } else {
        Capture::Captured(bytes)
    };
    (body, capture)
}

/// A body yielding `frames` in order, then `error` if there is one.
fn replay(frames: Vec<Frame<Bytes>>, error: Option<axum::Error>) -> Body {
    let items = frames
        .into_iter()
        .map(Ok::<_, axum::Error>)
        .chain(error.map(Err));
    Body::new(StreamBody::new(stream::iter(items)))
}
