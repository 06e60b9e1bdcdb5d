//! Making captured bodies safe to print.
//!
//! [`truncate`] bounds the size of a body and [`sanitize`] turns it into
//! printable text. [`render_body`] combines them: text is decoded with its
//! charset before it is cut, so a cut never lands inside a character.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use encoding_rs::Encoding;
use std::borrow::Cow;

use crate::types::BodyEncoding;

/// Inserted between the head and tail of a truncated body.
pub const TRUNCATION_MARKER: &[u8] = b"\n\n<some data truncated>\n\n";

/// Collapse `body` to its head and tail when it reaches `limit` bytes.
///
/// With `half = limit / 2` the result keeps the first `half + 1` and the last
/// `half + 1` bytes, so head and tail overlap for bodies just over the limit.
/// A `limit` of zero or less disables truncation.
pub fn truncate(body: &[u8], limit: i64) -> Cow<'_, [u8]> {
    let Some(keep) = keep_len(body.len(), limit) else {
        return Cow::Borrowed(body);
    };
    let len = body.len();

    let mut out = Vec::with_capacity(keep * 2 + TRUNCATION_MARKER.len());
    out.extend_from_slice(&body[..keep]);
    out.extend_from_slice(TRUNCATION_MARKER);
    out.extend_from_slice(&body[len - keep..]);
    Cow::Owned(out)
}

/// Like [`truncate`] for text, with both cuts moved inward to the nearest
/// character boundary.
pub fn truncate_text(text: &str, limit: i64) -> Cow<'_, str> {
    let Some(keep) = keep_len(text.len(), limit) else {
        return Cow::Borrowed(text);
    };
    let len = text.len();

    let mut head_end = keep;
    while !text.is_char_boundary(head_end) {
        head_end -= 1;
    }
    let mut tail_start = len - keep;
    while !text.is_char_boundary(tail_start) {
        tail_start += 1;
    }

    let marker = String::from_utf8_lossy(TRUNCATION_MARKER);
    Cow::Owned(format!("{}{}{}", &text[..head_end], marker, &text[tail_start..]))
}

/// Bytes kept on each side, or `None` when no truncation applies.
fn keep_len(len: usize, limit: i64) -> Option<usize> {
    if limit <= 0 || len == 0 || (len as u64) < limit as u64 {
        return None;
    }
    // len >= limit, so half + 1 <= len
    Some((limit / 2) as usize + 1)
}

/// Decode `body` in `charset`, or `None` for an unknown label or bytes that
/// are malformed in it.
fn decode<'a>(body: &'a [u8], charset: &str) -> Option<Cow<'a, str>> {
    let encoding = Encoding::for_label(charset.trim().as_bytes())?;
    encoding.decode_without_bom_handling_and_without_replacement(body)
}

/// Render `body` as printable text.
///
/// Text payloads are decoded with their charset. Binary payloads, and text
/// that cannot be decoded, come out as standard base64.
pub fn sanitize<'a>(body: &'a [u8], encoding: &BodyEncoding) -> Cow<'a, str> {
    match encoding {
        BodyEncoding::Text { charset } => match decode(body, charset) {
            Some(text) => text,
            None => Cow::Owned(STANDARD.encode(body)),
        },
        BodyEncoding::Binary => Cow::Owned(STANDARD.encode(body)),
    }
}

/// Truncated, printable form of `body`.
pub fn render_body(body: &[u8], encoding: &BodyEncoding, limit: i64) -> String {
    if let BodyEncoding::Text { charset } = encoding {
        if let Some(text) = decode(body, charset) {
            return truncate_text(&text, limit).into_owned();
        }
    }
    STANDARD.encode(truncate(body, limit))
}
