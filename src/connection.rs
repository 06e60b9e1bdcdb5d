//! Deciding whether a call actually reached the network.
//!
//! An exchange is only logged when the transport established a connection.
//! The host chooses how that is judged by handing a [`ConnectionCheck`] to the
//! layer; test setups that replace the transport use [`AssumeLive`].

use axum::http::StatusCode;
use std::error::Error as StdError;
use std::io;

/// How the transport call ended.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    Responded(StatusCode),
    Failed(&'a (dyn StdError + 'static)),
}

pub trait ConnectionCheck: Send + Sync + 'static {
    fn is_live(&self, outcome: Outcome<'_>) -> bool;
}

/// Trusts what the transport reports.
///
/// A response means a connection existed. An error counts as live unless an
/// I/O error in its source chain shows the connection was never made.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportReported;

impl ConnectionCheck for TransportReported {
    fn is_live(&self, outcome: Outcome<'_>) -> bool {
        match outcome {
            Outcome::Responded(_) => true,
            Outcome::Failed(err) => !never_connected(err),
        }
    }
}

fn never_connected(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::AddrNotAvailable
                    | io::ErrorKind::AddrInUse
            ) {
                return true;
            }
        }
        current = err.source();
    }
    false
}

/// Treats every call as connected.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeLive;

impl ConnectionCheck for AssumeLive {
    fn is_live(&self, _outcome: Outcome<'_>) -> bool {
        true
    }
}

/// A [`ConnectionCheck`] backed by a closure; see [`from_fn`].
#[derive(Clone, Copy)]
pub struct FnCheck<F>(F);

impl<F> ConnectionCheck for FnCheck<F>
where
    F: Fn(Outcome<'_>) -> bool + Send + Sync + 'static,
{
    fn is_live(&self, outcome: Outcome<'_>) -> bool {
        (self.0)(outcome)
    }
}

/// Build a [`ConnectionCheck`] from a closure.
///
/// ```rust
/// use tapline::connection::{from_fn, ConnectionCheck, Outcome};
///
/// let only_successes = from_fn(|outcome| matches!(outcome, Outcome::Responded(s) if s.is_success()));
/// assert!(!only_successes.is_live(Outcome::Responded(tapline::http::StatusCode::NOT_FOUND)));
/// ```
pub fn from_fn<F>(f: F) -> FnCheck<F>
where
    F: Fn(Outcome<'_>) -> bool + Send + Sync + 'static,
{
    FnCheck(f)
}
