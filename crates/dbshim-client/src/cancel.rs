//! Cooperative cancellation and timeouts.
//!
//! Every facade operation accepts an optional [`CancellationToken`]. The
//! token is observed twice:
//!
//! - before the operation starts: an already-signaled token fails the call
//!   with [`Error::Cancelled`] without touching the session;
//! - while the operation is suspended on the driver: the in-flight future is
//!   dropped and the call fails with [`Error::Cancelled`].
//!
//! In the second case the session may still have part of a batch pending.
//! Callers respond by sending an attention request
//! ([`Session::cancel`](crate::Session::cancel)), which keeps the connection
//! usable for the next command.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbshim_client::CancellationToken;
//! use std::time::Duration;
//!
//! let token = CancellationToken::new();
//! let child = token.clone();
//! tokio::spawn(async move {
//!     tokio::time::sleep(Duration::from_secs(5)).await;
//!     child.cancel();
//! });
//!
//! // Fails with Error::Cancelled if it runs longer than 5 seconds.
//! let count = command.execute_non_query_cancellable(&token).await?;
//! ```

use std::future::Future;
use std::time::Duration;

pub use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Fail fast if the token has already been signaled.
pub(crate) fn check(token: Option<&CancellationToken>) -> Result<()> {
    match token {
        Some(token) if token.is_cancelled() => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

/// Run `fut` under an optional token and an optional time limit.
///
/// A zero limit means no limit. When the limit elapses the call fails with
/// `on_timeout`.
pub(crate) async fn run<F, T>(
    token: Option<&CancellationToken>,
    limit: Duration,
    on_timeout: fn() -> Error,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    check(token)?;

    let bounded = async {
        if limit.is_zero() {
            fut.await
        } else {
            match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_elapsed) => Err(on_timeout()),
            }
        }
    };

    match token {
        Some(token) => {
            tokio::select! {
                biased;
                () = token.cancelled() => Err(Error::Cancelled),
                result = bounded => result,
            }
        }
        None => bounded.await,
    }
}

/// Whether an error means the operation was cut short while the driver
/// was still working on it.
pub(crate) fn is_interruption(err: &Error) -> bool {
    matches!(
        err,
        Error::Cancelled | Error::CommandTimeout | Error::ConnectionTimeout
    )
}
