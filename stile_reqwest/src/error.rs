//! The error surface of the authenticated client

use reqwest::StatusCode;
use thiserror::Error;

use crate::coordinator::RefreshError;

/// An authentication-flow error surfaced to the caller of a request
///
/// These are wrapped in [`reqwest_middleware::Error::Middleware`] and can be
/// recovered by downcasting:
///
/// ```no_run
/// # use stile_reqwest::AuthError;
/// # fn classify(error: &reqwest_middleware::Error) {
/// if let reqwest_middleware::Error::Middleware(inner) = error {
///     if let Some(auth) = inner.downcast_ref::<AuthError>() {
///         match auth {
///             AuthError::RetryExhausted { .. } => { /* give up on this request */ }
///             AuthError::Refresh(_) => { /* session is dead, re-bootstrap */ }
///         }
///     }
/// }
/// # }
/// ```
#[derive(Debug, Error)]
pub enum AuthError {
    /// The request was replayed once with a fresh token and was rejected again
    ///
    /// No further automatic recovery is attempted; a server that rejects an
    /// apparently fresh token will not be satisfied by refreshing again.
    #[error("request was rejected again after a token refresh ({status})")]
    RetryExhausted {
        /// The status of the rejected replay
        status: StatusCode,
    },
    /// The shared refresh this request was depending on failed
    #[error("unable to refresh the session tokens")]
    Refresh(#[from] RefreshError),
}
