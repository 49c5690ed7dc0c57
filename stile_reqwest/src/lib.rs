//! Middleware that keeps a reqwest client authenticated
//!
//! Two middlewares cooperate to give every request a valid bearer token
//! without the caller ever seeing an expired-token failure:
//!
//! * [`AccessTokenMiddleware`] attaches the stored access token to each
//!   outgoing request.
//! * [`TokenRefreshMiddleware`] watches responses for authentication
//!   failures, coordinates a single shared refresh through a
//!   [`RefreshCoordinator`], and replays the failed request once with the
//!   fresh token.
//!
//! Order matters: the refresh middleware must be added **first** so that it
//! wraps the interceptor — a replayed request then re-traverses the
//! interceptor and picks up the token the refresh just stored.
//!
//! ```no_run
//! use std::sync::Arc;
//! use reqwest::Client;
//! use reqwest_middleware::ClientBuilder;
//! use stile_reqwest::{AccessTokenMiddleware, RefreshCoordinator, TokenRefreshMiddleware};
//! use stile_tokens::sources::TmaTokenSource;
//! use stile_tokens::store::FileTokenStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FileTokenStore::new(".session.json".into()));
//!
//! // The refresh exchange uses a bare client: it must never pass through
//! // the middleware stack it is rescuing.
//! let source = TmaTokenSource::new(
//!     Client::new(),
//!     "https://api.example.com/auth/sync".parse()?,
//!     "https://api.example.com/auth/refresh".parse()?,
//! );
//!
//! let coordinator = Arc::new(RefreshCoordinator::new(store.clone(), source));
//!
//! let client = ClientBuilder::new(Client::default())
//!     .with(TokenRefreshMiddleware::new(coordinator.clone()))
//!     .with(AccessTokenMiddleware::new(store))
//!     .build();
//! # Ok(())
//! # }
//! ```
//!
//! Requests to the auth endpoints themselves (`/auth/sync`,
//! `/auth/refresh`) are exempt from both middlewares, so a failing bootstrap
//! or refresh call can never recursively engage the refresh protocol. The
//! exemption is a [`predicates`] predicate and can be replaced on either
//! middleware with [`with_predicate`][AccessTokenMiddleware::with_predicate]
//! when a backend uses different routes.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::fmt;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use predicates::{prelude::*, reflection};
use reqwest::{header, Request, Response, StatusCode};
use reqwest_middleware::{Error, Middleware, Next, Result};
use stile_tokens::sources::AsyncRefreshSource;
use stile_tokens::{AccessTokenRef, TokenStore};

mod coordinator;
mod error;
mod session;
#[cfg(test)]
pub(crate) mod test_support;

pub use coordinator::{RefreshCoordinator, RefreshError};
pub use error::AuthError;
pub use session::SessionTerminator;

/// A middleware that injects the stored access token into outgoing requests
///
/// If a request already carries an `Authorization` header by the time the
/// middleware executes, the existing value is left in place, allowing
/// per-request overrides. Requests matching the auth-endpoint exemption are
/// never touched.
#[derive(Debug)]
pub struct AccessTokenMiddleware<S, P = NotAuthEndpoint> {
    store: Arc<S>,
    predicate: P,
}

impl<S> AccessTokenMiddleware<S, NotAuthEndpoint> {
    /// Constructs a new middleware reading tokens from the given store
    ///
    /// By default the middleware attaches a token to every request except
    /// those targeting the auth endpoints. To change this behavior, provide
    /// a custom predicate with [`with_predicate()`][Self::with_predicate()].
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            predicate: NotAuthEndpoint::default(),
        }
    }

    /// Replaces the default predicate with a custom predicate
    pub fn with_predicate<P>(self, predicate: P) -> AccessTokenMiddleware<S, P> {
        AccessTokenMiddleware {
            store: self.store,
            predicate,
        }
    }
}

fn bearer_value(token: &AccessTokenRef) -> header::HeaderValue {
    let mut header_value = BytesMut::with_capacity(token.as_str().len() + 7);
    header_value.put_slice(b"Bearer ");
    header_value.put_slice(token.as_str().as_bytes());
    let mut value = header::HeaderValue::from_maybe_shared(header_value.freeze())
        .expect("only valid header bytes");
    value.set_sensitive(true);
    value
}

#[async_trait::async_trait]
impl<S, P> Middleware for AccessTokenMiddleware<S, P>
where
    S: TokenStore + 'static,
    P: Predicate<Request> + Send + Sync + 'static,
{
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if self.predicate.eval(&req) {
            match self.store.current().await {
                Ok(Some(session)) => {
                    req.headers_mut()
                        .entry(header::AUTHORIZATION)
                        .or_insert_with(|| bearer_value(session.access_token()));
                }
                Ok(None) => {
                    tracing::trace!("no stored session, request goes out unauthenticated");
                }
                Err(error) => {
                    tracing::warn!(
                        error = &error as &dyn std::error::Error,
                        "unable to read the session store, request goes out unauthenticated"
                    );
                }
            }
        }

        next.run(req, extensions).await
    }
}

/// A middleware that converts authentication failures into a shared refresh
/// and a single replay
///
/// On an authentication-failure status the middleware engages its
/// [`RefreshCoordinator`]: the first failing request runs the refresh
/// exchange, every other concurrent failure queues behind it, and all of
/// them replay with the fresh token in arrival order. A replay that is
/// rejected again surfaces [`AuthError::RetryExhausted`] without a second
/// refresh; a failed refresh surfaces [`AuthError::Refresh`] to this request
/// and every queued waiter after the session has been terminated.
///
/// Requests carrying a caller-supplied `Authorization` header are not
/// intercepted: a replay would substitute the stored token for the caller's
/// credential, so their failures pass through untouched.
///
/// Must be added to the middleware stack *before* (outside of)
/// [`AccessTokenMiddleware`] so that replays pick up the new token.
#[derive(Debug)]
pub struct TokenRefreshMiddleware<S, X, P = NotAuthEndpoint> {
    coordinator: Arc<RefreshCoordinator<S, X>>,
    predicate: P,
    retry_on_forbidden: bool,
}

impl<S, X> TokenRefreshMiddleware<S, X, NotAuthEndpoint> {
    /// Constructs a new middleware around a shared coordinator
    pub fn new(coordinator: Arc<RefreshCoordinator<S, X>>) -> Self {
        Self {
            coordinator,
            predicate: NotAuthEndpoint::default(),
            retry_on_forbidden: false,
        }
    }

    /// Replaces the default auth-endpoint exemption with a custom predicate
    ///
    /// Requests for which the predicate evaluates to `false` bypass failure
    /// interception entirely.
    pub fn with_predicate<P>(self, predicate: P) -> TokenRefreshMiddleware<S, X, P> {
        TokenRefreshMiddleware {
            coordinator: self.coordinator,
            predicate,
            retry_on_forbidden: self.retry_on_forbidden,
        }
    }
}

impl<S, X, P> TokenRefreshMiddleware<S, X, P> {
    /// Also treats `403 Forbidden` as a refresh trigger
    ///
    /// By default only `401 Unauthorized` engages the refresh protocol;
    /// backends that report an expired token as `403` can opt in here.
    pub fn retry_on_forbidden(mut self) -> Self {
        self.retry_on_forbidden = true;
        self
    }

    fn is_auth_failure(&self, status: StatusCode) -> bool {
        status == StatusCode::UNAUTHORIZED
            || (self.retry_on_forbidden && status == StatusCode::FORBIDDEN)
    }
}

#[async_trait::async_trait]
impl<S, X, P> Middleware for TokenRefreshMiddleware<S, X, P>
where
    S: TokenStore + 'static,
    X: AsyncRefreshSource + 'static,
    P: Predicate<Request> + Send + Sync + 'static,
{
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if !self.predicate.eval(&req) {
            // Auth endpoint traffic is never intercepted, even on failure.
            return next.run(req, extensions).await;
        }

        if req.headers().contains_key(header::AUTHORIZATION) {
            // A header present at this layer was set by the caller. Replaying
            // with the stored token would silently override their credential,
            // so the failure is theirs to handle.
            return next.run(req, extensions).await;
        }

        let observed = self.coordinator.generation();
        let replay = req.try_clone();

        let response = next.clone().run(req, extensions).await?;
        if !self.is_auth_failure(response.status()) {
            return Ok(response);
        }

        let Some(mut replay) = replay else {
            tracing::debug!(
                status = response.status().as_u16(),
                "authentication failure on a request without a replayable body"
            );
            return Ok(response);
        };

        tracing::debug!(
            status = response.status().as_u16(),
            "authentication failure, coordinating token refresh"
        );

        match self.coordinator.refresh(observed).await {
            Ok(_token) => {
                // Strip the stale credential so the interceptor attaches the
                // fresh one on the way back down the stack.
                replay.headers_mut().remove(header::AUTHORIZATION);
                let retry = next.run(replay, extensions).await?;
                if self.is_auth_failure(retry.status()) {
                    tracing::warn!(
                        status = retry.status().as_u16(),
                        "request was rejected again after a token refresh"
                    );
                    Err(Error::middleware(AuthError::RetryExhausted {
                        status: retry.status(),
                    }))
                } else {
                    Ok(retry)
                }
            }
            Err(error) => Err(Error::middleware(AuthError::Refresh(error))),
        }
    }
}

/// Matches every request except those targeting the auth endpoints
///
/// The bootstrap and refresh calls must be exempt from credential
/// attachment and failure interception; this predicate recognizes them by
/// path suffix.
#[derive(Clone, Debug)]
pub struct NotAuthEndpoint {
    exempt_suffixes: Vec<String>,
}

impl NotAuthEndpoint {
    /// Constructs a predicate exempting the given path suffixes
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self {
            exempt_suffixes: suffixes.into_iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for NotAuthEndpoint {
    /// Exempts `/auth/sync` and `/auth/refresh`
    fn default() -> Self {
        Self::new(["/auth/sync", "/auth/refresh"])
    }
}

impl Predicate<Request> for NotAuthEndpoint {
    #[inline]
    fn eval(&self, req: &Request) -> bool {
        let path = req.url().path();
        !self
            .exempt_suffixes
            .iter()
            .any(|suffix| path.ends_with(suffix.as_str()))
    }

    fn find_case(&self, expected: bool, req: &Request) -> Option<reflection::Case> {
        let result = self.eval(req);
        if result != expected {
            Some(
                reflection::Case::new(Some(self), result).add_product(reflection::Product::new(
                    "path",
                    req.url().path().to_owned(),
                )),
            )
        } else {
            None
        }
    }
}

impl reflection::PredicateReflection for NotAuthEndpoint {}
impl fmt::Display for NotAuthEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("path is not an auth endpoint")
    }
}
