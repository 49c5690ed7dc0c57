//! Single-flight coordination of token refreshes
//!
//! Any number of requests can fail with an authentication error while a
//! token is expired; exactly one of them performs the refresh exchange and
//! the rest queue behind it and reuse the result. The coordinator is an
//! ordinary value owned by the client that uses it, so independent clients
//! (and tests) never share refresh state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stile_tokens::sources::AsyncRefreshSource;
use stile_tokens::{AccessToken, StoreError, TokenStore};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::session::SessionTerminator;

const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// An error while refreshing the session tokens
///
/// Every variant is terminal for the current session: by the time a caller
/// observes one of these, the session terminator has already wiped the store
/// (or found it already wiped) and the application must bootstrap again.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The refresh exchange itself was rejected or failed
    #[error("session token refresh failed")]
    Exchange(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    /// The refresh exchange did not complete within the configured timeout
    #[error("session token refresh timed out")]
    TimedOut,
    /// The session was terminated while this request was waiting on a refresh
    #[error("session has been terminated")]
    SessionTerminated,
    /// The session store failed while reading or writing credentials
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs at most one refresh exchange at a time and shares the result
///
/// Requests that observe an authentication failure call
/// [`refresh`][Self::refresh] with the generation they dispatched under.
/// The internal mutex serializes refreshes; its FIFO waiter queue is the
/// waiter queue of the protocol, so queued requests resume strictly in
/// arrival order. The generation counter is bumped inside the critical
/// section on every completed attempt — success or failure — which is what
/// returns the coordinator to idle and lets queued waiters detect that the
/// refresh they were waiting on already happened.
#[derive(Debug)]
pub struct RefreshCoordinator<S, X> {
    store: Arc<S>,
    source: X,
    terminator: SessionTerminator<S>,
    refresh_timeout: Duration,
    flight: Mutex<()>,
    generation: AtomicU64,
}

impl<S, X> RefreshCoordinator<S, X>
where
    S: TokenStore,
    X: AsyncRefreshSource,
{
    /// Constructs a new coordinator over a store and a refresh source
    pub fn new(store: Arc<S>, source: X) -> Self {
        let terminator = SessionTerminator::new(Arc::clone(&store));
        Self {
            store,
            source,
            terminator,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            flight: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Sets how long a single refresh exchange may run before the session is
    /// declared dead
    ///
    /// Every queued request blocks on the in-flight refresh, so an unbounded
    /// exchange would stall the whole client. Defaults to 30 seconds.
    pub fn with_refresh_timeout(mut self, refresh_timeout: Duration) -> Self {
        self.refresh_timeout = refresh_timeout;
        self
    }

    /// Gets the terminator used when a refresh fails
    pub fn terminator(&self) -> &SessionTerminator<S> {
        &self.terminator
    }

    /// Subscribes to session reset notifications
    pub fn resets(&self) -> tokio::sync::watch::Receiver<u64> {
        self.terminator.resets()
    }

    /// The current refresh generation
    ///
    /// Callers capture this before dispatching a request and hand it back to
    /// [`refresh`][Self::refresh] on failure, so the coordinator can tell a
    /// stale failure (already fixed by an earlier refresh) from a fresh one.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Obtains a usable access token after an authentication failure
    ///
    /// If `observed` is no longer the current generation, a refresh already
    /// completed while this request was queued and the stored token is
    /// returned without a new exchange. Otherwise this call performs the
    /// single-flight refresh on behalf of every queued waiter.
    pub async fn refresh(&self, observed: u64) -> Result<AccessToken, RefreshError> {
        let _flight = self.flight.lock().await;

        if self.generation.load(Ordering::Acquire) != observed {
            // Someone ahead of us in the queue already ran the exchange.
            return match self.store.current().await? {
                Some(session) => Ok(session.access_token().to_owned()),
                None => Err(RefreshError::SessionTerminated),
            };
        }

        let session = self
            .store
            .current()
            .await?
            .ok_or(RefreshError::SessionTerminated)?;

        tracing::debug!("refreshing session tokens");

        let outcome = tokio::time::timeout(
            self.refresh_timeout,
            self.source.refresh_session(session.refresh_token()),
        )
        .await;

        // The coordinator returns to idle no matter how the exchange ended.
        self.generation.fetch_add(1, Ordering::Release);

        match outcome {
            Ok(Ok(refreshed)) => {
                let updated = session.rotated(
                    refreshed.access_token,
                    refreshed.refresh_token,
                    refreshed.user,
                );
                self.store.persist(&updated).await?;
                tracing::info!("session tokens refreshed");
                Ok(updated.access_token().to_owned())
            }
            Ok(Err(error)) => {
                tracing::warn!(
                    error = &error as &dyn std::error::Error,
                    "refresh exchange failed, terminating session"
                );
                self.terminate().await;
                Err(RefreshError::Exchange(Box::new(error)))
            }
            Err(_elapsed) => {
                tracing::warn!(
                    timeout_ms = self.refresh_timeout.as_millis() as u64,
                    "refresh exchange timed out, terminating session"
                );
                self.terminate().await;
                Err(RefreshError::TimedOut)
            }
        }
    }

    async fn terminate(&self) {
        if let Err(error) = self.terminator.terminate().await {
            tracing::error!(
                error = &error as &dyn std::error::Error,
                "failed to clear the session store during termination"
            );
        }
    }
}
