//! One-shot session bootstrap
//!
//! Exchanges the platform identity assertion for the initial credential pair
//! and profile. The exchange itself goes through an [`AsyncSessionExchange`],
//! which is never routed through the authenticated middleware client, so a
//! failing bootstrap cannot trigger the refresh protocol.

use std::sync::Arc;

use thiserror::Error;

use crate::sources::AsyncSessionExchange;
use crate::store::{StoreError, StoredSession, TokenStore};
use crate::{InitDataRef, UserProfile};

/// Establishes a fresh session from a platform identity assertion
#[derive(Debug)]
pub struct SessionBootstrap<S, X> {
    store: Arc<S>,
    exchange: X,
}

/// An error while establishing a fresh session
#[derive(Debug, Error)]
pub enum BootstrapError<E> {
    /// No identity assertion was available from the platform
    ///
    /// This is a local condition; no exchange was attempted and retrying
    /// without a new assertion cannot succeed.
    #[error("platform identity assertion is not available")]
    IdentityUnavailable,
    /// The authority rejected or failed the exchange
    #[error("error exchanging identity assertion for session tokens")]
    Exchange(#[source] E),
    /// The issued session could not be persisted
    #[error("error persisting the session")]
    Store(#[from] StoreError),
}

impl<S, X> SessionBootstrap<S, X>
where
    S: TokenStore,
    X: AsyncSessionExchange,
{
    /// Constructs a new bootstrap around a store and an exchange source
    pub fn new(store: Arc<S>, exchange: X) -> Self {
        Self { store, exchange }
    }

    /// Exchanges the identity assertion for a session and persists it
    ///
    /// Any previously stored session is cleared before the exchange is
    /// issued, so a half-dead prior session cannot shadow the new one.
    /// Returns the authenticated user's profile.
    #[tracing::instrument(skip_all)]
    pub async fn establish(
        &self,
        init_data: Option<&InitDataRef>,
    ) -> Result<UserProfile, BootstrapError<X::Error>> {
        let init_data = init_data.ok_or(BootstrapError::IdentityUnavailable)?;

        self.store.clear().await?;

        let bundle = self
            .exchange
            .exchange_session(init_data)
            .await
            .map_err(BootstrapError::Exchange)?;

        let session = StoredSession::new(bundle.tokens, Some(bundle.user.clone()));
        self.store.persist(&session).await?;

        tracing::info!(user.id = bundle.user.id, "session established");

        Ok(bundle.user)
    }
}
