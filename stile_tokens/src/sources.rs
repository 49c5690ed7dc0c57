//! Session exchange sources
//!
//! The two credential-issuing calls — the bootstrap exchange and the refresh
//! exchange — sit behind async traits so the coordinator and bootstrap glue
//! can be exercised against mock authorities in tests. The real
//! implementation against an HTTP backend lives in [`tma`].

use async_trait::async_trait;
use std::error;

use crate::{AccessToken, InitDataRef, RefreshToken, RefreshTokenRef, TokenPair, UserProfile};

#[cfg(feature = "tma")]
pub mod tma;

#[cfg(feature = "tma")]
pub use tma::TmaTokenSource;

/// Everything issued by a successful bootstrap exchange
#[derive(Debug)]
pub struct SessionBundle {
    /// The freshly issued credential pair
    pub tokens: TokenPair,
    /// The authenticated user's profile
    pub user: UserProfile,
}

/// Everything issued by a successful refresh exchange
///
/// Only the access token is guaranteed; the server may additionally rotate
/// the refresh token or return an updated profile summary.
#[derive(Debug)]
pub struct RefreshedSession {
    /// The replacement access token
    pub access_token: AccessToken,
    /// A rotated refresh token, if the server chose to rotate
    pub refresh_token: Option<RefreshToken>,
    /// An updated profile summary, if the server returned one
    pub user: Option<UserProfile>,
}

/// An asynchronous source that exchanges an identity assertion for a session
#[async_trait]
pub trait AsyncSessionExchange: Send + Sync {
    /// The error type returned in the event that the exchange fails
    type Error: error::Error + Send + Sync + 'static;

    /// Exchanges a platform identity assertion for a fresh session
    async fn exchange_session(&self, init_data: &InitDataRef)
        -> Result<SessionBundle, Self::Error>;
}

/// An asynchronous source that trades a refresh token for a new access token
#[async_trait]
pub trait AsyncRefreshSource: Send + Sync {
    /// The error type returned in the event that the refresh fails
    type Error: error::Error + Send + Sync + 'static;

    /// Requests a replacement access token from the authority
    async fn refresh_session(
        &self,
        refresh_token: &RefreshTokenRef,
    ) -> Result<RefreshedSession, Self::Error>;
}
