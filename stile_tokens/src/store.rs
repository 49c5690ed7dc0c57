//! Durable storage for the current session
//!
//! The store owns three slots — access token, refresh token, and the cached
//! user profile — which are always read, written, and deleted as a single
//! unit. A reader can observe the previous session or the new one, never a
//! half-updated mixture.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AccessToken, AccessTokenRef, RefreshToken, RefreshTokenRef, TokenPair, UserProfile};

#[cfg(feature = "file")]
pub mod file;
pub mod in_memory;

#[cfg(feature = "file")]
pub use file::FileTokenStore;
pub use in_memory::InMemoryTokenStore;

/// A complete persisted session: credential pair plus cached profile
///
/// Serializes with the wire slot names (`accessToken`, `refreshToken`,
/// `user`) so a persisted session mirrors what the backend issued.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    #[serde(flatten)]
    tokens: TokenPair,
    #[serde(default)]
    user: Option<UserProfile>,
}

impl StoredSession {
    /// Constructs a session from a credential pair and an optional profile snapshot
    pub fn new(tokens: TokenPair, user: Option<UserProfile>) -> Self {
        Self { tokens, user }
    }

    /// Gets the stored credential pair
    #[inline]
    pub fn tokens(&self) -> &TokenPair {
        &self.tokens
    }

    /// Gets the stored access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        self.tokens.access_token()
    }

    /// Gets the stored refresh token
    #[inline]
    pub fn refresh_token(&self) -> &RefreshTokenRef {
        self.tokens.refresh_token()
    }

    /// Gets the cached profile snapshot, if one was stored
    #[inline]
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    /// Produces the session that results from a completed refresh exchange
    ///
    /// The refresh token and profile are carried over unless the server
    /// supplied replacements.
    pub fn rotated(
        &self,
        access_token: AccessToken,
        refresh_token: Option<RefreshToken>,
        user: Option<UserProfile>,
    ) -> Self {
        Self {
            tokens: self.tokens.rotated(access_token, refresh_token),
            user: user.or_else(|| self.user.clone()),
        }
    }
}

impl Clone for StoredSession {
    fn clone(&self) -> Self {
        Self {
            tokens: self.tokens.clone(),
            user: self.user.clone(),
        }
    }
}

/// An error while reading or writing the session store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying storage could not be read or written
    #[error("error reading or writing the session store")]
    Io(#[from] std::io::Error),
    /// The stored session document could not be serialized or parsed
    #[error("error serializing the stored session")]
    Serialization(#[from] serde_json::Error),
}

/// Durable storage for the current session
///
/// `current` returns a point-in-time snapshot; callers never hold a lock on
/// the store across a suspension point. `persist` replaces all slots as a
/// unit, and `clear` removes them as a unit and is idempotent.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Reads a snapshot of the current session, if one is stored
    async fn current(&self) -> Result<Option<StoredSession>, StoreError>;

    /// Replaces the stored session atomically
    async fn persist(&self, session: &StoredSession) -> Result<(), StoreError>;

    /// Removes every stored slot
    ///
    /// Clearing an already-empty store succeeds.
    async fn clear(&self) -> Result<(), StoreError>;
}
