use serde::{Deserialize, Serialize};

use crate::{AccessToken, AccessTokenRef, RefreshToken, RefreshTokenRef};

/// An access/refresh credential pair as issued by the backend
///
/// A pair is only ever replaced wholesale: either both credentials are
/// present together or neither is stored at all. Refreshing produces a new
/// pair via [`rotated`][Self::rotated] rather than mutating one in place.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    access_token: Box<AccessTokenRef>,
    refresh_token: Box<RefreshTokenRef>,
}

impl TokenPair {
    /// Constructs a pair from freshly issued credentials
    pub fn new(access_token: AccessToken, refresh_token: RefreshToken) -> Self {
        Self {
            access_token: access_token.into_boxed_ref(),
            refresh_token: refresh_token.into_boxed_ref(),
        }
    }

    /// Gets the current access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the current refresh token
    #[inline]
    pub fn refresh_token(&self) -> &RefreshTokenRef {
        &self.refresh_token
    }

    /// Produces the pair that results from a completed refresh exchange
    ///
    /// Only the access token is guaranteed to be replaced; the refresh token
    /// is reused unless the server rotated it.
    pub fn rotated(&self, access_token: AccessToken, refresh_token: Option<RefreshToken>) -> Self {
        Self {
            access_token: access_token.into_boxed_ref(),
            refresh_token: refresh_token
                .map(RefreshToken::into_boxed_ref)
                .unwrap_or_else(|| self.refresh_token.to_owned().into_boxed_ref()),
        }
    }
}

impl Clone for TokenPair {
    fn clone(&self) -> Self {
        Self {
            access_token: self.access_token.to_owned().into_boxed_ref(),
            refresh_token: self.refresh_token.to_owned().into_boxed_ref(),
        }
    }
}
