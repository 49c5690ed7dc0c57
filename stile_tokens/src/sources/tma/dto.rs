//! DTOs for the Telegram Mini App auth endpoints

use serde::{Deserialize, Serialize};

use crate::{AccessToken, RefreshToken, RefreshTokenRef, UserProfile};

/// The bootstrap exchange request body
///
/// The assertion itself travels in the `Authorization` header; the body is an
/// empty object.
#[derive(Debug, Serialize)]
pub struct SyncRequest {}

/// The refresh exchange request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    /// The stored refresh token
    pub refresh_token: &'a RefreshTokenRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SessionResponse {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RefreshResponse {
    pub access_token: AccessToken,
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}
