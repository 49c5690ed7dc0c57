//! A session source backed by a Telegram Mini App auth backend
//!
//! Both calls here are made with a plain [`reqwest::Client`], never the
//! middleware-wrapped client used for ordinary traffic. That keeps the
//! bootstrap and refresh exchanges outside the credential-attach and
//! failure-interception pipeline, so a failing refresh can never recursively
//! attempt to refresh itself.

use async_trait::async_trait;
use reqwest::header;
use thiserror::Error;

use super::{AsyncRefreshSource, AsyncSessionExchange, RefreshedSession, SessionBundle};
use crate::{InitDataRef, RefreshTokenRef, TokenPair};

pub mod dto;

/// A source that exchanges Telegram Mini App credentials for session tokens
#[derive(Clone, Debug)]
pub struct TmaTokenSource {
    client: reqwest::Client,
    sync_url: reqwest::Url,
    refresh_url: reqwest::Url,
}

impl TmaTokenSource {
    /// Constructs a new source from the two auth endpoint URLs
    pub fn new(client: reqwest::Client, sync_url: reqwest::Url, refresh_url: reqwest::Url) -> Self {
        Self {
            client,
            sync_url,
            refresh_url,
        }
    }
}

/// An error while attempting to obtain session tokens from the authority
#[derive(Debug, Error)]
pub enum TokenRequestError {
    /// An error from the authority with an error body
    #[error("error requesting session tokens from authority: {body}")]
    ErrorWithBody {
        /// The underlying request error
        source: reqwest::Error,
        /// The body of the error
        body: String,
    },
    /// Unable to deserialize the session body
    #[error("error deserializing session body from authority")]
    SessionBodyError(#[from] serde_json::Error),
    /// Unable to read the response
    #[error("error reading response body")]
    BodyReadError(reqwest::Error),
    /// Unable to send a request to the authority
    #[error("error sending request to authority")]
    RequestSend(reqwest::Error),
    /// The identity assertion contained bytes that cannot be sent in a header
    #[error("identity assertion is not a valid header value")]
    AssertionHeader(#[from] header::InvalidHeaderValue),
}

async fn read_success_body<T>(resp: reqwest::Response) -> Result<T, TokenRequestError>
where
    T: serde::de::DeserializeOwned,
{
    tracing::debug!(
        response.status = resp.status().as_u16(),
        "received response from issuing authority"
    );

    if let Err(error) = resp.error_for_status_ref() {
        let body = resp
            .text()
            .await
            .map_err(TokenRequestError::BodyReadError)?;
        return Err(TokenRequestError::ErrorWithBody {
            source: error,
            body,
        });
    }

    let body = resp.bytes().await.map_err(TokenRequestError::BodyReadError)?;
    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl AsyncSessionExchange for TmaTokenSource {
    type Error = TokenRequestError;

    #[tracing::instrument(err, skip(self, init_data), fields(sync_url = %self.sync_url))]
    async fn exchange_session(
        &self,
        init_data: &InitDataRef,
    ) -> Result<SessionBundle, Self::Error> {
        tracing::trace!("exchanging identity assertion for session tokens");

        // The platform assertion uses its own `tma` scheme, distinct from the
        // bearer scheme used after login.
        let mut assertion =
            header::HeaderValue::from_str(&format!("tma {}", init_data.as_str()))?;
        assertion.set_sensitive(true);

        let resp = self
            .client
            .post(self.sync_url.clone())
            .header(header::AUTHORIZATION, assertion)
            .json(&dto::SyncRequest {})
            .send()
            .await
            .map_err(TokenRequestError::RequestSend)?;

        let resp: dto::SessionResponse = read_success_body(resp).await?;

        tracing::info!("received initial session tokens");

        Ok(SessionBundle {
            tokens: TokenPair::new(resp.access_token, resp.refresh_token),
            user: resp.user,
        })
    }
}

#[async_trait]
impl AsyncRefreshSource for TmaTokenSource {
    type Error = TokenRequestError;

    #[tracing::instrument(err, skip(self, refresh_token), fields(refresh_url = %self.refresh_url))]
    async fn refresh_session(
        &self,
        refresh_token: &RefreshTokenRef,
    ) -> Result<RefreshedSession, Self::Error> {
        tracing::trace!("requesting replacement access token from authority");

        let resp = self
            .client
            .post(self.refresh_url.clone())
            .json(&dto::RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(TokenRequestError::RequestSend)?;

        let resp: dto::RefreshResponse = read_success_body(resp).await?;

        tracing::info!(
            rotated_refresh_token = resp.refresh_token.is_some(),
            has_user_summary = resp.user.is_some(),
            "received replacement access token"
        );

        Ok(RefreshedSession {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            user: resp.user,
        })
    }
}
