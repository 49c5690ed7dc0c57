//! Shared fixtures for the middleware and coordinator tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use stile_tokens::sources::{AsyncRefreshSource, RefreshedSession};
use stile_tokens::store::InMemoryTokenStore;
use stile_tokens::{
    AccessToken, RefreshToken, RefreshTokenRef, StoredSession, TokenPair, TokenStore,
};

pub(crate) async fn seeded_store(
    access: &'static str,
    refresh: &'static str,
) -> Arc<InMemoryTokenStore> {
    let store = Arc::new(InMemoryTokenStore::new());
    store
        .persist(&StoredSession::new(
            TokenPair::new(
                AccessToken::from_static(access),
                RefreshToken::from_static(refresh),
            ),
            None,
        ))
        .await
        .unwrap();
    store
}

pub(crate) enum RefreshBehavior {
    Issue {
        access: &'static str,
        rotate: Option<&'static str>,
    },
    Fail,
}

/// A scripted refresh authority
///
/// Counts exchanges, records the refresh tokens it was handed, and can be
/// gated on a semaphore so a refresh stays in flight until the test releases
/// it.
pub(crate) struct MockRefreshSource {
    behavior: RefreshBehavior,
    pub(crate) calls: Arc<AtomicUsize>,
    pub(crate) seen_refresh_tokens: Arc<Mutex<Vec<String>>>,
    gate: Option<Arc<tokio::sync::Semaphore>>,
}

impl MockRefreshSource {
    pub(crate) fn issuing(access: &'static str, rotate: Option<&'static str>) -> Self {
        Self {
            behavior: RefreshBehavior::Issue { access, rotate },
            calls: Arc::new(AtomicUsize::new(0)),
            seen_refresh_tokens: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            behavior: RefreshBehavior::Fail,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_refresh_tokens: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    pub(crate) fn gated(mut self, gate: Arc<tokio::sync::Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl AsyncRefreshSource for MockRefreshSource {
    type Error = std::io::Error;

    async fn refresh_session(
        &self,
        refresh_token: &RefreshTokenRef,
    ) -> std::result::Result<RefreshedSession, Self::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_refresh_tokens
            .lock()
            .unwrap()
            .push(refresh_token.as_str().to_owned());

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        match &self.behavior {
            RefreshBehavior::Issue { access, rotate } => Ok(RefreshedSession {
                access_token: AccessToken::from_static(access),
                refresh_token: (*rotate).map(RefreshToken::from_static),
                user: None,
            }),
            RefreshBehavior::Fail => Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "refresh rejected",
            )),
        }
    }
}

/// A terminal middleware standing in for the backend
///
/// Accepts requests whose `Authorization` header matches the configured
/// value and rejects everything else with 401, recording each hit in order.
pub(crate) struct MockAuthServer {
    valid_authorization: Mutex<String>,
    reject_everything: bool,
    reject_status: u16,
    hits: Mutex<Vec<(String, u16)>>,
}

impl MockAuthServer {
    pub(crate) fn accepting(authorization: impl Into<String>) -> Self {
        Self {
            valid_authorization: Mutex::new(authorization.into()),
            reject_everything: false,
            reject_status: 401,
            hits: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn rejecting_everything() -> Self {
        Self::rejecting_everything_with(401)
    }

    pub(crate) fn rejecting_everything_with(reject_status: u16) -> Self {
        Self {
            valid_authorization: Mutex::new(String::new()),
            reject_everything: true,
            reject_status,
            hits: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn hit_count(&self) -> usize {
        self.hits.lock().unwrap().len()
    }

    pub(crate) fn successful_paths(&self) -> Vec<String> {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, status)| *status == 200)
            .map(|(path, _)| path.clone())
            .collect()
    }
}

#[async_trait]
impl Middleware for MockAuthServer {
    async fn handle(
        &self,
        req: Request,
        _extensions: &mut http::Extensions,
        _next: Next<'_>,
    ) -> Result<Response> {
        let authorization = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let path = req.url().path().to_owned();

        let authorized =
            !self.reject_everything && authorization == *self.valid_authorization.lock().unwrap();
        let status = if authorized { 200 } else { self.reject_status };
        self.hits.lock().unwrap().push((path, status));

        let response = http::Response::builder()
            .status(status)
            .body(Vec::<u8>::new())
            .expect("valid mock response");
        Ok(response.into())
    }
}
