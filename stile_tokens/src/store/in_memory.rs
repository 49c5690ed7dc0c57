//! An in-memory session store

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{StoreError, StoredSession, TokenStore};

/// A session store held entirely in process memory
///
/// Sessions kept here do not survive a restart. Intended for tests and for
/// hosts that provide their own durable layer.
#[derive(Default, Debug)]
pub struct InMemoryTokenStore {
    session: RwLock<Option<StoredSession>>,
}

impl InMemoryTokenStore {
    /// Constructs a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn current(&self) -> Result<Option<StoredSession>, StoreError> {
        let guard = self
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(guard.clone())
    }

    async fn persist(&self, session: &StoredSession) -> Result<(), StoreError> {
        let mut guard = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = None;
        Ok(())
    }
}
