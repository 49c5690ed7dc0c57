//! The session-termination fallback

use std::sync::Arc;

use stile_tokens::{StoreError, TokenStore};
use tokio::sync::watch;

/// Tears down a dead session and signals the application to re-bootstrap
///
/// Termination clears every stored slot as a unit and bumps a reset epoch on
/// a watch channel. The application holds the receiving end and restarts its
/// bootstrap flow whenever the epoch changes; there is no in-place retry of a
/// dead session.
#[derive(Debug)]
pub struct SessionTerminator<S> {
    store: Arc<S>,
    reset: watch::Sender<u64>,
}

impl<S> Clone for SessionTerminator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            reset: self.reset.clone(),
        }
    }
}

impl<S> SessionTerminator<S>
where
    S: TokenStore,
{
    /// Constructs a new terminator over the given store
    pub fn new(store: Arc<S>) -> Self {
        let (reset, _) = watch::channel(0);
        Self { store, reset }
    }

    /// Subscribes to session reset notifications
    ///
    /// The value is a monotonically increasing epoch; any observed change
    /// means the stored session is gone and a fresh bootstrap is required.
    pub fn resets(&self) -> watch::Receiver<u64> {
        self.reset.subscribe()
    }

    /// Clears all persisted session state and publishes a reset
    ///
    /// Safe to invoke repeatedly; clearing an already-empty store succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn terminate(&self) -> Result<(), StoreError> {
        self.store.clear().await?;
        self.reset.send_modify(|epoch| *epoch += 1);
        tracing::info!("session terminated, application must re-run its bootstrap flow");
        Ok(())
    }
}
