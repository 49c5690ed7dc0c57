//! Session credential storage and exchange for bearer-authenticated clients
//!
//! This library holds the pieces of an authenticated API client that sit
//! below the HTTP middleware layer: strongly typed credentials, a durable
//! session store, the endpoint exchanges that issue credentials, and the
//! one-shot bootstrap that turns a platform identity assertion into a stored
//! session.
//!
//! The store owns the credential pair and cached profile as a unit. Nothing
//! in this crate refreshes tokens on its own; the single-flight refresh
//! protocol lives in the companion middleware crate, which drives the
//! [`AsyncRefreshSource`][sources::AsyncRefreshSource] seam defined here.
//!
//! # General flow
//!
//! On start-up, build a store and a session source, then establish a session
//! from the platform's identity assertion:
//!
//! ```no_run
//! use std::sync::Arc;
//! use stile_tokens::{bootstrap::SessionBootstrap, sources::TmaTokenSource, InitData};
//! use stile_tokens::store::FileTokenStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FileTokenStore::new(".session.json".into()));
//!
//! let source = TmaTokenSource::new(
//!     reqwest::Client::new(),
//!     "https://api.example.com/auth/sync".parse()?,
//!     "https://api.example.com/auth/refresh".parse()?,
//! );
//!
//! let bootstrap = SessionBootstrap::new(store.clone(), source);
//! let init_data = InitData::from_static("signed-platform-blob");
//! let user = bootstrap.establish(Some(&init_data)).await?;
//!
//! tracing::info!(user.id = user.id, "signed in");
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! The following features are supported by this crate, all of which are
//! enabled by default:
//!
//! * `tma`: Provides the Telegram Mini App session source backed by
//!   [`reqwest`].
//! * `file`: Provides a session store backed by the local filesystem.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod bootstrap;
mod braids;
mod profile;
pub mod sources;
pub mod store;
mod tokens;

pub use braids::*;
pub use profile::UserProfile;
pub use store::{StoreError, StoredSession, TokenStore};
pub use tokens::TokenPair;
