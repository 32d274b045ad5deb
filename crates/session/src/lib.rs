// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated API client for the trading bot backend.
//!
//! Attaches the session's bearer token to every request, refreshes it
//! exactly once when any number of in-flight requests hit a 401, replays the
//! queued requests with the new token, and forces a clean logout when the
//! refresh itself fails.

pub mod client;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod request;
pub mod session;
pub mod store;

use std::sync::Once;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use controller::{Credentials, Registration, SessionController, SessionNotice};
pub use coordinator::{Phase, RefreshCoordinator};
pub use dispatch::{Auth, Dispatcher, Outcome};
pub use error::{ClientError, LoginError, OtherError, TerminalReason};
pub use request::{ApiRequest, ApiResponse};
pub use session::{Session, UserProfile};
pub use store::{CredentialStore, FileStore, MemoryStore, StoredCredentials};

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
///
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
