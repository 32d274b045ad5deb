// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::watch;

use crate::config::ClientConfig;
use crate::controller::SessionController;
use crate::coordinator::RefreshCoordinator;
use crate::dispatch::{Auth, Dispatcher, Outcome};
use crate::error::{ClientError, TerminalReason};
use crate::request::{ApiRequest, ApiResponse};
use crate::session::{Session, SessionReader};
use crate::store::{CredentialStore, MemoryStore};

/// The one entry point the dashboard issues API calls through.
///
/// Cheap to clone; clones share the session, the coordinator and the
/// connection pool.
#[derive(Clone)]
pub struct ApiClient {
    dispatcher: Arc<Dispatcher>,
    controller: Arc<SessionController>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Build a client whose session is seeded from (and mirrored to) `store`.
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> anyhow::Result<Self> {
        let restored = SessionController::restore(store.as_ref());
        tracing::debug!(authenticated = restored.is_authenticated(), "session restored");

        let (session_tx, session_rx) = watch::channel(restored);
        let dispatcher = Arc::new(Dispatcher::new(config, SessionReader::new(session_rx))?);
        let controller =
            Arc::new(SessionController::new(store, Arc::clone(&dispatcher), session_tx));
        let coordinator =
            Arc::new(RefreshCoordinator::new(Arc::clone(&dispatcher), Arc::clone(&controller)));
        Ok(Self { dispatcher, controller, coordinator })
    }

    /// Client with a private in-memory store.
    pub fn in_memory(config: ClientConfig) -> anyhow::Result<Self> {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    pub fn controller(&self) -> &Arc<SessionController> {
        &self.controller
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn config(&self) -> &ClientConfig {
        self.dispatcher.config()
    }

    pub fn session(&self) -> Session {
        self.controller.session()
    }

    /// Send `request` with the session token, recovering from a 401 by
    /// refreshing once and replaying.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let sent = self.dispatcher.send(&request, Auth::Session).await;
        match sent.outcome {
            Outcome::Success(resp) => Ok(resp),
            Outcome::Other(e) => Err(e.into()),
            Outcome::AuthFailure { .. } if self.dispatcher.is_refresh_request(&request) => {
                tracing::warn!("refresh endpoint rejected a direct call");
                self.coordinator.terminate(TerminalReason::RefreshRejected);
                Err(TerminalReason::RefreshRejected.into())
            }
            Outcome::AuthFailure { .. } => {
                self.coordinator.handle_auth_failure(request, sent.token).await
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        Ok(self.send(ApiRequest::get(path)).await?.json()?)
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ClientError> {
        Ok(self.send(ApiRequest::post(path, body)).await?.json()?)
    }
}
