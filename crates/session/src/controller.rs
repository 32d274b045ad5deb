// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session controller: sole owner of the [`Session`].
//!
//! Every mutation updates the published session and the credential store
//! under one lock, memory first. Observers get the session through a
//! `watch` channel and lifecycle notices through a `broadcast` channel.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{Auth, Dispatcher, Outcome};
use crate::error::{
    error_message_from_body, LoginError, OtherError, TerminalReason, LOGIN_FAILED_MESSAGE,
    SESSION_EXPIRED_MESSAGE,
};
use crate::request::ApiRequest;
use crate::session::{Session, UserProfile};
use crate::store::CredentialStore;

/// Username/password pair for the token endpoint.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("username", &self.username).finish_non_exhaustive()
    }
}

/// Account details for the registration endpoint.
#[derive(Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Session lifecycle events for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    LoggedIn { username: Option<String> },
    Registered { username: String },
    LoggedOut,
    /// The session was force-terminated; show `message` to the user.
    Expired { reason: TerminalReason, message: &'static str },
    /// Send the user to the login entry point.
    RedirectToLogin,
    /// Another context sharing the credential store changed the session.
    ChangedElsewhere { authenticated: bool },
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenPair {
    access: String,
    refresh: String,
}

/// Refresh endpoint response. The refresh token is only present when the
/// backend rotates it.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RefreshedTokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

pub struct SessionController {
    store: Arc<dyn CredentialStore>,
    dispatcher: Arc<Dispatcher>,
    session_tx: watch::Sender<Session>,
    notice_tx: broadcast::Sender<SessionNotice>,
    /// Serializes memory + mirror updates.
    write_lock: Mutex<()>,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        dispatcher: Arc<Dispatcher>,
        session_tx: watch::Sender<Session>,
    ) -> Self {
        let (notice_tx, _) = broadcast::channel(64);
        Self { store, dispatcher, session_tx, notice_tx, write_lock: Mutex::new(()) }
    }

    /// Session as last persisted, used to seed the controller on startup.
    pub fn restore(store: &dyn CredentialStore) -> Session {
        match store.load() {
            Ok(stored) => Session::from_stored(stored, 0),
            Err(e) => {
                tracing::warn!(err = %e, "failed to load stored credentials, starting signed out");
                Session::default()
            }
        }
    }

    pub fn session(&self) -> Session {
        self.session_tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session_tx.borrow().is_authenticated()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session_tx.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notice_tx.subscribe()
    }

    /// Exchange credentials for a token pair and start a new session.
    pub async fn login(&self, creds: &Credentials) -> Result<Session, LoginError> {
        let config = self.dispatcher.config();
        let req = ApiRequest::post(
            config.token_path.clone(),
            serde_json::json!({ "username": creds.username, "password": creds.password }),
        );
        let resp = match self.dispatcher.send(&req, Auth::None).await.outcome {
            Outcome::Success(resp) => resp,
            Outcome::AuthFailure { body } => {
                return Err(LoginError::Rejected { status: 401, message: login_message(&body) })
            }
            Outcome::Other(OtherError::Status { status, body }) => {
                return Err(LoginError::Rejected {
                    status,
                    message: login_message(body.as_bytes()),
                })
            }
            Outcome::Other(e) => return Err(LoginError::Other(e)),
        };
        let pair: TokenPair = resp.json().map_err(LoginError::Other)?;

        let user = if config.fetch_user {
            match self.fetch_identity(&pair.access).await {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(err = %e, "identity fetch after login failed");
                    None
                }
            }
        } else {
            None
        };

        let session = {
            let _guard = self.write_lock.lock();
            let epoch = self.session_tx.borrow().epoch + 1;
            let session = Session {
                access_token: Some(pair.access),
                refresh_token: Some(pair.refresh),
                user,
                epoch,
            };
            self.commit(session.clone());
            session
        };

        let username = session.user.as_ref().map(|u| u.username.clone());
        tracing::info!(user = username.as_deref().unwrap_or("-"), epoch = session.epoch, "logged in");
        let _ = self.notice_tx.send(SessionNotice::LoggedIn { username });
        Ok(session)
    }

    /// Create an account. Does not log in; the caller goes to the login
    /// entry point next.
    pub async fn register(&self, registration: &Registration) -> Result<(), OtherError> {
        let body = serde_json::to_value(registration).map_err(OtherError::Decode)?;
        let req = ApiRequest::post(self.dispatcher.config().register_path.clone(), body);
        match self.dispatcher.send(&req, Auth::None).await.outcome {
            Outcome::Success(_) => {
                tracing::info!(user = %registration.username, "registered");
                let _ = self.notice_tx.send(SessionNotice::Registered {
                    username: registration.username.clone(),
                });
                let _ = self.notice_tx.send(SessionNotice::RedirectToLogin);
                Ok(())
            }
            Outcome::AuthFailure { body } => Err(OtherError::Status {
                status: 401,
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
            Outcome::Other(e) => Err(e),
        }
    }

    /// Invalidate the refresh token server-side (best effort), then clear
    /// the local session unconditionally.
    pub async fn logout(&self) {
        if let Some(refresh) = self.session().refresh_token {
            let req = ApiRequest::post(
                self.dispatcher.config().logout_path.clone(),
                serde_json::json!({ "refresh": refresh }),
            );
            match self.dispatcher.send(&req, Auth::Session).await.outcome {
                Outcome::Success(_) => tracing::debug!("server-side logout acknowledged"),
                Outcome::AuthFailure { .. } => {
                    tracing::warn!("server-side logout rejected (401), clearing locally")
                }
                Outcome::Other(e) => {
                    tracing::warn!(err = %e, "server-side logout failed, clearing locally")
                }
            }
        }
        self.clear();
        tracing::info!("logged out");
        let _ = self.notice_tx.send(SessionNotice::LoggedOut);
    }

    /// Same end state as [`logout`](Self::logout) without the server call,
    /// plus the "session expired" notice and a redirect to login.
    pub fn on_terminal_failure(&self, reason: &TerminalReason) {
        self.clear();
        tracing::warn!(reason = %reason, "session terminated");
        let _ = self
            .notice_tx
            .send(SessionNotice::Expired { reason: reason.clone(), message: SESSION_EXPIRED_MESSAGE });
        let _ = self.notice_tx.send(SessionNotice::RedirectToLogin);
    }

    /// Install a refreshed access token, but only if the session still holds
    /// the refresh token the exchange was made with. Returns `false` when the
    /// session was logged out or rotated by someone else in the meantime.
    pub(crate) fn apply_refresh(&self, used_refresh: &str, tokens: RefreshedTokens) -> bool {
        let _guard = self.write_lock.lock();
        let current = self.session_tx.borrow().clone();
        if current.refresh_token.as_deref() != Some(used_refresh) {
            return false;
        }
        let next = Session {
            access_token: Some(tokens.access),
            refresh_token: tokens.refresh.or(current.refresh_token),
            ..current
        };
        self.commit(next);
        true
    }

    /// Drop every token and the cached identity, keeping the epoch.
    pub(crate) fn clear(&self) {
        let _guard = self.write_lock.lock();
        let epoch = self.session_tx.borrow().epoch;
        self.session_tx.send_replace(Session { epoch, ..Session::default() });
        if let Err(e) = self.store.clear() {
            tracing::warn!(err = %e, "failed to clear stored credentials");
        }
    }

    /// Publish `next` and mirror it to the store. Caller holds `write_lock`.
    fn commit(&self, next: Session) {
        let stored = next.to_stored();
        self.session_tx.send_replace(next);
        if let Err(e) = self.store.save(&stored) {
            tracing::warn!(err = %e, "failed to persist credentials");
        }
    }

    async fn fetch_identity(&self, access: &str) -> Result<UserProfile, OtherError> {
        let req = ApiRequest::get(self.dispatcher.config().user_path.clone());
        match self.dispatcher.send(&req, Auth::Bearer(access)).await.outcome {
            Outcome::Success(resp) => resp.json(),
            Outcome::AuthFailure { body } => Err(OtherError::Status {
                status: 401,
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
            Outcome::Other(e) => Err(e),
        }
    }

    /// Adopt whatever another context wrote to the store.
    ///
    /// Our own writes reload as identical records and are ignored.
    pub fn reconcile_with_store(&self) {
        let authenticated = {
            let _guard = self.write_lock.lock();
            let stored = match self.store.load() {
                Ok(stored) => stored,
                Err(e) => {
                    tracing::warn!(err = %e, "failed to reload stored credentials");
                    return;
                }
            };
            let current = self.session_tx.borrow().clone();
            if current.to_stored() == stored {
                return;
            }
            let has_tokens = stored.access_token.is_some() || stored.refresh_token.is_some();
            let epoch = if has_tokens && stored.refresh_token != current.refresh_token {
                current.epoch + 1
            } else {
                current.epoch
            };
            let next = if has_tokens {
                Session::from_stored(stored, epoch)
            } else {
                Session { epoch, ..Session::default() }
            };
            let authenticated = next.is_authenticated();
            // Memory only: the store already holds this record.
            self.session_tx.send_replace(next);
            authenticated
        };

        tracing::info!(authenticated, "session changed in another context");
        let _ = self.notice_tx.send(SessionNotice::ChangedElsewhere { authenticated });
    }

    /// Follow credential store changes until `shutdown` is cancelled.
    pub fn spawn_store_sync(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let mut changes = self.store.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    change = changes.recv() => match change {
                        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                            controller.reconcile_with_store();
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }
}

fn login_message(body: &[u8]) -> String {
    error_message_from_body(body).unwrap_or_else(|| LOGIN_FAILED_MESSAGE.to_owned())
}
