// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh coordinator: single-flight token refresh with FIFO replay.
//!
//! The first request to fail with a 401 while the coordinator is idle starts
//! a refresh flight; every 401 that arrives while the flight is running is
//! queued behind it. The flight performs exactly one call to the refresh
//! endpoint, installs the new token, and replays the queue in registration
//! order with that token. If the refresh fails while the session still holds
//! the refresh token that was sent, the whole queue is rejected and the
//! session is cleared.
//!
//! The queue lives inside [`State::Refreshing`], so it is empty by
//! construction whenever the coordinator is idle. The state mutex is never
//! held across an `.await`; the flight runs in its own task so callers that
//! drop their futures do not strand the rest of the queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::controller::{RefreshedTokens, SessionController};
use crate::dispatch::{Auth, Dispatcher, Outcome};
use crate::error::{ClientError, OtherError, TerminalReason};
use crate::request::{ApiRequest, ApiResponse};

type Resolution = Result<ApiResponse, ClientError>;

/// Externally visible coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Refreshing,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Refreshing => "refreshing",
            Self::Failed => "failed",
        }
    }
}

/// A request captured at its 401, waiting for the flight to finish.
struct Pending {
    subscriber: Uuid,
    request: ApiRequest,
    resume: oneshot::Sender<Resolution>,
}

enum State {
    Idle,
    Refreshing { flight: u64, queue: VecDeque<Pending> },
    /// Left only once the session epoch moves past `epoch` (a fresh login).
    Failed { epoch: u64 },
}

enum Decision {
    /// Queued behind the running flight.
    Wait(oneshot::Receiver<Resolution>),
    /// Started a new flight; also queued at its head.
    Lead { flight: u64, refresh_token: String, rx: oneshot::Receiver<Resolution> },
    /// The token was already replaced since this request was sent.
    ReplayNow { token: String, request: ApiRequest },
    Reject(ClientError),
}

pub struct RefreshCoordinator {
    dispatcher: Arc<Dispatcher>,
    controller: Arc<SessionController>,
    state: Mutex<State>,
    next_flight: AtomicU64,
    max_pending: usize,
}

impl RefreshCoordinator {
    pub fn new(dispatcher: Arc<Dispatcher>, controller: Arc<SessionController>) -> Self {
        let max_pending = dispatcher.config().max_pending;
        Self {
            dispatcher,
            controller,
            state: Mutex::new(State::Idle),
            next_flight: AtomicU64::new(1),
            max_pending,
        }
    }

    pub fn phase(&self) -> Phase {
        let mut state = self.state.lock();
        self.reset_after_login(&mut state);
        match *state {
            State::Idle => Phase::Idle,
            State::Refreshing { .. } => Phase::Refreshing,
            State::Failed { .. } => Phase::Failed,
        }
    }

    /// Number of requests waiting on the running flight.
    pub fn pending_len(&self) -> usize {
        match &*self.state.lock() {
            State::Refreshing { queue, .. } => queue.len(),
            _ => 0,
        }
    }

    /// Recover a request that failed with 401 while carrying `failed_with`.
    ///
    /// Resolves with the replayed response, the replayed request's own
    /// non-auth error, or a terminal failure. Never triggers more than one
    /// refresh per batch and never replays a request twice.
    pub async fn handle_auth_failure(
        self: &Arc<Self>,
        request: ApiRequest,
        failed_with: Option<String>,
    ) -> Resolution {
        match self.decide(request, failed_with) {
            Decision::Reject(e) => Err(e),
            Decision::ReplayNow { token, request } => self.replay_once(&request, &token).await,
            Decision::Lead { flight, refresh_token, rx } => {
                let this = Arc::clone(self);
                tokio::spawn(async move { this.run_flight(flight, refresh_token).await });
                await_resolution(rx).await
            }
            Decision::Wait(rx) => await_resolution(rx).await,
        }
    }

    /// Force the failed state: clear the session, reject anything queued.
    pub fn terminate(&self, reason: TerminalReason) {
        let mut state = self.state.lock();
        self.fail_locked(&mut state, reason);
    }

    /// The atomic "am I refreshing or subscribing" decision.
    fn decide(&self, request: ApiRequest, failed_with: Option<String>) -> Decision {
        let mut state = self.state.lock();
        self.reset_after_login(&mut state);
        let session = self.controller.session();

        match &mut *state {
            State::Failed { .. } => Decision::Reject(TerminalReason::SessionEnded.into()),
            State::Refreshing { flight, queue } => {
                if queue.len() >= self.max_pending {
                    tracing::warn!(limit = self.max_pending, path = %request.path, "refresh queue full");
                    return Decision::Reject(OtherError::Overloaded { limit: self.max_pending }.into());
                }
                let (resume, rx) = oneshot::channel();
                let subscriber = Uuid::new_v4();
                queue.push_back(Pending { subscriber, request, resume });
                tracing::debug!(flight = *flight, %subscriber, pending = queue.len(), "queued behind refresh");
                Decision::Wait(rx)
            }
            State::Idle => {
                if let Some(token) =
                    session.access_token.filter(|current| Some(current) != failed_with.as_ref())
                {
                    tracing::debug!(path = %request.path, "token already replaced, replaying");
                    return Decision::ReplayNow { token, request };
                }
                let Some(refresh_token) = session.refresh_token else {
                    self.fail_locked(&mut state, TerminalReason::NoRefreshToken);
                    return Decision::Reject(TerminalReason::NoRefreshToken.into());
                };
                let flight = self.next_flight.fetch_add(1, Ordering::Relaxed);
                let (resume, rx) = oneshot::channel();
                let subscriber = Uuid::new_v4();
                let mut queue = VecDeque::new();
                queue.push_back(Pending { subscriber, request, resume });
                *state = State::Refreshing { flight, queue };
                tracing::debug!(flight, %subscriber, "starting token refresh");
                Decision::Lead { flight, refresh_token, rx }
            }
        }
    }

    fn reset_after_login(&self, state: &mut State) {
        if let State::Failed { epoch } = *state {
            let current = self.controller.session().epoch;
            if current > epoch {
                tracing::debug!(epoch = current, "fresh login, coordinator reset");
                *state = State::Idle;
            }
        }
    }

    fn fail_locked(&self, state: &mut State, reason: TerminalReason) {
        let queue = match std::mem::replace(state, State::Idle) {
            State::Refreshing { queue, .. } => queue,
            _ => VecDeque::new(),
        };
        // Clear before anyone is released, so no later request carries a token.
        self.controller.on_terminal_failure(&reason);
        *state = State::Failed { epoch: self.controller.session().epoch };

        if !queue.is_empty() {
            tracing::debug!(pending = queue.len(), reason = %reason, "rejecting queued requests");
        }
        for pending in queue {
            let _ = pending.resume.send(Err(reason.clone().into()));
        }
    }

    async fn run_flight(self: Arc<Self>, flight: u64, refresh_token: String) {
        let exchanged = self.exchange(&refresh_token).await;

        let (token, mut queue) = {
            let mut state = self.state.lock();
            let queue = match std::mem::replace(&mut *state, State::Idle) {
                State::Refreshing { flight: current, queue } if current == flight => queue,
                other => {
                    *state = other;
                    tracing::debug!(flight, "refresh flight superseded, discarding result");
                    return;
                }
            };

            let token = match exchanged {
                Ok(tokens) => {
                    let access = tokens.access.clone();
                    if self.controller.apply_refresh(&refresh_token, tokens) {
                        Some(access)
                    } else {
                        // Logged out or rotated by another context while in flight.
                        self.controller.session().access_token
                    }
                }
                Err(reason) => {
                    // The store may already hold a token another context rotated in.
                    self.controller.reconcile_with_store();
                    let session = self.controller.session();
                    if session.refresh_token.as_deref() == Some(refresh_token.as_str()) {
                        *state = State::Refreshing { flight, queue };
                        self.fail_locked(&mut state, reason);
                        return;
                    }
                    tracing::debug!(flight, reason = %reason, "refresh token replaced during exchange");
                    session.access_token
                }
            };
            match token {
                Some(token) => (token, queue),
                None => {
                    *state = State::Failed { epoch: self.controller.session().epoch };
                    drop(state);
                    reject_all(queue, &TerminalReason::SessionEnded);
                    return;
                }
            }
        };

        tracing::info!(flight, pending = queue.len(), "access token refreshed, replaying");
        while let Some(pending) = queue.pop_front() {
            if self.phase() == Phase::Failed || !self.controller.is_authenticated() {
                let _ = pending.resume.send(Err(TerminalReason::SessionEnded.into()));
                reject_all(queue, &TerminalReason::SessionEnded);
                return;
            }

            let sent = self.dispatcher.send(&pending.request, Auth::Bearer(&token)).await;
            let resolution = match sent.outcome {
                Outcome::Success(resp) => Ok(resp),
                Outcome::Other(e) => Err(ClientError::Other(e)),
                Outcome::AuthFailure { .. } => {
                    tracing::warn!(
                        subscriber = %pending.subscriber,
                        path = %pending.request.path,
                        "replayed request rejected again"
                    );
                    self.terminate(TerminalReason::RetryExhausted);
                    let _ = pending.resume.send(Err(TerminalReason::RetryExhausted.into()));
                    reject_all(queue, &TerminalReason::RetryExhausted);
                    return;
                }
            };
            let _ = pending.resume.send(resolution);
        }
    }

    /// The single refresh-endpoint call of a flight.
    async fn exchange(&self, refresh_token: &str) -> Result<RefreshedTokens, TerminalReason> {
        let req = ApiRequest::post(
            self.dispatcher.config().refresh_path.clone(),
            serde_json::json!({ "refresh": refresh_token }),
        );
        match self.dispatcher.send(&req, Auth::None).await.outcome {
            Outcome::Success(resp) => resp.json().map_err(|e| {
                tracing::warn!(err = %e, "refresh response unreadable");
                TerminalReason::RefreshFailed(e.to_string())
            }),
            Outcome::AuthFailure { .. } => {
                tracing::warn!("refresh token rejected");
                Err(TerminalReason::RefreshRejected)
            }
            Outcome::Other(e) => {
                tracing::warn!(err = %e, "token refresh failed");
                Err(TerminalReason::RefreshFailed(e.to_string()))
            }
        }
    }

    /// Replay outside a flight. A second 401 is terminal.
    async fn replay_once(&self, request: &ApiRequest, token: &str) -> Resolution {
        match self.dispatcher.send(request, Auth::Bearer(token)).await.outcome {
            Outcome::Success(resp) => Ok(resp),
            Outcome::Other(e) => Err(ClientError::Other(e)),
            Outcome::AuthFailure { .. } => {
                tracing::warn!(path = %request.path, "replayed request rejected again");
                self.terminate(TerminalReason::RetryExhausted);
                Err(TerminalReason::RetryExhausted.into())
            }
        }
    }
}

fn reject_all(queue: VecDeque<Pending>, reason: &TerminalReason) {
    for pending in queue {
        let _ = pending.resume.send(Err(reason.clone().into()));
    }
}

/// A flight that dies without resolving leaves the session untouched.
async fn await_resolution(rx: oneshot::Receiver<Resolution>) -> Resolution {
    rx.await.unwrap_or_else(|_| {
        tracing::warn!("refresh task ended without a result");
        Err(OtherError::Abandoned.into())
    })
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
