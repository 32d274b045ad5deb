// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake trading-bot backend for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use botdash_session::{ApiClient, ClientConfig, CredentialStore, MemoryStore, StoredCredentials};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

pub const PASSWORD: &str = "hunter2";
pub const USERNAME: &str = "trader";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Issue a new access token and rotate the refresh token.
    Rotate,
    /// Issue a new access token only.
    AccessOnly,
    /// 401, as for an expired refresh token.
    Reject,
    /// 500.
    ServerError,
}

pub struct Backend {
    pub valid_access: Mutex<String>,
    pub valid_refresh: Mutex<String>,
    pub refresh_mode: Mutex<RefreshMode>,
    /// Reject every bearer on protected routes, even valid ones.
    pub reject_all: AtomicBool,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub logout_status: AtomicU16,
    /// `(bot, authorization)` for every hit on a protected route.
    pub hits: Mutex<Vec<(String, Option<String>)>>,
    /// When set, the refresh handler waits for a permit.
    pub gate_refresh: AtomicBool,
    gate: Semaphore,
    issued: AtomicUsize,
}

impl Backend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            valid_access: Mutex::new("access-0".to_owned()),
            valid_refresh: Mutex::new("refresh-0".to_owned()),
            refresh_mode: Mutex::new(RefreshMode::Rotate),
            reject_all: AtomicBool::new(false),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            logout_status: AtomicU16::new(205),
            hits: Mutex::new(Vec::new()),
            gate_refresh: AtomicBool::new(false),
            gate: Semaphore::new(0),
            issued: AtomicUsize::new(0),
        })
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock() = mode;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn release_refresh(&self) {
        self.gate.add_permits(1);
    }

    /// Bots served with the given token, in arrival order.
    pub fn served_with(&self, token: &str) -> Vec<String> {
        let bearer = format!("Bearer {token}");
        self.hits
            .lock()
            .iter()
            .filter(|(_, auth)| auth.as_deref() == Some(bearer.as_str()))
            .map(|(bot, _)| bot.clone())
            .collect()
    }

    fn next_pair(&self) -> (String, String) {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        (format!("access-{n}"), format!("refresh-{n}"))
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.valid_access.lock());
        !self.reject_all.load(Ordering::SeqCst) && bearer(headers).as_deref() == Some(&expected)
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_owned)
}

fn token_not_valid() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "detail": "Given token not valid for any token type",
            "code": "token_not_valid",
        })),
    )
        .into_response()
}

async fn obtain_pair(
    State(backend): State<Arc<Backend>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if body["username"] != USERNAME || body["password"] != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "detail": "No active account found with the given credentials",
            })),
        )
            .into_response();
    }
    let (access, refresh) = backend.next_pair();
    *backend.valid_access.lock() = access.clone();
    *backend.valid_refresh.lock() = refresh.clone();
    Json(serde_json::json!({ "access": access, "refresh": refresh })).into_response()
}

async fn refresh_pair(
    State(backend): State<Arc<Backend>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if backend.gate_refresh.load(Ordering::SeqCst) {
        if let Ok(permit) = backend.gate.acquire().await {
            permit.forget();
        }
    }

    let mode = *backend.refresh_mode.lock();
    let presented = body["refresh"].as_str().unwrap_or_default().to_owned();
    if mode == RefreshMode::Reject || presented != *backend.valid_refresh.lock() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "detail": "Token is invalid or expired",
                "code": "token_not_valid",
            })),
        )
            .into_response();
    }
    if mode == RefreshMode::ServerError {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    }

    let (access, refresh) = backend.next_pair();
    *backend.valid_access.lock() = access.clone();
    if mode == RefreshMode::Rotate {
        *backend.valid_refresh.lock() = refresh.clone();
        Json(serde_json::json!({ "access": access, "refresh": refresh })).into_response()
    } else {
        Json(serde_json::json!({ "access": access })).into_response()
    }
}

async fn current_user(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return token_not_valid();
    }
    Json(serde_json::json!({
        "id": 7,
        "username": USERNAME,
        "email": "trader@example.com",
        "date_joined": "2025-01-01T00:00:00Z",
    }))
    .into_response()
}

async fn logout(State(backend): State<Arc<Backend>>) -> Response {
    backend.logout_calls.fetch_add(1, Ordering::SeqCst);
    let status = StatusCode::from_u16(backend.logout_status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    status.into_response()
}

async fn register(Json(body): Json<serde_json::Value>) -> Response {
    if body["username"] == "taken" {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "username": ["A user with that username already exists."] })),
        )
            .into_response();
    }
    (StatusCode::CREATED, Json(serde_json::json!({ "username": body["username"] })))
        .into_response()
}

async fn bot(
    State(backend): State<Arc<Backend>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    backend.hits.lock().push((name.clone(), bearer(&headers)));
    if !backend.authorized(&headers) {
        return token_not_valid();
    }
    match name.as_str() {
        "missing" => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "detail": "Not found." })))
            .into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        _ => Json(serde_json::json!({ "bot": name, "status": "running" })).into_response(),
    }
}

pub async fn spawn(backend: Arc<Backend>) -> anyhow::Result<SocketAddr> {
    let app = Router::new()
        .route("/api/token/", post(obtain_pair))
        .route("/api/token/refresh/", post(refresh_pair))
        .route("/api/user/", get(current_user))
        .route("/api/logout/", post(logout))
        .route("/api/register/", post(register))
        .route("/api/bots/{name}/", get(bot))
        .with_state(backend);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(addr)
}

pub fn config(addr: SocketAddr) -> ClientConfig {
    ClientConfig { timeout_ms: 5_000, ..ClientConfig::with_base_url(format!("http://{addr}/api")) }
}

pub fn client(addr: SocketAddr, store: &MemoryStore) -> anyhow::Result<ApiClient> {
    client_with(config(addr), store)
}

pub fn client_with(config: ClientConfig, store: &MemoryStore) -> anyhow::Result<ApiClient> {
    let store: Arc<dyn CredentialStore> = Arc::new(store.clone());
    ApiClient::new(config, store)
}

/// A store holding an access token the backend no longer accepts.
pub fn stale_store() -> MemoryStore {
    MemoryStore::with_credentials(StoredCredentials {
        access_token: Some("expired".to_owned()),
        refresh_token: Some("refresh-0".to_owned()),
        user: None,
    })
}

/// Poll `cond` until it holds or a couple of seconds pass.
pub async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        anyhow::ensure!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    Ok(())
}

/// Wait for the next notice on `rx`.
pub async fn next_notice(
    rx: &mut tokio::sync::broadcast::Receiver<botdash_session::SessionNotice>,
) -> anyhow::Result<botdash_session::SessionNotice> {
    Ok(tokio::time::timeout(Duration::from_secs(2), rx.recv()).await??)
}

/// Drain every notice currently buffered on `rx`.
pub fn drain_notices(
    rx: &mut tokio::sync::broadcast::Receiver<botdash_session::SessionNotice>,
) -> Vec<botdash_session::SessionNotice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}
