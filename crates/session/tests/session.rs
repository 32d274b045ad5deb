// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle against a fake backend: login, registration, logout and
//! synchronization between contexts sharing one credential store.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use botdash_session::{
    ApiClient, ApiRequest, CredentialStore, Credentials, FileStore, LoginError, MemoryStore,
    OtherError, Registration, SessionNotice,
};
use support::Backend;
use tokio_util::sync::CancellationToken;

fn creds(password: &str) -> Credentials {
    Credentials { username: support::USERNAME.to_owned(), password: password.to_owned() }
}

// ---------------------------------------------------------------------------
// login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_stores_tokens_and_identity() -> anyhow::Result<()> {
    let backend = Backend::new();
    let addr = support::spawn(backend.clone()).await?;
    let store = MemoryStore::new();
    let client = support::client(addr, &store)?;
    let mut notices = client.controller().notices();

    let session = client.controller().login(&creds(support::PASSWORD)).await?;

    assert_eq!(session.access_token.as_deref(), Some("access-1"));
    assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
    let user = session.user.as_ref().ok_or_else(|| anyhow::anyhow!("no user cached"))?;
    assert_eq!(user.username, support::USERNAME);
    assert_eq!(user.id, Some(7));
    assert_eq!(user.extra.get("date_joined").and_then(|v| v.as_str()), Some("2025-01-01T00:00:00Z"));

    let stored = store.snapshot();
    assert_eq!(stored.access_token.as_deref(), Some("access-1"));
    assert_eq!(stored.user.as_ref().map(|u| u.username.as_str()), Some(support::USERNAME));
    assert_eq!(
        support::drain_notices(&mut notices),
        vec![SessionNotice::LoggedIn { username: Some(support::USERNAME.to_owned()) }]
    );
    Ok(())
}

#[tokio::test]
async fn login_without_identity_fetch() -> anyhow::Result<()> {
    let backend = Backend::new();
    let addr = support::spawn(backend.clone()).await?;
    let store = MemoryStore::new();
    let config = botdash_session::ClientConfig { fetch_user: false, ..support::config(addr) };
    let client = support::client_with(config, &store)?;

    let session = client.controller().login(&creds(support::PASSWORD)).await?;

    assert!(session.is_authenticated());
    assert!(session.user.is_none());
    Ok(())
}

#[tokio::test]
async fn rejected_login_surfaces_server_message() -> anyhow::Result<()> {
    let backend = Backend::new();
    let addr = support::spawn(backend.clone()).await?;
    let store = MemoryStore::new();
    let client = support::client(addr, &store)?;

    let err = client.controller().login(&creds("wrong")).await.expect_err("bad password");

    assert!(matches!(err, LoginError::Rejected { status: 401, .. }));
    assert_eq!(err.user_message(), "No active account found with the given credentials");
    assert!(!client.session().is_authenticated());
    assert!(store.snapshot().is_empty());
    Ok(())
}

#[tokio::test]
async fn login_replaces_previous_session() -> anyhow::Result<()> {
    let backend = Backend::new();
    let addr = support::spawn(backend.clone()).await?;
    let store = support::stale_store();
    let client = support::client(addr, &store)?;
    let before = client.session().epoch;

    let session = client.controller().login(&creds(support::PASSWORD)).await?;

    assert_eq!(session.epoch, before + 1);
    assert_eq!(store.snapshot().refresh_token.as_deref(), Some("refresh-1"));
    Ok(())
}

// ---------------------------------------------------------------------------
// registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn registration_does_not_log_in() -> anyhow::Result<()> {
    let backend = Backend::new();
    let addr = support::spawn(backend.clone()).await?;
    let store = MemoryStore::new();
    let client = support::client(addr, &store)?;
    let mut notices = client.controller().notices();

    let reg = Registration {
        username: "newbie".to_owned(),
        password: "pw".to_owned(),
        email: Some("newbie@example.com".to_owned()),
    };
    client.controller().register(&reg).await?;

    assert!(!client.session().is_authenticated());
    assert_eq!(
        support::drain_notices(&mut notices),
        vec![
            SessionNotice::Registered { username: "newbie".to_owned() },
            SessionNotice::RedirectToLogin,
        ]
    );

    let taken = Registration { username: "taken".to_owned(), password: "pw".to_owned(), email: None };
    let err = client.controller().register(&taken).await.expect_err("duplicate");
    assert!(matches!(err, OtherError::Status { status: 400, ref body } if body.contains("already exists")));
    Ok(())
}

// ---------------------------------------------------------------------------
// logout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn logout_clears_session() -> anyhow::Result<()> {
    let backend = Backend::new();
    let addr = support::spawn(backend.clone()).await?;
    let store = MemoryStore::new();
    let client = support::client(addr, &store)?;
    client.controller().login(&creds(support::PASSWORD)).await?;
    let mut notices = client.controller().notices();

    client.controller().logout().await;

    assert_eq!(backend.logout_calls.load(Ordering::SeqCst), 1);
    assert!(client.session().is_empty());
    assert!(store.snapshot().is_empty());
    assert_eq!(support::drain_notices(&mut notices), vec![SessionNotice::LoggedOut]);
    Ok(())
}

#[tokio::test]
async fn logout_clears_even_when_server_fails() -> anyhow::Result<()> {
    let backend = Backend::new();
    backend.logout_status.store(500, Ordering::SeqCst);
    let addr = support::spawn(backend.clone()).await?;
    let store = MemoryStore::new();
    let client = support::client(addr, &store)?;
    client.controller().login(&creds(support::PASSWORD)).await?;

    client.controller().logout().await;

    assert_eq!(backend.logout_calls.load(Ordering::SeqCst), 1);
    assert!(client.session().is_empty());
    assert!(store.snapshot().is_empty());
    Ok(())
}

#[tokio::test]
async fn logout_when_signed_out_skips_server() -> anyhow::Result<()> {
    let backend = Backend::new();
    let addr = support::spawn(backend.clone()).await?;
    let store = MemoryStore::new();
    let client = support::client(addr, &store)?;

    client.controller().logout().await;

    assert_eq!(backend.logout_calls.load(Ordering::SeqCst), 0);
    assert!(client.session().is_empty());
    Ok(())
}

// ---------------------------------------------------------------------------
// cross-context sync
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_follows_other_context() -> anyhow::Result<()> {
    let backend = Backend::new();
    let addr = support::spawn(backend.clone()).await?;
    let store = MemoryStore::new();
    let tab_a = support::client(addr, &store)?;
    let tab_b = support::client(addr, &store)?;
    let shutdown = CancellationToken::new();
    let sync = tab_b.controller().spawn_store_sync(shutdown.clone());
    let mut notices = tab_b.controller().notices();

    tab_a.controller().login(&creds(support::PASSWORD)).await?;
    assert_eq!(
        support::next_notice(&mut notices).await?,
        SessionNotice::ChangedElsewhere { authenticated: true }
    );
    assert!(tab_b.session().is_authenticated());
    let resp = tab_b.send(ApiRequest::get("/bots/shared/")).await?;
    assert_eq!(resp.status, 200);

    tab_a.controller().logout().await;
    assert_eq!(
        support::next_notice(&mut notices).await?,
        SessionNotice::ChangedElsewhere { authenticated: false }
    );
    assert!(tab_b.session().is_empty());

    shutdown.cancel();
    sync.await?;
    Ok(())
}

#[tokio::test]
async fn stale_refresh_rejection_keeps_rotated_session() -> anyhow::Result<()> {
    let backend = Backend::new();
    backend.gate_refresh.store(true, Ordering::SeqCst);
    let addr = support::spawn(backend.clone()).await?;
    let store = support::stale_store();
    let tab_a = support::client(addr, &store)?;
    let tab_b = support::client(addr, &store)?;
    let shutdown = CancellationToken::new();
    let _sync = tab_b.controller().spawn_store_sync(shutdown.clone());
    let mut a_notices = tab_a.controller().notices();

    // Both tabs start a refresh with refresh-0.
    let first = {
        let c = tab_a.clone();
        tokio::spawn(async move { c.send(ApiRequest::get("/bots/a/")).await })
    };
    support::wait_for("first refresh to reach backend", || backend.refresh_calls() == 1).await?;
    let second = {
        let c = tab_b.clone();
        tokio::spawn(async move { c.send(ApiRequest::get("/bots/b/")).await })
    };
    support::wait_for("second refresh to reach backend", || backend.refresh_calls() == 2).await?;

    // Tab A rotates to refresh-1 and tab B adopts it.
    backend.release_refresh();
    assert_eq!(first.await??.status, 200);
    support::wait_for("rotation to propagate", || {
        tab_b.session().refresh_token.as_deref() == Some("refresh-1")
    })
    .await?;

    // Tab B's exchange with refresh-0 is now rejected.
    backend.release_refresh();
    assert_eq!(second.await??.status, 200);

    assert_eq!(store.snapshot().refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(tab_a.session().refresh_token.as_deref(), Some("refresh-1"));
    assert!(tab_a.session().is_authenticated());
    assert_eq!(backend.served_with("access-1"), vec!["a", "b"]);
    assert_eq!(tab_b.coordinator().phase(), botdash_session::Phase::Idle);
    assert!(!support::drain_notices(&mut a_notices)
        .iter()
        .any(|n| matches!(n, SessionNotice::Expired { .. })));
    shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn login_in_other_context_resets_failed_coordinator() -> anyhow::Result<()> {
    let backend = Backend::new();
    backend.set_refresh_mode(support::RefreshMode::Reject);
    let addr = support::spawn(backend.clone()).await?;
    let store = support::stale_store();
    let tab_a = support::client(addr, &store)?;
    let tab_b = support::client(addr, &store)?;
    let shutdown = CancellationToken::new();
    let _sync = tab_b.controller().spawn_store_sync(shutdown.clone());

    assert!(tab_b.send(ApiRequest::get("/bots/x/")).await.is_err());
    assert_eq!(tab_b.coordinator().phase(), botdash_session::Phase::Failed);

    tab_a.controller().login(&creds(support::PASSWORD)).await?;
    support::wait_for("login to propagate", || tab_b.session().is_authenticated()).await?;

    assert_eq!(tab_b.send(ApiRequest::get("/bots/y/")).await?.status, 200);
    assert_eq!(tab_b.coordinator().phase(), botdash_session::Phase::Idle);
    shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn file_store_restores_and_syncs_session() -> anyhow::Result<()> {
    let backend = Backend::new();
    let addr = support::spawn(backend.clone()).await?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("credentials.json");

    let writer = FileStore::new(&path);
    let first = ApiClient::new(support::config(addr), Arc::new(FileStore::new(&path)))?;
    first.controller().login(&creds(support::PASSWORD)).await?;
    assert!(!writer.load()?.is_empty());

    // A second process starting later picks the session up from disk.
    let reader = FileStore::new(&path);
    let shutdown = CancellationToken::new();
    let _watch = reader.spawn_watcher(Duration::from_millis(20), shutdown.clone());
    let second = ApiClient::new(support::config(addr), Arc::new(reader))?;
    assert!(second.session().is_authenticated());
    let _sync = second.controller().spawn_store_sync(shutdown.clone());

    first.controller().logout().await;
    support::wait_for("logout to reach second process", || !second.session().is_authenticated())
        .await?;
    shutdown.cancel();
    Ok(())
}
