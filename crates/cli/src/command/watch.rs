// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `botdash watch`: print session notices as other processes log in and out.

use botdash_session::{ApiClient, SessionNotice};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::ExitCode;

pub async fn run(client: &ApiClient, shutdown: CancellationToken) -> ExitCode {
    let controller = client.controller();
    let mut notices = controller.notices();
    let sync = controller.spawn_store_sync(shutdown.clone());

    let state = if client.session().is_authenticated() { "logged in" } else { "logged out" };
    println!("Watching session ({state}). Ctrl-C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = shutdown.cancelled() => break,
            notice = notices.recv() => match notice {
                Ok(notice) => println!("{}", describe(&notice)),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "notice stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    shutdown.cancel();
    let _ = sync.await;
    ExitCode::Success
}

/// One-line rendering of a notice.
pub fn describe(notice: &SessionNotice) -> String {
    match notice {
        SessionNotice::LoggedIn { username: Some(name) } => format!("logged in as {name}"),
        SessionNotice::LoggedIn { username: None } => "logged in".to_owned(),
        SessionNotice::Registered { username } => format!("registered {username}"),
        SessionNotice::LoggedOut => "logged out".to_owned(),
        SessionNotice::Expired { reason, message } => format!("{message} ({reason})"),
        SessionNotice::RedirectToLogin => "login required".to_owned(),
        SessionNotice::ChangedElsewhere { authenticated: true } => {
            "session started in another process".to_owned()
        }
        SessionNotice::ChangedElsewhere { authenticated: false } => {
            "session ended in another process".to_owned()
        }
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
