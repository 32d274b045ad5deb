// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands: `login`, `register`, `logout`, `whoami`, `status`,
//! `request`, `watch`.

pub mod auth;
pub mod request;
pub mod status;
pub mod watch;

use std::sync::Arc;

use botdash_session::{ApiClient, FileStore};
use tokio_util::sync::CancellationToken;

use crate::config::{Command, Config};
use crate::error::ExitCode;

/// Run the parsed subcommand against the credential file in `config`.
pub async fn run(config: Config) -> anyhow::Result<ExitCode> {
    let store = FileStore::new(config.credentials_path());
    tracing::debug!(path = %store.path().display(), "using credential file");

    let shutdown = CancellationToken::new();
    let watcher = match config.command {
        Command::Watch => Some(store.spawn_watcher(config.watch_poll(), shutdown.clone())),
        _ => None,
    };
    let client = ApiClient::new(config.client.clone(), Arc::new(store))?;

    let exit = match config.command {
        Command::Login(ref args) => auth::login(&client, args).await,
        Command::Register(ref args) => auth::register(&client, args).await,
        Command::Logout => auth::logout(&client).await,
        Command::Whoami => auth::whoami(&client).await,
        Command::Status => status::run(&client, &config),
        Command::Request(ref args) => request::run(&client, args).await,
        Command::Watch => watch::run(&client, shutdown.clone()).await,
    };

    shutdown.cancel();
    if let Some(handle) = watcher {
        let _ = handle.await;
    }
    Ok(exit)
}
