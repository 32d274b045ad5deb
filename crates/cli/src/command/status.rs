// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use botdash_session::{ApiClient, Phase, Session};
use serde::Serialize;

use crate::config::Config;
use crate::error::ExitCode;

/// `botdash status` output. Never includes token values.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub authenticated: bool,
    pub has_refresh_token: bool,
    pub username: Option<String>,
    pub refresh: &'static str,
    pub pending: usize,
    pub base_url: String,
    pub credentials: String,
}

impl StatusReport {
    pub fn new(session: &Session, phase: Phase, pending: usize, config: &Config) -> Self {
        Self {
            authenticated: session.is_authenticated(),
            has_refresh_token: session.refresh_token.is_some(),
            username: session.user.as_ref().map(|u| u.username.clone()),
            refresh: phase.as_str(),
            pending,
            base_url: config.client.base_url.clone(),
            credentials: config.credentials_path().display().to_string(),
        }
    }
}

pub fn run(client: &ApiClient, config: &Config) -> ExitCode {
    let coordinator = client.coordinator();
    let report = StatusReport::new(
        &client.session(),
        coordinator.phase(),
        coordinator.pending_len(),
        config,
    );
    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            println!("{json}");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::Failure
        }
    }
}
