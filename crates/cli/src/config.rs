// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use botdash_session::store::default_credentials_path;
use botdash_session::ClientConfig;
use clap::Parser;

use crate::command::auth::{LoginArgs, RegisterArgs};
use crate::command::request::RequestArgs;

/// Command-line client for the trading bot dashboard API.
#[derive(Debug, Parser)]
#[command(name = "botdash", version, about)]
pub struct Config {
    /// Log format (json or text).
    #[arg(long, env = "BOTDASH_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "BOTDASH_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    /// Credential file shared by every botdash process of this user.
    #[arg(long, env = "BOTDASH_CREDENTIALS", global = true)]
    pub credentials: Option<PathBuf>,

    /// How often `watch` re-reads the credential file, in milliseconds.
    #[arg(long, env = "BOTDASH_WATCH_POLL_MS", default_value_t = 500)]
    pub watch_poll_ms: u64,

    #[command(flatten)]
    pub client: ClientConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Log in and store the session.
    Login(LoginArgs),
    /// Create an account (does not log in).
    Register(RegisterArgs),
    /// End the session here and on the server.
    Logout,
    /// Show the account the stored session belongs to.
    Whoami,
    /// Print the session and refresh state as JSON.
    Status,
    /// Send an authenticated request.
    Request(RequestArgs),
    /// Follow session changes made by other processes until interrupted.
    Watch,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("invalid log format: {} (expected json or text)", self.log_format);
        }
        let base = self.client.base_url.as_str();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            anyhow::bail!("invalid base URL: {base} (expected http:// or https://)");
        }
        if self.client.timeout_ms == 0 {
            anyhow::bail!("--timeout-ms must be positive");
        }
        if self.client.max_pending == 0 {
            anyhow::bail!("--max-pending must be positive");
        }
        if self.watch_poll_ms == 0 {
            anyhow::bail!("--watch-poll-ms must be positive");
        }
        if let Command::Request(ref args) = self.command {
            args.validate()?;
        }
        Ok(())
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.credentials.clone().unwrap_or_else(default_credentials_path)
    }

    pub fn watch_poll(&self) -> Duration {
        Duration::from_millis(self.watch_poll_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
