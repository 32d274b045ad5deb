// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use crate::request::normalize_route;

/// Configuration for the authenticated API client.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Base URL of the backend API.
    #[arg(long, default_value = "http://127.0.0.1:8000/api", env = "BOTDASH_API_URL")]
    pub base_url: String,

    /// Request timeout in milliseconds.
    #[arg(long, default_value_t = 200_000, env = "BOTDASH_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Path of the token endpoint (credentials -> token pair).
    #[arg(long, default_value = "/token/", env = "BOTDASH_TOKEN_PATH")]
    pub token_path: String,

    /// Path of the refresh endpoint.
    #[arg(long, default_value = "/token/refresh/", env = "BOTDASH_REFRESH_PATH")]
    pub refresh_path: String,

    /// Path of the logout endpoint.
    #[arg(long, default_value = "/logout/", env = "BOTDASH_LOGOUT_PATH")]
    pub logout_path: String,

    /// Path of the identity endpoint.
    #[arg(long, default_value = "/user/", env = "BOTDASH_USER_PATH")]
    pub user_path: String,

    /// Path of the registration endpoint.
    #[arg(long, default_value = "/register/", env = "BOTDASH_REGISTER_PATH")]
    pub register_path: String,

    /// Max requests that may wait on one token refresh.
    #[arg(long, default_value_t = 256, env = "BOTDASH_MAX_PENDING")]
    pub max_pending: usize,

    /// Fetch and cache the user identity after login.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, env = "BOTDASH_FETCH_USER")]
    pub fetch_user: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_owned(),
            timeout_ms: 200_000,
            token_path: "/token/".to_owned(),
            refresh_path: "/token/refresh/".to_owned(),
            logout_path: "/logout/".to_owned(),
            user_path: "/user/".to_owned(),
            register_path: "/register/".to_owned(),
            max_pending: 256,
            fetch_user: true,
        }
    }
}

impl ClientConfig {
    /// Default config pointed at another backend.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Absolute URL for a request path.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Whether `path` targets the refresh endpoint.
    pub fn is_refresh_path(&self, path: &str) -> bool {
        normalize_route(path) == normalize_route(&self.refresh_path)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
