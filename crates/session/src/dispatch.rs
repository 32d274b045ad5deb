// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatcher: attaches the bearer token and classifies responses.
//!
//! Holds no recovery logic. The refresh coordinator wraps it.

use bytes::Bytes;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::config::ClientConfig;
use crate::error::OtherError;
use crate::request::{ApiRequest, ApiResponse};
use crate::session::SessionReader;

/// Which credential a request carries.
#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    /// The current session access token, if there is one.
    Session,
    /// An explicit token (replays, identity fetch right after login).
    Bearer(&'a str),
    /// Nothing (login, refresh, registration).
    None,
}

/// Classified result of a single network round trip.
#[derive(Debug)]
pub enum Outcome {
    Success(ApiResponse),
    /// HTTP 401. The body is kept for callers that show the server's message.
    AuthFailure { body: Bytes },
    Other(OtherError),
}

/// An [`Outcome`] plus the token the request actually carried.
#[derive(Debug)]
pub struct Sent {
    pub outcome: Outcome,
    pub token: Option<String>,
}

/// Sends requests to the backend API.
pub struct Dispatcher {
    config: ClientConfig,
    http: reqwest::Client,
    session: SessionReader,
}

impl Dispatcher {
    pub fn new(config: ClientConfig, session: SessionReader) -> anyhow::Result<Self> {
        crate::ensure_crypto();
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { config, http, session })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionReader {
        &self.session
    }

    /// Whether the request targets the refresh endpoint. A 401 from there is
    /// terminal and must never be queued for a refresh.
    pub fn is_refresh_request(&self, req: &ApiRequest) -> bool {
        self.config.is_refresh_path(&req.path)
    }

    pub async fn send(&self, req: &ApiRequest, auth: Auth<'_>) -> Sent {
        let token = match auth {
            Auth::Session => self.session.access_token(),
            Auth::Bearer(token) => Some(token.to_owned()),
            Auth::None => None,
        };

        let mut builder = self
            .http
            .request(req.method.clone(), self.config.url(&req.path))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");
        for (name, value) in &req.headers {
            if name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = req.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %req.method, path = %req.path, authenticated = token.is_some(), "dispatch");
        let outcome = match builder.send().await {
            Ok(resp) => classify(resp).await,
            Err(e) => Outcome::Other(OtherError::Network(e)),
        };
        Sent { outcome, token }
    }
}

async fn classify(resp: reqwest::Response) -> Outcome {
    let status = resp.status();
    let body = match resp.bytes().await {
        Ok(body) => body,
        Err(e) => return Outcome::Other(OtherError::Network(e)),
    };
    if status.is_success() {
        Outcome::Success(ApiResponse { status: status.as_u16(), body })
    } else if status == reqwest::StatusCode::UNAUTHORIZED {
        Outcome::AuthFailure { body }
    } else {
        Outcome::Other(OtherError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
