// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Notice shown to the user whenever a session is force-terminated.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";

/// Why a session could not be recovered by refreshing its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalReason {
    /// No refresh token was stored when the access token was rejected.
    NoRefreshToken,
    /// The refresh endpoint answered 401: the refresh token is invalid or expired.
    RefreshRejected,
    /// The refresh endpoint failed in some other way (5xx, network, bad body).
    RefreshFailed(String),
    /// A request replayed with a fresh token was rejected again.
    RetryExhausted,
    /// The session was cleared (logout, earlier terminal failure) and no
    /// fresh login has happened since.
    SessionEnded,
}

impl TerminalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRefreshToken => "NO_REFRESH_TOKEN",
            Self::RefreshRejected => "REFRESH_REJECTED",
            Self::RefreshFailed(_) => "REFRESH_FAILED",
            Self::RetryExhausted => "RETRY_EXHAUSTED",
            Self::SessionEnded => "SESSION_ENDED",
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RefreshFailed(detail) => write!(f, "{}: {detail}", self.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Errors that are the caller's to handle. They never trigger a refresh or
/// a logout.
#[derive(Debug)]
pub enum OtherError {
    /// Non-2xx, non-401 HTTP response.
    Status { status: u16, body: String },
    /// Transport failure (connect, timeout, TLS, body read).
    Network(reqwest::Error),
    /// The response body was not the JSON the caller asked for.
    Decode(serde_json::Error),
    /// The pending-request queue of the current refresh is full.
    Overloaded { limit: usize },
    /// The refresh task ended before resolving this request.
    Abandoned,
}

impl fmt::Display for OtherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { status, body } if body.is_empty() => write!(f, "HTTP {status}"),
            Self::Status { status, body } => write!(f, "HTTP {status}: {body}"),
            Self::Network(e) => write!(f, "network error: {e}"),
            Self::Decode(e) => write!(f, "invalid response body: {e}"),
            Self::Overloaded { limit } => {
                write!(f, "too many requests waiting on token refresh (limit {limit})")
            }
            Self::Abandoned => f.write_str("token refresh ended without a result"),
        }
    }
}

impl std::error::Error for OtherError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Network(e) => Some(e),
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

/// Error returned to callers of [`ApiClient`](crate::ApiClient).
///
/// Authorization failures are absorbed by the refresh coordinator; they only
/// surface here as [`ClientError::Terminal`] once the session is gone.
#[derive(Debug)]
pub enum ClientError {
    Terminal(TerminalReason),
    Other(OtherError),
}

impl ClientError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }

    /// HTTP status of an [`OtherError::Status`], if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Other(OtherError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminal(reason) => write!(f, "session terminated ({reason})"),
            Self::Other(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Terminal(_) => None,
            Self::Other(e) => Some(e),
        }
    }
}

impl From<OtherError> for ClientError {
    fn from(e: OtherError) -> Self {
        Self::Other(e)
    }
}

impl From<TerminalReason> for ClientError {
    fn from(reason: TerminalReason) -> Self {
        Self::Terminal(reason)
    }
}

/// Fallback shown when the token endpoint gives no usable message.
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed";

/// Error returned by [`SessionController::login`](crate::SessionController::login).
#[derive(Debug)]
pub enum LoginError {
    /// The token endpoint refused the credentials.
    Rejected { status: u16, message: String },
    /// Transport failure or an unusable token response.
    Other(OtherError),
}

impl LoginError {
    /// Message suitable for display next to the login form.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Rejected { message, .. } => message,
            Self::Other(_) => LOGIN_FAILED_MESSAGE,
        }
    }
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { status, message } => write!(f, "login rejected ({status}): {message}"),
            Self::Other(e) => write!(f, "login failed: {e}"),
        }
    }
}

impl std::error::Error for LoginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rejected { .. } => None,
            Self::Other(e) => Some(e),
        }
    }
}

/// Pull a human-readable message out of a JSON error body: the `error`
/// field, else the `detail` field.
pub fn error_message_from_body(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    ["error", "detail"].iter().find_map(|key| match value.get(*key) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
