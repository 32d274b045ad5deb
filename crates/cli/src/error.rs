// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use botdash_session::{ClientError, LoginError};

/// Process exit codes shared by every subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    /// The request failed (HTTP error, network, bad response).
    Failure,
    /// Bad arguments or configuration.
    Usage,
    /// The session is gone; the user has to log in again.
    Terminal,
}

impl ExitCode {
    pub fn code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Usage => 2,
            Self::Terminal => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Usage => "USAGE",
            Self::Terminal => "TERMINAL",
        }
    }

    /// The worse of two outcomes, for commands that run several requests.
    pub fn worst(self, other: Self) -> Self {
        fn rank(code: ExitCode) -> u8 {
            match code {
                ExitCode::Success => 0,
                ExitCode::Failure => 1,
                ExitCode::Usage => 2,
                ExitCode::Terminal => 3,
            }
        }
        if rank(other) > rank(self) {
            other
        } else {
            self
        }
    }
}

impl From<&ClientError> for ExitCode {
    fn from(e: &ClientError) -> Self {
        if e.is_terminal() {
            Self::Terminal
        } else {
            Self::Failure
        }
    }
}

impl From<&LoginError> for ExitCode {
    fn from(_: &LoginError) -> Self {
        Self::Failure
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
