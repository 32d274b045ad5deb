// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `botdash request`: send authenticated requests through the client.
//!
//! With `--concurrency N` the request is issued N times at once, which is
//! how a dashboard page fires its calls; a stale token then costs exactly
//! one refresh for the whole batch.

use botdash_session::{ApiClient, ApiRequest, ApiResponse, ClientError};
use reqwest::Method;

use crate::command::auth::report;
use crate::error::ExitCode;

#[derive(Debug, clap::Args)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE).
    pub method: String,
    /// Path relative to the API base URL (e.g. /bots/).
    pub path: String,
    /// JSON request body.
    #[arg(long)]
    pub body: Option<String>,
    /// Extra request header as NAME:VALUE (repeatable).
    #[arg(long = "header", short = 'H')]
    pub headers: Vec<String>,
    /// Number of identical requests to issue concurrently.
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
}

impl RequestArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.build()?;
        if self.concurrency == 0 {
            anyhow::bail!("--concurrency must be at least 1");
        }
        Ok(())
    }

    pub fn build(&self) -> anyhow::Result<ApiRequest> {
        let method = Method::from_bytes(self.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| anyhow::anyhow!("invalid method: {}", self.method))?;
        let mut req = ApiRequest::new(method, self.path.clone());
        if let Some(ref body) = self.body {
            let value: serde_json::Value = serde_json::from_str(body)
                .map_err(|e| anyhow::anyhow!("--body is not valid JSON: {e}"))?;
            req = req.with_body(value);
        }
        for header in &self.headers {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| anyhow::anyhow!("invalid header (expected NAME:VALUE): {header}"))?;
            req = req.with_header(name.trim(), value.trim());
        }
        Ok(req)
    }
}

pub async fn run(client: &ApiClient, args: &RequestArgs) -> ExitCode {
    let req = match args.build() {
        Ok(req) => req,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::Usage;
        }
    };

    let calls = (0..args.concurrency).map(|_| {
        let client = client.clone();
        let req = req.clone();
        async move { client.send(req).await }
    });
    let results = futures_util::future::join_all(calls).await;

    let numbered = args.concurrency > 1;
    let mut exit = ExitCode::Success;
    let mut terminal_reported = false;
    for (i, result) in results.into_iter().enumerate() {
        let prefix = if numbered { format!("[{i}] ") } else { String::new() };
        exit = exit.worst(print_result(&prefix, result, &mut terminal_reported));
    }
    exit
}

fn print_result(
    prefix: &str,
    result: Result<ApiResponse, ClientError>,
    terminal_reported: &mut bool,
) -> ExitCode {
    match result {
        Ok(resp) => {
            println!("{prefix}{}", render_body(&resp));
            ExitCode::Success
        }
        Err(e) if e.is_terminal() => {
            // One expiry message per batch.
            if !*terminal_reported {
                *terminal_reported = true;
                return report(&e);
            }
            ExitCode::from(&e)
        }
        Err(e) => {
            eprint!("{prefix}");
            report(&e)
        }
    }
}

/// Pretty JSON when the body is JSON, raw text otherwise.
pub fn render_body(resp: &ApiResponse) -> String {
    match serde_json::from_slice::<serde_json::Value>(&resp.body) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| resp.text()),
        Err(_) => resp.text(),
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
