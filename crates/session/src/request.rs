// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request and response descriptors.
//!
//! An [`ApiRequest`] is plain data so it can be captured when it fails with
//! a 401 and re-sent verbatim after the token is refreshed.

use bytes::Bytes;
use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::error::OtherError;

/// A request against the backend API, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, e.g. `/bot-operations/`. May carry a
    /// query string.
    pub path: String,
    pub body: Option<serde_json::Value>,
    /// Extra headers. `Authorization` is managed by the dispatcher and is
    /// overwritten if set here.
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), body: None, headers: Vec::new() }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Path without query string, always with a leading slash.
    pub fn route(&self) -> String {
        normalize_route(&self.path)
    }
}

/// Strip the query string and make sure the path starts with `/`.
pub fn normalize_route(path: &str) -> String {
    let route = path.split(['?', '#']).next().unwrap_or_default();
    if route.starts_with('/') {
        route.to_owned()
    } else {
        format!("/{route}")
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    /// Decode the body as JSON. An empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, OtherError> {
        let bytes: &[u8] = if self.body.is_empty() { b"null" } else { &self.body };
        serde_json::from_slice(bytes).map_err(OtherError::Decode)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
