// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::store::StoredCredentials;

/// Identity record returned by the identity endpoint, cached after login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Any other fields the backend sends back.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The authenticated session as published by the
/// [`SessionController`](crate::SessionController).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
    /// Incremented on every fresh login, local or observed from another
    /// context sharing the credential store.
    pub epoch: u64,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }

    pub(crate) fn from_stored(stored: StoredCredentials, epoch: u64) -> Self {
        Self {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            user: stored.user,
            epoch,
        }
    }

    pub(crate) fn to_stored(&self) -> StoredCredentials {
        StoredCredentials {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            user: self.user.clone(),
        }
    }
}

/// Read-only view of the published session.
///
/// Handed to the dispatcher so it can attach the current token without
/// reaching into the controller.
#[derive(Debug, Clone)]
pub struct SessionReader {
    rx: watch::Receiver<Session>,
}

impl SessionReader {
    pub fn new(rx: watch::Receiver<Session>) -> Self {
        Self { rx }
    }

    pub fn access_token(&self) -> Option<String> {
        self.rx.borrow().access_token.clone()
    }

    pub fn snapshot(&self) -> Session {
        self.rx.borrow().clone()
    }

    /// A fresh receiver for observers (UI layer) that want change notifications.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.rx.clone()
    }
}
