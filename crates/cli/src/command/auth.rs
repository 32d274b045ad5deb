// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `botdash login`, `register`, `logout` and `whoami`.

use botdash_session::error::SESSION_EXPIRED_MESSAGE;
use botdash_session::{ApiClient, ClientError, Credentials, Registration, UserProfile};

use crate::error::ExitCode;

#[derive(Debug, clap::Args)]
pub struct LoginArgs {
    #[arg(long, env = "BOTDASH_USERNAME")]
    pub username: String,
    #[arg(long, env = "BOTDASH_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, clap::Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long, env = "BOTDASH_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub email: Option<String>,
}

pub async fn login(client: &ApiClient, args: &LoginArgs) -> ExitCode {
    let creds = Credentials { username: args.username.clone(), password: args.password.clone() };
    match client.controller().login(&creds).await {
        Ok(session) => {
            let name = session.user.as_ref().map_or(args.username.as_str(), |u| u.username.as_str());
            println!("Logged in as {name}.");
            ExitCode::Success
        }
        Err(e) => {
            tracing::debug!(err = %e, "login failed");
            eprintln!("error: {}", e.user_message());
            ExitCode::from(&e)
        }
    }
}

pub async fn register(client: &ApiClient, args: &RegisterArgs) -> ExitCode {
    let registration = Registration {
        username: args.username.clone(),
        password: args.password.clone(),
        email: args.email.clone(),
    };
    match client.controller().register(&registration).await {
        Ok(()) => {
            println!("Registered {}. Log in to continue.", args.username);
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::Failure
        }
    }
}

pub async fn logout(client: &ApiClient) -> ExitCode {
    client.controller().logout().await;
    println!("Logged out.");
    ExitCode::Success
}

pub async fn whoami(client: &ApiClient) -> ExitCode {
    if client.session().is_empty() {
        eprintln!("Not logged in.");
        return ExitCode::Terminal;
    }
    let path = client.config().user_path.clone();
    match client.get_json::<UserProfile>(&path).await {
        Ok(user) => {
            println!("{}", describe_user(&user));
            ExitCode::Success
        }
        Err(e) => report(&e),
    }
}

/// Print a request failure the way every subcommand does.
pub fn report(e: &ClientError) -> ExitCode {
    if e.is_terminal() {
        eprintln!("{SESSION_EXPIRED_MESSAGE}");
        tracing::debug!(err = %e, "session terminated");
    } else {
        eprintln!("error: {e}");
    }
    ExitCode::from(e)
}

pub fn describe_user(user: &UserProfile) -> String {
    match (&user.email, user.id) {
        (Some(email), Some(id)) => format!("{} <{email}> (id {id})", user.username),
        (Some(email), None) => format!("{} <{email}>", user.username),
        (None, Some(id)) => format!("{} (id {id})", user.username),
        (None, None) => user.username.clone(),
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
