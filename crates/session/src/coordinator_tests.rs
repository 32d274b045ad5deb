// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn lost_flight_is_not_terminal() {
    let (resume, rx) = oneshot::channel::<Resolution>();
    drop(resume);

    let result = await_resolution(rx).await;
    assert!(matches!(result, Err(ClientError::Other(OtherError::Abandoned))));
}

#[tokio::test]
async fn resolution_passes_through() {
    let (resume, rx) = oneshot::channel::<Resolution>();
    let _ = resume.send(Err(TerminalReason::SessionEnded.into()));

    let result = await_resolution(rx).await;
    assert!(matches!(result, Err(ClientError::Terminal(TerminalReason::SessionEnded))));
}

#[test]
fn phase_names() {
    assert_eq!(Phase::Idle.as_str(), "idle");
    assert_eq!(Phase::Refreshing.as_str(), "refreshing");
    assert_eq!(Phase::Failed.as_str(), "failed");
}
