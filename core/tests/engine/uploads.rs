// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Waiting for uploaded inputs before invoking.

use std::future::pending;
use std::time::Duration;

use saber_core::{Bucket, ExitStatus, run};
use tempfile::TempDir;
use tokio::time::Instant;

use crate::common::{FakeConnector, JobScript, test_instance, write_workflow};

fn connector(upload: &[(u64, &str)]) -> FakeConnector {
    let connector = FakeConnector::default();
    connector
        .galaxy
        .upload_timeline(upload)
        .script("None", vec![JobScript::succeeds_after(10)]);
    connector
}

fn first_invocation_after(connector: &FakeConnector, start: Instant) -> Duration {
    connector.galaxy.state().invocations[0].at.duration_since(start)
}

#[tokio::test(start_paused = true)]
async fn slow_upload_delays_the_first_invocation() {
    // Arrange
    let dir = TempDir::new().unwrap();
    write_workflow(dir.path());
    let connector = connector(&[(0, "queued"), (8, "running"), (20, "ok")]);
    let instance = test_instance("Main", dir.path(), &["None"]);
    let start = Instant::now();

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    assert_eq!(first_invocation_after(&connector, start), Duration::from_secs(20));
    assert_eq!(report.status, ExitStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn failed_upload_ends_the_wait() {
    // Arrange
    let dir = TempDir::new().unwrap();
    write_workflow(dir.path());
    let connector = connector(&[(0, "queued"), (10, "error")]);
    let instance = test_instance("Main", dir.path(), &["None"]);
    let start = Instant::now();

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    assert_eq!(first_invocation_after(&connector, start), Duration::from_secs(10));
    let jobs = report.results.endpoint("Main", "Default").unwrap();
    assert_eq!(jobs.bucket(Bucket::Successful).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stuck_upload_gives_up_at_the_upload_timeout() {
    // Arrange
    let dir = TempDir::new().unwrap();
    write_workflow(dir.path());
    let connector = connector(&[(0, "queued")]);
    let instance = test_instance("Main", dir.path(), &["None"]);
    let start = Instant::now();

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    // last check at 55s, the next one would overshoot 60s
    assert_eq!(first_invocation_after(&connector, start), Duration::from_secs(60));
    let jobs = report.results.endpoint("Main", "Default").unwrap();
    assert_eq!(jobs.bucket(Bucket::Successful).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn each_instance_waits_for_its_own_upload() {
    // Arrange
    let dir = TempDir::new().unwrap();
    write_workflow(dir.path());
    let connector = connector(&[(0, "queued"), (15, "ok")]);
    let first = test_instance("First", dir.path(), &["None"]);
    let second = test_instance("Second", dir.path(), &["None"]);
    let start = Instant::now();

    // Act
    run(&connector, &[first, second], pending()).await;

    // Assert
    let state = connector.galaxy.state();
    assert_eq!(state.datasets.len(), 2);
    assert_ne!(state.datasets[0].history_id, state.datasets[1].history_id);
    let second_upload = state.datasets[1].at.duration_since(start);
    let second_invocation = state.invocations[1].at.duration_since(start);
    assert_eq!(second_invocation - second_upload, Duration::from_secs(15));
}
