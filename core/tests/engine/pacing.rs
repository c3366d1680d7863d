// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Staggering of invocations across endpoints.

use std::future::pending;
use std::time::Duration;

use saber_core::{Bucket, ExitStatus, run};
use tempfile::TempDir;

use crate::common::{FakeConnector, JobScript, test_instance, write_workflow};

fn invocation_gap(connector: &FakeConnector) -> Duration {
    let state = connector.galaxy.state();
    assert_eq!(state.invocations.len(), 2);
    state.invocations[1]
        .at
        .duration_since(state.invocations[0].at)
}

#[tokio::test(start_paused = true)]
async fn next_endpoint_waits_for_jobs_to_start() {
    // Arrange
    let dir = TempDir::new().unwrap();
    write_workflow(dir.path());
    let connector = FakeConnector::default();
    connector
        .galaxy
        .script(
            "None",
            vec![
                JobScript::new("fastqc")
                    .at(30, "queued")
                    .at(40, "ok")
                    .exit_code(0),
            ],
        )
        .script("pulsar_eu", vec![JobScript::succeeds_after(10)]);
    let instance = test_instance("Main", dir.path(), &["None", "pulsar_eu"]);

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    assert_eq!(report.status, ExitStatus::Success);
    assert_eq!(invocation_gap(&connector), Duration::from_secs(30));
    let state = connector.galaxy.state();
    assert_eq!(state.invocations[0].routing, "None");
    assert_eq!(state.invocations[1].routing, "pulsar_eu");
}

#[tokio::test(start_paused = true)]
async fn warm_up_is_bounded_by_half_the_job_timeout() {
    // Arrange
    let dir = TempDir::new().unwrap();
    write_workflow(dir.path());
    let connector = FakeConnector::default();
    connector
        .galaxy
        .script("None", vec![JobScript::stuck("new")])
        .script("pulsar_eu", vec![JobScript::succeeds_after(10)]);
    let mut instance = test_instance("Main", dir.path(), &["None", "pulsar_eu"]);
    instance.job_timeout = Duration::from_secs(40);

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    let gap = invocation_gap(&connector);
    assert!(gap <= Duration::from_secs(20), "gap was {gap:?}");
    assert!(gap >= Duration::from_secs(15), "gap was {gap:?}");

    assert_eq!(report.status, ExitStatus::Timeout);
    let stuck = report.results.endpoint("Main", "Default").unwrap();
    assert_eq!(stuck.bucket(Bucket::New).len(), 1);
    let done = report.results.endpoint("Main", "pulsar_eu").unwrap();
    assert_eq!(done.bucket(Bucket::Successful).len(), 1);
}
