// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Whole runs over one or more instances.

use std::collections::HashSet;
use std::future::pending;
use std::time::Duration;

use saber_core::{Bucket, ExitStatus, RetentionPolicy, run};
use tempfile::TempDir;

use crate::common::{FakeConnector, JobScript, test_instance, write_workflow};

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_workflow(dir.path());
    dir
}

#[tokio::test(start_paused = true)]
async fn run_all_jobs_succeed() {
    // Arrange
    let dir = workspace();
    let connector = FakeConnector::default();
    connector
        .galaxy
        .script("None", vec![JobScript::succeeds_after(20)])
        .script("pulsar_eu", vec![JobScript::succeeds_after(30)]);
    let instance = test_instance("Main", dir.path(), &["None", "pulsar_eu"]);

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    assert_eq!(report.status, ExitStatus::Success);
    assert!(!report.interrupted);
    for endpoint in ["Default", "pulsar_eu"] {
        let jobs = report.results.endpoint("Main", endpoint).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs.bucket(Bucket::Successful).len(), 1);
        let record = jobs.bucket(Bucket::Successful).values().next().unwrap();
        assert!(record.problems.is_none());
    }

    let state = connector.galaxy.state();
    assert!(state.histories.is_empty(), "history should be purged");
    assert!(state.workflows.is_empty());
    assert_eq!(state.deleted_workflows.len(), 1);
    assert_eq!(state.routing(), "None");
    assert_eq!(state.routing_updates, ["None", "pulsar_eu", "None"]);
    assert_eq!(state.uploads.len(), 1);

    let mut tags: Vec<_> = state.tags.iter().map(|(_, tags)| tags.clone()).collect();
    tags.sort();
    assert_eq!(tags, [vec!["Default".to_string()], vec!["pulsar_eu".to_string()]]);
}

#[tokio::test(start_paused = true)]
async fn run_reports_failed_jobs() {
    // Arrange
    let dir = workspace();
    let connector = FakeConnector::default();
    connector.galaxy.script(
        "pulsar_eu",
        vec![JobScript::succeeds_after(10), JobScript::fails_after(15)],
    );
    let instance = test_instance("Main", dir.path(), &["pulsar_eu"]);

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    assert_eq!(report.status, ExitStatus::JobFailure);
    let jobs = report.results.endpoint("Main", "pulsar_eu").unwrap();
    assert_eq!(jobs.bucket(Bucket::Successful).len(), 1);
    assert_eq!(jobs.bucket(Bucket::Failed).len(), 1);
    let failed = jobs.bucket(Bucket::Failed).values().next().unwrap();
    assert!(failed.problems.is_some());

    let state = connector.galaxy.state();
    assert_eq!(state.histories.len(), 1, "history kept for inspection");
    assert!(state.workflows.is_empty());
    assert!(
        state
            .tags
            .iter()
            .any(|(_, tags)| *tags == ["pulsar_eu".to_string(), "err".to_string()])
    );
}

#[tokio::test(start_paused = true)]
async fn run_reports_unfinished_jobs_at_timeout() {
    // Arrange
    let dir = workspace();
    let connector = FakeConnector::default();
    connector.galaxy.script(
        "None",
        vec![JobScript::stuck("queued"), JobScript::stuck("running")],
    );
    let mut instance = test_instance("Main", dir.path(), &["None"]);
    instance.job_timeout = Duration::from_secs(30);

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    assert_eq!(report.status, ExitStatus::Timeout);
    let jobs = report.results.endpoint("Main", "Default").unwrap();
    assert_eq!(jobs.bucket(Bucket::Queued).len(), 1);
    assert_eq!(jobs.bucket(Bucket::Running).len(), 1);

    let state = connector.galaxy.state();
    let mut tags: Vec<_> = state.tags.iter().map(|(_, tags)| tags.join(",")).collect();
    tags.sort();
    assert_eq!(
        tags,
        [
            "Default",
            "Default",
            "Default,saber_queued",
            "Default,saber_running"
        ]
    );
    assert_eq!(state.histories.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn run_purges_successful_outputs() {
    // Arrange
    let dir = workspace();
    let connector = FakeConnector::default();
    connector.galaxy.script(
        "None",
        vec![JobScript::succeeds_after(10), JobScript::fails_after(10)],
    );
    let mut instance = test_instance("Main", dir.path(), &["None"]);
    instance.retention = RetentionPolicy::SuccessfulOnly;

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    assert_eq!(report.status, ExitStatus::JobFailure);
    let jobs = report.results.endpoint("Main", "Default").unwrap();
    let succeeded = jobs.bucket(Bucket::Successful).keys().next().unwrap();
    let failed = jobs.bucket(Bucket::Failed).keys().next().unwrap();

    let state = connector.galaxy.state();
    assert_eq!(state.cancelled, [succeeded.clone()]);
    assert_eq!(state.purged_datasets, [format!("{succeeded}-out")]);
    drop(state);
    assert_eq!(
        connector.galaxy.tags_of(&format!("{succeeded}-out")),
        [vec!["Default".to_string()]]
    );
    assert_eq!(
        connector.galaxy.tags_of(&format!("{failed}-out")),
        [vec!["Default".to_string()], vec!["Default".to_string(), "err".to_string()]]
    );
}

#[tokio::test(start_paused = true)]
async fn failure_is_reported_under_its_own_endpoint() {
    // Arrange
    let dir = workspace();
    let connector = FakeConnector::default();
    connector
        .galaxy
        .script("pulsar_a", vec![JobScript::fails_after(10)])
        .script("pulsar_b", vec![JobScript::succeeds_after(10)]);
    let instance = test_instance("Main", dir.path(), &["pulsar_a", "pulsar_b"]);

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    assert_eq!(report.status, ExitStatus::JobFailure);
    let a = report.results.endpoint("Main", "pulsar_a").unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a.bucket(Bucket::Failed).len(), 1);
    assert!(a.bucket(Bucket::Successful).is_empty());
    let b = report.results.endpoint("Main", "pulsar_b").unwrap();
    assert_eq!(b.len(), 1);
    assert_eq!(b.bucket(Bucket::Successful).len(), 1);
    assert!(b.bucket(Bucket::Failed).is_empty());

    let failed = a.bucket(Bucket::Failed).keys().next().unwrap();
    let succeeded = b.bucket(Bucket::Successful).keys().next().unwrap();
    assert!(failed.starts_with(&connector.galaxy.state().invocations[0].id));
    assert!(succeeded.starts_with(&connector.galaxy.state().invocations[1].id));
}

#[tokio::test(start_paused = true)]
async fn outputs_are_tagged_when_jobs_are_first_seen() {
    // Arrange
    let dir = workspace();
    let connector = FakeConnector::default();
    connector
        .galaxy
        .script("pulsar_eu", vec![JobScript::succeeds_after(1000)]);
    let mut instance = test_instance("Main", dir.path(), &["pulsar_eu"]);
    instance.job_timeout = Duration::from_secs(2000);

    // Act
    let interrupt = tokio::time::sleep(Duration::from_secs(50));
    let report = run(&connector, &[instance], interrupt).await;

    // Assert
    assert!(report.interrupted);
    let invocation = connector.galaxy.state().invocations[0].id.clone();
    assert_eq!(
        connector.galaxy.tags_of(&format!("{invocation}-job0-out")),
        [vec!["pulsar_eu".to_string()]],
        "tagged once while still running"
    );
}

#[tokio::test(start_paused = true)]
async fn every_job_lands_in_exactly_one_bucket() {
    // Arrange
    let dir = workspace();
    let connector = FakeConnector::default();
    connector.galaxy.script(
        "None",
        vec![
            JobScript::succeeds_after(10),
            JobScript::fails_after(10),
            JobScript::stuck("running"),
            JobScript::stuck("waiting"),
            JobScript::stuck("new"),
        ],
    );
    let mut instance = test_instance("Main", dir.path(), &["None"]);
    instance.job_timeout = Duration::from_secs(60);

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    let jobs = report.results.endpoint("Main", "Default").unwrap();
    let mut seen = HashSet::new();
    for bucket in Bucket::ALL {
        for id in jobs.bucket(bucket).keys() {
            assert!(seen.insert(id.clone()), "{id} classified twice");
        }
    }
    assert_eq!(seen.len(), 5);
    assert_eq!(jobs.bucket(Bucket::New).len(), 1);
    assert_eq!(jobs.bucket(Bucket::Waiting).len(), 1);
    assert_eq!(report.status, ExitStatus::JobFailure);
}

#[tokio::test(start_paused = true)]
async fn report_lists_every_bucket() {
    // Arrange
    let dir = workspace();
    let connector = FakeConnector::default();
    connector.galaxy.script("None", vec![JobScript::succeeds_after(10)]);
    let instance = test_instance("Main", dir.path(), &["None"]);

    // Act
    let report = run(&connector, &[instance], pending()).await;
    let json = serde_json::to_value(&report.results).unwrap();

    // Assert
    let endpoint = json["Main"]["Default"].as_object().unwrap();
    let mut keys: Vec<_> = endpoint.keys().cloned().collect();
    keys.sort();
    assert_eq!(
        keys,
        [
            "FAILED_JOBS",
            "NEW_JOBS",
            "QUEUED_JOBS",
            "RUNNING_JOBS",
            "SUCCESSFUL_JOBS",
            "WAITING_JOBS"
        ]
    );
    let job = endpoint["SUCCESSFUL_JOBS"].as_object().unwrap().values().next().unwrap();
    assert!(job.get("INFO").is_some());
    assert!(job.get("METRICS").is_some());
    assert!(job.get("PROBLEMS").is_none());
}

#[tokio::test(start_paused = true)]
async fn endpoint_that_cannot_be_invoked_is_skipped() {
    // Arrange
    let dir = workspace();
    let connector = FakeConnector::default();
    connector
        .galaxy
        .script("None", vec![JobScript::succeeds_after(10)]);
    connector
        .galaxy
        .state()
        .fail_invoke_for
        .insert("pulsar_down".to_string());
    let instance = test_instance("Main", dir.path(), &["pulsar_down", "None"]);

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    assert_eq!(report.status, ExitStatus::Success);
    assert!(report.results.endpoint("Main", "pulsar_down").unwrap().is_empty());
    assert_eq!(
        report
            .results
            .endpoint("Main", "Default")
            .unwrap()
            .bucket(Bucket::Successful)
            .len(),
        1
    );
    assert_eq!(connector.galaxy.state().invocations.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn interrupt_cleans_up_and_stops() {
    // Arrange
    let dir = workspace();
    let connector = FakeConnector::default();
    connector
        .galaxy
        .script("pulsar_eu", vec![JobScript::succeeds_after(1000)]);
    let mut first = test_instance("Main", dir.path(), &["pulsar_eu"]);
    first.job_timeout = Duration::from_secs(2000);
    let second = test_instance("Second", dir.path(), &["pulsar_eu"]);

    // Act
    let interrupt = tokio::time::sleep(Duration::from_secs(50));
    let report = run(&connector, &[first, second], interrupt).await;

    // Assert
    assert!(report.interrupted);
    assert!(report.results.is_empty());
    let state = connector.galaxy.state();
    assert_eq!(state.invocations.len(), 1, "second instance never started");
    assert!(state.histories.is_empty());
    assert!(state.workflows.is_empty());
    assert_eq!(state.routing(), "None");
}

#[tokio::test(start_paused = true)]
async fn unreachable_instance_is_skipped() {
    // Arrange
    let dir = workspace();
    let mut connector = FakeConnector::default();
    connector.unreachable.insert("Broken".to_string());
    connector
        .galaxy
        .script("None", vec![JobScript::succeeds_after(10)]);
    let broken = test_instance("Broken", dir.path(), &["None"]);
    let main = test_instance("Main", dir.path(), &["None"]);

    // Act
    let report = run(&connector, &[broken, main], pending()).await;

    // Assert
    assert_eq!(report.status, ExitStatus::Connection);
    assert!(report.results.instance("Broken").is_none());
    assert!(report.results.instance("Main").is_some());
}

#[tokio::test(start_paused = true)]
async fn missing_workflow_aborts_instance_with_path_status() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let connector = FakeConnector::default();
    let instance = test_instance("Main", dir.path(), &["None"]);

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    assert_eq!(report.status, ExitStatus::Path);
    assert!(report.results.is_empty());
    let state = connector.galaxy.state();
    assert!(state.histories.is_empty(), "history created in setup is purged");
    assert!(state.uploads.is_empty());
    assert!(state.invocations.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_input_label_aborts_instance() {
    // Arrange
    let dir = workspace();
    let connector = FakeConnector::default();
    connector.galaxy.state().input_labels = vec!["other".to_string()];
    let instance = test_instance("Main", dir.path(), &["None"]);

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    assert_eq!(report.status, ExitStatus::Connection);
    let state = connector.galaxy.state();
    assert!(state.workflows.is_empty());
    assert!(state.histories.is_empty());
}
