// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! History purging, retention, routing and tagging.

use std::future::pending;
use std::time::Duration;

use jiff::civil::date;
use saber_core::{Bucket, Endpoint, ExitStatus, RetentionPolicy, Session, run};
use serde_json::Value;
use tempfile::TempDir;

use crate::common::{
    FakeConnector, FakeGalaxy, JobScript, fixed_now, test_instance, write_workflow,
};

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_workflow(dir.path());
    dir
}

#[tokio::test]
async fn purge_removes_old_test_histories_only() {
    // Arrange
    let dir = workspace();
    let galaxy = FakeGalaxy::new();
    galaxy.add_history("SABER 1/10/26 09:00", date(2026, 10, 1).at(9, 0, 0, 0), false);
    galaxy.add_history("SABER 17/10/26 09:00", date(2026, 10, 17).at(9, 0, 0, 0), false);
    galaxy.add_history("old saber run", date(2026, 9, 1).at(0, 0, 0, 0), false);
    galaxy.add_history("Unrelated analysis", date(2026, 1, 1).at(0, 0, 0, 0), false);
    let instance = test_instance("Main", dir.path(), &["None"]);
    let session = Session::new(galaxy.clone(), instance, fixed_now());

    // Act
    session.purge_histories().await.unwrap();

    // Assert
    assert_eq!(
        galaxy.history_names(),
        ["SABER 17/10/26 09:00", "Unrelated analysis"]
    );
}

#[tokio::test]
async fn purge_skips_immutable_histories() {
    // Arrange
    let dir = workspace();
    let galaxy = FakeGalaxy::new();
    galaxy.add_history("SABER 1/9/26 10:00", date(2026, 9, 1).at(10, 0, 0, 0), true);
    galaxy.add_history("SABER 2/9/26 10:00", date(2026, 9, 2).at(10, 0, 0, 0), false);
    let instance = test_instance("Main", dir.path(), &["None"]);
    let session = Session::new(galaxy.clone(), instance, fixed_now());

    // Act
    let result = session.purge_histories().await;

    // Assert
    assert!(result.is_ok());
    assert_eq!(galaxy.history_names(), ["SABER 1/9/26 10:00"]);
}

#[tokio::test]
async fn purge_with_empty_base_name_only_removes_same_name() {
    // Arrange
    let dir = workspace();
    let galaxy = FakeGalaxy::new();
    let mut instance = test_instance("Main", dir.path(), &["None"]);
    instance.history_name = "2026".to_string();
    galaxy.add_history("2026 archive", date(2025, 1, 1).at(0, 0, 0, 0), false);
    galaxy.add_history("1/1/25", date(2025, 1, 1).at(0, 0, 0, 0), false);
    galaxy.add_history("2026 19/10/26 12:00", date(2026, 10, 19).at(12, 0, 0, 0), false);
    let session = Session::new(galaxy.clone(), instance, fixed_now());
    assert_eq!(session.history_name(), "2026 19/10/26 12:00");

    // Act
    session.purge_histories().await.unwrap();

    // Assert
    assert_eq!(galaxy.history_names(), ["2026 archive", "1/1/25"]);
}

#[tokio::test(start_paused = true)]
async fn retention_never_keeps_history() {
    // Arrange
    let dir = workspace();
    let connector = FakeConnector::default();
    connector
        .galaxy
        .script("None", vec![JobScript::succeeds_after(10)]);
    let mut instance = test_instance("Main", dir.path(), &["None"]);
    instance.retention = RetentionPolicy::Never;

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    assert_eq!(report.status, ExitStatus::Success);
    let state = connector.galaxy.state();
    assert_eq!(state.histories.len(), 1);
    assert!(state.workflows.is_empty(), "workflow is always purged");
}

#[tokio::test(start_paused = true)]
async fn retention_always_purges_failed_history() {
    // Arrange
    let dir = workspace();
    let connector = FakeConnector::default();
    connector
        .galaxy
        .script("None", vec![JobScript::fails_after(10)]);
    let mut instance = test_instance("Main", dir.path(), &["None"]);
    instance.retention = RetentionPolicy::Always;

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    assert_eq!(report.status, ExitStatus::JobFailure);
    assert!(connector.galaxy.state().histories.is_empty());
}

#[tokio::test]
async fn tagging_without_marker_is_idempotent() {
    // Arrange
    let dir = workspace();
    let galaxy = FakeGalaxy::new();
    let instance = test_instance("Main", dir.path(), &["None"]);
    let mut session = Session::new(galaxy.clone(), instance, fixed_now());
    session.setup().await.unwrap();
    let endpoint = Endpoint::from("pulsar_eu");

    // Act
    let first = session.tag_job(&endpoint, "job-1", None).await;
    let second = session.tag_job(&endpoint, "job-1", None).await;
    let marked = session.tag_job(&endpoint, "job-1", Some("err")).await;

    // Assert
    assert!(first);
    assert!(!second);
    assert!(marked);
    assert_eq!(
        galaxy.tags_of("job-1-out"),
        [vec!["pulsar_eu".to_string()], vec!["pulsar_eu".to_string(), "err".to_string()]]
    );
}

#[tokio::test(start_paused = true)]
async fn unfinished_jobs_mark_the_session_as_failed() {
    // Arrange
    let dir = workspace();
    let galaxy = FakeGalaxy::new();
    galaxy.script("None", vec![JobScript::stuck("running")]);
    let mut instance = test_instance("Main", dir.path(), &["None"]);
    instance.job_timeout = Duration::from_secs(30);
    let mut session = Session::new(galaxy.clone(), instance, fixed_now());
    let inputs = session.setup().await.unwrap();
    assert!(!session.had_errors());

    // Act
    let results = session.invoke_and_monitor(&inputs).await.unwrap();

    // Assert
    assert!(session.had_errors());
    let running = results["Default"].bucket(Bucket::Running);
    assert_eq!(running.len(), 1);
    let job = running.keys().next().unwrap();
    assert_eq!(
        galaxy.tags_of(&format!("{job}-out")),
        [vec!["Default".to_string()], vec!["Default".to_string(), "saber_running".to_string()]]
    );
}

#[tokio::test(start_paused = true)]
async fn tag_failure_does_not_fail_the_run() {
    // Arrange
    let dir = workspace();
    let connector = FakeConnector::default();
    connector
        .galaxy
        .script("None", vec![JobScript::succeeds_after(10)]);
    connector.galaxy.state().fail_tagging = true;
    let instance = test_instance("Main", dir.path(), &["None"]);

    // Act
    let report = run(&connector, &[instance], pending()).await;

    // Assert
    assert_eq!(report.status, ExitStatus::Success);
    assert!(connector.galaxy.state().tags.is_empty());
}

#[tokio::test]
async fn switching_routing_keeps_other_preferences() {
    // Arrange
    let dir = workspace();
    let galaxy = FakeGalaxy::new();
    galaxy
        .state()
        .extra_preferences
        .insert("theme".to_string(), Value::String("dark".to_string()));
    let instance = test_instance("Main", dir.path(), &["None", "pulsar_eu"]);
    let session = Session::new(galaxy.clone(), instance, fixed_now());

    // Act
    session
        .switch_routing(&Endpoint::from("pulsar_eu"))
        .await
        .unwrap();
    session
        .switch_routing(&Endpoint::from("pulsar_eu"))
        .await
        .unwrap();
    session.restore_routing().await.unwrap();

    // Assert
    let state = galaxy.state();
    assert_eq!(state.routing_updates, ["pulsar_eu", "None"]);
    assert_eq!(state.extra_preferences["theme"], "dark");
}

#[tokio::test]
async fn local_upload_routes_to_default_first() {
    // Arrange
    let dir = workspace();
    let galaxy = FakeGalaxy::new();
    let mut instance = test_instance("Main", dir.path(), &["pulsar_eu"]);
    instance.local_upload = true;
    let mut session = Session::new(galaxy.clone(), instance, fixed_now());
    session
        .switch_routing(&Endpoint::from("pulsar_eu"))
        .await
        .unwrap();

    // Act
    let inputs = session.setup().await.unwrap();

    // Assert
    assert_eq!(galaxy.state().routing(), "None");
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs["input-reads"].src, "hda");
    assert!(session.history().is_some());
    assert!(session.workflow().is_some());
}
