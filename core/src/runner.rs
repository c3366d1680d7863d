// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::pin::{Pin, pin};

use jiff::Zoned;
use tracing::Instrument;

use crate::config::InstanceConfig;
use crate::outcome::{ExitStatus, InstanceResults, RunResults};
use crate::remote::Connector;
use crate::session::{Session, SessionError};

/// Everything a run produced.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct RunReport {
    /// Classified jobs of every instance that completed.
    pub results: RunResults,

    /// Worst outcome of the run.
    pub status: ExitStatus,

    /// Whether the run was cut short by `interrupt`.
    pub interrupted: bool,
}

/// Runs the workflow on every instance, one after another.
///
/// A failing instance is cleaned up and skipped. When `interrupt` resolves the
/// current instance is cleaned up and the run stops with what it has.
pub async fn run<C, I>(connector: &C, instances: &[InstanceConfig], interrupt: I) -> RunReport
where
    C: Connector,
    I: Future<Output = ()>,
{
    let mut interrupt = pin!(interrupt);
    let mut report = RunReport::default();

    for instance in instances {
        let span = tracing::info_span!("instance", instance = %instance.name);
        let interrupted = run_instance(connector, instance, interrupt.as_mut(), &mut report)
            .instrument(span)
            .await;
        if interrupted {
            report.interrupted = true;
            break;
        }
    }

    report.status = report.status.max(report.results.status());
    tracing::info!(status = ?report.status, interrupted = report.interrupted, "run finished");
    report
}

/// Returns whether the run was interrupted.
async fn run_instance<C, I>(
    connector: &C,
    instance: &InstanceConfig,
    interrupt: Pin<&mut I>,
    report: &mut RunReport,
) -> bool
where
    C: Connector,
    I: Future<Output = ()>,
{
    tracing::info!(url = %instance.url, "starting tests");
    let mut session = None;
    let outcome = tokio::select! {
        biased;
        () = interrupt => None,
        res = drive(connector, instance, &mut session) => Some(res),
    };

    match outcome {
        Some(Ok(results)) => {
            report.results.merge_instance(&instance.name, results);
            if let Some(session) = session.as_mut() {
                if let Err(e) = session.clean_up().await {
                    tracing::warn!(error = %e, "clean-up failed");
                }
                if let Err(e) = session.restore_routing().await {
                    tracing::warn!(error = %e, "failed to restore compute endpoint");
                }
            }
            tracing::info!("tests completed");
            false
        }
        Some(Err(e)) => {
            tracing::error!(error = %e, "tests failed, skipping instance");
            report.status = report.status.max(e.exit_status());
            if let Some(session) = session.as_mut() {
                session.clean_up_after_failure().await;
            }
            false
        }
        None => {
            tracing::warn!("interrupted, cleaning up");
            if let Some(session) = session.as_mut() {
                session.clean_up_after_failure().await;
            }
            true
        }
    }
}

async fn drive<C: Connector>(
    connector: &C,
    instance: &InstanceConfig,
    slot: &mut Option<Session<C::Service>>,
) -> Result<InstanceResults, SessionError> {
    let service = connector.connect(instance).await?;
    let session = slot.insert(Session::new(service, instance.clone(), Zoned::now()));
    let inputs = session.setup().await?;
    session.invoke_and_monitor(&inputs).await
}
