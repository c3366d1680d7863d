// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Polling of remote state: uploads, job start and job completion.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use saber_galaxy::{GalaxyError, JobState};
use tokio::time::{Instant, sleep};

use crate::config::Endpoint;
use crate::remote::ExecutionService;
use crate::tagger::Tagger;

/// A condition checked repeatedly by [`Wait::until`].
#[async_trait]
pub trait Probe: Send {
    /// Checks the condition once.
    async fn ready(&mut self) -> Result<bool, GalaxyError>;
}

/// A bounded wait: check, sleep `interval`, check again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait {
    /// Total time budget.
    pub timeout: Duration,
    /// Time between checks.
    pub interval: Duration,
}

impl Wait {
    /// Creates a wait.
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Polls `probe` until it is ready, returning `false` once the next sleep
    /// would overshoot the timeout. `message` is logged on timeout.
    ///
    /// # Errors
    ///
    /// Propagates the first remote error raised by the probe.
    pub async fn until<P>(&self, probe: &mut P, message: &str) -> Result<bool, GalaxyError>
    where
        P: Probe + ?Sized,
    {
        let start = Instant::now();
        loop {
            if start.elapsed() + self.interval > self.timeout {
                tracing::error!("{message}");
                return Ok(false);
            }
            if probe.ready().await? {
                return Ok(true);
            }
            sleep(self.interval).await;
        }
    }
}

/// Ready once every dataset of a history left the uploading states.
///
/// A dataset that failed ends the wait too, the failure is logged.
#[derive(Debug)]
pub struct UploadProbe<'a, S: ?Sized> {
    service: &'a S,
    history_id: &'a str,
}

impl<'a, S: ExecutionService + ?Sized> UploadProbe<'a, S> {
    /// Creates a probe for the datasets of `history_id`.
    pub fn new(service: &'a S, history_id: &'a str) -> Self {
        Self {
            service,
            history_id,
        }
    }
}

#[async_trait]
impl<S: ExecutionService + ?Sized> Probe for UploadProbe<'_, S> {
    async fn ready(&mut self) -> Result<bool, GalaxyError> {
        for dataset in self.service.list_datasets(self.history_id).await? {
            let state = self.service.dataset_state(&dataset.id).await?;
            if state.is_failed() {
                tracing::warn!(dataset = %dataset.id, %state, "dataset is in terminal state");
                tracing::error!(dataset = %dataset.id, "upload of dataset failed");
                return Ok(true);
            }
            if !state.is_terminal() {
                tracing::info!(dataset = %dataset.id, %state, "dataset is in non-terminal state");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Ready once every job of one invocation has left `new`.
///
/// Outputs of every job seen are tagged with the endpoint.
#[derive(Debug)]
pub struct WarmupProbe<'a, 'b, S: ?Sized> {
    tagger: &'b mut Tagger<'a, S>,
    endpoint: &'b Endpoint,
    invocation_id: &'b str,
}

impl<'a, 'b, S: ExecutionService + ?Sized> WarmupProbe<'a, 'b, S> {
    /// Creates a probe for the jobs `endpoint` runs for `invocation_id`.
    pub fn new(
        tagger: &'b mut Tagger<'a, S>,
        endpoint: &'b Endpoint,
        invocation_id: &'b str,
    ) -> Self {
        Self {
            tagger,
            endpoint,
            invocation_id,
        }
    }
}

#[async_trait]
impl<S: ExecutionService + ?Sized> Probe for WarmupProbe<'_, '_, S> {
    async fn ready(&mut self) -> Result<bool, GalaxyError> {
        let jobs = self.tagger.service().list_jobs(self.invocation_id).await?;
        if jobs.is_empty() {
            return Ok(false);
        }

        let mut started = true;
        for job in &jobs {
            tracing::info!(
                job = %job.id,
                state = %job.state,
                tool = job.short_tool_id(),
                "job state"
            );
            self.tagger.tag(self.endpoint, &job.id, None).await;
            started &= job.state.has_started();
        }
        Ok(started)
    }
}

/// Ready once the jobs of every pending invocation are terminal.
///
/// Endpoints whose jobs all finished leave the pending set. Job states are
/// logged when first seen and on every change, outputs are tagged with the
/// endpoint when first seen.
#[derive(Debug)]
pub struct DrainProbe<'a, 'b, S: ?Sized> {
    tagger: &'b mut Tagger<'a, S>,
    pending: Vec<(Endpoint, String)>,
    seen: HashMap<String, JobState>,
}

impl<'a, 'b, S: ExecutionService + ?Sized> DrainProbe<'a, 'b, S> {
    /// Creates a probe over `(endpoint, invocation id)` pairs.
    pub fn new(tagger: &'b mut Tagger<'a, S>, pending: Vec<(Endpoint, String)>) -> Self {
        Self {
            tagger,
            pending,
            seen: HashMap::new(),
        }
    }
}

#[async_trait]
impl<S: ExecutionService + ?Sized> Probe for DrainProbe<'_, '_, S> {
    async fn ready(&mut self) -> Result<bool, GalaxyError> {
        let mut still_pending = Vec::with_capacity(self.pending.len());
        for (endpoint, invocation_id) in std::mem::take(&mut self.pending) {
            let jobs = self.tagger.service().list_jobs(&invocation_id).await?;

            let mut done = !jobs.is_empty();
            for job in &jobs {
                if self.seen.get(&job.id) != Some(&job.state) {
                    tracing::info!(
                        %endpoint,
                        job = %job.id,
                        state = %job.state,
                        tool = job.short_tool_id(),
                        "job state"
                    );
                    self.seen.insert(job.id.clone(), job.state.clone());
                }
                self.tagger.tag(&endpoint, &job.id, None).await;
                done &= job.state.is_terminal();
            }

            if done {
                tracing::info!(%endpoint, "all jobs finished");
            } else {
                still_pending.push((endpoint, invocation_id));
            }
        }

        self.pending = still_pending;
        Ok(self.pending.is_empty())
    }
}
