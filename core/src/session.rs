// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use jiff::Zoned;
use jiff::tz::TimeZone;
use saber_galaxy::{DatasetRef, GalaxyError, History, JobSummary, Workflow};
use serde_json::Value;
use tracing::Instrument;

use crate::config::{Endpoint, InstanceConfig};
use crate::monitor::{DrainProbe, UploadProbe, Wait, WarmupProbe};
use crate::outcome::{Bucket, EndpointResults, ExitStatus, InstanceResults, JobRecord};
use crate::remote::ExecutionService;
use crate::tagger::{TagLedger, Tagger};

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The workflow definition was found nowhere.
    #[error("workflow definition not found: {}", .0.display())]
    DefinitionPath(PathBuf),

    /// The workflow definition could not be read or is not JSON.
    #[error("invalid workflow definition {}: {message}", .path.display())]
    InvalidDefinition {
        /// Resolved path of the definition.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// No workflow input carries a configured data input label.
    #[error("workflow has no input labelled `{0}`")]
    MissingInput(String),

    /// An operation needs state that setup creates.
    #[error("no {0} yet, run setup first")]
    NotSetUp(&'static str),

    /// The server could not be reached or answered with an error.
    #[error(transparent)]
    Remote(#[from] GalaxyError),
}

impl SessionError {
    /// The exit status this error calls for.
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::DefinitionPath(_) | Self::InvalidDefinition { .. } => ExitStatus::Path,
            Self::MissingInput(_) | Self::NotSetUp(_) | Self::Remote(_) => ExitStatus::Connection,
        }
    }
}

/// One pass of the workflow over every endpoint of one instance.
///
/// A session owns one history and one uploaded workflow, both resolved by
/// [`Session::clean_up`].
#[derive(Debug)]
pub struct Session<S> {
    service: S,
    config: InstanceConfig,
    started_at: Zoned,
    history_name: String,
    history: Option<History>,
    workflow: Option<Workflow>,
    invocations: Vec<(Endpoint, String)>,
    tagged_jobs: TagLedger,
    had_errors: bool,
}

impl<S: ExecutionService> Session<S> {
    /// Creates a session started at `started_at`, which names the history.
    pub fn new(service: S, config: InstanceConfig, started_at: Zoned) -> Self {
        let history_name = format!(
            "{} {}",
            config.history_name,
            started_at.strftime("%-d/%-m/%y %H:%M")
        );
        Self {
            service,
            config,
            started_at,
            history_name,
            history: None,
            workflow: None,
            invocations: Vec::new(),
            tagged_jobs: TagLedger::new(),
            had_errors: false,
        }
    }

    /// Name of the history this session creates.
    pub fn history_name(&self) -> &str {
        &self.history_name
    }

    /// The history, once created.
    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    /// The uploaded workflow, until purged.
    pub fn workflow(&self) -> Option<&Workflow> {
        self.workflow.as_ref()
    }

    /// Whether any job failed or had not finished at timeout.
    pub fn had_errors(&self) -> bool {
        self.had_errors
    }

    /// Prepares the history: routing, stale history purge, workflow and data upload.
    ///
    /// Returns the workflow inputs, by input id.
    pub async fn setup(&mut self) -> Result<BTreeMap<String, DatasetRef>, SessionError> {
        if self.config.local_upload {
            self.restore_routing().await?;
        }
        self.purge_histories().await?;

        tracing::info!(name = %self.history_name, "creating history");
        let history = self.service.create_history(&self.history_name).await?;
        tracing::info!(history = %history.id, "history created");
        let history_id = history.id.clone();
        self.history = Some(history);

        let workflow_id = self.upload_workflow().await?;

        let mut slots = Vec::with_capacity(self.config.data_inputs.len());
        for label in self.config.data_inputs.keys() {
            let ids = self.service.workflow_input_ids(&workflow_id, label).await?;
            if ids.is_empty() {
                return Err(SessionError::MissingInput(label.clone()));
            }
            slots.push((label, ids));
        }

        let mut inputs = BTreeMap::new();
        for (label, ids) in slots {
            let input = &self.config.data_inputs[label];
            tracing::info!(%label, url = %input.url, "uploading dataset");
            let dataset_id = self
                .service
                .upload_from_url(&history_id, label, &input.url, &input.file_type)
                .await?;
            for id in ids {
                inputs.insert(id, DatasetRef::hda(dataset_id.clone()));
            }
        }

        let wait = Wait::new(self.config.upload_timeout, self.config.upload_interval);
        let mut probe = UploadProbe::new(&self.service, &history_id);
        wait.until(&mut probe, "Upload time exceeded").await?;
        Ok(inputs)
    }

    async fn upload_workflow(&mut self) -> Result<String, SessionError> {
        let path =
            resolve_workflow_path(&self.config.workflow_path, self.config.config_dir.as_deref())
                .await?;

        let invalid = |message: String| SessionError::InvalidDefinition {
            path: path.clone(),
            message,
        };
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| invalid(e.to_string()))?;
        let definition: Value = serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;

        tracing::info!(path = %path.display(), "uploading workflow");
        let workflow = self.service.import_workflow(&definition).await?;
        tracing::info!(workflow = %workflow.id, "workflow uploaded");
        let id = workflow.id.clone();
        self.workflow = Some(workflow);
        Ok(id)
    }

    /// Invokes the workflow once per endpoint, waits for the jobs and classifies them.
    ///
    /// An endpoint whose invocation fails is skipped and reported without jobs.
    pub async fn invoke_and_monitor(
        &mut self,
        inputs: &BTreeMap<String, DatasetRef>,
    ) -> Result<InstanceResults, SessionError> {
        let history_id = self.history_id()?;
        let workflow_id = self
            .workflow
            .as_ref()
            .map(|w| w.id.clone())
            .ok_or(SessionError::NotSetUp("workflow"))?;

        for endpoint in self.config.endpoints.clone() {
            let span = tracing::info_span!("endpoint", %endpoint);
            self.invoke(&endpoint, &workflow_id, &history_id, inputs)
                .instrument(span)
                .await?;
        }

        let drain = Wait::new(self.config.job_timeout, self.config.job_interval);
        tracing::info!("waiting until test jobs finish");
        let mut tagger = Tagger::new(&self.service, &history_id, &mut self.tagged_jobs);
        let mut probe = DrainProbe::new(&mut tagger, self.invocations.clone());
        let message = format!("Timeout {}s expired", drain.timeout.as_secs());
        drain.until(&mut probe, &message).await?;

        let mut results = InstanceResults::new();
        for endpoint in self.config.endpoints.clone() {
            let span = tracing::info_span!("endpoint", %endpoint);
            let jobs = self.classify(&endpoint).instrument(span).await?;
            results
                .entry(endpoint.label().to_string())
                .or_default()
                .merge(jobs);
        }

        self.restore_routing().await?;
        Ok(results)
    }

    async fn invoke(
        &mut self,
        endpoint: &Endpoint,
        workflow_id: &str,
        history_id: &str,
        inputs: &BTreeMap<String, DatasetRef>,
    ) -> Result<(), SessionError> {
        self.switch_routing(endpoint).await?;

        let invocation = match self
            .service
            .invoke_workflow(workflow_id, history_id, inputs)
            .await
        {
            Ok(invocation) => invocation,
            Err(e) => {
                tracing::warn!(error = %e, "failed to invoke workflow, skipping endpoint");
                return Ok(());
            }
        };
        tracing::info!(invocation = %invocation.id, "workflow invoked");
        self.invocations.push((endpoint.clone(), invocation.id.clone()));

        let warmup = Wait::new(self.config.warmup_timeout(), self.config.warmup_interval());
        tracing::info!("waiting until test jobs start before invoking additional ones");
        let mut tagger = Tagger::new(&self.service, history_id, &mut self.tagged_jobs);
        let mut probe = WarmupProbe::new(&mut tagger, endpoint, &invocation.id);
        let message = format!("Not all jobs started in {}s", warmup.timeout.as_secs());
        warmup.until(&mut probe, &message).await?;
        Ok(())
    }

    async fn classify(&mut self, endpoint: &Endpoint) -> Result<EndpointResults, SessionError> {
        let mut results = EndpointResults::default();
        let invocation_id = self
            .invocations
            .iter()
            .find(|(e, _)| e == endpoint)
            .map(|(_, id)| id.clone());
        let Some(invocation_id) = invocation_id else {
            return Ok(results);
        };

        for job in self.service.list_jobs(&invocation_id).await? {
            let (bucket, record) = self.classify_job(endpoint, &job).await?;
            results.insert(bucket, job.id, record);
        }
        Ok(results)
    }

    async fn classify_job(
        &mut self,
        endpoint: &Endpoint,
        job: &JobSummary,
    ) -> Result<(Bucket, JobRecord), SessionError> {
        let bucket = Bucket::classify(job);
        let tool = job.short_tool_id();
        match bucket {
            Bucket::Successful => tracing::info!(job = %job.id, tool, "job succeeded"),
            Bucket::Failed => {
                tracing::info!(job = %job.id, tool, exit_code = ?job.exit_code, "job failed");
            }
            _ => tracing::info!(job = %job.id, tool, state = %job.state, "job reached timeout"),
        }

        let info = self.service.show_job(&job.id).await?;
        let problems = match bucket {
            Bucket::Successful => None,
            _ => Some(self.service.job_common_problems(&job.id).await?),
        };
        let metrics = self.service.job_metrics(&job.id).await?;

        if bucket == Bucket::Successful && self.config.retention.purges_successful_outputs() {
            self.purge_job_outputs(&job.id).await?;
        } else {
            let marker = bucket.marker(&job.state);
            self.tag_job(endpoint, &job.id, marker.as_deref()).await;
        }

        if bucket != Bucket::Successful {
            self.had_errors = true;
        }

        let record = JobRecord {
            info,
            problems,
            metrics,
        };
        Ok((bucket, record))
    }

    /// Tags the outputs of a job with the endpoint label and an optional marker.
    ///
    /// Without a marker a job is tagged at most once per endpoint. Returns
    /// whether tags were written.
    pub async fn tag_job(
        &mut self,
        endpoint: &Endpoint,
        job_id: &str,
        marker: Option<&str>,
    ) -> bool {
        let history_id = match self.history_id() {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(job = job_id, error = %e, "failed to tag job outputs");
                return false;
            }
        };
        Tagger::new(&self.service, &history_id, &mut self.tagged_jobs)
            .tag(endpoint, job_id, marker)
            .await
    }

    async fn purge_job_outputs(&self, job_id: &str) -> Result<(), SessionError> {
        let history_id = self.history_id()?;
        let cancelled = self.service.cancel_job(job_id).await?;
        tracing::debug!(job = job_id, cancelled, "cancelled job before purging its outputs");
        for output in self.service.job_outputs(job_id).await? {
            self.service
                .delete_dataset(&history_id, &output.dataset.id, true)
                .await?;
            tracing::info!(dataset = %output.dataset.id, "purged dataset");
        }
        Ok(())
    }

    /// Routes new jobs to `endpoint`. The preference is only written if it changed,
    /// the user's other extra preferences are kept.
    pub async fn switch_routing(&self, endpoint: &Endpoint) -> Result<(), SessionError> {
        let user = self.service.current_user().await?;
        let target = endpoint.routing_value();
        if user.routing().as_deref() == Some(target) {
            tracing::debug!(%endpoint, "compute endpoint unchanged");
            return Ok(());
        }

        let values = user.preferences_with_routing(target);
        self.service
            .update_user_information(&user.id, &values)
            .await?;
        tracing::info!(%endpoint, instance = %self.config.name, "switched compute endpoint");
        Ok(())
    }

    /// Routes new jobs back to the default endpoint.
    pub async fn restore_routing(&self) -> Result<(), SessionError> {
        self.switch_routing(&self.config.default_endpoint).await
    }

    /// Deletes the histories left by earlier runs.
    ///
    /// Histories named like this session's are always purged. Older histories
    /// whose normalized name contains the normalized base name are purged once
    /// they exceed the retention age. Immutable histories are skipped.
    pub async fn purge_histories(&self) -> Result<(), SessionError> {
        let base = normalize_name(&self.config.history_name);
        let now = self.started_at.with_time_zone(TimeZone::UTC).datetime();

        for history in self.service.list_histories().await? {
            if history.name == self.history_name {
                self.delete_history(&history).await?;
                continue;
            }
            if !name_matches(&base, &history.name) {
                continue;
            }

            let created = self.service.history_create_time(&history.id).await?;
            if now.duration_since(created) > self.config.delete_after {
                self.delete_history(&history).await?;
            }
        }
        Ok(())
    }

    async fn delete_history(&self, history: &History) -> Result<(), SessionError> {
        tracing::info!(history = %history.id, name = %history.name, "purging history");
        match self.service.delete_history(&history.id, true).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_immutable() => {
                tracing::warn!(history = %history.id, "skipping immutable history");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes the uploaded workflow, if any.
    pub async fn purge_workflow(&mut self) -> Result<(), SessionError> {
        if let Some(workflow) = &self.workflow {
            tracing::info!(workflow = %workflow.id, "purging workflow");
            self.service.delete_workflow(&workflow.id).await?;
            self.workflow = None;
        }
        Ok(())
    }

    /// Applies the retention policy to the history and deletes the workflow.
    pub async fn clean_up(&mut self) -> Result<(), SessionError> {
        if self.config.retention.purges_history(self.had_errors) {
            self.purge_histories().await?;
        } else {
            tracing::info!(
                retention = ?self.config.retention,
                had_errors = self.had_errors,
                "keeping history"
            );
        }
        self.purge_workflow().await?;
        tracing::info!("clean-up terminated");
        Ok(())
    }

    /// Purges histories and workflow and restores routing after a failure,
    /// logging instead of returning errors.
    pub async fn clean_up_after_failure(&mut self) {
        if let Err(e) = self.purge_histories().await {
            tracing::warn!(error = %e, "failed to purge histories");
        }
        if let Err(e) = self.purge_workflow().await {
            tracing::warn!(error = %e, "failed to purge workflow");
        }
        if let Err(e) = self.restore_routing().await {
            tracing::warn!(error = %e, "failed to restore compute endpoint");
        }
        tracing::info!("clean-up terminated");
    }

    fn history_id(&self) -> Result<String, SessionError> {
        self.history
            .as_ref()
            .map(|h| h.id.clone())
            .ok_or(SessionError::NotSetUp("history"))
    }
}

/// Normalizes a history name for matching: digits, `/` and `:` removed,
/// lower-cased and trimmed.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_ascii_digit() && *c != '/' && *c != ':')
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

fn name_matches(base: &str, name: &str) -> bool {
    if base.is_empty() {
        return false;
    }
    let name = normalize_name(name);
    name.contains(base) || name.split_whitespace().any(|word| word == base)
}

/// Finds a workflow definition: `~` is expanded, absolute paths are used
/// as-is, relative ones are looked up next to the settings file, then in the
/// working directory.
///
/// # Errors
///
/// Returns [`SessionError::DefinitionPath`] if no candidate is a file.
pub async fn resolve_workflow_path(
    path: &Path,
    config_dir: Option<&Path>,
) -> Result<PathBuf, SessionError> {
    let path = expand_home(path);
    let candidates: Vec<PathBuf> = if path.is_absolute() {
        vec![path.clone()]
    } else {
        config_dir
            .map(|dir| dir.join(&path))
            .into_iter()
            .chain(std::iter::once(path.clone()))
            .collect()
    };

    for candidate in candidates {
        let is_file = tokio::fs::metadata(&candidate)
            .await
            .is_ok_and(|meta| meta.is_file());
        if is_file {
            return Ok(candidate);
        }
    }
    Err(SessionError::DefinitionPath(path))
}

fn expand_home(path: &Path) -> PathBuf {
    let rest = match path.to_str() {
        Some("~") => Some(""),
        Some(s) => s.strip_prefix("~/"),
        None => None,
    };
    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
