// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt;

use saber_galaxy::{JobState, JobSummary};
use serde_json::Value;

/// Outcome category of a job once monitoring ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum Bucket {
    /// Finished with exit code 0, or in state `ok`.
    #[serde(rename = "SUCCESSFUL_JOBS")]
    Successful,

    /// Still running at timeout.
    #[serde(rename = "RUNNING_JOBS")]
    Running,

    /// Still queued at timeout.
    #[serde(rename = "QUEUED_JOBS")]
    Queued,

    /// Never scheduled before timeout.
    #[serde(rename = "NEW_JOBS")]
    New,

    /// Still waiting at timeout.
    #[serde(rename = "WAITING_JOBS")]
    Waiting,

    /// Anything else.
    #[serde(rename = "FAILED_JOBS")]
    Failed,
}

impl Bucket {
    /// All buckets, in report order.
    pub const ALL: [Self; 6] = [
        Self::Successful,
        Self::Running,
        Self::Queued,
        Self::New,
        Self::Waiting,
        Self::Failed,
    ];

    /// Classifies a job observed at the end of monitoring.
    pub fn classify(job: &JobSummary) -> Self {
        match job.state {
            JobState::New => Self::New,
            JobState::Queued => Self::Queued,
            JobState::Running => Self::Running,
            JobState::Waiting => Self::Waiting,
            _ if job.exit_code == Some(0) || job.state == JobState::Ok => Self::Successful,
            _ => Self::Failed,
        }
    }

    /// Whether the job had not finished when monitoring ended.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Running | Self::Queued | Self::New | Self::Waiting)
    }

    /// The report key of this bucket.
    pub fn key(self) -> &'static str {
        match self {
            Self::Successful => "SUCCESSFUL_JOBS",
            Self::Running => "RUNNING_JOBS",
            Self::Queued => "QUEUED_JOBS",
            Self::New => "NEW_JOBS",
            Self::Waiting => "WAITING_JOBS",
            Self::Failed => "FAILED_JOBS",
        }
    }

    /// The status tag added next to the endpoint tag, if any.
    pub fn marker(self, state: &JobState) -> Option<String> {
        match self {
            Self::Successful => None,
            Self::Failed => Some("err".to_string()),
            _ => Some(format!("saber_{state}")),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// What was recorded about one job.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct JobRecord {
    /// Full job details.
    #[serde(rename = "INFO")]
    pub info: Value,

    /// Galaxy's diagnosis of common problems, absent for successful jobs.
    #[serde(rename = "PROBLEMS", skip_serializing_if = "Option::is_none")]
    pub problems: Option<Value>,

    /// Runtime metrics.
    #[serde(rename = "METRICS")]
    pub metrics: Value,
}

/// Jobs of one endpoint, by bucket and job id. Every bucket is always present.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct EndpointResults {
    buckets: BTreeMap<Bucket, BTreeMap<String, JobRecord>>,
}

impl Default for EndpointResults {
    fn default() -> Self {
        Self {
            buckets: Bucket::ALL
                .into_iter()
                .map(|bucket| (bucket, BTreeMap::new()))
                .collect(),
        }
    }
}

impl EndpointResults {
    /// Records a job, replacing an earlier record of the same job in that bucket.
    pub fn insert(&mut self, bucket: Bucket, job_id: impl Into<String>, record: JobRecord) {
        self.buckets
            .entry(bucket)
            .or_default()
            .insert(job_id.into(), record);
    }

    /// The jobs of one bucket.
    pub fn bucket(&self, bucket: Bucket) -> &BTreeMap<String, JobRecord> {
        static EMPTY: BTreeMap<String, JobRecord> = BTreeMap::new();
        self.buckets.get(&bucket).unwrap_or(&EMPTY)
    }

    /// Number of jobs per bucket, in report order.
    pub fn counts(&self) -> [(Bucket, usize); 6] {
        Bucket::ALL.map(|bucket| (bucket, self.bucket(bucket).len()))
    }

    /// Total number of jobs.
    pub fn len(&self) -> usize {
        self.buckets.values().map(BTreeMap::len).sum()
    }

    /// Whether no job was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any job had not finished.
    pub fn has_pending(&self) -> bool {
        Bucket::ALL
            .into_iter()
            .any(|bucket| bucket.is_pending() && !self.bucket(bucket).is_empty())
    }

    /// Whether any job failed.
    pub fn has_failed(&self) -> bool {
        !self.bucket(Bucket::Failed).is_empty()
    }

    /// Adds the jobs of `other`, keeping what was already recorded.
    pub fn merge(&mut self, other: Self) {
        for (bucket, jobs) in other.buckets {
            self.buckets.entry(bucket).or_default().extend(jobs);
        }
    }
}

/// Results of one instance, by endpoint label.
pub type InstanceResults = BTreeMap<String, EndpointResults>;

/// Results of a whole run: instance → endpoint → bucket → job.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct RunResults {
    instances: BTreeMap<String, InstanceResults>,
}

impl RunResults {
    /// Merges the results of one instance, accumulating per endpoint.
    pub fn merge_instance(&mut self, instance: &str, results: InstanceResults) {
        let entry = self.instances.entry(instance.to_string()).or_default();
        for (endpoint, jobs) in results {
            entry.entry(endpoint).or_default().merge(jobs);
        }
    }

    /// The results of one instance.
    pub fn instance(&self, name: &str) -> Option<&InstanceResults> {
        self.instances.get(name)
    }

    /// The results of one endpoint of one instance.
    pub fn endpoint(&self, instance: &str, endpoint: &str) -> Option<&EndpointResults> {
        self.instances.get(instance)?.get(endpoint)
    }

    /// Iterates over instances by name.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &InstanceResults)> {
        self.instances.iter()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// The exit status the recorded jobs call for.
    pub fn status(&self) -> ExitStatus {
        let mut status = ExitStatus::Success;
        for (instance, endpoints) in &self.instances {
            for (endpoint, jobs) in endpoints {
                if jobs.has_pending() {
                    tracing::warn!(%instance, %endpoint, "timeout jobs found");
                    status = status.max(ExitStatus::Timeout);
                }
                if jobs.has_failed() {
                    tracing::warn!(%instance, %endpoint, "failed jobs found");
                    status = status.max(ExitStatus::JobFailure);
                }
            }
        }
        status
    }
}

/// Overall outcome of a run, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Every job succeeded.
    #[default]
    Success,

    /// Some job had not finished at timeout.
    Timeout,

    /// Some job failed.
    JobFailure,

    /// An instance could not be reached or answered with an error.
    Connection,

    /// A workflow definition could not be found or read.
    Path,
}

impl ExitStatus {
    /// The process exit code.
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Timeout | Self::JobFailure => 42,
            Self::Connection => 10,
            Self::Path => 1,
        }
    }
}
