// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use serde_json::{Map, Value};

/// Key of the extra user preference that routes jobs to a compute endpoint.
const ROUTING_PREFERENCE: &str = "distributed_compute|remote_resources";

/// The user owning the API key.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct User {
    /// Encoded user id.
    pub id: String,
    /// Account email, if visible.
    #[serde(default)]
    pub email: Option<String>,
    /// Raw user preferences.
    #[serde(default)]
    pub preferences: Map<String, Value>,
}

impl User {
    /// The extra user preferences, which Galaxy stores as a JSON-encoded string.
    pub fn extra_preferences(&self) -> Map<String, Value> {
        match self.preferences.get("extra_user_preferences") {
            Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_default(),
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    /// The compute endpoint jobs are currently routed to.
    pub fn routing(&self) -> Option<String> {
        match self.extra_preferences().get(ROUTING_PREFERENCE) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// The extra preferences with the routing preference replaced.
    pub fn preferences_with_routing(&self, routing: &str) -> Map<String, Value> {
        let mut prefs = self.extra_preferences();
        prefs.insert(
            ROUTING_PREFERENCE.to_string(),
            Value::String(routing.to_string()),
        );
        prefs
    }
}

/// A history, Galaxy's container for datasets and jobs.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct History {
    /// Encoded history id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// An uploaded workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Workflow {
    /// Encoded workflow id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// A started run of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Invocation {
    /// Encoded invocation id.
    pub id: String,
    /// Scheduling state, e.g. `new` or `scheduled`.
    #[serde(default)]
    pub state: Option<String>,
}

/// Reference to a dataset, as used for workflow inputs and job outputs.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DatasetRef {
    /// Encoded dataset id.
    pub id: String,
    /// Source kind, `hda` for history datasets.
    pub src: String,
}

impl DatasetRef {
    /// A reference to a history dataset.
    pub fn hda(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            src: "hda".to_string(),
        }
    }
}

/// A dataset as listed in a history.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct DatasetSummary {
    /// Encoded dataset id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Dataset state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(from = "String")]
pub enum DatasetState {
    /// Content is ready.
    Ok,
    /// Ready, but without content.
    Empty,
    /// Upload or creation failed.
    Error,
    /// Discarded by the server.
    Discarded,
    /// Content is ready but metadata could not be set.
    FailedMetadata,
    /// Any other state, e.g. `queued` or `running`.
    Other(String),
}

impl DatasetState {
    /// Whether the dataset will not change state anymore.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Whether the dataset ended in a terminal state without usable content.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Error | Self::Discarded | Self::FailedMetadata)
    }

    /// The state as Galaxy spells it.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "ok",
            Self::Empty => "empty",
            Self::Error => "error",
            Self::Discarded => "discarded",
            Self::FailedMetadata => "failed_metadata",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for DatasetState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ok" => Self::Ok,
            "empty" => Self::Empty,
            "error" => Self::Error,
            "discarded" => Self::Discarded,
            "failed_metadata" => Self::FailedMetadata,
            _ => Self::Other(s),
        }
    }
}

impl fmt::Display for DatasetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job state.
///
/// A job moves `new → queued → running|waiting → ok|error`. Galaxy knows a few
/// more states, the ones that never progress on their own are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(from = "String")]
pub enum JobState {
    /// Created, not yet handed to a job runner.
    New,
    /// Waiting in the runner's queue.
    Queued,
    /// Executing.
    Running,
    /// Waiting for inputs or resources.
    Waiting,
    /// Finished successfully.
    Ok,
    /// Finished with an error.
    Error,
    /// Deleted before finishing.
    Deleted,
    /// Skipped by the workflow scheduler.
    Skipped,
    /// Paused, e.g. because an input failed.
    Paused,
    /// Any other state.
    Other(String),
}

impl JobState {
    /// Whether the job will not change state anymore.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Ok | Self::Error | Self::Deleted | Self::Skipped | Self::Paused
        )
    }

    /// Whether the job has left its initial state.
    pub fn has_started(&self) -> bool {
        !matches!(self, Self::New | Self::Other(_))
    }

    /// The state as Galaxy spells it.
    pub fn as_str(&self) -> &str {
        match self {
            Self::New => "new",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Deleted => "deleted",
            Self::Skipped => "skipped",
            Self::Paused => "paused",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for JobState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "new" => Self::New,
            "queued" => Self::Queued,
            "running" => Self::Running,
            "waiting" => Self::Waiting,
            "ok" => Self::Ok,
            "error" => Self::Error,
            "deleted" => Self::Deleted,
            "skipped" => Self::Skipped,
            "paused" => Self::Paused,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for JobState {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job as listed for an invocation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct JobSummary {
    /// Encoded job id.
    pub id: String,
    /// Current state.
    pub state: JobState,
    /// Tool id, e.g. `toolshed.g2.bx.psu.edu/repos/devteam/fastqc/fastqc/0.74`.
    #[serde(default)]
    pub tool_id: Option<String>,
    /// Exit code of the tool, once known.
    #[serde(default)]
    pub exit_code: Option<i64>,
}

impl JobSummary {
    /// A shortened tool id for log lines, the part after `/devteam/` if present.
    pub fn short_tool_id(&self) -> &str {
        let tool_id = self.tool_id.as_deref().unwrap_or("unknown");
        tool_id
            .split_once("/devteam/")
            .map_or(tool_id, |(_, rest)| rest)
    }
}

/// An output dataset of a job.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct JobOutput {
    /// Output name as declared by the tool.
    #[serde(default)]
    pub name: String,
    /// The produced dataset.
    pub dataset: DatasetRef,
}
