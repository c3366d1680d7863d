// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use jiff::SignedDuration;

/// The name of the SABER application.
pub const APP_NAME: &str = "saber";

const DEFAULT_JOB_TIMEOUT: u64 = 12000;
const DEFAULT_JOB_INTERVAL: u64 = 5;
const DEFAULT_UPLOAD_TIMEOUT: u64 = 12000;
const DEFAULT_UPLOAD_INTERVAL: u64 = 5;
const DEFAULT_DELETE_AFTER_DAYS: f64 = 5.0;
const DEFAULT_HISTORY_NAME: &str = "SABER";

const MAX_WARMUP_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_WARMUP_INTERVAL: Duration = Duration::from_secs(5);

/// A compute endpoint jobs can be routed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize)]
#[serde(from = "String")]
pub enum Endpoint {
    /// The platform's own compute, spelled `"None"` in settings and preferences.
    Default,
    /// A named remote compute back end.
    Named(String),
}

impl Endpoint {
    /// Settings value selecting the platform default.
    pub const SENTINEL: &'static str = "None";

    /// Display label of the platform default.
    pub const DEFAULT_LABEL: &'static str = "Default";

    /// Parses an endpoint id as written in settings.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        if id == Self::SENTINEL {
            Self::Default
        } else {
            Self::Named(id)
        }
    }

    /// The value written to the user's routing preference.
    pub fn routing_value(&self) -> &str {
        match self {
            Self::Default => Self::SENTINEL,
            Self::Named(id) => id,
        }
    }

    /// The label used in logs, tags and result keys.
    pub fn label(&self) -> &str {
        match self {
            Self::Default => Self::DEFAULT_LABEL,
            Self::Named(id) => id,
        }
    }
}

impl From<String> for Endpoint {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<&str> for Endpoint {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What happens to the test history at the end of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
pub enum RetentionPolicy {
    /// Keep every history.
    #[serde(rename = "never")]
    Never,

    /// Purge the history whatever the outcome.
    #[serde(rename = "always")]
    Always,

    /// Purge the history only if no job failed or timed out.
    #[serde(rename = "onsuccess")]
    #[default]
    OnSuccess,

    /// Like [`RetentionPolicy::OnSuccess`], and purge the outputs of every
    /// successful job right away.
    #[serde(rename = "successful_only")]
    SuccessfulOnly,
}

impl RetentionPolicy {
    /// Whether the history is purged at clean-up, given whether any job failed.
    pub fn purges_history(self, had_errors: bool) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::OnSuccess | Self::SuccessfulOnly => !had_errors,
        }
    }

    /// Whether the outputs of successful jobs are purged instead of tagged.
    pub fn purges_successful_outputs(self) -> bool {
        self == Self::SuccessfulOnly
    }
}

/// A workflow input uploaded from a URL.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct DataInput {
    /// Source URL.
    pub url: String,

    /// Galaxy datatype, e.g. `fastqsanger`.
    pub file_type: String,
}

/// Credentials for one instance.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// API key.
    ApiKey(String),

    /// Email and password, exchanged for an API key when connecting.
    Password {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(..)"),
            Self::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .finish_non_exhaustive(),
        }
    }
}

/// Settings file as written: top-level defaults and per-instance overrides.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct RawConfig {
    /// Keys shared by all instances.
    #[serde(flatten)]
    pub defaults: RawInstance,

    /// The instances under test.
    #[serde(default)]
    pub usegalaxy_instances: Vec<RawInstance>,
}

/// Settings of one instance, before defaults are applied.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct RawInstance {
    pub name: Option<String>,
    pub url: Option<String>,
    pub api: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub endpoints: Option<Vec<String>>,
    pub default_compute_id: Option<String>,
    pub ga_path: Option<PathBuf>,
    pub data_inputs: Option<BTreeMap<String, DataInput>>,
    pub timeout: Option<u64>,
    pub sleep_time: Option<u64>,
    pub maxwait: Option<u64>,
    pub interval: Option<u64>,
    pub clean_history: Option<RetentionPolicy>,
    pub delete_after: Option<f64>,
    pub history_name: Option<String>,
    pub local_upload: Option<bool>,
}

impl RawConfig {
    /// Applies the defaults to every instance and validates the result.
    ///
    /// `config_dir` is the directory of the settings file, relative workflow
    /// paths are looked up there first.
    ///
    /// # Errors
    ///
    /// Returns every problem of every instance at once.
    pub fn resolve(&self, config_dir: Option<&Path>) -> Result<Vec<InstanceConfig>, ConfigError> {
        let mut problems = Vec::new();
        if self.usegalaxy_instances.is_empty() {
            problems.push("no `usegalaxy_instances` configured".to_string());
        }

        let mut names = HashSet::new();
        let mut instances = Vec::with_capacity(self.usegalaxy_instances.len());
        for (i, raw) in self.usegalaxy_instances.iter().enumerate() {
            let merged = raw.merged_over(&self.defaults);
            let label = merged.name.clone().unwrap_or_else(|| format!("#{}", i + 1));

            let mut errs = Vec::new();
            if let Some(name) = &merged.name {
                if !names.insert(name.clone()) {
                    errs.push("duplicate instance name".to_string());
                }
            }

            let resolved = merged.resolve(config_dir, &mut errs);
            if errs.is_empty() {
                instances.extend(resolved);
            } else {
                problems.extend(errs.into_iter().map(|e| format!("instance `{label}`: {e}")));
            }
        }

        if problems.is_empty() {
            Ok(instances)
        } else {
            Err(ConfigError { problems })
        }
    }
}

impl RawInstance {
    /// Fills every key missing here from `defaults`.
    pub fn merged_over(&self, defaults: &Self) -> Self {
        macro_rules! pick {
            ($($field:ident),* $(,)?) => {
                Self { $($field: self.$field.clone().or_else(|| defaults.$field.clone())),* }
            };
        }

        pick!(
            name,
            url,
            api,
            email,
            password,
            endpoints,
            default_compute_id,
            ga_path,
            data_inputs,
            timeout,
            sleep_time,
            maxwait,
            interval,
            clean_history,
            delete_after,
            history_name,
            local_upload,
        )
    }

    fn resolve(self, config_dir: Option<&Path>, errs: &mut Vec<String>) -> Option<InstanceConfig> {
        let name = required(self.name, "name", errs);
        let url = required(self.url, "url", errs);
        let default_endpoint = required(self.default_compute_id, "default_compute_id", errs);
        let workflow_path = required(self.ga_path, "ga_path", errs);
        let data_inputs = required(self.data_inputs, "data_inputs", errs);

        let credential = match (self.api, self.email, self.password) {
            (Some(key), _, _) if !key.is_empty() => Some(Credential::ApiKey(key)),
            (_, Some(email), Some(password)) => Some(Credential::Password { email, password }),
            _ => {
                errs.push("no credentials, set `api` or both `email` and `password`".to_string());
                None
            }
        };

        let endpoints = match self.endpoints {
            None => {
                errs.push("missing `endpoints`".to_string());
                None
            }
            Some(list) if list.is_empty() => {
                errs.push("`endpoints` is empty".to_string());
                None
            }
            Some(list) => {
                let endpoints: Vec<_> = list.into_iter().map(Endpoint::new).collect();
                // results are keyed by label, so `None` and `Default` collide
                let mut seen = HashSet::new();
                for endpoint in &endpoints {
                    if !seen.insert(endpoint.label()) {
                        errs.push(format!("duplicate endpoint `{}`", endpoint.label()));
                    }
                }
                Some(endpoints)
            }
        };

        let job_interval = positive(self.sleep_time, DEFAULT_JOB_INTERVAL, "sleep_time", errs);
        let upload_interval = positive(self.interval, DEFAULT_UPLOAD_INTERVAL, "interval", errs);

        let days = self.delete_after.unwrap_or(DEFAULT_DELETE_AFTER_DAYS);
        let delete_after = if days.is_finite() && days >= 0.0 {
            SignedDuration::try_from_secs_f64(days * 86400.0).ok()
        } else {
            None
        };
        if delete_after.is_none() {
            errs.push(format!("`delete_after` must be a non-negative number of days, got {days}"));
        }

        let (
            Some(name),
            Some(url),
            Some(credential),
            Some(endpoints),
            Some(default_endpoint),
            Some(workflow_path),
            Some(data_inputs),
            Some(delete_after),
        ) = (
            name,
            url,
            credential,
            endpoints,
            default_endpoint,
            workflow_path,
            data_inputs,
            delete_after,
        )
        else {
            return None;
        };

        Some(InstanceConfig {
            name,
            url,
            credential,
            endpoints,
            default_endpoint: Endpoint::new(default_endpoint),
            workflow_path,
            config_dir: config_dir.map(Path::to_path_buf),
            data_inputs,
            job_timeout: Duration::from_secs(self.timeout.unwrap_or(DEFAULT_JOB_TIMEOUT)),
            job_interval,
            upload_timeout: Duration::from_secs(self.maxwait.unwrap_or(DEFAULT_UPLOAD_TIMEOUT)),
            upload_interval,
            retention: self.clean_history.unwrap_or_default(),
            delete_after,
            history_name: self
                .history_name
                .unwrap_or_else(|| DEFAULT_HISTORY_NAME.to_string()),
            local_upload: self.local_upload.unwrap_or(true),
        })
    }
}

fn required<T>(value: Option<T>, key: &str, errs: &mut Vec<String>) -> Option<T> {
    if value.is_none() {
        errs.push(format!("missing `{key}`"));
    }
    value
}

fn positive(value: Option<u64>, default: u64, key: &str, errs: &mut Vec<String>) -> Duration {
    let secs = value.unwrap_or(default);
    if secs == 0 {
        errs.push(format!("`{key}` must be positive"));
    }
    Duration::from_secs(secs)
}

/// Fully resolved settings of one instance under test.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceConfig {
    /// Instance name, used as the top-level result key.
    pub name: String,

    /// Base URL of the Galaxy server.
    pub url: String,

    /// How to authenticate.
    pub credential: Credential,

    /// Endpoints to test, in order.
    pub endpoints: Vec<Endpoint>,

    /// Endpoint used for uploads and restored at the end.
    pub default_endpoint: Endpoint,

    /// Path of the `.ga` workflow definition, as configured.
    pub workflow_path: PathBuf,

    /// Directory of the settings file.
    pub config_dir: Option<PathBuf>,

    /// Workflow inputs, keyed by input label.
    pub data_inputs: BTreeMap<String, DataInput>,

    /// Maximum time to wait for jobs to finish.
    pub job_timeout: Duration,

    /// Time between job state checks.
    pub job_interval: Duration,

    /// Maximum time to wait for uploads.
    pub upload_timeout: Duration,

    /// Time between upload state checks.
    pub upload_interval: Duration,

    /// History retention policy.
    pub retention: RetentionPolicy,

    /// Age after which leftover test histories are purged.
    pub delete_after: SignedDuration,

    /// Base name of the test history.
    pub history_name: String,

    /// Whether inputs are uploaded through the default endpoint.
    pub local_upload: bool,
}

impl InstanceConfig {
    /// Bound of the wait for an endpoint's jobs to start.
    pub fn warmup_timeout(&self) -> Duration {
        (self.job_timeout / 2).min(MAX_WARMUP_TIMEOUT)
    }

    /// Interval of the wait for an endpoint's jobs to start.
    pub fn warmup_interval(&self) -> Duration {
        self.job_interval.min(MAX_WARMUP_INTERVAL)
    }
}

/// Invalid settings, with every problem found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid settings:{}", format_problems(.problems))]
pub struct ConfigError {
    /// One line per problem.
    pub problems: Vec<String>,
}

fn format_problems(problems: &[String]) -> String {
    problems.iter().map(|p| format!("\n  - {p}")).collect()
}
