// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use async_trait::async_trait;
use jiff::civil::DateTime;
use saber_galaxy::{
    AuthMethod, DatasetRef, DatasetState, DatasetSummary, GalaxyClient, GalaxyConfig,
    GalaxyError, History, Invocation, JobOutput, JobSummary, User, Workflow,
};
use serde_json::{Map, Value};

use crate::config::{Credential, InstanceConfig};

/// The remote calls a session needs from a Galaxy server.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Gets the user owning the credentials.
    async fn current_user(&self) -> Result<User, GalaxyError>;

    /// Replaces the user's extra preferences.
    async fn update_user_information(
        &self,
        user_id: &str,
        values: &Map<String, Value>,
    ) -> Result<(), GalaxyError>;

    /// Lists the user's histories.
    async fn list_histories(&self) -> Result<Vec<History>, GalaxyError>;

    /// Creates a history.
    async fn create_history(&self, name: &str) -> Result<History, GalaxyError>;

    /// Gets the creation time of a history, in UTC.
    async fn history_create_time(&self, history_id: &str) -> Result<DateTime, GalaxyError>;

    /// Deletes a history.
    async fn delete_history(&self, history_id: &str, purge: bool) -> Result<(), GalaxyError>;

    /// Imports a workflow definition.
    async fn import_workflow(&self, definition: &Value) -> Result<Workflow, GalaxyError>;

    /// Lists the ids of the workflow inputs labelled `label`.
    async fn workflow_input_ids(
        &self,
        workflow_id: &str,
        label: &str,
    ) -> Result<Vec<String>, GalaxyError>;

    /// Deletes a workflow.
    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), GalaxyError>;

    /// Invokes a workflow into a history.
    async fn invoke_workflow(
        &self,
        workflow_id: &str,
        history_id: &str,
        inputs: &BTreeMap<String, DatasetRef>,
    ) -> Result<Invocation, GalaxyError>;

    /// Uploads a dataset from a URL, returning its id.
    async fn upload_from_url(
        &self,
        history_id: &str,
        name: &str,
        url: &str,
        file_type: &str,
    ) -> Result<String, GalaxyError>;

    /// Lists the datasets of a history.
    async fn list_datasets(&self, history_id: &str) -> Result<Vec<DatasetSummary>, GalaxyError>;

    /// Gets the state of a dataset.
    async fn dataset_state(&self, dataset_id: &str) -> Result<DatasetState, GalaxyError>;

    /// Lists the jobs of an invocation.
    async fn list_jobs(&self, invocation_id: &str) -> Result<Vec<JobSummary>, GalaxyError>;

    /// Gets the full details of a job.
    async fn show_job(&self, job_id: &str) -> Result<Value, GalaxyError>;

    /// Gets the diagnosis of common job problems.
    async fn job_common_problems(&self, job_id: &str) -> Result<Value, GalaxyError>;

    /// Gets the runtime metrics of a job.
    async fn job_metrics(&self, job_id: &str) -> Result<Value, GalaxyError>;

    /// Lists the output datasets of a job.
    async fn job_outputs(&self, job_id: &str) -> Result<Vec<JobOutput>, GalaxyError>;

    /// Cancels a job, `false` if it had already finished.
    async fn cancel_job(&self, job_id: &str) -> Result<bool, GalaxyError>;

    /// Replaces the tags of a history dataset.
    async fn tag_dataset(
        &self,
        history_id: &str,
        dataset_id: &str,
        tags: &[String],
    ) -> Result<(), GalaxyError>;

    /// Deletes a history dataset.
    async fn delete_dataset(
        &self,
        history_id: &str,
        dataset_id: &str,
        purge: bool,
    ) -> Result<(), GalaxyError>;
}

#[async_trait]
impl ExecutionService for GalaxyClient {
    async fn current_user(&self) -> Result<User, GalaxyError> {
        GalaxyClient::current_user(self).await
    }

    async fn update_user_information(
        &self,
        user_id: &str,
        values: &Map<String, Value>,
    ) -> Result<(), GalaxyError> {
        GalaxyClient::update_user_information(self, user_id, values).await
    }

    async fn list_histories(&self) -> Result<Vec<History>, GalaxyError> {
        GalaxyClient::list_histories(self).await
    }

    async fn create_history(&self, name: &str) -> Result<History, GalaxyError> {
        GalaxyClient::create_history(self, name).await
    }

    async fn history_create_time(&self, history_id: &str) -> Result<DateTime, GalaxyError> {
        GalaxyClient::history_create_time(self, history_id).await
    }

    async fn delete_history(&self, history_id: &str, purge: bool) -> Result<(), GalaxyError> {
        GalaxyClient::delete_history(self, history_id, purge).await
    }

    async fn import_workflow(&self, definition: &Value) -> Result<Workflow, GalaxyError> {
        GalaxyClient::import_workflow(self, definition).await
    }

    async fn workflow_input_ids(
        &self,
        workflow_id: &str,
        label: &str,
    ) -> Result<Vec<String>, GalaxyError> {
        GalaxyClient::workflow_input_ids(self, workflow_id, label).await
    }

    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), GalaxyError> {
        GalaxyClient::delete_workflow(self, workflow_id).await
    }

    async fn invoke_workflow(
        &self,
        workflow_id: &str,
        history_id: &str,
        inputs: &BTreeMap<String, DatasetRef>,
    ) -> Result<Invocation, GalaxyError> {
        GalaxyClient::invoke_workflow(self, workflow_id, history_id, inputs).await
    }

    async fn upload_from_url(
        &self,
        history_id: &str,
        name: &str,
        url: &str,
        file_type: &str,
    ) -> Result<String, GalaxyError> {
        GalaxyClient::upload_from_url(self, history_id, name, url, file_type).await
    }

    async fn list_datasets(&self, history_id: &str) -> Result<Vec<DatasetSummary>, GalaxyError> {
        GalaxyClient::list_datasets(self, history_id).await
    }

    async fn dataset_state(&self, dataset_id: &str) -> Result<DatasetState, GalaxyError> {
        GalaxyClient::dataset_state(self, dataset_id).await
    }

    async fn list_jobs(&self, invocation_id: &str) -> Result<Vec<JobSummary>, GalaxyError> {
        GalaxyClient::list_jobs(self, invocation_id).await
    }

    async fn show_job(&self, job_id: &str) -> Result<Value, GalaxyError> {
        GalaxyClient::show_job(self, job_id).await
    }

    async fn job_common_problems(&self, job_id: &str) -> Result<Value, GalaxyError> {
        GalaxyClient::job_common_problems(self, job_id).await
    }

    async fn job_metrics(&self, job_id: &str) -> Result<Value, GalaxyError> {
        GalaxyClient::job_metrics(self, job_id).await
    }

    async fn job_outputs(&self, job_id: &str) -> Result<Vec<JobOutput>, GalaxyError> {
        GalaxyClient::job_outputs(self, job_id).await
    }

    async fn cancel_job(&self, job_id: &str) -> Result<bool, GalaxyError> {
        GalaxyClient::cancel_job(self, job_id).await
    }

    async fn tag_dataset(
        &self,
        history_id: &str,
        dataset_id: &str,
        tags: &[String],
    ) -> Result<(), GalaxyError> {
        GalaxyClient::tag_dataset(self, history_id, dataset_id, tags).await
    }

    async fn delete_dataset(
        &self,
        history_id: &str,
        dataset_id: &str,
        purge: bool,
    ) -> Result<(), GalaxyError> {
        GalaxyClient::delete_dataset(self, history_id, dataset_id, purge).await
    }
}

/// Builds the remote service of an instance.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The service this connector builds.
    type Service: ExecutionService;

    /// Connects to an instance, logging in if needed.
    async fn connect(&self, instance: &InstanceConfig) -> Result<Self::Service, GalaxyError>;
}

/// Connects to real Galaxy servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GalaxyConnector;

#[async_trait]
impl Connector for GalaxyConnector {
    type Service = GalaxyClient;

    async fn connect(&self, instance: &InstanceConfig) -> Result<GalaxyClient, GalaxyError> {
        let auth = match &instance.credential {
            Credential::ApiKey(key) => AuthMethod::ApiKey { key: key.clone() },
            Credential::Password { email, password } => AuthMethod::Basic {
                email: email.clone(),
                password: password.clone(),
            },
        };
        let config = GalaxyConfig::new(instance.url.clone(), auth);
        tracing::debug!(url = config.normalized_base_url(), "connecting to galaxy");
        GalaxyClient::connect(config).await
    }
}
