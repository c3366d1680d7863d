// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Galaxy client for history, workflow, dataset and job operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use jiff::civil::DateTime;
use reqwest::Method;
use serde_json::{Map, Value, json};

use crate::config::{AuthMethod, GalaxyConfig};
use crate::error::GalaxyError;
use crate::http::HttpClient;
use crate::types::{
    DatasetRef, DatasetState, DatasetSummary, History, Invocation, JobOutput, JobSummary, User,
    Workflow,
};

/// Galaxy client for driving workflows and observing their jobs.
///
/// # Example
///
/// ```ignore
/// use saber_galaxy::{AuthMethod, GalaxyClient, GalaxyConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GalaxyConfig::new(
///     "https://usegalaxy.example",
///     AuthMethod::ApiKey { key: "secret".to_string() },
/// );
///
/// let client = GalaxyClient::connect(config).await?;
/// let histories = client.list_histories().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GalaxyClient {
    http: Arc<HttpClient>,
}

#[derive(Debug, serde::Deserialize)]
struct ApiKeyResponse {
    api_key: String,
}

#[derive(Debug, serde::Deserialize)]
struct CreateTime {
    create_time: String,
}

#[derive(Debug, serde::Deserialize)]
struct WorkflowDetails {
    #[serde(default)]
    inputs: BTreeMap<String, WorkflowInput>,
}

#[derive(Debug, serde::Deserialize)]
struct WorkflowInput {
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct DatasetDetails {
    state: DatasetState,
}

#[derive(Debug, serde::Deserialize)]
struct FetchResponse {
    #[serde(default)]
    outputs: Vec<FetchOutput>,
}

#[derive(Debug, serde::Deserialize)]
struct FetchOutput {
    id: String,
}

impl GalaxyClient {
    /// Creates a new Galaxy client without contacting the server.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client initialization fails, or if the
    /// configuration needs a login round trip, use [`GalaxyClient::connect`] then.
    pub fn new(config: GalaxyConfig) -> Result<Self, GalaxyError> {
        let api_key = match &config.auth {
            AuthMethod::None => None,
            AuthMethod::ApiKey { key } => Some(key.clone()),
            AuthMethod::Basic { .. } => {
                return Err(GalaxyError::Config(
                    "email/password authentication requires GalaxyClient::connect".to_string(),
                ));
            }
        };
        let http = HttpClient::new(&config, api_key)?;
        Ok(Self {
            http: Arc::new(http),
        })
    }

    /// Creates a new Galaxy client, exchanging email/password for an API key if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client initialization or the login fails.
    pub async fn connect(config: GalaxyConfig) -> Result<Self, GalaxyError> {
        let credentials = match &config.auth {
            AuthMethod::Basic { email, password } => Some((email.clone(), password.clone())),
            _ => None,
        };
        let Some((email, password)) = credentials else {
            return Self::new(config);
        };

        let anonymous = HttpClient::new(&config, None)?;
        let resp: ApiKeyResponse = anonymous
            .json(
                anonymous
                    .build_request(Method::GET, "authenticate/baseauth")
                    .basic_auth(email, Some(password)),
            )
            .await
            .map_err(|e| match e {
                GalaxyError::Api { message, .. } => GalaxyError::Auth(message),
                e => e,
            })?;

        let http = HttpClient::new(&config, Some(resp.api_key))?;
        Ok(Self {
            http: Arc::new(http),
        })
    }

    /// Gets the user owning the credentials.
    pub async fn current_user(&self) -> Result<User, GalaxyError> {
        self.get("users/current").await
    }

    /// Updates the user's preference form, e.g. extra preferences like job routing.
    pub async fn update_user_information(
        &self,
        user_id: &str,
        values: &Map<String, Value>,
    ) -> Result<(), GalaxyError> {
        let path = format!("users/{user_id}/information/inputs");
        let _ = self
            .http
            .execute(self.http.build_request(Method::PUT, &path).json(values))
            .await?;
        Ok(())
    }

    /// Lists the user's non-deleted histories.
    pub async fn list_histories(&self) -> Result<Vec<History>, GalaxyError> {
        self.get("histories").await
    }

    /// Creates a new history.
    pub async fn create_history(&self, name: &str) -> Result<History, GalaxyError> {
        let req = self
            .http
            .build_request(Method::POST, "histories")
            .json(&json!({ "name": name }));
        self.http.json(req).await
    }

    /// Gets the creation time of a history, in UTC.
    pub async fn history_create_time(&self, history_id: &str) -> Result<DateTime, GalaxyError> {
        let req = self
            .http
            .build_request(Method::GET, &format!("histories/{history_id}"))
            .query(&[("keys", "create_time")]);
        let resp: CreateTime = self.http.json(req).await?;
        resp.create_time.parse().map_err(|e| {
            GalaxyError::InvalidResponse(format!(
                "invalid create_time {:?}: {e}",
                resp.create_time
            ))
        })
    }

    /// Deletes a history, optionally purging its datasets from disk.
    pub async fn delete_history(&self, history_id: &str, purge: bool) -> Result<(), GalaxyError> {
        let req = self
            .http
            .build_request(Method::DELETE, &format!("histories/{history_id}"))
            .json(&json!({ "purge": purge }));
        let _ = self.http.execute(req).await?;
        Ok(())
    }

    /// Imports a workflow from its `.ga` JSON definition.
    pub async fn import_workflow(&self, definition: &Value) -> Result<Workflow, GalaxyError> {
        let req = self
            .http
            .build_request(Method::POST, "workflows")
            .json(&json!({ "workflow": definition, "publish": false }));
        self.http.json(req).await
    }

    /// Lists the input ids of a workflow whose label matches `label`.
    pub async fn workflow_input_ids(
        &self,
        workflow_id: &str,
        label: &str,
    ) -> Result<Vec<String>, GalaxyError> {
        let details: WorkflowDetails = self.get(&format!("workflows/{workflow_id}")).await?;
        Ok(details
            .inputs
            .into_iter()
            .filter(|(_, input)| input.label.as_deref() == Some(label))
            .map(|(id, _)| id)
            .collect())
    }

    /// Deletes a workflow.
    pub async fn delete_workflow(&self, workflow_id: &str) -> Result<(), GalaxyError> {
        let req = self
            .http
            .build_request(Method::DELETE, &format!("workflows/{workflow_id}"));
        let _ = self.http.execute(req).await?;
        Ok(())
    }

    /// Invokes a workflow into a history.
    pub async fn invoke_workflow(
        &self,
        workflow_id: &str,
        history_id: &str,
        inputs: &BTreeMap<String, DatasetRef>,
    ) -> Result<Invocation, GalaxyError> {
        let req = self
            .http
            .build_request(Method::POST, &format!("workflows/{workflow_id}/invocations"))
            .json(&json!({ "history_id": history_id, "inputs": inputs }));
        self.http.json(req).await
    }

    /// Uploads a dataset from a URL into a history, returning the new dataset's id.
    pub async fn upload_from_url(
        &self,
        history_id: &str,
        name: &str,
        url: &str,
        file_type: &str,
    ) -> Result<String, GalaxyError> {
        let payload = json!({
            "history_id": history_id,
            "targets": [{
                "destination": { "type": "hdas" },
                "elements": [{ "src": "url", "url": url, "name": name, "ext": file_type }],
            }],
        });
        let req = self
            .http
            .build_request(Method::POST, "tools/fetch")
            .json(&payload);
        let resp: FetchResponse = self.http.json(req).await?;
        resp.outputs
            .into_iter()
            .next()
            .map(|output| output.id)
            .ok_or_else(|| GalaxyError::InvalidResponse("upload produced no dataset".to_string()))
    }

    /// Lists the datasets of a history.
    pub async fn list_datasets(
        &self,
        history_id: &str,
    ) -> Result<Vec<DatasetSummary>, GalaxyError> {
        let req = self
            .http
            .build_request(Method::GET, "datasets")
            .query(&[("history_id", history_id)]);
        self.http.json(req).await
    }

    /// Gets the state of a dataset.
    pub async fn dataset_state(&self, dataset_id: &str) -> Result<DatasetState, GalaxyError> {
        let details: DatasetDetails = self.get(&format!("datasets/{dataset_id}")).await?;
        Ok(details.state)
    }

    /// Lists the jobs of a workflow invocation.
    pub async fn list_jobs(&self, invocation_id: &str) -> Result<Vec<JobSummary>, GalaxyError> {
        let req = self
            .http
            .build_request(Method::GET, "jobs")
            .query(&[("invocation_id", invocation_id)]);
        self.http.json(req).await
    }

    /// Gets the full details of a job.
    pub async fn show_job(&self, job_id: &str) -> Result<Value, GalaxyError> {
        let req = self
            .http
            .build_request(Method::GET, &format!("jobs/{job_id}"))
            .query(&[("full", true)]);
        self.http.json(req).await
    }

    /// Gets Galaxy's diagnosis of common job problems, e.g. empty inputs.
    pub async fn job_common_problems(&self, job_id: &str) -> Result<Value, GalaxyError> {
        self.get(&format!("jobs/{job_id}/common_problems")).await
    }

    /// Gets the runtime metrics of a job.
    pub async fn job_metrics(&self, job_id: &str) -> Result<Value, GalaxyError> {
        self.get(&format!("jobs/{job_id}/metrics")).await
    }

    /// Lists the output datasets of a job.
    pub async fn job_outputs(&self, job_id: &str) -> Result<Vec<JobOutput>, GalaxyError> {
        self.get(&format!("jobs/{job_id}/outputs")).await
    }

    /// Cancels a job. Returns `false` if the job had already finished.
    pub async fn cancel_job(&self, job_id: &str) -> Result<bool, GalaxyError> {
        let req = self
            .http
            .build_request(Method::DELETE, &format!("jobs/{job_id}"));
        self.http.json(req).await
    }

    /// Replaces the tags of a history dataset.
    pub async fn tag_dataset(
        &self,
        history_id: &str,
        dataset_id: &str,
        tags: &[String],
    ) -> Result<(), GalaxyError> {
        let req = self
            .http
            .build_request(
                Method::PUT,
                &format!("histories/{history_id}/contents/{dataset_id}"),
            )
            .json(&json!({ "tags": tags }));
        let _ = self.http.execute(req).await?;
        Ok(())
    }

    /// Deletes a history dataset, optionally purging it from disk.
    pub async fn delete_dataset(
        &self,
        history_id: &str,
        dataset_id: &str,
        purge: bool,
    ) -> Result<(), GalaxyError> {
        let req = self
            .http
            .build_request(
                Method::DELETE,
                &format!("histories/{history_id}/contents/{dataset_id}"),
            )
            .json(&json!({ "purge": purge }));
        let _ = self.http.execute(req).await?;
        Ok(())
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, GalaxyError> {
        self.http
            .json(self.http.build_request(Method::GET, path))
            .await
    }
}
