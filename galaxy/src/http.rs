// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP client wrapper with API key handling and Galaxy error decoding.

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::config::GalaxyConfig;
use crate::error::GalaxyError;

const API_KEY_HEADER: &str = "x-api-key";

/// HTTP client for Galaxy API operations.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// Error body returned by Galaxy on failure.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    err_msg: Option<String>,
    #[serde(default)]
    err_code: Option<u64>,
}

impl HttpClient {
    /// Creates a new HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(config: &GalaxyConfig, api_key: Option<String>) -> Result<Self, GalaxyError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: config.normalized_base_url(),
            api_key,
        })
    }

    /// Full URL of an API path, e.g. `histories` → `https://host/api/histories`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Builds a request for an API path with the API key header.
    pub fn build_request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, self.url(path));
        match &self.api_key {
            Some(key) => req.header(API_KEY_HEADER, key),
            None => req,
        }
    }

    /// Executes a request and checks for HTTP errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or returns an error status code.
    pub async fn execute(&self, req: RequestBuilder) -> Result<Response, GalaxyError> {
        let resp = req.send().await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let text = resp
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response".to_string());
        let (message, code) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (body.err_msg.unwrap_or(text), body.err_code),
            Err(_) => (text, None),
        };

        tracing::debug!(%status, ?code, error = %message, "galaxy request failed");
        match status {
            reqwest::StatusCode::UNAUTHORIZED => Err(GalaxyError::Auth(message)),
            _ => Err(GalaxyError::Api {
                status: status.as_u16(),
                code,
                message,
            }),
        }
    }

    /// Executes a request and decodes its JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not the expected JSON.
    pub async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, GalaxyError> {
        let resp = self.execute(req).await?;
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}
