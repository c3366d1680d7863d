// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

/// Galaxy authentication method.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(tag = "type")]
pub enum AuthMethod {
    /// No authentication, only anonymous endpoints are reachable.
    #[serde(rename = "none")]
    #[default]
    None,
    /// API key sent with every request.
    #[serde(rename = "api_key")]
    ApiKey {
        /// The user's API key.
        key: String,
    },
    /// Email/password exchanged for an API key when connecting.
    #[serde(rename = "basic")]
    Basic {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
    },
}

/// Galaxy server configuration.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GalaxyConfig {
    /// Base URL of the Galaxy server. A missing scheme defaults to `https://`.
    pub base_url: String,
    /// Authentication method.
    #[serde(default)]
    pub auth: AuthMethod,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl GalaxyConfig {
    /// Creates a configuration for the given server with default settings.
    pub fn new(base_url: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            base_url: base_url.into(),
            auth,
            ..Default::default()
        }
    }

    /// The base URL with a scheme and without a trailing slash.
    pub fn normalized_base_url(&self) -> String {
        let url = self.base_url.trim().trim_end_matches('/');
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{url}")
        }
    }
}

const fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    concat!("saber-galaxy/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for GalaxyConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth: AuthMethod::default(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}
