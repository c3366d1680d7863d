// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

/// Galaxy client errors.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GalaxyError {
    /// Transport error, the server could not be reached or the request failed midway.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with an error status.
    #[error("Galaxy API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Galaxy's `err_code`, if the body carried one.
        code: Option<u64>,
        /// Galaxy's `err_msg`, or the raw body.
        message: String,
    },

    /// Authentication error.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The response body could not be decoded.
    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GalaxyError {
    /// Galaxy's error code for resources that can no longer be modified.
    pub const IMMUTABLE_CODE: u64 = 403_003;

    /// Whether the server refused the operation because the resource is immutable.
    pub fn is_immutable(&self) -> bool {
        matches!(self, Self::Api { code: Some(code), .. } if *code == Self::IMMUTABLE_CODE)
    }
}

impl From<reqwest::Error> for GalaxyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

impl From<serde_json::Error> for GalaxyError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}
