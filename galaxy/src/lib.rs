// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Galaxy client for driving workflows, histories and jobs on a Galaxy server.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::indexing_slicing,
    clippy::pedantic
)]
// Allow certain clippy lints that are too restrictive for this crate
#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

mod client;
mod config;
mod error;
mod http;
mod types;

pub use crate::client::GalaxyClient;
pub use crate::config::{AuthMethod, GalaxyConfig};
pub use crate::error::GalaxyError;
pub use crate::types::{
    DatasetRef, DatasetState, DatasetSummary, History, Invocation, JobOutput, JobState,
    JobSummary, User, Workflow,
};
