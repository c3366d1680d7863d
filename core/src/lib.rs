// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Execution and monitoring engine of SABER.
//!
//! For every configured Galaxy instance a [`Session`] creates a disposable
//! history, uploads the workflow and its inputs, then invokes the workflow
//! once per compute endpoint. Jobs are polled until they finish or a timeout
//! elapses, classified into [`Bucket`]s, and their outputs tagged. The
//! [`run`] orchestrator drives one session per instance and folds everything
//! into [`RunResults`] and one [`ExitStatus`].

mod config;
mod monitor;
mod outcome;
mod remote;
mod runner;
mod session;
mod tagger;

pub use crate::config::{
    APP_NAME, ConfigError, Credential, DataInput, Endpoint, InstanceConfig, RawConfig,
    RawInstance, RetentionPolicy,
};
pub use crate::monitor::{DrainProbe, Probe, UploadProbe, Wait, WarmupProbe};
pub use crate::outcome::{
    Bucket, EndpointResults, ExitStatus, InstanceResults, JobRecord, RunResults,
};
pub use crate::remote::{Connector, ExecutionService, GalaxyConnector};
pub use crate::runner::{RunReport, run};
pub use crate::session::{Session, SessionError, normalize_name, resolve_workflow_path};
pub use crate::tagger::{TagLedger, Tagger};
