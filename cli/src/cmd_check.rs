// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, process::ExitCode};

use clap::{ArgMatches, Command};
use colored::Colorize;
use saber_core::{ExitStatus, InstanceConfig, resolve_workflow_path};

use crate::arg::RunArgs;
use crate::config::Settings;

/// Validates the settings and the workflow paths without contacting any server.
#[derive(Debug, Clone)]
pub struct CmdCheck {
    pub instances: Vec<String>,
}

impl CmdCheck {
    pub const NAME: &str = "check";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Validate the settings without running anything")
            .arg(RunArgs::instance())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            instances: RunArgs::get_instances(matches),
        }
    }

    pub async fn run(self, settings: Settings) -> Result<ExitCode, Box<dyn Error>> {
        tracing::debug!(?self, "checking settings...");
        println!("Settings: {}", settings.path.display());
        let instances = settings.select(&self.instances)?;
        Ok(ExitCode::from(check_all(&instances).await.code()))
    }
}

async fn check_all(instances: &[InstanceConfig]) -> ExitStatus {
    let mut status = ExitStatus::Success;
    for instance in instances {
        if !check_instance(instance).await {
            status = ExitStatus::Path;
        }
    }
    status
}

async fn check_instance(instance: &InstanceConfig) -> bool {
    let endpoints: Vec<_> = instance.endpoints.iter().map(|e| e.label()).collect();
    println!("{} {}", instance.name.bold(), instance.url);
    println!("  endpoints: {}", endpoints.join(", "));
    println!("  inputs: {}", join_keys(instance));

    match resolve_workflow_path(&instance.workflow_path, instance.config_dir.as_deref()).await {
        Ok(path) => {
            println!("  workflow: {} {}", path.display(), "ok".green());
            true
        }
        Err(e) => {
            println!("  workflow: {}", e.to_string().red());
            false
        }
    }
}

fn join_keys(instance: &InstanceConfig) -> String {
    let keys: Vec<_> = instance.data_inputs.keys().map(String::as_str).collect();
    keys.join(", ")
}
