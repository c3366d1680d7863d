// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    error::Error,
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Arg, ArgMatches, Command};
use colored::Colorize;
use saber_core::{ExitStatus, GalaxyConnector, RunReport};

use crate::arg::{ArgOutputFormat, RunArgs};
use crate::config::Settings;
use crate::summary::write_summary;

#[derive(Debug, Clone)]
pub struct CmdRun {
    pub instances: Vec<String>,
    pub output_format: ArgOutputFormat,
    pub output: Option<PathBuf>,
}

impl CmdRun {
    pub const NAME: &str = "run";

    pub fn args() -> Vec<Arg> {
        vec![RunArgs::instance(), ArgOutputFormat::arg(), RunArgs::output()]
    }

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Run the workflow on every endpoint (default)")
            .args(Self::args())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            instances: RunArgs::get_instances(matches),
            output_format: ArgOutputFormat::from(matches),
            output: RunArgs::get_output(matches),
        }
    }

    pub async fn run(self, settings: Settings) -> Result<ExitCode, Box<dyn Error>> {
        tracing::debug!(?self, "running tests...");
        let instances = settings.select(&self.instances)?;

        let report = saber_core::run(&GalaxyConnector, &instances, interrupted()).await;
        if report.interrupted {
            eprintln!("{} stopped by user, results are partial", "Interrupted:".yellow());
        }

        let status = publish(
            &mut io::stdout(),
            self.output_format,
            self.output.as_deref(),
            &report,
        )
        .await;
        Ok(ExitCode::from(status.code()))
    }
}

/// Prints the results and writes them to `output`. Failing to do so raises
/// the status to a path error.
async fn publish(
    out: &mut (impl io::Write + Send),
    format: ArgOutputFormat,
    output: Option<&Path>,
    report: &RunReport,
) -> ExitStatus {
    let json = match serde_json::to_string_pretty(&report.results) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("{} failed to serialize results: {e}", "Error:".red());
            return report.status.max(ExitStatus::Path);
        }
    };

    let mut status = report.status;
    let printed = match format {
        ArgOutputFormat::Json => writeln!(out, "{json}"),
        ArgOutputFormat::Table => write_summary(out, &report.results),
    };
    if let Err(e) = printed {
        eprintln!("{} failed to print results: {e}", "Error:".red());
        status = status.max(ExitStatus::Path);
    }

    match output {
        Some(path) => write_output(path, &json, status).await,
        None => status,
    }
}

async fn write_output(path: &Path, json: &str, status: ExitStatus) -> ExitStatus {
    match tokio::fs::write(path, json).await {
        Ok(()) => {
            tracing::info!(path = %path.display(), "results written");
            status
        }
        Err(e) => {
            eprintln!(
                "{} failed to write results to {}: {e}",
                "Error:".red(),
                path.display()
            );
            status.max(ExitStatus::Path)
        }
    }
}

/// Resolves on Ctrl-C, never if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(err = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
