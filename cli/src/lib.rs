// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Command-line interface of SABER.

mod arg;
mod cli;
mod cmd_check;
mod cmd_example_settings;
mod cmd_generate_completion;
mod cmd_run;
mod config;
mod summary;
mod table;

use std::process::ExitCode;

use colored::Colorize;
use tracing_subscriber::EnvFilter;

pub use crate::cli::{Cli, Commands};
pub use crate::config::{Settings, parse_config};

/// Exit code for settings that cannot be loaded.
pub const SETTINGS_EXIT: u8 = 3;

const LOG_ENV: &str = "SABER_LOG";

/// Run the SABER command-line interface.
pub async fn run() -> ExitCode {
    init_tracing();
    let cli = match Cli::parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            return ExitCode::FAILURE;
        }
    };

    // commands report their own failures through the exit code, an error
    // here means the settings could not be loaded or selected
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            ExitCode::from(SETTINGS_EXIT)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
