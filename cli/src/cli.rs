// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, ffi::OsString, path::PathBuf, process::ExitCode};

use clap::{ArgMatches, Command, ValueHint, arg, builder::styling, crate_version, value_parser};
use futures::{FutureExt, future::BoxFuture};
use saber_core::APP_NAME;

use crate::cmd_check::CmdCheck;
use crate::cmd_example_settings::CmdExampleSettings;
use crate::cmd_generate_completion::CmdGenerateCompletion;
use crate::cmd_run::CmdRun;
use crate::config::{Settings, parse_config};

/// Command-line interface
#[derive(Debug)]
pub struct Cli {
    /// Path to the settings file
    pub config: Option<PathBuf>,

    /// The command to execute
    pub command: Commands,
}

impl Cli {
    /// Create the command-line interface
    pub fn command() -> Command {
        const STYLES: styling::Styles = styling::Styles::styled()
            .header(styling::AnsiColor::Green.on_default().bold())
            .usage(styling::AnsiColor::Green.on_default().bold())
            .literal(styling::AnsiColor::Blue.on_default().bold())
            .placeholder(styling::AnsiColor::Cyan.on_default());

        Command::new(APP_NAME)
            .about("Systematic API Benchmark for (Bio)informatics Endpoint Resources.")
            .long_about(
                "\
Runs a workflow on every compute endpoint of one or more Galaxy instances, waits for the jobs \
and reports which succeeded, failed or did not finish in time.",
            )
            .version(crate_version!())
            .styles(STYLES)
            .subcommand_required(false) // allow default to run
            .args_conflicts_with_subcommands(true)
            .arg_required_else_help(false)
            .arg(
                arg!(-c --config [CONFIG] "Path to the settings file")
                    .long_help(
                        "\
Path to the settings file. Defaults to $SABER_CONFIG, then $XDG_CONFIG_HOME/saber/settings.toml \
on Linux and MacOS, %APPDATA%/saber/settings.toml on Windows.",
                    )
                    .value_parser(value_parser!(PathBuf))
                    .value_hint(ValueHint::FilePath)
                    .global(true),
            )
            .args(CmdRun::args())
            .subcommand(CmdRun::command())
            .subcommand(CmdCheck::command())
            .subcommand(CmdExampleSettings::command())
            .subcommand(CmdGenerateCompletion::command())
    }

    /// Parse the command-line arguments
    pub fn parse() -> Result<Self, Box<dyn Error>> {
        let commands = Self::command();
        let matches = commands.get_matches();
        Self::from(matches)
    }

    /// Parse the specified arguments
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, Box<dyn Error>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let commands = Self::command();
        let matches = commands.try_get_matches_from(args)?;
        Self::from(matches)
    }

    /// Create a CLI instance from the `ArgMatches`
    pub fn from(matches: ArgMatches) -> Result<Self, Box<dyn Error>> {
        use Commands::*;
        let command = match matches.subcommand() {
            Some((CmdRun::NAME, matches)) => Run(CmdRun::from(matches)),
            Some((CmdCheck::NAME, matches)) => Check(CmdCheck::from(matches)),
            Some((CmdExampleSettings::NAME, matches)) => {
                ExampleSettings(CmdExampleSettings::from(matches))
            }
            Some((CmdGenerateCompletion::NAME, matches)) => {
                GenerateCompletion(CmdGenerateCompletion::from(matches))
            }
            None => Run(CmdRun::from(&matches)),
            Some((name, _)) => return Err(format!("unknown command: {name}").into()),
        };

        let config = matches.get_one("config").cloned();
        Ok(Cli { config, command })
    }

    /// Run the command
    pub async fn run(self) -> Result<ExitCode, Box<dyn Error>> {
        self.command.run(self.config).await
    }
}

/// The commands available in the CLI
#[derive(Debug, Clone)]
pub enum Commands {
    /// Run the tests
    Run(CmdRun),

    /// Validate the settings
    Check(CmdCheck),

    /// Print example settings
    ExampleSettings(CmdExampleSettings),

    /// Generate shell completion
    GenerateCompletion(CmdGenerateCompletion),
}

impl Commands {
    /// Run the command with the given settings file
    pub async fn run(self, config: Option<PathBuf>) -> Result<ExitCode, Box<dyn Error>> {
        use Commands::*;
        match self {
            Run(a) => Self::run_with(config, |x| a.run(x).boxed()).await,
            Check(a) => Self::run_with(config, |x| a.run(x).boxed()).await,
            ExampleSettings(a) => a.run(),
            GenerateCompletion(a) => a.run(),
        }
    }

    async fn run_with<F>(config: Option<PathBuf>, f: F) -> Result<ExitCode, Box<dyn Error>>
    where
        F: FnOnce(Settings) -> BoxFuture<'static, Result<ExitCode, Box<dyn Error>>>,
    {
        tracing::debug!("parsing settings...");
        let settings = parse_config(config).await?;
        f(settings).await
    }
}
