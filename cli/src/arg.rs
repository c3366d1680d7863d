// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, ValueHint, arg, value_parser};

/// The output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ArgOutputFormat {
    Json,
    Table,
}

impl ArgOutputFormat {
    pub fn arg() -> Arg {
        arg!(--"output-format" <FORMAT> "Output format")
            .value_parser(value_parser!(ArgOutputFormat))
            .default_value("table")
    }

    pub fn from(matches: &ArgMatches) -> Self {
        matches
            .get_one("output-format")
            .copied()
            .unwrap_or(ArgOutputFormat::Table)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunArgs;

impl RunArgs {
    pub fn instance() -> Arg {
        arg!(--instance <NAME> "Only test the named instance, can be repeated")
            .action(ArgAction::Append)
    }

    pub fn get_instances(matches: &ArgMatches) -> Vec<String> {
        matches
            .get_many::<String>("instance")
            .map(|names| names.cloned().collect())
            .unwrap_or_default()
    }

    pub fn output() -> Arg {
        arg!(-o --output <FILE> "Write the JSON results to a file")
            .value_parser(value_parser!(PathBuf))
            .value_hint(ValueHint::FilePath)
    }

    pub fn get_output(matches: &ArgMatches) -> Option<PathBuf> {
        matches.get_one("output").cloned()
    }
}
