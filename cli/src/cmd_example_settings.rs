// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, process::ExitCode};

use clap::{ArgMatches, Command};

const EXAMPLE: &str = r#"# Global settings, each can be overridden per instance.
# Keep them above the first [[usegalaxy_instances]] table.

ga_path = "/absolute/path/workflow.ga"  # relative paths are looked up next to this file first
timeout = 1200                          # seconds a workflow may run on one endpoint
clean_history = "onsuccess"             # "never", "always", "onsuccess" or "successful_only"
delete_after = 5                        # days before a leftover test history is purged
history_name = "SABER"
local_upload = true                     # upload inputs through the default endpoint

# One table per workflow input label.
[data_inputs.label_example_name]
url = "change_me"
file_type = "change_me"

[[usegalaxy_instances]]
name = "Main"
url = "usegalaxy.examples"
api = "YOUR_API_KEY"                    # used first when set
# email = "user@example.com"
# password = "password"
endpoints = ["changeme", "changeme_too"]
default_compute_id = "None"             # default non-remote compute
maxwait = 12000                         # upload timeout in seconds
interval = 5                            # seconds between upload state checks
sleep_time = 5                          # seconds between job state checks
"#;

#[derive(Debug, Clone, Copy)]
pub struct CmdExampleSettings;

impl CmdExampleSettings {
    pub const NAME: &str = "example-settings";

    pub fn command() -> Command {
        Command::new(Self::NAME).about("Print an example settings file")
    }

    pub fn from(_matches: &ArgMatches) -> Self {
        Self
    }

    pub fn run(self) -> Result<ExitCode, Box<dyn Error>> {
        print!("{EXAMPLE}");
        Ok(ExitCode::SUCCESS)
    }
}
