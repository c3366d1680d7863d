// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! SABER - Systematic API Benchmark for (Bio)informatics Endpoint Resources

use std::process::ExitCode;

use saber_cli::run;

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}
