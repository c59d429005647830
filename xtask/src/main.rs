// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Workspace task runner: `cargo xtask <task>`

use std::process::{Command, ExitCode};

use clap::Parser;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace tasks")]
enum Task {
    /// Format the workspace
    Fmt,
    /// Run clippy with warnings denied
    Lint,
    /// Run the full test suite
    Test,
    /// fmt + lint + test
    Ci,
}

fn run(program: &str, args: &[&str]) -> bool {
    let status = Command::new(program).args(args).status();
    matches!(status, Ok(s) if s.success())
}

fn main() -> ExitCode {
    let ok = match Task::parse() {
        Task::Fmt => run("cargo", &["fmt", "--all"]),
        Task::Lint => run(
            "cargo",
            &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        ),
        Task::Test => run("cargo", &["test", "--workspace"]),
        Task::Ci => {
            run("cargo", &["fmt", "--all", "--", "--check"])
                && run(
                    "cargo",
                    &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
                )
                && run("cargo", &["test", "--workspace"])
        }
    };
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
