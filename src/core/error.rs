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

//! Emulator error types
//!
//! Only construction-time problems (bad configuration, unreadable files,
//! corrupt save states) surface as errors. Runtime misbehaviour of the
//! emulated program is absorbed by the core and reflected in the VDP
//! status registers, exactly as on real hardware.

use thiserror::Error;

/// Errors that can occur in the emulation core
#[derive(Error, Debug)]
pub enum EmulatorError {
    /// The configured VRAM size is not one the VDP supports
    #[error("VRAM size of {0}kB is not supported (expected 16, 64 or 128)")]
    UnsupportedVramSize(u32),

    /// The configured VDP version string could not be recognized
    #[error("unknown VDP version \"{0}\"")]
    UnknownVdpVersion(String),

    /// Invalid configuration file contents
    #[error("configuration error: {0}")]
    Config(String),

    /// Save state (de)serialization failure
    #[error("save state error: {0}")]
    SaveState(String),

    /// Underlying I/O failure (config files, VRAM images)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, EmulatorError>;
