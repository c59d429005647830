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

//! Core emulation components
//!
//! Everything needed to emulate the MSX VDP chip family lives here, in
//! leaves-first dependency order: clock and error types at the bottom,
//! VRAM and the display-mode value object above them, then the sprite
//! checker, command engine and rasterizer, and finally the [`vdp`] module
//! that ties them together and talks to the CPU emulation.

pub mod clock;
pub mod cmd;
pub mod config;
pub mod display;
pub mod error;
pub mod render;
pub mod snapshot;
pub mod sprites;
pub mod vdp;
pub mod vram;

pub use clock::{Ticks, TICKS_PER_LINE, TICKS_PER_SECOND};
pub use config::{VdpConfig, VdpVersion};
pub use display::DisplayMode;
pub use error::{EmulatorError, Result};
pub use vdp::Vdp;
