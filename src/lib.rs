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

//! msxrx: an MSX video display processor (VDP) emulation core
//!
//! This crate emulates the VDP family used in MSX home computers:
//! TMS9918A/TMS9928A (MSX1), V9938 (MSX2) and V9958 (MSX2+/turbo R).
//!
//! # Architecture
//!
//! The emulation core is organized into the following modules:
//!
//! - [`core`]: Core emulation components (VDP, VRAM, command engine,
//!   sprite checker, rasterizer)
//!
//! # Example
//!
//! ```
//! use msxrx::core::config::VdpConfig;
//! use msxrx::core::render::NullRasterizer;
//! use msxrx::core::vdp::Vdp;
//!
//! let mut vdp = Vdp::new(VdpConfig::default(), Box::new(NullRasterizer)).unwrap();
//! vdp.reset(0);
//! // Write the VRAM address setup to port 1, then a data byte to port 0.
//! vdp.write_port(1, 0x00, 100);
//! vdp.write_port(1, 0x40, 200);
//! vdp.write_port(0, 0xAB, 300);
//! # Ok::<(), msxrx::EmulatorError>(())
//! ```
//!
//! # Getting Started
//!
//! 1. Create a [`core::vdp::Vdp`] with a [`core::config::VdpConfig`] and a
//!    rasterizer implementation
//! 2. Drive it from the CPU emulation through `read_port` / `write_port`
//! 3. Call `execute_until` for every due sync point reported by the VDP
//!
//! # Modules
//!
//! - [`core::vdp`]: Top-level VDP state machine, I/O ports, scheduling
//! - [`core::vram`]: Video memory and table windows
//! - [`core::cmd`]: Command engine (blitter)
//! - [`core::sprites`]: Sprite visibility and collision checking
//! - [`core::render`]: Rasterizer and pixel converters
//!
//! # Error Handling
//!
//! All fallible operations return [`core::error::Result<T>`] which is an alias for
//! `Result<T, EmulatorError>`.

pub mod core;

// Re-export commonly used types
pub use crate::core::error::{EmulatorError, Result};
