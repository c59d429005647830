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

//! Save states
//!
//! Serializes the persisted VDP state: emulated time, control registers,
//! palette, VRAM contents, the command engine cursor and the sprite
//! collision latch. All fields round-trip bit-exactly through bincode.
//!
//! Rendering caches and the partially drawn frame are not part of a save
//! state; after a restore the first frame is rendered from the restore
//! point onwards.

use serde::{Deserialize, Serialize};

use super::clock::Ticks;
use super::cmd::CmdEngine;
use super::config::VdpVersion;
use super::display::DisplayMode;
use super::error::{EmulatorError, Result};

/// Serialized state of a [`super::vdp::Vdp`].
#[derive(Serialize, Deserialize, Clone)]
pub struct VdpSnapshot {
    /// Chip version the snapshot was taken from.
    pub version: VdpVersion,

    /// Moment up to which the VDP was emulated.
    pub current_time: Ticks,

    /// Start time of the frame in progress.
    pub frame_start_time: Ticks,

    /// Control registers R#0..R#31.
    pub control_regs: [u8; 32],

    /// Palette registers (GRB).
    pub palette: [u16; 16],

    /// Status register 0 (F bit).
    pub status_reg0: u8,

    /// Status register 2 (E/O and fixed bits).
    pub status_reg2: u8,

    /// Sprite checker status bits of S#0.
    pub sprite_status: u8,

    /// Latched sprite collision coordinates (x, y).
    pub collision: (u16, u16),

    /// Text blink phase and countdown.
    pub blink_state: bool,
    pub blink_count: i32,

    /// I/O port latches.
    pub data_latch: u8,
    pub register_data_stored: bool,
    pub palette_data_stored: bool,
    pub read_ahead: u8,

    /// VRAM access pointer (low 14 bits).
    pub vram_pointer: u32,

    /// Display mode in effect (committed, not the raw mode bits).
    pub display_mode: DisplayMode,

    /// Per-frame latched timing state.
    pub pal_timing: bool,
    pub interlaced: bool,
    pub line_zero: i32,
    pub horizontal_adjust: i32,
    pub vertical_adjust: i32,
    pub is_display_area: bool,
    pub display_enabled: bool,
    pub display_start: u64,

    /// Interrupt line levels.
    pub irq_vertical: bool,
    pub irq_horizontal: bool,

    /// Render progress within the frame (ticks / lines).
    pub next_render_x: i32,
    pub next_render_y: i32,
    pub render_display_enabled: bool,

    /// Complete command engine state (R#32..R#46 and the cursor).
    pub cmd: CmdEngine,

    /// VRAM contents.
    pub vram: Vec<u8>,
}

impl VdpSnapshot {
    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| EmulatorError::SaveState(e.to_string()))
    }

    /// Deserialize from bytes produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (snapshot, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| EmulatorError::SaveState(e.to_string()))?;
        Ok(snapshot)
    }
}
