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

//! VDP command engine (blitter)
//!
//! The part of the V9938/V9958 that executes drawing commands. Commands
//! are started by writing the command register (R#46); the engine then
//! advances whenever the VDP is brought up to date, consuming one VRAM
//! operation per timing quantum.
//!
//! ## Command set
//!
//! ```text
//! Code | Command | Description
//! -----|---------|--------------------------------------------
//! 0-3  | ABORT   | Stop the current command
//! 4    | POINT   | Read a single pixel into COL
//! 5    | PSET    | Write a single pixel
//! 6    | SRCH    | Search along a line for a colour (in)equality
//! 7    | LINE    | Bresenham line
//! 8    | LMMV    | Logical fill rectangle
//! 9    | LMMM    | Logical VRAM-to-VRAM copy
//! A    | LMCM    | Logical VRAM-to-CPU transfer
//! B    | LMMC    | Logical CPU-to-VRAM transfer
//! C    | HMMV    | High-speed (byte) fill rectangle
//! D    | HMMM    | High-speed VRAM-to-VRAM copy
//! E    | YMMM    | High-speed vertical copy
//! F    | HMMC    | High-speed CPU-to-VRAM transfer
//! ```
//!
//! About NX and NY:
//! - for block commands NX = 0 is equivalent to NX = line width and
//!   NY = 0 is equivalent to NY = 1024
//! - when NX or NY is too large and the command hits the border:
//!   the line terminates at the left or right border; the command
//!   terminates at the top border (line 0); at the bottom border
//!   (line 511 or 1023) it continues and wraps to the top.

use serde::{Deserialize, Serialize};

use crate::core::clock::Ticks;
use crate::core::display::DisplayMode;
use crate::core::vram::Vram;

pub mod slots;
#[cfg(test)]
mod tests;

pub use slots::SlotKind;

/// S#2 bit 0: command executing.
pub const STATUS_CE: u8 = 0x01;

/// S#2 bit 4: border detected (SRCH).
pub const STATUS_BD: u8 = 0x10;

/// S#2 bit 7: transfer ready (LMCM/LMMC/HMMC).
pub const STATUS_TR: u8 = 0x80;

// ARG register bits.
const DIY: u8 = 0x08;
const DIX: u8 = 0x04;
const EQ: u8 = 0x02;
const MAJ: u8 = 0x01;

/// Colour mask per screen mode (G4..G7).
const MASK: [u8; 4] = [0x0F, 0x03, 0x0F, 0xFF];

/// Pixels per byte per screen mode.
const PPB: [i32; 4] = [2, 4, 2, 1];

/// Pixels per line per screen mode.
const PPL: [i32; 4] = [256, 512, 512, 256];

// Command timing in VDP ticks per operation, indexed by
// (display enabled) | (sprites disabled << 1):
//               Sprites:    On   On   Off  Off
//               Screen:     Off  On   Off  On
const SRCH_TIMING: [i64; 4] = [92, 125, 92, 92];
const LINE_TIMING: [i64; 4] = [120, 147, 120, 132];
const HMMV_TIMING: [i64; 4] = [49, 65, 49, 62];
const LMMV_TIMING: [i64; 4] = [98, 137, 98, 124];
const YMMM_TIMING: [i64; 4] = [65, 125, 65, 68];
const HMMM_TIMING: [i64; 4] = [92, 136, 92, 97];
const LMMM_TIMING: [i64; 4] = [129, 197, 129, 132];

/// Logical operations (low nibble of the command register).
///
/// The T-prefixed variants are transparent: they skip the write when the
/// source colour is zero. Undefined codes write nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOp {
    Imp,
    And,
    Or,
    Xor,
    Not,
    TImp,
    TAnd,
    TOr,
    TXor,
    TNot,
    Nop,
}

impl Default for LogOp {
    fn default() -> Self {
        LogOp::Imp
    }
}

impl LogOp {
    fn from_nibble(value: u8) -> Self {
        match value & 0x0F {
            0x0 => LogOp::Imp,
            0x1 => LogOp::And,
            0x2 => LogOp::Or,
            0x3 => LogOp::Xor,
            0x4 => LogOp::Not,
            0x8 => LogOp::TImp,
            0x9 => LogOp::TAnd,
            0xA => LogOp::TOr,
            0xB => LogOp::TXor,
            0xC => LogOp::TNot,
            _ => LogOp::Nop,
        }
    }

    fn to_nibble(self) -> u8 {
        match self {
            LogOp::Imp => 0x0,
            LogOp::And => 0x1,
            LogOp::Or => 0x2,
            LogOp::Xor => 0x3,
            LogOp::Not => 0x4,
            LogOp::TImp => 0x8,
            LogOp::TAnd => 0x9,
            LogOp::TOr => 0xA,
            LogOp::TXor => 0xB,
            LogOp::TNot => 0xC,
            LogOp::Nop => 0x5,
        }
    }
}

/// Working state of the command in progress.
///
/// The `sx`/`dx`/`nx`/`ny` fields are the clipped copies taken when the
/// command started; `asx`/`adx`/`anx` are the running cursors. For the
/// LINE command `asx` is the Bresenham error accumulator and `adx` the
/// pixel counter.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct RunState {
    sx: i32,
    dx: i32,
    mx: i32,
    nx: i32,
    ny: i32,
    tx: i32,
    ty: i32,
    cl: u8,
    lo: LogOp,
    asx: i32,
    adx: i32,
    anx: i32,
}

/// VDP command engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmdEngine {
    /// The command engine status bits of S#2 (CE, BD, TR).
    status: u8,

    /// X coordinate latched by SRCH, surfaced through S#8/S#9.
    border_x: u16,

    /// Screen mode the engine operates in: 0..3 for Graphic 4..7,
    /// -1 when the current display mode has no commands.
    scr_mode: i8,

    // Command registers R#32..R#46.
    sx: u16,
    sy: u16,
    dx: u16,
    dy: u16,
    nx: u16,
    ny: u16,
    col: u8,
    arg: u8,
    cmd: u8,
    log_op: LogOp,

    /// Working state of the running command.
    run: RunState,

    /// Budget of VDP ticks not yet turned into operations.
    ops_count: i64,

    /// Moment up to which the engine has been emulated.
    current_time: Ticks,

    /// Access timing index: (display enabled) | (sprites disabled << 1).
    timing_index: u8,

    /// Access slot table for the current VDP state.
    slot_kind: SlotKind,

    /// Commands complete instantly in emulated time.
    instant_timing: bool,

    /// Lowest VRAM address written since the last collection.
    dirty_min: u32,

    /// Highest VRAM address written since the last collection.
    dirty_max: u32,
}

impl CmdEngine {
    /// Create a command engine.
    pub fn new(instant_timing: bool) -> Self {
        Self {
            status: 0,
            border_x: 0,
            scr_mode: -1,
            sx: 0,
            sy: 0,
            dx: 0,
            dy: 0,
            nx: 0,
            ny: 0,
            col: 0,
            arg: 0,
            cmd: 0,
            log_op: LogOp::Imp,
            run: RunState::default(),
            ops_count: 0,
            current_time: 0,
            timing_index: 0,
            slot_kind: SlotKind::ScreenOff,
            instant_timing,
            dirty_min: u32::MAX,
            dirty_max: 0,
        }
    }

    /// Put the engine in its reset state.
    pub fn reset(&mut self, vram: &mut Vram, time: Ticks) {
        self.sync(vram, time);
        self.status = 0;
        self.border_x = 0;
        self.scr_mode = -1;
        self.sx = 0;
        self.sy = 0;
        self.dx = 0;
        self.dy = 0;
        self.nx = 0;
        self.ny = 0;
        self.col = 0;
        self.arg = 0;
        self.cmd = 0;
        self.log_op = LogOp::Imp;
        vram.cmd_read_window.disable();
        vram.cmd_write_window.disable();
    }

    /// Command engine contribution to S#2 (CE, BD, TR bits).
    pub fn status(&mut self, vram: &mut Vram, time: Ticks) -> u8 {
        self.sync(vram, time);
        self.status
    }

    /// The status bits without synchronising (peek).
    pub fn peek_status(&self) -> u8 {
        self.status
    }

    /// Is a command currently executing?
    pub fn command_executing(&self) -> bool {
        self.status & STATUS_CE != 0
    }

    /// The VRAM address range written since the last call, if any.
    ///
    /// The owner uses this to invalidate rasterizer caches for bytes the
    /// command engine changed.
    pub fn take_dirty(&mut self) -> Option<(u32, u32)> {
        if self.dirty_min > self.dirty_max {
            return None;
        }
        let range = (self.dirty_min, self.dirty_max);
        self.dirty_min = u32::MAX;
        self.dirty_max = 0;
        Some(range)
    }

    /// Store a byte and remember the touched range.
    fn cmd_write(&mut self, vram: &mut Vram, addr: u32, value: u8) {
        self.dirty_min = self.dirty_min.min(addr);
        self.dirty_max = self.dirty_max.max(addr);
        vram.write(addr, value);
    }

    /// Transfer a pixel from the VDP to the CPU (S#7 read).
    pub fn read_colour(&mut self, vram: &mut Vram, time: Ticks) -> u8 {
        self.sync(vram, time);
        self.status &= !STATUS_TR;
        self.col
    }

    /// The colour register without the read side effect.
    pub fn peek_colour(&self) -> u8 {
        self.col
    }

    /// SRCH result X coordinate (S#8/S#9).
    pub fn border_x(&mut self, vram: &mut Vram, time: Ticks) -> u16 {
        self.sync(vram, time);
        self.border_x
    }

    /// Inspect a command register (index 0..14 for R#32..R#46).
    pub fn peek_cmd_reg(&self, index: u8) -> u8 {
        match index {
            0x00 => self.sx as u8,
            0x01 => (self.sx >> 8) as u8,
            0x02 => self.sy as u8,
            0x03 => (self.sy >> 8) as u8,
            0x04 => self.dx as u8,
            0x05 => (self.dx >> 8) as u8,
            0x06 => self.dy as u8,
            0x07 => (self.dy >> 8) as u8,
            0x08 => self.nx as u8,
            0x09 => (self.nx >> 8) as u8,
            0x0A => self.ny as u8,
            0x0B => (self.ny >> 8) as u8,
            0x0C => self.col,
            0x0D => self.arg,
            0x0E => (self.cmd << 4) | self.log_op.to_nibble(),
            _ => 0xFF,
        }
    }

    /// Write a command register (index 0..14 for R#32..R#46).
    ///
    /// Writing the command register itself (index 14) starts a command.
    pub fn set_cmd_reg(&mut self, index: u8, value: u8, vram: &mut Vram, time: Ticks) {
        self.sync(vram, time);
        match index {
            0x00 => self.sx = (self.sx & 0x100) | value as u16,
            0x01 => self.sx = (self.sx & 0x0FF) | (((value & 0x01) as u16) << 8),
            0x02 => self.sy = (self.sy & 0x300) | value as u16,
            0x03 => self.sy = (self.sy & 0x0FF) | (((value & 0x03) as u16) << 8),

            0x04 => self.dx = (self.dx & 0x100) | value as u16,
            0x05 => self.dx = (self.dx & 0x0FF) | (((value & 0x01) as u16) << 8),
            0x06 => self.dy = (self.dy & 0x300) | value as u16,
            0x07 => self.dy = (self.dy & 0x0FF) | (((value & 0x03) as u16) << 8),

            0x08 => self.nx = (self.nx & 0x300) | value as u16,
            0x09 => self.nx = (self.nx & 0x0FF) | (((value & 0x03) as u16) << 8),
            0x0A => self.ny = (self.ny & 0x300) | value as u16,
            0x0B => self.ny = (self.ny & 0x0FF) | (((value & 0x03) as u16) << 8),

            0x0C => {
                self.col = value;
                // A CPU-to-VDP transfer consumes the colour register.
                self.status &= !STATUS_TR;
            }
            0x0D => self.arg = value,
            0x0E => {
                self.log_op = LogOp::from_nibble(value);
                self.cmd = value >> 4;
                self.execute_command(vram, time);
            }
            _ => log::warn!("write to nonexistent command register {index}"),
        }
    }

    /// Informs the engine of a display mode change.
    ///
    /// A mode change while a command is in progress aborts the command.
    pub fn update_display_mode(
        &mut self,
        mode: DisplayMode,
        cmd_bit: bool,
        vram: &mut Vram,
        time: Ticks,
    ) {
        let new_mode = match mode.base() {
            DisplayMode::GRAPHIC4 => 0,
            DisplayMode::GRAPHIC5 => 1,
            DisplayMode::GRAPHIC6 => 2,
            DisplayMode::GRAPHIC7 => 3,
            // The V9958 CMD bit allows commands in any mode, with
            // Graphic 7 style addressing.
            _ => {
                if cmd_bit {
                    3
                } else {
                    -1
                }
            }
        };
        if new_mode != self.scr_mode {
            self.sync(vram, time);
            self.scr_mode = new_mode;
            if self.cmd != 0 {
                log::warn!("VDP mode switch while command in progress");
                self.cmd = 0;
                self.command_done(vram);
            }
        }
    }

    /// Informs the engine of changes to the access timing environment.
    pub fn update_timing(&mut self, timing_index: u8, slot_kind: SlotKind, vram: &mut Vram, time: Ticks) {
        if timing_index != self.timing_index || slot_kind != self.slot_kind {
            self.sync(vram, time);
            self.timing_index = timing_index & 0x03;
            self.slot_kind = slot_kind;
        }
    }

    /// Bring the engine up to date with the emulated time.
    pub fn sync(&mut self, vram: &mut Vram, time: Ticks) {
        if time <= self.current_time {
            return;
        }
        if self.cmd == 0 {
            self.current_time = time;
            return;
        }
        self.ops_count += (time - self.current_time) as i64;
        self.current_time = time;
        self.dispatch_execute(vram);
    }

    fn dispatch_execute(&mut self, vram: &mut Vram) {
        match self.cmd {
            0x6 => self.execute_srch(vram),
            0x7 => self.execute_line(vram),
            0x8 => self.execute_lmmv(vram),
            0x9 => self.execute_lmmm(vram),
            0xA => self.execute_lmcm(vram),
            0xB => self.execute_lmmc(vram),
            0xC => self.execute_hmmv(vram),
            0xD => self.execute_hmmm(vram),
            0xE => self.execute_ymmm(vram),
            0xF => self.execute_hmmc(vram),
            _ => {}
        }
    }

    fn timing(&self, table: &[i64; 4]) -> i64 {
        if self.instant_timing {
            0
        } else {
            table[self.timing_index as usize]
        }
    }

    /// Start the command currently in the CMD register.
    fn execute_command(&mut self, vram: &mut Vram, time: Ticks) {
        // V9938 commands only work in Graphic 4..7; the V9958 CMD bit
        // extends them to the remaining modes.
        if self.scr_mode < 0 {
            return;
        }

        log::debug!(
            "command {:X}:{:?} ({},{})->({},{}) col={} n=({},{}) arg={:02X}",
            self.cmd,
            self.log_op,
            self.sx,
            self.sy,
            self.dx,
            self.dy,
            self.col,
            self.nx,
            self.ny,
            self.arg
        );

        self.status |= STATUS_CE;
        self.ops_count = 0;
        // The first operation waits for a VRAM access slot.
        self.current_time = slots::next_access_slot(
            if self.instant_timing {
                SlotKind::Broken
            } else {
                self.slot_kind
            },
            time,
            0,
        );

        match self.cmd {
            0x0..=0x3 => self.command_done(vram),
            0x4 => self.start_point(vram),
            0x5 => self.start_pset(vram),
            0x6 => self.start_srch(vram),
            0x7 => self.start_line(vram),
            0x8 => self.start_lmmv(vram),
            0x9 => self.start_lmmm(vram),
            0xA => self.start_lmcm(vram),
            0xB => self.start_lmmc(vram),
            0xC => self.start_hmmv(vram),
            0xD => self.start_hmmm(vram),
            0xE => self.start_ymmm(vram),
            0xF => self.start_hmmc(vram),
            _ => unreachable!(),
        }

        // Finish the command now if instantaneous timing is active.
        if self.instant_timing && self.cmd != 0 {
            self.dispatch_execute(vram);
        }
    }

    /// Finish the current command.
    fn command_done(&mut self, vram: &mut Vram) {
        self.status &= !STATUS_CE;
        self.cmd = 0;
        vram.cmd_read_window.disable();
        vram.cmd_write_window.disable();
    }

    // --- Pixel addressing -------------------------------------------------

    #[inline(always)]
    fn addr_g4(x: i32, y: i32) -> u32 {
        (((y & 1023) << 7) + ((x & 255) >> 1)) as u32
    }

    #[inline(always)]
    fn addr_g5(x: i32, y: i32) -> u32 {
        (((y & 1023) << 7) + ((x & 511) >> 2)) as u32
    }

    #[inline(always)]
    fn addr_g6(x: i32, y: i32) -> u32 {
        (((x & 2) << 15) + ((y & 511) << 7) + ((x & 511) >> 2)) as u32
    }

    #[inline(always)]
    fn addr_g7(x: i32, y: i32) -> u32 {
        (((x & 1) << 16) + ((y & 511) << 7) + ((x & 255) >> 1)) as u32
    }

    /// Byte address of the pixel at (x, y) in the current screen mode.
    #[inline(always)]
    fn vram_addr(&self, x: i32, y: i32) -> u32 {
        match self.scr_mode {
            0 => Self::addr_g4(x, y),
            1 => Self::addr_g5(x, y),
            2 => Self::addr_g6(x, y),
            _ => Self::addr_g7(x, y),
        }
    }

    /// Read the pixel at (x, y) through the command read window.
    fn point(&self, vram: &Vram, x: i32, y: i32) -> u8 {
        let data = vram.data();
        let window = &vram.cmd_read_window;
        match self.scr_mode {
            0 => (window.read(data, Self::addr_g4(x, y)) >> ((!x & 1) << 2)) & 15,
            1 => (window.read(data, Self::addr_g5(x, y)) >> ((!x & 3) << 1)) & 3,
            2 => (window.read(data, Self::addr_g6(x, y)) >> ((!x & 1) << 2)) & 15,
            _ => window.read(data, Self::addr_g7(x, y)),
        }
    }

    /// Write one pixel, applying the logical operation.
    ///
    /// `colour` is pre-shifted into position and `mask` clears the
    /// target pixel's bits within the byte.
    fn pset_low_level(&mut self, vram: &mut Vram, addr: u32, colour: u8, mask: u8, op: LogOp) {
        let old = || vram.cmd_write_window.read(vram.data(), addr);
        let value = match op {
            LogOp::Imp => (old() & mask) | colour,
            LogOp::And => old() & (colour | mask),
            LogOp::Or => old() | colour,
            LogOp::Xor => old() ^ colour,
            LogOp::Not => (old() & mask) | !(colour | mask),
            LogOp::TImp if colour != 0 => (old() & mask) | colour,
            LogOp::TAnd if colour != 0 => old() & (colour | mask),
            LogOp::TOr if colour != 0 => old() | colour,
            LogOp::TXor if colour != 0 => old() ^ colour,
            LogOp::TNot if colour != 0 => (old() & mask) | !(colour | mask),
            // Transparent writes of colour 0 and undefined operations
            // write nothing.
            _ => return,
        };
        self.cmd_write(vram, addr, value);
    }

    /// Write the pixel at (x, y) in the current screen mode.
    fn pset(&mut self, vram: &mut Vram, x: i32, y: i32, colour: u8, op: LogOp) {
        match self.scr_mode {
            0 => {
                let sh = ((!x & 1) << 2) as u8;
                self.pset_low_level(vram, Self::addr_g4(x, y), colour << sh, !(15 << sh), op);
            }
            1 => {
                let sh = ((!x & 3) << 1) as u8;
                self.pset_low_level(vram, Self::addr_g5(x, y), colour << sh, !(3 << sh), op);
            }
            2 => {
                let sh = ((!x & 1) << 2) as u8;
                self.pset_low_level(vram, Self::addr_g6(x, y), colour << sh, !(15 << sh), op);
            }
            _ => self.pset_low_level(vram, Self::addr_g7(x, y), colour, 0, op),
        }
    }

    // --- Clipping ---------------------------------------------------------
    //
    // The min() partners are computed in 16-bit arithmetic: when the
    // start coordinate already lies past the border, the wrapped result
    // is large and clipping is a no-op, like on the real chip.

    fn clip_nx_src(&mut self) {
        let r = &mut self.run;
        r.nx = if self.arg & DIX != 0 {
            r.nx.min((r.sx + 1) as u16 as i32)
        } else {
            r.nx.min((r.mx - r.sx) as u16 as i32)
        };
    }

    fn clip_nx_dest(&mut self) {
        let r = &mut self.run;
        r.nx = if self.arg & DIX != 0 {
            r.nx.min((r.dx + 1) as u16 as i32)
        } else {
            r.nx.min((r.mx - r.dx) as u16 as i32)
        };
    }

    fn clip_nx_both(&mut self) {
        let r = &mut self.run;
        r.nx = if self.arg & DIX != 0 {
            r.nx.min((r.sx.min(r.dx) + 1) as u16 as i32)
        } else {
            r.nx.min((r.mx - r.sx.max(r.dx)) as u16 as i32)
        };
    }

    fn clip_ny_src(&mut self) {
        if self.arg & DIY != 0 {
            self.run.ny = self.run.ny.min(self.sy as i32 + 1);
        }
    }

    fn clip_ny_dest(&mut self) {
        if self.arg & DIY != 0 {
            self.run.ny = self.run.ny.min(self.dy as i32 + 1);
        }
    }

    fn clip_ny_both(&mut self) {
        if self.arg & DIY != 0 {
            self.run.ny = self.run.ny.min(self.sy.min(self.dy) as i32 + 1);
        }
    }

    // --- Cursor stepping --------------------------------------------------

    /// Advance the destination cursor one step; on row end move to the
    /// next row. Returns true when the command has finished.
    fn step_dest(&mut self, vram: &mut Vram) -> bool {
        self.run.adx += self.run.tx;
        self.run.anx -= 1;
        if self.run.anx == 0 {
            self.dy = self.dy.wrapping_add(self.run.ty as u16);
            self.ny = self.ny.wrapping_sub(1);
            self.run.ny -= 1;
            if self.run.ny == 0 {
                self.command_done(vram);
                return true;
            }
            self.run.adx = self.run.dx;
            self.run.anx = self.run.nx;
        }
        false
    }

    /// Advance source and destination cursors together; on row end move
    /// both to the next row. Returns true when the command has finished.
    fn step_both(&mut self, vram: &mut Vram) -> bool {
        self.run.asx += self.run.tx;
        self.run.adx += self.run.tx;
        self.run.anx -= 1;
        if self.run.anx == 0 {
            self.sy = self.sy.wrapping_add(self.run.ty as u16);
            self.dy = self.dy.wrapping_add(self.run.ty as u16);
            self.ny = self.ny.wrapping_sub(1);
            self.run.ny -= 1;
            if self.run.ny == 0 {
                self.command_done(vram);
                return true;
            }
            self.run.asx = self.run.sx;
            self.run.adx = self.run.dx;
            self.run.anx = self.run.nx;
        }
        false
    }

    #[inline(always)]
    fn dir_x(&self, step: i32) -> i32 {
        if self.arg & DIX != 0 {
            -step
        } else {
            step
        }
    }

    #[inline(always)]
    fn dir_y(&self) -> i32 {
        if self.arg & DIY != 0 {
            -1
        } else {
            1
        }
    }

    // --- POINT / PSET -----------------------------------------------------

    fn start_point(&mut self, vram: &mut Vram) {
        vram.cmd_read_window.set_mask(0x1FFFF, !0u32 << 17);
        vram.cmd_write_window.disable();
        self.col = self.point(vram, self.sx as i32, self.sy as i32);
        self.command_done(vram);
    }

    fn start_pset(&mut self, vram: &mut Vram) {
        vram.cmd_read_window.disable();
        vram.cmd_write_window.set_mask(0x1FFFF, !0u32 << 17);
        let colour = self.col & MASK[self.scr_mode as usize];
        let op = self.log_op;
        self.pset(vram, self.dx as i32, self.dy as i32, colour, op);
        self.command_done(vram);
    }

    // --- SRCH -------------------------------------------------------------

    fn start_srch(&mut self, vram: &mut Vram) {
        vram.cmd_read_window.set_mask(0x1FFFF, !0u32 << 17);
        vram.cmd_write_window.disable();
        self.run = RunState {
            asx: self.sx as i32,
            tx: self.dir_x(1),
            cl: self.col & MASK[self.scr_mode as usize],
            mx: PPL[self.scr_mode as usize],
            // EQ bit: stop on equality or on inequality.
            anx: (self.arg & EQ != 0) as i32,
            ..RunState::default()
        };
    }

    fn execute_srch(&mut self, vram: &mut Vram) {
        let delta = self.timing(&SRCH_TIMING);
        while self.ops_count >= delta {
            self.ops_count -= delta;
            let found =
                (self.point(vram, self.run.asx, self.sy as i32) == self.run.cl)
                    ^ (self.run.anx != 0);
            if found {
                self.status |= STATUS_BD;
                self.border_x = 0xFE00 | (self.run.asx as u16 & 0x1FF);
                self.command_done(vram);
                break;
            }
            self.run.asx += self.run.tx;
            if self.run.asx & self.run.mx != 0 {
                self.status &= !STATUS_BD;
                self.border_x = 0xFE00 | (self.run.asx as u16 & 0x1FF);
                self.command_done(vram);
                break;
            }
        }
    }

    // --- LINE -------------------------------------------------------------

    fn start_line(&mut self, vram: &mut Vram) {
        vram.cmd_read_window.disable();
        vram.cmd_write_window.set_mask(0x1FFFF, !0u32 << 17);
        self.run = RunState {
            dx: self.dx as i32,
            mx: PPL[self.scr_mode as usize],
            nx: self.nx as i32,
            ny: self.ny as i32, // no 0 -> 1024 transform for LINE
            tx: self.dir_x(1),
            ty: self.dir_y(),
            cl: self.col & MASK[self.scr_mode as usize],
            lo: self.log_op,
            asx: (self.nx.wrapping_sub(1) >> 1) as i32,
            adx: 0,
            ..RunState::default()
        };
    }

    fn execute_line(&mut self, vram: &mut Vram) {
        let delta = self.timing(&LINE_TIMING);
        let x_major = self.arg & MAJ == 0;
        while self.ops_count >= delta {
            self.ops_count -= delta;
            let (colour, op) = (self.run.cl, self.run.lo);
            let (x, y) = (self.run.dx, self.dy as i32);
            self.pset(vram, x, y, colour, op);

            if x_major {
                self.run.dx += self.run.tx;
                if self.run.asx < self.run.ny {
                    self.run.asx += self.run.nx;
                    self.dy = self.dy.wrapping_add(self.run.ty as u16);
                }
            } else {
                self.dy = self.dy.wrapping_add(self.run.ty as u16);
                if self.run.asx < self.run.ny {
                    self.run.asx += self.run.nx;
                    self.run.dx += self.run.tx;
                }
            }
            self.run.asx -= self.run.ny;
            self.run.asx &= 1023;
            let last = self.run.adx == self.run.nx;
            self.run.adx += 1;
            if last || (self.run.dx & self.run.mx) != 0 {
                self.command_done(vram);
                break;
            }
        }
    }

    // --- LMMV -------------------------------------------------------------

    fn start_lmmv(&mut self, vram: &mut Vram) {
        vram.cmd_read_window.disable();
        vram.cmd_write_window.set_mask(0x1FFFF, !0u32 << 17);
        let mx = PPL[self.scr_mode as usize];
        self.run = RunState {
            dx: self.dx as i32,
            mx,
            nx: if self.nx != 0 { self.nx as i32 } else { mx },
            ny: if self.ny != 0 { self.ny as i32 } else { 1024 },
            tx: self.dir_x(1),
            ty: self.dir_y(),
            cl: self.col & MASK[self.scr_mode as usize],
            lo: self.log_op,
            ..RunState::default()
        };
        self.clip_nx_dest();
        self.clip_ny_dest();
        self.run.adx = self.run.dx;
        self.run.anx = self.run.nx;
    }

    fn execute_lmmv(&mut self, vram: &mut Vram) {
        let delta = self.timing(&LMMV_TIMING);
        while self.ops_count >= delta {
            self.ops_count -= delta;
            let (colour, op) = (self.run.cl, self.run.lo);
            let (x, y) = (self.run.adx, self.dy as i32);
            self.pset(vram, x, y, colour, op);
            if self.step_dest(vram) {
                break;
            }
        }
    }

    // --- LMMM -------------------------------------------------------------

    fn start_lmmm(&mut self, vram: &mut Vram) {
        vram.cmd_read_window.set_mask(0x1FFFF, !0u32 << 17);
        vram.cmd_write_window.set_mask(0x1FFFF, !0u32 << 17);
        let mx = PPL[self.scr_mode as usize];
        self.run = RunState {
            sx: self.sx as i32,
            dx: self.dx as i32,
            mx,
            nx: if self.nx != 0 { self.nx as i32 } else { mx },
            ny: if self.ny != 0 { self.ny as i32 } else { 1024 },
            tx: self.dir_x(1),
            ty: self.dir_y(),
            lo: self.log_op,
            ..RunState::default()
        };
        self.clip_nx_both();
        self.clip_ny_both();
        self.run.asx = self.run.sx;
        self.run.adx = self.run.dx;
        self.run.anx = self.run.nx;
    }

    fn execute_lmmm(&mut self, vram: &mut Vram) {
        let delta = self.timing(&LMMM_TIMING);
        while self.ops_count >= delta {
            self.ops_count -= delta;
            let colour = self.point(vram, self.run.asx, self.sy as i32);
            let op = self.run.lo;
            let (x, y) = (self.run.adx, self.dy as i32);
            self.pset(vram, x, y, colour, op);
            if self.step_both(vram) {
                break;
            }
        }
    }

    // --- LMCM -------------------------------------------------------------

    fn start_lmcm(&mut self, vram: &mut Vram) {
        vram.cmd_read_window.set_mask(0x1FFFF, !0u32 << 17);
        vram.cmd_write_window.disable();
        let mx = PPL[self.scr_mode as usize];
        self.run = RunState {
            sx: self.sx as i32,
            mx,
            nx: self.nx as i32,
            ny: if self.ny != 0 { self.ny as i32 } else { 1024 },
            tx: self.dir_x(1),
            ty: self.dir_y(),
            ..RunState::default()
        };
        self.clip_nx_src();
        self.clip_ny_src();
        self.run.asx = self.run.sx;
        self.run.anx = self.run.nx;
    }

    fn execute_lmcm(&mut self, vram: &mut Vram) {
        if self.status & STATUS_TR == 0 {
            self.col = self.point(vram, self.run.asx, self.sy as i32);
            self.ops_count -= self.timing(&LMMV_TIMING);
            self.status |= STATUS_TR;

            self.run.asx += self.run.tx;
            self.run.anx -= 1;
            if self.run.anx == 0 {
                self.sy = self.sy.wrapping_add(self.run.ty as u16);
                self.ny = self.ny.wrapping_sub(1);
                self.run.ny -= 1;
                if self.run.ny == 0 {
                    self.command_done(vram);
                } else {
                    self.run.asx = self.run.sx;
                    self.run.anx = self.run.nx;
                }
            }
        }
    }

    // --- LMMC -------------------------------------------------------------

    fn start_lmmc(&mut self, vram: &mut Vram) {
        vram.cmd_read_window.disable();
        vram.cmd_write_window.set_mask(0x1FFFF, !0u32 << 17);
        let mx = PPL[self.scr_mode as usize];
        self.run = RunState {
            dx: self.dx as i32,
            mx,
            nx: self.nx as i32,
            ny: if self.ny != 0 { self.ny as i32 } else { 1024 },
            tx: self.dir_x(1),
            ty: self.dir_y(),
            lo: self.log_op,
            ..RunState::default()
        };
        self.clip_nx_dest();
        self.clip_ny_dest();
        self.run.adx = self.run.dx;
        self.run.anx = self.run.nx;
    }

    fn execute_lmmc(&mut self, vram: &mut Vram) {
        if self.status & STATUS_TR == 0 {
            let colour = self.col & MASK[self.scr_mode as usize];
            let op = self.run.lo;
            let (x, y) = (self.run.adx, self.dy as i32);
            self.pset(vram, x, y, colour, op);
            self.ops_count -= self.timing(&LMMV_TIMING);
            self.status |= STATUS_TR;
            self.step_dest(vram);
        }
    }

    // --- HMMV -------------------------------------------------------------

    fn start_hmmv(&mut self, vram: &mut Vram) {
        vram.cmd_read_window.disable();
        vram.cmd_write_window.set_mask(0x1FFFF, !0u32 << 17);
        let ppb = PPB[self.scr_mode as usize];
        let mx = PPL[self.scr_mode as usize] / ppb;
        let nx = self.nx as i32 / ppb;
        self.run = RunState {
            dx: self.dx as i32 / ppb,
            mx,
            nx: if nx != 0 { nx } else { mx },
            ny: if self.ny != 0 { self.ny as i32 } else { 1024 },
            tx: self.dir_x(ppb),
            ty: self.dir_y(),
            cl: self.col,
            ..RunState::default()
        };
        self.clip_nx_dest();
        self.clip_ny_dest();
        self.run.dx *= ppb;
        self.run.adx = self.run.dx;
        self.run.anx = self.run.nx;
    }

    fn execute_hmmv(&mut self, vram: &mut Vram) {
        let delta = self.timing(&HMMV_TIMING);
        while self.ops_count >= delta {
            self.ops_count -= delta;
            let addr = self.vram_addr(self.run.adx, self.dy as i32);
            let colour = self.run.cl;
            self.cmd_write(vram, addr, colour);
            if self.step_dest(vram) {
                break;
            }
        }
    }

    // --- HMMM -------------------------------------------------------------

    fn start_hmmm(&mut self, vram: &mut Vram) {
        vram.cmd_read_window.set_mask(0x1FFFF, !0u32 << 17);
        vram.cmd_write_window.set_mask(0x1FFFF, !0u32 << 17);
        let ppb = PPB[self.scr_mode as usize];
        let mx = PPL[self.scr_mode as usize] / ppb;
        let nx = self.nx as i32 / ppb;
        self.run = RunState {
            sx: self.sx as i32 / ppb,
            dx: self.dx as i32 / ppb,
            mx,
            nx: if nx != 0 { nx } else { mx },
            ny: if self.ny != 0 { self.ny as i32 } else { 1024 },
            tx: self.dir_x(ppb),
            ty: self.dir_y(),
            ..RunState::default()
        };
        self.clip_nx_both();
        self.clip_ny_both();
        self.run.sx *= ppb;
        self.run.dx *= ppb;
        self.run.asx = self.run.sx;
        self.run.adx = self.run.dx;
        self.run.anx = self.run.nx;
    }

    fn execute_hmmm(&mut self, vram: &mut Vram) {
        let delta = self.timing(&HMMM_TIMING);
        while self.ops_count >= delta {
            self.ops_count -= delta;
            let src = self.vram_addr(self.run.asx, self.sy as i32);
            let dst = self.vram_addr(self.run.adx, self.dy as i32);
            let value = vram.cmd_read_window.read(vram.data(), src);
            self.cmd_write(vram, dst, value);
            if self.step_both(vram) {
                break;
            }
        }
    }

    // --- YMMM -------------------------------------------------------------

    fn start_ymmm(&mut self, vram: &mut Vram) {
        vram.cmd_read_window.set_mask(0x1FFFF, !0u32 << 17);
        vram.cmd_write_window.set_mask(0x1FFFF, !0u32 << 17);
        let ppb = PPB[self.scr_mode as usize];
        let mx = PPL[self.scr_mode as usize] / ppb;
        // The DX column is both source and destination X.
        let x = self.dx as i32 / ppb;
        self.run = RunState {
            sx: x,
            dx: x,
            mx,
            nx: 512, // large enough that clipping decides
            ny: if self.ny != 0 { self.ny as i32 } else { 1024 },
            tx: self.dir_x(ppb),
            ty: self.dir_y(),
            ..RunState::default()
        };
        self.clip_nx_both();
        self.clip_ny_both();
        self.run.sx *= ppb;
        self.run.dx *= ppb;
        self.run.asx = self.run.sx;
        self.run.adx = self.run.dx;
        self.run.anx = self.run.nx;
    }

    fn execute_ymmm(&mut self, vram: &mut Vram) {
        let delta = self.timing(&YMMM_TIMING);
        while self.ops_count >= delta {
            self.ops_count -= delta;
            let src = self.vram_addr(self.run.adx, self.sy as i32);
            let dst = self.vram_addr(self.run.adx, self.dy as i32);
            let value = vram.cmd_read_window.read(vram.data(), src);
            self.cmd_write(vram, dst, value);
            if self.step_both(vram) {
                break;
            }
        }
    }

    // --- HMMC -------------------------------------------------------------

    fn start_hmmc(&mut self, vram: &mut Vram) {
        vram.cmd_read_window.disable();
        vram.cmd_write_window.set_mask(0x1FFFF, !0u32 << 17);
        let ppb = PPB[self.scr_mode as usize];
        let mx = PPL[self.scr_mode as usize] / ppb;
        let nx = self.nx as i32 / ppb;
        self.run = RunState {
            dx: self.dx as i32 / ppb,
            mx,
            nx: if nx != 0 { nx } else { mx },
            ny: if self.ny != 0 { self.ny as i32 } else { 1024 },
            tx: self.dir_x(ppb),
            ty: self.dir_y(),
            ..RunState::default()
        };
        self.clip_nx_dest();
        self.clip_ny_dest();
        self.run.dx *= ppb;
        self.run.adx = self.run.dx;
        self.run.anx = self.run.nx;
    }

    fn execute_hmmc(&mut self, vram: &mut Vram) {
        if self.status & STATUS_TR == 0 {
            let addr = self.vram_addr(self.run.adx, self.dy as i32);
            let colour = self.col;
            self.cmd_write(vram, addr, colour);
            self.ops_count -= self.timing(&HMMV_TIMING);
            self.status |= STATUS_TR;
            self.step_dest(vram);
        }
    }
}
