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

//! Unified implementation of the MSX Video Display Processors.
//!
//! MSX1 VDP is Texas Instruments TMS9918A or TMS9928A. MSX2 VDP is
//! Yamaha V9938. MSX2+ and turbo R VDP is Yamaha V9958.
//!
//! The VDP core owns the VRAM, the command engine, the sprite checker
//! and a [`Rasterizer`] handle, and converts the stream of I/O port
//! accesses from the CPU emulation into rendered frames, status register
//! values and interrupt line changes.
//!
//! ## I/O ports
//!
//! ```text
//! Port | Write                    | Read
//! -----|--------------------------|------------------
//! 0    | VRAM data                | VRAM data (read ahead)
//! 1    | Register/address setup   | Status register (R#15 selects)
//! 2    | Palette data (two-phase) | -
//! 3    | Indirect register data   | -
//! ```
//!
//! ## Timing
//!
//! All entry points take an absolute timestamp in VDP ticks. The VDP
//! schedules its own sync points (VSYNC, display start, vertical and
//! horizontal scan, the next-line deferrals for mode/blank/adjust
//! changes) and processes any that are due before the entry point's own
//! work. A host drives the core with [`Vdp::execute_until`] and the
//! I/O methods; [`Vdp::next_sync`] tells it when the next self-driven
//! event happens.
//!
//! A note about timing: the start of a frame or line is defined as the
//! starting time of the corresponding sync (vsync, hsync).

use crate::core::clock::{ticks_per_frame, FrameClock, Ticks, TICKS_PER_LINE};
use crate::core::cmd::{CmdEngine, SlotKind};
use crate::core::config::{VdpConfig, VdpVersion};
use crate::core::display::DisplayMode;
use crate::core::error::{EmulatorError, Result};
use crate::core::render::{
    palette::V9938_DEFAULT_PALETTE, FrameView, Rasterizer, RawFrameView, RenderState,
};
use crate::core::sprites::SpriteChecker;
use crate::core::vram::{interleave, Vram, VramObserver};

pub mod registers;
#[cfg(test)]
mod tests;

use registers::{control_reg_mask, control_value_masks, Reg0, Reg1, Reg8, Status0, Status2};

/// Time at which the internal VDP display line counter is reset,
/// expressed in ticks after vsync. Measurements on an NMS8250 put it at
/// line 15, one line earlier than expected.
const LINE_COUNT_RESET_TICKS: i64 = 15 * TICKS_PER_LINE as i64;

/// The two interrupt request lines of the VDP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqLine {
    /// Vertical scanning interrupt (IE0 / S#0 F).
    Vertical,
    /// Horizontal scanning interrupt (IE1 / S#1 FH).
    Horizontal,
}

/// Host callback invoked on interrupt line edges.
pub type IrqCallback = Box<dyn FnMut(IrqLine, bool)>;

/// Types of VDP sync points that can be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncType {
    /// Vertical sync: the transition from one frame to the next.
    VSync,
    /// Start of the display area.
    DisplayStart,
    /// Vertical scanning: end of display.
    VScan,
    /// Horizontal scanning: line interrupt.
    HScan,
    /// Horizontal adjust change, committed at the next line.
    HorAdjust,
    /// Display mode change, committed at the next line.
    SetMode,
    /// Display enable change, committed at the next line.
    SetBlank,
}

#[derive(Debug, Clone, Copy)]
struct SyncPoint {
    time: Ticks,
    sync: SyncType,
}

/// What a subdivided render region draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrawType {
    Border,
    Display,
    Sprites,
}

/// The VDP core.
pub struct Vdp {
    /// VDP version.
    version: VdpVersion,

    /// Emulation configuration.
    config: VdpConfig,

    /// Video RAM and table windows.
    pub(crate) vram: Vram,

    /// Command engine.
    pub(crate) cmd: CmdEngine,

    /// Sprite checker.
    pub(crate) sprites: SpriteChecker,

    /// Rasterizer that converts this VDP's state into an image.
    rasterizer: Box<dyn Rasterizer>,

    /// Pending sync points.
    syncs: Vec<SyncPoint>,

    /// The emulation time when this frame was started (vsync).
    pub(crate) frame_clock: FrameClock,

    /// Moment up to which this VDP has been emulated.
    pub(crate) current_time: Ticks,

    /// Vertical IRQ line state.
    irq_vertical: bool,

    /// Horizontal IRQ line state.
    irq_horizontal: bool,

    /// Host notification for IRQ line edges.
    irq_callback: Option<IrqCallback>,

    /// Is the current scan position inside the display area?
    is_display_area: bool,

    /// Is the display enabled? Follows R#1 bit 6 with one line delay.
    display_enabled: bool,

    /// VDP ticks between start of frame and start of display.
    display_start: u64,

    /// VDP ticks between start of frame and the horizontal scan match.
    horizontal_scan_offset: i64,

    /// Time of the last scheduled DISPLAY_START sync point.
    display_start_sync_time: Ticks,

    /// Time of the last scheduled VSCAN sync point.
    v_scan_sync_time: Ticks,

    /// Time of the last scheduled HSCAN sync point.
    h_scan_sync_time: Ticks,

    /// Is PAL timing active? Fixed at the start of each frame.
    pub(crate) pal_timing: bool,

    /// Is interlace active? Fixed at the start of each frame.
    interlaced: bool,

    /// Absolute line number of display line zero.
    line_zero: i32,

    /// Horizontal display adjust, updated at the start of a line.
    horizontal_adjust: i32,

    /// Vertical display adjust, updated at the start of a frame.
    vertical_adjust: i32,

    /// Control registers R#0..R#31.
    pub(crate) control_regs: [u8; 32],

    /// Mask on the control register index.
    control_reg_mask: u8,

    /// Mask on the values of control registers.
    control_value_masks: [u8; 32],

    /// Status register 0: only bit 7 (F); the rest comes from the
    /// sprite checker.
    pub(crate) status_reg0: u8,

    /// Status register 1: only the version bits; FH is computed.
    status_reg1: u8,

    /// Status register 2: E/O and the fixed bits; the rest is computed.
    pub(crate) status_reg2: u8,

    /// V9938 palette registers (GRB).
    pub(crate) palette: [u16; 16],

    /// Blinking state: should alternate colour / page be displayed?
    pub(crate) blink_state: bool,

    /// Frames until the next blink state flip; 0 when stable.
    pub(crate) blink_count: i32,

    /// VRAM address mask (VRAM size minus one).
    vram_mask: u32,

    /// First byte written through port 1, 2 or 3.
    pub(crate) data_latch: u8,

    /// Is a register write first byte latched (port 1)?
    pub(crate) register_data_stored: bool,

    /// Is a palette write first byte latched (port 2)?
    pub(crate) palette_data_stored: bool,

    /// VRAM read-ahead byte for port 0 reads.
    pub(crate) read_ahead: u8,

    /// Does the CPU interface access extended VRAM (R#45 MXC)?
    cpu_extended_vram: bool,

    /// Current display mode. Mode changes only take effect at the start
    /// of the next line, so this can differ from the register bits.
    pub(crate) display_mode: DisplayMode,

    /// Lower 14 bits of the VRAM access pointer.
    pub(crate) vram_pointer: u32,

    // Render progress within the current frame.
    /// Render position X in ticks.
    next_render_x: i32,

    /// Render position Y in absolute lines.
    next_render_y: i32,

    /// Display-enable state as the renderer last saw it.
    render_display_enabled: bool,
}

impl Vdp {
    /// Create a VDP.
    ///
    /// # Arguments
    ///
    /// * `config` - Chip version and emulation options
    /// * `rasterizer` - Consumer of the rendered output; use
    ///   [`crate::core::render::NullRasterizer`] for headless operation
    ///
    /// # Errors
    ///
    /// Fails when the configuration names an unsupported VRAM size.
    pub fn new(config: VdpConfig, rasterizer: Box<dyn Rasterizer>) -> Result<Self> {
        config.validate()?;
        let vram_size = config.effective_vram_kb() as usize * 1024;
        if !matches!(vram_size, 0x4000 | 0x10000 | 0x20000) {
            return Err(EmulatorError::UnsupportedVramSize(config.vram_kb));
        }
        let version = config.version;
        log::info!(
            "VDP: {:?}, {}kB VRAM",
            version,
            config.effective_vram_kb()
        );
        let mut vdp = Self {
            version,
            vram: Vram::new(vram_size),
            cmd: CmdEngine::new(config.instant_cmd_timing),
            sprites: SpriteChecker::new(config.limit_sprites),
            rasterizer,
            syncs: Vec::new(),
            frame_clock: FrameClock::new(0),
            current_time: 0,
            irq_vertical: false,
            irq_horizontal: false,
            irq_callback: None,
            is_display_area: false,
            display_enabled: false,
            display_start: 0,
            horizontal_scan_offset: 0,
            display_start_sync_time: 0,
            v_scan_sync_time: 0,
            h_scan_sync_time: 0,
            pal_timing: true,
            interlaced: false,
            line_zero: 0,
            horizontal_adjust: 7,
            vertical_adjust: 0,
            control_regs: [0; 32],
            control_reg_mask: control_reg_mask(version),
            control_value_masks: control_value_masks(version),
            status_reg0: 0,
            status_reg1: 0,
            status_reg2: 0x0C,
            palette: [0; 16],
            blink_state: false,
            blink_count: 0,
            vram_mask: (vram_size - 1) as u32,
            data_latch: 0,
            register_data_stored: false,
            palette_data_stored: false,
            read_ahead: 0,
            cpu_extended_vram: false,
            display_mode: DisplayMode::default(),
            vram_pointer: 0,
            next_render_x: 0,
            next_render_y: 0,
            render_display_enabled: false,
            config,
        };
        vdp.reset(0);
        Ok(vdp)
    }

    /// Register a callback for interrupt line edges.
    pub fn set_irq_callback(&mut self, callback: IrqCallback) {
        self.irq_callback = Some(callback);
    }

    /// Is the vertical interrupt line active?
    pub fn irq_vertical(&self) -> bool {
        self.irq_vertical
    }

    /// Is the horizontal interrupt line active?
    pub fn irq_horizontal(&self) -> bool {
        self.irq_horizontal
    }

    /// The configured VDP version.
    pub fn version(&self) -> VdpVersion {
        self.version
    }

    /// The active emulation configuration.
    pub fn config(&self) -> &VdpConfig {
        &self.config
    }

    /// Is this an MSX1 VDP?
    #[inline(always)]
    pub fn is_msx1(&self) -> bool {
        self.version.is_msx1()
    }

    /// The display mode currently in effect.
    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    /// The most recently completed frame, if the rasterizer keeps one.
    pub fn frame(&self) -> Option<RawFrameView<'_>> {
        self.rasterizer.raw_frame()
    }

    /// Read access to the VRAM, for debuggers and tests.
    pub fn vram(&self) -> &Vram {
        &self.vram
    }

    /// Preload the VRAM from an image, bypassing the CPU interface.
    ///
    /// Intended for tooling; emulated programs go through port 0.
    pub fn load_vram_image(&mut self, image: &[u8]) {
        self.vram.load_image(image);
        for line in 0..(self.vram.size() as u32 >> 7) {
            self.rasterizer.update_vram_cache(line << 7);
        }
    }

    /// Time of the earliest pending self-driven sync point.
    pub fn next_sync(&self) -> Option<Ticks> {
        self.syncs.iter().map(|s| s.time).min()
    }

    /// Bring the VDP (and all subsystems) up to date.
    ///
    /// Any sync points due before `time` are processed in order.
    pub fn execute_until(&mut self, time: Ticks) {
        self.process_syncs_until(time);
        self.sync_subsystems(time);
    }

    /// Puts the VDP in its power-on state.
    pub fn reset(&mut self, time: Ticks) {
        self.syncs.clear();
        self.cmd.sync(&mut self.vram, time);
        self.flush_cmd_dirty();
        self.reset_init();
        self.sprites.reset(time, self.pal_timing);
        self.cmd.reset(&mut self.vram, time);
        let state = self.render_state();
        self.rasterizer.reset(&state, &self.palette);
        self.reset_masks();
        self.cmd
            .update_display_mode(self.display_mode, false, &mut self.vram, time);
        self.update_cmd_timing(time);
        self.render_display_enabled = false;
        self.frame_start(time);
        self.current_time = time;
    }

    /// Called both on construction and on reset: register state only.
    fn reset_init(&mut self) {
        self.control_regs = [0; 32];
        if self.version == VdpVersion::Tms9929a {
            // Boots (and remains) in PAL mode; all other VDPs boot NTSC.
            self.control_regs[9] |= 0x02;
        }
        self.pal_timing = self.control_regs[9] & 0x02 != 0;
        self.display_mode.reset();
        self.vram_pointer = 0;
        self.read_ahead = 0;
        self.data_latch = 0;
        self.cpu_extended_vram = false;
        self.register_data_stored = false;
        self.palette_data_stored = false;
        self.blink_state = false;
        self.blink_count = 0;
        self.horizontal_adjust = 7;
        self.vertical_adjust = 0;

        self.is_display_area = false;
        self.display_enabled = false;

        self.status_reg0 = 0;
        self.status_reg1 = if self.version == VdpVersion::V9958 {
            0x04
        } else {
            0x00
        };
        self.status_reg2 = 0x0C;

        self.set_vertical_irq(false);
        self.set_horizontal_irq(false);

        self.palette = V9938_DEFAULT_PALETTE;
    }

    /// Companion to `reset_init`: distribute the reset base masks to the
    /// VDP subsystems.
    fn reset_masks(&mut self) {
        self.vram
            .name_table
            .set_mask(!(!0u32 << 10), !0u32 << 17);
        let time = self.current_time;
        self.update_colour_base(time);
        self.update_pattern_base(time);
        self.update_sprite_attribute_base(time);
        self.update_sprite_pattern_base(time);
        self.vram.bitmap_window.disable();
    }

    // --- Derived state ----------------------------------------------------

    /// Number of VDP ticks per frame with the current timing standard.
    #[inline(always)]
    pub fn ticks_per_frame(&self) -> u64 {
        ticks_per_frame(self.pal_timing)
    }

    /// Number of display lines: 192 or 212.
    #[inline(always)]
    fn number_of_lines(&self) -> i64 {
        if self.control_regs[9] & 0x80 != 0 {
            212
        } else {
            192
        }
    }

    /// Is the display enabled? Both border and forced blanking count as
    /// disabled.
    #[inline(always)]
    fn is_display_enabled(&self) -> bool {
        self.is_display_area && self.display_enabled
    }

    /// Are sprites enabled in the current state?
    #[inline(always)]
    fn sprites_enabled(&self) -> bool {
        self.display_enabled
            && !self.display_mode.is_text_mode()
            && self.control_regs[8] & Reg8::SPD.bits() == 0
    }

    /// Ticks between line start and the sprite plane.
    #[inline(always)]
    fn left_sprites(&self) -> i32 {
        100 + 102
            + 56
            + (self.horizontal_adjust - 7) * 4
            + if self.display_mode.is_text_mode() { 36 } else { 0 }
    }

    /// Ticks between line start and the end of the left border.
    #[inline(always)]
    fn left_border(&self) -> i32 {
        self.left_sprites() + if self.is_border_masked() { 8 * 4 } else { 0 }
    }

    /// Ticks between line start and the start of the right border.
    #[inline(always)]
    fn right_border(&self) -> i32 {
        self.left_sprites() + if self.display_mode.is_text_mode() { 960 } else { 1024 }
    }

    /// Ticks between line start and background X coordinate 0, which
    /// includes the horizontal scroll low pixels.
    #[inline(always)]
    fn left_background(&self) -> i32 {
        self.left_sprites() + (self.control_regs[27] as i32) * 4
    }

    /// Border mask: extend the left border by 8 pixels (V9958).
    #[inline(always)]
    fn is_border_masked(&self) -> bool {
        self.control_regs[25] & 0x02 != 0
    }

    /// Horizontal retrace flag for S#2.
    fn get_hr(&self, ticks_this_frame: i64) -> bool {
        let line = TICKS_PER_LINE as i64;
        ((ticks_this_frame + line - self.right_border() as i64) % line)
            < line - if self.display_mode.is_text_mode() { 960 } else { 1024 }
    }

    /// Snapshot of the state the rasterizer draws from.
    fn render_state(&self) -> RenderState {
        let r = &self.control_regs;
        RenderState {
            mode: self.display_mode,
            pal_timing: self.pal_timing,
            interlaced: self.interlaced,
            even_odd_mask: (((!r[9] & 4) as i32) << 6) | (((self.status_reg2 & 2) as i32) << 7),
            fg_colour: r[7] >> 4,
            bg_colour: r[7] & 0x0F,
            border_colour_g7: r[7],
            blink_fg_colour: r[12] >> 4,
            blink_bg_colour: r[12] & 0x0F,
            blink_state: self.blink_state,
            transparency: r[8] & Reg8::TP.bits() == 0,
            vertical_scroll: r[23],
            hscroll_low: r[27] & 0x07,
            hscroll_high: r[26],
            multi_page: r[25] & 0x01 != 0 && r[2] & 0x20 != 0,
            line_zero: self.line_zero,
            left_background: self.left_background(),
            left_sprites: self.left_sprites(),
            msx1: self.is_msx1(),
        }
    }

    // --- Synchronisation --------------------------------------------------

    fn set_sync_point(&mut self, time: Ticks, sync: SyncType) {
        self.syncs.push(SyncPoint { time, sync });
    }

    fn remove_sync_point(&mut self, sync: SyncType) {
        self.syncs.retain(|s| s.sync != sync);
    }

    /// Schedule a sync point at the start of the next line.
    fn sync_at_next_line(&mut self, sync: SyncType, time: Ticks) {
        let line = self.frame_clock.ticks_till(time) / TICKS_PER_LINE;
        let next = self.frame_clock.add((line + 1) * TICKS_PER_LINE);
        self.set_sync_point(next, sync);
    }

    /// Process all pending sync points up to and including `time`.
    fn process_syncs_until(&mut self, time: Ticks) {
        loop {
            let mut best: Option<usize> = None;
            for (i, sp) in self.syncs.iter().enumerate() {
                if sp.time <= time && best.map_or(true, |b| sp.time < self.syncs[b].time) {
                    best = Some(i);
                }
            }
            let Some(i) = best else { break };
            let sp = self.syncs.swap_remove(i);
            self.sync_subsystems(sp.time);
            self.execute_sync(sp.time, sp.sync);
        }
    }

    /// Bring the renderer, sprite checker and command engine up to date.
    fn sync_subsystems(&mut self, time: Ticks) {
        if time <= self.current_time {
            return;
        }
        self.render_until(time);
        self.sprites.check_until(&self.vram, time);
        self.cmd.sync(&mut self.vram, time);
        self.flush_cmd_dirty();
        self.current_time = time;
    }

    /// Invalidate rasterizer caches for bytes the command engine wrote.
    fn flush_cmd_dirty(&mut self) {
        if let Some((low, high)) = self.cmd.take_dirty() {
            for line in (low >> 7)..=(high >> 7) {
                self.rasterizer.update_vram_cache(line << 7);
            }
        }
    }

    /// Handle one sync point. Subsystems are already up to date.
    fn execute_sync(&mut self, time: Ticks, sync: SyncType) {
        match sync {
            SyncType::VSync => {
                // This frame is finished.
                self.rasterizer.frame_end();
                self.frame_start(time);
            }
            SyncType::DisplayStart => {
                // Display area starts here, unless we're doing overscan
                // and it was already active.
                if !self.is_display_area {
                    self.is_display_area = true;
                    if self.display_enabled {
                        self.propagate_display_enabled(true, time);
                    }
                }
            }
            SyncType::VScan => {
                // End of display.
                if self.is_display_enabled() {
                    self.propagate_display_enabled(false, time);
                }
                self.is_display_area = false;

                // Vertical scanning occurs.
                self.status_reg0 |= Status0::F.bits();
                if self.control_regs[1] & Reg1::IE0.bits() != 0 {
                    self.set_vertical_irq(true);
                }
            }
            SyncType::HScan => {
                // Horizontal scanning occurs.
                if self.control_regs[0] & Reg0::IE1.bits() != 0 {
                    self.set_horizontal_irq(true);
                }
            }
            SyncType::HorAdjust => {
                let mut new_adjust = (self.control_regs[18] & 0x0F) as i32 ^ 0x07;
                if self.control_regs[25] & 0x08 != 0 {
                    new_adjust += 4;
                }
                self.horizontal_adjust = new_adjust;
            }
            SyncType::SetMode => {
                let mode = DisplayMode::new(
                    self.control_regs[0],
                    self.control_regs[1],
                    self.control_regs[25],
                );
                self.update_display_mode(mode, time);
            }
            SyncType::SetBlank => {
                let new_enabled = self.control_regs[1] & Reg1::BL.bits() != 0;
                if new_enabled != self.display_enabled {
                    if self.is_display_area {
                        self.propagate_display_enabled(new_enabled, time);
                    }
                    self.display_enabled = new_enabled;
                    self.update_cmd_timing(time);
                }
            }
        }
    }

    /// Tell the subsystems the effective display-enable state changed.
    fn propagate_display_enabled(&mut self, enabled: bool, time: Ticks) {
        self.render_display_enabled = enabled;
        self.sprites
            .update_display_enabled(enabled, &self.vram, time);
        self.update_cmd_timing(time);
    }

    /// Refresh the command engine's view of the access timing.
    fn update_cmd_timing(&mut self, time: Ticks) {
        let display = self.is_display_enabled();
        let timing_index = (display as u8) | (self.control_regs[8] & Reg8::SPD.bits());
        let slot_kind = SlotKind::select(
            self.is_msx1(),
            display,
            self.control_regs[8] & Reg8::SPD.bits() == 0,
            self.display_mode,
        );
        self.cmd
            .update_timing(timing_index, slot_kind, &mut self.vram, time);
        self.flush_cmd_dirty();
    }

    // --- Frame lifecycle --------------------------------------------------

    /// Start a new frame at `time`.
    fn frame_start(&mut self, time: Ticks) {
        // Toggle even/odd. Actually this should occur half a line
        // earlier, but for now this is accurate enough.
        self.status_reg2 ^= Status2::EO.bits();

        // Settings that are fixed at the start of a frame.
        self.pal_timing = self.control_regs[9] & 0x02 != 0;
        self.interlaced = self.control_regs[9] & 0x08 != 0;
        self.vertical_adjust = ((self.control_regs[18] >> 4) ^ 0x07) as i32;

        // Blinking.
        if self.blink_count != 0 {
            self.blink_count -= 1;
            if self.blink_count == 0 {
                self.blink_state = !self.blink_state;
                let period = if self.blink_state {
                    self.control_regs[13] >> 4
                } else {
                    self.control_regs[13] & 0x0F
                };
                self.blink_count = period as i32 * 10;
            }
        }

        // Schedule the next VSYNC.
        self.frame_clock.reset(time);
        self.set_sync_point(time + self.ticks_per_frame(), SyncType::VSync);
        // Schedule DISPLAY_START, VSCAN and HSCAN.
        self.schedule_display_start(time);

        // Inform the subcomponents.
        self.next_render_x = 0;
        self.next_render_y = 0;
        let state = self.render_state();
        self.rasterizer.frame_start(&state);
        self.sprites.frame_start(time, self.pal_timing);
        self.sprites.set_line_zero(self.line_zero);

        log::trace!(
            "VDP: frame start @{time}, {} timing, display start line {}",
            if self.pal_timing { "PAL" } else { "NTSC" },
            self.line_zero
        );
    }

    /// Schedules a DISPLAY_START sync point, removing a pending one.
    ///
    /// HSCAN and VSCAN are relative to display start, so their schedule
    /// methods are called too. `time` is the moment this call takes
    /// place, not the sync time.
    fn schedule_display_start(&mut self, time: Ticks) {
        if self.display_start_sync_time > time {
            self.remove_sync_point(SyncType::DisplayStart);
        }

        // Calculate when (line and time) the display starts: sync and
        // top erase, then the top border of the timing standard.
        let lines_212 = self.control_regs[9] & 0x80 != 0;
        let top_border = match (self.pal_timing, lines_212) {
            (true, true) => 3 + 13 + 36,
            (true, false) => 3 + 13 + 46,
            (false, true) => 3 + 13 + 9,
            (false, false) => 3 + 13 + 19,
        };
        self.line_zero = top_border + self.vertical_adjust;
        self.display_start = (if self.is_display_area {
            3 + 13 // sync + top erase, regardless of vertical adjust
        } else {
            self.line_zero as u64
        }) * TICKS_PER_LINE;
        self.display_start_sync_time = self.frame_clock.add(self.display_start);
        self.sprites.set_line_zero(self.line_zero);

        if self.display_start_sync_time > time {
            self.set_sync_point(self.display_start_sync_time, SyncType::DisplayStart);
        }

        // HSCAN and VSCAN are relative to display start.
        self.schedule_hscan(time);
        self.schedule_vscan(time);
    }

    /// Schedules a VSCAN sync point, removing a pending one.
    fn schedule_vscan(&mut self, time: Ticks) {
        if self.v_scan_sync_time > time {
            self.remove_sync_point(SyncType::VScan);
        }
        self.v_scan_sync_time = self
            .frame_clock
            .add(self.display_start + (self.number_of_lines() as u64) * TICKS_PER_LINE);
        if self.v_scan_sync_time > time {
            self.set_sync_point(self.v_scan_sync_time, SyncType::VScan);
        }
    }

    /// Schedules a HSCAN sync point, removing a pending one.
    fn schedule_hscan(&mut self, time: Ticks) {
        if self.h_scan_sync_time > time {
            self.remove_sync_point(SyncType::HScan);
            self.h_scan_sync_time = time;
        }

        // Calculate the moment the line match occurs.
        let line = ((self.control_regs[19].wrapping_sub(self.control_regs[23])) & 0xFF) as i64;
        let mut offset = self.display_start as i64
            + line * TICKS_PER_LINE as i64
            + self.right_border() as i64;
        // The display line counter continues into the next frame.
        let ticks_per_frame = self.ticks_per_frame() as i64;
        if offset >= ticks_per_frame {
            offset -= ticks_per_frame;
            // The counter is reset at the start of the top border; any
            // HSCAN with a higher line number never occurs.
            if offset >= LINE_COUNT_RESET_TICKS {
                offset = -1000 * TICKS_PER_LINE as i64;
            }
        }
        self.horizontal_scan_offset = offset;

        // Register the sync point only while the interrupt is enabled.
        if self.control_regs[0] & Reg0::IE1.bits() != 0 && offset >= 0 {
            self.h_scan_sync_time = self.frame_clock.add(offset as u64);
            if self.h_scan_sync_time > time {
                self.set_sync_point(self.h_scan_sync_time, SyncType::HScan);
            }
        }
    }

    // --- Interrupt lines --------------------------------------------------

    fn set_vertical_irq(&mut self, active: bool) {
        if self.irq_vertical != active {
            self.irq_vertical = active;
            if let Some(callback) = &mut self.irq_callback {
                callback(IrqLine::Vertical, active);
            }
        }
    }

    fn set_horizontal_irq(&mut self, active: bool) {
        if self.irq_horizontal != active {
            self.irq_horizontal = active;
            if let Some(callback) = &mut self.irq_callback {
                callback(IrqLine::Horizontal, active);
            }
        }
    }

    // --- I/O ports --------------------------------------------------------

    /// CPU write to one of the four VDP I/O ports.
    pub fn write_port(&mut self, port: u8, value: u8, time: Ticks) {
        self.process_syncs_until(time);
        self.sync_subsystems(time);
        match port & 0x03 {
            0 => {
                // VRAM data write.
                let mut addr =
                    (((self.control_regs[14] as u32) << 14) | self.vram_pointer) & self.vram_mask;
                if self.display_mode.is_planar() {
                    addr = interleave(addr);
                }
                if self.cpu_extended_vram {
                    // Extended VRAM is not connected.
                    log::trace!("write to extended VRAM ignored");
                } else {
                    self.cpu_vram_write(addr, value, time);
                }
                self.vram_pointer = (self.vram_pointer + 1) & 0x3FFF;
                if self.vram_pointer == 0 && self.display_mode.is_v9938_mode() {
                    // In MSX2 video modes the pointer range is 128K.
                    self.control_regs[14] = (self.control_regs[14] + 1) & 0x07;
                }
                self.read_ahead = value;
                self.register_data_stored = false;
            }
            1 => {
                // Register or address write.
                if self.register_data_stored {
                    if value & 0x80 != 0 {
                        if value & 0x40 == 0 {
                            // Register write.
                            let reg = value & self.control_reg_mask;
                            let data = self.data_latch;
                            self.change_register(reg, data, time);
                        }
                        // With bit 6 set this is not a register write;
                        // real hardware ignores it.
                    } else {
                        // Set the read/write address.
                        self.vram_pointer =
                            (((value as u32) << 8) | self.data_latch as u32) & 0x3FFF;
                        if value & 0x40 == 0 {
                            // Read ahead.
                            self.vram_read(time);
                        }
                    }
                    self.register_data_stored = false;
                } else {
                    self.data_latch = value;
                    self.register_data_stored = true;
                }
            }
            2 => {
                // Palette data write (two-phase).
                if self.palette_data_stored {
                    let index = (self.control_regs[16] & 0x0F) as usize;
                    let grb = (((value as u16) << 8) | self.data_latch as u16) & 0x777;
                    self.palette[index] = grb;
                    let state = self.render_state();
                    self.rasterizer.set_palette(index, grb, &state);
                    self.control_regs[16] = ((index + 1) & 0x0F) as u8;
                    self.palette_data_stored = false;
                } else {
                    self.data_latch = value;
                    self.palette_data_stored = true;
                }
            }
            _ => {
                // Indirect register write through R#17.
                self.data_latch = value;
                let reg_nr = self.control_regs[17];
                self.change_register(reg_nr & 0x3F, value, time);
                if reg_nr & 0x80 == 0 {
                    // Auto-increment.
                    self.control_regs[17] = (reg_nr + 1) & 0x3F;
                }
            }
        }
    }

    /// CPU read from one of the VDP I/O ports.
    pub fn read_port(&mut self, port: u8, time: Ticks) -> u8 {
        self.process_syncs_until(time);
        self.sync_subsystems(time);
        match port & 0x03 {
            0 => self.vram_read(time),
            1 => {
                // Abort any port 1 write in progress.
                self.register_data_stored = false;
                let reg = self.control_regs[15] & 0x0F;
                self.read_status_reg(reg, time)
            }
            _ => {
                // These ports cannot be read.
                log::warn!("read from write-only VDP port {}", port & 3);
                0xFF
            }
        }
    }

    /// A byte is read from VRAM by the CPU through port 0.
    fn vram_read(&mut self, time: Ticks) -> u8 {
        let ret = self.read_ahead;
        let mut addr =
            (((self.control_regs[14] as u32) << 14) | self.vram_pointer) & self.vram_mask;
        if self.display_mode.is_planar() {
            addr = interleave(addr);
        }
        self.read_ahead = self.cpu_vram_read(addr, time);
        self.vram_pointer = (self.vram_pointer + 1) & 0x3FFF;
        if self.vram_pointer == 0 && self.display_mode.is_v9938_mode() {
            self.control_regs[14] = (self.control_regs[14] + 1) & 0x07;
        }
        self.register_data_stored = false;
        if self.cpu_extended_vram {
            0xFF
        } else {
            ret
        }
    }

    /// Write a VRAM byte through the CPU interface, synchronising every
    /// observer before the byte changes.
    fn cpu_vram_write(&mut self, addr: u32, value: u8, time: Ticks) {
        if self.vram.in_cmd_window(addr) {
            self.cmd.sync(&mut self.vram, time);
            self.flush_cmd_dirty();
        }
        self.rasterizer.update_vram_cache(addr);
        if self.vram.sprite_attrib_table.is_inside(addr)
            || self.vram.sprite_pattern_table.is_inside(addr)
        {
            self.sprites.update_vram(&self.vram, addr, time);
        }
        self.vram.write(addr, value);
    }

    /// Read a VRAM byte through the CPU interface.
    fn cpu_vram_read(&mut self, addr: u32, time: Ticks) -> u8 {
        if self.vram.cmd_write_window.is_inside(addr) {
            self.cmd.sync(&mut self.vram, time);
            self.flush_cmd_dirty();
        }
        self.vram.read(addr)
    }

    // --- Status registers -------------------------------------------------

    /// Read a status register, with the read side effects.
    fn read_status_reg(&mut self, reg: u8, time: Ticks) -> u8 {
        let ticks_this_frame = self.frame_clock.ticks_till(time) as i64;
        match reg {
            0 => {
                let ret = self.status_reg0 | self.sprites.read_status(&self.vram, time);
                self.status_reg0 = 0;
                self.set_vertical_irq(false);
                ret
            }
            1 => {
                if self.control_regs[0] & Reg0::IE1.bits() != 0 {
                    let ret = self.status_reg1 | self.irq_horizontal as u8;
                    self.set_horizontal_irq(false);
                    ret
                } else {
                    // FH rises at the start of the right border of the
                    // match line and falls at the next left border.
                    let after_match = ticks_this_frame - self.horizontal_scan_offset;
                    let border = if self.display_mode.is_text_mode() { 87 } else { 59 };
                    let match_length: i64 = border + 27 + 100 + 102;
                    self.status_reg1 | ((0..match_length).contains(&after_match)) as u8
                }
            }
            2 => {
                let display_end =
                    self.display_start as i64 + self.number_of_lines() * TICKS_PER_LINE as i64;
                let vr = ticks_this_frame < self.display_start as i64 - TICKS_PER_LINE as i64
                    || ticks_this_frame >= display_end;
                let mut ret = self.status_reg2;
                if self.get_hr(ticks_this_frame) {
                    ret |= Status2::HR.bits();
                }
                if vr {
                    ret |= Status2::VR.bits();
                }
                ret | self.cmd.status(&mut self.vram, time)
            }
            3 => self.sprites.collision_x(&self.vram, time) as u8,
            4 => (self.sprites.collision_x(&self.vram, time) >> 8) as u8 | 0xFE,
            5 => {
                let ret = self.sprites.collision_y(&self.vram, time) as u8;
                self.sprites.reset_collision();
                ret
            }
            6 => (self.sprites.collision_y(&self.vram, time) >> 8) as u8 | 0xFC,
            7 => self.cmd.read_colour(&mut self.vram, time),
            8 => self.cmd.border_x(&mut self.vram, time) as u8,
            9 => (self.cmd.border_x(&mut self.vram, time) >> 8) as u8 | 0xFE,
            _ => 0xFF, // non-existent status register
        }
    }

    // --- Control registers ------------------------------------------------

    /// A VDP control register changed: work out the consequences.
    fn change_register(&mut self, reg: u8, mut val: u8, time: Ticks) {
        log::trace!("VDP R#{reg} = {val:#04X}");

        if reg >= 32 {
            // MXC belongs to the CPU interface; the other bits of these
            // registers belong to the command engine.
            if reg == 45 {
                self.cpu_extended_vram = val & 0x40 != 0;
            }
            if reg < 47 {
                self.cmd.set_cmd_reg(reg - 32, val, &mut self.vram, time);
                self.flush_cmd_dirty();
            }
            return;
        }

        // Make sure only bits that actually exist are written.
        val &= self.control_value_masks[reg as usize];
        let change = val ^ self.control_regs[reg as usize];

        // Register 13 is special: writing it resets the blink phase,
        // even when the value does not change.
        if reg == 13 {
            if self.blink_state == (val & 0xF0 == 0) {
                self.blink_state = !self.blink_state;
            }
            self.blink_count = if val & 0xF0 != 0 && val & 0x0F != 0 {
                // Alternating colours, start with ON.
                ((val >> 4) as i32) * 10
            } else {
                // Stable colour.
                0
            };
        }

        if change == 0 {
            return;
        }

        // Tasks before the new value becomes active.
        match reg {
            0 => {
                if change & DisplayMode::REG0_MASK != 0 {
                    self.sync_at_next_line(SyncType::SetMode, time);
                }
            }
            1 => {
                if change & 0x03 != 0 {
                    // Update sprites on size and magnification changes.
                    self.sprites.update_sprite_size_mag(val, &self.vram, time);
                }
                if change & DisplayMode::REG1_MASK != 0 {
                    self.sync_at_next_line(SyncType::SetMode, time);
                }
                if change & Reg1::BL.bits() != 0 {
                    self.sync_at_next_line(SyncType::SetBlank, time);
                }
            }
            8 => {
                if change & Reg8::SPD.bits() != 0 {
                    self.sprites
                        .update_sprites_enabled(val & Reg8::SPD.bits() == 0, &self.vram, time);
                }
            }
            16 => {
                // Any half-finished palette load is aborted.
                self.palette_data_stored = false;
            }
            18 => {
                if change & 0x0F != 0 {
                    self.sync_at_next_line(SyncType::HorAdjust, time);
                }
            }
            23 => {
                self.sprites.update_vertical_scroll(val, &self.vram, time);
            }
            _ => {}
        }

        // Commit the change.
        self.control_regs[reg as usize] = val;

        // Tasks after the new value became active. Base masks cannot be
        // read back, so updating them after the commit is equivalent to
        // updating before.
        match reg {
            0 => {
                if change & Reg0::IE1.bits() != 0 {
                    if val & Reg0::IE1.bits() != 0 {
                        self.schedule_hscan(time);
                    } else {
                        self.set_horizontal_irq(false);
                    }
                }
            }
            1 => {
                if change & Reg1::IE0.bits() != 0 && val & Reg1::IE0.bits() == 0 {
                    self.set_vertical_irq(false);
                }
            }
            2 => self.update_name_base(),
            3 | 10 => self.update_colour_base(time),
            4 => self.update_pattern_base(time),
            5 | 11 => self.update_sprite_attribute_base(time),
            6 => self.update_sprite_pattern_base(time),
            7 => {
                let state = self.render_state();
                self.rasterizer.set_background_colour(val & 0x0F, &state);
            }
            8 => {
                if change & Reg8::TP.bits() != 0 {
                    let state = self.render_state();
                    self.rasterizer
                        .set_transparency(val & Reg8::TP.bits() == 0, &state);
                }
                if change & Reg8::SPD.bits() != 0 {
                    self.update_cmd_timing(time);
                }
            }
            9 => {
                if change & 0x80 != 0 {
                    // 192/212 lines determines display start and end.
                    if time < self.display_start_sync_time {
                        // Display start is not fixed yet.
                        self.schedule_display_start(time);
                    } else {
                        // Display start is fixed, but display end is not.
                        self.schedule_vscan(time);
                    }
                }
            }
            19 => self.schedule_hscan(time),
            23 => self.schedule_hscan(time),
            25 => {
                if change & DisplayMode::REG25_MASK != 0 {
                    let mode = self.display_mode.with_reg25(val);
                    self.update_display_mode(mode, time);
                }
                if change & 0x08 != 0 {
                    self.sync_at_next_line(SyncType::HorAdjust, time);
                }
            }
            _ => {}
        }
    }

    // --- Table base updates -----------------------------------------------

    fn update_name_base(&mut self) {
        let base = (((self.control_regs[2] as u32) << 10) | !(!0u32 << 10)) & self.vram_mask;
        let index_mask = if self.display_mode.is_bitmap_mode() {
            !0u32 << 17
        } else if self.display_mode.is_text_mode() {
            !0u32 << 12
        } else {
            !0u32 << 10
        };
        self.vram.name_table.set_mask(base, index_mask);
    }

    fn update_colour_base(&mut self, _time: Ticks) {
        let base = self.vram_mask
            & (((self.control_regs[10] as u32) << 14)
                | ((self.control_regs[3] as u32) << 6)
                | !(!0u32 << 6));
        match self.display_mode.base() {
            DisplayMode::TEXT2 => self.vram.colour_table.set_mask(base, !0u32 << 9),
            DisplayMode::GRAPHIC1 => self.vram.colour_table.set_mask(base, !0u32 << 6),
            DisplayMode::GRAPHIC2 | DisplayMode::GRAPHIC3 => {
                self.vram.colour_table.set_mask(base, !0u32 << 13)
            }
            // Other display modes do not use a colour table.
            _ => self.vram.colour_table.disable(),
        }
    }

    fn update_pattern_base(&mut self, _time: Ticks) {
        let base =
            self.vram_mask & (((self.control_regs[4] as u32) << 11) | !(!0u32 << 11));
        match self.display_mode.base() {
            DisplayMode::TEXT1
            | DisplayMode::TEXT1Q
            | DisplayMode::TEXT2
            | DisplayMode::GRAPHIC1
            | DisplayMode::MULTICOLOUR
            | DisplayMode::MULTICOLOUR_Q => self.vram.pattern_table.set_mask(base, !0u32 << 11),
            DisplayMode::GRAPHIC2 | DisplayMode::GRAPHIC3 => {
                self.vram.pattern_table.set_mask(base, !0u32 << 13)
            }
            // Other display modes do not use a pattern table.
            _ => self.vram.pattern_table.disable(),
        }
    }

    fn update_sprite_attribute_base(&mut self, time: Ticks) {
        let mode = self.display_mode.sprite_mode();
        self.sprites.update_window(&self.vram, time);
        if mode == 0 {
            self.vram.sprite_attrib_table.disable();
            return;
        }
        let base = self.vram_mask
            & (((self.control_regs[11] as u32) << 15)
                | ((self.control_regs[5] as u32) << 7)
                | !(!0u32 << 7));
        if mode == 1 {
            self.vram.sprite_attrib_table.set_mask(base, !0u32 << 7);
        } else if self.display_mode.is_planar() {
            self.vram
                .sprite_attrib_table
                .set_mask(interleave(base), 0x0FE00);
        } else {
            self.vram.sprite_attrib_table.set_mask(base, 0x1FC00);
        }
    }

    fn update_sprite_pattern_base(&mut self, time: Ticks) {
        self.sprites.update_window(&self.vram, time);
        if self.display_mode.sprite_mode() == 0 {
            self.vram.sprite_pattern_table.disable();
            return;
        }
        let mut base =
            (((self.control_regs[6] as u32) << 11) | !(!0u32 << 11)) & self.vram_mask;
        if self.display_mode.is_planar() {
            base = interleave(base);
        }
        self.vram.sprite_pattern_table.set_mask(base, !0u32 << 11);
    }

    // --- Display mode -----------------------------------------------------

    /// Commit a display mode change and inform every subsystem.
    fn update_display_mode(&mut self, new_mode: DisplayMode, time: Ticks) {
        // Setting the same mode twice is a no-op.
        if new_mode == self.display_mode {
            return;
        }
        log::debug!("VDP: mode {:#04X}", new_mode.byte());

        self.sprites.update_display_mode(new_mode, &self.vram, time);
        let cmd_bit = self.control_regs[25] & 0x40 != 0;
        self.cmd
            .update_display_mode(new_mode, cmd_bit, &mut self.vram, time);
        self.flush_cmd_dirty();

        // What changed:
        let planar_change = new_mode.is_planar() != self.display_mode.is_planar();
        let sprite_mode_change = new_mode.sprite_mode() != self.display_mode.sprite_mode();

        // Commit the new display mode.
        self.display_mode = new_mode;

        let state = self.render_state();
        self.rasterizer.set_display_mode(new_mode, &state);

        if new_mode.is_bitmap_mode() {
            self.vram.bitmap_window.set_mask(0x1FFFF, !0u32 << 17);
        } else {
            self.vram.bitmap_window.disable();
            self.update_colour_base(time);
            self.update_pattern_base(time);
        }
        self.update_name_base();
        if planar_change || sprite_mode_change {
            self.update_sprite_pattern_base(time);
            self.update_sprite_attribute_base(time);
        }
        self.update_cmd_timing(time);
    }

    // --- Save states ------------------------------------------------------

    /// Capture the persisted VDP state.
    pub fn snapshot(&self) -> crate::core::snapshot::VdpSnapshot {
        crate::core::snapshot::VdpSnapshot {
            version: self.version,
            current_time: self.current_time,
            frame_start_time: self.frame_clock.start(),
            control_regs: self.control_regs,
            palette: self.palette,
            status_reg0: self.status_reg0,
            status_reg2: self.status_reg2,
            sprite_status: self.sprites.peek_status(),
            collision: self.sprites.latched_collision(),
            blink_state: self.blink_state,
            blink_count: self.blink_count,
            data_latch: self.data_latch,
            register_data_stored: self.register_data_stored,
            palette_data_stored: self.palette_data_stored,
            read_ahead: self.read_ahead,
            vram_pointer: self.vram_pointer,
            display_mode: self.display_mode,
            pal_timing: self.pal_timing,
            interlaced: self.interlaced,
            line_zero: self.line_zero,
            horizontal_adjust: self.horizontal_adjust,
            vertical_adjust: self.vertical_adjust,
            is_display_area: self.is_display_area,
            display_enabled: self.display_enabled,
            display_start: self.display_start,
            irq_vertical: self.irq_vertical,
            irq_horizontal: self.irq_horizontal,
            next_render_x: self.next_render_x,
            next_render_y: self.next_render_y,
            render_display_enabled: self.render_display_enabled,
            cmd: self.cmd.clone(),
            vram: self.vram.data().to_vec(),
        }
    }

    /// Reinstate a previously captured state.
    ///
    /// The snapshot must come from a VDP with the same version and VRAM
    /// size. Rendering caches are flushed; the frame in progress is
    /// rendered from the restore point onwards.
    pub fn restore_snapshot(&mut self, snap: &crate::core::snapshot::VdpSnapshot) -> Result<()> {
        if snap.version != self.version {
            return Err(EmulatorError::SaveState(format!(
                "snapshot is for {:?}, this VDP is {:?}",
                snap.version, self.version
            )));
        }
        if snap.vram.len() != self.vram.size() {
            return Err(EmulatorError::SaveState(format!(
                "snapshot has {} bytes of VRAM, this VDP has {}",
                snap.vram.len(),
                self.vram.size()
            )));
        }

        self.syncs.clear();
        self.vram.restore(&snap.vram);
        self.control_regs = snap.control_regs;
        self.palette = snap.palette;
        self.status_reg0 = snap.status_reg0;
        self.status_reg2 = snap.status_reg2;
        self.blink_state = snap.blink_state;
        self.blink_count = snap.blink_count;
        self.data_latch = snap.data_latch;
        self.register_data_stored = snap.register_data_stored;
        self.palette_data_stored = snap.palette_data_stored;
        self.read_ahead = snap.read_ahead;
        self.vram_pointer = snap.vram_pointer;
        self.display_mode = snap.display_mode;
        self.pal_timing = snap.pal_timing;
        self.interlaced = snap.interlaced;
        self.line_zero = snap.line_zero;
        self.horizontal_adjust = snap.horizontal_adjust;
        self.vertical_adjust = snap.vertical_adjust;
        self.is_display_area = snap.is_display_area;
        self.display_enabled = snap.display_enabled;
        self.display_start = snap.display_start;
        self.irq_vertical = snap.irq_vertical;
        self.irq_horizontal = snap.irq_horizontal;
        self.next_render_x = snap.next_render_x;
        self.next_render_y = snap.next_render_y;
        self.render_display_enabled = snap.render_display_enabled;
        self.cmd = snap.cmd.clone();
        self.cpu_extended_vram = self.cmd.peek_cmd_reg(0x0D) & 0x40 != 0;
        self.frame_clock.restore(snap.frame_start_time);
        self.current_time = snap.current_time;

        // Rebuild derived state: the sprite checker first (it stays
        // inert until the windows exist again), then the table windows,
        // then the checker's state copies.
        let time = snap.current_time;
        self.sprites.restore(
            snap.frame_start_time,
            snap.pal_timing,
            snap.sprite_status,
            snap.collision,
        );

        self.update_name_base();
        self.update_colour_base(time);
        self.update_pattern_base(time);
        if self.display_mode.is_bitmap_mode() {
            self.vram.bitmap_window.set_mask(0x1FFFF, !0u32 << 17);
        } else {
            self.vram.bitmap_window.disable();
        }
        self.update_sprite_attribute_base(time);
        self.update_sprite_pattern_base(time);

        self.sprites
            .update_display_mode(self.display_mode, &self.vram, time);
        let r1 = self.control_regs[1];
        self.sprites.update_sprite_size_mag(r1, &self.vram, time);
        let r23 = self.control_regs[23];
        self.sprites.update_vertical_scroll(r23, &self.vram, time);
        self.sprites.set_line_zero(self.line_zero);
        self.sprites
            .update_display_enabled(self.is_display_enabled(), &self.vram, time);
        self.sprites.update_sprites_enabled(
            self.control_regs[8] & Reg8::SPD.bits() == 0,
            &self.vram,
            time,
        );
        self.update_cmd_timing(time);

        let state = self.render_state();
        self.rasterizer.reset(&state, &self.palette);

        // Reschedule the frame's sync points.
        self.set_sync_point(self.frame_clock.add(self.ticks_per_frame()), SyncType::VSync);
        self.display_start_sync_time = self.frame_clock.add(self.display_start);
        if self.display_start_sync_time > time {
            self.set_sync_point(self.display_start_sync_time, SyncType::DisplayStart);
        }
        self.v_scan_sync_time = time;
        self.h_scan_sync_time = time;
        self.schedule_vscan(time);
        self.schedule_hscan(time);

        Ok(())
    }

    // --- Rendering progress -----------------------------------------------

    /// Let the rasterizer catch up with the emulated time.
    fn render_until(&mut self, time: Ticks) {
        let limit_ticks = self
            .frame_clock
            .ticks_till(time)
            .min(self.ticks_per_frame()) as i32;
        let limit_x = limit_ticks % TICKS_PER_LINE as i32;
        let limit_y = limit_ticks / TICKS_PER_LINE as i32;
        // No pixels to render. This also ensures nothing is rendered in
        // a series of updates happening at the same moment, while the
        // subsystem states may be inconsistent.
        if limit_x == self.next_render_x && limit_y == self.next_render_y {
            return;
        }

        let display = self.render_display_enabled;
        let sprites_visible = display && self.sprites_enabled();
        if sprites_visible {
            // Update sprite checking so the rasterizer can fetch them.
            self.sprites.check_until(&self.vram, time);
        }

        let state = self.render_state();
        let (next_x, next_y) = (self.next_render_x, self.next_render_y);
        let border_l = self.left_border();
        let display_l = if self.is_border_masked() {
            border_l
        } else {
            self.left_background()
        };
        let border_r = self.right_border();

        let Vdp {
            vram,
            sprites,
            rasterizer,
            ..
        } = self;
        let view = FrameView {
            vram,
            sprites,
            state,
        };
        let r = rasterizer.as_mut();
        let line = TICKS_PER_LINE as i32;

        if display {
            // Left border.
            subdivide(r, &view, next_x, next_y, limit_x, limit_y, 0, display_l, DrawType::Border);
            // Display area, extra scroll-low pixels included.
            subdivide(
                r, &view, next_x, next_y, limit_x, limit_y, display_l, border_r,
                DrawType::Display,
            );
            // Sprite plane.
            if sprites_visible {
                subdivide(
                    r, &view, next_x, next_y, limit_x, limit_y, border_l, border_r,
                    DrawType::Sprites,
                );
            }
            // Right border.
            subdivide(
                r, &view, next_x, next_y, limit_x, limit_y, border_r, line, DrawType::Border,
            );
        } else {
            subdivide(r, &view, next_x, next_y, limit_x, limit_y, 0, line, DrawType::Border);
        }

        self.next_render_x = limit_x;
        self.next_render_y = limit_y;
    }
}

/// Issue one draw call for a clipped region.
fn draw(
    r: &mut dyn Rasterizer,
    view: &FrameView,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
    draw_type: DrawType,
) {
    match draw_type {
        DrawType::Border => r.draw_border(start_x, start_y, end_x, end_y, view),
        DrawType::Display | DrawType::Sprites => {
            let state = &view.state;
            // Calculate display coordinates.
            let display_x = (start_x - state.left_sprites) / 2;
            let mut display_y = start_y - state.line_zero;
            if !state.mode.is_text_mode() {
                display_y += state.vertical_scroll as i32;
            }
            display_y &= 255; // page wrap
            let display_width = (end_x - (start_x & !1)) / 2;
            let display_height = end_y - start_y;

            if draw_type == DrawType::Display {
                r.draw_display(
                    start_x,
                    start_y,
                    display_x - state.hscroll_low as i32 * 2,
                    display_y,
                    display_width,
                    display_height,
                    view,
                );
            } else {
                r.draw_sprites(
                    start_x,
                    start_y,
                    display_x / 2,
                    display_y,
                    (display_width + 1) / 2,
                    display_height,
                    view,
                );
            }
        }
    }
}

/// Clip a render region against `[clip_l, clip_r)` and hand the parts to
/// [`draw`]: partial first line, full middle lines, partial last line.
#[allow(clippy::too_many_arguments)]
fn subdivide(
    r: &mut dyn Rasterizer,
    view: &FrameView,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
    clip_l: i32,
    clip_r: i32,
    draw_type: DrawType,
) {
    let mut start_y = start_y;
    let mut end_y = end_y;

    // Partial first line.
    if start_x > clip_l {
        if start_x < clip_r {
            let last = if start_y == end_y && end_x < clip_r {
                end_x
            } else {
                clip_r
            };
            draw(r, view, start_x, start_y, last, start_y + 1, draw_type);
        }
        if start_y == end_y {
            return;
        }
        start_y += 1;
    }
    // Partial last line.
    let mut draw_last = false;
    if end_x >= clip_r {
        end_y += 1;
    } else if end_x > clip_l {
        draw_last = true;
    }
    // Full middle lines.
    if start_y < end_y {
        draw(r, view, clip_l, start_y, clip_r, end_y, draw_type);
    }
    // The last line is drawn after the middle lines to keep the
    // top-to-bottom draw order.
    if draw_last {
        draw(r, view, clip_l, end_y, end_x, end_y + 1, draw_type);
    }
}
