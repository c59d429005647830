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

//! End-to-end tests of the VDP core

use std::cell::RefCell;
use std::rc::Rc;

use super::{IrqLine, Vdp};
use crate::core::clock::{Ticks, TICKS_PER_LINE};
use crate::core::config::{VdpConfig, VdpVersion};
use crate::core::render::{NullRasterizer, PixelDepth, PixelRasterizer, RawFrameView};

const NTSC_FRAME: Ticks = 262 * TICKS_PER_LINE;

fn vdp(vram_kb: u32, instant: bool) -> Vdp {
    let config = VdpConfig {
        version: VdpVersion::V9938,
        vram_kb,
        limit_sprites: true,
        instant_cmd_timing: instant,
    };
    Vdp::new(config, Box::new(PixelRasterizer::new(PixelDepth::Bpp32))).unwrap()
}

fn headless(instant: bool) -> Vdp {
    let config = VdpConfig {
        instant_cmd_timing: instant,
        ..VdpConfig::default()
    };
    Vdp::new(config, Box::new(NullRasterizer)).unwrap()
}

/// Write a control register through port 1.
fn write_reg(vdp: &mut Vdp, reg: u8, value: u8, time: Ticks) {
    vdp.write_port(1, value, time);
    vdp.write_port(1, 0x80 | reg, time);
}

/// Read a status register: select it in R#15, then read port 1.
fn read_status(vdp: &mut Vdp, reg: u8, time: Ticks) -> u8 {
    write_reg(vdp, 15, reg, time);
    vdp.read_port(1, time)
}

/// Point the VRAM write pointer at an address (first 16kB page).
fn set_vram_write_addr(vdp: &mut Vdp, addr: u16, time: Ticks) {
    vdp.write_port(1, (addr & 0xFF) as u8, time);
    vdp.write_port(1, 0x40 | (addr >> 8) as u8, time);
}

fn write_vram(vdp: &mut Vdp, addr: u16, bytes: &[u8], time: Ticks) {
    set_vram_write_addr(vdp, addr, time);
    for &b in bytes {
        vdp.write_port(0, b, time);
    }
}

/// Scenario: cold boot produces one all-black frame.
#[test]
fn test_cold_boot_black_frame() {
    let mut vdp = vdp(64, false);
    vdp.reset(0);
    vdp.execute_until(NTSC_FRAME + 1);

    let Some(RawFrameView::Bpp32(frame)) = vdp.frame() else {
        panic!("no frame");
    };
    for y in 0..240 {
        assert!(frame.is_blank(y), "line {y} should be border colour");
        assert_eq!(frame.line(y)[0], 0, "line {y} should be black");
    }

    // The vertical scan flag was raised during the frame and clears on
    // read.
    let s0 = read_status(&mut vdp, 0, NTSC_FRAME + 10);
    assert_eq!(s0 & 0x80, 0x80);
    let s0 = read_status(&mut vdp, 0, NTSC_FRAME + 20);
    assert_eq!(s0 & 0x80, 0x00);
}

/// Scenario: an HMMV fill covers the expected bytes and completes.
#[test]
fn test_hmmv_fill_via_ports() {
    let mut vdp = headless(true);
    write_reg(&mut vdp, 0, 0x06, 0); // Graphic 4
    vdp.execute_until(2 * TICKS_PER_LINE); // commit the mode change

    let t = 2 * TICKS_PER_LINE + 10;
    write_reg(&mut vdp, 36, 0, t); // DX
    write_reg(&mut vdp, 37, 0, t);
    write_reg(&mut vdp, 38, 0, t); // DY
    write_reg(&mut vdp, 39, 0, t);
    write_reg(&mut vdp, 40, 0, t); // NX = 256
    write_reg(&mut vdp, 41, 1, t);
    write_reg(&mut vdp, 42, 212, t); // NY = 212
    write_reg(&mut vdp, 43, 0, t);
    write_reg(&mut vdp, 44, 0xFF, t); // COL
    write_reg(&mut vdp, 45, 0, t); // ARG
    write_reg(&mut vdp, 46, 0xC0, t); // HMMV

    for addr in 0..(128 * 212) {
        assert_eq!(vdp.vram().read(addr), 0xFF, "addr {addr:#X}");
    }
    assert_eq!(vdp.vram().read(128 * 212), 0);
    // CE is clear again.
    assert_eq!(read_status(&mut vdp, 2, t + 100) & 0x01, 0);
}

/// Scenario: a row copied onto the next row by LMMM.
#[test]
fn test_lmmm_row_copy_via_ports() {
    let mut vdp = headless(true);
    write_reg(&mut vdp, 0, 0x06, 0); // Graphic 4
    vdp.execute_until(2 * TICKS_PER_LINE);

    let t = 2 * TICKS_PER_LINE + 10;
    let pattern: Vec<u8> = (0..128).map(|i| (i * 7 + 3) as u8).collect();
    write_vram(&mut vdp, 100 << 7, &pattern, t);

    write_reg(&mut vdp, 32, 0, t); // SX
    write_reg(&mut vdp, 33, 0, t);
    write_reg(&mut vdp, 34, 100, t); // SY
    write_reg(&mut vdp, 35, 0, t);
    write_reg(&mut vdp, 36, 0, t); // DX
    write_reg(&mut vdp, 37, 0, t);
    write_reg(&mut vdp, 38, 101, t); // DY
    write_reg(&mut vdp, 39, 0, t);
    write_reg(&mut vdp, 40, 0, t); // NX = 256
    write_reg(&mut vdp, 41, 1, t);
    write_reg(&mut vdp, 42, 1, t); // NY = 1
    write_reg(&mut vdp, 43, 0, t);
    write_reg(&mut vdp, 45, 0, t);
    write_reg(&mut vdp, 46, 0x90, t); // LMMM, IMP

    for i in 0..128u32 {
        assert_eq!(vdp.vram().read((101 << 7) + i), pattern[i as usize]);
    }
}

/// Scenario: two overlapping sprites raise the collision flag and latch
/// the collision coordinates.
#[test]
fn test_sprite_collision_via_frame() {
    let mut vdp = headless(false);
    write_reg(&mut vdp, 0, 0x06, 0); // Graphic 4: sprite mode 2
    write_reg(&mut vdp, 1, 0x40, 0); // display enable
    write_reg(&mut vdp, 5, 0x3F, 0); // sprite attributes at 0x1C00
    write_reg(&mut vdp, 6, 0x07, 0); // sprite patterns at 0x3800
    vdp.execute_until(2 * TICKS_PER_LINE);
    let t = 2 * TICKS_PER_LINE + 10;

    write_vram(&mut vdp, 0x3800, &[0xFF; 8], t); // pattern 0: solid rows
    // Sprite 0 at (100, 49), sprite 1 at (104, 49), terminator.
    write_vram(&mut vdp, 0x1E00, &[49, 100, 0, 0, 49, 104, 0, 0, 216], t);
    // Non-transparent colours for every line of both sprites.
    write_vram(&mut vdp, 0x1C00, &[1; 16], t);
    write_vram(&mut vdp, 0x1C10, &[2; 16], t);

    vdp.execute_until(NTSC_FRAME + 1);
    let s0 = read_status(&mut vdp, 0, NTSC_FRAME + 10);
    assert_eq!(s0 & 0x20, 0x20, "collision flag");

    // Overlap starts at x = 104; data book offsets +12/+8 apply.
    assert_eq!(read_status(&mut vdp, 3, NTSC_FRAME + 20), 116);
    assert_eq!(read_status(&mut vdp, 5, NTSC_FRAME + 30), 49 + 8);
    // Reading S#5 released the latch.
    assert_eq!(read_status(&mut vdp, 3, NTSC_FRAME + 40), 0);
}

/// Scenario: with IE0 set the vertical IRQ rises exactly at VSCAN and
/// clears on an S#0 read.
#[test]
fn test_vsync_irq_timing() {
    let mut vdp = headless(false);
    let edges: Rc<RefCell<Vec<(IrqLine, bool)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = edges.clone();
    vdp.set_irq_callback(Box::new(move |line, active| {
        sink.borrow_mut().push((line, active));
    }));
    write_reg(&mut vdp, 1, 0x60, 0); // display on, IE0

    // Display start: NTSC 192-line timing plus default vertical adjust.
    let line_zero = (3 + 13 + 19 + 7) as u64;
    let vscan = (line_zero + 192) * TICKS_PER_LINE;

    vdp.execute_until(vscan - 1);
    assert!(!vdp.irq_vertical());
    vdp.execute_until(vscan);
    assert!(vdp.irq_vertical());
    assert_eq!(*edges.borrow(), vec![(IrqLine::Vertical, true)]);

    read_status(&mut vdp, 0, vscan + 10);
    assert!(!vdp.irq_vertical());
    assert_eq!(edges.borrow().len(), 2);
    assert_eq!(edges.borrow()[1], (IrqLine::Vertical, false));
}

/// Scenario: horizontal IRQ fires on the programmed line.
#[test]
fn test_hscan_irq_line_match() {
    let mut vdp = headless(false);
    write_reg(&mut vdp, 0, 0x10, 0); // IE1
    write_reg(&mut vdp, 19, 50, 0); // match display line 50

    let line_zero = (3 + 13 + 19 + 7) as u64;
    // The match occurs at the right border of the matched line.
    let right_border = 100 + 102 + 56 + 1024;
    let match_time = (line_zero + 50) * TICKS_PER_LINE + right_border;

    vdp.execute_until(match_time - 1);
    assert!(!vdp.irq_horizontal());
    vdp.execute_until(match_time);
    assert!(vdp.irq_horizontal());

    // Reading S#1 clears the interrupt.
    let s1 = read_status(&mut vdp, 1, match_time + 5);
    assert_eq!(s1 & 0x01, 1);
    assert!(!vdp.irq_horizontal());
}

/// P1: the VDP's internal time follows the passed entry point times
/// monotonically.
#[test]
fn test_time_is_monotonic() {
    let mut vdp = headless(false);
    let mut last = 0;
    for i in 0..2000u64 {
        let t = i * 997; // crosses several frames
        vdp.write_port(1, (i & 0x3F) as u8, t);
        assert!(vdp.current_time >= last);
        assert!(vdp.current_time >= t);
        last = vdp.current_time;
    }
}

/// P5: palette writes never touch VRAM, and a later frame shows the new
/// colour everywhere the index is used.
#[test]
fn test_palette_independence() {
    let mut vdp = vdp(128, true);
    write_reg(&mut vdp, 0, 0x06, 0); // Graphic 4
    write_reg(&mut vdp, 1, 0x40, 0); // display on
    write_reg(&mut vdp, 8, 0x02, 0); // sprites off
    vdp.execute_until(2 * TICKS_PER_LINE);
    let t = 2 * TICKS_PER_LINE + 10;
    // Top display row in colour 5.
    write_vram(&mut vdp, 0, &[0x55; 128], t);
    let vram_before: Vec<u8> = (0..256).map(|a| vdp.vram().read(a)).collect();

    // Palette 5 := pure blue.
    write_reg(&mut vdp, 16, 5, t);
    vdp.write_port(2, 0x07, t); // blue in the low nibble... first byte is RB
    vdp.write_port(2, 0x00, t); // green
    let vram_after: Vec<u8> = (0..256).map(|a| vdp.vram().read(a)).collect();
    assert_eq!(vram_before, vram_after, "palette write modified VRAM");

    vdp.execute_until(NTSC_FRAME + 1);
    let Some(RawFrameView::Bpp32(frame)) = vdp.frame() else {
        panic!("no frame");
    };
    // NTSC: display starts at absolute line 42, frame render top is 18.
    let y = 42 - 18;
    assert!(!frame.is_blank(y));
    // Display pixels start at host X 32 in 256-wide modes.
    assert_eq!(frame.line(y)[32], 0x000000FF, "palette colour shows up");
    // The border above the display area stays black.
    assert!(frame.is_blank(y - 1));
    assert_eq!(frame.line(y - 1)[0], 0);
}

/// P6: setting the same mode twice schedules no second mode change.
#[test]
fn test_idempotent_mode_set() {
    let mut vdp = headless(false);
    write_reg(&mut vdp, 0, 0x06, 0);
    vdp.execute_until(2 * TICKS_PER_LINE);
    let mode = vdp.display_mode();

    // Rewriting the same value is filtered before scheduling.
    let syncs_before = vdp.syncs.len();
    write_reg(&mut vdp, 0, 0x06, 2 * TICKS_PER_LINE + 5);
    assert_eq!(vdp.syncs.len(), syncs_before);
    assert_eq!(vdp.display_mode(), mode);
}

/// A rendered Graphic 4 frame places display pixels at the expected
/// host coordinates.
#[test]
fn test_graphic4_frame_rendering() {
    let mut vdp = vdp(128, true);
    write_reg(&mut vdp, 0, 0x06, 0); // Graphic 4
    write_reg(&mut vdp, 1, 0x40, 0); // display on
    write_reg(&mut vdp, 8, 0x02, 0); // sprites off
    write_reg(&mut vdp, 7, 0x04, 0); // border colour 4 (blue-ish)
    vdp.execute_until(2 * TICKS_PER_LINE);
    let t = 2 * TICKS_PER_LINE + 10;
    // Display row 10: all pixels colour 15 (white).
    write_vram(&mut vdp, 10 << 7, &[0xFF; 128], t);

    vdp.execute_until(NTSC_FRAME + 1);
    let Some(RawFrameView::Bpp32(frame)) = vdp.frame() else {
        panic!("no frame");
    };

    let y = 42 - 18 + 10;
    assert!(!frame.is_blank(y));
    let line = frame.line(y);
    // Left border pixel, display pixels, right border pixel.
    let blue = line[20];
    assert_ne!(blue, 0, "border carries the border colour");
    for x in 32..(32 + 256) {
        assert_eq!(line[x], 0x00FFFFFF, "display pixel {x}");
    }
    assert_eq!(line[32 + 256 + 4], blue, "right border");

    // A display row with no VRAM contents shows colour 0 remapped to
    // the backdrop.
    let empty_y = 42 - 18 + 30;
    assert!(!frame.is_blank(empty_y));
    assert_eq!(frame.line(empty_y)[32], blue);
}

/// Save states round-trip the persisted fields bit-exactly.
#[test]
fn test_snapshot_round_trip() {
    let mut vdp = headless(true);
    write_reg(&mut vdp, 0, 0x06, 0);
    write_reg(&mut vdp, 7, 0x45, 0);
    vdp.execute_until(2 * TICKS_PER_LINE);
    let t = 2 * TICKS_PER_LINE + 10;
    write_vram(&mut vdp, 0x1000, &[1, 2, 3, 4, 5], t);
    write_reg(&mut vdp, 23, 99, t); // vertical scroll

    let snap = vdp.snapshot();
    let bytes = snap.to_bytes().unwrap();
    let decoded = crate::core::snapshot::VdpSnapshot::from_bytes(&bytes).unwrap();

    // Scramble the VDP, then restore.
    write_vram(&mut vdp, 0x1000, &[0xEE; 5], t + 1000);
    write_reg(&mut vdp, 23, 0, t + 1000);
    vdp.restore_snapshot(&decoded).unwrap();

    assert_eq!(vdp.current_time, snap.current_time);
    assert_eq!(vdp.control_regs[23], 99);
    assert_eq!(vdp.control_regs[7], 0x45);
    for (i, expected) in [1u8, 2, 3, 4, 5].into_iter().enumerate() {
        assert_eq!(vdp.vram().read(0x1000 + i as u32), expected);
    }
    assert_eq!(vdp.display_mode().base(), 0x0C);
}

/// P2: observers see the old VRAM contents before a write lands. Sprite
/// lines that were already checked keep the previous attribute data;
/// lines checked after the write use the new data.
#[test]
fn test_sprite_table_write_is_observed_before_store() {
    let mut vdp = headless(false);
    write_reg(&mut vdp, 0, 0x06, 0); // Graphic 4: sprite mode 2
    write_reg(&mut vdp, 1, 0x40, 0); // display enable
    write_reg(&mut vdp, 5, 0x3F, 0); // sprite attributes at 0x1C00
    write_reg(&mut vdp, 6, 0x07, 0); // sprite patterns at 0x3800
    vdp.execute_until(2 * TICKS_PER_LINE);
    let t = 2 * TICKS_PER_LINE + 10;

    write_vram(&mut vdp, 0x3800, &[0xFF; 8], t);
    // Sprite 0 at (50, 10): visible on absolute lines 52..60.
    write_vram(&mut vdp, 0x1E00, &[10, 50, 0, 0, 216], t);
    write_vram(&mut vdp, 0x1C00, &[1; 16], t);

    // Check everything up to line 70, then move the sprite to y=100.
    vdp.execute_until(70 * TICKS_PER_LINE);
    write_vram(&mut vdp, 0x1E00, &[100], 70 * TICKS_PER_LINE + 10);
    vdp.execute_until(250 * TICKS_PER_LINE); // stay inside this frame

    // Lines checked before the write keep the old position...
    assert_eq!(vdp.sprites.sprites_on_line(53).len(), 1);
    assert_eq!(vdp.sprites.sprites_on_line(53)[0].x, 50);
    assert!(vdp.sprites.sprites_on_line(100).is_empty());
    // ...lines checked after it see the sprite at its new position.
    assert_eq!(vdp.sprites.sprites_on_line(143).len(), 1);
}

/// Writes to nonexistent register bits are masked off.
#[test]
fn test_register_value_masks() {
    let mut vdp = headless(false);
    // R#10 only has 3 bits on the V9938.
    write_reg(&mut vdp, 10, 0xFF, 0);
    assert_eq!(vdp.control_regs[10], 0x07);
    // R#25 does not exist on the V9938 at all.
    write_reg(&mut vdp, 25, 0xFF, 0);
    assert_eq!(vdp.control_regs[25], 0);
}

/// The VRAM pointer wraps into R#14 in V9938 modes.
#[test]
fn test_vram_pointer_wraps_into_bank_register() {
    let mut vdp = headless(false);
    write_reg(&mut vdp, 0, 0x06, 0); // a V9938 mode
    vdp.execute_until(2 * TICKS_PER_LINE);
    let t = 2 * TICKS_PER_LINE + 10;

    set_vram_write_addr(&mut vdp, 0x3FFF, t);
    vdp.write_port(0, 0xAA, t);
    assert_eq!(vdp.control_regs[14], 1, "bank register incremented");
    vdp.write_port(0, 0xBB, t);
    assert_eq!(vdp.vram().read(0x3FFF), 0xAA);
    assert_eq!(vdp.vram().read(0x4000), 0xBB);
}

/// Port 0 reads return the read-ahead byte.
#[test]
fn test_vram_read_ahead() {
    let mut vdp = headless(false);
    let t = 10;
    write_vram(&mut vdp, 0x100, &[0x11, 0x22, 0x33], t);

    // Address setup without bit 6 prefetches.
    vdp.write_port(1, 0x00, t);
    vdp.write_port(1, 0x01, t);
    assert_eq!(vdp.read_port(0, t + 1), 0x11);
    assert_eq!(vdp.read_port(0, t + 2), 0x22);
    assert_eq!(vdp.read_port(0, t + 3), 0x33);
}

/// Unmapped status registers read as 0xFF, unmapped ports too.
#[test]
fn test_unmapped_accesses() {
    let mut vdp = headless(false);
    assert_eq!(read_status(&mut vdp, 10, 10), 0xFF);
    assert_eq!(vdp.read_port(2, 20), 0xFF);
    assert_eq!(vdp.read_port(3, 30), 0xFF);
}
