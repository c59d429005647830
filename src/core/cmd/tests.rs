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

//! Unit tests for the command engine

use super::{CmdEngine, STATUS_BD, STATUS_CE, STATUS_TR};
use crate::core::display::DisplayMode;
use crate::core::vram::Vram;

const G4: u8 = 0x06; // R#0 mode bits for Graphic 4 (SCREEN 5)
const G5: u8 = 0x08;
const G7: u8 = 0x0E;

fn engine(reg0: u8, instant: bool) -> (CmdEngine, Vram) {
    let mut vram = Vram::new(0x20000);
    let mut engine = CmdEngine::new(instant);
    engine.reset(&mut vram, 0);
    engine.update_display_mode(DisplayMode::new(reg0, 0, 0), false, &mut vram, 0);
    (engine, vram)
}

/// Program the geometry registers R#32..R#45.
#[allow(clippy::too_many_arguments)]
fn set_geometry(
    engine: &mut CmdEngine,
    vram: &mut Vram,
    sx: u16,
    sy: u16,
    dx: u16,
    dy: u16,
    nx: u16,
    ny: u16,
    col: u8,
    arg: u8,
) {
    let bytes = [
        sx as u8,
        (sx >> 8) as u8,
        sy as u8,
        (sy >> 8) as u8,
        dx as u8,
        (dx >> 8) as u8,
        dy as u8,
        (dy >> 8) as u8,
        nx as u8,
        (nx >> 8) as u8,
        ny as u8,
        (ny >> 8) as u8,
        col,
        arg,
    ];
    for (i, b) in bytes.into_iter().enumerate() {
        engine.set_cmd_reg(i as u8, b, vram, 0);
    }
}

fn start(engine: &mut CmdEngine, vram: &mut Vram, cmd: u8, log_op: u8) {
    engine.set_cmd_reg(0x0E, (cmd << 4) | log_op, vram, 0);
}

/// Read a Graphic 4 pixel straight from VRAM.
fn g4_pixel(vram: &Vram, x: u32, y: u32) -> u8 {
    let byte = vram.read((y << 7) + (x >> 1));
    (byte >> ((!x & 1) << 2)) & 15
}

#[test]
fn test_point_reads_pixel_into_col() {
    let (mut engine, mut vram) = engine(G4, true);
    vram.write((20 << 7) + 5, 0x3A); // pixels (10,20)=3 and (11,20)=10
    set_geometry(&mut engine, &mut vram, 10, 20, 0, 0, 0, 0, 0, 0);
    start(&mut engine, &mut vram, 0x4, 0);
    assert_eq!(engine.peek_colour(), 3);
    set_geometry(&mut engine, &mut vram, 11, 20, 0, 0, 0, 0, 0, 0);
    start(&mut engine, &mut vram, 0x4, 0);
    assert_eq!(engine.peek_colour(), 10);
    assert_eq!(engine.peek_status() & STATUS_CE, 0);
}

#[test]
fn test_pset_applies_logical_op() {
    let (mut engine, mut vram) = engine(G4, true);
    set_geometry(&mut engine, &mut vram, 0, 0, 9, 7, 0, 0, 5, 0);
    start(&mut engine, &mut vram, 0x5, 0); // IMP
    assert_eq!(g4_pixel(&vram, 9, 7), 5);
    set_geometry(&mut engine, &mut vram, 0, 0, 9, 7, 0, 0, 3, 0);
    start(&mut engine, &mut vram, 0x5, 0x3); // XOR
    assert_eq!(g4_pixel(&vram, 9, 7), 6);
    // Neighbouring pixel within the same byte is untouched.
    assert_eq!(g4_pixel(&vram, 8, 7), 0);
}

#[test]
fn test_hmmv_fills_bytes() {
    let (mut engine, mut vram) = engine(G4, true);
    set_geometry(&mut engine, &mut vram, 0, 0, 0, 0, 256, 212, 0xFF, 0);
    start(&mut engine, &mut vram, 0xC, 0);
    for addr in 0..(128 * 212) {
        assert_eq!(vram.read(addr), 0xFF, "addr {addr:#X}");
    }
    assert_eq!(vram.read(128 * 212), 0, "first byte past the fill");
    assert_eq!(engine.peek_status() & STATUS_CE, 0);
}

#[test]
fn test_hmmv_nx_zero_means_full_width() {
    let (mut engine, mut vram) = engine(G4, true);
    set_geometry(&mut engine, &mut vram, 0, 0, 0, 5, 0, 1, 0xAB, 0);
    start(&mut engine, &mut vram, 0xC, 0);
    for x in 0..128u32 {
        assert_eq!(vram.read((5 << 7) + x), 0xAB);
    }
    assert_eq!(vram.read(4 << 7), 0);
    assert_eq!(vram.read(6 << 7), 0);
}

#[test]
fn test_hmmv_consumes_documented_tick_budget() {
    let (mut engine, mut vram) = engine(G4, false);
    set_geometry(&mut engine, &mut vram, 0, 0, 0, 0, 256, 212, 0xFF, 0);
    start(&mut engine, &mut vram, 0xC, 0);
    assert_eq!(engine.peek_status() & STATUS_CE, STATUS_CE);

    // 212 rows of 128 bytes at 49 ticks per byte (screen disabled).
    let total = 212 * 128 * 49;
    engine.sync(&mut vram, total / 2);
    assert_eq!(engine.peek_status() & STATUS_CE, STATUS_CE, "still busy");
    engine.sync(&mut vram, total + 1368);
    assert_eq!(engine.peek_status() & STATUS_CE, 0, "done");
    assert_eq!(vram.read(128 * 212 - 1), 0xFF);
}

#[test]
fn test_lmmv_clips_against_left_border() {
    let (mut engine, mut vram) = engine(G4, true);
    // Fill leftward from x=10: only 11 pixels fit.
    set_geometry(&mut engine, &mut vram, 0, 0, 10, 0, 200, 1, 0xF, 0x04);
    start(&mut engine, &mut vram, 0x8, 0);
    for x in 0..=10 {
        assert_eq!(g4_pixel(&vram, x, 0), 0xF, "x={x}");
    }
    assert_eq!(g4_pixel(&vram, 11, 0), 0);
}

#[test]
fn test_lmmv_transparent_fill_skips_colour_zero() {
    let (mut engine, mut vram) = engine(G4, true);
    set_geometry(&mut engine, &mut vram, 0, 0, 0, 0, 8, 1, 0x5, 0);
    start(&mut engine, &mut vram, 0x8, 0); // IMP: paint background
    set_geometry(&mut engine, &mut vram, 0, 0, 0, 0, 8, 1, 0x0, 0);
    start(&mut engine, &mut vram, 0x8, 0x8); // TIMP with colour 0
    for x in 0..8 {
        assert_eq!(g4_pixel(&vram, x, 0), 0x5, "x={x}");
    }
}

#[test]
fn test_lmmm_copies_row_in_graphic7() {
    let (mut engine, mut vram) = engine(G7, true);
    for x in 0..256i32 {
        let addr = (((x & 1) << 16) + (100 << 7) + (x >> 1)) as u32;
        vram.write(addr, x as u8);
    }
    set_geometry(&mut engine, &mut vram, 0, 100, 0, 101, 256, 1, 0, 0);
    start(&mut engine, &mut vram, 0x9, 0);
    for x in 0..256i32 {
        let addr = (((x & 1) << 16) + (101 << 7) + (x >> 1)) as u32;
        assert_eq!(vram.read(addr), x as u8, "x={x}");
    }
}

#[test]
fn test_ymmm_scrolls_rows_upward() {
    let (mut engine, mut vram) = engine(G4, true);
    for y in 0..20u32 {
        for b in 0..128u32 {
            vram.write((y << 7) + b, y as u8);
        }
    }
    // Copy rows 10.. onto rows 5.. (DIX=0 so the whole width from DX=0).
    set_geometry(&mut engine, &mut vram, 0, 10, 0, 5, 0, 10, 0, 0);
    start(&mut engine, &mut vram, 0xE, 0);
    for y in 5..15u32 {
        assert_eq!(vram.read(y << 7), (y + 5) as u8, "row {y}");
    }
}

#[test]
fn test_srch_finds_colour_and_latches_x() {
    let (mut engine, mut vram) = engine(G4, true);
    // Paint pixel (200, 30) with colour 9.
    set_geometry(&mut engine, &mut vram, 0, 0, 200, 30, 0, 0, 9, 0);
    start(&mut engine, &mut vram, 0x5, 0);
    // Search rightwards from (10, 30) for colour 9.
    set_geometry(&mut engine, &mut vram, 10, 30, 0, 0, 0, 0, 9, 0);
    start(&mut engine, &mut vram, 0x6, 0);
    let status = engine.peek_status();
    assert_eq!(status & STATUS_BD, STATUS_BD, "border detected flag");
    assert_eq!(status & STATUS_CE, 0);
    assert_eq!(engine.border_x(&mut vram, 1) & 0x1FF, 200);
}

#[test]
fn test_srch_without_match_stops_at_border() {
    let (mut engine, mut vram) = engine(G4, true);
    set_geometry(&mut engine, &mut vram, 10, 30, 0, 0, 0, 0, 9, 0);
    start(&mut engine, &mut vram, 0x6, 0);
    assert_eq!(engine.peek_status() & STATUS_BD, 0);
    assert_eq!(engine.peek_status() & STATUS_CE, 0);
}

#[test]
fn test_line_draws_bresenham_x_major() {
    let (mut engine, mut vram) = engine(G4, true);
    set_geometry(&mut engine, &mut vram, 0, 0, 0, 0, 255, 127, 1, 0);
    start(&mut engine, &mut vram, 0x7, 0);

    let mut count = 0;
    let mut last_y = 0i32;
    for x in 0..256u32 {
        let mut column = Vec::new();
        for y in 0..212u32 {
            if g4_pixel(&vram, x, y) == 1 {
                column.push(y as i32);
            }
        }
        assert_eq!(column.len(), 1, "exactly one pixel in column {x}");
        assert!(column[0] >= last_y, "y is monotonic");
        last_y = column[0];
        count += 1;
    }
    assert_eq!(count, 256);
    assert_eq!(g4_pixel(&vram, 0, 0), 1);
    assert_eq!(g4_pixel(&vram, 255, 127), 1);
}

#[test]
fn test_lmmc_writes_one_pixel_per_colour_write() {
    let (mut engine, mut vram) = engine(G4, true);
    set_geometry(&mut engine, &mut vram, 0, 0, 0, 0, 4, 1, 0x1, 0);
    start(&mut engine, &mut vram, 0xB, 0);
    // The first pixel is taken from the colour register at start.
    assert_eq!(engine.peek_status() & STATUS_TR, STATUS_TR);
    for (i, colour) in [0x2u8, 0x3, 0x4].into_iter().enumerate() {
        let t = 100 * (i as u64 + 1);
        engine.set_cmd_reg(0x0C, colour, &mut vram, t);
        engine.sync(&mut vram, t + 50);
    }
    assert_eq!(g4_pixel(&vram, 0, 0), 1);
    assert_eq!(g4_pixel(&vram, 1, 0), 2);
    assert_eq!(g4_pixel(&vram, 2, 0), 3);
    assert_eq!(g4_pixel(&vram, 3, 0), 4);
    assert_eq!(engine.peek_status() & STATUS_CE, 0, "transfer complete");
}

#[test]
fn test_lmcm_reads_one_pixel_per_status_read() {
    let (mut engine, mut vram) = engine(G4, true);
    for x in 0..4u32 {
        let v = (x + 1) as u8;
        let addr = x >> 1;
        let old = vram.read(addr);
        let sh = ((!x & 1) << 2) as u8;
        vram.write(addr, old | (v << sh));
    }
    set_geometry(&mut engine, &mut vram, 0, 0, 0, 0, 4, 1, 0, 0);
    start(&mut engine, &mut vram, 0xA, 0);
    let mut seen = Vec::new();
    for i in 0..4u64 {
        seen.push(engine.read_colour(&mut vram, 100 * (i + 1)));
        engine.sync(&mut vram, 100 * (i + 1) + 50);
    }
    assert_eq!(seen, vec![1, 2, 3, 4]);
    assert_eq!(engine.peek_status() & STATUS_CE, 0);
}

#[test]
fn test_mode_change_aborts_running_command() {
    let (mut engine, mut vram) = engine(G4, false);
    set_geometry(&mut engine, &mut vram, 0, 0, 0, 0, 256, 212, 0xFF, 0);
    start(&mut engine, &mut vram, 0xC, 0);
    assert_eq!(engine.peek_status() & STATUS_CE, STATUS_CE);

    engine.update_display_mode(DisplayMode::new(G5, 0, 0), false, &mut vram, 5000);
    assert_eq!(engine.peek_status() & STATUS_CE, 0, "command aborted");
    assert!(!vram.cmd_write_window.is_enabled());
}

#[test]
fn test_commands_ignored_outside_bitmap_modes() {
    let (mut engine, mut vram) = engine(0x00, true); // Graphic 1
    set_geometry(&mut engine, &mut vram, 0, 0, 0, 0, 16, 16, 0xFF, 0);
    start(&mut engine, &mut vram, 0xC, 0);
    assert_eq!(engine.peek_status() & STATUS_CE, 0);
    assert_eq!(vram.read(0), 0);
}

#[test]
fn test_graphic5_pixel_packing() {
    let (mut engine, mut vram) = engine(G5, true);
    // Fill 512-wide row 0 with colour 2 (2bpp): every byte 0xAA.
    set_geometry(&mut engine, &mut vram, 0, 0, 0, 0, 0, 1, 0x2, 0);
    start(&mut engine, &mut vram, 0x8, 0); // LMMV, IMP
    for b in 0..128u32 {
        assert_eq!(vram.read(b), 0xAA, "byte {b}");
    }
}

#[test]
fn test_ny_register_counts_down_during_command() {
    let (mut engine, mut vram) = engine(G4, true);
    set_geometry(&mut engine, &mut vram, 0, 0, 0, 0, 16, 7, 0x1, 0);
    start(&mut engine, &mut vram, 0x8, 0);
    // NY decrements per completed row and ends at zero.
    assert_eq!(engine.peek_cmd_reg(0x0A), 0);
    // DY advanced to one past the last row.
    assert_eq!(engine.peek_cmd_reg(0x06), 7);
}
