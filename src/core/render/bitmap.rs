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

//! Bitmap mode line converters
//!
//! Decode one scan line of VRAM bytes to host pixels for the bitmap
//! display modes (Graphic 4..7) and the V9958 YJK/YAE filters on top of
//! Graphic 6/7. Planar modes read from two 128-byte half-lines, one per
//! VRAM plane.

use super::raw_frame::Pixel;
use crate::core::display::DisplayMode;
use crate::core::vram::Vram;

fn clip5(value: i32) -> i32 {
    value.clamp(0, 31)
}

/// Graphic 4 (SCREEN 5): 2 pixels per byte, 4bpp, 256 wide.
pub fn render_graphic4<P: Pixel>(out: &mut [P], pal_fg: &[P; 32], vram: &Vram, addr: u32) {
    for i in 0..128u32 {
        let data = vram.read(addr + i);
        out[2 * i as usize] = pal_fg[(data >> 4) as usize];
        out[2 * i as usize + 1] = pal_fg[(data & 15) as usize];
    }
}

/// Graphic 5 (SCREEN 6): 4 pixels per byte, 2bpp, 512 wide.
///
/// Even and odd pixels use the two halves of the palette table, which
/// carry the separately remapped transparent entries.
pub fn render_graphic5<P: Pixel>(out: &mut [P], pal_fg: &[P; 32], vram: &Vram, addr: u32) {
    for i in 0..128u32 {
        let data = vram.read(addr + i) as usize;
        out[4 * i as usize] = pal_fg[data >> 6];
        out[4 * i as usize + 1] = pal_fg[16 + ((data >> 4) & 3)];
        out[4 * i as usize + 2] = pal_fg[(data >> 2) & 3];
        out[4 * i as usize + 3] = pal_fg[16 + (data & 3)];
    }
}

/// Graphic 6 (SCREEN 7): 2 pixels per byte, 4bpp, 512 wide, planar.
pub fn render_graphic6<P: Pixel>(
    out: &mut [P],
    pal_fg: &[P; 32],
    vram: &Vram,
    addr0: u32,
    addr1: u32,
) {
    for i in 0..128u32 {
        let data0 = vram.read(addr0 + i);
        let data1 = vram.read(addr1 + i);
        out[4 * i as usize] = pal_fg[(data0 >> 4) as usize];
        out[4 * i as usize + 1] = pal_fg[(data0 & 15) as usize];
        out[4 * i as usize + 2] = pal_fg[(data1 >> 4) as usize];
        out[4 * i as usize + 3] = pal_fg[(data1 & 15) as usize];
    }
}

/// Graphic 7 (SCREEN 8): 1 pixel per byte, 8bpp, 256 wide, planar.
pub fn render_graphic7<P: Pixel>(
    out: &mut [P],
    palette256: &[P; 256],
    vram: &Vram,
    addr0: u32,
    addr1: u32,
) {
    for i in 0..128u32 {
        out[2 * i as usize] = palette256[vram.read(addr0 + i) as usize];
        out[2 * i as usize + 1] = palette256[vram.read(addr1 + i) as usize];
    }
}

/// Decode the shared J/K deltas of a 4-pixel YJK group.
#[inline(always)]
fn yjk_deltas(p: [u8; 4]) -> (i32, i32) {
    let j = (p[2] & 7) as i32 + (((p[3] & 3) as i32) << 3) - (((p[3] & 4) as i32) << 3);
    let k = (p[0] & 7) as i32 + (((p[1] & 3) as i32) << 3) - (((p[1] & 4) as i32) << 3);
    (j, k)
}

#[inline(always)]
fn yjk_colour(y: i32, j: i32, k: i32) -> usize {
    let r = clip5(y + j);
    let g = clip5(y + k);
    let b = clip5((5 * y - 2 * j - k) / 4);
    ((r << 10) + (g << 5) + b) as usize
}

/// YJK (SCREEN 12): groups of 4 pixels share J/K colour deltas.
pub fn render_yjk<P: Pixel>(
    out: &mut [P],
    palette32768: &[P],
    vram: &Vram,
    addr0: u32,
    addr1: u32,
) {
    for i in 0..64u32 {
        let p = [
            vram.read(addr0 + 2 * i),
            vram.read(addr1 + 2 * i),
            vram.read(addr0 + 2 * i + 1),
            vram.read(addr1 + 2 * i + 1),
        ];
        let (j, k) = yjk_deltas(p);
        for (n, &pn) in p.iter().enumerate() {
            let y = (pn >> 3) as i32;
            out[4 * i as usize + n] = palette32768[yjk_colour(y, j, k)];
        }
    }
}

/// YJK with attribute (SCREEN 10/11): a pixel with bit 3 set selects a
/// palette colour with its upper nibble instead of a YJK colour.
pub fn render_yae<P: Pixel>(
    out: &mut [P],
    pal_fg: &[P; 32],
    palette32768: &[P],
    vram: &Vram,
    addr0: u32,
    addr1: u32,
) {
    for i in 0..64u32 {
        let p = [
            vram.read(addr0 + 2 * i),
            vram.read(addr1 + 2 * i),
            vram.read(addr0 + 2 * i + 1),
            vram.read(addr1 + 2 * i + 1),
        ];
        let (j, k) = yjk_deltas(p);
        for (n, &pn) in p.iter().enumerate() {
            out[4 * i as usize + n] = if pn & 0x08 != 0 {
                pal_fg[(pn >> 4) as usize]
            } else {
                let y = (pn >> 3) as i32;
                palette32768[yjk_colour(y, j, k)]
            };
        }
    }
}

/// Undefined bitmap modes render the backdrop colour.
pub fn render_bogus<P: Pixel>(out: &mut [P], colour: P) {
    for px in out.iter_mut().take(256) {
        *px = colour;
    }
}

/// Pixels per converted line in the given bitmap mode.
pub fn line_pixels(mode: DisplayMode) -> usize {
    mode.line_width() as usize
}

/// Convert one bitmap line.
///
/// `addr0` is the byte address of the line; `addr1` is the second-plane
/// address and only used by the planar modes.
#[allow(clippy::too_many_arguments)]
pub fn render_line<P: Pixel>(
    out: &mut [P],
    mode: DisplayMode,
    pal_fg: &[P; 32],
    palette256: &[P; 256],
    palette32768: &[P],
    vram: &Vram,
    addr0: u32,
    addr1: u32,
) {
    const GRAPHIC6_YJK: u8 = DisplayMode::GRAPHIC6 | DisplayMode::YJK;
    const GRAPHIC7_YJK: u8 = DisplayMode::GRAPHIC7 | DisplayMode::YJK;
    match mode.byte() & !DisplayMode::YAE {
        DisplayMode::GRAPHIC4 => render_graphic4(out, pal_fg, vram, addr0),
        DisplayMode::GRAPHIC5 => render_graphic5(out, pal_fg, vram, addr0),
        DisplayMode::GRAPHIC6 => render_graphic6(out, pal_fg, vram, addr0, addr1),
        DisplayMode::GRAPHIC7 => render_graphic7(out, palette256, vram, addr0, addr1),
        GRAPHIC6_YJK | GRAPHIC7_YJK => {
            if mode.byte() & DisplayMode::YAE != 0 {
                render_yae(out, pal_fg, palette32768, vram, addr0, addr1);
            } else {
                render_yjk(out, palette32768, vram, addr0, addr1);
            }
        }
        _ => render_bogus(out, pal_fg[0]),
    }
}
