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

//! Character mode line converters
//!
//! Decode one scan line for the character-based display modes: the text
//! modes (40 and 80 column), Graphic 1..3 and Multicolour, plus their
//! undocumented "Q" mirrors. Every mode fetches a character code from
//! the name table, a bit pattern from the pattern table and colours from
//! the colour table (or register 7), with mode-specific index packing.

use super::raw_frame::Pixel;
use crate::core::display::DisplayMode;
use crate::core::vram::Vram;

/// Everything the converters need besides palettes and VRAM windows.
pub struct CharacterContext<'a> {
    pub vram: &'a Vram,
    pub fg_colour: u8,
    pub bg_colour: u8,
    pub blink_fg_colour: u8,
    pub blink_bg_colour: u8,
    pub blink_state: bool,
    pub vertical_scroll: u8,
    pub hscroll_high: u8,
}

/// Index filler for name table reads in the scrolling graphic modes:
/// ones everywhere except bit 15, which selects the scroll page and is
/// masked by the name table base register.
const NAME_FILL: u32 = (!0u32 << 16) | 0x7C00;

/// Expand one 8-bit pattern into foreground/background pixels.
#[inline(always)]
fn expand8<P: Pixel>(out: &mut [P], pattern: u8, fg: P, bg: P) {
    for (i, px) in out.iter_mut().enumerate().take(8) {
        *px = if pattern & (0x80 >> i) != 0 { fg } else { bg };
    }
}

/// Expand the six visible pixels of a text mode character.
#[inline(always)]
fn expand6<P: Pixel>(out: &mut [P], pattern: u8, fg: P, bg: P) {
    for (i, px) in out.iter_mut().enumerate().take(6) {
        *px = if pattern & (0x80 >> i) != 0 { fg } else { bg };
    }
}

fn render_text1<P: Pixel>(
    out: &mut [P],
    pal_fg: &[P; 32],
    pal_bg: &[P; 16],
    cx: &CharacterContext,
    line: u8,
) {
    let fg = pal_fg[cx.fg_colour as usize];
    let bg = pal_bg[cx.bg_colour as usize];
    let pattern_base = (!0u32 << 11) | ((line.wrapping_add(cx.vertical_scroll) & 7) as u32);

    let name_start = (line as u32 / 8) * 40;
    for n in 0..40u32 {
        let char_code =
            cx.vram
                .name_table
                .read(cx.vram.data(), (name_start + n + 0xC00) | (!0u32 << 12)) as u32;
        let pattern = cx
            .vram
            .pattern_table
            .read(cx.vram.data(), pattern_base | (char_code * 8));
        expand6(&mut out[6 * n as usize..], pattern, fg, bg);
    }
}

fn render_text1q<P: Pixel>(
    out: &mut [P],
    pal_fg: &[P; 32],
    pal_bg: &[P; 16],
    cx: &CharacterContext,
    line: u8,
) {
    let fg = pal_fg[cx.fg_colour as usize];
    let bg = pal_bg[cx.bg_colour as usize];
    let name_start = (line as u32 / 8) * 32;
    let pattern_quarter = name_start & !0xFF;
    let pattern_base = (!0u32 << 13) | ((line.wrapping_add(cx.vertical_scroll) & 7) as u32);

    for n in 0..32u32 {
        let char_code = cx
            .vram
            .name_table
            .read(cx.vram.data(), (name_start + n) | (!0u32 << 10)) as u32;
        let pattern_nr = pattern_quarter | char_code;
        let pattern = cx
            .vram
            .pattern_table
            .read(cx.vram.data(), pattern_base | (pattern_nr * 8));
        expand6(&mut out[6 * n as usize..], pattern, fg, bg);
    }
}

fn render_text2<P: Pixel>(
    out: &mut [P],
    pal_fg: &[P; 32],
    pal_bg: &[P; 16],
    cx: &CharacterContext,
    line: u8,
) {
    let plain_fg = pal_fg[cx.fg_colour as usize];
    let plain_bg = pal_bg[cx.bg_colour as usize];
    let (blink_fg, blink_bg) = if cx.blink_state {
        // A blink foreground of 0 shows the blink background instead.
        let fg = if cx.blink_fg_colour != 0 {
            cx.blink_fg_colour
        } else {
            cx.blink_bg_colour
        };
        (pal_bg[fg as usize], pal_bg[cx.blink_bg_colour as usize])
    } else {
        (plain_fg, plain_bg)
    };

    let pattern_base = (!0u32 << 11) | ((line.wrapping_add(cx.vertical_scroll) & 7) as u32);

    let name_start = (line as u32 / 8) * 80;
    let mut colour_pattern: u8 = 0;
    for n in 0..80u32 {
        let name = name_start + n;
        // The colour table contains one blink-select bit per character.
        if name & 7 == 0 {
            colour_pattern = cx
                .vram
                .colour_table
                .read(cx.vram.data(), (name >> 3) | (!0u32 << 9));
        } else {
            colour_pattern <<= 1;
        }
        let (fg, bg) = if colour_pattern & 0x80 != 0 {
            (blink_fg, blink_bg)
        } else {
            (plain_fg, plain_bg)
        };
        let char_code = cx
            .vram
            .name_table
            .read(cx.vram.data(), name | (!0u32 << 12)) as u32;
        let pattern = cx
            .vram
            .pattern_table
            .read(cx.vram.data(), pattern_base | (char_code * 8));
        expand6(&mut out[6 * n as usize..], pattern, fg, bg);
    }
}

/// Name table index of the first character of a row, honouring the
/// horizontal scroll page bit.
#[inline(always)]
fn name_index(line: u8, scroll: u32) -> u32 {
    ((line as u32 / 8) * 32) | if scroll & 0x20 != 0 { 0x8000 } else { 0 }
}

fn render_graphic1<P: Pixel>(out: &mut [P], pal_fg: &[P; 32], cx: &CharacterContext, line: u8) {
    let pattern_base = (!0u32 << 11) | (line as u32 & 7);
    let mut scroll = cx.hscroll_high as u32;
    for n in 0..32u32 {
        let idx = (name_index(line, scroll) + (scroll & 0x1F)) | NAME_FILL;
        let char_code = cx.vram.name_table.read(cx.vram.data(), idx) as u32;
        let colour = cx
            .vram
            .colour_table
            .read(cx.vram.data(), (char_code / 8) | (!0u32 << 6));
        let fg = pal_fg[(colour >> 4) as usize];
        let bg = pal_fg[(colour & 0x0F) as usize];
        let pattern = cx
            .vram
            .pattern_table
            .read(cx.vram.data(), pattern_base | (char_code * 8));
        expand8(&mut out[8 * n as usize..], pattern, fg, bg);
        scroll += 1;
    }
}

fn render_graphic2<P: Pixel>(out: &mut [P], pal_fg: &[P; 32], cx: &CharacterContext, line: u8) {
    let quarter = ((line as u32 / 8) * 32) & !0xFF;
    let base_line = (!0u32 << 13) | (quarter << 3) | (line as u32 & 7);
    let mut scroll = cx.hscroll_high as u32;
    for n in 0..32u32 {
        let idx = (name_index(line, scroll) + (scroll & 0x1F)) | NAME_FILL;
        let char_code = cx.vram.name_table.read(cx.vram.data(), idx) as u32;
        let index = (char_code * 8) | base_line;
        let pattern = cx.vram.pattern_table.read(cx.vram.data(), index);
        let colour = cx.vram.colour_table.read(cx.vram.data(), index);
        let fg = pal_fg[(colour >> 4) as usize];
        let bg = pal_fg[(colour & 0x0F) as usize];
        expand8(&mut out[8 * n as usize..], pattern, fg, bg);
        scroll += 1;
    }
}

fn render_multi_helper<P: Pixel>(
    out: &mut [P],
    pal_fg: &[P; 32],
    cx: &CharacterContext,
    line: u8,
    mask: u32,
    pattern_quarter: u32,
) {
    let base_line = mask | ((line as u32 / 4) & 7);
    let mut scroll = cx.hscroll_high as u32;
    for n in 0..32u32 {
        let idx = (name_index(line, scroll) + (scroll & 0x1F)) | NAME_FILL;
        let pattern_nr = pattern_quarter | cx.vram.name_table.read(cx.vram.data(), idx) as u32;
        let colour = cx
            .vram
            .pattern_table
            .read(cx.vram.data(), (pattern_nr * 8) | base_line);
        let cl = pal_fg[(colour >> 4) as usize];
        let cr = pal_fg[(colour & 0x0F) as usize];
        let cell = &mut out[8 * n as usize..8 * n as usize + 8];
        cell[..4].fill(cl);
        cell[4..].fill(cr);
        scroll += 1;
    }
}

fn render_multi<P: Pixel>(out: &mut [P], pal_fg: &[P; 32], cx: &CharacterContext, line: u8) {
    render_multi_helper(out, pal_fg, cx, line, !0u32 << 11, 0);
}

fn render_multi_q<P: Pixel>(out: &mut [P], pal_fg: &[P; 32], cx: &CharacterContext, line: u8) {
    let pattern_quarter = ((line as u32) * 4) & !0xFF; // (line / 8) * 32
    render_multi_helper(out, pal_fg, cx, line, !0u32 << 13, pattern_quarter);
}

/// Undefined character modes show a fixed 40-column pattern of
/// foreground bars on the backdrop.
fn render_bogus<P: Pixel>(out: &mut [P], pal_fg: &[P; 32], pal_bg: &[P; 16], cx: &CharacterContext) {
    let fg = pal_fg[cx.fg_colour as usize];
    let bg = pal_bg[cx.bg_colour as usize];
    out[..256].fill(bg);
    let mut x = 8;
    for _ in 0..20 {
        out[x..x + 4].fill(fg);
        x += 6;
    }
}

/// Pixels per converted line in the given character mode.
pub fn line_pixels(mode: DisplayMode) -> usize {
    match mode.base() {
        DisplayMode::TEXT1 | DisplayMode::TEXT1Q => 240,
        DisplayMode::TEXT2 => 480,
        _ => 256,
    }
}

/// Convert one character mode line into `out`.
pub fn render_line<P: Pixel>(
    out: &mut [P],
    mode: DisplayMode,
    pal_fg: &[P; 32],
    pal_bg: &[P; 16],
    cx: &CharacterContext,
    line: u8,
) {
    match mode.base() {
        DisplayMode::GRAPHIC1 => render_graphic1(out, pal_fg, cx, line),
        DisplayMode::TEXT1 => render_text1(out, pal_fg, pal_bg, cx, line),
        DisplayMode::MULTICOLOUR => render_multi(out, pal_fg, cx, line),
        DisplayMode::GRAPHIC2 | DisplayMode::GRAPHIC3 => render_graphic2(out, pal_fg, cx, line),
        DisplayMode::TEXT1Q => render_text1q(out, pal_fg, pal_bg, cx, line),
        DisplayMode::MULTICOLOUR_Q => render_multi_q(out, pal_fg, cx, line),
        DisplayMode::TEXT2 => render_text2(out, pal_fg, pal_bg, cx, line),
        _ => render_bogus(out, pal_fg, pal_bg, cx),
    }
}
