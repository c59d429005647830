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

//! Sprite line converter
//!
//! Draws the sprites the sprite checker recorded for one line on top of
//! the display pixels. Sprite mode 1 simply overdraws in reverse
//! priority order; sprite mode 2 scans left to right so that CC=1
//! sprites can OR their colour into the sprite below them.

use super::raw_frame::Pixel;
use crate::core::display::DisplayMode;
use crate::core::sprites::{pattern_width, SpriteInfo};

/// Draw sprites in sprite mode 1.
///
/// `out` starts at display X coordinate 0; `min_x`/`max_x` bound the
/// range to draw (in 256-wide sprite coordinates).
pub fn draw_mode1<P: Pixel>(
    out: &mut [P],
    sprites: &[SpriteInfo],
    palette: &[P; 16],
    min_x: i32,
    max_x: i32,
) {
    // Render using overdraw, lowest priority sprite first.
    for sprite in sprites.iter().rev() {
        let colour_index = sprite.colour_attrib & 0x0F;
        // Transparent sprites are invisible in sprite mode 1.
        if colour_index == 0 {
            continue;
        }
        let colour = palette[colour_index as usize];
        let mut pattern = sprite.pattern;
        let mut x = sprite.x;
        // Clip the pattern to the render range.
        if x < min_x {
            if x <= min_x - 32 {
                continue;
            }
            pattern <<= min_x - x;
            x = min_x;
        } else if x > max_x - 32 {
            if x >= max_x {
                continue;
            }
            pattern &= !0u32 << (32 - (max_x - x));
        }
        let mut x = x as usize;
        while pattern != 0 {
            if pattern & 0x8000_0000 != 0 {
                if let Some(px) = out.get_mut(x) {
                    *px = colour;
                }
            }
            pattern <<= 1;
            x += 1;
        }
    }
}

/// Draw sprites in sprite mode 2.
///
/// In the 512-pixel-wide modes every sprite pixel covers two host
/// pixels; Graphic 5 additionally splits the 4-bit colour into two
/// 2-bit pixels.
pub fn draw_mode2<P: Pixel>(
    out: &mut [P],
    sprites: &[SpriteInfo],
    palette: &[P; 16],
    min_x: i32,
    max_x: i32,
    mode: DisplayMode,
    transparency: bool,
) {
    if sprites.is_empty() {
        return;
    }

    // Determine the widest extent any sprite can cover.
    let mut combined = 0u32;
    for sprite in sprites {
        combined |= sprite.pattern;
    }
    let max_size = pattern_width(combined) as i32;

    // Left-to-right scan.
    let mut pixel_done = min_x;
    while pixel_done < max_x {
        // Skip ahead to the next sprite edge if possible.
        let min_start = pixel_done - max_size;
        let mut left_most = i32::MAX;
        for sprite in sprites {
            if min_start < sprite.x && sprite.x < left_most {
                left_most = sprite.x;
            }
        }
        if left_most > pixel_done {
            pixel_done = left_most;
            if pixel_done >= 256 {
                break;
            }
        }

        // Calculate the colour of the pixel to be plotted.
        let mut colour: u8 = 0xFF;
        let mut i = 0;
        while i < sprites.len() {
            let sprite = &sprites[i];
            let shift = pixel_done - sprite.x;
            if (0..max_size).contains(&shift) && (sprite.pattern << shift) & 0x8000_0000 != 0 {
                let c = sprite.colour_attrib & 0x0F;
                if c == 0 && transparency {
                    i += 1;
                    continue;
                }
                colour = c;
                // Merge in any following CC=1 sprites.
                let mut j = i + 1;
                while j < sprites.len() {
                    let cc = &sprites[j];
                    if cc.colour_attrib & 0x40 == 0 {
                        break;
                    }
                    if (0..max_size).contains(&shift) && (cc.pattern << shift) & 0x8000_0000 != 0 {
                        colour |= cc.colour_attrib & 0x0F;
                    }
                    j += 1;
                }
                break;
            }
            i += 1;
        }

        // Plot it.
        if colour != 0xFF {
            if mode.base() == DisplayMode::GRAPHIC5 {
                let left = palette[(colour >> 2) as usize];
                let right = palette[(colour & 3) as usize];
                let x = pixel_done as usize * 2;
                if let Some(px) = out.get_mut(x) {
                    *px = left;
                }
                if let Some(px) = out.get_mut(x + 1) {
                    *px = right;
                }
            } else if mode.line_width() == 512 {
                let pix = palette[colour as usize];
                let x = pixel_done as usize * 2;
                if let Some(px) = out.get_mut(x) {
                    *px = pix;
                }
                if let Some(px) = out.get_mut(x + 1) {
                    *px = pix;
                }
            } else if let Some(px) = out.get_mut(pixel_done as usize) {
                *px = palette[colour as usize];
            }
        }
        pixel_done += 1;
    }
}
