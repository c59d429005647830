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

//! VDP control and status register definitions
//!
//! Register writes are masked per VDP version so that bits which do not
//! exist on the emulated chip always read as zero: the MSX1 chips only
//! implement R#0..R#7 (and mirror them through the register index), the
//! V9938 adds R#8..R#23 and the command registers, the V9958 enables
//! R#25..R#27.

use bitflags::bitflags;

use crate::core::config::VdpVersion;

bitflags! {
    /// Control register 0.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Reg0: u8 {
        /// Digitize mode.
        const DG = 0x40;
        /// Light pen interrupt enable.
        const IE2 = 0x20;
        /// Horizontal scan interrupt enable.
        const IE1 = 0x10;
        /// Mode bit 5.
        const M5 = 0x08;
        /// Mode bit 4.
        const M4 = 0x04;
        /// Mode bit 3.
        const M3 = 0x02;
    }

    /// Control register 1.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Reg1: u8 {
        /// Display enable ("blank" when clear).
        const BL = 0x40;
        /// Vertical scan interrupt enable.
        const IE0 = 0x20;
        /// Mode bit 1.
        const M1 = 0x10;
        /// Mode bit 2.
        const M2 = 0x08;
        /// 16x16 sprites.
        const SI = 0x02;
        /// Sprite magnification.
        const MAG = 0x01;
    }

    /// Control register 8.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Reg8: u8 {
        /// Mouse enable.
        const MS = 0x80;
        /// Light pen enable.
        const LP = 0x40;
        /// Colour 0 contains a colour (transparency off).
        const TP = 0x20;
        /// Colour bus input mode.
        const CB = 0x10;
        /// 64K VRAM chips.
        const VR = 0x08;
        /// Sprites disabled.
        const SPD = 0x02;
        /// Black and white output.
        const BW = 0x01;
    }

    /// Status register 0.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status0: u8 {
        /// Vertical scan interrupt flag.
        const F = 0x80;
        /// 5th/9th sprite flag.
        const FS = 0x40;
        /// Sprite collision flag.
        const C = 0x20;
    }

    /// Status register 2 (the VDP-owned bits; CE/BD/TR come from the
    /// command engine).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status2: u8 {
        /// Vertical retrace.
        const VR = 0x40;
        /// Horizontal retrace.
        const HR = 0x20;
        /// Even/odd field.
        const EO = 0x02;
    }
}

/// Which bits exist per control register on MSX1 VDPs.
const VALUE_MASKS_MSX1: [u8; 32] = [
    0x03, 0xFB, 0x0F, 0xFF, 0x07, 0x7F, 0x07, 0xFF, // 00..07
    0, 0, 0, 0, 0, 0, 0, 0, // 08..15
    0, 0, 0, 0, 0, 0, 0, 0, // 16..23
    0, 0, 0, 0, 0, 0, 0, 0, // 24..31
];

/// Which bits exist per control register on MSX2 VDPs.
const VALUE_MASKS_MSX2: [u8; 32] = [
    0x7E, 0x7B, 0x7F, 0xFF, 0x3F, 0xFF, 0x3F, 0xFF, // 00..07
    0xFB, 0xBF, 0x07, 0x03, 0xFF, 0xFF, 0x07, 0x0F, // 08..15
    0x0F, 0xBF, 0xFF, 0xFF, 0x3F, 0x3F, 0x3F, 0xFF, // 16..23
    0, 0, 0, 0, 0, 0, 0, 0, // 24..31
];

/// Mask on the control register index: makes MSX2 registers inaccessible
/// on MSX1; the MSX1 registers are mirrored instead.
pub fn control_reg_mask(version: VdpVersion) -> u8 {
    if version.is_msx1() {
        0x07
    } else {
        0x3F
    }
}

/// Per-register value masks for a VDP version.
///
/// Guarantees that non-existent bits are always zero, and disables VDP
/// features a model does not support.
pub fn control_value_masks(version: VdpVersion) -> [u8; 32] {
    let mut masks = if version.is_msx1() {
        VALUE_MASKS_MSX1
    } else {
        VALUE_MASKS_MSX2
    };
    if version == VdpVersion::V9958 {
        // Enable V9958-specific control registers.
        masks[25] = 0x7F;
        masks[26] = 0x3F;
        masks[27] = 0x07;
    }
    masks
}
