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

//! VDP access slots
//!
//! The VDP can only access its VRAM in specific time slots; which slots
//! are available depends on whether the screen is being rendered, whether
//! sprites are fetched, on the display mode class (text, character or
//! bitmap) and on the chip generation (TMS99x8 vs V99x8).
//!
//! Each table lists the slot offsets within one 1368-tick scan line, in
//! ascending order, and repeats every line. The tables are extended with
//! cyclic duplicates so a lookup starting anywhere in the line always
//! finds a slot without wrapping.

use serde::{Deserialize, Serialize};

use crate::core::clock::{Ticks, TICKS_PER_LINE};
use crate::core::display::DisplayMode;

// Screen rendering disabled (or vertical border).
// This is correct (measured on real V9938) for bitmap and character mode.
#[rustfmt::skip]
const SLOTS_SCREEN_OFF: [u16; 154 + 17] = [
       0,    8,   16,   24,   32,   40,   48,   56,   64,   72,
      80,   88,   96,  104,  112,  120,  164,  172,  180,  188,
     196,  204,  212,  220,  228,  236,  244,  252,  260,  268,
     276,  292,  300,  308,  316,  324,  332,  340,  348,  356,
     364,  372,  380,  388,  396,  404,  420,  428,  436,  444,
     452,  460,  468,  476,  484,  492,  500,  508,  516,  524,
     532,  548,  556,  564,  572,  580,  588,  596,  604,  612,
     620,  628,  636,  644,  652,  660,  676,  684,  692,  700,
     708,  716,  724,  732,  740,  748,  756,  764,  772,  780,
     788,  804,  812,  820,  828,  836,  844,  852,  860,  868,
     876,  884,  892,  900,  908,  916,  932,  940,  948,  956,
     964,  972,  980,  988,  996, 1004, 1012, 1020, 1028, 1036,
    1044, 1060, 1068, 1076, 1084, 1092, 1100, 1108, 1116, 1124,
    1132, 1140, 1148, 1156, 1164, 1172, 1188, 1196, 1204, 1212,
    1220, 1228, 1268, 1276, 1284, 1292, 1300, 1308, 1316, 1324,
    1334, 1344, 1352, 1360,
    1368,      1368 + 8,  1368 + 16, 1368 + 24, 1368 + 32,
    1368 + 40, 1368 + 48, 1368 + 56, 1368 + 64, 1368 + 72,
    1368 + 80, 1368 + 88, 1368 + 96, 1368 + 104, 1368 + 112,
    1368 + 120, 1368 + 164,
];

// Bitmap mode, sprites disabled.
#[rustfmt::skip]
const SLOTS_SPRITES_OFF: [u16; 88 + 16] = [
       6,   14,   22,   30,   38,   46,   54,   62,   70,   78,
      86,   94,  102,  110,  118,  162,  170,  182,  188,  214,
     220,  246,  252,  278,  310,  316,  342,  348,  374,  380,
     406,  438,  444,  470,  476,  502,  508,  534,  566,  572,
     598,  604,  630,  636,  662,  694,  700,  726,  732,  758,
     764,  790,  822,  828,  854,  860,  886,  892,  918,  950,
     956,  982,  988, 1014, 1020, 1046, 1078, 1084, 1110, 1116,
    1142, 1148, 1174, 1206, 1212, 1266, 1274, 1282, 1290, 1298,
    1306, 1314, 1322, 1332, 1342, 1350, 1358, 1366,
    1368 + 6,  1368 + 14, 1368 + 22,  1368 + 30,  1368 + 38,
    1368 + 46, 1368 + 54, 1368 + 62,  1368 + 70,  1368 + 78,
    1368 + 86, 1368 + 94, 1368 + 102, 1368 + 110, 1368 + 118,
    1368 + 162,
];

// Character mode, sprites disabled.
#[rustfmt::skip]
const SLOTS_CHAR_SPRITES_OFF: [u16; 88 + 17] = [
       2,   10,   18,   26,   34,   42,   50,   58,   66,   74,
      82,   90,   98,  106,  114,  122,  166,  174,  188,  194,
     220,  226,  252,  258,  290,  316,  322,  348,  354,  380,
     386,  418,  444,  450,  476,  482,  508,  514,  546,  572,
     578,  604,  610,  636,  642,  674,  700,  706,  732,  738,
     764,  770,  802,  828,  834,  860,  866,  892,  898,  930,
     956,  962,  988,  994, 1020, 1026, 1058, 1084, 1090, 1116,
    1122, 1148, 1154, 1186, 1212, 1218, 1270, 1278, 1286, 1294,
    1302, 1310, 1318, 1326, 1336, 1346, 1354, 1362,
    1368 + 2,  1368 + 10, 1368 + 18, 1368 + 26,  1368 + 34,
    1368 + 42, 1368 + 50, 1368 + 58, 1368 + 66,  1368 + 74,
    1368 + 82, 1368 + 90, 1368 + 98, 1368 + 106, 1368 + 114,
    1368 + 122, 1368 + 166,
];

// Bitmap mode, sprites enabled.
#[rustfmt::skip]
const SLOTS_SPRITES_ON: [u16; 31 + 3] = [
      28,   92,  162,  170,  188,  220,  252,  316,  348,  380,
     444,  476,  508,  572,  604,  636,  700,  732,  764,  828,
     860,  892,  956,  988, 1020, 1084, 1116, 1148, 1212, 1264,
    1330,
    1368 + 28, 1368 + 92, 1368 + 162,
];

// Character mode, sprites enabled.
#[rustfmt::skip]
const SLOTS_CHAR_SPRITES_ON: [u16; 31 + 3] = [
      32,   96,  166,  174,  188,  220,  252,  316,  348,  380,
     444,  476,  508,  572,  604,  636,  700,  732,  764,  828,
     860,  892,  956,  988, 1020, 1084, 1116, 1148, 1212, 1268,
    1334,
    1368 + 32, 1368 + 96, 1368 + 166,
];

// Text mode.
#[rustfmt::skip]
const SLOTS_TEXT: [u16; 47 + 10] = [
       2,   10,   18,   26,   34,   42,   50,   58,   66,  166,
     174,  182,  190,  198,  206,  214,  222,  312,  408,  504,
     600,  696,  792,  888,  984, 1080, 1176, 1206, 1214, 1222,
    1230, 1238, 1246, 1254, 1262, 1270, 1278, 1286, 1294, 1302,
    1310, 1318, 1326, 1336, 1346, 1354, 1362,
    1368 + 2,  1368 + 10, 1368 + 18, 1368 + 26, 1368 + 34,
    1368 + 42, 1368 + 50, 1368 + 58, 1368 + 66, 1368 + 166,
];

// TMS9918 (MSX1) cycle numbers translated to V99x8 cycles (multiplied by 4).
// MSX1 screen off.
#[rustfmt::skip]
const SLOTS_MSX1_SCREEN_OFF: [u16; 107 + 18] = [
       4,   12,   20,   28,   36,   44,   52,   60,   68,   76,
      84,   92,  100,  108,  116,  124,  132,  140,  148,  156,
     164,  172,  180,  188,  196,  204,  220,  236,  252,  268,
     284,  300,  316,  332,  348,  364,  380,  396,  412,  428,
     444,  460,  476,  492,  508,  524,  540,  556,  572,  588,
     604,  620,  636,  652,  668,  684,  700,  716,  732,  748,
     764,  780,  796,  812,  828,  844,  860,  876,  892,  908,
     924,  940,  956,  972,  988, 1004, 1020, 1036, 1052, 1068,
    1084, 1100, 1116, 1132, 1148, 1164, 1180, 1196, 1212, 1228,
    1236, 1244, 1252, 1260, 1268, 1276, 1284, 1292, 1300, 1308,
    1316, 1324, 1332, 1340, 1348, 1356, 1364,
    1368 + 4,   1368 + 12,  1368 + 20,  1368 + 28,  1368 + 36,
    1368 + 44,  1368 + 52,  1368 + 60,  1368 + 68,  1368 + 76,
    1368 + 84,  1368 + 92,  1368 + 100, 1368 + 108, 1368 + 116,
    1368 + 124, 1368 + 132, 1368 + 140,
];

// MSX1 graphic mode 1 and 2 (aka screen 1 and 2).
#[rustfmt::skip]
const SLOTS_MSX1_GFX12: [u16; 19 + 8] = [
       4,   12,   20,   28,  116,  124,  132,  140,  220,  348,
     476,  604,  732,  860,  988, 1116, 1236, 1244, 1364,
    1368 + 4,   1368 + 12,  1368 + 20, 1368 + 28, 1368 + 116,
    1368 + 124, 1368 + 132, 1368 + 140,
];

// MSX1 graphic mode 3 (aka screen 3).
#[rustfmt::skip]
const SLOTS_MSX1_GFX3: [u16; 51 + 8] = [
       4,   12,   20,   28,  116,  124,  132,  140,  220,  228,
     260,  292,  324,  348,  356,  388,  420,  452,  476,  484,
     516,  548,  580,  604,  612,  644,  676,  708,  732,  740,
     772,  804,  836,  860,  868,  900,  932,  964,  988,  996,
    1028, 1060, 1092, 1116, 1124, 1156, 1188, 1220, 1236, 1244,
    1364,
    1368 + 4,   1368 + 12,  1368 + 20, 1368 + 28, 1368 + 116,
    1368 + 124, 1368 + 132, 1368 + 140,
];

// MSX1 text mode 1 (aka screen 0 width 40).
#[rustfmt::skip]
const SLOTS_MSX1_TEXT: [u16; 91 + 18] = [
       4,   12,   20,   28,   36,   44,   52,   60,   68,   76,
      84,   92,  100,  108,  116,  124,  132,  140,  148,  156,
     164,  172,  180,  188,  196,  204,  212,  220,  228,  244,
     268,  292,  316,  340,  364,  388,  412,  436,  460,  484,
     508,  532,  556,  580,  604,  628,  652,  676,  700,  724,
     748,  772,  796,  820,  844,  868,  892,  916,  940,  964,
     988, 1012, 1036, 1060, 1084, 1108, 1132, 1156, 1180, 1196,
    1204, 1212, 1220, 1228, 1236, 1244, 1252, 1260, 1268, 1276,
    1284, 1292, 1300, 1308, 1316, 1324, 1332, 1340, 1348, 1356,
    1364,
    1368 + 4,   1368 + 12,  1368 + 20,  1368 + 28,  1368 + 36,
    1368 + 44,  1368 + 52,  1368 + 60,  1368 + 68,  1368 + 76,
    1368 + 84,  1368 + 92,  1368 + 100, 1368 + 108, 1368 + 116,
    1368 + 124, 1368 + 132, 1368 + 140,
];

/// Which access-slot table is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotKind {
    /// Screen rendering disabled (V99x8).
    ScreenOff,
    /// Bitmap mode, sprites disabled.
    SpritesOff,
    /// Character mode, sprites disabled.
    CharSpritesOff,
    /// Bitmap mode, sprites enabled.
    SpritesOn,
    /// Character mode, sprites enabled.
    CharSpritesOn,
    /// Text mode.
    Text,
    /// MSX1, screen disabled.
    Msx1ScreenOff,
    /// MSX1 Graphic 1/2.
    Msx1Gfx12,
    /// MSX1 Graphic 3 (Multicolour).
    Msx1Gfx3,
    /// MSX1 Text 1.
    Msx1Text,
    /// Timing emulation disabled: every moment is an access slot.
    Broken,
}

impl SlotKind {
    /// Select the slot table for the current VDP state.
    pub fn select(
        msx1: bool,
        display_enabled: bool,
        sprites_enabled: bool,
        mode: DisplayMode,
    ) -> SlotKind {
        if msx1 {
            if !display_enabled {
                SlotKind::Msx1ScreenOff
            } else if mode.is_text_mode() {
                SlotKind::Msx1Text
            } else if mode.base() == DisplayMode::GRAPHIC3 {
                SlotKind::Msx1Gfx3
            } else {
                SlotKind::Msx1Gfx12
            }
        } else if !display_enabled {
            SlotKind::ScreenOff
        } else if mode.is_bitmap_mode() {
            if sprites_enabled {
                SlotKind::SpritesOn
            } else {
                SlotKind::SpritesOff
            }
        } else if mode.is_text_mode() {
            SlotKind::Text
        } else if sprites_enabled {
            SlotKind::CharSpritesOn
        } else {
            SlotKind::CharSpritesOff
        }
    }

    fn table(self) -> &'static [u16] {
        match self {
            SlotKind::ScreenOff => &SLOTS_SCREEN_OFF,
            SlotKind::SpritesOff => &SLOTS_SPRITES_OFF,
            SlotKind::CharSpritesOff => &SLOTS_CHAR_SPRITES_OFF,
            SlotKind::SpritesOn => &SLOTS_SPRITES_ON,
            SlotKind::CharSpritesOn => &SLOTS_CHAR_SPRITES_ON,
            SlotKind::Text => &SLOTS_TEXT,
            SlotKind::Msx1ScreenOff => &SLOTS_MSX1_SCREEN_OFF,
            SlotKind::Msx1Gfx12 => &SLOTS_MSX1_GFX12,
            SlotKind::Msx1Gfx3 => &SLOTS_MSX1_GFX3,
            SlotKind::Msx1Text => &SLOTS_MSX1_TEXT,
            SlotKind::Broken => &[],
        }
    }
}

/// First moment at or after `time + min_delay` that falls on an access
/// slot of the given table.
///
/// `time` is interpreted through its offset within the scan line, which
/// is how the slot pattern repeats.
pub fn next_access_slot(kind: SlotKind, time: Ticks, min_delay: u16) -> Ticks {
    let table = kind.table();
    if table.is_empty() {
        return time + min_delay as Ticks;
    }
    let offset = (time % TICKS_PER_LINE) as u16;
    let target = offset + min_delay;
    // Tables carry cyclic duplicates past 1368+136, so this always hits.
    for &slot in table {
        if slot >= target {
            return time + (slot - offset) as Ticks;
        }
    }
    // Wrap to the first slot of the next line (only reachable with a
    // delay larger than the duplicated tail).
    time + (TICKS_PER_LINE as u16 - offset + table[0]) as Ticks
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TABLES: [SlotKind; 10] = [
        SlotKind::ScreenOff,
        SlotKind::SpritesOff,
        SlotKind::CharSpritesOff,
        SlotKind::SpritesOn,
        SlotKind::CharSpritesOn,
        SlotKind::Text,
        SlotKind::Msx1ScreenOff,
        SlotKind::Msx1Gfx12,
        SlotKind::Msx1Gfx3,
        SlotKind::Msx1Text,
    ];

    #[test]
    fn test_tables_sorted_and_cover_wraparound() {
        for kind in ALL_TABLES {
            let table = kind.table();
            assert!(table.windows(2).all(|w| w[0] < w[1]), "{kind:?} not sorted");
            // Must contain a value >= 1368 + 136 so any in-line offset
            // finds a slot for the largest delta.
            assert!(*table.last().unwrap() >= 1368 + 136, "{kind:?} too short");
        }
    }

    #[test]
    fn test_next_slot_is_never_in_the_past() {
        for kind in ALL_TABLES {
            for offset in [0u64, 1, 119, 120, 1000, 1367] {
                let t = 5 * 1368 + offset;
                let slot = next_access_slot(kind, t, 0);
                assert!(slot >= t, "{kind:?} offset {offset}");
                assert!(slot - t < 2 * 1368);
            }
        }
    }

    #[test]
    fn test_exact_slot_hit() {
        // Offset 0 is a slot of the screen-off table.
        assert_eq!(next_access_slot(SlotKind::ScreenOff, 1368 * 7, 0), 1368 * 7);
    }

    #[test]
    fn test_broken_timing_has_no_slots() {
        assert_eq!(next_access_slot(SlotKind::Broken, 12345, 0), 12345);
    }

    #[test]
    fn test_select_prefers_screen_off() {
        let g4 = DisplayMode::new(0x06, 0x00, 0);
        assert_eq!(
            SlotKind::select(false, false, true, g4),
            SlotKind::ScreenOff
        );
        assert_eq!(SlotKind::select(false, true, true, g4), SlotKind::SpritesOn);
        assert_eq!(
            SlotKind::select(false, true, false, g4),
            SlotKind::SpritesOff
        );
        let text = DisplayMode::new(0x00, 0x10, 0);
        assert_eq!(SlotKind::select(false, true, true, text), SlotKind::Text);
        assert_eq!(SlotKind::select(true, true, true, text), SlotKind::Msx1Text);
    }
}
