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

//! VDP master clock
//!
//! All VDP timing is expressed in ticks of the 21.47727 MHz master clock.
//! One scan line is always 1368 ticks; an NTSC frame is 262 lines and a
//! PAL frame is 313 lines. Timestamps passed into the core are absolute
//! tick counts and must never decrease.

use serde::{Deserialize, Serialize};

/// Absolute moment in emulated time, measured in VDP master clock ticks.
pub type Ticks = u64;

/// Number of VDP clock ticks per second (21.47727 MHz).
pub const TICKS_PER_SECOND: u64 = 21_477_270;

/// Number of VDP clock ticks per scan line.
pub const TICKS_PER_LINE: u64 = 1368;

/// Scan lines per NTSC frame.
pub const NTSC_LINES_PER_FRAME: u64 = 262;

/// Scan lines per PAL frame.
pub const PAL_LINES_PER_FRAME: u64 = 313;

/// Number of ticks in one frame for the given timing standard.
///
/// # Example
///
/// ```
/// use msxrx::core::clock::{ticks_per_frame, TICKS_PER_LINE};
///
/// assert_eq!(ticks_per_frame(false), 262 * TICKS_PER_LINE); // NTSC
/// assert_eq!(ticks_per_frame(true), 313 * TICKS_PER_LINE); // PAL
/// ```
#[inline(always)]
pub fn ticks_per_frame(pal_timing: bool) -> u64 {
    TICKS_PER_LINE
        * if pal_timing {
            PAL_LINES_PER_FRAME
        } else {
            NTSC_LINES_PER_FRAME
        }
}

/// Clock anchored at the start of the current frame.
///
/// Converts between absolute time and "ticks into the current frame".
/// The anchor only moves forward, at frame boundaries.
///
/// # Example
///
/// ```
/// use msxrx::core::clock::{FrameClock, TICKS_PER_LINE};
///
/// let mut clock = FrameClock::new(0);
/// assert_eq!(clock.ticks_till(3 * TICKS_PER_LINE), 3 * TICKS_PER_LINE);
/// clock.reset(1000);
/// assert_eq!(clock.ticks_till(1368 + 1000), 1368);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FrameClock {
    /// Absolute time at which the current frame started.
    start: Ticks,
}

impl FrameClock {
    /// Create a clock anchored at `start`.
    pub fn new(start: Ticks) -> Self {
        Self { start }
    }

    /// Absolute time at which the current frame started.
    #[inline(always)]
    pub fn start(&self) -> Ticks {
        self.start
    }

    /// Re-anchor the clock at the start of a new frame.
    ///
    /// The clock never goes backwards; a `start` before the current
    /// anchor is a bug in the caller.
    pub fn reset(&mut self, start: Ticks) {
        debug_assert!(start >= self.start, "frame clock moved backwards");
        self.start = start;
    }

    /// Re-anchor the clock without the monotonicity requirement.
    ///
    /// Only save-state restores may move time backwards.
    pub fn restore(&mut self, start: Ticks) {
        self.start = start;
    }

    /// Number of ticks elapsed between frame start and `time`.
    #[inline(always)]
    pub fn ticks_till(&self, time: Ticks) -> u64 {
        debug_assert!(time >= self.start, "time predates frame start");
        time - self.start
    }

    /// Absolute time of a moment `ticks` into the current frame.
    #[inline(always)]
    pub fn add(&self, ticks: u64) -> Ticks {
        self.start + ticks
    }

    /// Scan line (relative to frame start) containing `time`.
    #[inline(always)]
    pub fn line_at(&self, time: Ticks) -> u64 {
        self.ticks_till(time) / TICKS_PER_LINE
    }
}
