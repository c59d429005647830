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

//! VDP configuration
//!
//! Selects which chip of the VDP family is emulated and a few emulation
//! accuracy knobs. The configuration can be built in code or loaded from
//! a TOML file:
//!
//! ```toml
//! version = "V9938"
//! vram_kb = 128
//! limit_sprites = true
//! instant_cmd_timing = false
//! ```

use serde::{Deserialize, Serialize};

use super::error::{EmulatorError, Result};

/// VDP version: the VDP model being emulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VdpVersion {
    /// MSX1 VDP, NTSC version.
    ///
    /// TMS9918A has NTSC encoding built in, while TMS9928A has colour
    /// difference output; in emulation there is no difference.
    Tms99x8a,

    /// MSX1 VDP, PAL version.
    Tms9929a,

    /// MSX2 VDP.
    V9938,

    /// MSX2+ and turbo R VDP.
    V9958,
}

impl VdpVersion {
    /// Is this an MSX1 VDP (TMS99X8A or TMS9929A)?
    #[inline(always)]
    pub fn is_msx1(self) -> bool {
        matches!(self, VdpVersion::Tms99x8a | VdpVersion::Tms9929a)
    }

    /// Parse a version name as it appears in machine configurations.
    ///
    /// # Example
    ///
    /// ```
    /// use msxrx::core::config::VdpVersion;
    ///
    /// assert_eq!(VdpVersion::parse("V9958").unwrap(), VdpVersion::V9958);
    /// assert!(VdpVersion::parse("V9999").is_err());
    /// ```
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "TMS99X8A" => Ok(VdpVersion::Tms99x8a),
            "TMS9929A" => Ok(VdpVersion::Tms9929a),
            "V9938" => Ok(VdpVersion::V9938),
            "V9958" => Ok(VdpVersion::V9958),
            _ => Err(EmulatorError::UnknownVdpVersion(name.to_string())),
        }
    }
}

/// VDP emulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VdpConfig {
    /// Which chip to emulate.
    pub version: VdpVersion,

    /// VRAM size in kilobytes: 16, 64 or 128.
    ///
    /// MSX1 VDPs always have 16kB; the value is forced down for them.
    pub vram_kb: u32,

    /// Enforce the hardware sprites-per-line limit (4 or 8).
    ///
    /// When disabled, overflow sprites are still rendered, which removes
    /// flicker in games that cycle sprite priorities. The 5th/9th sprite
    /// status bits behave identically either way.
    pub limit_sprites: bool,

    /// Complete VDP commands instantly instead of emulating access slots
    /// and per-operation timing.
    pub instant_cmd_timing: bool,
}

impl Default for VdpConfig {
    fn default() -> Self {
        Self {
            version: VdpVersion::V9938,
            vram_kb: 128,
            limit_sprites: true,
            instant_cmd_timing: false,
        }
    }
}

impl VdpConfig {
    /// Parse a configuration from TOML text.
    ///
    /// # Example
    ///
    /// ```
    /// use msxrx::core::config::{VdpConfig, VdpVersion};
    ///
    /// let config = VdpConfig::from_toml("version = \"V9958\"").unwrap();
    /// assert_eq!(config.version, VdpVersion::V9958);
    /// assert_eq!(config.vram_kb, 128); // default
    /// ```
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: VdpConfig =
            toml::from_str(text).map_err(|e| EmulatorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration describes a buildable VDP.
    pub fn validate(&self) -> Result<()> {
        let vram_kb = self.effective_vram_kb();
        if !matches!(vram_kb, 16 | 64 | 128) {
            return Err(EmulatorError::UnsupportedVramSize(vram_kb));
        }
        Ok(())
    }

    /// VRAM size in kilobytes after applying per-version constraints.
    pub fn effective_vram_kb(&self) -> u32 {
        if self.version.is_msx1() {
            16
        } else {
            self.vram_kb
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(VdpConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_vram_size_rejected() {
        let config = VdpConfig {
            vram_kb: 48,
            ..VdpConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EmulatorError::UnsupportedVramSize(48))
        ));
    }

    #[test]
    fn test_msx1_forces_16kb() {
        let config = VdpConfig {
            version: VdpVersion::Tms9929a,
            vram_kb: 128,
            ..VdpConfig::default()
        };
        assert_eq!(config.effective_vram_kb(), 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(VdpConfig::from_toml("version = 9958").is_err());
    }
}
