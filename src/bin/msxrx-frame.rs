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

//! Headless frame dumper
//!
//! Development harness for the VDP core: boots a VDP, optionally loads a
//! VRAM image and applies a register write script, runs a number of
//! frames and writes the last one as a binary PPM file.
//!
//! The register script is a text file with one write per line:
//!
//! ```text
//! # reg value (both may be hex with an 0x prefix)
//! 0 0x06
//! 1 0x40
//! 7 0x44
//! ```

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use msxrx::core::config::VdpConfig;
use msxrx::core::render::{PixelDepth, PixelRasterizer};
use msxrx::core::vdp::Vdp;
use msxrx::core::TICKS_PER_LINE;

#[derive(Parser)]
#[command(name = "msxrx-frame", about = "Render MSX VDP frames headlessly")]
struct Args {
    /// TOML configuration file (chip version, VRAM size, options)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Binary VRAM image loaded at address 0
    #[arg(long)]
    vram: Option<PathBuf>,

    /// Register write script applied before the first frame
    #[arg(long)]
    script: Option<PathBuf>,

    /// Number of frames to emulate
    #[arg(long, default_value_t = 3)]
    frames: u64,

    /// Output image (binary PPM, 640x240)
    #[arg(short, long, default_value = "frame.ppm")]
    output: PathBuf,
}

fn parse_number(text: &str) -> Result<u8, String> {
    let text = text.trim();
    let parsed = if let Some(hex) = text.strip_prefix("0x") {
        u8::from_str_radix(hex, 16)
    } else {
        text.parse()
    };
    parsed.map_err(|e| format!("bad number {text:?}: {e}"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; .env can carry RUST_LOG.
    dotenvy::dotenv().ok();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => VdpConfig::from_toml(&fs::read_to_string(path)?)?,
        None => VdpConfig::default(),
    };
    log::info!("configuration: {config:?}");

    let rasterizer = Box::new(PixelRasterizer::new(PixelDepth::Bpp32));
    let mut vdp = Vdp::new(config, rasterizer)?;

    if let Some(path) = &args.vram {
        let image = fs::read(path)?;
        log::info!("loaded {} bytes of VRAM from {}", image.len(), path.display());
        vdp.load_vram_image(&image);
    }

    if let Some(path) = &args.script {
        let mut time = 0;
        for (nr, line) in fs::read_to_string(path)?.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (reg, value) = match (parts.next(), parts.next()) {
                (Some(r), Some(v)) => (parse_number(r)?, parse_number(v)?),
                _ => return Err(format!("script line {}: expected 'reg value'", nr + 1).into()),
            };
            // One write per line keeps the schedule deterministic.
            time += TICKS_PER_LINE;
            vdp.write_port(1, value, time);
            vdp.write_port(1, 0x80 | reg, time);
            log::debug!("script: R#{reg} = {value:#04X}");
        }
    }

    let end = args.frames * vdp.ticks_per_frame() + 1;
    vdp.execute_until(end);

    let Some(frame) = vdp.frame() else {
        return Err("rasterizer produced no frame".into());
    };
    let rgb = frame.to_rgb888();
    let mut ppm = b"P6\n640 240\n255\n".to_vec();
    ppm.extend_from_slice(&rgb);
    fs::write(&args.output, &ppm)?;
    log::info!("wrote {}", args.output.display());

    Ok(())
}
