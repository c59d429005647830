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

//! Command engine benchmarks

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use msxrx::core::cmd::CmdEngine;
use msxrx::core::display::DisplayMode;
use msxrx::core::vram::Vram;

fn engine_graphic4() -> (CmdEngine, Vram) {
    let mut vram = Vram::new(0x20000);
    let mut engine = CmdEngine::new(true);
    engine.reset(&mut vram, 0);
    engine.update_display_mode(DisplayMode::new(0x06, 0x00, 0), false, &mut vram, 0);
    (engine, vram)
}

fn set_regs(engine: &mut CmdEngine, vram: &mut Vram, regs: &[(u8, u8)]) {
    for &(index, value) in regs {
        engine.set_cmd_reg(index, value, vram, 0);
    }
}

fn bench_hmmv_fill(c: &mut Criterion) {
    c.bench_function("hmmv_full_screen_fill", |b| {
        let (mut engine, mut vram) = engine_graphic4();
        b.iter(|| {
            set_regs(
                &mut engine,
                &mut vram,
                &[
                    (0x04, 0), // DX
                    (0x05, 0),
                    (0x06, 0), // DY
                    (0x07, 0),
                    (0x08, 0), // NX = 256
                    (0x09, 1),
                    (0x0A, 212), // NY
                    (0x0B, 0),
                    (0x0C, 0xFF),
                    (0x0D, 0),
                    (0x0E, 0xC0), // HMMV
                ],
            );
            black_box(vram.read(0));
        });
    });
}

fn bench_lmmm_copy(c: &mut Criterion) {
    c.bench_function("lmmm_page_copy", |b| {
        let (mut engine, mut vram) = engine_graphic4();
        b.iter(|| {
            set_regs(
                &mut engine,
                &mut vram,
                &[
                    (0x00, 0), // SX
                    (0x01, 0),
                    (0x02, 0), // SY
                    (0x03, 0),
                    (0x04, 0), // DX
                    (0x05, 0),
                    (0x06, 0), // DY = 256 (second page)
                    (0x07, 1),
                    (0x08, 0), // NX = 256
                    (0x09, 1),
                    (0x0A, 212), // NY
                    (0x0B, 0),
                    (0x0C, 0),
                    (0x0D, 0),
                    (0x0E, 0x90), // LMMM, IMP
                ],
            );
            black_box(vram.read(256 * 128));
        });
    });
}

criterion_group!(benches, bench_hmmv_fill, bench_lmmm_copy);
criterion_main!(benches);
