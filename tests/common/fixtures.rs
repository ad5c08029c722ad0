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

//! Test fixtures

use std::io::Write;

use ps2rx::core::gs::PixelFormat;
use ps2rx::core::gsmem::MemManager;
use tempfile::{Builder, NamedTempFile};

/// Typical layout: a double-buffered framebuffer, a 16-bit depth buffer and a
/// texture pool with high-nibble aliases
#[allow(dead_code)]
pub fn game_layout() -> MemManager {
    let mut manager = MemManager::new();
    manager.add_slot(0, 140, PixelFormat::Psm32).unwrap();
    manager.add_slot(140, 140, PixelFormat::Psm32).unwrap();
    manager.add_slot(280, 70, PixelFormat::Psm16).unwrap();
    for i in 0..4 {
        manager.add_slot(350 + i * 32, 32, PixelFormat::Psm32).unwrap();
    }
    manager.add_slot(478, 16, PixelFormat::Psm8).unwrap();
    manager.add_slot(494, 16, PixelFormat::Psm4hh).unwrap();
    manager
}

/// Write `content` to a temporary `.toml` file
#[allow(dead_code)]
pub fn config_file(content: &str) -> NamedTempFile {
    let mut file = Builder::new()
        .prefix("ps2rx_config_")
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
