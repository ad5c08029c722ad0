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

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use log::{debug, error, info};
use ps2rx::core::config::Config;
use ps2rx::core::dma::{walk_chain, DmaChannel, RecordingTransport};
use ps2rx::core::error::{Ps2Error, Result};
use ps2rx::core::gs::{reg_addrs, AdWrite, GifTag, PixelFormat};
use ps2rx::core::gsmem::{Alignment, MemManager};
use ps2rx::core::packet::{ChainPacket, VifPacket};
use ps2rx::core::vif::{UnpackFlags, UnpackMode};

/// Slots used when the configuration has none: four 64-page psm32 slots
const DEFAULT_SLOTS: [(u32, u32); 4] = [(0, 64), (64, 64), (128, 64), (192, 64)];

/// PS2 DMA packet and GS memory tool
#[derive(Parser)]
#[command(name = "ps2rx")]
#[command(about = "PlayStation 2 DMA packet and GS memory tool", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a sample VIF1 chain, dump it and walk its tags
    Packet {
        /// Transfer DMA tags along with the data
        #[arg(long)]
        tte: bool,

        /// Number of V4_32 quadwords to unpack
        #[arg(short = 'q', long, default_value = "4")]
        quads: u16,
    },

    /// Allocate areas in GS memory and print the slot table
    Alloc {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Number of frames to replay the allocations over
        #[arg(short = 'f', long, default_value = "1")]
        frames: u32,

        /// Areas to allocate, as WIDTHxHEIGHT:FORMAT (e.g. 256x256:psm8)
        #[arg(required = true)]
        areas: Vec<AreaSpec>,
    },
}

/// Area requested on the command line
#[derive(Debug, Clone, Copy)]
struct AreaSpec {
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl FromStr for AreaSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (size, format) = s
            .split_once(':')
            .ok_or_else(|| format!("expected WIDTHxHEIGHT:FORMAT, got '{}'", s))?;
        let (width, height) = size
            .split_once('x')
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", size))?;
        Ok(Self {
            width: width.parse().map_err(|e| format!("bad width '{}': {}", width, e))?,
            height: height.parse().map_err(|e| format!("bad height '{}': {}", height, e))?,
            format: format.parse()?,
        })
    }
}

fn main() -> Result<()> {
    // .env may set RUST_LOG and PS2RX_* overrides
    dotenvy::dotenv().ok();

    // Initialize logger with default level INFO
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("ps2rx v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from: {}", path.display());
            Config::load(path)?
        }
        None => Config::default(),
    };
    config.apply_env()?;

    let result = match args.command {
        Command::Packet { tte, quads } => run_packet(&config, tte, quads),
        Command::Alloc {
            json,
            frames,
            areas,
        } => run_alloc(&config, &areas, frames, json),
    };

    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

fn run_packet(config: &Config, tte: bool, quads: u16) -> Result<()> {
    let mut packet_config = config.packet.clone();
    packet_config.tte = packet_config.tte || tte;
    packet_config.default_qwords = packet_config.default_qwords.max(quads as usize + 8);

    let mut packet = VifPacket::with_config(DmaChannel::Vif1, &packet_config);

    // With TTE the codes start in the upper half of the tag quadword
    packet.cnt()?.set_cycle(1, 1, false)?.pad96()?;
    packet.open_unpack(UnpackMode::V4_32, 0, UnpackFlags::default(), false)?;
    for i in 0..quads {
        let v = i as f32;
        packet.add(&[v, v, v, 1.0f32])?;
    }
    packet.close_unpack()?.flush(false)?;

    packet.pad96()?.open_direct(false)?;
    packet.add(&GifTag::ad(1, true))?;
    packet.add(&AdWrite::new(reg_addrs::PRIM, 0x06))?;
    packet.close_direct()?.close_tag()?;

    packet.end()?;
    if packet.tte() {
        packet.nop(false)?.nop(false)?;
    }
    packet.close_tag()?;

    print!("{}", packet.packet());

    for segment in walk_chain(packet.packet().as_bytes(), packet.tte())? {
        info!(
            "{:#06x}: {:?} qwc={} payload={:?}",
            segment.offset, segment.tag.id, segment.tag.qwc, segment.payload
        );
    }

    let mut transport = RecordingTransport::new();
    packet.send(&mut transport, true, true)?;
    info!("Sent {} qwords on {}", packet.packet().qword_len(), packet.packet().channel());
    Ok(())
}

fn run_alloc(config: &Config, areas: &[AreaSpec], frames: u32, json: bool) -> Result<()> {
    let mut manager = if config.gsmem.slots.is_empty() {
        let mut manager = MemManager::new();
        for (first, len) in DEFAULT_SLOTS {
            manager.add_slot(first, len, PixelFormat::Psm32)?;
        }
        manager
    } else {
        MemManager::from_config(&config.gsmem)?
    };

    let ids: Vec<_> = areas
        .iter()
        .map(|spec| manager.add_area(spec.width, spec.height, spec.format, Alignment::Page))
        .collect();

    for frame in 0..frames.max(1) {
        manager.set_cur_frame(frame);
        debug!("Frame {}", frame);
        for (id, spec) in ids.iter().zip(areas) {
            if manager.is_allocated(*id)? {
                continue;
            }
            let allocation = manager.alloc(*id)?;
            info!(
                "{}x{} {} -> slot {} at word {:#x}",
                spec.width, spec.height, spec.format, allocation.slot, allocation.word_addr
            );
            if let Some(evicted) = allocation.evicted {
                info!("  evicted area {}", evicted);
            }
        }
    }

    let report = manager.allocation_report();
    if json {
        let text = serde_json::to_string_pretty(&report).map_err(|e| Ps2Error::Config(e.to_string()))?;
        println!("{}", text);
    } else {
        print!("{}", report);
    }
    Ok(())
}
