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

//! Runtime configuration
//!
//! Configuration is read from a TOML file and may be overridden from the
//! environment (a `.env` file is honoured by the binaries through dotenvy).
//!
//! # Example
//!
//! ```
//! use ps2rx::core::config::{CheckMode, Config};
//!
//! let config = Config::from_toml_str(r#"
//!     [packet]
//!     check_mode = "unchecked"
//!
//!     [[gsmem.slots]]
//!     first_page = 0
//!     page_len = 32
//!     format = "psm32"
//! "#).unwrap();
//!
//! assert_eq!(config.packet.check_mode, CheckMode::Unchecked);
//! assert_eq!(config.gsmem.slots.len(), 1);
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::{Ps2Error, Result};
use crate::core::gs::PixelFormat;

/// Environment variable overriding [`PacketConfig::check_mode`]
pub const ENV_CHECK_MODE: &str = "PS2RX_CHECK_MODE";

/// Environment variable overriding [`PacketConfig::unpack_fill_policy`]
pub const ENV_FILL_POLICY: &str = "PS2RX_FILL_POLICY";

/// How strictly packet builders enforce their preconditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    /// Every protocol and alignment precondition is verified
    #[default]
    Checked,
    /// Protocol and alignment checks are skipped; capacity is still enforced
    Unchecked,
}

impl CheckMode {
    #[inline(always)]
    pub fn is_checked(self) -> bool {
        self == CheckMode::Checked
    }
}

impl FromStr for CheckMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "checked" => Ok(CheckMode::Checked),
            "unchecked" => Ok(CheckMode::Unchecked),
            other => Err(format!("unknown check mode '{}'", other)),
        }
    }
}

/// Count policy for an UNPACK closed in filling-write mode (CL < WL)
///
/// When the data ends exactly on a cycle boundary it is ambiguous whether the
/// VIF should still write the trailing WL - CL filler quadwords of the last
/// block. Neither choice has been verified against hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillPolicy {
    /// Emit the full WL-length block, filling from the row/col registers
    #[default]
    FullWriteBlock,
    /// Stop after the last data quadword of the final block
    StopAfterData,
}

impl FromStr for FillPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full-write-block" => Ok(FillPolicy::FullWriteBlock),
            "stop-after-data" => Ok(FillPolicy::StopAfterData),
            other => Err(format!("unknown fill policy '{}'", other)),
        }
    }
}

/// Packet builder settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketConfig {
    pub check_mode: CheckMode,
    pub unpack_fill_policy: FillPolicy,
    /// Capacity of packets created without an explicit size
    pub default_qwords: usize,
    /// Transfer DMA tags along with the data
    pub tte: bool,
}

impl Default for PacketConfig {
    fn default() -> Self {
        Self {
            check_mode: CheckMode::Checked,
            unpack_fill_policy: FillPolicy::FullWriteBlock,
            default_qwords: 1024,
            tte: false,
        }
    }
}

/// One slot of the initial GS memory layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotConfig {
    pub first_page: u32,
    pub page_len: u32,
    pub format: PixelFormat,
}

/// GS memory manager settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GsMemConfig {
    pub slots: Vec<SlotConfig>,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub packet: PacketConfig,
    pub gsmem: GsMemConfig,
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        log::debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Apply `PS2RX_*` environment overrides
    ///
    /// # Errors
    ///
    /// Returns [`Ps2Error::Config`] if a variable holds an unknown value.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var(ENV_CHECK_MODE).ok().as_deref(),
            std::env::var(ENV_FILL_POLICY).ok().as_deref(),
        )
    }

    fn apply_overrides(&mut self, check_mode: Option<&str>, fill_policy: Option<&str>) -> Result<()> {
        if let Some(value) = check_mode {
            self.packet.check_mode = value.parse().map_err(Ps2Error::Config)?;
            log::debug!("{} override: {:?}", ENV_CHECK_MODE, self.packet.check_mode);
        }
        if let Some(value) = fill_policy {
            self.packet.unpack_fill_policy = value.parse().map_err(Ps2Error::Config)?;
            log::debug!("{} override: {:?}", ENV_FILL_POLICY, self.packet.unpack_fill_policy);
        }
        Ok(())
    }
}
