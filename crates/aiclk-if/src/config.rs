// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Board configuration consumed by the governor.
//!
//! This is the subset of the firmware table the DVFS code reads at init. Values are taken
//! as-is here; every consumer clamps what it reads into its own safe range, so a malformed
//! table can never push the governor outside its bounds.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChipLimits {
    /// MHz
    pub asic_fmax: f32,
    /// MHz
    pub asic_fmin: f32,
    /// W
    pub tdp_limit: f32,
    /// A
    pub tdc_fast_limit: f32,
    /// A
    pub tdc_limit: f32,
    /// °C
    pub thm_limit: f32,
    /// °C
    pub gddr_thm_limit: f32,
    /// W, upper bound on any cable power limit reported by the board controller.
    pub board_power_limit: u16,
    /// mV
    pub vdd_max: f32,
    /// MHz
    pub frequency_margin: f32,
    /// mV
    pub voltage_margin: f32,
}

impl Default for ChipLimits {
    fn default() -> Self {
        Self {
            asic_fmax: 1350.0,
            asic_fmin: 800.0,
            tdp_limit: 300.0,
            tdc_fast_limit: 350.0,
            tdc_limit: 300.0,
            thm_limit: 90.0,
            gddr_thm_limit: 85.0,
            board_power_limit: 600,
            vdd_max: 950.0,
            frequency_margin: 0.0,
            voltage_margin: 0.0,
        }
    }
}

/// Doppler sub-features follow `doppler_en` unless set explicitly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureEnable {
    pub doppler_en: bool,
    pub doppler_slow_en: Option<bool>,
    pub doppler_t2_en: Option<bool>,
    pub doppler_t3_en: Option<bool>,
}

impl FeatureEnable {
    pub fn doppler_slow(&self) -> bool {
        self.doppler_slow_en.unwrap_or(self.doppler_en)
    }

    pub fn doppler_t2(&self) -> bool {
        self.doppler_t2_en.unwrap_or(self.doppler_en)
    }

    pub fn doppler_t3(&self) -> bool {
        self.doppler_t3_en.unwrap_or(self.doppler_en)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DvfsOptions {
    /// Seed for the AICLK sweep random source.
    pub sweep_seed: u64,
    /// Resolution of the scheduler clock used to phase the DVFS timer.
    pub ticks_per_sec: u64,
}

impl Default for DvfsOptions {
    fn default() -> Self {
        Self {
            sweep_seed: 0x5eed,
            ticks_per_sec: 1_000_000,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub chip_limits: ChipLimits,
    pub feature_enable: FeatureEnable,
    pub dvfs: DvfsOptions,
}

impl BoardConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            Some("json") => Self::from_json(&text),
            _ => Err(ConfigError::UnknownFormat(display)),
        }
    }
}
