// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use aiclk_if::{ChipLimits, VfCurve};

/// Bounds checks for the frequency and voltage margins
pub const FREQ_MARGIN_MAX: f32 = 300.0;
pub const FREQ_MARGIN_MIN: f32 = -300.0;
pub const VOLTAGE_MARGIN_MAX: f32 = 150.0;
pub const VOLTAGE_MARGIN_MIN: f32 = -150.0;

/// Characterised AICLK voltage/frequency fit.
///
/// The fit is rising over the AICLK operating range (above ~700 MHz), which is where the
/// governor searches it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QuadraticVfCurve {
    freq_margin: f32,
    voltage_margin: f32,
}

impl QuadraticVfCurve {
    pub fn new(freq_margin: f32, voltage_margin: f32) -> Self {
        Self {
            freq_margin: freq_margin.clamp(FREQ_MARGIN_MIN, FREQ_MARGIN_MAX),
            voltage_margin: voltage_margin.clamp(VOLTAGE_MARGIN_MIN, VOLTAGE_MARGIN_MAX),
        }
    }

    pub fn from_limits(limits: &ChipLimits) -> Self {
        Self::new(limits.frequency_margin, limits.voltage_margin)
    }

    pub fn freq_margin(&self) -> f32 {
        self.freq_margin
    }

    pub fn voltage_margin(&self) -> f32 {
        self.voltage_margin
    }
}

impl VfCurve for QuadraticVfCurve {
    fn voltage_for(&self, mhz: f32) -> f32 {
        let f = mhz + self.freq_margin;
        let voltage = 0.00031395 * f * f - 0.43953 * f + 828.83;

        voltage + self.voltage_margin
    }
}
