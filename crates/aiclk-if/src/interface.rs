// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Everything the governor needs from the rest of the firmware.
//!
//! The governor never touches hardware directly. A backend implements these traits and
//! is handed to [`crate::Dvfs`], which then owns it for the lifetime of the control loop.

use std::time::Duration;

use aiclk_core::VoltageRequester;

use crate::error::PlatformError;

/// Clock domains the governor is allowed to reprogram.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockDomain {
    Aiclk,
}

impl ClockDomain {
    pub fn name(self) -> &'static str {
        match self {
            ClockDomain::Aiclk => "aiclk",
        }
    }
}

/// A snapshot of the sensor values the throttlers consume.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TelemetrySnapshot {
    /// mV
    pub vcore_voltage: f32,
    /// A
    pub vcore_current: f32,
    /// W
    pub vcore_power: f32,
    /// °C
    pub asic_temperature: f32,
    /// °C, hottest memory channel
    pub gddr_temperature: f32,
    /// W, measured at the board input
    pub input_power: u16,
}

pub trait ClockDriver {
    fn get_frequency(&self, domain: ClockDomain) -> Result<u32, PlatformError>;
    fn set_frequency(&mut self, domain: ClockDomain, mhz: u32) -> Result<(), PlatformError>;
}

/// Voltage arbitration is owned by the voltage subsystem; the governor only places its request.
pub trait VoltageRegulator {
    fn request_voltage(&mut self, requester: VoltageRequester, millivolts: f32);
    fn resolve_target_voltage(&mut self) -> f32;
    fn apply_voltage(&mut self, millivolts: f32) -> Result<(), PlatformError>;
    /// Highest voltage the regulator may ever be asked for.
    fn vdd_max(&self) -> f32;
}

/// Monotonically non-decreasing frequency to voltage mapping.
pub trait VfCurve {
    fn voltage_for(&self, mhz: f32) -> f32;
}

pub trait TelemetrySource {
    /// Returns sensor data no older than `max_staleness`.
    fn read_telemetry(&mut self, max_staleness: Duration) -> TelemetrySnapshot;
}

/// Access to every tile of the compute array and to its power domains.
pub trait TensixArray {
    fn broadcast_write32(&mut self, addr: u64, value: u32) -> Result<(), PlatformError>;
    fn set_tensix_enable(&mut self, enable: bool) -> Result<(), PlatformError>;
    fn set_mrisc_phy_power(&mut self, wakeup: bool) -> Result<(), PlatformError>;
}

/// A full backend for the governor.
pub trait Platform: ClockDriver + VoltageRegulator + VfCurve + TelemetrySource + TensixArray {}

impl<T> Platform for T where T: ClockDriver + VoltageRegulator + VfCurve + TelemetrySource + TensixArray
{}

/// Largest frequency in `[fmin, fmax]` whose curve voltage does not exceed `millivolts`.
///
/// Assumes the curve is monotonic. If even `fmin` needs more than `millivolts` the result is
/// `fmin - 1`; callers store it through the arbiter registry which clamps it back to `fmin`.
pub fn max_freq_for_voltage(curve: &dyn VfCurve, fmin: u32, fmax: u32, millivolts: f32) -> u32 {
    // starting at fmax + 1 lets fmax itself be the answer
    let mut high = fmax + 1;
    let mut low = fmin;

    while low < high {
        let mid = (low + high) / 2;

        if curve.voltage_for(mid as f32) > millivolts {
            high = mid;
        } else {
            low = mid + 1;
        }
    }

    low.saturating_sub(1)
}
