// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::time::Duration;

use aiclk_core::VoltageRequester;
use aiclk_if::error::PlatformError;
use aiclk_if::{
    ChipLimits, ClockDomain, ClockDriver, TelemetrySnapshot, TelemetrySource, TensixArray,
    VfCurve, VoltageRegulator,
};
use tracing::trace;

pub mod error;
pub mod vf_curve;

pub use vf_curve::QuadraticVfCurve;

/// Everything the simulated board was asked to do, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum HwEvent {
    SetAiclk(u32),
    SetVoltage(f32),
    Broadcast { addr: u64, value: u32 },
    TensixEnable(bool),
    MriscPhyPower(bool),
}

/// Derives power telemetry from the simulated clock and voltage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadModel {
    /// W drawn at the board input regardless of AICLK
    pub idle_power: f32,
    /// W per GHz per V² of vcore
    pub dynamic_coeff: f32,
}

impl LoadModel {
    pub fn vcore_power(&self, aiclk: u32, millivolts: f32) -> f32 {
        let volts = millivolts / 1000.0;
        self.dynamic_coeff * (aiclk as f32 / 1000.0) * volts * volts
    }
}

/// An in-memory board that records hardware writes and can be told to fail them.
pub struct SimBoard {
    aiclk: u32,
    voltage: f32,
    vdd_max: f32,
    requests: [Option<f32>; VoltageRequester::COUNT],
    curve: QuadraticVfCurve,

    pub telemetry: TelemetrySnapshot,
    pub load: Option<LoadModel>,

    tensix_enabled: bool,
    mrisc_awake: bool,
    tile_mem: HashMap<u64, u32>,

    pub clock_busy: bool,
    pub voltage_busy: bool,

    events: Vec<HwEvent>,
}

impl SimBoard {
    pub fn new(boot_aiclk: u32, limits: &ChipLimits) -> Self {
        let curve = QuadraticVfCurve::from_limits(limits);

        Self {
            aiclk: boot_aiclk,
            voltage: curve.voltage_for(boot_aiclk as f32),
            vdd_max: limits.vdd_max,
            requests: [None; VoltageRequester::COUNT],
            curve,
            telemetry: TelemetrySnapshot::default(),
            load: None,
            tensix_enabled: true,
            mrisc_awake: true,
            tile_mem: HashMap::new(),
            clock_busy: false,
            voltage_busy: false,
            events: Vec::new(),
        }
    }

    pub fn with_load(mut self, load: LoadModel) -> Self {
        self.load = Some(load);
        self
    }

    pub fn aiclk(&self) -> u32 {
        self.aiclk
    }

    /// mV currently applied to vcore
    pub fn voltage(&self) -> f32 {
        self.voltage
    }

    pub fn voltage_request(&self, requester: VoltageRequester) -> Option<f32> {
        self.requests[requester.index()]
    }

    pub fn curve(&self) -> &QuadraticVfCurve {
        &self.curve
    }

    pub fn tensix_enabled(&self) -> bool {
        self.tensix_enabled
    }

    pub fn mrisc_awake(&self) -> bool {
        self.mrisc_awake
    }

    /// Last value broadcast to `addr`, as seen by every tile.
    pub fn read_tile(&self, addr: u64) -> Option<u32> {
        self.tile_mem.get(&addr).copied()
    }

    pub fn events(&self) -> &[HwEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<HwEvent> {
        std::mem::take(&mut self.events)
    }
}

impl ClockDriver for SimBoard {
    fn get_frequency(&self, _domain: ClockDomain) -> Result<u32, PlatformError> {
        Ok(self.aiclk)
    }

    fn set_frequency(&mut self, domain: ClockDomain, mhz: u32) -> Result<(), PlatformError> {
        if self.clock_busy {
            return Err(PlatformError::ClockBusy {
                domain: domain.name(),
            });
        }

        trace!("{} {} -> {mhz} MHz", domain.name(), self.aiclk);
        self.aiclk = mhz;
        self.events.push(HwEvent::SetAiclk(mhz));
        Ok(())
    }
}

impl VoltageRegulator for SimBoard {
    fn request_voltage(&mut self, requester: VoltageRequester, millivolts: f32) {
        self.requests[requester.index()] = Some(millivolts);
    }

    /// Highest outstanding request, never above vdd_max.
    fn resolve_target_voltage(&mut self) -> f32 {
        self.requests
            .iter()
            .flatten()
            .copied()
            .fold(0.0, f32::max)
            .min(self.vdd_max)
    }

    fn apply_voltage(&mut self, millivolts: f32) -> Result<(), PlatformError> {
        if self.voltage_busy {
            return Err(PlatformError::VoltageBusy { millivolts });
        }

        if millivolts != self.voltage {
            trace!("vcore {} -> {millivolts} mV", self.voltage);
            self.voltage = millivolts;
            self.events.push(HwEvent::SetVoltage(millivolts));
        }
        Ok(())
    }

    fn vdd_max(&self) -> f32 {
        self.vdd_max
    }
}

impl VfCurve for SimBoard {
    fn voltage_for(&self, mhz: f32) -> f32 {
        self.curve.voltage_for(mhz)
    }
}

impl TelemetrySource for SimBoard {
    fn read_telemetry(&mut self, _max_staleness: Duration) -> TelemetrySnapshot {
        let mut telemetry = self.telemetry;

        if let Some(load) = self.load {
            let vcore_power = load.vcore_power(self.aiclk, self.voltage);

            telemetry.vcore_voltage = self.voltage;
            telemetry.vcore_power = vcore_power;
            telemetry.vcore_current = vcore_power / (self.voltage / 1000.0);
            telemetry.input_power = (load.idle_power + vcore_power).round() as u16;
        }

        telemetry
    }
}

impl TensixArray for SimBoard {
    fn broadcast_write32(&mut self, addr: u64, value: u32) -> Result<(), PlatformError> {
        if !self.tensix_enabled {
            return Err(PlatformError::Broadcast { addr });
        }

        self.tile_mem.insert(addr, value);
        self.events.push(HwEvent::Broadcast { addr, value });
        Ok(())
    }

    fn set_tensix_enable(&mut self, enable: bool) -> Result<(), PlatformError> {
        self.tensix_enabled = enable;
        if !enable {
            // tile memory does not survive a power cycle
            self.tile_mem.clear();
        }
        self.events.push(HwEvent::TensixEnable(enable));
        Ok(())
    }

    fn set_mrisc_phy_power(&mut self, wakeup: bool) -> Result<(), PlatformError> {
        self.mrisc_awake = wakeup;
        self.events.push(HwEvent::MriscPhyPower(wakeup));
        Ok(())
    }
}
