// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Board power capping ("doppler").
//!
//! Active once the feature is enabled and the board controller has reported a non-zero
//! cable power limit. It replaces the TDP, TDC and board power throttlers with a slow
//! throttler on a 1000 sample moving average, plus two consecutive-sample trip detectors
//! that pin AICLK to fmin through the critical arbiter.

use aiclk_core::ArbMax;
use tracing::debug;

use crate::arbiter::ArbiterRegistry;
use crate::config::FeatureEnable;
use crate::throttler::{ThrottlerBank, ThrottlerId};

pub const BOARD_POWER_HISTORY_LEN: usize = 1000;

/// T2 trips on `2 * limit` for this many consecutive samples.
pub const T2_TRIP_SAMPLES: u8 = 10;
/// T3 trips on `2.5 * limit` for this many consecutive samples.
pub const T3_TRIP_SAMPLES: u8 = 2;

/// 8 bit consecutive-sample counter that saturates instead of wrapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TripCounter(u8);

impl TripCounter {
    pub fn count(self) -> u8 {
        self.0
    }

    /// Counts a sample over the threshold, or resets on one that is not.
    pub fn sample(&mut self, over: bool) {
        self.0 = if over { self.0.saturating_add(1) } else { 0 };
    }

    pub fn reached(self, samples: u8) -> bool {
        self.0 >= samples
    }
}

/// Fixed depth moving average with an O(1) running sum.
#[derive(Clone, Debug)]
pub struct MovingAverage<const N: usize> {
    history: [u16; N],
    cursor: usize,
    sum: u32,
}

impl<const N: usize> Default for MovingAverage<N> {
    fn default() -> Self {
        Self {
            history: [0; N],
            cursor: 0,
            sum: 0,
        }
    }
}

impl<const N: usize> MovingAverage<N> {
    /// Replaces the oldest sample and returns the new average.
    pub fn push(&mut self, sample: u16) -> u16 {
        self.sum = self.sum + sample as u32 - self.history[self.cursor] as u32;
        self.history[self.cursor] = sample;

        self.cursor += 1;
        if self.cursor == N {
            self.cursor = 0;
        }

        (self.sum / N as u32) as u16
    }

    pub fn average(&self) -> u16 {
        (self.sum / N as u32) as u16
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DopplerFeatures {
    pub doppler: bool,
    pub slow: bool,
    pub t2: bool,
    pub t3: bool,
}

impl From<&FeatureEnable> for DopplerFeatures {
    fn from(value: &FeatureEnable) -> Self {
        Self {
            doppler: value.doppler_en,
            slow: value.doppler_slow(),
            t2: value.doppler_t2(),
            t3: value.doppler_t3(),
        }
    }
}

/// What one doppler update decided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DopplerOutcome {
    pub t2_triggered: bool,
    pub t3_triggered: bool,
    /// New kernel no-op state, present only when it changed.
    pub kernel_nops_changed: Option<bool>,
}

impl DopplerOutcome {
    pub fn critical(&self) -> bool {
        self.t2_triggered || self.t3_triggered
    }
}

#[derive(Clone, Debug)]
pub struct Doppler {
    features: DopplerFeatures,
    power_limit: u32,
    history: MovingAverage<BOARD_POWER_HISTORY_LEN>,
    t2_count: TripCounter,
    t3_count: TripCounter,
    kernel_nops_enabled: bool,
    critical: bool,
}

impl Doppler {
    pub fn new(features: DopplerFeatures) -> Self {
        Self {
            features,
            power_limit: 0,
            history: MovingAverage::default(),
            t2_count: TripCounter::default(),
            t3_count: TripCounter::default(),
            kernel_nops_enabled: false,
            critical: false,
        }
    }

    pub fn features(&self) -> DopplerFeatures {
        self.features
    }

    pub fn is_active(&self) -> bool {
        self.features.doppler && self.power_limit > 0
    }

    pub fn power_limit(&self) -> u32 {
        self.power_limit
    }

    /// `0` means the board controller has no limit for us (e.g. a cable fault).
    pub fn set_power_limit(&mut self, limit: u32) {
        self.power_limit = limit;
    }

    pub fn kernel_nops_enabled(&self) -> bool {
        self.kernel_nops_enabled
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn t2_count(&self) -> u8 {
        self.t2_count.count()
    }

    pub fn t3_count(&self) -> u8 {
        self.t3_count.count()
    }

    pub fn average_power(&self) -> u16 {
        self.history.average()
    }

    /// Runs one doppler step on an instantaneous input power sample.
    ///
    /// `targ_freq` is the target resolved on the previous tick.
    pub fn update(
        &mut self,
        current_power: u16,
        targ_freq: u32,
        throttlers: &mut ThrottlerBank,
        arbiters: &mut ArbiterRegistry,
    ) -> DopplerOutcome {
        let average_power = self.history.push(current_power);
        throttlers.update(ThrottlerId::DopplerSlow, average_power as f32);

        let power = current_power as u32;

        self.t2_count.sample(power > self.power_limit * 2);
        let t2_triggered = self.t2_count.reached(T2_TRIP_SAMPLES) && self.features.t2;

        self.t3_count.sample(power > self.power_limit * 5 / 2);
        let t3_triggered = self.t3_count.reached(T3_TRIP_SAMPLES) && self.features.t3;

        // fmin alone isn't always enough to get under the board power limit
        let start_nops = targ_freq == arbiters.fmin() && power > self.power_limit;
        let stop_nops = targ_freq == arbiters.fmax() && power < self.power_limit;

        let critical = t2_triggered || t3_triggered;

        let kernel_nops_enabled =
            ((self.kernel_nops_enabled || start_nops) && !stop_nops) || critical;

        let mut kernel_nops_changed = None;
        if kernel_nops_enabled != self.kernel_nops_enabled {
            debug!("kernel nops {}", if kernel_nops_enabled { "on" } else { "off" });
            self.kernel_nops_enabled = kernel_nops_enabled;
            kernel_nops_changed = Some(kernel_nops_enabled);
        }

        if critical != self.critical {
            debug!(
                t2 = self.t2_count.count(),
                t3 = self.t3_count.count(),
                "critical power throttling {}",
                if critical { "entered" } else { "cleared" }
            );
            self.critical = critical;
        }

        if critical {
            arbiters.set_max(ArbMax::DopplerCritical, arbiters.fmin() as f32);
        }
        arbiters.enable_max(ArbMax::DopplerCritical, critical);

        DopplerOutcome {
            t2_triggered,
            t3_triggered,
            kernel_nops_changed,
        }
    }
}
