// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-limit feedback controllers that steer the AICLK ceilings.
//!
//! Each throttler filters one measured quantity, computes a PD output from how far it is
//! from its limit and nudges its max arbiter by that output. The arbiter value carries over
//! from tick to tick, so the nudges integrate; the gains below are tuned for
//! [`crate::dvfs::DVFS_INTERVAL`].

use aiclk_core::ArbMax;
use tracing::info;

use crate::arbiter::ArbiterRegistry;

/// MHz of ceiling movement per unit of throttler output, per DVFS tick.
pub const THROTTLER_AICLK_SCALE_FACTOR: f32 = 500.0;

/// Board power limit assumed until the board controller reports one. W
pub const DEFAULT_BOARD_POWER_LIMIT: f32 = 150.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottlerId {
    Tdp,
    FastTdc,
    Tdc,
    Thm,
    BoardPower,
    GddrThm,
    DopplerSlow,
}

impl ThrottlerId {
    pub const COUNT: usize = 7;

    pub const ALL: [ThrottlerId; ThrottlerId::COUNT] = [
        ThrottlerId::Tdp,
        ThrottlerId::FastTdc,
        ThrottlerId::Tdc,
        ThrottlerId::Thm,
        ThrottlerId::BoardPower,
        ThrottlerId::GddrThm,
        ThrottlerId::DopplerSlow,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn arb_max(self) -> ArbMax {
        match self {
            ThrottlerId::Tdp => ArbMax::Tdp,
            ThrottlerId::FastTdc => ArbMax::FastTdc,
            ThrottlerId::Tdc => ArbMax::Tdc,
            ThrottlerId::Thm => ArbMax::Thm,
            ThrottlerId::BoardPower => ArbMax::BoardPower,
            ThrottlerId::GddrThm => ArbMax::GddrThm,
            ThrottlerId::DopplerSlow => ArbMax::DopplerSlow,
        }
    }

    /// Limits read from the board configuration are forced into this range.
    pub fn limit_range(self) -> (f32, f32) {
        match self {
            ThrottlerId::Tdp => (50.0, 500.0),
            ThrottlerId::FastTdc => (50.0, 500.0),
            ThrottlerId::Tdc => (50.0, 400.0),
            ThrottlerId::Thm => (50.0, 100.0),
            ThrottlerId::BoardPower => (50.0, 600.0),
            ThrottlerId::GddrThm => (50.0, 100.0),
            ThrottlerId::DopplerSlow => (50.0, 1200.0),
        }
    }

    pub fn params(self) -> ThrottlerParams {
        let (alpha_filter, p_gain, d_gain) = match self {
            ThrottlerId::Tdp => (1.0, 0.2, 0.0),
            ThrottlerId::FastTdc => (1.0, 0.5, 0.0),
            ThrottlerId::Tdc => (0.1, 0.2, 0.0),
            ThrottlerId::Thm => (1.0, 0.2, 0.0),
            ThrottlerId::BoardPower => (1.0, 0.1, 0.1),
            ThrottlerId::GddrThm => (1.0, 0.2, 0.0),
            ThrottlerId::DopplerSlow => (1.0, 0.0025, 0.3),
        };

        ThrottlerParams {
            alpha_filter,
            p_gain,
            d_gain,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThrottlerParams {
    pub alpha_filter: f32,
    pub p_gain: f32,
    pub d_gain: f32,
}

#[derive(Clone, Debug)]
pub struct Throttler {
    arb_max: ArbMax,
    params: ThrottlerParams,
    enabled: bool,
    pub limit: f32,
    pub value: f32,
    pub error: f32,
    pub prev_error: f32,
    pub output: f32,
}

impl Throttler {
    fn new(id: ThrottlerId) -> Self {
        Self {
            arb_max: id.arb_max(),
            params: id.params(),
            enabled: true,
            limit: id.limit_range().1,
            value: 0.0,
            error: 0.0,
            prev_error: 0.0,
            output: 0.0,
        }
    }

    pub fn arb_max(&self) -> ArbMax {
        self.arb_max
    }

    pub fn params(&self) -> ThrottlerParams {
        self.params
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn update(&mut self, measured: f32) {
        let ThrottlerParams {
            alpha_filter,
            p_gain,
            d_gain,
        } = self.params;

        self.value = alpha_filter * measured + (1.0 - alpha_filter) * self.value;
        self.error = (self.limit - self.value) / self.limit;
        self.output = p_gain * self.error + d_gain * (self.error - self.prev_error);
        self.prev_error = self.error;
    }

    fn update_arb(&self, arbiters: &mut ArbiterRegistry) {
        let arb_val = arbiters.max(self.arb_max).value;
        arbiters.set_max(
            self.arb_max,
            arb_val + self.output * THROTTLER_AICLK_SCALE_FACTOR,
        );
    }
}

/// One throttler per limit, each bound to its own max arbiter.
#[derive(Clone, Debug)]
pub struct ThrottlerBank {
    throttlers: [Throttler; ThrottlerId::COUNT],
}

impl Default for ThrottlerBank {
    fn default() -> Self {
        Self::new()
    }
}

impl ThrottlerBank {
    pub fn new() -> Self {
        Self {
            throttlers: ThrottlerId::ALL.map(Throttler::new),
        }
    }

    pub fn get(&self, id: ThrottlerId) -> &Throttler {
        &self.throttlers[id.index()]
    }

    pub fn set_limit(&mut self, id: ThrottlerId, limit: f32) {
        let (min, max) = id.limit_range();
        let clamped = limit.clamp(min, max);

        info!("Throttler {id:?} limit set to {}", clamped as u32);
        self.throttlers[id.index()].limit = clamped;
    }

    /// Disabled throttlers are skipped entirely; their arbiter keeps its last value.
    pub fn enable(&mut self, id: ThrottlerId, enable: bool) {
        self.throttlers[id.index()].enabled = enable;
    }

    pub fn is_enabled(&self, id: ThrottlerId) -> bool {
        self.throttlers[id.index()].enabled
    }

    /// Feeds one sample through the filter and PD terms of an enabled throttler.
    pub fn update(&mut self, id: ThrottlerId, measured: f32) {
        let throttler = &mut self.throttlers[id.index()];
        if throttler.enabled {
            throttler.update(measured);
        }
    }

    /// Nudges every enabled throttler's arbiter by its latest output.
    pub fn update_arbs(&self, arbiters: &mut ArbiterRegistry) {
        for throttler in self.throttlers.iter().filter(|t| t.enabled) {
            throttler.update_arb(arbiters);
        }
    }
}
