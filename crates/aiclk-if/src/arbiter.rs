// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use aiclk_core::{ArbMax, ArbMin};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arbiter {
    pub enabled: bool,
    /// MHz, always within `[fmin, fmax]`
    pub value: f32,
}

/// Named floor and ceiling constraints on AICLK.
///
/// Values are clamped into `[fmin, fmax]` when written so resolution never has to re-clamp.
#[derive(Clone, Debug)]
pub struct ArbiterRegistry {
    fmin: u32,
    fmax: u32,
    max: [Arbiter; ArbMax::COUNT],
    min: [Arbiter; ArbMin::COUNT],
}

impl ArbiterRegistry {
    /// All ceilings start enabled at `fmax` and all floors enabled at `fmin`.
    pub fn new(fmin: u32, fmax: u32) -> Self {
        Self {
            fmin,
            fmax,
            max: [Arbiter {
                enabled: true,
                value: fmax as f32,
            }; ArbMax::COUNT],
            min: [Arbiter {
                enabled: true,
                value: fmin as f32,
            }; ArbMin::COUNT],
        }
    }

    pub fn fmin(&self) -> u32 {
        self.fmin
    }

    pub fn fmax(&self) -> u32 {
        self.fmax
    }

    #[inline]
    fn clamp(&self, freq: f32) -> f32 {
        freq.clamp(self.fmin as f32, self.fmax as f32)
    }

    pub fn set_max(&mut self, arb: ArbMax, freq: f32) {
        self.max[arb.index()].value = self.clamp(freq);
    }

    pub fn set_min(&mut self, arb: ArbMin, freq: f32) {
        self.min[arb.index()].value = self.clamp(freq);
    }

    pub fn enable_max(&mut self, arb: ArbMax, enable: bool) {
        self.max[arb.index()].enabled = enable;
    }

    pub fn enable_min(&mut self, arb: ArbMin, enable: bool) {
        self.min[arb.index()].enabled = enable;
    }

    pub fn max(&self, arb: ArbMax) -> Arbiter {
        self.max[arb.index()]
    }

    pub fn min(&self, arb: ArbMin) -> Arbiter {
        self.min[arb.index()]
    }

    /// Highest enabled floor, seeded at `fmin`.
    ///
    /// On a tie the arbiter scanned last wins the attribution. If no floor is enabled the
    /// result is `(fmin, ArbMin::Fmin)`.
    pub fn effective_min(&self) -> (f32, ArbMin) {
        let mut freq = self.fmin as f32;
        let mut winner = ArbMin::Fmin;

        for arb in ArbMin::ALL {
            let arbiter = self.min[arb.index()];
            if arbiter.enabled && arbiter.value >= freq {
                freq = arbiter.value;
                winner = arb;
            }
        }

        (freq, winner)
    }

    /// Lowest enabled ceiling, seeded at `fmax`. Ties go to the arbiter scanned last.
    pub fn effective_max(&self) -> (f32, ArbMax) {
        let mut freq = self.fmax as f32;
        let mut winner = ArbMax::Fmax;

        for arb in ArbMax::ALL {
            let arbiter = self.max[arb.index()];
            if arbiter.enabled && arbiter.value <= freq {
                freq = arbiter.value;
                winner = arb;
            }
        }

        (freq, winner)
    }
}
