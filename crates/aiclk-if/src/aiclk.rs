// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use aiclk_core::{ArbMax, ArbMin};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use crate::arbiter::ArbiterRegistry;
use crate::error::CommandError;

/// Bounds checks for the configured fmax and fmin (MHz)
pub const AICLK_FMAX_MAX: f32 = 1400.0;
pub const AICLK_FMAX_MIN: f32 = 800.0;
pub const AICLK_FMIN_MAX: f32 = 800.0;
pub const AICLK_FMIN_MIN: f32 = 200.0;

/// Why the last resolved target has the value it has.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "arbiter", rename_all = "snake_case")]
pub enum LimitReason {
    ArbMin(ArbMin),
    ArbMax(ArbMax),
    Fmin,
    Sweep,
    Forced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepRange {
    pub low: u32,
    pub high: u32,
}

/// AICLK power/performance management state.
#[derive(Debug)]
pub struct AiclkPpm {
    pub(crate) curr_freq: u32,
    targ_freq: u32,
    boot_freq: u32,
    fmin: u32,
    fmax: u32,
    forced_freq: Option<u32>,
    sweep: Option<SweepRange>,
    reason: LimitReason,
    pub arbiters: ArbiterRegistry,
    rng: StdRng,
}

impl AiclkPpm {
    /// `asic_fmin` and `asic_fmax` come from the board configuration and are clamped into the
    /// safety bounds above; they never change afterwards.
    pub fn new(boot_freq: u32, asic_fmin: f32, asic_fmax: f32, sweep_seed: u64) -> Self {
        let fmax = asic_fmax.clamp(AICLK_FMAX_MIN, AICLK_FMAX_MAX) as u32;
        let fmin = asic_fmin.clamp(AICLK_FMIN_MIN, AICLK_FMIN_MAX) as u32;

        Self {
            curr_freq: boot_freq,
            targ_freq: boot_freq,
            boot_freq,
            fmin,
            fmax,
            forced_freq: None,
            sweep: None,
            reason: LimitReason::Fmin,
            arbiters: ArbiterRegistry::new(fmin, fmax),
            rng: StdRng::seed_from_u64(sweep_seed),
        }
    }

    pub fn fmin(&self) -> u32 {
        self.fmin
    }

    pub fn fmax(&self) -> u32 {
        self.fmax
    }

    pub fn curr_freq(&self) -> u32 {
        self.curr_freq
    }

    pub fn targ_freq(&self) -> u32 {
        self.targ_freq
    }

    pub fn boot_freq(&self) -> u32 {
        self.boot_freq
    }

    pub fn forced_freq(&self) -> Option<u32> {
        self.forced_freq
    }

    pub fn sweep(&self) -> Option<SweepRange> {
        self.sweep
    }

    pub fn limit_reason(&self) -> LimitReason {
        self.reason
    }

    /// Resolves the arbiters, sweep and force override into a new target frequency.
    pub fn calculate_targ(&mut self) -> u32 {
        let (min_freq, min_arb) = self.arbiters.effective_min();
        let (max_freq, max_arb) = self.arbiters.effective_max();

        let mut targ = min_freq;
        let mut reason = LimitReason::ArbMin(min_arb);

        if targ > max_freq {
            targ = max_freq;
            reason = LimitReason::ArbMax(max_arb);
        }

        let mut targ = targ as u32;
        if targ < self.fmin {
            targ = self.fmin;
            reason = LimitReason::Fmin;
        }

        if let Some(SweepRange { low, high }) = self.sweep {
            targ = self.rng.gen_range(low..=high);
            reason = LimitReason::Sweep;
        }

        // forcing wins over every limit
        if let Some(forced) = self.forced_freq {
            targ = forced;
            reason = LimitReason::Forced;
        }

        self.targ_freq = targ;
        self.reason = reason;

        targ
    }

    /// `0` clears the override; anything else must lie within `[fmin, fmax]`.
    pub fn set_forced_freq(&mut self, freq: u32) -> Result<(), CommandError> {
        if freq == 0 {
            self.forced_freq = None;
            return Ok(());
        }

        if freq < self.fmin || freq > self.fmax {
            return Err(CommandError::ForcedFreqOutOfRange {
                freq,
                fmin: self.fmin,
                fmax: self.fmax,
            });
        }

        self.forced_freq = Some(freq);
        Ok(())
    }

    pub fn start_sweep(&mut self, low: u32, high: u32) -> Result<(), CommandError> {
        if low == 0 || high == 0 {
            return Err(CommandError::InvalidSweepRange { low, high });
        }

        let low = low.clamp(self.fmin, self.fmax);
        // crossed bounds collapse onto low
        let high = high.clamp(self.fmin, self.fmax).max(low);

        self.sweep = Some(SweepRange { low, high });
        Ok(())
    }

    pub fn stop_sweep(&mut self) {
        self.sweep = None;
    }

    /// Raises the busy floor to fmax, or drops it back to fmin.
    pub fn set_busy(&mut self, busy: bool) {
        let freq = if busy { self.fmax } else { self.fmin };
        self.arbiters.set_min(ArbMin::Busy, freq as f32);
    }

    pub fn is_busy(&self) -> bool {
        self.arbiters.min(ArbMin::Busy).value >= self.fmax as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ppm() -> AiclkPpm {
        let mut ppm = AiclkPpm::new(800, 200.0, 1400.0, 7);
        for arb in ArbMax::ALL {
            ppm.arbiters.set_max(arb, 1400.0);
            ppm.arbiters.enable_max(arb, false);
        }
        for arb in ArbMin::ALL {
            ppm.arbiters.set_min(arb, 200.0);
            ppm.arbiters.enable_min(arb, false);
        }
        ppm
    }

    #[test]
    fn config_bounds_are_clamped() {
        let ppm = AiclkPpm::new(800, 10.0, 5000.0, 0);
        assert_eq!((ppm.fmin(), ppm.fmax()), (200, 1400));

        let ppm = AiclkPpm::new(800, 1000.0, 500.0, 0);
        assert_eq!((ppm.fmin(), ppm.fmax()), (800, 800));
    }

    #[test]
    fn no_arb_enabled() {
        let mut ppm = ppm();
        assert_eq!(ppm.calculate_targ(), 200);
    }

    #[test]
    fn min_arb_above_max_arb() {
        let mut ppm = ppm();

        ppm.arbiters.set_min(ArbMin::Fmin, 1300.0);
        ppm.arbiters.enable_min(ArbMin::Fmin, true);
        ppm.arbiters.set_max(ArbMax::Fmax, 300.0);
        ppm.arbiters.enable_max(ArbMax::Fmax, true);

        assert_eq!(ppm.calculate_targ(), 300);
        assert_eq!(ppm.limit_reason(), LimitReason::ArbMax(ArbMax::Fmax));
    }

    #[test]
    fn busy_floor_limited_by_max() {
        let mut ppm = ppm();

        ppm.set_busy(true);
        ppm.arbiters.enable_min(ArbMin::Busy, true);
        ppm.arbiters.set_max(ArbMax::Fmax, 800.0);
        ppm.arbiters.enable_max(ArbMax::Fmax, true);

        assert_eq!(ppm.calculate_targ(), 800);

        ppm.arbiters.enable_max(ArbMax::Fmax, false);
        assert_eq!(ppm.calculate_targ(), 1400);
        assert_eq!(ppm.limit_reason(), LimitReason::ArbMin(ArbMin::Busy));
    }

    #[test]
    fn forced_overrides_max_arb() {
        let mut ppm = ppm();

        ppm.arbiters.set_max(ArbMax::Thm, 300.0);
        ppm.arbiters.enable_max(ArbMax::Thm, true);
        ppm.set_forced_freq(1300).unwrap();

        assert_eq!(ppm.calculate_targ(), 1300);
        assert_eq!(ppm.limit_reason(), LimitReason::Forced);

        ppm.set_forced_freq(0).unwrap();
        assert_eq!(ppm.calculate_targ(), 200);
    }

    #[test]
    fn forced_out_of_range_is_rejected() {
        let mut ppm = ppm();
        ppm.set_forced_freq(1000).unwrap();

        let err = ppm.set_forced_freq(1500).unwrap_err();
        assert_eq!(
            err,
            CommandError::ForcedFreqOutOfRange {
                freq: 1500,
                fmin: 200,
                fmax: 1400
            }
        );
        assert_eq!(ppm.forced_freq(), Some(1000), "rejected force must not clear state");

        assert!(ppm.set_forced_freq(199).is_err());
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut ppm = ppm();
        ppm.arbiters.set_min(ArbMin::Busy, 900.0);
        ppm.arbiters.enable_min(ArbMin::Busy, true);

        let first = (ppm.calculate_targ(), ppm.limit_reason());
        let second = (ppm.calculate_targ(), ppm.limit_reason());
        assert_eq!(first, second);
    }

    #[test]
    fn sweep_stays_in_range() {
        let mut ppm = ppm();

        assert_eq!(
            ppm.start_sweep(0, 1000),
            Err(CommandError::InvalidSweepRange { low: 0, high: 1000 })
        );
        assert_eq!(ppm.sweep(), None);

        ppm.start_sweep(100, 9000).unwrap();
        assert_eq!(ppm.sweep(), Some(SweepRange { low: 200, high: 1400 }));

        ppm.start_sweep(500, 600).unwrap();
        for _ in 0..200 {
            let targ = ppm.calculate_targ();
            assert!((500..=600).contains(&targ), "sweep target {targ} out of range");
            assert_eq!(ppm.limit_reason(), LimitReason::Sweep);
        }

        ppm.stop_sweep();
        assert_eq!(ppm.calculate_targ(), 200);
    }

    #[test]
    fn sweep_above_fmax_resolves_to_fmax() {
        let mut ppm = ppm();

        ppm.start_sweep(5000, 6000).unwrap();
        assert_eq!(ppm.sweep(), Some(SweepRange { low: 1400, high: 1400 }));
        assert_eq!(ppm.calculate_targ(), 1400);

        // crossed bounds collapse onto low
        ppm.start_sweep(1000, 300).unwrap();
        assert_eq!(ppm.sweep(), Some(SweepRange { low: 1000, high: 1000 }));
        assert_eq!(ppm.calculate_targ(), 1000);
    }
}
