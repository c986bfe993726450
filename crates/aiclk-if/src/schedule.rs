// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Periodic DVFS timer expressed in scheduler ticks.
///
/// The owner advances time by calling [`DvfsSchedule::poll`]; the schedule only keeps the
/// next deadline so it can be nudged by [`DvfsSchedule::adjust`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DvfsSchedule {
    interval: u64,
    next: u64,
}

impl DvfsSchedule {
    pub fn new(interval: Duration, ticks_per_sec: u64, now: u64) -> Self {
        let interval =
            ((interval.as_nanos() * ticks_per_sec as u128) / 1_000_000_000).max(1) as u64;

        Self {
            interval,
            next: now + interval,
        }
    }

    pub fn interval_ticks(&self) -> u64 {
        self.interval
    }

    pub fn next_deadline(&self) -> u64 {
        self.next
    }

    pub fn remaining(&self, now: u64) -> u64 {
        self.next.saturating_sub(now)
    }

    /// Returns true once per expired period. Missed periods are not replayed.
    pub fn poll(&mut self, now: u64) -> bool {
        if now < self.next {
            return false;
        }

        self.next += self.interval;
        if self.next <= now {
            self.next = now + self.interval;
        }
        true
    }

    /// Pulls the next run towards `now` after a board power limit update.
    ///
    /// If the run is still more than 10% of a period away it is brought 1% of a period
    /// closer. Repeated updates converge the phase without disturbing the PD loops, which
    /// assume a fixed period.
    pub fn adjust(&mut self, now: u64) -> bool {
        let threshold = self.interval * 10 / 100;
        let step = self.interval / 100;

        let remaining = self.remaining(now);
        if remaining > threshold && step > 0 {
            self.next = now + remaining - step;
            true
        } else {
            false
        }
    }
}
