// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

pub use aiclk_core;
pub use aiclk_if;
pub use aiclk_ref;

use aiclk_if::error::{CommandError, PlatformError};
use aiclk_if::{BoardConfig, Dvfs, DvfsTelemetry, Request, Response, TickReport};
use aiclk_ref::SimBoard;

/// Drives a [`Dvfs`] over a [`SimBoard`] on a simulated scheduler clock.
pub struct Simulation {
    dvfs: Dvfs<SimBoard>,
    now: u64,
}

impl Simulation {
    /// Boots the governor on `board` and enables DVFS.
    pub fn new(board: SimBoard, config: &BoardConfig) -> Result<Self, PlatformError> {
        let mut dvfs = Dvfs::new(board, config, 0)?;
        dvfs.enable();

        Ok(Self { dvfs, now: 0 })
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn dvfs(&self) -> &Dvfs<SimBoard> {
        &self.dvfs
    }

    pub fn dvfs_mut(&mut self) -> &mut Dvfs<SimBoard> {
        &mut self.dvfs
    }

    pub fn board(&self) -> &SimBoard {
        self.dvfs.platform()
    }

    pub fn board_mut(&mut self) -> &mut SimBoard {
        self.dvfs.platform_mut()
    }

    /// Advances the clock to the next DVFS deadline and runs that tick.
    pub fn step(&mut self) -> Option<TickReport> {
        self.now = self.now.max(self.dvfs.schedule().next_deadline());
        self.dvfs.poll(self.now)
    }

    /// Runs `ticks` control ticks and returns what each of them did.
    pub fn run(&mut self, ticks: usize) -> Vec<TickReport> {
        (0..ticks).filter_map(|_| self.step()).collect()
    }

    pub fn request(&mut self, request: &Request) -> (u8, Response) {
        self.dvfs.handle_request(request)
    }

    pub fn board_power_limit(&mut self, data: &[u8]) -> Result<(), CommandError> {
        self.dvfs.on_board_power_limit_msg(data, self.now)
    }

    pub fn telemetry(&self) -> DvfsTelemetry {
        self.dvfs.telemetry()
    }
}
