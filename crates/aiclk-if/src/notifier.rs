// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use tracing::warn;

use crate::interface::TensixArray;

/// Address in every tensix tile that kernels poll for the throttle counter.
pub const KERNEL_THROTTLE_ADDRESS: u64 = 0x10;

/// Published whenever the tensix array is powered on or off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TensixStateMsg {
    pub enable: bool,
}

/// Tells running kernels whether to insert no-ops.
///
/// Kernels read the counter parity: even is full speed, odd is throttled. The counter
/// itself keeps counting so the number of transitions can be read back when debugging.
#[derive(Clone, Debug)]
pub struct KernelThrottleNotifier {
    counter: u32,
    tensix_enabled: bool,
}

impl Default for KernelThrottleNotifier {
    fn default() -> Self {
        Self {
            counter: 0,
            tensix_enabled: true,
        }
    }
}

impl KernelThrottleNotifier {
    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn tensix_enabled(&self) -> bool {
        self.tensix_enabled
    }

    pub fn init(&mut self, array: &mut dyn TensixArray) {
        self.counter = 0;
        self.broadcast(array);
    }

    /// Must only be called when the throttle state changes.
    pub fn send(&mut self, throttle: bool, array: &mut dyn TensixArray) {
        self.counter = self.counter.wrapping_add(1);
        // double check the parity in case we got out of sync
        if (self.counter & 1 == 1) != throttle {
            self.counter = self.counter.wrapping_add(1);
        }

        self.broadcast(array);
    }

    /// Power state listener; newly powered tiles get the current counter right away.
    pub fn on_tensix_state(&mut self, msg: TensixStateMsg, array: &mut dyn TensixArray) {
        self.tensix_enabled = msg.enable;
        self.broadcast(array);
    }

    fn broadcast(&self, array: &mut dyn TensixArray) {
        if !self.tensix_enabled {
            return;
        }

        if let Err(err) = array.broadcast_write32(KERNEL_THROTTLE_ADDRESS, self.counter) {
            warn!("kernel throttle broadcast failed: {err}");
        }
    }
}
