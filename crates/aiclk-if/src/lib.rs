// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0
#![crate_type = "lib"]

pub use aiclk::{AiclkPpm, LimitReason, SweepRange};
pub use arbiter::{Arbiter, ArbiterRegistry};
pub use config::{BoardConfig, ChipLimits, DvfsOptions, FeatureEnable};
pub use doppler::{Doppler, DopplerFeatures, DopplerOutcome};
pub use dvfs::{Dvfs, DvfsTelemetry, TickReport, DVFS_INTERVAL};
pub use interface::{
    max_freq_for_voltage, ClockDomain, ClockDriver, Platform, TelemetrySnapshot,
    TelemetrySource, TensixArray, VfCurve, VoltageRegulator,
};
pub use msg::{AiclkMsg, MsgType, PowerFlag, PowerFlags, PowerSetting, Request, Response};
pub use notifier::{KernelThrottleNotifier, TensixStateMsg};
pub use schedule::DvfsSchedule;
pub use throttler::{Throttler, ThrottlerBank, ThrottlerId};

/// Aiclk-if implements the AICLK governor in a backend agnostic way.
/// Everything it needs from hardware goes through the traits in `interface`,
/// a backend only has to implement `Platform` and hand itself to `Dvfs`.
///

pub mod aiclk;
pub mod arbiter;
pub mod config;
pub mod doppler;
pub mod dvfs;
pub mod error;
mod interface;
pub mod msg;
pub mod notifier;
pub mod schedule;
pub mod throttler;
