// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Status byte returned to the host for a successfully handled command.
pub const STATUS_OK: u8 = 0;
/// Status byte returned to the host for any rejected command.
pub const STATUS_ERR: u8 = 1;

/// Rejections raised at the command surface. State is never modified when one of these is returned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("forced AICLK of {freq} MHz is outside of [{fmin}, {fmax}] MHz")]
    ForcedFreqOutOfRange { freq: u32, fmin: u32, fmax: u32 },

    #[error("AICLK sweep bounds must be non-zero, got low={low} high={high}")]
    InvalidSweepRange { low: u32, high: u32 },

    #[error("message 0x{0:02x} not recognized")]
    UnknownMessage(u8),

    #[error("payload has {actual} bytes, expected {expected}")]
    InvalidPayloadLength { expected: usize, actual: usize },
}

impl CommandError {
    pub fn status(&self) -> u8 {
        STATUS_ERR
    }
}

/// Failures reported by the hardware collaborators.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("clock domain {domain} is busy")]
    ClockBusy { domain: &'static str },

    #[error("voltage regulator did not accept {millivolts} mV")]
    VoltageBusy { millivolts: f32 },

    #[error("tensix broadcast to 0x{addr:x} failed")]
    Broadcast { addr: u64 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read board config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("board config {0} must end in .yaml, .yml or .json")]
    UnknownFormat(String),
}
