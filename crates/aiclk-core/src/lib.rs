// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

//! Closed sets of identifiers shared by the governor, its reference backend and the CLI.
//!
//! Every arbiter and requester the governor knows about is listed here. Tables elsewhere
//! are sized by the `COUNT` constants so an id can always be used as an index.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} \"{name}\"")]
pub struct ParseIdError {
    pub kind: &'static str,
    pub name: String,
}

/// Sources of an upper bound on AICLK.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ArbMax {
    Fmax,
    Tdp,
    FastTdc,
    Tdc,
    Thm,
    BoardPower,
    Voltage,
    GddrThm,
    DopplerSlow,
    DopplerCritical,
}

impl ArbMax {
    pub const COUNT: usize = 10;

    pub const ALL: [ArbMax; ArbMax::COUNT] = [
        ArbMax::Fmax,
        ArbMax::Tdp,
        ArbMax::FastTdc,
        ArbMax::Tdc,
        ArbMax::Thm,
        ArbMax::BoardPower,
        ArbMax::Voltage,
        ArbMax::GddrThm,
        ArbMax::DopplerSlow,
        ArbMax::DopplerCritical,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ArbMax::Fmax => "fmax",
            ArbMax::Tdp => "tdp",
            ArbMax::FastTdc => "fast_tdc",
            ArbMax::Tdc => "tdc",
            ArbMax::Thm => "thm",
            ArbMax::BoardPower => "board_power",
            ArbMax::Voltage => "voltage",
            ArbMax::GddrThm => "gddr_thm",
            ArbMax::DopplerSlow => "doppler_slow",
            ArbMax::DopplerCritical => "doppler_critical",
        }
    }
}

impl fmt::Display for ArbMax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArbMax {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArbMax::ALL
            .iter()
            .copied()
            .find(|arb| arb.name() == s)
            .ok_or_else(|| ParseIdError {
                kind: "max arbiter",
                name: s.to_string(),
            })
    }
}

/// Sources of a lower bound on AICLK.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ArbMin {
    Fmin,
    Busy,
}

impl ArbMin {
    pub const COUNT: usize = 2;

    pub const ALL: [ArbMin; ArbMin::COUNT] = [ArbMin::Fmin, ArbMin::Busy];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ArbMin::Fmin => "fmin",
            ArbMin::Busy => "busy",
        }
    }
}

impl fmt::Display for ArbMin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArbMin {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fmin" => Ok(ArbMin::Fmin),
            "busy" => Ok(ArbMin::Busy),
            err => Err(ParseIdError {
                kind: "min arbiter",
                name: err.to_string(),
            }),
        }
    }
}

/// How AICLK is currently being driven, as reported to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[repr(u32)]
pub enum ClockControlMode {
    Uncontrolled = 1,
    PpmForced = 2,
    PpmUnforced = 3,
}

impl From<ClockControlMode> for u32 {
    fn from(value: ClockControlMode) -> Self {
        value as u32
    }
}

impl fmt::Display for ClockControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockControlMode::Uncontrolled => write!(f, "uncontrolled"),
            ClockControlMode::PpmForced => write!(f, "forced"),
            ClockControlMode::PpmUnforced => write!(f, "free-running"),
        }
    }
}

/// Parties that may place a request on the core voltage.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum VoltageRequester {
    Aiclk,
    Host,
}

impl VoltageRequester {
    pub const COUNT: usize = 2;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}
