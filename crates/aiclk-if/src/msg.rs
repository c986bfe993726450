// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::CommandError;

pub const REQUEST_MSG_LEN: usize = 8;
pub const RESPONSE_MSG_LEN: usize = 8;

pub type Request = [u32; REQUEST_MSG_LEN];
pub type Response = [u32; RESPONSE_MSG_LEN];

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum MsgType {
    PowerSetting = 0x21,
    AisweepStart = 0x31,
    AisweepStop = 0x32,
    ForceAiclk = 0x33,
    GetAiclk = 0x34,
    AiclkGoBusy = 0x52,
    AiclkGoLongIdle = 0x54,
}

/// On/off power flags of a power setting request, in request bit order.
#[bitfield_struct::bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct PowerFlags {
    pub max_ai_clk: bool,
    pub mrisc_phy_power: bool,
    pub tensix_enable: bool,
    #[bits(12)]
    pub future_use: u16,
    pub reserved: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerFlag {
    MaxAiClk = 0,
    MriscPhyPower = 1,
    TensixEnable = 2,
}

impl PowerFlag {
    pub const COUNT: u8 = 3;
}

/// Number of entries in the settings array the host may fill in; none are supported yet.
pub const POWER_SETTINGS_SUPPORTED: u8 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PowerSetting {
    pub flags_valid: u8,
    pub settings_valid: u8,
    pub flags: PowerFlags,
}

impl PowerSetting {
    /// A flag only applies if the host marked at least `flag + 1` flags valid.
    pub fn flag(&self, flag: PowerFlag) -> Option<bool> {
        if self.flags_valid <= flag as u8 {
            return None;
        }

        Some(match flag {
            PowerFlag::MaxAiClk => self.flags.max_ai_clk(),
            PowerFlag::MriscPhyPower => self.flags.mrisc_phy_power(),
            PowerFlag::TensixEnable => self.flags.tensix_enable(),
        })
    }

    pub fn to_word(&self) -> u32 {
        MsgType::PowerSetting as u32
            | ((self.flags_valid as u32 & 0xF) << 8)
            | ((self.settings_valid as u32 & 0xF) << 12)
            | ((u16::from(self.flags) as u32) << 16)
    }
}

/// Host commands handled by the governor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AiclkMsg {
    AiclkGoBusy,
    AiclkGoLongIdle,
    /// `0` releases the override.
    ForceAiclk { freq: u32 },
    GetAiclk,
    AisweepStart { low: u32, high: u32 },
    AisweepStop,
    PowerSetting(PowerSetting),
}

impl AiclkMsg {
    pub fn msg_type(&self) -> MsgType {
        match self {
            AiclkMsg::AiclkGoBusy => MsgType::AiclkGoBusy,
            AiclkMsg::AiclkGoLongIdle => MsgType::AiclkGoLongIdle,
            AiclkMsg::ForceAiclk { .. } => MsgType::ForceAiclk,
            AiclkMsg::GetAiclk => MsgType::GetAiclk,
            AiclkMsg::AisweepStart { .. } => MsgType::AisweepStart,
            AiclkMsg::AisweepStop => MsgType::AisweepStop,
            AiclkMsg::PowerSetting(_) => MsgType::PowerSetting,
        }
    }

    pub fn msg_code(&self) -> u8 {
        self.msg_type() as u8
    }

    /// The command code lives in the low byte of the first request word.
    pub fn from_request(request: &Request) -> Result<Self, CommandError> {
        let code = (request[0] & 0xFF) as u8;
        let ty = MsgType::from_u8(code).ok_or(CommandError::UnknownMessage(code))?;

        Ok(match ty {
            MsgType::AiclkGoBusy => AiclkMsg::AiclkGoBusy,
            MsgType::AiclkGoLongIdle => AiclkMsg::AiclkGoLongIdle,
            MsgType::ForceAiclk => AiclkMsg::ForceAiclk { freq: request[1] },
            MsgType::GetAiclk => AiclkMsg::GetAiclk,
            MsgType::AisweepStart => AiclkMsg::AisweepStart {
                low: request[1],
                high: request[2],
            },
            MsgType::AisweepStop => AiclkMsg::AisweepStop,
            MsgType::PowerSetting => AiclkMsg::PowerSetting(PowerSetting {
                flags_valid: ((request[0] >> 8) & 0xF) as u8,
                settings_valid: ((request[0] >> 12) & 0xF) as u8,
                flags: PowerFlags::from((request[0] >> 16) as u16),
            }),
        })
    }

    pub fn to_request(&self) -> Request {
        let mut request = [0; REQUEST_MSG_LEN];
        request[0] = self.msg_code() as u32;

        match self {
            AiclkMsg::ForceAiclk { freq } => request[1] = *freq,
            AiclkMsg::AisweepStart { low, high } => {
                request[1] = *low;
                request[2] = *high;
            }
            AiclkMsg::PowerSetting(setting) => request[0] = setting.to_word(),
            AiclkMsg::AiclkGoBusy
            | AiclkMsg::AiclkGoLongIdle
            | AiclkMsg::GetAiclk
            | AiclkMsg::AisweepStop => {}
        }

        request
    }
}

/// Decodes the 2 byte little endian board power limit sent by the board controller.
pub fn decode_board_power_limit(data: &[u8]) -> Result<u16, CommandError> {
    match data {
        [lo, hi] => Ok(u16::from_le_bytes([*lo, *hi])),
        _ => Err(CommandError::InvalidPayloadLength {
            expected: 2,
            actual: data.len(),
        }),
    }
}
