// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use aiclk_if::error::{CommandError, ConfigError, PlatformError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    PlatformError(#[from] PlatformError),

    #[error(transparent)]
    ConfigError(#[from] ConfigError),

    #[error(transparent)]
    CommandError(#[from] CommandError),

    #[error("{0}")]
    Custom(String),
}
