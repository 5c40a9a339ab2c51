//! Fixed-point amounts.
//!
//! Amounts sent to components are integers in base units, where one whole unit
//! is `10^18` base units.

use std::{fmt, str::FromStr};

use alloy_core::primitives::{
    U256,
    utils::{ParseUnits, parse_units},
};
use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};

/// Number of decimals in one whole unit.
pub const BASE_UNIT_DECIMALS: u8 = 18;

/// An amount as written by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amount {
    /// A human-readable quantity of whole units, e.g. `"70000"` or `"0.01"`.
    Whole(String),
    /// A raw integer already expressed in base units (decimal or `0x` hex).
    BaseUnits(String),
    /// The largest representable amount.
    Unbounded,
}

impl Amount {
    pub fn whole(value: impl Into<String>) -> Self {
        Amount::Whole(value.into())
    }

    pub fn base_units(value: impl Into<String>) -> Self {
        Amount::BaseUnits(value.into())
    }

    /// Convert to base units.
    pub fn to_base_units(&self) -> Result<U256> {
        match self {
            Amount::Whole(value) => whole_to_base_units(value),
            Amount::BaseUnits(value) => {
                U256::from_str(value.trim()).map_err(|e| DeployError::InvalidAmount {
                    value: value.clone(),
                    reason: e.to_string(),
                })
            }
            Amount::Unbounded => Ok(U256::MAX),
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Whole(value) => write!(f, "{value}"),
            Amount::BaseUnits(value) => write!(f, "{value} base units"),
            Amount::Unbounded => write!(f, "max"),
        }
    }
}

/// Convert a decimal quantity of whole units to base units.
pub fn whole_to_base_units(value: &str) -> Result<U256> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(DeployError::InvalidAmount {
            value: value.to_string(),
            reason: "expected a non-negative decimal number".to_string(),
        });
    }

    parse_units(trimmed, BASE_UNIT_DECIMALS)
        .map(ParseUnits::get_absolute)
        .map_err(|e| DeployError::InvalidAmount {
            value: value.to_string(),
            reason: e.to_string(),
        })
}
