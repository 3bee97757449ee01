//! Trend comparison operators.
//!
//! A trend fixes the direction in which a live value has to reach a
//! threshold for the threshold to be considered touched.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison direction between a live value and a fixed threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Trend {
    /// Live value reaches or exceeds the threshold.
    Up,
    /// Live value reaches or falls below the threshold.
    Down,
    /// Live value equals the threshold exactly.
    #[default]
    Equal,
    /// Any direction the wire form does not know. Never matches.
    #[serde(other)]
    Unrecognized,
}

impl Trend {
    /// Returns true when `live` touches `threshold` in this direction.
    ///
    /// `Unrecognized` fails closed so a malformed attribute cannot make
    /// its condition fire.
    #[inline]
    pub fn is_touched(&self, threshold: Decimal, live: Decimal) -> bool {
        match self {
            Self::Up => threshold <= live,
            Self::Down => threshold >= live,
            Self::Equal => threshold == live,
            Self::Unrecognized => false,
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "Up"),
            Self::Down => write!(f, "Down"),
            Self::Equal => write!(f, "Equal"),
            Self::Unrecognized => write!(f, "Unrecognized"),
        }
    }
}
