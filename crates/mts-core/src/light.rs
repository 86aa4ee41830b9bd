//! Signal light states and lateral direction enums.

use std::fmt;

// ── LightState ────────────────────────────────────────────────────────────────

/// The state of a lane's signal light.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LightState {
    Red,
    Yellow,
    #[default]
    Green,
}

impl fmt::Display for LightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightState::Red => write!(f, "red"),
            LightState::Yellow => write!(f, "yellow"),
            LightState::Green => write!(f, "green"),
        }
    }
}

// ── Side ──────────────────────────────────────────────────────────────────────

/// A lateral side of a lane, in driving direction.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    #[inline(always)]
    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

// ── LinkDir ───────────────────────────────────────────────────────────────────

/// Longitudinal direction of a cross-lane neighbor link.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinkDir {
    /// The nearest neighbor behind (key strictly smaller).
    Before,
    /// The nearest neighbor ahead (key greater or equal).
    After,
}

impl LinkDir {
    #[inline(always)]
    pub fn index(self) -> usize {
        match self {
            LinkDir::Before => 0,
            LinkDir::After => 1,
        }
    }
}
