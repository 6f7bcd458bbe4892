//! The closed set of actuation actions.

use serde::{Deserialize, Serialize};

use crate::error::{GrowError, Result};

/// One of the actions the controller can issue to the enclosure.
///
/// The discriminant doubles as the bandit arm index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    DoNothing = 0,
    AddWater = 1,
    LightOff = 2,
    LightOn = 3,
}

impl Action {
    /// Number of actions, i.e. bandit arms.
    pub const COUNT: usize = 4;

    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::DoNothing, Self::AddWater, Self::LightOff, Self::LightOn]
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Result<Self> {
        Self::all()
            .get(index)
            .copied()
            .ok_or(GrowError::InvalidAction(index))
    }

    /// Command word understood by the enclosure firmware.
    #[must_use]
    pub const fn wire_command(self) -> &'static str {
        match self {
            Self::DoNothing => "DO_NOTHING",
            Self::AddWater => "ADD_WATER",
            Self::LightOff => "TURN_LIGHT_OFF",
            Self::LightOn => "TURN_LIGHT_ON",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::DoNothing => "do nothing",
            Self::AddWater => "add water",
            Self::LightOff => "light off",
            Self::LightOn => "light on",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
