use core::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PlayerPosition {
    First = 0,
    Second = 1,
}

impl PlayerPosition {
    pub const LOOP: [PlayerPosition; 2] = [PlayerPosition::First, PlayerPosition::Second];

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(PlayerPosition::First),
            1 => Some(PlayerPosition::Second),
            _ => None,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn opponent(self) -> PlayerPosition {
        match self {
            PlayerPosition::First => PlayerPosition::Second,
            PlayerPosition::Second => PlayerPosition::First,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            PlayerPosition::First => "first",
            PlayerPosition::Second => "second",
        }
    }
}

impl fmt::Display for PlayerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlayerPosition::First => "First",
            PlayerPosition::Second => "Second",
        };
        f.write_str(label)
    }
}
