//! Key actions a player can perform.
//!
//! Moves in the catalogue can be annotated with an ordered list of these
//! for driving an external game client; the per-client macro tables live
//! with the actuator, not here.

use std::fmt::{self, Display};

/// Something the user can do by pressing a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    NoAction,
    Hold,
    Left,
    Right,
    RotateCw,
    RotateCcw,
    SoftDrop,
    HardDrop,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::NoAction,
        Action::Hold,
        Action::Left,
        Action::Right,
        Action::RotateCw,
        Action::RotateCcw,
        Action::SoftDrop,
        Action::HardDrop,
    ];

    /// The equivalent action when the field is reflected across the
    /// vertical axis.
    #[must_use]
    pub const fn mirror(self) -> Action {
        match self {
            Action::Left => Action::Right,
            Action::Right => Action::Left,
            Action::RotateCw => Action::RotateCcw,
            Action::RotateCcw => Action::RotateCw,
            a => a,
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::NoAction => "No_Action",
            Action::Hold => "Swap_Hold",
            Action::Left => "Left",
            Action::Right => "Right",
            Action::RotateCw => "Rotate_CW",
            Action::RotateCcw => "Rotate_CCW",
            Action::SoftDrop => "Soft_Drop",
            Action::HardDrop => "Hard_Drop",
        };
        f.write_str(s)
    }
}
