//! Fixed-capacity piece sequences packed into one word.

use std::fmt::{self, Display};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::piece::Piece;

/// An ordered sequence of up to 7 non-empty pieces.
///
/// The whole sequence lives in a single `u32`: slot `i` occupies bits
/// `4*i..4*i+4` and the length sits in the top nibble. Unused slots are
/// zero, so equality and hashing are simply those of the packed word, and a
/// `Seq` is directly usable as a map key.
///
/// ```text
/// 31    28 27    24  ...  7     4 3     0
/// +-------+--------+-----+-------+-------+
/// |  len  | slot 6 | ... | slot 1| slot 0|
/// +-------+--------+-----+-------+-------+
/// ```
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Seq(u32);

impl Seq {
    pub const MAX_LEN: usize = 7;

    const LEN_SHIFT: u32 = 28;
    const SLOT_MASK: u32 = 0xF;

    /// Builds a sequence from a slice of at most 7 non-empty pieces.
    pub fn new(pieces: &[Piece]) -> Result<Seq> {
        if pieces.len() > Self::MAX_LEN {
            bail!("sequence length {} exceeds the maximum of 7", pieces.len());
        }
        let mut encoding = 0u32;
        for (idx, &p) in pieces.iter().enumerate() {
            if p == Piece::Empty {
                bail!("sequences cannot contain the empty piece");
            }
            encoding |= (p as u32) << (4 * idx as u32);
        }
        Ok(Seq(encoding | (pieces.len() as u32) << Self::LEN_SHIFT))
    }

    /// Parses a sequence from single-letter piece names, e.g. `"TLJS"`.
    pub fn parse(s: &str) -> Result<Seq> {
        let pieces: Vec<Piece> = s.chars().map(Piece::from_char).collect();
        if pieces.contains(&Piece::Empty) {
            bail!("unrecognized piece in {s:?}");
        }
        Seq::new(&pieces)
    }

    #[must_use]
    pub const fn len(self) -> usize {
        (self.0 >> Self::LEN_SHIFT) as usize
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// The piece in slot `idx`.
    ///
    /// Panics when `idx` is at or past the length.
    #[must_use]
    pub fn at(self, idx: usize) -> Piece {
        assert!(idx < self.len(), "index {idx} out of bounds for {self}");
        Self::slot(self.0, idx)
    }

    /// Returns a copy with slot `idx` set to `p`, extending the length by
    /// one when writing to the first unused slot.
    ///
    /// Panics when the write would leave a gap (`idx > len`), when `idx`
    /// is 7 or more, or when `p` is the empty piece.
    #[must_use]
    pub fn set(self, idx: usize, p: Piece) -> Seq {
        assert!(idx < Self::MAX_LEN, "index {idx} out of bounds");
        assert!(
            idx <= self.len(),
            "cannot set slot {idx} of {self} without filling earlier slots"
        );
        assert!(p != Piece::Empty, "sequences cannot contain the empty piece");
        let shift = 4 * idx as u32;
        let encoding = (self.0 & !(Self::SLOT_MASK << shift)) | ((p as u32) << shift);
        let len = self.len().max(idx + 1) as u32;
        Seq((encoding & !(Self::SLOT_MASK << Self::LEN_SHIFT)) | (len << Self::LEN_SHIFT))
    }

    /// Returns a copy with the first slot removed and everything shifted
    /// down by one.
    ///
    /// Panics on an empty sequence.
    #[must_use]
    pub fn remove_first(self) -> Seq {
        let len = self.len();
        assert!(len > 0, "remove_first on an empty sequence");
        let pieces = (self.0 & !(Self::SLOT_MASK << Self::LEN_SHIFT)) >> 4;
        Seq(pieces | ((len as u32 - 1) << Self::LEN_SHIFT))
    }

    /// Returns a copy with `p` appended.
    pub fn append(self, p: Piece) -> Result<Seq> {
        if self.len() >= Self::MAX_LEN {
            bail!("sequence is already at max capacity");
        }
        if p == Piece::Empty {
            bail!("sequences cannot contain the empty piece");
        }
        let encoding = self.0 | (p as u32) << (4 * self.len() as u32);
        Ok(Seq(
            (encoding & !(Self::SLOT_MASK << Self::LEN_SHIFT))
                | ((self.len() as u32 + 1) << Self::LEN_SHIFT),
        ))
    }

    /// The pieces as a freshly allocated vector.
    #[must_use]
    pub fn to_vec(self) -> Vec<Piece> {
        (0..self.len()).map(|idx| Self::slot(self.0, idx)).collect()
    }

    fn slot(encoding: u32, idx: usize) -> Piece {
        match (encoding >> (4 * idx as u32)) & Self::SLOT_MASK {
            0 => Piece::Empty,
            1 => Piece::T,
            2 => Piece::L,
            3 => Piece::J,
            4 => Piece::S,
            5 => Piece::Z,
            6 => Piece::O,
            7 => Piece::I,
            nibble => unreachable!("invalid piece nibble {nibble}"),
        }
    }
}

impl Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for idx in 0..self.len() {
            if idx > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", self.at(idx))?;
        }
        write!(f, "]")
    }
}
