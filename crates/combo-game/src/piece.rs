//! Tetrimino tags and compact piece sets.

use std::fmt::{self, Display};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A tetrimino, or the absence of one.
///
/// The numeric tag doubles as the bit index inside a [`PieceSet`] and as the
/// nibble stored in a packed [`Seq`](crate::Seq) slot, so `Empty` must stay
/// at zero.
#[repr(u8)]
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Piece {
    #[default]
    Empty = 0,
    T = 1,
    L = 2,
    J = 3,
    S = 4,
    Z = 5,
    O = 6,
    I = 7,
}

/// The non-empty pieces in canonical order.
pub const NONEMPTY_PIECES: [Piece; 7] = [
    Piece::T,
    Piece::L,
    Piece::J,
    Piece::S,
    Piece::Z,
    Piece::O,
    Piece::I,
];

impl Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Piece::Empty => "Ɛ",
            Piece::T => "T",
            Piece::L => "L",
            Piece::J => "J",
            Piece::S => "S",
            Piece::Z => "Z",
            Piece::O => "O",
            Piece::I => "I",
        };
        f.write_str(s)
    }
}

impl Piece {
    /// Returns the mirrored version of the piece. L and J swap, S and Z
    /// swap, the symmetric pieces map to themselves.
    #[must_use]
    pub const fn mirror(self) -> Piece {
        match self {
            Piece::L => Piece::J,
            Piece::J => Piece::L,
            Piece::S => Piece::Z,
            Piece::Z => Piece::S,
            p => p,
        }
    }

    /// Returns a [`PieceSet`] containing only this piece.
    #[must_use]
    pub const fn piece_set(self) -> PieceSet {
        PieceSet(1 << self as u8)
    }

    /// Index of a non-empty piece into 7-slot child arrays.
    ///
    /// Panics on [`Piece::Empty`].
    #[must_use]
    pub fn index(self) -> usize {
        assert!(self != Piece::Empty, "invalid piece");
        self as usize - 1
    }

    /// A depiction of what the piece looks like, for terminal output.
    #[must_use]
    pub const fn game_string(self) -> &'static str {
        match self {
            Piece::Empty => "",
            Piece::T => "_□_\n□□□",
            Piece::L => "__□\n□□□",
            Piece::J => "□__\n□□□",
            Piece::S => "_□□\n□□_",
            Piece::Z => "□□_\n_□□",
            Piece::O => "□□\n□□",
            Piece::I => "□□□□",
        }
    }

    /// Parses a piece from its single-letter name. Anything unrecognized is
    /// `Empty`.
    #[must_use]
    pub fn from_char(c: char) -> Piece {
        match c.to_ascii_uppercase() {
            'T' => Piece::T,
            'L' => Piece::L,
            'J' => Piece::J,
            'S' => Piece::S,
            'Z' => Piece::Z,
            'O' => Piece::O,
            'I' => Piece::I,
            _ => Piece::Empty,
        }
    }
}

/// A set of non-empty pieces packed into one byte.
///
/// Bit `1 << piece` is set when the piece is a member; the `Empty` bit (bit
/// zero) is never set.
///
/// ```text
/// +---+---+---+---+---+---+---+---+
/// | 7 | 6 | 5 | 4 | 3 | 2 | 1 | 0 |
/// +---+---+---+---+---+---+---+---+
/// | I | O | Z | S | J | L | T | - |
/// +---+---+---+---+---+---+---+---+
/// ```
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PieceSet(u8);

impl PieceSet {
    const EMPTY_BIT: u8 = 1 << Piece::Empty as u8;
    const FULL: u8 = 0xFF & !Self::EMPTY_BIT;

    /// Creates a set from the given pieces. Duplicates and `Empty` are
    /// ignored.
    #[must_use]
    pub fn new(pieces: &[Piece]) -> PieceSet {
        let mut ps = PieceSet::default();
        for &p in pieces {
            ps = ps.union(p.piece_set());
        }
        PieceSet(ps.0 & !Self::EMPTY_BIT)
    }

    /// The union of two sets.
    #[must_use]
    pub const fn union(self, other: PieceSet) -> PieceSet {
        PieceSet(self.0 | other.0)
    }

    /// The set with one more piece.
    #[must_use]
    pub const fn add(self, p: Piece) -> PieceSet {
        PieceSet(self.0 | p.piece_set().0)
    }

    /// Whether the piece is a member.
    #[must_use]
    pub const fn contains(self, p: Piece) -> bool {
        self.0 & p.piece_set().0 != 0
    }

    /// Number of members.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The complement with respect to the seven non-empty pieces.
    #[must_use]
    pub const fn inverted(self) -> PieceSet {
        PieceSet((self.0 ^ 0xFF) & !Self::EMPTY_BIT)
    }

    /// Members in canonical [`NONEMPTY_PIECES`] order.
    #[must_use]
    pub fn to_vec(self) -> Vec<Piece> {
        NONEMPTY_PIECES
            .into_iter()
            .filter(|&p| self.contains(p))
            .collect()
    }

    /// The raw bitmask. Used by the sequence-set wire framing, which stores
    /// a bag state as this exact byte.
    #[must_use]
    pub(crate) const fn bits(self) -> u8 {
        self.0
    }

    /// Rebuilds a set from its raw bitmask, clearing the `Empty` bit.
    #[must_use]
    pub(crate) const fn from_bits(bits: u8) -> PieceSet {
        PieceSet(bits & Self::FULL)
    }
}

impl Display for PieceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (idx, p) in self.to_vec().into_iter().enumerate() {
            if idx > 0 {
                write!(f, " ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, "]")
    }
}

/// All 128 subsets of the seven non-empty pieces.
#[must_use]
pub fn all_piece_sets() -> Vec<PieceSet> {
    (0u8..128)
        .map(|idx| {
            let mut ps = PieceSet::default();
            for (bit, &p) in NONEMPTY_PIECES.iter().enumerate() {
                if idx & (1 << bit) != 0 {
                    ps = ps.add(p);
                }
            }
            ps
        })
        .collect()
}

/// Generates `len` pieces from a 7-bag randomizer: uniformly random
/// permutations of all seven pieces, concatenated and truncated.
#[must_use]
pub fn rand_pieces(len: usize) -> Vec<Piece> {
    rand_pieces_with(&mut rand::rng(), len)
}

/// [`rand_pieces`] with a caller-provided RNG, for deterministic trials.
#[must_use]
pub fn rand_pieces_with<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Vec<Piece> {
    let mut pieces = Vec::with_capacity(len + 6);
    while pieces.len() < len {
        let mut bag = NONEMPTY_PIECES;
        bag.shuffle(rng);
        pieces.extend_from_slice(&bag);
    }
    pieces.truncate(len);
    pieces
}
