//! The catalogue of continuation moves.

use std::fmt::{self, Display};

use crate::field::Field4x4;
use crate::piece::Piece;

/// A move that keeps a 4-wide combo going: placing `piece` on `start` and
/// clearing exactly one row leaves `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub start: Field4x4,
    pub end: Field4x4,
    pub piece: Piece,
}

impl Move {
    /// The same move played in the mirrored well.
    #[must_use]
    pub fn mirror(self) -> Move {
        Move {
            start: self.start.mirror(),
            end: self.end.mirror(),
            piece: self.piece.mirror(),
        }
    }
}

impl Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{\nStart:\n{}End:\n{}Piece: {}\n}}",
            self.start, self.end, self.piece
        )
    }
}

/// All moves that result in further combo play, for 4-wide with 3 residual
/// cells. The non-mirrored half is listed explicitly per starting residue
/// (see the Harddrop wiki's 4-Wide-with-3-Residua tables); the mirrored
/// half is generated from it.
#[must_use]
pub fn all_continuous_moves() -> Vec<Move> {
    const X: bool = true;
    const O: bool = false;
    fn f(rows: &[[bool; 4]]) -> Field4x4 {
        Field4x4::new(rows)
    }

    let mut all: Vec<Move> = Vec::with_capacity(140);
    let mut add = |start: Field4x4, plays: &[(Piece, Field4x4)]| {
        all.extend(
            plays
                .iter()
                .map(|&(piece, end)| Move { start, end, piece }),
        );
    };

    let start = f(&[[X, X, O, O], [X, O, O, O]]);
    add(
        start,
        &[
            (Piece::I, start),
            (Piece::T, f(&[[O, O, O, X], [X, O, O, X]])),
            (Piece::T, f(&[[X, X, X, O]])),
            (Piece::L, f(&[[X, X, O, X]])),
            (Piece::S, f(&[[X, X, X, O]])),
            (Piece::S, f(&[[O, O, X, O], [X, O, O, X]])),
            (Piece::Z, f(&[[O, O, O, X], [X, O, X, O]])),
            (Piece::Z, f(&[[O, X, X, O], [X, O, O, O]])),
            (Piece::O, f(&[[X, O, X, X]])),
        ],
    );

    let start = f(&[[X, O, O, O], [X, O, O, X]]);
    add(
        start,
        &[
            (Piece::I, start),
            (Piece::T, f(&[[X, O, X, X]])),
            (Piece::T, f(&[[O, O, X, O], [X, O, O, X]])),
            (Piece::L, f(&[[O, O, O, X], [X, O, O, X]])),
            (Piece::L, f(&[[X, X, O, X]])),
            (Piece::L, f(&[[O, X, O, O], [X, X, O, O]])),
            (Piece::J, f(&[[O, X, O, O], [X, O, O, X]])),
            (Piece::S, f(&[[X, O, X, X]])),
            (Piece::O, f(&[[X, X, X, O]])),
        ],
    );

    let start = f(&[[X, O, O, O], [X, X, O, O]]);
    add(
        start,
        &[
            (Piece::I, start),
            (Piece::T, f(&[[X, X, X, O]])),
            (Piece::L, f(&[[O, O, O, X], [X, X, O, O]])),
            (Piece::J, f(&[[O, O, O, X], [X, O, O, X]])),
            (Piece::J, f(&[[X, X, O, X]])),
            (Piece::J, f(&[[O, X, O, O], [X, X, O, O]])),
            (Piece::Z, f(&[[X, X, X, O]])),
            (Piece::O, f(&[[X, O, X, X]])),
        ],
    );

    let start = f(&[[X, X, X, O]]);
    add(
        start,
        &[
            (Piece::I, start),
            (Piece::T, f(&[[O, O, O, X], [O, O, X, X]])),
            (Piece::L, f(&[[O, O, X, X], [O, O, O, X]])),
            (Piece::J, f(&[[O, X, X, X]])),
            (Piece::S, f(&[[O, O, X, O], [O, O, X, X]])),
            (Piece::I, f(&[[O, O, O, X], [O, O, O, X], [O, O, O, X]])),
        ],
    );

    let start = f(&[[X, O, O, O], [X, O, O, O], [X, O, O, O]]);
    add(
        start,
        &[
            (Piece::I, start),
            (Piece::T, f(&[[X, O, O, O], [X, O, X, O]])),
            (Piece::L, f(&[[X, O, O, O], [X, O, O, X]])),
            (Piece::L, f(&[[X, O, O, O], [X, X, O, O]])),
            (Piece::J, f(&[[X, O, O, O], [X, O, O, X]])),
            (Piece::J, f(&[[X, O, O, O], [X, X, O, O]])),
        ],
    );

    let start = f(&[[X, X, O, X]]);
    add(
        start,
        &[
            (Piece::I, start),
            (Piece::T, f(&[[O, X, X, X]])),
            (Piece::T, f(&[[O, O, X, O], [O, O, X, X]])),
            (Piece::J, f(&[[X, X, X, O]])),
            (Piece::J, f(&[[O, O, X, X], [O, O, X, O]])),
            (Piece::Z, f(&[[O, O, O, X], [O, O, X, X]])),
        ],
    );

    let start = f(&[[O, O, O, X], [X, X, O, O]]);
    add(
        start,
        &[
            (Piece::I, start),
            (Piece::T, f(&[[O, X, O, O], [X, X, O, O]])),
            (Piece::J, f(&[[X, O, O, O], [X, X, O, O]])),
            (Piece::J, f(&[[X, X, X, O]])),
            (Piece::Z, f(&[[O, X, X, X]])),
        ],
    );

    let start = f(&[[X, X, O, O], [O, X, O, O]]);
    add(
        start,
        &[
            (Piece::I, start),
            (Piece::T, f(&[[O, O, O, X], [O, X, O, X]])),
            (Piece::Z, f(&[[O, O, O, X], [O, X, X, O]])),
            (Piece::O, f(&[[O, X, X, X]])),
        ],
    );

    let start = f(&[[X, O, O, O], [X, O, X, O]]);
    add(
        start,
        &[
            (Piece::I, start),
            (Piece::L, f(&[[X, X, X, O]])),
            (Piece::L, f(&[[O, O, O, X], [X, O, X, O]])),
            (Piece::J, f(&[[X, O, X, X]])),
        ],
    );

    let start = f(&[[O, X, O, O], [X, X, O, O]]);
    add(
        start,
        &[
            (Piece::I, start),
            (Piece::J, f(&[[O, O, O, X], [O, X, O, X]])),
            (Piece::O, f(&[[O, X, X, X]])),
        ],
    );

    let start = f(&[[X, O, O, O], [O, X, X, O]]);
    add(
        start,
        &[
            (Piece::I, start),
            (Piece::L, f(&[[O, O, O, X], [O, X, X, O]])),
            (Piece::J, f(&[[O, X, X, X]])),
        ],
    );

    let start = f(&[[X, O, O, O], [O, X, O, X]]);
    add(
        start,
        &[
            (Piece::I, start),
            (Piece::T, f(&[[O, X, X, X]])),
            (Piece::L, f(&[[O, O, O, X], [O, X, O, X]])),
        ],
    );

    let start = f(&[[O, X, O, O], [X, O, O, X]]);
    add(
        start,
        &[(Piece::I, start), (Piece::S, f(&[[O, X, X, X]]))],
    );

    let start = f(&[[O, X, X, O], [X, O, O, O]]);
    add(
        start,
        &[(Piece::I, start), (Piece::L, f(&[[O, X, X, X]]))],
    );

    // The mirrored half.
    let without_mirror = all.len();
    for idx in 0..without_mirror {
        let mirrored = all[idx].mirror();
        all.push(mirrored);
    }

    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const X: bool = true;
    const O: bool = false;

    #[test]
    fn test_piece_counts() {
        let all = all_continuous_moves();
        let mut counts: HashMap<Piece, usize> = HashMap::new();
        for m in &all {
            *counts.entry(m.piece).or_default() += 1;
        }
        let want: HashMap<Piece, usize> = HashMap::from([
            (Piece::T, 24),
            (Piece::L, 27),
            (Piece::J, 27),
            (Piece::S, 11),
            (Piece::Z, 11),
            (Piece::O, 10),
            (Piece::I, 30),
        ]);
        assert_eq!(counts, want);
        assert_eq!(all.len(), 140);
    }

    #[test]
    fn test_no_duplicates() {
        let all = all_continuous_moves();
        let mut counts: HashMap<Move, usize> = HashMap::new();
        for &m in &all {
            *counts.entry(m).or_default() += 1;
        }
        for (m, count) in counts {
            assert_eq!(count, 1, "move {m} occurs {count} times");
        }
    }

    #[test]
    fn test_residue_counts() {
        for m in all_continuous_moves() {
            assert_eq!(m.start.num_occupied(), 3, "start of {m}");
            assert_eq!(m.end.num_occupied(), 3, "end of {m}");
        }
    }

    /// Every move must correspond to an actual tetrimino drop: re-inserting
    /// a full row into the end field at some height and removing the start
    /// cells must leave the four cells of the stated piece.
    #[test]
    fn test_moves_form_tetriminoes() {
        let canonical = canonical_piece_map();
        for m in all_continuous_moves() {
            let end = m.end.rows();
            let full = [X; 4];
            let preclears = [
                Field4x4::new(&[full, end[1], end[2], end[3]]),
                Field4x4::new(&[end[1], full, end[2], end[3]]),
                Field4x4::new(&[end[1], end[2], full, end[3]]),
                Field4x4::new(&[end[1], end[2], end[3], full]),
            ];
            let mut valid = false;
            let mut other_piece = None;
            for preclear in preclears {
                let piece_field = preclear.without(m.start);
                if piece_field.num_occupied() != 4 {
                    continue;
                }
                match canonical.get(&to_canonical(piece_field)) {
                    Some(&p) if p == m.piece => {
                        valid = true;
                        break;
                    }
                    Some(&p) => other_piece = Some(p),
                    None => {}
                }
            }
            assert!(
                valid,
                "no transition start -> end using {}{}:\n{m}",
                m.piece,
                other_piece.map_or(String::new(), |p| format!(" (but there is one using {p})")),
            );
        }
    }

    /// Shifts the four occupied cells to the bottom-left corner.
    fn to_canonical(field: Field4x4) -> Field4x4 {
        let rows = field.rows();
        let mut max_row = 0;
        let mut min_col = 3;
        for (r, row) in rows.iter().enumerate() {
            for (c, &occupied) in row.iter().enumerate() {
                if occupied {
                    max_row = max_row.max(r);
                    min_col = min_col.min(c);
                }
            }
        }
        let mut shifted = [[false; 4]; 4];
        for (r, row) in rows.iter().enumerate() {
            for (c, &occupied) in row.iter().enumerate() {
                if occupied {
                    shifted[r + 3 - max_row][c - min_col] = true;
                }
            }
        }
        Field4x4::new(&shifted)
    }

    /// Every rotation of every piece, placed in the bottom-left corner.
    fn canonical_piece_map() -> HashMap<Field4x4, Piece> {
        HashMap::from([
            // T
            (
                Field4x4::new(&[[O, X, O, O], [X, X, X, O]]),
                Piece::T,
            ),
            (
                Field4x4::new(&[[X, O, O, O], [X, X, O, O], [X, O, O, O]]),
                Piece::T,
            ),
            (
                Field4x4::new(&[[X, X, X, O], [O, X, O, O]]),
                Piece::T,
            ),
            (
                Field4x4::new(&[[O, X, O, O], [X, X, O, O], [O, X, O, O]]),
                Piece::T,
            ),
            // L
            (
                Field4x4::new(&[[X, O, O, O], [X, O, O, O], [X, X, O, O]]),
                Piece::L,
            ),
            (
                Field4x4::new(&[[X, X, X, O], [X, O, O, O]]),
                Piece::L,
            ),
            (
                Field4x4::new(&[[X, X, O, O], [O, X, O, O], [O, X, O, O]]),
                Piece::L,
            ),
            (
                Field4x4::new(&[[O, O, X, O], [X, X, X, O]]),
                Piece::L,
            ),
            // J
            (
                Field4x4::new(&[[X, X, O, O], [X, O, O, O], [X, O, O, O]]),
                Piece::J,
            ),
            (
                Field4x4::new(&[[X, X, X, O], [O, O, X, O]]),
                Piece::J,
            ),
            (
                Field4x4::new(&[[O, X, O, O], [O, X, O, O], [X, X, O, O]]),
                Piece::J,
            ),
            (
                Field4x4::new(&[[X, O, O, O], [X, X, X, O]]),
                Piece::J,
            ),
            // S
            (
                Field4x4::new(&[[O, X, X, O], [X, X, O, O]]),
                Piece::S,
            ),
            (
                Field4x4::new(&[[X, O, O, O], [X, X, O, O], [O, X, O, O]]),
                Piece::S,
            ),
            // Z
            (
                Field4x4::new(&[[X, X, O, O], [O, X, X, O]]),
                Piece::Z,
            ),
            (
                Field4x4::new(&[[O, X, O, O], [X, X, O, O], [X, O, O, O]]),
                Piece::Z,
            ),
            // O
            (
                Field4x4::new(&[[X, X, O, O], [X, X, O, O]]),
                Piece::O,
            ),
            // I
            (Field4x4::new(&[[X, X, X, X]]), Piece::I),
            (
                Field4x4::new(&[
                    [X, O, O, O],
                    [X, O, O, O],
                    [X, O, O, O],
                    [X, O, O, O],
                ]),
                Piece::I,
            ),
        ])
    }
}
