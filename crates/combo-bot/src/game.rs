//! The streaming game driver.

use std::sync::Arc;
use std::thread;

use combo_game::{Field4x4, Piece, PieceSet, State};
use crossbeam_channel::{bounded, Receiver};

use crate::policy::Policy;

/// Runs a game from the very beginning: no piece held, no pieces played
/// yet. The bag state is derived from the first piece and the preview.
///
/// See [`resume_game`] for the streaming contract.
pub fn start_game(
    policy: Arc<dyn Policy>,
    initial: Field4x4,
    current: Piece,
    preview: &[Piece],
    input: Receiver<Piece>,
) -> Receiver<Option<State>> {
    let mut bag = current.piece_set();
    for &p in preview {
        bag = bag.add(p);
        if bag.len() == 7 {
            bag = PieceSet::default();
        }
    }
    resume_game(
        policy,
        State::with_field(initial),
        current,
        preview,
        bag,
        input,
    )
}

/// Drives a game from an arbitrary mid-game situation.
///
/// A worker thread consumes newly revealed pieces from `input` and emits
/// one decision per piece on the returned channel, strictly in input
/// order, plus one initial decision before the first piece is read. Once
/// the policy finds no continuation the driver emits `None` for every
/// subsequent piece without advancing; it never terminates on its own.
/// Closing `input` closes the output.
///
/// Panics (in the worker) on a piece the current bag state cannot
/// produce.
pub fn resume_game(
    policy: Arc<dyn Policy>,
    initial_state: State,
    current: Piece,
    preview: &[Piece],
    end_bag_used: PieceSet,
    input: Receiver<Piece>,
) -> Receiver<Option<State>> {
    let (tx, rx) = bounded(1);
    let mut preview = preview.to_vec();
    let mut current = current;
    let mut bag = end_bag_used;

    thread::spawn(move || {
        let mut state = policy.next_state(initial_state, current, &preview, bag);
        if tx.send(state).is_err() {
            return;
        }

        for piece in input {
            // Stuck: report and wait for the caller to give up.
            let Some(prev_state) = state else {
                if tx.send(None).is_err() {
                    return;
                }
                continue;
            };

            // Shift the queue.
            if preview.is_empty() {
                current = piece;
            } else {
                current = preview[0];
                preview.rotate_left(1);
                *preview.last_mut().expect("preview is non-empty") = piece;
            }

            // A full bag starts over before the new piece is added.
            if bag.len() == 7 {
                bag = PieceSet::default();
            }
            assert!(
                !bag.contains(piece),
                "impossible piece {piece} for bag state {bag}"
            );
            bag = bag.add(piece);

            state = policy.next_state(prev_state, current, &preview, bag);
            if tx.send(state).is_err() {
                return;
            }
        }
    });

    rx
}
