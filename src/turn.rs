//! A committed [`Move`] plus the pre-move snapshot needed to undo it or
//! branch alternate lines from it (spec §4.E).

use std::fmt;

use crate::flags::Flags;
use crate::mv::Move;
use crate::piece::Color;
use crate::square::Square;

/// An opaque annotation attached to a [`Turn`] when a comment is supplied.
/// Kept abstract (spec §6) so callers can attach whatever PGN-comment or
/// NAG representation their own layer uses; the core never inspects it.
pub trait Annotation: fmt::Debug + Send + Sync {}

impl<T: fmt::Debug + Send + Sync> Annotation for T {}

/// Returns the current wall-clock time in milliseconds, for
/// [`TurnMeta::move_time`]. The core never reads the system clock itself —
/// callers inject an implementation (e.g. backed by `SystemTime`) so move
/// timing stays a collaborator, not a hidden dependency.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Optional metadata recorded alongside a committed move.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnMeta {
    pub move_time: Option<u64>,
    pub move_time_delta: Option<u64>,
    pub comment: Option<String>,
    pub puzzle_solution: bool,
}

/// The board-state snapshot taken immediately before a move is committed,
/// sufficient to restore the board exactly (spec §4.F `commitUndoMoves`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSnapshot {
    pub castling_rights: [Flags; 2],
    pub king_pos: [Option<Square>; 2],
    pub turn: Color,
    pub en_passant_sqr: Option<Square>,
    pub turn_num: u32,
    pub ply_num: u32,
    pub half_move_count: u32,
}

/// A committed move plus everything needed to undo it or grow alternate
/// lines from it.
///
/// `variations` holds the IDs of child [`crate::board::Board`]s within the
/// owning [`crate::game::Game`]'s flat variation list (spec §9: stable
/// integer IDs rather than owning references, to avoid reference cycles
/// between parent and child boards).
#[derive(Debug)]
pub struct Turn {
    pub the_move: Move,
    pub snapshot: TurnSnapshot,
    pub id: String,
    pub annotation: Option<Box<dyn Annotation>>,
    pub meta: Option<TurnMeta>,
    pub variations: Vec<usize>,
}

impl Turn {
    pub fn new(the_move: Move, snapshot: TurnSnapshot, prior_uci: Option<&str>) -> Self {
        let id = turn_id(snapshot.ply_num, prior_uci, &the_move.uci());
        Self {
            the_move,
            snapshot,
            id,
            annotation: None,
            meta: None,
            variations: Vec::new(),
        }
    }
}

/// Builds the deterministic ID described in spec §4.E: the ply number
/// concatenated with the prior move's UCI and this move's UCI, so two
/// different histories that reach the same ply with the same prior move
/// share identity.
fn turn_id(ply_num: u32, prior_uci: Option<&str>, this_uci: &str) -> String {
    format!("{ply_num}:{}:{this_uci}", prior_uci.unwrap_or(""))
}
