//! 0x88 move generator, mutable board-state machine, and variation tree for
//! a chess game library.
//!
//! [`board::Board`] owns one line of play: pieces, castling rights, en
//! passant, turn history, move generation and commit/undo. [`game::Game`]
//! wraps a tree of `Board`s so alternate variations and continuations can
//! branch off any point in that history without disturbing it.

pub mod error;
pub mod fen;
pub mod flags;
pub mod game;
pub mod mv;
pub mod piece;
pub mod square;
pub mod tables;
pub mod turn;

pub mod board;

mod logging;

pub mod test_utils;

pub use board::{Board, GenerateMovesOptions};
pub use error::{ChessError, ChessResult};
pub use fen::Fen;
pub use flags::{Flag, Flags};
pub use game::{Game, GameConfig, GameError, MakeMoveOptions};
pub use mv::Move;
pub use piece::{Color, Piece, PieceType};
pub use square::Square;
pub use turn::Turn;
