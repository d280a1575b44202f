//! Crate-wide error type aggregating every module's fallible constructors
//! (spec §7). Individual modules keep their own narrow `thiserror` enums
//! (`ParseSquareError`, `FenError`, `MoveError`, ...) for precise matching;
//! `ChessError` exists for callers who just want one type to propagate.

use thiserror::Error;

use crate::fen::FenError;
use crate::flags::FlagError;
use crate::game::GameError;
use crate::mv::{MoveError, ParseUciMoveError};
use crate::square::ParseSquareError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChessError {
    #[error(transparent)]
    Square(#[from] ParseSquareError),
    #[error(transparent)]
    Fen(#[from] FenError),
    #[error(transparent)]
    Flag(#[from] FlagError),
    #[error(transparent)]
    Move(#[from] MoveError),
    #[error(transparent)]
    UciMove(#[from] ParseUciMoveError),
    #[error(transparent)]
    Game(#[from] GameError),
}

pub type ChessResult<T> = Result<T, ChessError>;

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wraps_a_square_parse_error() {
        let err: ChessError = ParseSquareError.into();
        assert_eq!(err.to_string(), "invalid square");
    }

    #[test]
    fn wraps_a_game_error() {
        let err: ChessError = GameError::NoSuchMove("z9z9".to_owned()).into();
        assert!(err.to_string().contains("z9z9"));
    }
}
