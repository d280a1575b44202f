//! A single attempted move, plus SAN/UCI/algebraic rendering (spec §4.D).

use std::fmt::Write as _;
use std::str::FromStr;

use thiserror::Error;

use crate::flags::{Flag, Flags};
use crate::piece::{Piece, PieceType};
use crate::square::{ParseSquareError, Square};
use crate::tables;

/// SAN tokens that mean "any legal move" during replay (spec §6).
pub const WILDCARD_MOVES: &[&str] = &["--", "*"];

fn is_wildcard_san(san: &str) -> bool {
    WILDCARD_MOVES.contains(&san)
}

/// Extra detail attached to a move, e.g. per-attacker lists when
/// [`crate::board::GenerateMovesOptions::detailed`] is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveDetail {
    pub attackers: Vec<Square>,
}

/// A single attempted move: origin, destination, pieces involved, and the
/// flags describing its character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub orig: Square,
    pub dest: Square,
    pub moved_piece: Piece,
    pub captured_piece: Option<Piece>,
    pub promotion_piece: Option<Piece>,
    pub flags: Flags,
    pub legal: Option<bool>,
    pub wildcard: bool,
    pub detail: Option<MoveDetail>,
    san: Option<String>,
    fen: Option<String>,
}

impl Move {
    /// Builds a move from its core fields, computing the algebraic and UCI
    /// strings are left to [`Self::algebraic`]/[`Self::uci`] (cheap to
    /// recompute on demand, unlike SAN which needs a board).
    pub fn new(
        orig: Square,
        dest: Square,
        moved_piece: Piece,
        captured_piece: Option<Piece>,
        promotion_piece: Option<Piece>,
        flags: Flags,
    ) -> Self {
        Self {
            orig,
            dest,
            moved_piece,
            captured_piece,
            promotion_piece,
            flags,
            legal: None,
            wildcard: false,
            detail: None,
            san: None,
            fen: None,
        }
    }

    pub fn wildcard() -> Self {
        let mut m = Self::new(
            Square::from_index(0),
            Square::from_index(0),
            Piece::pawn(crate::piece::Color::White),
            None,
            None,
            Flags::new(),
        );
        m.wildcard = true;
        m
    }

    fn is_capture(&self) -> bool {
        self.captured_piece.is_some() || self.flags.contains(Flag::EnPassant)
    }

    /// "e2-e4" style, "x" on capture, "=Q" suffix on promotion.
    pub fn algebraic(&self) -> String {
        let mut s = String::new();
        write!(s, "{}", self.orig).unwrap();
        s.push(if self.is_capture() { 'x' } else { '-' });
        write!(s, "{}", self.dest).unwrap();
        if let Some(promo) = self.promotion_piece {
            write!(s, "={}", promo.piece_type().as_uppercase_char()).unwrap();
        }
        s
    }

    /// `<from><to><promo?>`, lowercase throughout.
    pub fn uci(&self) -> String {
        let mut s = format!("{}{}", self.orig, self.dest);
        if let Some(promo) = self.promotion_piece {
            s.push(promo.piece_type().as_lowercase_char());
        }
        s
    }

    /// The cached SAN rendering, if [`Self::set_san`] has been called.
    pub fn san(&self) -> Option<&str> {
        self.san.as_deref()
    }

    pub fn set_san(&mut self, san: String) {
        self.san = Some(san);
    }

    pub fn fen(&self) -> Option<&str> {
        self.fen.as_deref()
    }

    pub fn set_fen(&mut self, fen: String) {
        self.fen = Some(fen);
    }

    /// Whether this move matches `san`, including wildcard tokens.
    pub fn matches_san(&self, san: &str) -> bool {
        if is_wildcard_san(san) {
            return true;
        }
        self.san.as_deref() == Some(san)
    }

    /// Whether this move's algebraic rendering matches `other`, or either is
    /// a wildcard.
    pub fn matches_algebraic(&self, other: &str) -> bool {
        if is_wildcard_san(other) {
            return true;
        }
        self.algebraic() == other
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("no legal move from {0} to {1}")]
    NoSuchMove(Square, String),
    #[error("ambiguous move for SAN '{0}'")]
    Ambiguous(String),
    #[error("'{0}' is not a legal move in this position")]
    IllegalSan(String),
    #[error(transparent)]
    InvalidSquare(#[from] ParseSquareError),
}

/// Parses a UCI move string (`e2e4`, `e7e8q`) into its components, without
/// consulting a board — promotion piece colour is resolved by the caller
/// once the mover's colour is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UciMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceType>,
}

impl std::fmt::Display for UciMove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promo) = self.promotion {
            f.write_char(promo.as_lowercase_char())?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseUciMoveError {
    #[error("expected 4 or 5 characters")]
    IncorrectLength,
    #[error("invalid square in '{0}'")]
    InvalidSquare(String),
    #[error("invalid promotion piece '{0}'")]
    InvalidPromotion(char),
}

impl FromStr for UciMove {
    type Err = ParseUciMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 4 && chars.len() != 5 {
            return Err(ParseUciMoveError::IncorrectLength);
        }

        let from_str: String = chars[0..2].iter().collect();
        let from = from_str
            .parse()
            .map_err(|_| ParseUciMoveError::InvalidSquare(from_str))?;

        let to_str: String = chars[2..4].iter().collect();
        let to = to_str
            .parse()
            .map_err(|_| ParseUciMoveError::InvalidSquare(to_str))?;

        let promotion = match chars.get(4) {
            Some(&c) => Some(match c {
                'n' => PieceType::Knight,
                'b' => PieceType::Bishop,
                'r' => PieceType::Rook,
                'q' => PieceType::Queen,
                other => return Err(ParseUciMoveError::InvalidPromotion(other)),
            }),
            None => None,
        };

        Ok(Self { from, to, promotion })
    }
}

/// One step a disambiguating SAN prefix can take.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Disambiguator {
    File(u8),
    Rank(u8),
    Square(Square),
}

impl std::fmt::Display for Disambiguator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disambiguator::File(file) => f.write_char((file + b'a') as char),
            Disambiguator::Rank(rank) => f.write_char((rank + b'1') as char),
            Disambiguator::Square(sq) => write!(f, "{sq}"),
        }
    }
}

/// Renders a move's SAN string given its already-determined disambiguator
/// and flags. Castling, pawn-capture-file-prefix, and check/mate suffixes
/// are all decided by the caller ([`crate::board::Board::to_san`]); this
/// just assembles the pieces (spec §4.D `toSan`).
pub(crate) fn render_san(
    mv: &Move,
    disambiguator: Option<Disambiguator>,
) -> String {
    if mv.flags.contains(Flag::KsideCastle) {
        return finish_san("O-O", mv);
    }
    if mv.flags.contains(Flag::QsideCastle) {
        return finish_san("O-O-O", mv);
    }

    let mut s = String::new();
    let piece_type = mv.moved_piece.piece_type();
    if piece_type != PieceType::Pawn {
        s.push(piece_type.as_uppercase_char());
    }

    if let Some(d) = disambiguator {
        write!(s, "{d}").unwrap();
    }

    if mv.is_capture() {
        s.push('x');
    }

    write!(s, "{}", mv.dest).unwrap();

    if let Some(promo) = mv.promotion_piece {
        write!(s, "={}", promo.piece_type().as_uppercase_char()).unwrap();
    }

    finish_san(&s, mv)
}

fn finish_san(base: &str, mv: &Move) -> String {
    let mut s = base.to_owned();
    if mv.flags.contains(Flag::Checkmate) {
        s.push('#');
    } else if mv.flags.contains(Flag::Check) {
        s.push('+');
    }
    s
}

/// `[straight, double-advance, left-capture, right-capture]` deltas for
/// `color`, re-exported from [`tables`] under the spec's naming.
pub fn pawn_offsets(color: crate::piece::Color) -> [i16; 4] {
    tables::pawn_offsets(color)
}

/// Ray deltas for non-pawn piece types, re-exported from [`tables`].
pub fn piece_offsets(piece_type: PieceType) -> &'static [i16] {
    tables::piece_offsets(piece_type)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::piece::Color;
    use pretty_assertions::assert_eq;

    #[test]
    fn algebraic_normal_move() {
        let m = Move::new(
            Square::E2,
            Square::E4,
            Piece::pawn(Color::White),
            None,
            None,
            Flags::new(),
        );
        assert_eq!(m.algebraic(), "e2-e4");
        assert_eq!(m.uci(), "e2e4");
    }

    #[test]
    fn algebraic_capture_and_promotion() {
        let mut flags = Flags::new();
        flags.add(Flag::Capture);
        flags.add(Flag::Promotion);
        let m = Move::new(
            Square::E7,
            Square::E8,
            Piece::pawn(Color::White),
            Some(Piece::rook(Color::Black)),
            Some(Piece::queen(Color::White)),
            flags,
        );
        assert_eq!(m.algebraic(), "e7xe8=Q");
        assert_eq!(m.uci(), "e7e8q");
    }

    #[test]
    fn wildcard_matches_any_san() {
        let m = Move::wildcard();
        assert!(m.matches_san("Qh4#"));
        assert!(m.matches_algebraic("e2-e4"));
    }

    #[test]
    fn uci_move_parses() {
        let uci: UciMove = "e7e8q".parse().unwrap();
        assert_eq!(uci.from, Square::E7);
        assert_eq!(uci.to, Square::E8);
        assert_eq!(uci.promotion, Some(PieceType::Queen));
        assert_eq!(uci.to_string(), "e7e8q");
    }

    #[test]
    fn uci_move_rejects_bad_length() {
        assert_eq!(
            "e2e".parse::<UciMove>(),
            Err(ParseUciMoveError::IncorrectLength)
        );
    }

    #[test]
    fn render_san_plain_knight_move() {
        let m = Move::new(
            Square::G1,
            Square::F3,
            Piece::knight(Color::White),
            None,
            None,
            Flags::new(),
        );
        assert_eq!(render_san(&m, None), "Nf3");
    }

    #[test]
    fn render_san_check_and_mate_suffixes() {
        let mut flags = Flags::new();
        flags.add(Flag::Check);
        let m = Move::new(
            Square::H4,
            Square::F2,
            Piece::queen(Color::Black),
            None,
            None,
            flags,
        );
        assert_eq!(render_san(&m, None), "Qf2+");

        let mut flags = Flags::new();
        flags.add(Flag::Checkmate);
        let m = Move::new(
            Square::H4,
            Square::F2,
            Piece::queen(Color::Black),
            None,
            None,
            flags,
        );
        assert_eq!(render_san(&m, None), "Qf2#");
    }

    #[test]
    fn render_san_castle() {
        let mut flags = Flags::new();
        flags.add(Flag::KsideCastle);
        let m = Move::new(
            Square::E1,
            Square::G1,
            Piece::king(Color::White),
            None,
            None,
            flags,
        );
        assert_eq!(render_san(&m, None), "O-O");
    }

    #[test]
    fn render_san_disambiguated_rook_move() {
        let m = Move::new(
            Square::A1,
            Square::A3,
            Piece::rook(Color::White),
            None,
            None,
            Flags::new(),
        );
        assert_eq!(render_san(&m, Some(Disambiguator::File(0))), "Raa3");
        assert_eq!(render_san(&m, Some(Disambiguator::Rank(0))), "R1a3");
        assert_eq!(
            render_san(&m, Some(Disambiguator::Square(Square::A1))),
            "Ra1a3"
        );
    }
}
