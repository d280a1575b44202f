//! FEN codec: parse/serialise/validate/invert (spec §4.C, §6).

use thiserror::Error;

use crate::flags::Flag;
use crate::flags::Flags;
use crate::piece::{Color, Piece};
use crate::square::Square;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
pub const EMPTY_BOARD_FEN: &str = "8/8/8/8/8/8/8/8";

/// Which movement rules a FEN is validated against. Only `Traditional` is
/// implemented (spec §1 Non-goals): the validator still exposes the
/// selector so a future variant ruleset has somewhere to plug in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rules {
    #[default]
    Traditional,
}

/// The result of [`Fen::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenValidationResult {
    pub is_valid: bool,
    pub error_code: Option<u8>,
    pub error_message: String,
}

impl FenValidationResult {
    fn ok() -> Self {
        Self {
            is_valid: true,
            error_code: None,
            error_message: String::new(),
        }
    }

    fn err(code: u8, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error_code: Some(code),
            error_message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid FEN ({code}): {message}")]
pub struct FenError {
    pub code: u8,
    pub message: String,
}

/// A FEN string, along with parsing/serialising/validating behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fen(pub String);

impl Default for Fen {
    fn default() -> Self {
        Self(STARTING_FEN.to_owned())
    }
}

impl Fen {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reverses the piece-placement field character-by-character (not
    /// colour-by-colour) — callers use this for board flipping.
    pub fn invert(&self) -> Self {
        let mut fields = self.0.splitn(2, ' ');
        let placement = fields.next().unwrap_or_default();
        let rest = fields.next();

        let inverted_placement: String = placement.chars().rev().collect();

        match rest {
            Some(rest) => Self(format!("{inverted_placement} {rest}")),
            None => Self(inverted_placement),
        }
    }

    /// Validates this FEN, returning a structured result with a numeric
    /// error code and message on failure.
    ///
    /// If `only_position` is true, only the piece-placement field is
    /// required/validated (fields 2-6 are not inspected). `rules` selects
    /// the piece-count ruleset (only [`Rules::Traditional`] is specified).
    pub fn validate(&self, only_position: bool, rules: Rules) -> FenValidationResult {
        if !only_position && self.0 == STARTING_FEN {
            return FenValidationResult::ok();
        }

        let tokens: Vec<&str> = self.0.split_whitespace().collect();
        let expected_fields = if only_position { 1 } else { 6 };
        if tokens.len() != expected_fields {
            let msg = if only_position {
                "a FEN position field must be a single token"
            } else {
                "a FEN record must have 6 space-separated fields"
            };
            return FenValidationResult::err(1, msg);
        }

        let rows: Vec<&str> = tokens[0].split('/').collect();
        if rows.len() != 8 {
            return FenValidationResult::err(2, "piece placement must have 8 ranks");
        }

        let mut white_pieces = 0u32;
        let mut black_pieces = 0u32;
        let mut white_pawns = 0u32;
        let mut black_pawns = 0u32;
        let mut white_kings = 0u32;
        let mut black_kings = 0u32;

        for row in &rows {
            let mut file_count = 0u32;
            let mut prev_was_digit = false;
            for c in row.chars() {
                if c.is_ascii_digit() {
                    if prev_was_digit {
                        return FenValidationResult::err(
                            3,
                            "empty-square digits may not be adjacent",
                        );
                    }
                    file_count += c.to_digit(10).unwrap();
                    prev_was_digit = true;
                } else {
                    if !"PRNBQKprnbqk".contains(c) {
                        return FenValidationResult::err(4, format!("invalid piece letter '{c}'"));
                    }
                    prev_was_digit = false;
                    file_count += 1;

                    let piece = Piece::for_symbol(c).unwrap();
                    match piece.color() {
                        Color::White => white_pieces += 1,
                        Color::Black => black_pieces += 1,
                    }
                    if piece.is_pawn() {
                        match piece.color() {
                            Color::White => white_pawns += 1,
                            Color::Black => black_pawns += 1,
                        }
                    }
                    if piece.is_king() {
                        match piece.color() {
                            Color::White => white_kings += 1,
                            Color::Black => black_kings += 1,
                        }
                    }
                }
            }
            if file_count != 8 {
                return FenValidationResult::err(5, "each rank must total 8 files");
            }
        }

        if let Rules::Traditional = rules {
            if white_pieces > 16 {
                return FenValidationResult::err(11, "white has more than 16 pieces");
            }
            if black_pieces > 16 {
                return FenValidationResult::err(12, "black has more than 16 pieces");
            }
            if white_pawns > 8 {
                return FenValidationResult::err(13, "white has more than 8 pawns");
            }
            if black_pawns > 8 {
                return FenValidationResult::err(14, "black has more than 8 pawns");
            }
            if white_kings != 1 {
                return FenValidationResult::err(15, "white must have exactly one king");
            }
            if black_kings != 1 {
                return FenValidationResult::err(16, "black must have exactly one king");
            }
        }

        if only_position {
            return FenValidationResult::ok();
        }

        let side_to_move = tokens[1];
        if side_to_move != "w" && side_to_move != "b" {
            return FenValidationResult::err(10, "side to move must be 'w' or 'b'");
        }

        let fullmove = tokens[5];
        if fullmove.parse::<u32>().map(|n| n < 1).unwrap_or(true) {
            return FenValidationResult::err(6, "full-move number must be a positive integer");
        }

        let halfmove = tokens[4];
        if halfmove.parse::<u32>().is_err() {
            return FenValidationResult::err(7, "half-move clock must be a non-negative integer");
        }

        let en_passant = tokens[3];
        if en_passant != "-" {
            let expected_rank = if side_to_move == "w" { '6' } else { '3' };
            let mut chars = en_passant.chars();
            let valid = match (chars.next(), chars.next(), chars.next()) {
                (Some(file), Some(rank), None) => ('a'..='h').contains(&file) && rank == expected_rank,
                _ => false,
            };
            if !valid {
                return FenValidationResult::err(8, "invalid en passant target square");
            }
        }

        let castling = tokens[2];
        if !castling_field_is_valid(castling) {
            return FenValidationResult::err(9, "invalid castling availability field");
        }

        FenValidationResult::ok()
    }

    /// Parses this FEN into board-ready components. Fails with the same
    /// numeric error the corresponding [`Self::validate`] call would
    /// produce.
    pub fn parse(&self) -> Result<ParsedFen, FenError> {
        let result = self.validate(false, Rules::Traditional);
        if !result.is_valid {
            return Err(FenError {
                code: result.error_code.unwrap_or(0),
                message: result.error_message,
            });
        }

        let tokens: Vec<&str> = self.0.split_whitespace().collect();
        let rows: Vec<&str> = tokens[0].split('/').collect();

        let mut squares = [None; 128];
        for (row_idx, row) in rows.iter().enumerate() {
            let mut file = 0u8;
            for c in row.chars() {
                if let Some(digit) = c.to_digit(10) {
                    file += digit as u8;
                } else {
                    let piece = Piece::for_symbol(c).unwrap();
                    let square = Square::new(file, 7 - row_idx as u8).unwrap();
                    squares[square.index() as usize] = Some(piece);
                    file += 1;
                }
            }
        }

        let turn = if tokens[1] == "w" { Color::White } else { Color::Black };

        let mut white_castling = Flags::new();
        let mut black_castling = Flags::new();
        for c in tokens[2].chars() {
            match c {
                'K' => white_castling.add(Flag::KsideCastle),
                'Q' => white_castling.add(Flag::QsideCastle),
                'k' => black_castling.add(Flag::KsideCastle),
                'q' => black_castling.add(Flag::QsideCastle),
                '-' => {}
                _ => unreachable!("validated castling field"),
            }
        }

        let en_passant = if tokens[3] == "-" {
            None
        } else {
            Some(tokens[3].parse::<Square>().expect("validated en passant field"))
        };

        let halfmove_clock: u32 = tokens[4].parse().expect("validated half-move field");
        let turn_number: u32 = tokens[5].parse().expect("validated full-move field");

        Ok(ParsedFen {
            squares,
            turn,
            white_castling,
            black_castling,
            en_passant,
            halfmove_clock,
            turn_number,
        })
    }
}

impl std::fmt::Display for Fen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The pieces of a FEN string broken out into board-ready components, as
/// produced by [`Fen::parse`].
#[derive(Debug, Clone)]
pub struct ParsedFen {
    pub squares: [Option<Piece>; 128],
    pub turn: Color,
    pub white_castling: Flags,
    pub black_castling: Flags,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub turn_number: u32,
}

fn castling_field_is_valid(field: &str) -> bool {
    if field == "-" {
        return true;
    }
    // KQ?k?q? | Qk?q? | kq? | q
    let mut chars = field.chars().peekable();
    if chars.peek() == Some(&'K') {
        chars.next();
    } else {
        return castling_tail_is_valid(field, false);
    }
    if chars.peek() == Some(&'Q') {
        chars.next();
    }
    castling_tail_from(chars)
}

fn castling_tail_is_valid(field: &str, _had_k: bool) -> bool {
    let mut chars = field.chars().peekable();
    if chars.peek() == Some(&'Q') {
        chars.next();
        return castling_tail_from(chars);
    }
    castling_tail_from(chars)
}

fn castling_tail_from(mut chars: std::iter::Peekable<std::str::Chars>) -> bool {
    if chars.peek() == Some(&'k') {
        chars.next();
    }
    if chars.peek() == Some(&'q') {
        chars.next();
    }
    chars.next().is_none()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_starting_fen_is_valid() {
        let fen = Fen::default();
        assert!(fen.validate(false, Rules::Traditional).is_valid);
    }

    #[test]
    fn empty_board_is_valid_position_only() {
        let fen = Fen::new(EMPTY_BOARD_FEN);
        // Not a full 6-field FEN, and has no kings, so fails both checks.
        assert!(!fen.validate(false, Rules::Traditional).is_valid);
    }

    #[test]
    fn wrong_field_count_is_error_1() {
        let fen = Fen::new("8/8/8/8/8/8/8/8 w KQkq -");
        let result = fen.validate(false, Rules::Traditional);
        assert_eq!(result.error_code, Some(1));
    }

    #[test]
    fn wrong_row_count_is_error_2() {
        let fen = Fen::new("8/8/8/8/8/8/8 w - - 0 1");
        assert_eq!(fen.validate(false, Rules::Traditional).error_code, Some(2));
    }

    #[test]
    fn adjacent_digits_is_error_3() {
        let fen = Fen::new("44/8/8/8/8/8/8/8 w - - 0 1");
        assert_eq!(fen.validate(false, Rules::Traditional).error_code, Some(3));
    }

    #[test]
    fn invalid_letter_is_error_4() {
        let fen = Fen::new("xxxxxxxx/8/8/8/8/8/8/8 w - - 0 1");
        assert_eq!(fen.validate(false, Rules::Traditional).error_code, Some(4));
    }

    #[test]
    fn row_not_summing_to_8_is_error_5() {
        let fen = Fen::new("7/8/8/8/8/8/8/8 w - - 0 1");
        assert_eq!(fen.validate(false, Rules::Traditional).error_code, Some(5));
    }

    #[test]
    fn missing_king_is_error_15_or_16() {
        let fen = Fen::new("8/8/8/8/8/8/8/8 w - - 0 1");
        let code = fen.validate(false, Rules::Traditional).error_code;
        assert!(code == Some(15) || code == Some(16));
    }

    #[test]
    fn bad_side_to_move_is_error_10() {
        let fen = Fen::new("k6K/8/8/8/8/8/8/8 x - - 0 1");
        assert_eq!(fen.validate(false, Rules::Traditional).error_code, Some(10));
    }

    #[test]
    fn bad_en_passant_square_is_error_8() {
        let fen = Fen::new("k6K/8/8/8/8/8/8/8 w - e4 0 1");
        assert_eq!(fen.validate(false, Rules::Traditional).error_code, Some(8));
    }

    #[test]
    fn en_passant_rank_must_match_side_to_move() {
        let fen = Fen::new("k6K/8/8/8/8/8/8/8 b - e6 0 1");
        assert_eq!(fen.validate(false, Rules::Traditional).error_code, Some(8));
        let fen = Fen::new("k6K/8/8/8/8/8/8/8 b - e3 0 1");
        assert!(fen.validate(false, Rules::Traditional).is_valid);
    }

    #[test]
    fn bad_castling_field_is_error_9() {
        let fen = Fen::new("k6K/8/8/8/8/8/8/8 w qk - 0 1");
        assert_eq!(fen.validate(false, Rules::Traditional).error_code, Some(9));
    }

    #[test]
    fn castling_field_accepts_all_valid_combinations() {
        for field in ["-", "K", "Q", "k", "q", "KQ", "Kk", "Kq", "KQkq", "Qk", "Qkq", "kq"] {
            assert!(castling_field_is_valid(field), "{field} should be valid");
        }
    }

    #[test]
    fn invert_reverses_placement_only() {
        let fen = Fen::new("8/8/8/8/4P3/8/8/8 w - - 0 1");
        let inverted = fen.invert();
        assert_eq!(inverted.0, "8/8/8/3P4/8/8/8/8 w - - 0 1");
    }

    #[test]
    fn parse_starting_position() {
        let parsed = Fen::default().parse().unwrap();
        assert_eq!(parsed.turn, Color::White);
        assert_eq!(parsed.squares[Square::E1.index() as usize], Some(Piece::king(Color::White)));
        assert_eq!(parsed.squares[Square::E8.index() as usize], Some(Piece::king(Color::Black)));
        assert!(parsed.white_castling.contains(Flag::KsideCastle));
        assert!(parsed.white_castling.contains(Flag::QsideCastle));
        assert_eq!(parsed.en_passant, None);
        assert_eq!(parsed.halfmove_clock, 0);
        assert_eq!(parsed.turn_number, 1);
    }

    #[test]
    fn parse_rejects_invalid_fen() {
        assert!(Fen::new("not a fen").parse().is_err());
    }
}
