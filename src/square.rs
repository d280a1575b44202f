//! 0x88 board geometry (spec §3).
//!
//! Squares are indexed 0..127. The 64 playable squares have zero bits in
//! positions 3 and 7, i.e. `idx & 0x88 == 0`. File is `idx & 0x0F`, rank-row
//! is `idx >> 4`. Rank-row 0 is the 8th rank, so a8 = 0, h8 = 7, a1 = 112,
//! h1 = 119 — this makes off-board detection a single bit test and lets
//! attack/ray lookups be indexed by `from - to + 119`.

use std::fmt::{Debug, Display, Write};
use std::str::FromStr;

use paste::paste;
use seq_macro::seq;
use thiserror::Error;

/// A square on the 0x88 board, valid or not.
///
/// Most APIs that accept a `Square` only make sense for playable squares
/// (`is_valid()`); off-board values only arise transiently while stepping
/// along a ray or offset and are filtered out immediately.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    /// Constructs a square directly from its raw 0x88 index (0..127).
    pub const fn from_index(idx: u8) -> Self {
        Self(idx)
    }

    /// Constructs a square from an algebraic file (0=a..7=h) and rank
    /// (0=rank 1..7=rank 8).
    pub const fn new(file: u8, rank: u8) -> Option<Self> {
        if file >= 8 || rank >= 8 {
            None
        } else {
            Some(Self((7 - rank) * 16 + file))
        }
    }

    /// Raw 0x88 index.
    pub const fn index(self) -> u8 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 & 0x88 == 0
    }

    /// File, 0 (a) through 7 (h).
    pub const fn file(self) -> u8 {
        self.0 & 0x0F
    }

    /// Algebraic rank, 0 (rank 1) through 7 (rank 8).
    pub const fn rank(self) -> u8 {
        7 - (self.0 >> 4)
    }

    /// Internal rank-row used by the 0x88 index: 0 is the 8th rank.
    pub(crate) const fn row(self) -> u8 {
        self.0 >> 4
    }

    /// Adds a raw 0x88 delta. The result may be off-board; check
    /// [`Self::is_valid`] before using it as a real square.
    pub const fn offset(self, delta: i16) -> Square {
        Self(((self.0 as i16) + delta) as u8)
    }

    pub fn offset_checked(self, delta: i16) -> Option<Square> {
        let s = self.offset(delta);
        s.is_valid().then_some(s)
    }
}

impl Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_char((self.file() + b'a') as char)?;
        f.write_char((self.rank() + b'1') as char)
    }
}

impl Debug for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Square({self})")
    }
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[error("invalid square")]
pub struct ParseSquareError;

impl FromStr for Square {
    type Err = ParseSquareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let file = chars.next().ok_or(ParseSquareError)?;
        let rank = chars.next().ok_or(ParseSquareError)?;
        if chars.next().is_some() {
            return Err(ParseSquareError);
        }

        let file = (file as i32) - ('a' as i32);
        let rank = (rank as i32) - ('1' as i32);
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            Ok(Square::new(file as u8, rank as u8).unwrap())
        } else {
            Err(ParseSquareError)
        }
    }
}

/// Named square aliases, e.g. `Square::E4`.
#[allow(clippy::eq_op, clippy::char_lit_as_u8)]
impl Square {
    seq!(RANK in 1..=8 {
        seq!(FILE in 'A'..='H' {
            paste! {
                pub const [<FILE RANK>]: Square =
                    match Square::new(FILE as u8 - b'A', RANK - 1) {
                        Some(s) => s,
                        None => unreachable!(),
                    };
            }
        });
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn corner_indices_match_spec() {
        assert_eq!(Square::A8.index(), 0);
        assert_eq!(Square::H8.index(), 7);
        assert_eq!(Square::A1.index(), 112);
        assert_eq!(Square::H1.index(), 119);
    }

    #[test]
    fn off_board_bit_test() {
        for idx in 0..=127u8 {
            let sq = Square::from_index(idx);
            let expected = idx & 0x88 == 0;
            assert_eq!(sq.is_valid(), expected, "idx {idx:#x}");
        }
    }

    #[test]
    fn file_and_rank() {
        assert_eq!(Square::E4.file(), 4);
        assert_eq!(Square::E4.rank(), 3);
        assert_eq!(Square::A1.file(), 0);
        assert_eq!(Square::A1.rank(), 0);
    }

    #[test]
    fn display_and_parse_roundtrip() {
        for file in 0..8u8 {
            for rank in 0..8u8 {
                let sq = Square::new(file, rank).unwrap();
                let s = sq.to_string();
                assert_eq!(s.parse::<Square>(), Ok(sq));
            }
        }
    }

    #[test]
    fn parse_errors() {
        assert_eq!("".parse::<Square>(), Err(ParseSquareError));
        assert_eq!("i1".parse::<Square>(), Err(ParseSquareError));
        assert_eq!("a9".parse::<Square>(), Err(ParseSquareError));
        assert_eq!("a1a".parse::<Square>(), Err(ParseSquareError));
    }

    #[test]
    fn offset_can_go_off_board() {
        // a1 (index 112) moving "up" by one rank (delta -16) stays on board.
        assert_eq!(Square::A1.offset(-16), Square::A2);
        // a8 (index 0) moving up further goes off-board.
        assert!(!Square::A8.offset(-16).is_valid());
    }
}
