//! Piece identity and colour (spec §4.A).

use std::fmt::{Debug, Display, Write};
use std::num::NonZeroU8;
use std::str::FromStr;

/// The type of a piece, independent of colour.
///
/// Assigned integers 1-6 so that `Option<PieceType>` can niche-optimise to a
/// single byte, mirroring the teacher's `Piece` packing trick.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PieceType {
    Pawn = 1,
    Knight = 2,
    Bishop = 3,
    Rook = 4,
    Queen = 5,
    King = 6,
}

impl PieceType {
    pub const ALL: [PieceType; 6] = [
        Self::Pawn,
        Self::Knight,
        Self::Bishop,
        Self::Rook,
        Self::Queen,
        Self::King,
    ];

    pub const fn white(self) -> Piece {
        Piece::new(Color::White, self)
    }

    pub const fn black(self) -> Piece {
        Piece::new(Color::Black, self)
    }

    pub const fn with_color(self, color: Color) -> Piece {
        Piece::new(color, self)
    }

    pub const fn as_uppercase_char(self) -> char {
        match self {
            PieceType::Pawn => 'P',
            PieceType::Knight => 'N',
            PieceType::Bishop => 'B',
            PieceType::Rook => 'R',
            PieceType::Queen => 'Q',
            PieceType::King => 'K',
        }
    }

    pub const fn as_lowercase_char(self) -> char {
        match self {
            PieceType::Pawn => 'p',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Rook => 'r',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
        }
    }

    pub const fn is_slider(self) -> bool {
        matches!(self, PieceType::Bishop | PieceType::Rook | PieceType::Queen)
    }

    /// Bit position into `tables::ATTACKS`/`SHIFTS`.
    pub const fn shift(self) -> u32 {
        match self {
            PieceType::Pawn => 0,
            PieceType::Knight => 1,
            PieceType::Bishop => 2,
            PieceType::Rook => 3,
            PieceType::Queen => 4,
            PieceType::King => 5,
        }
    }
}

/// A player in a chess game.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    #[default]
    White = 0,
    Black = 8,
}

impl Color {
    pub const fn is_white(self) -> bool {
        matches!(self, Color::White)
    }

    pub const fn is_black(self) -> bool {
        !self.is_white()
    }

    /// Inverts the colour.
    pub const fn swap(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

/// A piece on the board (or, as `Option<Piece>`, an empty square).
///
/// Internally a 4-bit packed `Color | PieceType`, carried in a `NonZeroU8` so
/// `Option<Piece>` is a single byte.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Piece(NonZeroU8);

impl Piece {
    pub const fn new(color: Color, piece_type: PieceType) -> Self {
        // Safety: piece_type as u8 is always in 1..=6, never 0.
        unsafe { Self(NonZeroU8::new_unchecked(color as u8 | piece_type as u8)) }
    }

    pub const fn pawn(color: Color) -> Self {
        Self::new(color, PieceType::Pawn)
    }

    pub const fn knight(color: Color) -> Self {
        Self::new(color, PieceType::Knight)
    }

    pub const fn bishop(color: Color) -> Self {
        Self::new(color, PieceType::Bishop)
    }

    pub const fn rook(color: Color) -> Self {
        Self::new(color, PieceType::Rook)
    }

    pub const fn queen(color: Color) -> Self {
        Self::new(color, PieceType::Queen)
    }

    pub const fn king(color: Color) -> Self {
        Self::new(color, PieceType::King)
    }

    pub const fn color(self) -> Color {
        if self.0.get() & 8 > 0 {
            Color::Black
        } else {
            Color::White
        }
    }

    pub const fn piece_type(self) -> PieceType {
        match self.0.get() & 0x07 {
            1 => PieceType::Pawn,
            2 => PieceType::Knight,
            3 => PieceType::Bishop,
            4 => PieceType::Rook,
            5 => PieceType::Queen,
            6 => PieceType::King,
            _ => unreachable!("invalid piece representation"),
        }
    }

    pub const fn is_pawn(self) -> bool {
        matches!(self.piece_type(), PieceType::Pawn)
    }

    pub const fn is_king(self) -> bool {
        matches!(self.piece_type(), PieceType::King)
    }

    pub const fn is_slider(self) -> bool {
        self.piece_type().is_slider()
    }

    pub const fn as_fen_char(self) -> char {
        if self.color().is_white() {
            self.piece_type().as_uppercase_char()
        } else {
            self.piece_type().as_lowercase_char()
        }
    }

    /// `forSymbol` from spec §4.A — the FEN symbol is case-sensitive on
    /// colour.
    pub const fn for_symbol(c: char) -> Option<Self> {
        let piece_type = match c {
            'P' | 'p' => PieceType::Pawn,
            'N' | 'n' => PieceType::Knight,
            'B' | 'b' => PieceType::Bishop,
            'R' | 'r' => PieceType::Rook,
            'Q' | 'q' => PieceType::Queen,
            'K' | 'k' => PieceType::King,
            _ => return None,
        };
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Some(Self::new(color, piece_type))
    }
}

/// The four promotion choices, in the order SAN disambiguation prefers them.
pub const WHITE_PROMO_PIECES: [Piece; 4] = [
    Piece::new(Color::White, PieceType::Queen),
    Piece::new(Color::White, PieceType::Rook),
    Piece::new(Color::White, PieceType::Bishop),
    Piece::new(Color::White, PieceType::Knight),
];

pub const BLACK_PROMO_PIECES: [Piece; 4] = [
    Piece::new(Color::Black, PieceType::Queen),
    Piece::new(Color::Black, PieceType::Rook),
    Piece::new(Color::Black, PieceType::Bishop),
    Piece::new(Color::Black, PieceType::Knight),
];

impl Debug for Piece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Piece")
            .field("color", &self.color())
            .field("piece_type", &self.piece_type())
            .finish()
    }
}

impl Display for Piece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_char(self.as_fen_char())
    }
}

impl FromStr for Piece {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Piece::for_symbol(c).ok_or(()),
            _ => Err(()),
        }
    }
}
