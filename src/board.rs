//! The mutable board-state machine: piece array, castling rights, king
//! positions, en passant, turn history, move generation, commit/undo, and
//! end-state classification (spec §4.F).

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::fen::{Fen, STARTING_FEN};
use crate::flags::{Flag, Flags};
use crate::mv::{render_san, Disambiguator, Move};
use crate::piece::{Color, Piece, PieceType};
use crate::square::Square;
use crate::tables;
use crate::turn::{Turn, TurnMeta, TurnSnapshot};

fn color_idx(color: Color) -> usize {
    if color.is_white() {
        0
    } else {
        1
    }
}

/// Options controlling [`Board::generate_moves`] (spec §4.F).
#[derive(Debug, Clone, Default)]
pub struct GenerateMovesOptions {
    pub only_for_square: Option<Square>,
    pub only_legal: bool,
    pub include_san: bool,
    pub include_fen: bool,
    pub detailed: bool,
    pub skip_checkmate: bool,
}

/// Options controlling [`Board::to_fen`].
#[derive(Debug, Clone, Copy)]
pub struct ToFenOptions {
    pub meta: bool,
}

impl Default for ToFenOptions {
    fn default() -> Self {
        Self { meta: true }
    }
}

/// Options controlling [`Board::validate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOptions {
    pub fix_minor: bool,
    pub ignore_turn: bool,
}

/// The outcome of [`Board::validate`]: a list of human-readable issues,
/// empty when the position is sound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardValidation {
    pub issues: Vec<String>,
}

impl BoardValidation {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Who (if anyone) a terminal position favours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    WhiteWins,
    BlackWins,
    Draw,
}

/// The classification of a terminal position (spec §4.F `endResult`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndResult {
    pub outcome: Outcome,
    pub header: &'static str,
}

/// Whether a square is attacked, or (when requested) which squares attack
/// it (spec §4.F `isAttacked`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttackQuery {
    Attacked(bool),
    Attackers(Vec<Square>),
}

/// The mutable state machine described by spec §3/§4.F.
///
/// `history`/`selected_turn_index`/`id`/`parent_board`/
/// `parent_branch_turn_index` are `pub(crate)`: [`crate::game::Game`] owns
/// the flat list of all `Board`s in a tree and needs to read and splice
/// these directly when branching variations/continuations (spec §9 —
/// parent/child links are stable integer IDs into that list, not owning
/// references, so there is a single owner and no reference cycle).
#[derive(Debug)]
pub struct Board {
    squares: [Option<Piece>; 128],
    castling_rights: [Flags; 2],
    king_pos: [Option<Square>; 2],
    en_passant_sqr: Option<Square>,
    turn: Color,
    half_move_count: u32,
    ply_num: u32,
    turn_num: u32,

    pub(crate) history: Vec<Turn>,
    pub(crate) selected_turn_index: i64,
    pos_count: HashMap<String, u32>,

    pub(crate) id: usize,
    pub(crate) parent_board: Option<usize>,
    pub(crate) parent_branch_turn_index: Option<i64>,
    pub(crate) continuation: bool,
    is_mock: bool,

    /// Whether the 50-move/threefold draw rules apply, backed by the
    /// owning Game's `GameConfig.use_strict_rules` (SPEC_FULL.md §2); a
    /// standalone Board defaults to strict.
    strict_rules: bool,

    move_cache: Option<Vec<Move>>,
}

impl Board {
    pub fn new() -> Self {
        let mut starting_rights = Flags::new();
        starting_rights.add(Flag::KsideCastle);
        starting_rights.add(Flag::QsideCastle);

        Self {
            squares: [None; 128],
            castling_rights: [starting_rights, starting_rights],
            king_pos: [None, None],
            en_passant_sqr: None,
            turn: Color::White,
            half_move_count: 0,
            ply_num: 0,
            turn_num: 1,
            history: Vec::new(),
            selected_turn_index: -1,
            pos_count: HashMap::new(),
            id: 0,
            parent_board: None,
            parent_branch_turn_index: None,
            continuation: false,
            is_mock: false,
            strict_rules: true,
            move_cache: None,
        }
    }

    pub fn from_fen(fen: &str) -> Option<Self> {
        let mut board = Self::new();
        if board.load_fen(fen) {
            Some(board)
        } else {
            None
        }
    }

    pub fn starting_position() -> Self {
        Self::from_fen(STARTING_FEN).expect("starting FEN is always valid")
    }

    pub fn set_strict_rules(&mut self, strict: bool) {
        self.strict_rules = strict;
    }

    pub fn is_mock(&self) -> bool {
        self.is_mock
    }

    pub fn turn(&self) -> Color {
        self.turn
    }

    pub fn en_passant_sqr(&self) -> Option<Square> {
        self.en_passant_sqr
    }

    pub fn king_pos(&self, color: Color) -> Option<Square> {
        self.king_pos[color_idx(color)]
    }

    pub fn castling_rights(&self, color: Color) -> Flags {
        self.castling_rights[color_idx(color)]
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.squares[sq.index() as usize]
    }

    pub fn half_move_count(&self) -> u32 {
        self.half_move_count
    }

    pub fn turn_num(&self) -> u32 {
        self.turn_num
    }

    pub fn ply_num(&self) -> u32 {
        self.ply_num
    }

    pub fn selected_turn_index(&self) -> i64 {
        self.selected_turn_index
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// The turn currently selected, if any (`selected_turn_index != -1`).
    pub fn selected_turn(&self) -> Option<&Turn> {
        usize::try_from(self.selected_turn_index)
            .ok()
            .and_then(|i| self.history.get(i))
    }

    pub fn place_piece(&mut self, sq: Square, piece: Piece) {
        if piece.is_king() {
            self.king_pos[color_idx(piece.color())] = Some(sq);
        }
        self.squares[sq.index() as usize] = Some(piece);
        self.move_cache = None;
    }

    pub fn remove_piece(&mut self, sq: Square) -> Option<Piece> {
        let removed = self.squares[sq.index() as usize].take();
        if let Some(p) = removed {
            if p.is_king() && self.king_pos[color_idx(p.color())] == Some(sq) {
                self.king_pos[color_idx(p.color())] = None;
            }
        }
        self.move_cache = None;
        removed
    }

    /// Parses and loads `fen`. On failure, logs and returns `false` without
    /// mutating the board (spec §4.F `loadFen`).
    pub fn load_fen(&mut self, fen: &str) -> bool {
        let parsed = match Fen::new(fen).parse() {
            Ok(p) => p,
            Err(e) => {
                crate::logging::warn_precondition(format!("failed to load FEN '{fen}': {e}"));
                return false;
            }
        };

        self.squares = parsed.squares;
        self.history.clear();
        self.selected_turn_index = -1;
        self.pos_count.clear();
        self.move_cache = None;
        self.king_pos = [None, None];

        for (idx, sq) in self.squares.iter().enumerate() {
            if let Some(p) = sq {
                if p.is_king() {
                    self.king_pos[color_idx(p.color())] = Some(Square::from_index(idx as u8));
                }
            }
        }

        self.turn = parsed.turn;
        self.castling_rights = [parsed.white_castling, parsed.black_castling];
        self.en_passant_sqr = parsed.en_passant;
        self.half_move_count = parsed.halfmove_clock;
        self.turn_num = parsed.turn_number;
        self.ply_num = 2 * (self.turn_num - 1) + if self.turn.is_black() { 1 } else { 0 };

        let key = self.position_fen();
        self.pos_count.insert(key, 1);

        true
    }

    fn placement_field(&self) -> String {
        let mut s = String::new();
        for row in 0..8u8 {
            let mut empty_run = 0u32;
            for file in 0..8u8 {
                let idx = row * 16 + file;
                match self.squares[idx as usize] {
                    Some(p) => {
                        if empty_run > 0 {
                            write!(s, "{empty_run}").unwrap();
                            empty_run = 0;
                        }
                        s.push(p.as_fen_char());
                    }
                    None => empty_run += 1,
                }
            }
            if empty_run > 0 {
                write!(s, "{empty_run}").unwrap();
            }
            if row != 7 {
                s.push('/');
            }
        }
        s
    }

    fn castling_field(&self) -> String {
        let mut s = String::new();
        if self.castling_rights[0].contains(Flag::KsideCastle) {
            s.push('K');
        }
        if self.castling_rights[0].contains(Flag::QsideCastle) {
            s.push('Q');
        }
        if self.castling_rights[1].contains(Flag::KsideCastle) {
            s.push('k');
        }
        if self.castling_rights[1].contains(Flag::QsideCastle) {
            s.push('q');
        }
        if s.is_empty() {
            s.push('-');
        }
        s
    }

    /// The first four FEN fields, used as the repetition-counting key
    /// (spec §6 "position-FEN").
    pub fn position_fen(&self) -> String {
        let ep = match self.en_passant_sqr {
            Some(sq) => sq.to_string(),
            None => "-".to_owned(),
        };
        format!(
            "{} {} {} {}",
            self.placement_field(),
            if self.turn.is_white() { "w" } else { "b" },
            self.castling_field(),
            ep
        )
    }

    pub fn to_fen(&self, options: ToFenOptions) -> String {
        let placement = self.placement_field();
        if !options.meta {
            return placement;
        }
        let ep = match self.en_passant_sqr {
            Some(sq) => sq.to_string(),
            None => "-".to_owned(),
        };
        format!(
            "{} {} {} {} {} {}",
            placement,
            if self.turn.is_white() { "w" } else { "b" },
            self.castling_field(),
            ep,
            self.half_move_count,
            self.turn_num
        )
    }

    // ---- move generation -------------------------------------------------

    pub fn generate_moves(&mut self, options: &GenerateMovesOptions) -> Vec<Move> {
        let cache_applicable =
            options.only_for_square.is_none() && !options.include_fen && !options.detailed;

        if cache_applicable {
            if self.move_cache.is_none() {
                let base = GenerateMovesOptions {
                    include_san: true,
                    ..Default::default()
                };
                let fresh = self.generate_moves_raw(&base);
                self.move_cache = Some(fresh);
            }
            let mut result = self.move_cache.clone().unwrap_or_default();
            if options.only_legal {
                result.retain(|m| m.legal == Some(true));
            }
            return result;
        }

        self.generate_moves_raw(options)
    }

    fn generate_moves_raw(&mut self, options: &GenerateMovesOptions) -> Vec<Move> {
        let mut moves = self.generate_pseudo_legal(options);
        for mv in moves.iter_mut() {
            self.annotate_legality(mv, options);
        }
        if options.only_legal {
            moves.retain(|m| m.legal == Some(true));
        }
        if options.include_san {
            for mv in moves.iter_mut() {
                let san = self.to_san(mv);
                mv.set_san(san);
            }
        }
        if options.include_fen {
            for mv in moves.iter_mut() {
                let mut clone_board = self.clone_position();
                clone_board.commit_move(mv, false);
                let fen = clone_board.to_fen(ToFenOptions::default());
                mv.set_fen(fen);
            }
        }
        moves
    }

    fn generate_pseudo_legal(&self, options: &GenerateMovesOptions) -> Vec<Move> {
        let active = self.turn;
        let mut moves = Vec::new();

        for idx in 0u8..128 {
            let sq = Square::from_index(idx);
            if !sq.is_valid() {
                continue;
            }
            if let Some(only) = options.only_for_square {
                if sq != only {
                    continue;
                }
            }
            let Some(piece) = self.squares[idx as usize] else {
                continue;
            };
            if piece.color() != active {
                continue;
            }

            match piece.piece_type() {
                PieceType::Pawn => self.generate_pawn_moves(sq, piece, &mut moves),
                PieceType::Knight | PieceType::King => {
                    self.generate_stepping_moves(sq, piece, &mut moves)
                }
                _ => self.generate_sliding_moves(sq, piece, &mut moves),
            }

            if piece.is_king() {
                self.generate_castling_moves(sq, piece, &mut moves);
            }
        }

        moves
    }

    fn push_pawn_move(
        &self,
        orig: Square,
        dest: Square,
        piece: Piece,
        captured: Option<Piece>,
        flags: Flags,
        promo_rank: u8,
        moves: &mut Vec<Move>,
    ) {
        if dest.rank() == promo_rank {
            let promos = if piece.color().is_white() {
                &crate::piece::WHITE_PROMO_PIECES[..]
            } else {
                &crate::piece::BLACK_PROMO_PIECES[..]
            };
            for &promo in promos {
                let mut f = flags;
                f.add(Flag::Promotion);
                moves.push(Move::new(orig, dest, piece, captured, Some(promo), f));
            }
        } else {
            moves.push(Move::new(orig, dest, piece, captured, None, flags));
        }
    }

    fn generate_pawn_moves(&self, orig: Square, piece: Piece, moves: &mut Vec<Move>) {
        let color = piece.color();
        let offsets = tables::pawn_offsets(color);
        let promo_rank = if color.is_white() { 7 } else { 0 };
        let start_rank = if color.is_white() { 1 } else { 6 };

        let single = orig.offset(offsets[0]);
        if single.is_valid() {
            let single_empty = self.squares[single.index() as usize].is_none();
            let mut single_flags = Flags::new();
            single_flags.add(if single_empty {
                Flag::Normal
            } else {
                Flag::MoveBlocked
            });
            self.push_pawn_move(orig, single, piece, None, single_flags, promo_rank, moves);

            if orig.rank() == start_rank {
                let double = orig.offset(offsets[1]);
                if double.is_valid() {
                    let double_empty = self.squares[double.index() as usize].is_none();
                    let mut double_flags = Flags::new();
                    if single_empty && double_empty {
                        double_flags.add(Flag::DoubleAdvance);
                    } else {
                        double_flags.add(Flag::MoveBlocked);
                    }
                    moves.push(Move::new(orig, double, piece, None, None, double_flags));
                }
            }
        }

        for &cap_offset in &offsets[2..4] {
            let target = orig.offset(cap_offset);
            if !target.is_valid() {
                continue;
            }
            if let Some(occ) = self.squares[target.index() as usize] {
                if occ.color() != color {
                    let mut flags = Flags::new();
                    flags.add(Flag::Capture);
                    self.push_pawn_move(orig, target, piece, Some(occ), flags, promo_rank, moves);
                }
            } else if Some(target) == self.en_passant_sqr {
                let captured_sq = Square::new(target.file(), orig.rank());
                let captured = captured_sq.and_then(|s| self.squares[s.index() as usize]);
                let mut flags = Flags::new();
                flags.add(Flag::EnPassant);
                moves.push(Move::new(orig, target, piece, captured, None, flags));
            }
        }
    }

    fn generate_stepping_moves(&self, orig: Square, piece: Piece, moves: &mut Vec<Move>) {
        for &offset in tables::piece_offsets(piece.piece_type()) {
            let dest = orig.offset(offset);
            if !dest.is_valid() {
                continue;
            }
            let mut flags = Flags::new();
            match self.squares[dest.index() as usize] {
                None => {
                    flags.add(Flag::Normal);
                    moves.push(Move::new(orig, dest, piece, None, None, flags));
                }
                Some(occ) if occ.color() != piece.color() => {
                    flags.add(Flag::Capture);
                    moves.push(Move::new(orig, dest, piece, Some(occ), None, flags));
                }
                Some(_) => {
                    flags.add(Flag::MoveBlocked);
                    moves.push(Move::new(orig, dest, piece, None, None, flags));
                }
            }
        }
    }

    fn generate_sliding_moves(&self, orig: Square, piece: Piece, moves: &mut Vec<Move>) {
        for &offset in tables::piece_offsets(piece.piece_type()) {
            let mut blocked = false;
            let mut dest = orig.offset(offset);
            while dest.is_valid() {
                let mut flags = Flags::new();
                match self.squares[dest.index() as usize] {
                    None => {
                        flags.add(if blocked { Flag::MoveBlocked } else { Flag::Normal });
                        moves.push(Move::new(orig, dest, piece, None, None, flags));
                    }
                    Some(occ) => {
                        if !blocked && occ.color() != piece.color() {
                            flags.add(Flag::Capture);
                            moves.push(Move::new(orig, dest, piece, Some(occ), None, flags));
                        } else {
                            flags.add(Flag::MoveBlocked);
                            moves.push(Move::new(orig, dest, piece, None, None, flags));
                        }
                        blocked = true;
                    }
                }
                dest = dest.offset(offset);
            }
        }
    }

    fn generate_castling_moves(&self, orig: Square, piece: Piece, moves: &mut Vec<Move>) {
        let color = piece.color();
        let opponent = color.swap();
        let rights = self.castling_rights[color_idx(color)];

        if rights.contains(Flag::KsideCastle) {
            let transit = orig.offset(1);
            let dest = orig.offset(2);
            let f_empty = self.squares[transit.index() as usize].is_none();
            let g_empty = self.squares[dest.index() as usize].is_none();

            let mut flags = Flags::new();
            flags.add(Flag::KsideCastle);
            if !f_empty || !g_empty {
                flags.add(Flag::MoveBlocked);
            } else if Self::squares_attacked(&self.squares, opponent, orig)
                || Self::squares_attacked(&self.squares, opponent, transit)
                || Self::squares_attacked(&self.squares, opponent, dest)
            {
                flags.add(Flag::MoveIllegal);
            }
            moves.push(Move::new(orig, dest, piece, None, None, flags));
        }

        if rights.contains(Flag::QsideCastle) {
            let transit = orig.offset(-1);
            let dest = orig.offset(-2);
            let knight_sq = orig.offset(-3);
            let b_empty = self.squares[knight_sq.index() as usize].is_none();
            let c_empty = self.squares[dest.index() as usize].is_none();
            let d_empty = self.squares[transit.index() as usize].is_none();

            let mut flags = Flags::new();
            flags.add(Flag::QsideCastle);
            if !b_empty || !c_empty || !d_empty {
                flags.add(Flag::MoveBlocked);
            } else if Self::squares_attacked(&self.squares, opponent, orig)
                || Self::squares_attacked(&self.squares, opponent, transit)
                || Self::squares_attacked(&self.squares, opponent, dest)
            {
                flags.add(Flag::MoveIllegal);
            }
            moves.push(Move::new(orig, dest, piece, None, None, flags));
        }
    }

    fn annotate_legality(&self, mv: &mut Move, options: &GenerateMovesOptions) {
        if mv.flags.contains(Flag::MoveBlocked) || mv.flags.contains(Flag::MoveIllegal) {
            mv.legal = Some(false);
            return;
        }

        let mover = mv.moved_piece.color();
        let opponent = mover.swap();

        let mut sim_squares = self.squares;
        let mut sim_king_pos = self.king_pos;
        Self::apply_move_squares(&mut sim_squares, &mut sim_king_pos, mv);

        let mover_king = sim_king_pos[color_idx(mover)];
        let illegal = mover_king
            .map(|k| Self::squares_attacked(&sim_squares, opponent, k))
            .unwrap_or(false);

        if illegal {
            mv.flags.add(Flag::Pinned);
            mv.legal = Some(false);
        } else {
            mv.legal = Some(true);
        }

        if let Some(opp_king) = sim_king_pos[color_idx(opponent)] {
            if Self::squares_attacked(&sim_squares, mover, opp_king) {
                mv.flags.add(Flag::Check);
                if !options.skip_checkmate {
                    let mut reply_board = self.clone_position();
                    reply_board.squares = sim_squares;
                    reply_board.king_pos = sim_king_pos;
                    reply_board.turn = opponent;
                    reply_board.move_cache = None;
                    let replies = reply_board.generate_moves(&GenerateMovesOptions {
                        only_legal: true,
                        skip_checkmate: true,
                        ..Default::default()
                    });
                    if replies.is_empty() {
                        mv.flags.add(Flag::Checkmate);
                    }
                }
            }
        }
    }

    /// A throwaway copy sharing only the live-position fields, used for
    /// hypothetical "what happens after this move" evaluation. Never
    /// registered with a Game and, per invariant 8, bounded to a single
    /// nesting level: it is only ever asked to re-run legality checks with
    /// `skip_checkmate: true`, so it never spawns a further reply board of
    /// its own.
    fn clone_position(&self) -> Board {
        Board {
            squares: self.squares,
            castling_rights: self.castling_rights,
            king_pos: self.king_pos,
            en_passant_sqr: self.en_passant_sqr,
            turn: self.turn,
            half_move_count: self.half_move_count,
            ply_num: self.ply_num,
            turn_num: self.turn_num,
            history: Vec::new(),
            selected_turn_index: -1,
            pos_count: HashMap::new(),
            id: usize::MAX,
            parent_board: None,
            parent_branch_turn_index: None,
            continuation: false,
            is_mock: true,
            strict_rules: self.strict_rules,
            move_cache: None,
        }
    }

    fn apply_move_squares(
        squares: &mut [Option<Piece>; 128],
        king_pos: &mut [Option<Square>; 2],
        mv: &Move,
    ) -> Option<Piece> {
        let mover_color = mv.moved_piece.color();
        let mut removed = mv.captured_piece;

        squares[mv.orig.index() as usize] = None;

        if mv.flags.contains(Flag::EnPassant) {
            if let Some(captured_sq) = Square::new(mv.dest.file(), mv.orig.rank()) {
                removed = squares[captured_sq.index() as usize].take();
            }
            squares[mv.dest.index() as usize] = Some(mv.moved_piece);
        } else if let Some(promo) = mv.promotion_piece {
            squares[mv.dest.index() as usize] = Some(promo);
        } else {
            squares[mv.dest.index() as usize] = Some(mv.moved_piece);
        }

        if mv.moved_piece.is_king() {
            king_pos[color_idx(mover_color)] = Some(mv.dest);
            if mv.flags.contains(Flag::KsideCastle) {
                let rook_from = mv.dest.offset(1);
                let rook_to = mv.dest.offset(-1);
                let rook = squares[rook_from.index() as usize].take();
                squares[rook_to.index() as usize] = rook;
            } else if mv.flags.contains(Flag::QsideCastle) {
                let rook_from = mv.dest.offset(-2);
                let rook_to = mv.dest.offset(1);
                let rook = squares[rook_from.index() as usize].take();
                squares[rook_to.index() as usize] = rook;
            }
        }

        removed
    }

    fn undo_move_squares(squares: &mut [Option<Piece>; 128], mv: &Move) {
        squares[mv.orig.index() as usize] = Some(mv.moved_piece);

        if mv.flags.contains(Flag::EnPassant) {
            squares[mv.dest.index() as usize] = None;
            if let Some(captured_sq) = Square::new(mv.dest.file(), mv.orig.rank()) {
                squares[captured_sq.index() as usize] = mv.captured_piece;
            }
        } else {
            squares[mv.dest.index() as usize] = mv.captured_piece;
        }

        if mv.moved_piece.is_king() {
            if mv.flags.contains(Flag::KsideCastle) {
                let rook_from = mv.dest.offset(1);
                let rook_to = mv.dest.offset(-1);
                let rook = squares[rook_to.index() as usize].take();
                squares[rook_from.index() as usize] = rook;
            } else if mv.flags.contains(Flag::QsideCastle) {
                let rook_from = mv.dest.offset(-2);
                let rook_to = mv.dest.offset(1);
                let rook = squares[rook_to.index() as usize].take();
                squares[rook_from.index() as usize] = rook;
            }
        }
    }

    fn castling_side_for_corner(color: Color, square: Square) -> Option<Flag> {
        if color.is_white() && square == Square::H1 {
            Some(Flag::KsideCastle)
        } else if color.is_white() && square == Square::A1 {
            Some(Flag::QsideCastle)
        } else if color.is_black() && square == Square::H8 {
            Some(Flag::KsideCastle)
        } else if color.is_black() && square == Square::A8 {
            Some(Flag::QsideCastle)
        } else {
            None
        }
    }

    // ---- attacks -----------------------------------------------------

    pub fn is_attacked(&self, attacker: Color, square: Square, detailed: bool) -> AttackQuery {
        if detailed {
            AttackQuery::Attackers(Self::attackers_of(&self.squares, attacker, square))
        } else {
            AttackQuery::Attacked(Self::squares_attacked(&self.squares, attacker, square))
        }
    }

    fn squares_attacked(squares: &[Option<Piece>; 128], attacker: Color, target: Square) -> bool {
        !Self::attackers_of(squares, attacker, target).is_empty()
    }

    fn attackers_of(
        squares: &[Option<Piece>; 128],
        attacker: Color,
        target: Square,
    ) -> Vec<Square> {
        let mut result = Vec::new();

        for idx in 0u8..128 {
            let from = Square::from_index(idx);
            if !from.is_valid() {
                continue;
            }
            let Some(piece) = squares[idx as usize] else {
                continue;
            };
            if piece.color() != attacker {
                continue;
            }

            let delta = from.index() as i16 - target.index() as i16;
            let mask = tables::attacks(delta);
            let shift_bit = 1u32 << piece.piece_type().shift();
            if mask & shift_bit == 0 {
                continue;
            }

            match piece.piece_type() {
                PieceType::Pawn => {
                    let valid_delta = if attacker.is_white() {
                        delta == 17 || delta == 15
                    } else {
                        delta == -17 || delta == -15
                    };
                    if !valid_delta {
                        continue;
                    }
                }
                PieceType::Knight | PieceType::King => {}
                _ => {
                    let step = tables::ray_step(delta);
                    let mut pos = target.offset(step);
                    let mut blocked = false;
                    while pos != from {
                        if squares[pos.index() as usize].is_some() {
                            blocked = true;
                            break;
                        }
                        pos = pos.offset(step);
                    }
                    if blocked {
                        continue;
                    }
                }
            }

            result.push(from);
        }

        result
    }

    // ---- commit / undo / navigation -----------------------------------

    /// Applies `mv` to the live state (spec §4.F `commitMove`). Returns the
    /// piece actually removed from the board (by capture or en passant), if
    /// any.
    pub fn commit_move(&mut self, mv: &Move, update_pos_count: bool) -> Option<Piece> {
        let mover_color = mv.moved_piece.color();
        let removed = Self::apply_move_squares(&mut self.squares, &mut self.king_pos, mv);

        if mv.moved_piece.is_king() {
            self.castling_rights[color_idx(mover_color)].clear();
        }
        if mv.moved_piece.piece_type() == PieceType::Rook {
            if let Some(side) = Self::castling_side_for_corner(mover_color, mv.orig) {
                let _ = self.castling_rights[color_idx(mover_color)].remove(side, true);
            }
        }
        let opponent = mover_color.swap();
        if let Some(side) = Self::castling_side_for_corner(opponent, mv.dest) {
            let _ = self.castling_rights[color_idx(opponent)].remove(side, true);
        }

        if mv.flags.contains(Flag::DoubleAdvance) {
            let step = tables::pawn_offsets(mover_color)[0];
            self.en_passant_sqr = Some(mv.orig.offset(step));
        } else {
            self.en_passant_sqr = None;
        }

        self.turn = opponent;
        self.ply_num += 1;
        self.turn_num = self.ply_num / 2 + 1;
        self.move_cache = None;

        let irreversible = mv.moved_piece.is_pawn() || removed.is_some();
        if irreversible {
            self.half_move_count = 0;
            if update_pos_count {
                self.pos_count.clear();
            }
        } else {
            self.half_move_count += 1;
        }
        if update_pos_count {
            let key = self.position_fen();
            *self.pos_count.entry(key).or_insert(0) += 1;
        }

        removed
    }

    /// Reverts the `n` most recently committed turns (spec §4.F
    /// `commitUndoMoves`): restores the scalar state from the earliest of
    /// those turns' pre-move snapshot, then undoes board squares newest
    /// first. Does not touch `pos_count`.
    pub fn commit_undo_moves(&mut self, n: usize) -> bool {
        if n == 0 {
            return true;
        }
        if self.selected_turn_index + 1 < n as i64 {
            crate::logging::warn_precondition(format!(
                "cannot undo {n} turns: only {} available",
                self.selected_turn_index + 1
            ));
            return false;
        }

        let end = self.selected_turn_index as usize;
        let start = end + 1 - n;

        let snapshot = self.history[start].snapshot.clone();
        self.castling_rights = snapshot.castling_rights;
        self.king_pos = snapshot.king_pos;
        self.turn = snapshot.turn;
        self.en_passant_sqr = snapshot.en_passant_sqr;
        self.turn_num = snapshot.turn_num;
        self.ply_num = snapshot.ply_num;
        self.half_move_count = snapshot.half_move_count;

        for i in (start..=end).rev() {
            let mv = self.history[i].the_move.clone();
            Self::undo_move_squares(&mut self.squares, &mv);
        }

        self.selected_turn_index = start as i64 - 1;
        self.move_cache = None;
        true
    }

    /// Navigates to `index` by committing/undoing one turn at a time from
    /// the current selection (spec §4.F `selectTurn`). Does not touch
    /// `pos_count` — navigation is not history mutation.
    pub fn select_turn(&mut self, index: i64) -> bool {
        if index < -1 || index >= self.history.len() as i64 {
            return false;
        }
        while self.selected_turn_index < index {
            let next_idx = (self.selected_turn_index + 1) as usize;
            let mv = self.history[next_idx].the_move.clone();
            self.commit_move(&mv, false);
            self.selected_turn_index = next_idx as i64;
        }
        while self.selected_turn_index > index {
            self.commit_undo_moves(1);
        }
        true
    }

    /// Commits a brand-new move at the end of history: snapshots the
    /// pre-move state, applies it, and appends the resulting [`Turn`].
    /// Truncates any turns beyond the current selection first. Returns the
    /// new turn's index.
    pub fn commit_new_turn(
        &mut self,
        mv: Move,
        update_pos_count: bool,
        meta: Option<TurnMeta>,
    ) -> usize {
        let snapshot = TurnSnapshot {
            castling_rights: self.castling_rights,
            king_pos: self.king_pos,
            turn: self.turn,
            en_passant_sqr: self.en_passant_sqr,
            turn_num: self.turn_num,
            ply_num: self.ply_num,
            half_move_count: self.half_move_count,
        };
        let prior_uci = self
            .history
            .get(self.selected_turn_index.max(-1) as usize)
            .filter(|_| self.selected_turn_index >= 0)
            .map(|t| t.the_move.uci());

        self.history.truncate((self.selected_turn_index + 1) as usize);
        self.commit_move(&mv, update_pos_count);

        let mut turn = Turn::new(mv, snapshot, prior_uci.as_deref());
        turn.meta = meta;
        self.history.push(turn);
        self.selected_turn_index += 1;
        self.history.len() - 1
    }

    /// Deep-copies this board's live position into a fresh child with
    /// empty history (spec §4.F `branchFromParent`). If `continuation` is
    /// false, the single most-recently-selected turn is undone on the copy
    /// first, so a new move can replace it.
    pub fn branch(&self, continuation: bool) -> Board {
        let mut squares = self.squares;
        let mut castling_rights = self.castling_rights;
        let mut king_pos = self.king_pos;
        let mut en_passant_sqr = self.en_passant_sqr;
        let mut turn = self.turn;
        let mut half_move_count = self.half_move_count;
        let mut ply_num = self.ply_num;
        let mut turn_num = self.turn_num;

        if !continuation && self.selected_turn_index >= 0 {
            let idx = self.selected_turn_index as usize;
            let snapshot = &self.history[idx].snapshot;
            castling_rights = snapshot.castling_rights;
            king_pos = snapshot.king_pos;
            turn = snapshot.turn;
            en_passant_sqr = snapshot.en_passant_sqr;
            turn_num = snapshot.turn_num;
            ply_num = snapshot.ply_num;
            half_move_count = snapshot.half_move_count;
            Self::undo_move_squares(&mut squares, &self.history[idx].the_move);
        }

        let mut child = Board {
            squares,
            castling_rights,
            king_pos,
            en_passant_sqr,
            turn,
            half_move_count,
            ply_num,
            turn_num,
            history: Vec::new(),
            selected_turn_index: -1,
            pos_count: HashMap::new(),
            id: 0,
            parent_board: None,
            parent_branch_turn_index: None,
            continuation,
            is_mock: false,
            strict_rules: self.strict_rules,
            move_cache: None,
        };
        let key = child.position_fen();
        child.pos_count.insert(key, 1);
        child
    }

    // ---- SAN -----------------------------------------------------------

    fn disambiguator_for(&mut self, mv: &Move) -> Option<Disambiguator> {
        let legal = self.generate_moves(&GenerateMovesOptions {
            only_legal: true,
            ..Default::default()
        });

        let mut same_file = false;
        let mut same_rank = false;
        let mut ambiguous = false;
        for other in &legal {
            if other.moved_piece == mv.moved_piece && other.orig != mv.orig && other.dest == mv.dest
            {
                ambiguous = true;
                if other.orig.file() == mv.orig.file() {
                    same_file = true;
                }
                if other.orig.rank() == mv.orig.rank() {
                    same_rank = true;
                }
            }
        }

        if !ambiguous {
            None
        } else if !same_file {
            Some(Disambiguator::File(mv.orig.file()))
        } else if !same_rank {
            Some(Disambiguator::Rank(mv.orig.rank()))
        } else {
            Some(Disambiguator::Square(mv.orig))
        }
    }

    /// For pawns, the origin file letter on a capture/en-passant, else
    /// empty; for other pieces, the minimal SAN disambiguator needed among
    /// currently-legal moves (spec §4.F `disambiguateMove`).
    pub fn disambiguate_move(&mut self, mv: &Move) -> String {
        if mv.moved_piece.is_pawn() {
            if mv.captured_piece.is_some() || mv.flags.contains(Flag::EnPassant) {
                return ((b'a' + mv.orig.file()) as char).to_string();
            }
            return String::new();
        }
        self.disambiguator_for(mv)
            .map(|d| d.to_string())
            .unwrap_or_default()
    }

    pub fn to_san(&mut self, mv: &Move) -> String {
        let disambiguator = if mv.moved_piece.is_pawn() || mv.flags.contains(Flag::KsideCastle) || mv.flags.contains(Flag::QsideCastle) {
            None
        } else {
            self.disambiguator_for(mv)
        };
        render_san(mv, disambiguator)
    }

    // ---- end-state classification ---------------------------------------

    /// True iff the position has insufficient material to force checkmate
    /// (spec §4.F).
    pub fn has_insufficient_material(&self) -> bool {
        let pieces: Vec<Piece> = self.squares.iter().flatten().copied().collect();
        if pieces.len() == 2 {
            return true;
        }
        if pieces.len() == 3 {
            return pieces
                .iter()
                .find(|p| !p.is_king())
                .map(|p| matches!(p.piece_type(), PieceType::Bishop | PieceType::Knight))
                .unwrap_or(false);
        }

        let has_non_bishop = pieces
            .iter()
            .any(|p| !p.is_king() && p.piece_type() != PieceType::Bishop);
        if has_non_bishop {
            return false;
        }

        let bishop_squares: Vec<Square> = self
            .squares
            .iter()
            .enumerate()
            .filter_map(|(idx, sq)| {
                sq.filter(|p| p.piece_type() == PieceType::Bishop)
                    .map(|_| Square::from_index(idx as u8))
            })
            .collect();
        if bishop_squares.is_empty() {
            return false;
        }

        let sum: i32 = bishop_squares
            .iter()
            .map(|sq| ((sq.file() + sq.rank()) % 2) as i32)
            .sum();
        sum == 0 || sum == bishop_squares.len() as i32
    }

    /// Classifies the terminal state of the current position, in priority
    /// order (spec §4.F `endResult`): checkmate, stalemate, insufficient
    /// material, 75-move rule, 50-move rule (strict only), fivefold
    /// repetition, threefold repetition (strict only).
    pub fn end_result(&mut self) -> Option<EndResult> {
        let legal = self.generate_moves(&GenerateMovesOptions {
            only_legal: true,
            ..Default::default()
        });

        if legal.is_empty() {
            let king = self.king_pos[color_idx(self.turn)];
            let in_check = king
                .map(|k| Self::squares_attacked(&self.squares, self.turn.swap(), k))
                .unwrap_or(false);
            return Some(if in_check {
                let winner = self.turn.swap();
                EndResult {
                    outcome: if winner.is_white() {
                        Outcome::WhiteWins
                    } else {
                        Outcome::BlackWins
                    },
                    header: if winner.is_white() { "1-0" } else { "0-1" },
                }
            } else {
                EndResult {
                    outcome: Outcome::Draw,
                    header: "1/2-1/2",
                }
            });
        }

        let draw = EndResult {
            outcome: Outcome::Draw,
            header: "1/2-1/2",
        };

        if self.has_insufficient_material() {
            return Some(draw);
        }
        if self.half_move_count >= 150 {
            return Some(draw);
        }
        if self.strict_rules && self.half_move_count >= 100 {
            return Some(draw);
        }
        let current_count = self.pos_count.get(&self.position_fen()).copied().unwrap_or(0);
        if current_count >= 5 {
            return Some(draw);
        }
        if self.strict_rules && current_count >= 3 {
            return Some(draw);
        }

        None
    }

    // ---- validation -------------------------------------------------

    pub fn validate(&mut self, options: ValidateOptions) -> BoardValidation {
        let mut issues = Vec::new();
        let mut counts = [[0u32; 6]; 2];
        for piece in self.squares.iter().flatten() {
            counts[color_idx(piece.color())][piece.piece_type() as usize - 1] += 1;
        }

        for color in [Color::White, Color::Black] {
            let ci = color_idx(color);
            let pawns = counts[ci][PieceType::Pawn as usize - 1];
            let kings = counts[ci][PieceType::King as usize - 1];
            let total: u32 = counts[ci].iter().sum();

            if kings == 0 {
                issues.push(format!("{color:?} has no king"));
            }
            if kings > 1 {
                issues.push(format!("{color:?} has more than one king"));
            }
            if pawns > 8 {
                issues.push(format!("{color:?} has more than 8 pawns"));
            }
            if total > 16 {
                issues.push(format!("{color:?} has more than 16 pieces"));
            }
            if let Some(king_sq) = self.king_pos[ci] {
                let matches = self.squares[king_sq.index() as usize]
                    .map(|p| p.is_king() && p.color() == color)
                    .unwrap_or(false);
                if !matches {
                    issues.push(format!("{color:?} kingPos does not match squares"));
                }
            }

            let (qside_corner, kside_corner) = if color.is_white() {
                (Square::A1, Square::H1)
            } else {
                (Square::A8, Square::H8)
            };
            let king_home = if color.is_white() { Square::E1 } else { Square::E8 };
            let king_home_ok = self.squares[king_home.index() as usize]
                == Some(Piece::king(color));

            if self.castling_rights[ci].contains(Flag::QsideCastle) {
                let rook_ok = self.squares[qside_corner.index() as usize] == Some(Piece::rook(color));
                if !rook_ok || !king_home_ok {
                    issues.push(format!("{color:?} queenside castling right is inconsistent"));
                    if options.fix_minor {
                        let _ = self.castling_rights[ci].remove(Flag::QsideCastle, true);
                    }
                }
            }
            if self.castling_rights[ci].contains(Flag::KsideCastle) {
                let rook_ok = self.squares[kside_corner.index() as usize] == Some(Piece::rook(color));
                if !rook_ok || !king_home_ok {
                    issues.push(format!("{color:?} kingside castling right is inconsistent"));
                    if options.fix_minor {
                        let _ = self.castling_rights[ci].remove(Flag::KsideCastle, true);
                    }
                }
            }
        }

        let white_in_check = self.king_pos[0]
            .map(|k| Self::squares_attacked(&self.squares, Color::Black, k))
            .unwrap_or(false);
        let black_in_check = self.king_pos[1]
            .map(|k| Self::squares_attacked(&self.squares, Color::White, k))
            .unwrap_or(false);
        if white_in_check && black_in_check {
            issues.push("both kings are simultaneously in check".to_owned());
        }
        if !options.ignore_turn {
            let non_mover_in_check = if self.turn.is_white() {
                black_in_check
            } else {
                white_in_check
            };
            if non_mover_in_check {
                issues.push("the side not to move is in check".to_owned());
            }
        }

        BoardValidation { issues }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::assert_in_any_order;
    use pretty_assertions::assert_eq;

    #[test]
    fn starting_position_has_twenty_legal_moves() {
        let mut board = Board::starting_position();
        let moves = board.generate_moves(&GenerateMovesOptions {
            only_legal: true,
            ..Default::default()
        });
        assert_eq!(moves.len(), 20);
    }

    #[test]
    fn e4_updates_fen_with_en_passant_square() {
        let mut board = Board::starting_position();
        let moves = board.generate_moves(&GenerateMovesOptions {
            only_legal: true,
            include_san: true,
            ..Default::default()
        });
        let e4 = moves
            .iter()
            .find(|m| m.san() == Some("e4"))
            .expect("e4 should be a legal opening move")
            .clone();
        board.commit_new_turn(e4, true, None);
        assert_eq!(
            board.to_fen(ToFenOptions::default()),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
    }

    #[test]
    fn commit_then_undo_is_identity() {
        let mut board = Board::starting_position();
        let before = (
            board.squares,
            board.castling_rights,
            board.king_pos,
            board.en_passant_sqr,
            board.turn,
            board.half_move_count,
            board.ply_num,
            board.turn_num,
        );

        let moves = board.generate_moves(&GenerateMovesOptions {
            only_legal: true,
            ..Default::default()
        });
        let mv = moves.into_iter().next().unwrap();
        board.commit_new_turn(mv, true, None);
        board.commit_undo_moves(1);

        let after = (
            board.squares,
            board.castling_rights,
            board.king_pos,
            board.en_passant_sqr,
            board.turn,
            board.half_move_count,
            board.ply_num,
            board.turn_num,
        );
        assert_eq!(before, after);
    }

    #[test]
    fn fools_mate_ends_in_checkmate() {
        let mut board = Board::starting_position();
        for san in ["f3", "e5", "g4", "Qh4#"] {
            let moves = board.generate_moves(&GenerateMovesOptions {
                only_legal: true,
                include_san: true,
                ..Default::default()
            });
            let mv = moves
                .into_iter()
                .find(|m| m.san() == Some(san))
                .unwrap_or_else(|| panic!("expected {san} to be legal"));
            board.commit_new_turn(mv, true, None);
        }

        let result = board.end_result().expect("game should have ended");
        assert_eq!(result.header, "0-1");
        assert_eq!(result.outcome, Outcome::BlackWins);
        assert_eq!(
            board.selected_turn().unwrap().the_move.san(),
            Some("Qh4#")
        );
    }

    #[test]
    fn lone_kings_have_insufficient_material() {
        let board = Board::from_fen("8/8/8/8/8/8/8/k6K w - - 0 1").unwrap();
        assert!(board.has_insufficient_material());
    }

    #[test]
    fn king_move_clears_both_castling_rights() {
        let mut board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let moves = board.generate_moves(&GenerateMovesOptions {
            only_legal: true,
            include_san: true,
            ..Default::default()
        });
        assert!(moves.iter().any(|m| m.san() == Some("O-O")));
        assert!(moves.iter().any(|m| m.san() == Some("O-O-O")));

        let ke2 = moves
            .into_iter()
            .find(|m| m.orig == Square::E1 && m.dest == Square::E2)
            .expect("Ke2 should be legal");
        board.commit_new_turn(ke2, true, None);
        assert_eq!(board.to_fen(ToFenOptions::default()).split(' ').nth(2), Some("kq"));
    }

    #[test]
    fn en_passant_capture_removes_the_passed_pawn() {
        let mut board = Board::starting_position();
        for (orig, dest) in [
            (Square::E2, Square::E4),
            (Square::D7, Square::D5),
            (Square::E4, Square::E5),
            (Square::F7, Square::F5),
        ] {
            let moves = board.generate_moves(&GenerateMovesOptions {
                only_legal: true,
                ..Default::default()
            });
            let mv = moves
                .into_iter()
                .find(|m| m.orig == orig && m.dest == dest)
                .unwrap();
            board.commit_new_turn(mv, true, None);
        }

        let moves = board.generate_moves(&GenerateMovesOptions {
            only_legal: true,
            ..Default::default()
        });
        let exf6 = moves
            .into_iter()
            .find(|m| m.flags.contains(Flag::EnPassant))
            .expect("en passant capture should be legal");
        board.commit_new_turn(exf6, true, None);

        assert_eq!(board.piece_at(Square::F5), None);
        assert_eq!(board.piece_at(Square::F6), Some(Piece::pawn(Color::White)));
        assert_eq!(board.half_move_count(), 0);
    }

    #[test]
    fn detailed_attack_query_lists_both_knight_attackers() {
        let board = Board::from_fen("k7/8/3N4/8/8/8/5N2/7K w - - 0 1").unwrap();
        let query = board.is_attacked(Color::White, Square::E4, true);
        match query {
            AttackQuery::Attackers(attackers) => {
                assert_in_any_order(attackers, [Square::D6, Square::F2]);
            }
            AttackQuery::Attacked(_) => panic!("expected a detailed attacker list"),
        }
    }

    #[test]
    fn branch_undoes_exactly_the_selected_turn() {
        let mut board = Board::starting_position();
        let moves = board.generate_moves(&GenerateMovesOptions {
            only_legal: true,
            ..Default::default()
        });
        let e4 = moves
            .into_iter()
            .find(|m| m.orig == Square::E2 && m.dest == Square::E4)
            .unwrap();
        board.commit_new_turn(e4, true, None);

        let child = board.branch(false);
        assert_eq!(child.turn(), Color::White);
        assert_eq!(child.piece_at(Square::E2), Some(Piece::pawn(Color::White)));
        assert_eq!(child.piece_at(Square::E4), None);
    }
}
