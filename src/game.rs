//! Orchestrates a tree of [`Board`]s: the active line plus every variation
//! and continuation branching off it (spec §4.G).
//!
//! A [`Board`] only knows its own state and the integer IDs of its
//! children; `Game` is the single owner of the flat list those IDs index
//! into, which is what keeps branching acyclic (spec §9).

use thiserror::Error;

use crate::board::{AttackQuery, Board, EndResult, GenerateMovesOptions, ToFenOptions};
use crate::mv::Move;
use crate::piece::{Color, Piece};
use crate::square::Square;
use crate::turn::TurnMeta;

/// Configuration shared by every [`Board`] in a game's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    pub use_strict_rules: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            use_strict_rules: true,
        }
    }
}

/// Options for [`Game::make_move`]/[`Game::enter_continuation`].
#[derive(Debug, Clone, Default)]
pub struct MakeMoveOptions {
    pub comment: Option<String>,
    pub move_time: Option<u64>,
}

fn make_meta(options: &MakeMoveOptions) -> Option<TurnMeta> {
    if options.comment.is_some() || options.move_time.is_some() {
        Some(TurnMeta {
            move_time: options.move_time,
            comment: options.comment.clone(),
            ..Default::default()
        })
    } else {
        None
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("no legal move matches '{0}' in the current position")]
    NoSuchMove(String),
}

enum MoveClass {
    /// Identical to the turn already recorded immediately after the
    /// current selection; just navigate forward onto it.
    Existing,
    /// Matches a previously recorded sibling board at this point.
    Variation(usize),
    Continuation(usize),
    /// Nothing follows the current selection yet; commit straight onto it.
    AppendNew,
    /// Doesn't match the turn already recorded after the current selection,
    /// or any known sibling of it; branches a new variation that replaces it.
    DivergesFromNext,
}

/// Owns every [`Board`] reachable from the game's root, addressed by
/// stable index rather than by reference (spec §9).
#[derive(Debug)]
pub struct Game {
    config: GameConfig,
    boards: Vec<Board>,
    current: usize,
    root_variations: Vec<usize>,
}

impl Game {
    pub fn new() -> Self {
        Self::with_config(GameConfig::default())
    }

    pub fn with_config(config: GameConfig) -> Self {
        let mut board = Board::starting_position();
        board.set_strict_rules(config.use_strict_rules);
        Self {
            config,
            boards: vec![board],
            current: 0,
            root_variations: Vec::new(),
        }
    }

    pub fn config(&self) -> GameConfig {
        self.config
    }

    /// Resets the game to a single root board parsed from `fen`. Logs and
    /// returns `false` on a malformed FEN, leaving the game untouched.
    pub fn load_fen(&mut self, fen: &str) -> bool {
        let Some(mut board) = Board::from_fen(fen) else {
            return false;
        };
        board.set_strict_rules(self.config.use_strict_rules);
        self.boards = vec![board];
        self.current = 0;
        self.root_variations.clear();
        true
    }

    pub fn board(&self) -> &Board {
        &self.boards[self.current]
    }

    fn board_mut(&mut self) -> &mut Board {
        &mut self.boards[self.current]
    }

    pub fn generate_moves(&mut self, options: &GenerateMovesOptions) -> Vec<Move> {
        self.board_mut().generate_moves(options)
    }

    pub fn is_attacked(&self, attacker: Color, square: Square, detailed: bool) -> AttackQuery {
        self.board().is_attacked(attacker, square, detailed)
    }

    pub fn end_result(&mut self) -> Option<EndResult> {
        self.board_mut().end_result()
    }

    pub fn has_insufficient_material(&self) -> bool {
        self.board().has_insufficient_material()
    }

    pub fn to_fen(&self, options: ToFenOptions) -> String {
        self.board().to_fen(options)
    }

    pub fn to_san(&mut self, mv: &Move) -> String {
        self.board_mut().to_san(mv)
    }

    fn same_move(a: &Move, b: &Move) -> bool {
        a.orig == b.orig && a.dest == b.dest && a.promotion_piece == b.promotion_piece
    }

    /// The turn whose `variations` list holds continuations forked from the
    /// current position directly (as opposed to variations replacing the
    /// turn right after it, which live on that next turn instead).
    fn current_turn_variations(&self, selected: i64) -> &[usize] {
        if selected >= 0 {
            &self.board().history()[selected as usize].variations
        } else {
            &self.root_variations
        }
    }

    fn match_sibling(&self, ids: &[usize], mv: &Move) -> Option<MoveClass> {
        ids.iter().find_map(|&child_id| {
            let child = &self.boards[child_id];
            let first = child.history().first()?;
            Self::same_move(&first.the_move, mv).then(|| {
                if child.continuation {
                    MoveClass::Continuation(child_id)
                } else {
                    MoveClass::Variation(child_id)
                }
            })
        })
    }

    /// Classifies `mv` against what's already recorded at the current
    /// point in the tree (spec §4.F `isNewMove`, hoisted here since only
    /// the Game can see sibling boards). A move that matches neither the
    /// existing next turn nor any known variation/continuation either
    /// replaces that next turn (`DivergesFromNext`, if one exists) or, at
    /// the true end of this board's own history, simply extends it
    /// (`AppendNew`, no branching required).
    fn classify_move(&self, mv: &Move) -> MoveClass {
        let board = self.board();
        let selected = board.selected_turn_index;
        let next_idx = selected + 1;
        let has_next = next_idx < board.history().len() as i64;

        if has_next {
            let next_turn = &board.history()[next_idx as usize];
            if mv.wildcard || Self::same_move(&next_turn.the_move, mv) {
                return MoveClass::Existing;
            }
            if let Some(class) = self.match_sibling(&next_turn.variations, mv) {
                return class;
            }
        }

        if let Some(class) = self.match_sibling(self.current_turn_variations(selected), mv) {
            return class;
        }

        if has_next {
            MoveClass::DivergesFromNext
        } else {
            MoveClass::AppendNew
        }
    }

    /// Plays `mv` in the current position (spec §4.F `makeMove`): replays
    /// it if it matches an already-recorded turn or variation/continuation
    /// at this point; appends it directly if there's nothing after the
    /// current selection yet; otherwise branches a new variation that
    /// replaces the turn it would otherwise overwrite.
    pub fn make_move(&mut self, mv: Move, options: MakeMoveOptions) -> bool {
        let meta = make_meta(&options);

        match self.classify_move(&mv) {
            MoveClass::Existing => {
                let target = self.board().selected_turn_index + 1;
                self.board_mut().select_turn(target)
            }
            MoveClass::Variation(child_id) | MoveClass::Continuation(child_id) => {
                self.current = child_id;
                self.board_mut().select_turn(0)
            }
            MoveClass::AppendNew => {
                self.board_mut().commit_new_turn(mv, true, meta);
                true
            }
            MoveClass::DivergesFromNext => {
                let parent_id = self.current;
                let parent_selected = self.board().selected_turn_index;
                let next_idx = (parent_selected + 1) as usize;
                let mut child = self.board().branch(false);
                let new_id = self.boards.len();
                child.id = new_id;
                child.parent_board = Some(parent_id);
                child.parent_branch_turn_index = Some(parent_selected);
                child.commit_new_turn(mv, true, meta);
                self.boards.push(child);
                self.boards[parent_id].history[next_idx].variations.push(new_id);
                self.current = new_id;
                true
            }
        }
    }

    /// Starts a continuation from the current position (spec §4.G
    /// `enterContinuation`): a new line extending past this point, recorded
    /// as a variation of the current turn (not the one it would be
    /// replacing, since it replaces nothing) so a later `make_move` with the
    /// same first move finds it again.
    pub fn enter_continuation(&mut self, mv: Move, options: MakeMoveOptions) -> bool {
        let meta = make_meta(&options);
        let parent_id = self.current;
        let parent_selected = self.board().selected_turn_index;
        let mut child = self.board().branch(true);
        let new_id = self.boards.len();
        child.id = new_id;
        child.parent_board = Some(parent_id);
        child.parent_branch_turn_index = Some(parent_selected);
        child.commit_new_turn(mv, true, meta);
        self.boards.push(child);
        if parent_selected >= 0 {
            self.boards[parent_id].history[parent_selected as usize]
                .variations
                .push(new_id);
        } else {
            self.root_variations.push(new_id);
        }
        self.current = new_id;
        true
    }

    pub fn make_move_from_uci(&mut self, uci: &str, options: MakeMoveOptions) -> Result<bool, GameError> {
        let legal = self.board_mut().generate_moves(&GenerateMovesOptions {
            only_legal: true,
            ..Default::default()
        });
        let mv = legal
            .into_iter()
            .find(|m| m.uci() == uci)
            .ok_or_else(|| GameError::NoSuchMove(uci.to_owned()))?;
        Ok(self.make_move(mv, options))
    }

    pub fn make_move_from_algebraic(
        &mut self,
        algebraic: &str,
        options: MakeMoveOptions,
    ) -> Result<bool, GameError> {
        let legal = self.board_mut().generate_moves(&GenerateMovesOptions {
            only_legal: true,
            ..Default::default()
        });
        let mv = legal
            .into_iter()
            .find(|m| m.matches_algebraic(algebraic))
            .ok_or_else(|| GameError::NoSuchMove(algebraic.to_owned()))?;
        Ok(self.make_move(mv, options))
    }

    pub fn make_move_from_san(&mut self, san: &str, options: MakeMoveOptions) -> Result<bool, GameError> {
        let legal = self.board_mut().generate_moves(&GenerateMovesOptions {
            only_legal: true,
            include_san: true,
            ..Default::default()
        });
        let mv = legal
            .into_iter()
            .find(|m| m.matches_san(san))
            .ok_or_else(|| GameError::NoSuchMove(san.to_owned()))?;
        Ok(self.make_move(mv, options))
    }

    pub fn select_turn(&mut self, index: i64) -> bool {
        self.board_mut().select_turn(index)
    }

    /// Navigates back to the board this one branched from, at the turn it
    /// branched from (spec §4.G `returnFromVariation`/`returnFromContinuation`
    /// — mechanically identical; kept as two names for parity with the
    /// spec's vocabulary).
    pub fn return_from_variation(&mut self) -> bool {
        let Some(parent_id) = self.board().parent_board else {
            return false;
        };
        let parent_index = self.board().parent_branch_turn_index.unwrap_or(-1);
        self.current = parent_id;
        self.board_mut().select_turn(parent_index)
    }

    pub fn return_from_continuation(&mut self) -> bool {
        self.return_from_variation()
    }

    /// Relocates every turn after the current selection out of this board
    /// and into a new sibling board (spec §4.G
    /// `moveHistoryToNewVariation`/`moveHistoryToNewContinuation`), freeing
    /// this board's line to take a different move from here. Returns
    /// `false` if there was nothing to relocate.
    pub fn move_history_to_new_variation(&mut self) -> bool {
        self.relocate_future(false)
    }

    pub fn move_history_to_new_continuation(&mut self) -> bool {
        self.relocate_future(true)
    }

    fn relocate_future(&mut self, continuation: bool) -> bool {
        let parent_id = self.current;
        let selected = self.board().selected_turn_index;
        let future: Vec<Move> = self.board().history()[(selected + 1) as usize..]
            .iter()
            .map(|t| t.the_move.clone())
            .collect();
        if future.is_empty() {
            return false;
        }

        // Relocating replays the identical future moves, so the copy must
        // start from the live position unchanged — always fork as if a
        // continuation, then relabel afterwards.
        let mut child = self.board().branch(true);
        child.continuation = continuation;
        let new_id = self.boards.len();
        child.id = new_id;
        child.parent_board = Some(parent_id);
        child.parent_branch_turn_index = Some(selected);
        for mv in future {
            child.commit_new_turn(mv, true, None);
        }
        self.boards.push(child);

        if selected >= 0 {
            self.boards[parent_id].history[selected as usize]
                .variations
                .push(new_id);
            self.boards[parent_id].history.truncate((selected + 1) as usize);
        } else {
            self.root_variations.push(new_id);
            self.boards[parent_id].history.clear();
        }

        true
    }

    pub fn get_move_history(&self) -> Vec<&Move> {
        self.board().history().iter().map(|t| &t.the_move).collect()
    }

    /// Pieces captured so far, up to (not past) the current selection.
    pub fn get_captured_pieces(&self) -> Vec<Piece> {
        let visible = usize::try_from(self.board().selected_turn_index + 1).unwrap_or(0);
        self.board()
            .history()
            .iter()
            .take(visible)
            .filter_map(|t| t.the_move.captured_piece)
            .collect()
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn legal_san(game: &mut Game, san: &str) -> Move {
        game.generate_moves(&GenerateMovesOptions {
            only_legal: true,
            include_san: true,
            ..Default::default()
        })
        .into_iter()
        .find(|m| m.san() == Some(san))
        .unwrap_or_else(|| panic!("expected {san} to be legal"))
    }

    #[test]
    fn make_move_appends_to_history() {
        let mut game = Game::new();
        let e4 = legal_san(&mut game, "e4");
        assert!(game.make_move(e4, MakeMoveOptions::default()));
        assert_eq!(game.get_move_history().len(), 1);
        assert_eq!(game.get_move_history()[0].san(), Some("e4"));
    }

    #[test]
    fn replaying_the_same_move_does_not_branch() {
        let mut game = Game::new();
        let e4 = legal_san(&mut game, "e4");
        game.make_move(e4, MakeMoveOptions::default());
        game.select_turn(-1);

        let e4_again = legal_san(&mut game, "e4");
        game.make_move(e4_again, MakeMoveOptions::default());
        assert_eq!(game.boards.len(), 1);
    }

    #[test]
    fn a_different_move_mid_history_branches_a_variation() {
        let mut game = Game::new();
        let e4 = legal_san(&mut game, "e4");
        game.make_move(e4, MakeMoveOptions::default());
        game.select_turn(-1);

        let d4 = legal_san(&mut game, "d4");
        game.make_move(d4, MakeMoveOptions::default());

        assert_eq!(game.boards.len(), 2);
        assert_eq!(game.get_move_history()[0].san(), Some("d4"));

        assert!(game.return_from_variation());
        assert_eq!(game.get_move_history()[0].san(), Some("e4"));
    }

    #[test]
    fn replaying_a_known_variation_reuses_its_board() {
        let mut game = Game::new();
        let e4 = legal_san(&mut game, "e4");
        game.make_move(e4, MakeMoveOptions::default());
        game.select_turn(-1);

        let d4 = legal_san(&mut game, "d4");
        game.make_move(d4, MakeMoveOptions::default());
        assert_eq!(game.boards.len(), 2);

        assert!(game.return_from_variation());
        game.select_turn(-1);

        let d4_again = legal_san(&mut game, "d4");
        game.make_move(d4_again, MakeMoveOptions::default());
        assert_eq!(game.boards.len(), 2, "re-entering the variation must not create a duplicate board");
        assert_eq!(game.get_move_history()[0].san(), Some("d4"));
    }

    #[test]
    fn captured_pieces_reflect_only_the_visible_history() {
        let mut game = Game::new();
        game.load_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2");
        let exd5 = legal_san(&mut game, "exd5");
        game.make_move(exd5, MakeMoveOptions::default());
        assert_eq!(game.get_captured_pieces().len(), 1);
    }
}
