//! Concrete end-to-end scenarios from spec §8 (a)-(f).

use chessvar::board::{Board, GenerateMovesOptions, Outcome, ToFenOptions};
use chessvar::game::{Game, MakeMoveOptions};
use chessvar::Square;

fn legal_san(board: &mut Board, san: &str) -> chessvar::Move {
    board
        .generate_moves(&GenerateMovesOptions {
            only_legal: true,
            include_san: true,
            ..Default::default()
        })
        .into_iter()
        .find(|m| m.san() == Some(san))
        .unwrap_or_else(|| panic!("expected {san} to be legal"))
}

#[test]
fn scenario_a_starting_position_and_e4() {
    let mut board = Board::starting_position();
    let moves = board.generate_moves(&GenerateMovesOptions {
        only_legal: true,
        ..Default::default()
    });
    assert_eq!(moves.len(), 20);

    let e4 = legal_san(&mut board, "e4");
    board.commit_new_turn(e4, true, None);
    assert_eq!(
        board.to_fen(ToFenOptions::default()),
        "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
    );
}

#[test]
fn scenario_b_fools_mate() {
    let mut board = Board::starting_position();
    for san in ["f3", "e5", "g4", "Qh4#"] {
        let mv = legal_san(&mut board, san);
        board.commit_new_turn(mv, true, None);
    }

    let result = board.end_result().expect("the game should be over");
    assert_eq!(result.header, "0-1");
    assert_eq!(result.outcome, Outcome::BlackWins);
    assert_eq!(board.selected_turn().unwrap().the_move.san(), Some("Qh4#"));
}

#[test]
fn scenario_c_lone_kings_are_a_draw() {
    let mut board = Board::from_fen("8/8/8/8/8/8/8/k6K w - - 0 1").unwrap();
    assert!(board.has_insufficient_material());
    let result = board.end_result().expect("insufficient material ends the game");
    assert_eq!(result.header, "1/2-1/2");
    assert_eq!(result.outcome, Outcome::Draw);
}

#[test]
fn scenario_d_castling_rights_and_king_move() {
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
        .expect("Ke1-e2 should be legal");
    board.commit_new_turn(ke2, true, None);

    let fen = board.to_fen(ToFenOptions::default());
    assert_eq!(fen.split(' ').nth(2), Some("kq"));
}

#[test]
fn scenario_e_en_passant_capture() {
    let mut board = Board::starting_position();
    for (orig, dest) in [
        (Square::E2, Square::E4),
        (Square::D7, Square::D5),
        (Square::E4, Square::E5),
        (Square::F7, Square::F5),
    ] {
        let mv = board
            .generate_moves(&GenerateMovesOptions {
                only_legal: true,
                ..Default::default()
            })
            .into_iter()
            .find(|m| m.orig == orig && m.dest == dest)
            .unwrap();
        board.commit_new_turn(mv, true, None);
    }

    let exf6 = board
        .generate_moves(&GenerateMovesOptions {
            only_legal: true,
            ..Default::default()
        })
        .into_iter()
        .find(|m| m.flags.contains(chessvar::Flag::EnPassant))
        .expect("en passant capture should be legal");
    board.commit_new_turn(exf6, true, None);

    assert_eq!(board.piece_at(Square::F5), None);
    assert!(board.piece_at(Square::F6).is_some());
    assert_eq!(board.half_move_count(), 0);
}

fn find_legal_san(game: &mut Game, san: &str) -> chessvar::Move {
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
fn scenario_f_variation_branching() {
    let mut game = Game::new();
    let e4 = find_legal_san(&mut game, "e4");
    game.make_move(e4, MakeMoveOptions::default());
    assert_eq!(game.get_move_history()[0].san(), Some("e4"));

    game.select_turn(-1);

    let d4 = find_legal_san(&mut game, "d4");
    game.make_move(d4, MakeMoveOptions::default());
    assert_eq!(game.get_move_history()[0].san(), Some("d4"));

    assert!(game.return_from_variation());
    assert_eq!(game.get_move_history()[0].san(), Some("e4"));
}
