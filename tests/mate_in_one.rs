use chess_engine::board::Board;

#[test]
fn back_rank_mate_is_detected() {
    let mut board = Board::from_fen("6k1/5ppp/8/8/8/8/8/4Q2K w - - 0 1");
    board.make_move_uci("e1e8").expect("legal move");
    assert!(board.is_checkmate());
}

#[test]
fn smothered_mate_is_detected() {
    let mut board = Board::from_fen("6rk/6pp/8/6N1/8/8/8/6K1 w - - 0 1");
    board.make_move_uci("g5f7").expect("legal move");
    assert!(board.is_checkmate());
}

#[test]
fn search_finds_back_rank_mate() {
    let mut board = Board::from_fen("6k1/5ppp/8/8/8/8/8/4Q2K w - - 0 1");
    let mut state = chess_engine::board::SearchState::new(16);
    let stop = std::sync::atomic::AtomicBool::new(false);

    let best = chess_engine::board::find_best_move(&mut board, &mut state, 3, &stop);
    let mv = best.expect("should find a move");

    board.make_move_uci(&mv.to_string()).expect("legal move");
    assert!(board.is_checkmate(), "expected {mv} to be mate");
}
