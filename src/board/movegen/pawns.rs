use super::super::attack_tables::PAWN_ATTACKS;
use super::super::check_info::CheckInfo;
use super::super::{Bitboard, Board, Color, Move, MoveList, Square, PROMOTION_PIECES};

impl Board {
    pub(crate) fn generate_pawn_moves(
        &self,
        from: Square,
        color: Color,
        check_info: &CheckInfo,
        moves: &mut MoveList,
    ) {
        let is_white = color == Color::White;
        let promotion_rank = if is_white { 7 } else { 0 };
        let start_rank = if is_white { 1 } else { 6 };
        let empty = self.all_occupied.not();
        let enemy = self.occupied[color.opponent().index()];
        let pin_mask = check_info.pin_mask(from);
        let restrict = pin_mask.and(check_info.check_response_mask);

        if let Some(one) = from.forward(is_white) {
            if empty.contains(one) {
                if restrict.contains(one) {
                    push_forward(moves, from, one, promotion_rank);
                }
                if from.rank() == start_rank {
                    if let Some(two) = one.forward(is_white) {
                        if empty.contains(two) && restrict.contains(two) {
                            moves.push(Move::double_pawn_push(from, two));
                        }
                    }
                }
            }
        }

        let attacks = Bitboard(PAWN_ATTACKS[color.index()][from.as_index()]);
        for to in attacks.and(enemy).and(restrict).iter() {
            push_capture(moves, from, to, promotion_rank);
        }

        if let Some(ep) = self.en_passant_target {
            if attacks.contains(ep) && pin_mask.contains(ep) {
                let captured_sq = Square::new(from.rank(), ep.file());
                let resolves_check = check_info.check_response_mask.contains(ep)
                    || check_info.checkers.contains(captured_sq);
                if resolves_check {
                    moves.push(Move::en_passant(from, ep));
                }
            }
        }
    }
}

fn push_forward(moves: &mut MoveList, from: Square, to: Square, promotion_rank: usize) {
    if to.rank() == promotion_rank {
        for piece in PROMOTION_PIECES {
            moves.push(Move::new_promotion(from, to, piece));
        }
    } else {
        moves.push(Move::quiet(from, to));
    }
}

fn push_capture(moves: &mut MoveList, from: Square, to: Square, promotion_rank: usize) {
    if to.rank() == promotion_rank {
        for piece in PROMOTION_PIECES {
            moves.push(Move::new_promotion_capture(from, to, piece));
        }
    } else {
        moves.push(Move::capture(from, to));
    }
}
