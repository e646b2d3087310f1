use super::super::attack_tables::KNIGHT_ATTACKS;
use super::super::check_info::CheckInfo;
use super::super::{Bitboard, Board, Color, Move, MoveList, Square};

impl Board {
    pub(crate) fn generate_knight_moves(
        &self,
        from: Square,
        color: Color,
        check_info: &CheckInfo,
        moves: &mut MoveList,
    ) {
        let own = self.occupied[color.index()];
        let enemy = self.occupied[color.opponent().index()];
        let restrict = check_info.pin_mask(from).and(check_info.check_response_mask);
        let targets = Bitboard(KNIGHT_ATTACKS[from.as_index()])
            .and(own.not())
            .and(restrict);

        for to in targets.iter() {
            if enemy.contains(to) {
                moves.push(Move::capture(from, to));
            } else {
                moves.push(Move::quiet(from, to));
            }
        }
    }
}
