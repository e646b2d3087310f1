use super::super::attack_tables::slider_attacks;
use super::super::check_info::CheckInfo;
use super::super::{Bitboard, Board, Color, Move, MoveList, Square};

/// Type of sliding piece for move generation
#[derive(Clone, Copy)]
pub(crate) enum SliderType {
    Bishop,
    Rook,
    Queen,
}

impl Board {
    pub(crate) fn generate_slider_moves(
        &self,
        from: Square,
        slider: SliderType,
        color: Color,
        check_info: &CheckInfo,
        moves: &mut MoveList,
    ) {
        let own = self.occupied[color.index()];
        let enemy = self.occupied[color.opponent().index()];
        let occ = self.all_occupied.0;
        let from_idx = from.as_index();

        let raw = match slider {
            SliderType::Bishop => slider_attacks(from_idx, occ, true),
            SliderType::Rook => slider_attacks(from_idx, occ, false),
            SliderType::Queen => {
                slider_attacks(from_idx, occ, false) | slider_attacks(from_idx, occ, true)
            }
        };

        let restrict = check_info.pin_mask(from).and(check_info.check_response_mask);
        let targets = Bitboard(raw).and(own.not()).and(restrict);

        for to in targets.iter() {
            if enemy.contains(to) {
                moves.push(Move::capture(from, to));
            } else {
                moves.push(Move::quiet(from, to));
            }
        }
    }
}
