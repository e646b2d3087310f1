use super::super::attack_tables::KING_ATTACKS;
use super::super::check_info::is_protected;
use super::super::{Bitboard, Board, Color, Move, MoveList, Piece, Square};

impl Board {
    pub(crate) fn find_king(&self, color: Color) -> Option<Square> {
        self.pieces[color.index()][Piece::King.index()].iter().next()
    }

    pub(crate) fn generate_king_moves(&self, from: Square, color: Color, moves: &mut MoveList) {
        let own = self.occupied[color.index()];
        let enemy_color = color.opponent();
        let enemy = self.occupied[enemy_color.index()];
        let targets = Bitboard(KING_ATTACKS[from.as_index()]).and(own.not());

        for to in targets.iter() {
            if is_protected(self, enemy_color, to) {
                continue;
            }
            if enemy.contains(to) {
                moves.push(Move::capture(from, to));
            } else {
                moves.push(Move::quiet(from, to));
            }
        }

        self.generate_castling_moves(from, color, enemy_color, moves);
    }

    fn generate_castling_moves(
        &self,
        from: Square,
        color: Color,
        enemy_color: Color,
        moves: &mut MoveList,
    ) {
        if is_protected(self, enemy_color, from) {
            return;
        }

        let rank = if color == Color::White { 0 } else { 7 };

        if self.castling_rights.has(color, true) {
            let f_sq = Square::new(rank, 5);
            let g_sq = Square::new(rank, 6);
            if self.piece_at(f_sq).is_none()
                && self.piece_at(g_sq).is_none()
                && !is_protected(self, enemy_color, f_sq)
                && !is_protected(self, enemy_color, g_sq)
            {
                moves.push(Move::castle_kingside(from, g_sq));
            }
        }

        if self.castling_rights.has(color, false) {
            let d_sq = Square::new(rank, 3);
            let c_sq = Square::new(rank, 2);
            let b_sq = Square::new(rank, 1);
            if self.piece_at(d_sq).is_none()
                && self.piece_at(c_sq).is_none()
                && self.piece_at(b_sq).is_none()
                && !is_protected(self, enemy_color, d_sq)
                && !is_protected(self, enemy_color, c_sq)
            {
                moves.push(Move::castle_queenside(from, c_sq));
            }
        }
    }
}
