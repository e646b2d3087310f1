mod kings;
mod knights;
mod pawns;
mod sliders;

use self::sliders::SliderType;
use super::check_info::{get_check_info, is_in_check};
use super::{Board, Color, Move, MoveList, Piece};

impl Board {
    /// Generate every legal move for the side to move.
    ///
    /// Pin and check information is computed once up front
    /// (`check_info::get_check_info`) and intersected into each piece's
    /// pseudo-legal targets, so the only remaining legality check is the
    /// discovered-check case unique to en passant (two pieces leave the same
    /// rank at once, which the static pin rays don't model).
    #[must_use]
    pub fn generate_moves(&mut self) -> MoveList {
        let color = self.current_color();
        let check_info = get_check_info(self, color);
        let mut moves = MoveList::new();

        if let Some(king_sq) = self.find_king(color) {
            self.generate_king_moves(king_sq, color, &mut moves);
        }

        if !check_info.in_double_check() {
            let c_idx = color.index();
            for from in self.pieces[c_idx][Piece::Pawn.index()].iter() {
                self.generate_pawn_moves(from, color, &check_info, &mut moves);
            }
            for from in self.pieces[c_idx][Piece::Knight.index()].iter() {
                self.generate_knight_moves(from, color, &check_info, &mut moves);
            }
            for from in self.pieces[c_idx][Piece::Bishop.index()].iter() {
                self.generate_slider_moves(from, SliderType::Bishop, color, &check_info, &mut moves);
            }
            for from in self.pieces[c_idx][Piece::Rook.index()].iter() {
                self.generate_slider_moves(from, SliderType::Rook, color, &check_info, &mut moves);
            }
            for from in self.pieces[c_idx][Piece::Queen.index()].iter() {
                self.generate_slider_moves(from, SliderType::Queen, color, &check_info, &mut moves);
            }
        }

        self.drop_illegal_en_passant(&mut moves, color);
        moves
    }

    fn drop_illegal_en_passant(&mut self, moves: &mut MoveList, color: Color) {
        if moves.iter().all(|m| !m.is_en_passant()) {
            return;
        }
        let mut legal = MoveList::new();
        for m in moves.iter() {
            if m.is_en_passant() {
                let info = self.make_move(*m);
                let safe = !is_in_check(self, color);
                self.unmake_move(*m, info);
                if safe {
                    legal.push(*m);
                }
            } else {
                legal.push(*m);
            }
        }
        *moves = legal;
    }

    /// Capturing and promoting moves only, for quiescence search.
    #[must_use]
    pub(crate) fn generate_tactical_moves(&mut self) -> MoveList {
        let mut tactical = MoveList::new();
        for m in self.generate_moves().iter() {
            if m.is_tactical() {
                tactical.push(*m);
            }
        }
        tactical
    }

    #[must_use]
    pub fn is_in_check(&self, color: Color) -> bool {
        is_in_check(self, color)
    }

    /// Verify a move against a freshly generated legal move list (used to
    /// sanity-check a transposition table move before replaying it).
    #[must_use]
    pub(crate) fn is_legal_move(&mut self, mv: Move) -> bool {
        self.generate_moves().iter().any(|m| *m == mv)
    }

    #[must_use]
    pub fn side_to_move(&self) -> Color {
        self.current_color()
    }

    #[must_use]
    pub fn is_checkmate(&mut self) -> bool {
        let color = self.current_color();
        self.is_in_check(color) && self.generate_moves().is_empty()
    }

    #[must_use]
    pub fn is_stalemate(&mut self) -> bool {
        let color = self.current_color();
        !self.is_in_check(color) && self.generate_moves().is_empty()
    }

    #[must_use]
    pub fn perft(&mut self, depth: usize) -> u64 {
        if depth == 0 {
            return 1;
        }

        let moves = self.generate_moves();
        if depth == 1 {
            return moves.len() as u64;
        }

        let mut nodes = 0;
        for m in moves.iter() {
            let info = self.make_move(*m);
            nodes += self.perft(depth - 1);
            self.unmake_move(*m, info);
        }

        nodes
    }
}
