//! Static position evaluation.
//!
//! A symmetric linear-feature evaluator: every term is scored from White's
//! perspective and the total is negated when it is Black to move. There is
//! no middlegame/endgame taper; each feature carries a single canonical
//! weight.

use super::attack_tables::{slider_attacks, KING_ATTACKS, KNIGHT_ATTACKS, PAWN_ATTACKS};
use super::check_info::get_check_info;
use super::masks::{ADJACENT_FILES, FILES, PASSED_PAWN_BONUS_MG, PASSED_PAWN_MASK};
use super::{Bitboard, Board, Color, Piece, Square};

const ISOLATED_PENALTY: i32 = -10;
const ISOLATED_SEMI_OPEN_PENALTY: i32 = -10;
const DOUBLED_PENALTY: i32 = -5;
const PHALANX_BONUS: i32 = 20;
const BLOCKED_PASSED_PENALTY: i32 = -15;
const BACKWARD_STRONG_BONUS: i32 = 10;
const STRONG_SQUARE_BONUS: i32 = 20;
const MINOR_ON_STRONG_BONUS: i32 = 20;
const HOME_SQUARE_PENALTY: i32 = -15;
const DOUBLE_BISHOP_BONUS: i32 = 20;
const SEVENTH_RANK_BONUS: i32 = 30;
const OPEN_FILE_BONUS: i32 = 35;
const SEMI_OPEN_FILE_BONUS: i32 = 25;
const BEHIND_PASSED_PAWN_BONUS: i32 = 20;
const CASTLE_MADE_BONUS: i32 = 30;
const CASTLE_RIGHTS_LOST_PENALTY: i32 = -60;
const OPPOSITION_BONUS: i32 = 15;
const PINNED_PENALTY: i32 = -20;
const GHOST_MOBILITY_PENALTY: i32 = -2;

impl Board {
    /// Evaluate the position from White's perspective, then flip for Black
    /// to move.
    #[must_use]
    pub fn evaluate(&self) -> i32 {
        let white_attacks = self.pseudo_attacks(Color::White);
        let black_attacks = self.pseudo_attacks(Color::Black);

        let mut score = self.eval_material();
        score += self.eval_mobility(white_attacks, black_attacks);
        score += self.eval_pawn_structure(white_attacks, black_attacks);
        score += self.eval_square_control(white_attacks, black_attacks);
        score += self.eval_piece_placement();
        score += self.eval_king_safety();
        score += self.eval_pins();

        if self.white_to_move {
            score
        } else {
            -score
        }
    }

    fn eval_material(&self) -> i32 {
        let mut total = 0;
        for piece in [
            Piece::Pawn,
            Piece::Knight,
            Piece::Bishop,
            Piece::Rook,
            Piece::Queen,
        ] {
            let white = self.pieces[Color::White.index()][piece.index()].popcount() as i32;
            let black = self.pieces[Color::Black.index()][piece.index()].popcount() as i32;
            total += (white - black) * piece.value();
        }
        total
    }

    /// Union of every pseudo-legal attack/push square for `color`: the
    /// slider, knight, king and pawn attack sets plus pawn pushes.
    fn pseudo_attacks(&self, color: Color) -> Bitboard {
        let c_idx = color.index();
        let own = self.occupied[c_idx];
        let occ = self.all_occupied.0;
        let mut attacks = Bitboard::EMPTY;

        for sq in self.pieces[c_idx][Piece::Knight.index()].iter() {
            attacks = attacks.or(Bitboard(KNIGHT_ATTACKS[sq.as_index()]));
        }
        for sq in self.pieces[c_idx][Piece::King.index()].iter() {
            attacks = attacks.or(Bitboard(KING_ATTACKS[sq.as_index()]));
        }
        for sq in self.pieces[c_idx][Piece::Bishop.index()].iter() {
            attacks = attacks.or(Bitboard(slider_attacks(sq.as_index(), occ, true)));
        }
        for sq in self.pieces[c_idx][Piece::Rook.index()].iter() {
            attacks = attacks.or(Bitboard(slider_attacks(sq.as_index(), occ, false)));
        }
        for sq in self.pieces[c_idx][Piece::Queen.index()].iter() {
            attacks = attacks.or(Bitboard(slider_attacks(sq.as_index(), occ, true)));
            attacks = attacks.or(Bitboard(slider_attacks(sq.as_index(), occ, false)));
        }
        for sq in self.pieces[c_idx][Piece::Pawn.index()].iter() {
            attacks = attacks.or(Bitboard(PAWN_ATTACKS[c_idx][sq.as_index()]));
        }

        let empty = self.all_occupied.not();
        let is_white = color == Color::White;
        let start_rank = if is_white { 1 } else { 6 };
        for sq in self.pieces[c_idx][Piece::Pawn.index()].iter() {
            if let Some(one) = sq.forward(is_white) {
                if empty.contains(one) {
                    attacks = attacks.or(Bitboard::from_square(one));
                    if sq.rank() == start_rank {
                        if let Some(two) = one.forward(is_white) {
                            if empty.contains(two) {
                                attacks = attacks.or(Bitboard::from_square(two));
                            }
                        }
                    }
                }
            }
        }

        attacks.and(own.not())
    }

    fn eval_mobility(&self, white_attacks: Bitboard, black_attacks: Bitboard) -> i32 {
        let mut score = white_attacks.popcount() as i32 - black_attacks.popcount() as i32;
        score += GHOST_MOBILITY_PENALTY * self.ghost_queen_mobility(Color::White);
        score -= GHOST_MOBILITY_PENALTY * self.ghost_queen_mobility(Color::Black);
        score
    }

    /// Squares a queen dropped on `color`'s king would reach sliding purely
    /// through empty squares (not landing on the first blocker): a proxy
    /// for how exposed the king is.
    fn ghost_queen_mobility(&self, color: Color) -> i32 {
        let Some(king_sq) = self.find_king(color) else {
            return 0;
        };
        let empty = self.all_occupied.not();
        let from = Bitboard::from_square(king_sq);
        let mut reach = Bitboard::EMPTY;
        for dir in 0..8 {
            reach = reach.or(from.fill_dir(empty, dir));
        }
        reach.and(from.not()).popcount() as i32
    }

    fn eval_pawn_structure(&self, white_attacks: Bitboard, black_attacks: Bitboard) -> i32 {
        self.pawn_structure_for(Color::White, black_attacks)
            - self.pawn_structure_for(Color::Black, white_attacks)
    }

    fn pawn_structure_for(&self, color: Color, enemy_attacks: Bitboard) -> i32 {
        let c_idx = color.index();
        let friendly_pawns = self.pieces[c_idx][Piece::Pawn.index()];
        let enemy_pawns = self.pieces[color.opponent().index()][Piece::Pawn.index()];
        let mut score = 0;

        for sq in friendly_pawns.iter() {
            let file = sq.file();
            let adjacent_friendly = ADJACENT_FILES[file].and(friendly_pawns);

            if adjacent_friendly.is_empty() {
                score += ISOLATED_PENALTY;
                if enemy_pawns.and(FILES[file]).is_empty() {
                    score += ISOLATED_SEMI_OPEN_PENALTY;
                }
            }

            if self.is_backward(color, sq, friendly_pawns, enemy_pawns) {
                let attacks = Bitboard(PAWN_ATTACKS[c_idx][sq.as_index()]);
                let supports_strong = attacks
                    .iter()
                    .any(|s| self.is_strong_square(color, s, enemy_attacks));
                if supports_strong {
                    score += BACKWARD_STRONG_BONUS;
                }
            }

            if PASSED_PAWN_MASK[c_idx][sq.as_index()].and(enemy_pawns).is_empty() {
                let relative_rank = if color == Color::White {
                    sq.rank()
                } else {
                    7 - sq.rank()
                };
                score += PASSED_PAWN_BONUS_MG[relative_rank];
                if let Some(ahead) = sq.forward(color == Color::White) {
                    if self.piece_at(ahead).is_some() {
                        score += BLOCKED_PASSED_PENALTY;
                    }
                }
            }
        }

        for file in 0..8 {
            let count = FILES[file].and(friendly_pawns).popcount();
            if count > 1 {
                score += DOUBLED_PENALTY * (count as i32 - 1);
            }
        }

        for sq in friendly_pawns.iter() {
            if sq.file() < 7 {
                let neighbor = Square::new(sq.rank(), sq.file() + 1);
                if friendly_pawns.contains(neighbor) {
                    score += PHALANX_BONUS;
                }
            }
        }

        score
    }

    /// A pawn with no friendly pawn able to support it from an adjacent
    /// file, whose stop square is covered by an enemy pawn.
    fn is_backward(
        &self,
        color: Color,
        sq: Square,
        friendly_pawns: Bitboard,
        enemy_pawns: Bitboard,
    ) -> bool {
        let is_white = color == Color::White;
        let adjacent = ADJACENT_FILES[sq.file()];
        let mut supported_from = Bitboard::EMPTY;
        for s in adjacent.iter() {
            let rank_ok = if is_white {
                s.rank() <= sq.rank()
            } else {
                s.rank() >= sq.rank()
            };
            if rank_ok {
                supported_from = supported_from.or(Bitboard::from_square(s));
            }
        }
        if !supported_from.and(friendly_pawns).is_empty() {
            return false;
        }
        let Some(forward) = sq.forward(is_white) else {
            return false;
        };
        let opponent_idx = color.opponent().index();
        Bitboard(PAWN_ATTACKS[opponent_idx][forward.as_index()])
            .and(enemy_pawns)
            .popcount()
            > 0
    }

    fn is_strong_square(&self, color: Color, sq: Square, enemy_attacks: Bitboard) -> bool {
        let c_idx = color.index();
        let friendly_pawns = self.pieces[c_idx][Piece::Pawn.index()];
        let attacked_by_friendly_pawn = friendly_pawns
            .iter()
            .any(|p| Bitboard(PAWN_ATTACKS[c_idx][p.as_index()]).contains(sq));
        attacked_by_friendly_pawn && !enemy_attacks.contains(sq)
    }

    fn eval_square_control(&self, white_attacks: Bitboard, black_attacks: Bitboard) -> i32 {
        self.square_control_for(Color::White, black_attacks)
            - self.square_control_for(Color::Black, white_attacks)
    }

    fn square_control_for(&self, color: Color, enemy_attacks: Bitboard) -> i32 {
        let c_idx = color.index();
        let friendly_pawns = self.pieces[c_idx][Piece::Pawn.index()];
        let mut strong_squares = Bitboard::EMPTY;
        for sq in friendly_pawns.iter() {
            strong_squares = strong_squares.or(Bitboard(PAWN_ATTACKS[c_idx][sq.as_index()]));
        }
        strong_squares = strong_squares.and(enemy_attacks.not());

        let mut score = strong_squares.popcount() as i32 * STRONG_SQUARE_BONUS;

        let minors = self.pieces[c_idx][Piece::Bishop.index()]
            .or(self.pieces[c_idx][Piece::Knight.index()]);
        score += minors.and(strong_squares).popcount() as i32 * MINOR_ON_STRONG_BONUS;

        score
    }

    fn eval_piece_placement(&self) -> i32 {
        self.piece_placement_for(Color::White) - self.piece_placement_for(Color::Black)
    }

    fn piece_placement_for(&self, color: Color) -> i32 {
        let c_idx = color.index();
        let rank = if color == Color::White { 0 } else { 7 };
        let mut score = 0;

        let home_bishops = [Square::new(rank, 2), Square::new(rank, 5)];
        for sq in home_bishops {
            if self.pieces[c_idx][Piece::Bishop.index()].contains(sq) {
                score += HOME_SQUARE_PENALTY;
            }
        }
        let home_knights = [Square::new(rank, 1), Square::new(rank, 6)];
        for sq in home_knights {
            if self.pieces[c_idx][Piece::Knight.index()].contains(sq) {
                score += HOME_SQUARE_PENALTY;
            }
        }

        if self.pieces[c_idx][Piece::Bishop.index()].popcount() >= 2 {
            score += DOUBLE_BISHOP_BONUS;
        }

        let own_pawns = self.pieces[c_idx][Piece::Pawn.index()];
        let enemy_pawns = self.pieces[color.opponent().index()][Piece::Pawn.index()];
        let seventh = if color == Color::White {
            Bitboard::RANK_7
        } else {
            Bitboard::RANK_2
        };

        let straight_pieces =
            self.pieces[c_idx][Piece::Rook.index()].or(self.pieces[c_idx][Piece::Queen.index()]);

        score += straight_pieces.and(seventh).popcount() as i32 * SEVENTH_RANK_BONUS;

        for sq in straight_pieces.iter() {
            let file = sq.file();
            let no_own = FILES[file].and(own_pawns).is_empty();
            let no_enemy = FILES[file].and(enemy_pawns).is_empty();
            if no_own && no_enemy {
                score += OPEN_FILE_BONUS;
            } else if no_own {
                score += SEMI_OPEN_FILE_BONUS;
            }
        }

        for pawn_sq in own_pawns.iter() {
            if PASSED_PAWN_MASK[c_idx][pawn_sq.as_index()]
                .and(enemy_pawns)
                .is_empty()
            {
                let behind = FILES[pawn_sq.file()].and(straight_pieces);
                let is_behind = behind.iter().any(|p| {
                    if color == Color::White {
                        p.rank() < pawn_sq.rank()
                    } else {
                        p.rank() > pawn_sq.rank()
                    }
                });
                if is_behind {
                    score += BEHIND_PASSED_PAWN_BONUS;
                }
            }
        }

        score
    }

    fn eval_king_safety(&self) -> i32 {
        let mut score = self.castle_status(Color::White) - self.castle_status(Color::Black);
        score += self.opposition_bonus();
        score
    }

    fn castle_status(&self, color: Color) -> i32 {
        if self.castling_rights.has_castled(color) {
            CASTLE_MADE_BONUS
        } else if self.castling_rights.has_lost_rights(color) {
            CASTLE_RIGHTS_LOST_PENALTY
        } else {
            0
        }
    }

    fn opposition_bonus(&self) -> i32 {
        let (Some(white_king), Some(black_king)) =
            (self.find_king(Color::White), self.find_king(Color::Black))
        else {
            return 0;
        };
        let same_file = white_king.file() == black_king.file();
        let same_rank = white_king.rank() == black_king.rank();
        let direct = (same_file && white_king.rank().abs_diff(black_king.rank()) == 2)
            || (same_rank && white_king.file().abs_diff(black_king.file()) == 2);
        if !direct {
            return 0;
        }
        // The side NOT to move holds the opposition.
        if self.white_to_move {
            -OPPOSITION_BONUS
        } else {
            OPPOSITION_BONUS
        }
    }

    fn eval_pins(&self) -> i32 {
        let white_pinned = get_check_info(self, Color::White).pinned.popcount() as i32;
        let black_pinned = get_check_info(self, Color::Black).pinned.popcount() as i32;
        (white_pinned - black_pinned) * PINNED_PENALTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_position_is_balanced() {
        let board = Board::new();
        assert_eq!(board.evaluate(), 0);
    }

    #[test]
    fn material_advantage_favors_white() {
        let board = Board::try_from_fen("4k3/8/8/8/8/8/8/4K2Q w - - 0 1").unwrap();
        assert!(board.evaluate() > 0);
    }

    #[test]
    fn material_advantage_favors_black_to_move() {
        let board = Board::try_from_fen("4k2q/8/8/8/8/8/8/4K3 b - - 0 1").unwrap();
        assert!(board.evaluate() > 0);
    }

    #[test]
    fn isolated_pawn_is_penalized() {
        let isolated = Board::try_from_fen("4k3/8/8/8/4P3/8/8/4K3 w - - 0 1").unwrap();
        let supported = Board::try_from_fen("4k3/8/8/8/3PP3/8/8/4K3 w - - 0 1").unwrap();
        assert!(isolated.evaluate() < supported.evaluate());
    }

    #[test]
    fn pinned_piece_is_penalized() {
        let pinned = Board::try_from_fen("4k3/8/8/8/8/4r3/4N3/4K3 w - - 0 1").unwrap();
        let unpinned = Board::try_from_fen("4k3/8/8/8/8/3r4/4N3/4K3 w - - 0 1").unwrap();
        assert!(pinned.evaluate() < unpinned.evaluate());
    }
}
