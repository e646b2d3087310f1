//! The recursive alpha-beta procedure and its quiescence leaf search.
//!
//! One `Search` borrows the board and the persistent tables for the
//! duration of a single `alpha_beta_search` call and is discarded when it
//! returns; the transposition table it writes into is the only thing that
//! survives to the next call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

#[cfg(feature = "logging")]
use log::trace;

use super::constants::MATE_THRESHOLD;
use super::params::SearchParams;
use super::tt::{BoundType, TranspositionTable};
use super::{SearchStats, MATE_SCORE};
use crate::board::{Board, Color, Move, MoveList, Piece, EMPTY_MOVE, MAX_PLY};

pub(super) struct Search<'a> {
    pub board: &'a mut Board,
    pub tt: &'a mut TranspositionTable,
    pub killers: &'a mut [[Move; 2]; MAX_PLY],
    pub stats: &'a mut SearchStats,
    pub generation: u16,
    pub params: SearchParams,
    pub stop: &'a AtomicBool,
    pub deadline: Option<Instant>,
    pub node_limit: u64,
    path: Vec<u64>,
    draw_max_fd_depth: u32,
    pub root_moves: Vec<(Move, i32)>,
}

/// A move bucketed for the ordering pass of §4.6 step 7.
struct Ordered {
    mv: Move,
    score: i32,
}

const BUCKET_PROMO_QUEEN: i32 = 900_000;
const BUCKET_PROMO_KNIGHT: i32 = 800_000;
const BUCKET_GOOD_CAPTURE: i32 = 700_000;
const BUCKET_KILLER1: i32 = 600_000;
const BUCKET_KILLER2: i32 = 590_000;
const BUCKET_CASTLE_K: i32 = 580_000;
const BUCKET_CASTLE_Q: i32 = 570_000;
const BUCKET_QUIET: i32 = 0;
const BUCKET_BAD_CAPTURE: i32 = -100_000;

impl<'a> Search<'a> {
    pub fn new(
        board: &'a mut Board,
        tt: &'a mut TranspositionTable,
        killers: &'a mut [[Move; 2]; MAX_PLY],
        stats: &'a mut SearchStats,
        generation: u16,
        params: SearchParams,
        stop: &'a AtomicBool,
        deadline: Option<Instant>,
        node_limit: u64,
    ) -> Self {
        let draw_max_fd_depth = if board.repetition_counts.any_at_least(2) {
            9
        } else {
            0
        };
        Search {
            board,
            tt,
            killers,
            stats,
            generation,
            params,
            stop,
            deadline,
            node_limit,
            path: Vec::with_capacity(MAX_PLY),
            draw_max_fd_depth,
            root_moves: Vec::new(),
        }
    }

    #[inline]
    fn should_stop(&self) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            return true;
        }
        if self.node_limit > 0 && self.stats.total_nodes >= self.node_limit {
            return true;
        }
        if let Some(deadline) = self.deadline {
            return Instant::now() >= deadline;
        }
        false
    }

    fn count_node(&mut self) {
        self.stats.nodes += 1;
        self.stats.total_nodes += 1;
    }

    fn is_endgame(&self, color: Color) -> bool {
        let c = color.index();
        let material = self.board.pieces[c][Piece::Rook.index()].popcount() as i32
            * Piece::Rook.value()
            + self.board.pieces[c][Piece::Queen.index()].popcount() as i32 * Piece::Queen.value()
            + self.board.pieces[c][Piece::Knight.index()].popcount() as i32 * Piece::Knight.value()
            + self.board.pieces[c][Piece::Bishop.index()].popcount() as i32 * Piece::Bishop.value();
        material <= Piece::Knight.value()
    }

    /// §4.6 step 1: the current state repeats a position exactly 4 and 8
    /// plies back along this search line.
    fn cycle_detected(&self, bk_depth: u32, fd_depth: u32, null_depth: u32) -> bool {
        if null_depth != 0 || bk_depth < 1 || fd_depth > self.draw_max_fd_depth {
            return false;
        }
        let len = self.path.len();
        if len < 9 {
            return false;
        }
        let current = self.path[len - 1];
        current == self.path[len - 5] && current == self.path[len - 9]
    }

    fn mvv_lva(&self, mv: Move) -> (i32, i32) {
        let attacker = self
            .board
            .piece_at(mv.from())
            .map_or(0, |(_, p)| p.value());
        let victim = if mv.is_en_passant() {
            Piece::Pawn.value()
        } else {
            self.board.piece_at(mv.to()).map_or(0, |(_, p)| p.value())
        };
        (attacker, victim)
    }

    /// Classify and order a move list per §4.6 step 7. `drop_bad_captures`
    /// discards non-promoting captures where the attacker is worth more than
    /// the victim and the exchange isn't favorable (used in quiescence).
    fn order_moves(&self, moves: &MoveList, ply: usize, drop_bad_captures: bool) -> Vec<Move> {
        let mut scored = Vec::with_capacity(moves.len());
        let killer1 = self.killers[ply][0];
        let killer2 = self.killers[ply][1];

        for mv in moves.iter().copied() {
            let score = match mv.promotion() {
                Some(Piece::Queen) => BUCKET_PROMO_QUEEN,
                Some(Piece::Knight) => BUCKET_PROMO_KNIGHT,
                Some(_) => BUCKET_QUIET - 1,
                None if mv.is_capture() => {
                    let (attacker, victim) = self.mvv_lva(mv);
                    let favorable = victim >= attacker || self.board.see(mv.from(), mv.to()) > 0;
                    if favorable {
                        BUCKET_GOOD_CAPTURE + victim * 16 - attacker
                    } else if drop_bad_captures {
                        continue;
                    } else {
                        BUCKET_BAD_CAPTURE + victim * 16 - attacker
                    }
                }
                None if mv == killer1 => BUCKET_KILLER1,
                None if mv == killer2 => BUCKET_KILLER2,
                None if mv.is_castle_kingside() => BUCKET_CASTLE_K,
                None if mv.is_castle_queenside() => BUCKET_CASTLE_Q,
                None => BUCKET_QUIET,
            };
            scored.push(Ordered { mv, score });
        }

        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.into_iter().map(|o| o.mv).collect()
    }

    fn record_killer(&mut self, ply: usize, mv: Move) {
        if ply >= MAX_PLY || mv.is_capture() {
            return;
        }
        if self.killers[ply][0] != mv {
            self.killers[ply][1] = self.killers[ply][0];
            self.killers[ply][0] = mv;
        }
    }

    fn store(&mut self, depth: u32, score: i32, bound: BoundType, best_move: Option<Move>) {
        self.tt
            .store(self.board, depth, score, bound, best_move, self.generation);
    }

    /// Quiescence search: tactical moves only, capped at
    /// `params.quiescence_max_depth` plies below its entry point.
    fn quiescence(&mut self, mut alpha: i32, beta: i32, qdepth: u32) -> i32 {
        self.count_node();
        if self.should_stop() {
            return alpha;
        }

        let color = self.board.current_color();
        let stand_pat = self.board.evaluate();

        if qdepth >= self.params.quiescence_max_depth {
            return stand_pat;
        }

        if !self.is_endgame(color) && stand_pat + self.params.delta_margin < alpha {
            return stand_pat;
        }

        if stand_pat > alpha {
            alpha = stand_pat;
        }
        if alpha >= beta {
            return alpha;
        }

        let moves = self.board.generate_tactical_moves();
        let ordered = self.order_moves(&moves, 0, true);

        for mv in ordered {
            let info = self.board.make_move(mv);
            let score = -self.quiescence(-beta, -alpha, qdepth + 1);
            self.board.unmake_move(mv, info);

            if self.should_stop() {
                return alpha;
            }
            if score > alpha {
                alpha = score;
                if alpha >= beta {
                    return alpha;
                }
            }
        }

        alpha
    }

    /// The recursive alpha-beta procedure of §4.6.
    #[allow(clippy::too_many_lines)]
    pub fn search(
        &mut self,
        bk_depth: u32,
        mut alpha: i32,
        mut beta: i32,
        fd_depth: u32,
        null_depth: u32,
    ) -> i32 {
        self.path.push(self.board.hash);
        let result = self.search_inner(bk_depth, alpha, beta, fd_depth, null_depth);
        self.path.pop();
        result
    }

    fn search_inner(
        &mut self,
        bk_depth: u32,
        mut alpha: i32,
        mut beta: i32,
        fd_depth: u32,
        null_depth: u32,
    ) -> i32 {
        if self.cycle_detected(bk_depth, fd_depth, null_depth) {
            return 0;
        }

        let tt_eligible = null_depth == 0 && bk_depth >= 2 && fd_depth <= 10;
        let mut tt_move = EMPTY_MOVE;
        let mut suppress_write = false;
        if tt_eligible {
            if let Some(entry) = self.tt.probe(self.board.hash) {
                tt_move = entry.best_move().unwrap_or(EMPTY_MOVE);
                if entry.depth() > bk_depth {
                    suppress_write = true;
                }
                if entry.depth() >= bk_depth && fd_depth >= 1 && fd_depth >= self.draw_max_fd_depth
                {
                    match entry.bound_type() {
                        BoundType::Exact => return entry.score(),
                        BoundType::LowerBound => alpha = alpha.max(entry.score()),
                        BoundType::UpperBound => beta = beta.min(entry.score()),
                    }
                    if alpha >= beta {
                        return entry.score();
                    }
                }
            }
        }

        let color = self.board.current_color();
        let in_check = self.board.is_in_check(color);

        if bk_depth == 0 && !in_check {
            return self.quiescence(alpha, beta, 0);
        }
        let bk_depth = if bk_depth == 0 { 1 } else { bk_depth };

        self.count_node();
        if fd_depth + 1 > self.stats.seldepth {
            self.stats.seldepth = fd_depth + 1;
        }
        if bk_depth >= 4 && self.should_stop() {
            return alpha;
        }

        if self.board.find_king(color).is_none() {
            return -MATE_THRESHOLD;
        }

        // Null move pruning.
        if null_depth == 0
            && !in_check
            && fd_depth >= 4
            && fd_depth >= self.draw_max_fd_depth
            && !self.is_endgame(color)
        {
            let min_depth = self.params.null_change + self.params.null_min_leftover;
            let max_depth = self.params.null_change + self.params.null_max_leftover;
            if bk_depth >= min_depth && bk_depth <= max_depth {
                let info = self.board.make_null_move();
                let reduced = bk_depth - self.params.null_change;
                let score = -self.search(reduced, -beta, -beta + 1, fd_depth + 1, null_depth + 1);
                self.board.unmake_null_move(info);
                if score >= beta {
                    return beta;
                }
            }
        }

        let moves = self.board.generate_moves();
        if moves.is_empty() {
            return if in_check {
                -MATE_SCORE + fd_depth as i32
            } else {
                0
            };
        }

        let ordered = self.order_moves(&moves, fd_depth as usize, false);
        let mut queue: Vec<Move> = Vec::with_capacity(ordered.len());
        if tt_move != EMPTY_MOVE && moves.iter().any(|m| *m == tt_move) {
            queue.push(tt_move);
        }
        for mv in ordered {
            if mv != tt_move {
                queue.push(mv);
            }
        }

        let mut best_score = -MATE_THRESHOLD - MAX_PLY as i32;
        let mut best_move = EMPTY_MOVE;
        let mut raised_alpha = false;

        for mv in queue {
            let info = self.board.make_move(mv);
            let score = -self.search(bk_depth - 1, -beta, -alpha, fd_depth + 1, null_depth);
            self.board.unmake_move(mv, info);

            if self.should_stop() {
                break;
            }

            if score > best_score {
                best_score = score;
                best_move = mv;
            }

            if fd_depth == 0 {
                self.root_moves.push((mv, score));
            }

            if score > alpha {
                alpha = score;
                raised_alpha = true;
            }

            if alpha >= beta {
                self.record_killer(fd_depth as usize, mv);
                if !suppress_write {
                    if fd_depth < self.draw_max_fd_depth {
                        self.store(0, alpha, BoundType::LowerBound, Some(mv));
                    } else {
                        self.store(bk_depth, alpha, BoundType::LowerBound, Some(mv));
                    }
                }
                #[cfg(feature = "logging")]
                trace!(target: "search", "beta cutoff at fd_depth={fd_depth} bk_depth={bk_depth}");
                return alpha;
            }
        }

        if !suppress_write {
            let bound = if raised_alpha {
                BoundType::Exact
            } else {
                BoundType::UpperBound
            };
            self.store(bk_depth, best_score, bound, Some(best_move));
        }

        best_score
    }
}
