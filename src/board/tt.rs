//! Transposition table for caching search results.
//!
//! Uses Zobrist hashes to store and retrieve position evaluations, enabling
//! significant search tree pruning. Entries additionally carry a lightweight
//! signature of the position they were computed from, so that `purge_unreachable`
//! can drop entries that can no longer arise from a given live position when the
//! table is reused across games.

use std::mem;

use super::masks::PAWN_PYRAMID;
use super::{Board, Color, Move, Piece};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundType {
    Exact,
    LowerBound,
    UpperBound,
}

/// A coarse snapshot of a position used to decide whether a stored entry can
/// still be reached from some other position (see `purge_unreachable`).
#[derive(Clone, Copy, Debug)]
pub(crate) struct PositionSignature {
    piece_counts: [[u8; 6]; 2],
    castling_rights: u8,
    pawns: [u64; 2],
}

impl PositionSignature {
    pub(crate) fn of(board: &Board) -> Self {
        let mut piece_counts = [[0u8; 6]; 2];
        for color in [Color::White, Color::Black] {
            let c = color.index();
            for piece in [
                Piece::Pawn,
                Piece::Knight,
                Piece::Bishop,
                Piece::Rook,
                Piece::Queen,
                Piece::King,
            ] {
                piece_counts[c][piece.index()] = board.pieces[c][piece.index()].popcount() as u8;
            }
        }
        PositionSignature {
            piece_counts,
            castling_rights: board.castling_rights.as_u8(),
            pawns: [
                board.pieces[Color::White.index()][Piece::Pawn.index()].0,
                board.pieces[Color::Black.index()][Piece::Pawn.index()].0,
            ],
        }
    }

    /// Could a position with this signature still arise by further play from
    /// `board`? Pieces are only ever lost (never created, barring promotion,
    /// which this approximates away), castling rights only ever shrink, and
    /// pawns only ever advance or get captured.
    fn reachable_from(&self, board: &Board) -> bool {
        let live = Self::of(board);

        for c in 0..2 {
            for p in 0..6 {
                if self.piece_counts[c][p] > live.piece_counts[c][p] {
                    return false;
                }
            }
        }

        if self.castling_rights & !live.castling_rights != 0 {
            return false;
        }

        for (idx, color) in [Color::White, Color::Black].into_iter().enumerate() {
            let live_pawns = live.pawns[idx];
            let mut entry_pawns = self.pawns[idx];
            while entry_pawns != 0 {
                let sq = entry_pawns.trailing_zeros() as usize;
                entry_pawns &= entry_pawns - 1;
                let sources = PAWN_PYRAMID[color.index()][sq].0 | (1u64 << sq);
                if live_pawns & sources == 0 {
                    return false;
                }
            }
        }

        true
    }
}

#[derive(Clone, Debug)]
pub(crate) struct TTEntry {
    hash: u64,
    depth: u32,
    score: i32,
    bound_type: BoundType,
    best_move: Option<Move>,
    generation: u16,
    signature: PositionSignature,
}

impl TTEntry {
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn bound_type(&self) -> BoundType {
        self.bound_type
    }

    pub fn best_move(&self) -> Option<Move> {
        self.best_move
    }
}

#[derive(Clone)]
pub struct TranspositionTable {
    table: Vec<[Option<TTEntry>; 4]>,
    mask: usize,
    occupied: usize,
}

impl TranspositionTable {
    #[must_use]
    pub fn new(size_mb: usize) -> Self {
        let entry_size = mem::size_of::<[Option<TTEntry>; 4]>();
        let mut num_entries = (size_mb * 1024 * 1024) / entry_size;

        num_entries = num_entries.next_power_of_two() / 2;
        if num_entries == 0 {
            num_entries = 1024;
        }

        TranspositionTable {
            table: vec![[None, None, None, None]; num_entries],
            mask: num_entries - 1,
            occupied: 0,
        }
    }

    fn index(&self, hash: u64) -> usize {
        (hash as usize) & self.mask
    }

    pub(crate) fn probe(&self, hash: u64) -> Option<&TTEntry> {
        let index = self.index(hash);
        let bucket = &self.table[index];
        bucket.iter().flatten().find(|entry| entry.hash == hash)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn store(
        &mut self,
        board: &Board,
        depth: u32,
        score: i32,
        bound_type: BoundType,
        best_move: Option<Move>,
        generation: u16,
    ) {
        let hash = board.hash;
        let signature = PositionSignature::of(board);
        let index = self.index(hash);
        let bucket = &mut self.table[index];

        for slot in bucket.iter_mut() {
            if let Some(existing) = slot {
                if existing.hash == hash {
                    *slot = Some(TTEntry {
                        hash,
                        depth,
                        score,
                        bound_type,
                        best_move,
                        generation,
                        signature,
                    });
                    return;
                }
            }
        }

        for slot in bucket.iter_mut() {
            if slot.is_none() {
                *slot = Some(TTEntry {
                    hash,
                    depth,
                    score,
                    bound_type,
                    best_move,
                    generation,
                    signature,
                });
                self.occupied += 1;
                return;
            }
        }

        let mut replace_idx = 0;
        let mut worst_priority = i32::MAX;

        for (idx, slot) in bucket.iter().enumerate() {
            if let Some(entry) = slot {
                let age = generation.wrapping_sub(entry.generation);
                let priority = entry.depth.saturating_mul(2) as i32 - i32::from(age);
                if idx == 0 || priority < worst_priority {
                    replace_idx = idx;
                    worst_priority = priority;
                }
            }
        }

        bucket[replace_idx] = Some(TTEntry {
            hash,
            depth,
            score,
            bound_type,
            best_move,
            generation,
            signature,
        });
    }

    #[must_use]
    pub fn hashfull_per_mille(&self) -> u32 {
        let total_slots = self.table.len().saturating_mul(4);
        if total_slots == 0 {
            return 0;
        }
        ((self.occupied as u64 * 1000) / total_slots as u64) as u32
    }

    /// Copy the table and drop every entry that cannot be reached from `board`.
    /// Used to hand a ponder worker its own table seeded from the cumulative
    /// one, without letting the worker's writes affect the original.
    #[must_use]
    pub(crate) fn clone_purged(&self, board: &Board) -> Self {
        let mut copy = self.clone();
        copy.purge_unreachable(board);
        copy
    }

    /// Drop every entry that cannot be reached from `board` by further play:
    /// it has more pieces of some type than `board` does, assumes castling
    /// rights `board` no longer has, or places a pawn on a square no current
    /// pawn of that color could still reach.
    pub fn purge_unreachable(&mut self, board: &Board) {
        for bucket in &mut self.table {
            for slot in bucket.iter_mut() {
                let keep = slot
                    .as_ref()
                    .is_some_and(|entry| entry.signature.reachable_from(board));
                if !keep {
                    if slot.take().is_some() {
                        self.occupied -= 1;
                    }
                }
            }
        }
    }
}
