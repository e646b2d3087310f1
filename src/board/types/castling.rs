//! Castling rights type.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::piece::Color;

pub(crate) const CASTLE_WHITE_K: u8 = 1 << 0;
pub(crate) const CASTLE_WHITE_Q: u8 = 1 << 1;
pub(crate) const CASTLE_BLACK_K: u8 = 1 << 2;
pub(crate) const CASTLE_BLACK_Q: u8 = 1 << 3;

/// All castling rights combined
pub(crate) const ALL_CASTLING_RIGHTS: u8 =
    CASTLE_WHITE_K | CASTLE_WHITE_Q | CASTLE_BLACK_K | CASTLE_BLACK_Q;

/// Castling rights, plus the "castle made" / "castle lost" history flags
/// the evaluator's king-safety term needs (distinct from the live K/Q
/// rights: a right can be lost without ever having castled, or used up
/// by actually castling).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CastlingRights {
    rights: u8,
    /// bit 0 = white castled, bit 1 = black castled
    made: u8,
    /// bit 0 = white has lost both rights without castling, bit 1 = black
    lost: u8,
}

impl CastlingRights {
    /// No castling rights
    #[must_use]
    pub const fn none() -> Self {
        CastlingRights {
            rights: 0,
            made: 0,
            lost: 0,
        }
    }

    /// All castling rights (both sides can castle kingside and queenside)
    #[must_use]
    pub const fn all() -> Self {
        CastlingRights {
            rights: ALL_CASTLING_RIGHTS,
            made: 0,
            lost: 0,
        }
    }

    /// Check if a specific castling right is set
    #[inline]
    #[must_use]
    pub const fn has(self, color: Color, kingside: bool) -> bool {
        let bit = Self::bit_for(color, kingside);
        self.rights & bit != 0
    }

    /// Set a specific castling right
    #[inline]
    pub fn set(&mut self, color: Color, kingside: bool) {
        self.rights |= Self::bit_for(color, kingside);
    }

    /// Remove a specific castling right. If this leaves the color with
    /// neither right and it had never castled, marks "castle lost".
    #[inline]
    pub fn remove(&mut self, color: Color, kingside: bool) {
        self.rights &= !Self::bit_for(color, kingside);
        let color_bit = 1u8 << color.index();
        if !self.has(color, true) && !self.has(color, false) && self.made & color_bit == 0 {
            self.lost |= color_bit;
        }
    }

    /// Record that `color` has just castled: clears both rights for that
    /// color and sets the "castle made" flag instead of "castle lost".
    #[inline]
    pub fn mark_castled(&mut self, color: Color) {
        self.rights &= !Self::bit_for(color, true);
        self.rights &= !Self::bit_for(color, false);
        self.made |= 1u8 << color.index();
    }

    /// True if `color` has castled this game.
    #[inline]
    #[must_use]
    pub const fn has_castled(self, color: Color) -> bool {
        self.made & (1u8 << color.index()) != 0
    }

    /// True if `color` lost both castling rights without ever castling.
    #[inline]
    #[must_use]
    pub const fn has_lost_rights(self, color: Color) -> bool {
        self.lost & (1u8 << color.index()) != 0
    }

    /// Get the raw bitmask value for the live K/Q rights (for Zobrist hashing)
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.rights
    }

    /// Create from raw bitmask value (made/lost flags cleared)
    #[inline]
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        CastlingRights {
            rights: value,
            made: 0,
            lost: 0,
        }
    }

    /// Get the bit for a specific castling right
    #[inline]
    const fn bit_for(color: Color, kingside: bool) -> u8 {
        match (color, kingside) {
            (Color::White, true) => CASTLE_WHITE_K,
            (Color::White, false) => CASTLE_WHITE_Q,
            (Color::Black, true) => CASTLE_BLACK_K,
            (Color::Black, false) => CASTLE_BLACK_Q,
        }
    }
}

pub(crate) fn castle_bit(color: Color, side: char) -> u8 {
    match (color, side) {
        (Color::White, 'K') => CASTLE_WHITE_K,
        (Color::White, 'Q') => CASTLE_WHITE_Q,
        (Color::Black, 'K') => CASTLE_BLACK_K,
        (Color::Black, 'Q') => CASTLE_BLACK_Q,
        _ => 0,
    }
}
