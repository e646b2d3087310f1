//! Score bounds shared by the search and quiescence routines.

/// Scores with absolute value >= this are considered checkmate scores.
pub const MATE_THRESHOLD: i32 = 28000;

/// Maximum score bound for the alpha-beta window.
pub const SCORE_INFINITE: i32 = 30000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_threshold_below_infinite() {
        assert!(MATE_THRESHOLD < SCORE_INFINITE);
        assert!(MATE_THRESHOLD > 10000);
    }
}
