//! Tunable search constants, grouped into a single struct with a `Default`
//! giving the canonical values and piecewise builder-style setters.

#[derive(Clone, Copy, Debug)]
pub struct SearchParams {
    /// Transposition table size in megabytes.
    pub tt_mb: usize,
    /// Worker thread count used by the pondering scheduler.
    pub threads: usize,
    /// Depth reduction applied to the null-move search (`R`).
    pub null_change: u32,
    /// Smallest remaining depth after `null_change` at which null move is tried.
    pub null_min_leftover: u32,
    /// Largest remaining depth after `null_change` at which null move is tried.
    pub null_max_leftover: u32,
    /// Quiescence search is capped at this many plies below its entry point.
    pub quiescence_max_depth: u32,
    /// Generous upper bound on achievable material gain, used for delta pruning.
    pub delta_margin: i32,
    /// Base of the aspiration window opened around the previous iteration's score.
    pub aspiration_base: i32,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            tt_mb: super::DEFAULT_TT_MB,
            threads: 4,
            null_change: 3,
            null_min_leftover: 1,
            null_max_leftover: 8,
            quiescence_max_depth: 10,
            delta_margin: 1100 + 200,
            aspiration_base: 25,
        }
    }
}

impl SearchParams {
    #[must_use]
    pub fn with_tt_mb(mut self, tt_mb: usize) -> Self {
        self.tt_mb = tt_mb;
        self
    }

    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    #[must_use]
    pub fn with_null_move(mut self, change: u32, min_leftover: u32, max_leftover: u32) -> Self {
        self.null_change = change;
        self.null_min_leftover = min_leftover;
        self.null_max_leftover = max_leftover;
        self
    }

    #[must_use]
    pub fn with_quiescence_max_depth(mut self, depth: u32) -> Self {
        self.quiescence_max_depth = depth;
        self
    }
}
