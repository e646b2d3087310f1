//! Engine controller for managing search and game state.
//!
//! Provides a single-search job launcher plus the pondering scheduler that
//! the `XBoard` handler drives while it is the opponent's turn to move.

mod controller;
pub mod time;

pub use controller::{
    EngineController, PonderOutcome, Ponderer, SearchJob, SearchParams, DEFAULT_PARALLEL_SEARCHES,
};
pub use time::{build_search_request, compute_time_limits, TimeConfig, TimeControl};
