//! Engine controller implementation.
//!
//! Besides a plain single-search job launcher, this module owns the
//! pondering scheduler: while waiting for the opponent to move, up to
//! `num_parallel_searches` deep searches run concurrently, one per
//! hypothesized opponent reply, coordinated through a shared mutex and
//! condition variable as described for the game controller.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::board::{
    ranked_root_moves, search, Board, Move, SearchConfig, SearchInfoCallback, SearchResult,
    SearchState,
};

/// Search thread stack size (32 MB)
const SEARCH_STACK_SIZE: usize = 32 * 1024 * 1024;
const HARD_STOP_MARGIN_MS: u64 = 5;

/// Maximum sleep duration when polling time limits (avoids excessive CPU wake-ups)
const MAX_POLL_SLEEP_MS: u64 = 5;

/// Poll interval when waiting for ponder to complete
const PONDER_POLL_MS: u64 = 10;

/// Default number of concurrent ponder searches (one per opponent hypothesis).
pub const DEFAULT_PARALLEL_SEARCHES: usize = 4;

/// How long the opponent-reply sweep gets to rank hypotheses before the deep
/// searches are launched.
const HYPOTHESIS_SWEEP_MS: u64 = 750;

/// Depth cap for the ranking sweep: deep enough to order candidates
/// sensibly, shallow enough to fit comfortably inside `HYPOTHESIS_SWEEP_MS`.
const HYPOTHESIS_SWEEP_DEPTH: u32 = 8;

/// Active search job state
pub struct SearchJob {
    /// Stop flag for the search
    pub stop: Arc<AtomicBool>,
    /// Clock for time management
    pub clock: Arc<crate::board::SearchClock>,
    /// Whether we're currently pondering
    pub pondering: Arc<AtomicBool>,
    /// Planned soft time limit (for ponderhit)
    pub planned_soft_time_ms: u64,
    /// Planned hard time limit (for ponderhit)
    pub planned_hard_time_ms: u64,
    /// Handle to the search thread
    handle: JoinHandle<()>,
    /// Optional handle to the timer thread enforcing hard stops
    timer_handle: Option<JoinHandle<()>>,
}

impl SearchJob {
    /// Stop the search and wait for the thread to finish
    pub fn stop_and_wait(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
        if let Some(timer) = self.timer_handle {
            let _ = timer.join();
        }
    }

    /// Signal stop without waiting
    pub fn signal_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        self.pondering.store(false, Ordering::Relaxed);
    }

    /// Handle ponderhit - transition from pondering to real search
    pub fn ponderhit(&self) {
        if self.pondering.load(Ordering::Relaxed) {
            let start = Instant::now();
            let hard_deadline = start + Duration::from_millis(self.planned_hard_time_ms);
            self.clock.reset(
                start,
                Some(start + Duration::from_millis(self.planned_soft_time_ms)),
                Some(hard_deadline),
            );

            let stop_timer = Arc::clone(&self.stop);
            thread::spawn(move || {
                let now = Instant::now();
                if hard_deadline > now {
                    thread::sleep(hard_deadline - now);
                }
                stop_timer.store(true, Ordering::Relaxed);
            });

            self.pondering.store(false, Ordering::Relaxed);
        }
    }
}

/// Search parameters for starting a new search
#[derive(Default)]
pub struct SearchParams {
    /// Maximum depth to search (None = unlimited)
    pub depth: Option<u32>,
    /// Soft time limit in milliseconds
    pub soft_time_ms: u64,
    /// Hard time limit in milliseconds
    pub hard_time_ms: u64,
    /// Whether to ponder (think on opponent's time)
    pub ponder: bool,
    /// Whether to search infinitely
    pub infinite: bool,
}

/// Engine controller managing a single foreground search.
pub struct EngineController {
    /// Current board position
    board: Board,
    /// Search state (transposition table, killers, etc.)
    search_state: Arc<Mutex<SearchState>>,
    /// Active search job (if any)
    current_job: Option<SearchJob>,
    /// Optional callback for per-iteration search info
    info_callback: Option<SearchInfoCallback>,
}

impl EngineController {
    /// Create a new engine controller
    #[must_use]
    pub fn new(tt_mb: usize) -> Self {
        EngineController {
            board: Board::new(),
            search_state: Arc::new(Mutex::new(SearchState::new(tt_mb))),
            current_job: None,
            info_callback: None,
        }
    }

    /// Get a reference to the current board
    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Get a mutable reference to the current board
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    /// Set the board position
    pub fn set_board(&mut self, board: Board) {
        self.stop_search();
        self.board = board;
    }

    /// Get a reference to the search state
    #[must_use]
    pub fn search_state(&self) -> &Arc<Mutex<SearchState>> {
        &self.search_state
    }

    /// Reset the board to starting position
    pub fn new_game(&mut self) {
        self.stop_search();
        self.board = Board::new();
        let mut state = self.search_state.lock();
        state.new_search();
    }

    /// Stop any active search
    pub fn stop_search(&mut self) {
        if let Some(job) = self.current_job.take() {
            job.stop_and_wait();
        }
    }

    /// Signal stop to active search (non-blocking)
    pub fn signal_stop(&mut self) {
        if let Some(job) = &self.current_job {
            job.signal_stop();
        }
    }

    /// Handle ponderhit
    pub fn ponderhit(&mut self) {
        if let Some(job) = &self.current_job {
            job.ponderhit();
        }
    }

    /// Check if there's an active search
    #[must_use]
    pub fn is_searching(&self) -> bool {
        self.current_job.is_some()
    }

    fn build_deadlines(
        params: &SearchParams,
        start: Instant,
    ) -> (Option<Instant>, Option<Instant>) {
        if params.infinite || params.ponder {
            return (None, None);
        }

        let soft_deadline = if params.soft_time_ms > 0 {
            Some(start + Duration::from_millis(params.soft_time_ms))
        } else {
            None
        };

        let hard_deadline = if params.hard_time_ms > 0 {
            Some(
                start
                    + Duration::from_millis(
                        params.hard_time_ms.saturating_sub(HARD_STOP_MARGIN_MS),
                    ),
            )
        } else {
            None
        };

        (soft_deadline, hard_deadline)
    }

    fn build_search_config(&self, params: &SearchParams, node_limit: u64) -> SearchConfig {
        let mut config = if let Some(d) = params.depth {
            SearchConfig::depth(d)
        } else {
            SearchConfig::default()
        };

        if !params.infinite && !params.ponder && params.soft_time_ms > 0 {
            config.time_limit_ms = params.soft_time_ms;
        }
        if node_limit > 0 {
            config = config.with_nodes(node_limit);
        }
        if let Some(cb) = &self.info_callback {
            config = config.with_info_callback(cb.clone());
        }
        config
    }

    fn spawn_hard_stop_timer(
        hard_deadline: Option<Instant>,
        stop: Arc<AtomicBool>,
    ) -> Option<JoinHandle<()>> {
        hard_deadline.map(|deadline| {
            thread::spawn(move || loop {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                let now = Instant::now();
                if now >= deadline {
                    stop.store(true, Ordering::Relaxed);
                    break;
                }
                let sleep_for = (deadline - now).min(Duration::from_millis(MAX_POLL_SLEEP_MS));
                thread::sleep(sleep_for);
            })
        })
    }

    /// Start a search with the given parameters
    ///
    /// The `on_complete` callback is called when the search finishes with the result.
    #[allow(clippy::needless_pass_by_value)] // Params is small and intentionally consumed
    pub fn start_search<F>(&mut self, params: SearchParams, on_complete: F)
    where
        F: FnOnce(SearchResult) + Send + 'static,
    {
        self.stop_search();

        let node_limit = {
            let mut guard = self.search_state.lock();
            guard.new_search();
            guard.stats.max_nodes
        };

        let stop = Arc::new(AtomicBool::new(false));
        let start = Instant::now();

        let (soft_deadline, hard_deadline) = Self::build_deadlines(&params, start);

        let clock = Arc::new(crate::board::SearchClock::new(
            start,
            soft_deadline,
            hard_deadline,
        ));
        let pondering = Arc::new(AtomicBool::new(params.ponder));

        let timer_handle = if !params.infinite
            && !params.ponder
            && params.depth.is_none()
            && params.hard_time_ms > 0
        {
            Self::spawn_hard_stop_timer(hard_deadline, Arc::clone(&stop))
        } else {
            None
        };

        let mut search_board = self.board.clone();
        let search_state = Arc::clone(&self.search_state);
        let stop_clone = Arc::clone(&stop);
        let pondering_clone = Arc::clone(&pondering);
        let config = self.build_search_config(&params, node_limit);

        let handle = thread::Builder::new()
            .name("search".to_string())
            .stack_size(SEARCH_STACK_SIZE)
            .spawn(move || {
                let mut guard = search_state.lock();
                let result: SearchResult =
                    search(&mut search_board, &mut guard, config, &stop_clone);

                while pondering_clone.load(Ordering::Relaxed) && !stop_clone.load(Ordering::Relaxed)
                {
                    thread::sleep(Duration::from_millis(PONDER_POLL_MS));
                }

                on_complete(result);
            })
            .expect("failed to spawn search thread");

        self.current_job = Some(SearchJob {
            stop,
            clock,
            pondering,
            planned_soft_time_ms: params.soft_time_ms,
            planned_hard_time_ms: params.hard_time_ms,
            handle,
            timer_handle,
        });
    }

    /// Execute a closure with mutable access to the search state.
    pub fn with_search_state<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut SearchState) -> R,
    {
        Some(f(&mut self.search_state.lock()))
    }

    /// Execute a closure with immutable access to the search state.
    pub fn with_search_state_ref<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&SearchState) -> R,
    {
        Some(f(&self.search_state.lock()))
    }

    /// Resize the transposition table
    pub fn resize_hash(&mut self, mb: usize) {
        self.stop_search();
        self.with_search_state(|state| state.reset_tables(mb));
    }

    /// Set trace/debug mode
    pub fn set_trace(&mut self, trace: bool) {
        self.with_search_state(|state| state.set_trace(trace));
    }

    /// Set maximum nodes for search
    pub fn set_max_nodes(&mut self, nodes: u64) {
        self.with_search_state(|state| state.set_max_nodes(nodes));
    }

    /// Set callback for iteration info reporting.
    pub fn set_info_callback(&mut self, cb: Option<SearchInfoCallback>) {
        self.info_callback = cb;
    }
}

// ============================================================================
// Pondering scheduler
// ============================================================================

/// A ponder search that finished on its own (reached its depth cap) rather
/// than being cancelled, together with the table it searched with.
struct Completed {
    opponent_move: Move,
    result: SearchResult,
    state: SearchState,
}

struct Shared {
    /// Hypotheses not yet given a worker, ranked best-first.
    pending: VecDeque<Move>,
    /// Opponent moves with a worker currently running, and that worker's
    /// cancellation token.
    active: Vec<(Move, Arc<AtomicBool>)>,
    /// Bounded FIFO of workers that ran to completion instead of being
    /// cancelled.
    completed: VecDeque<Completed>,
}

/// Coordinates up to `num_parallel` concurrent searches, one per
/// hypothesized opponent reply, while it is the opponent's turn to think.
///
/// Exactly the state in `Shared` is touched by more than one thread; it is
/// guarded by a single mutex, and `condvar` is notified whenever a worker
/// finishes or is told to stop.
pub struct Ponderer {
    num_parallel: usize,
    shared: Arc<Mutex<Shared>>,
    condvar: Arc<Condvar>,
    workers: Vec<JoinHandle<()>>,
}

/// What to do with an in-flight ponder once the opponent's actual move is
/// known.
pub enum PonderOutcome {
    /// One of the hypotheses matched and finished: here is its result and
    /// the search state (including its table), which becomes the new
    /// cumulative state.
    Adopted(SearchResult, SearchState),
    /// No hypothesis matched (or none had started); the caller must launch
    /// a fresh direct search from the given cumulative state.
    Miss,
}

impl Ponderer {
    #[must_use]
    pub fn new(num_parallel: usize) -> Self {
        Ponderer {
            num_parallel: num_parallel.max(1),
            shared: Arc::new(Mutex::new(Shared {
                pending: VecDeque::new(),
                active: Vec::new(),
                completed: VecDeque::new(),
            })),
            condvar: Arc::new(Condvar::new()),
            workers: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_pondering(&self) -> bool {
        let shared = self.shared.lock();
        !shared.active.is_empty() || !shared.pending.is_empty()
    }

    /// Rank the opponent's likely replies to `board` via a brief sweep, then
    /// launch up to `num_parallel` deep searches, one per top hypothesis,
    /// each against its own purged copy of `cumulative`'s table.
    ///
    /// `board` is the position with the opponent to move (i.e. after our
    /// own move has already been made).
    pub fn start(&mut self, board: &Board, cumulative: &mut SearchState) {
        self.stop_all();

        let sweep_stop = Arc::new(AtomicBool::new(false));
        let timer_stop = Arc::clone(&sweep_stop);
        let timer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(HYPOTHESIS_SWEEP_MS));
            timer_stop.store(true, Ordering::Relaxed);
        });
        let mut sweep_board = board.clone();
        let candidates = ranked_root_moves(
            &mut sweep_board,
            cumulative,
            HYPOTHESIS_SWEEP_DEPTH,
            &sweep_stop,
        );
        sweep_stop.store(true, Ordering::Relaxed);
        let _ = timer.join();

        let mut hypotheses: VecDeque<Move> = candidates
            .into_iter()
            .take(self.num_parallel * 2)
            .map(|(mv, _)| mv)
            .collect();
        if hypotheses.is_empty() {
            // No legal reply ranked (e.g. opponent is checkmated/stalemated
            // in this line): nothing to ponder.
            return;
        }

        let shared_arc = Arc::clone(&self.shared);
        let mut shared = shared_arc.lock();
        while shared.active.len() < self.num_parallel {
            let Some(mv) = hypotheses.pop_front() else {
                break;
            };
            let handle = Self::spawn_worker(
                &shared_arc,
                &self.condvar,
                self.num_parallel,
                board,
                cumulative,
                mv,
                &mut shared,
            );
            self.workers.push(handle);
        }
        shared.pending = hypotheses;
    }

    fn spawn_worker(
        shared_arc: &Arc<Mutex<Shared>>,
        condvar: &Arc<Condvar>,
        completed_cap: usize,
        board: &Board,
        cumulative: &SearchState,
        opponent_move: Move,
        shared: &mut Shared,
    ) -> JoinHandle<()> {
        let mut worker_board = board.clone();
        worker_board.make_move(opponent_move);

        let tt = cumulative.tables.tt.clone_purged(&worker_board);
        let mut worker_state = SearchState::with_tt(tt);
        worker_state.set_params(*cumulative.params());

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let shared_handle = Arc::clone(shared_arc);
        let condvar = Arc::clone(condvar);

        let handle = thread::Builder::new()
            .name("ponder".to_string())
            .stack_size(SEARCH_STACK_SIZE)
            .spawn(move || {
                let result = search(
                    &mut worker_board,
                    &mut worker_state,
                    SearchConfig::default(),
                    &worker_stop,
                );

                let mut shared = shared_handle.lock();
                shared.active.retain(|(mv, _)| *mv != opponent_move);
                if !worker_stop.load(Ordering::Relaxed) {
                    // Ran to its depth cap rather than being cancelled: keep
                    // the result around in case the opponent plays into it.
                    if shared.completed.len() >= completed_cap {
                        shared.completed.pop_front();
                    }
                    shared.completed.push_back(Completed {
                        opponent_move,
                        result,
                        state: worker_state,
                    });
                }
                condvar.notify_all();
            })
            .expect("failed to spawn ponder thread");

        shared.active.push((opponent_move, stop));
        handle
    }

    /// The opponent played `opponent_move`. Cancel every other hypothesis;
    /// if this one matches an active or completed search, wait for (or
    /// take) its result and adopt its table as the new cumulative one.
    /// Otherwise the caller should launch a fresh direct search.
    pub fn on_opponent_move(&mut self, opponent_move: Move, max_wait: Duration) -> PonderOutcome {
        let mut shared = self.shared.lock();

        for (mv, stop) in &shared.active {
            if *mv != opponent_move {
                stop.store(true, Ordering::Relaxed);
            }
        }
        if let Some(pos) = shared
            .completed
            .iter()
            .position(|c| c.opponent_move == opponent_move)
        {
            let completed = shared.completed.remove(pos).expect("checked above");
            drop(shared);
            self.join_workers();
            return PonderOutcome::Adopted(completed.result, completed.state);
        }

        let matched_active = shared.active.iter().any(|(mv, _)| *mv == opponent_move);
        if !matched_active {
            drop(shared);
            self.stop_all();
            return PonderOutcome::Miss;
        }

        let deadline = Instant::now() + max_wait;
        loop {
            if let Some(pos) = shared
                .completed
                .iter()
                .position(|c| c.opponent_move == opponent_move)
            {
                let completed = shared.completed.remove(pos).expect("checked above");
                drop(shared);
                self.join_workers();
                return PonderOutcome::Adopted(completed.result, completed.state);
            }
            let now = Instant::now();
            if now >= deadline || shared.active.iter().all(|(mv, _)| *mv != opponent_move) {
                break;
            }
            let timeout = (deadline - now).min(Duration::from_millis(50));
            self.condvar.wait_for(&mut shared, timeout);
        }

        // Matching worker didn't finish in time or vanished without
        // reporting: cancel it too and fall back to a fresh search.
        if let Some((_, stop)) = shared.active.iter().find(|(mv, _)| *mv == opponent_move) {
            stop.store(true, Ordering::Relaxed);
        }
        drop(shared);
        self.stop_all();
        PonderOutcome::Miss
    }

    /// Cancel every in-flight hypothesis and drop anything completed.
    pub fn stop_all(&mut self) {
        {
            let mut shared = self.shared.lock();
            for (_, stop) in &shared.active {
                stop.store(true, Ordering::Relaxed);
            }
            shared.pending.clear();
            shared.completed.clear();
        }
        self.join_workers();
    }

    fn join_workers(&mut self) {
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        self.shared.lock().active.clear();
    }
}

impl Drop for Ponderer {
    fn drop(&mut self) {
        self.stop_all();
    }
}

impl Default for Ponderer {
    fn default() -> Self {
        Ponderer::new(DEFAULT_PARALLEL_SEARCHES)
    }
}
