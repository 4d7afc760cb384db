//! The solving engine: solution-start composition from the corner
//! analysis, followed by a branch-and-bound backtracking search over the
//! remaining placements.
//!
//! The search is single-threaded and synchronous. Cancellation is
//! cooperative and coarse-grained: the [`CancelToken`] is checked only
//! between solution starts, never inside the placement recursion, where the
//! check would cost more than it saves.

use crate::corners::{CombinationPart, PieceCombination};
use crate::grid::{Corner, Grid};
use crate::piece::PieceId;
use crate::puzzle::Puzzle;
use crate::solution::{PlacementOptions, PossibleSolution, SolutionPart};
use serde::Serialize;
use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// When the full combination space is larger than this, the engine commits
/// to returning at most one solution.
const MAX_COMBINATIONS_FOR_FULL_ENUMERATION: f64 = 1_000_000.0;

/// When more than this many distinct solution starts are produced, full
/// enumeration is infeasible and the engine returns at most one solution.
const MAX_STARTS_FOR_FULL_ENUMERATION: usize = 500;

/// Minimum time between periodic progress notifications.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// The clock is only consulted once per this many placement attempts.
const PROGRESS_CHECK_STRIDE: u64 = 8192;

/// A cooperative cancellation signal shared between the host and the
/// engine.
///
/// Cloning yields another handle to the same signal. The engine observes a
/// cancellation only between solution starts and then returns early with
/// whatever solutions it has accumulated.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, unsignalled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A one-way status notification emitted while the engine is working.
#[derive(Debug, Clone)]
pub struct ProgressUpdate<'a> {
    /// Free-form human-readable status line.
    pub message: &'a str,
    /// Placement attempts made so far.
    pub placement_attempts: u64,
    /// Complete placements reached so far.
    pub tried_combinations: u64,
    /// Combinations ruled out by the branch-and-bound pruning.
    pub skipped_impossible_situations: f64,
    /// Combinations skipped through the duplicate-situation memo.
    pub skipped_duplicate_situations: f64,
    /// Solutions found so far.
    pub solutions_found: usize,
    /// Time since the solver was created.
    pub elapsed: Duration,
}

/// Receives periodic [`ProgressUpdate`]s. Purely observational: sinks
/// cannot influence the search.
pub trait ProgressSink {
    /// Called roughly every five seconds while the engine is working, plus
    /// once per solution start.
    fn on_progress(&mut self, update: &ProgressUpdate<'_>);
}

/// Counters describing a finished (or cancelled) run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveMeta {
    /// Product of every piece's possible-position count.
    pub total_number_of_possible_combinations: f64,
    /// Complete placements that were actually materialized and tested.
    pub total_number_of_tried_combinations: u64,
    /// Individual piece placements attempted during the search.
    pub total_number_of_placement_attempts: u64,
    /// Whether the engine stops at the first solution.
    pub returning_max_one_solution: bool,
    /// Combinations skipped because an identical (board, remaining pieces)
    /// situation had been explored from an earlier start.
    pub skipped_duplicate_situations: f64,
    /// Combinations ruled out by the influence bound.
    pub skipped_impossible_situations: f64,
    /// Wall-clock duration of the run, in milliseconds.
    pub calculation_duration: f64,
    /// `skipped_impossible_situations` as a percentage of the full
    /// combination space.
    pub percentage_of_combinations_tried: f64,
    /// Skipped situations per second.
    pub throughput: f64,
}

/// The serializable outcome of a run: solutions, the composed solution
/// starts (diagnostics), and the run counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveReport {
    /// Every complete solution found.
    pub solutions: Vec<PossibleSolution>,
    /// The solution starts the search ran from.
    pub possible_solution_starts: Vec<PossibleSolution>,
    /// Run counters.
    pub meta: SolveMeta,
}

/// Enumerates complete placements for a [`Puzzle`].
///
/// ```
/// use shapeshifter_solver::{Puzzle, PuzzleInput, Solver};
///
/// let input: PuzzleInput = serde_json::from_str(
///     r#"{
///         "figures": [0, 1, 2],
///         "gameBoard": [[2, 2], [2, 1]],
///         "puzzlePieces": [[[1]]]
///     }"#,
/// )
/// .unwrap();
/// let puzzle = Puzzle::new(input).unwrap();
///
/// let mut solver = Solver::new(&puzzle);
/// solver.prepare_solution_starts();
/// let report = solver.solve();
///
/// assert_eq!(report.solutions.len(), 1);
/// ```
pub struct Solver<'p> {
    puzzle: &'p Puzzle,
    starts: Vec<PossibleSolution>,
    prepared: bool,
    meta: SolveMeta,
    solutions: Vec<PossibleSolution>,
    seen_situations: HashSet<String>,
    cancel: CancelToken,
    sink: Option<Box<dyn ProgressSink>>,
    started_at: Instant,
    last_progress: Instant,
}

impl<'p> Solver<'p> {
    /// Create a solver for the given puzzle.
    pub fn new(puzzle: &'p Puzzle) -> Self {
        let now = Instant::now();

        Solver {
            puzzle,
            starts: Vec::new(),
            prepared: false,
            meta: SolveMeta {
                total_number_of_possible_combinations: puzzle.total_possible_combinations,
                returning_max_one_solution: puzzle.total_possible_combinations
                    > MAX_COMBINATIONS_FOR_FULL_ENUMERATION,
                ..SolveMeta::default()
            },
            solutions: Vec::new(),
            seen_situations: HashSet::new(),
            cancel: CancelToken::new(),
            sink: None,
            started_at: now,
            last_progress: now,
        }
    }

    /// A handle the host can use to request cancellation from another
    /// thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Install a sink for periodic progress notifications.
    pub fn set_progress_sink(&mut self, sink: Box<dyn ProgressSink>) {
        self.sink = Some(sink);
    }

    /// The composed solution starts. Empty until
    /// [`Self::prepare_solution_starts`] has run.
    pub fn possible_solution_starts(&self) -> &[PossibleSolution] {
        &self.starts
    }

    /// Cross-join the four corners' piece combinations into deduplicated,
    /// board-materialized solution starts, sorted so that the cheapest
    /// continuations are searched first. Idempotent.
    pub fn prepare_solution_starts(&mut self) {
        if self.prepared {
            return;
        }
        let prepare_started = Instant::now();

        let corners = &self.puzzle.corners_info;
        let mut starts: Vec<PossibleSolution> = Vec::new();

        for top_left in &corners[Corner::TopLeft.index()].combinations {
            for top_right in &corners[Corner::TopRight.index()].combinations {
                if !compatible(Corner::TopLeft, top_left, Corner::TopRight, top_right) {
                    continue;
                }

                for bottom_left in &corners[Corner::BottomLeft.index()].combinations {
                    if !compatible(Corner::TopLeft, top_left, Corner::BottomLeft, bottom_left)
                        || !compatible(Corner::TopRight, top_right, Corner::BottomLeft, bottom_left)
                    {
                        continue;
                    }

                    for bottom_right in &corners[Corner::BottomRight.index()].combinations {
                        if !compatible(Corner::TopLeft, top_left, Corner::BottomRight, bottom_right)
                            || !compatible(
                                Corner::TopRight,
                                top_right,
                                Corner::BottomRight,
                                bottom_right,
                            )
                            || !compatible(
                                Corner::BottomLeft,
                                bottom_left,
                                Corner::BottomRight,
                                bottom_right,
                            )
                        {
                            continue;
                        }

                        if let Some(start) = self.compose_start(&[
                            top_left,
                            top_right,
                            bottom_left,
                            bottom_right,
                        ]) {
                            if starts.iter().any(|other| start.same_placements(other)) {
                                continue;
                            }
                            log::trace!("added possible solution start #{}", starts.len() + 1);
                            starts.push(start);
                        }
                    }
                }
            }
        }

        for start in &mut starts {
            start.compute_continuation(&self.puzzle.pieces, true);
        }

        // Cheapest branching factor first.
        starts.sort_by(|a, b| {
            let a = a.continuation.as_ref().unwrap().possible_combinations;
            let b = b.continuation.as_ref().unwrap().possible_combinations;
            a.total_cmp(&b)
        });
        for (index, start) in starts.iter_mut().enumerate() {
            start.start_index = Some(index);
        }

        if starts.len() > MAX_STARTS_FOR_FULL_ENUMERATION {
            self.meta.returning_max_one_solution = true;
        }

        log::info!(
            "prepared {} possible solution starts in {:.2?}",
            starts.len(),
            prepare_started.elapsed(),
        );

        self.starts = starts;
        self.prepared = true;
    }

    /// Merge one compatible 4-tuple of corner combinations into a solution
    /// start, or reject it.
    fn compose_start(&self, combinations: &[&PieceCombination; 4]) -> Option<PossibleSolution> {
        // Merge all parts, deduplicating by piece id so a spanning piece's
        // `affects` is only tallied once.
        let mut merged: Vec<&CombinationPart> = Vec::new();
        for part in combinations.iter().flat_map(|combination| combination.iter()) {
            if !merged.iter().any(|existing| existing.id == part.id) {
                merged.push(part);
            }
        }

        // Every corner's observed affected count must itself be an
        // admissible transform count: a piece can incidentally double-affect
        // a corner through spanning.
        let mut affected_counts = [0usize; 4];
        for part in &merged {
            for &affected in &part.affects {
                affected_counts[affected.index()] += 1;
            }
        }
        for corner in Corner::ALL {
            if !self.puzzle.corners_info[corner.index()]
                .possible_transforms
                .contains(&affected_counts[corner.index()])
            {
                return None;
            }
        }

        // Pieces that cannot avoid the corners must appear in some corner's
        // combination.
        for &required in &self.puzzle.pieces_that_cannot_avoid_corners {
            if !merged.iter().any(|part| part.id == required) {
                return None;
            }
        }

        let mut start = PossibleSolution::new(self.puzzle.target_figure);
        for part in &merged {
            let piece = self.puzzle.piece(part.id);
            start.add(SolutionPart {
                id: part.id,
                position: part.position,
                grid: piece.placement(part.position).clone(),
                before: None,
                after: None,
            });
        }
        start.sort_parts();

        // Materialize the before/after snapshot chain.
        let mut previous = self.puzzle.board.clone();
        for part in &mut start.parts {
            let after = previous.stack(self.puzzle.figure_count, &[&part.grid]);
            part.before = Some(previous);
            part.after = Some(after.clone());
            previous = after;
        }

        Some(start)
    }

    /// Search every solution start and return the accumulated report.
    pub fn solve(self) -> SolveReport {
        self.solve_range(0, usize::MAX)
    }

    /// Search only the solution starts with indices in `[from, to)`,
    /// clamped to the available range. This is the unit of work a future
    /// multi-worker orchestration would hand to each worker.
    pub fn solve_range(mut self, from: usize, to: usize) -> SolveReport {
        // The starts can be skipped entirely when preparing them is not
        // worthwhile; the search then runs once from a blank prefix with
        // unrestricted placements.
        if !self.prepared && self.starts.is_empty() {
            let mut blank = PossibleSolution::new(self.puzzle.target_figure);
            blank.start_index = Some(0);
            self.starts.push(blank);
        }

        let end = to.min(self.starts.len());
        for index in from.min(end)..end {
            if self.cancel.is_cancelled() {
                log::info!(
                    "cancellation requested, returning {} solutions found so far",
                    self.solutions.len(),
                );
                break;
            }

            if self.search_start(index, end).is_break() {
                break;
            }
        }

        self.finalize()
    }

    /// Search all continuations of one solution start. Breaks to stop the
    /// entire run once a solution is found in max-one-solution mode.
    fn search_start(&mut self, index: usize, total: usize) -> ControlFlow<()> {
        let continuation = match self.starts[index].continuation.clone() {
            Some(info) => info,
            None => self.starts[index]
                .compute_continuation(&self.puzzle.pieces, self.prepared)
                .clone(),
        };
        let base = self.starts[index].clone();
        let board_so_far = base
            .final_board()
            .cloned()
            .unwrap_or_else(|| self.puzzle.board.clone());

        log::debug!(
            "searching from possible solution start #{}/{total} ({} possible combinations, {} unused pieces)",
            index + 1,
            continuation.possible_combinations,
            continuation.unused_count,
        );
        let message = format!(
            "searching from possible solution start #{}/{total}",
            index + 1,
        );
        emit_progress(
            &mut self.sink,
            &self.meta,
            self.solutions.len(),
            self.started_at,
            &message,
        );

        if continuation.unused_count == 0 {
            if board_so_far.every_value_is(self.puzzle.target_figure) {
                self.meta.total_number_of_tried_combinations += 1;
                log_solution(&base);
                self.solutions.push(base);
                if self.meta.returning_max_one_solution {
                    log::info!("returning at most one solution, stopping the search");
                    return ControlFlow::Break(());
                }
            }
            return ControlFlow::Continue(());
        }

        if self.same_situation_before(&continuation.placement_options, &board_so_far) {
            log::debug!(
                "already explored this board with the same unused pieces, skipping start #{}",
                index + 1,
            );
            self.meta.skipped_duplicate_situations += continuation.possible_combinations;
            return ControlFlow::Continue(());
        }

        // max_influence_left[k] is the number of cells the last k unused
        // pieces can still change, the bound the pruning compares against.
        let options = &continuation.placement_options;
        let mut max_influence_left = vec![0usize; options.len() + 1];
        for k in 1..=options.len() {
            max_influence_left[k] =
                max_influence_left[k - 1] + options[options.len() - k].cells_influenced;
        }

        let mut context = SearchContext {
            puzzle: self.puzzle,
            target: self.puzzle.target_figure,
            figure_count: self.puzzle.figure_count,
            total_cells: self.puzzle.board.cells(),
            max_influence_left,
            max_one_solution: self.meta.returning_max_one_solution,
            meta: &mut self.meta,
            solutions: &mut self.solutions,
            sink: &mut self.sink,
            started_at: self.started_at,
            last_progress: &mut self.last_progress,
        };

        let flow = context.place(&board_so_far, &base, options);
        if flow.is_break() {
            log::info!("returning at most one solution, stopping the search");
        }
        flow
    }

    /// Duplicate-situation memo, keyed by the sorted remaining piece ids
    /// plus the board's canonical encoding. Only ever consulted at the top
    /// of a start; applying it inside the recursion would consume unbounded
    /// memory relative to the search depth.
    fn same_situation_before(&mut self, options: &[PlacementOptions], board: &Grid) -> bool {
        let mut ids: Vec<PieceId> = options.iter().map(|options| options.id).collect();
        ids.sort_unstable();

        let mut key: String = ids.into_iter().collect();
        key.push_str(&board.canonical_key());

        !self.seen_situations.insert(key)
    }

    /// Fill in the derived counters and assemble the report.
    fn finalize(mut self) -> SolveReport {
        let elapsed = self.started_at.elapsed();
        self.meta.calculation_duration = elapsed.as_secs_f64() * 1000.0;
        self.meta.percentage_of_combinations_tried =
            if self.meta.total_number_of_possible_combinations > 0.0 {
                self.meta.skipped_impossible_situations
                    / self.meta.total_number_of_possible_combinations
                    * 100.0
            } else {
                0.0
            };
        self.meta.throughput = if elapsed.as_secs_f64() > 0.0 {
            self.meta.skipped_impossible_situations / elapsed.as_secs_f64()
        } else {
            0.0
        };

        log::info!(
            "finished: {} solutions, {} tried combinations, {} placement attempts, {} skipped impossible, {} skipped duplicate, {:.0} ms",
            self.solutions.len(),
            self.meta.total_number_of_tried_combinations,
            self.meta.total_number_of_placement_attempts,
            self.meta.skipped_impossible_situations,
            self.meta.skipped_duplicate_situations,
            self.meta.calculation_duration,
        );

        SolveReport {
            solutions: self.solutions,
            possible_solution_starts: self.starts,
            meta: self.meta,
        }
    }
}

/// The mutable state threaded through the placement recursion.
struct SearchContext<'a, 'p> {
    puzzle: &'p Puzzle,
    target: u8,
    figure_count: usize,
    total_cells: usize,
    max_influence_left: Vec<usize>,
    max_one_solution: bool,
    meta: &'a mut SolveMeta,
    solutions: &'a mut Vec<PossibleSolution>,
    sink: &'a mut Option<Box<dyn ProgressSink>>,
    started_at: Instant,
    last_progress: &'a mut Instant,
}

impl SearchContext<'_, '_> {
    /// Try every position of the first unused piece, recursing into the
    /// rest. Breaks once a solution is found in max-one-solution mode.
    fn place(
        &mut self,
        board: &Grid,
        base: &PossibleSolution,
        options: &[PlacementOptions],
    ) -> ControlFlow<()> {
        let (current, rest) = options
            .split_first()
            .expect("the placement recursion is entered with at least one unused piece");
        let piece = self.puzzle.piece(current.id);

        for &position in &current.positions {
            self.meta.total_number_of_placement_attempts += 1;
            self.maybe_emit_progress();

            let mask = piece.placement(position);
            let after = board.stack(self.figure_count, &[mask]);

            // A placement changes at most `cells_influenced` cells, so if
            // more cells are wrong than the remaining pieces can still
            // reach, the whole subtree is hopeless.
            let incorrect_cells = self.total_cells - after.count_value(self.target);
            if incorrect_cells > self.max_influence_left[rest.len()] {
                let skipped: f64 = rest
                    .iter()
                    .map(|options| options.positions.len() as f64)
                    .product();
                self.meta.skipped_impossible_situations += skipped;
                continue;
            }

            let result = base.clone_with(SolutionPart {
                id: current.id,
                position,
                grid: mask.clone(),
                before: Some(board.clone()),
                after: Some(after.clone()),
            });

            if rest.is_empty() {
                self.meta.total_number_of_tried_combinations += 1;
                if after.every_value_is(self.target) {
                    log_solution(&result);
                    self.solutions.push(result);
                    if self.max_one_solution {
                        return ControlFlow::Break(());
                    }
                }
                continue;
            }

            if self.place(&after, &result, rest).is_break() {
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    /// Emit a periodic status notification. The clock is consulted on a
    /// coarse attempt-count stride to keep the hot loop cheap.
    fn maybe_emit_progress(&mut self) {
        if self.meta.total_number_of_placement_attempts % PROGRESS_CHECK_STRIDE != 0 {
            return;
        }
        if self.last_progress.elapsed() < PROGRESS_INTERVAL {
            return;
        }
        *self.last_progress = Instant::now();

        let message = format!(
            "still searching: {} placement attempts, {:.0} skipped impossible situations, {} solutions so far",
            self.meta.total_number_of_placement_attempts,
            self.meta.skipped_impossible_situations,
            self.solutions.len(),
        );
        log::info!("{message}");
        emit_progress(
            self.sink,
            self.meta,
            self.solutions.len(),
            self.started_at,
            &message,
        );
    }
}

/// Check whether two corners' combinations can coexist: a piece recorded as
/// affecting the other corner must be used by that corner's combination,
/// and a piece shared by both must sit at one and the same position.
fn compatible(
    corner_a: Corner,
    combination_a: &PieceCombination,
    corner_b: Corner,
    combination_b: &PieceCombination,
) -> bool {
    for part in combination_a {
        if part.affects.contains(&corner_b)
            && !combination_b.iter().any(|other| other.id == part.id)
        {
            return false;
        }
    }
    for part in combination_b {
        if part.affects.contains(&corner_a)
            && !combination_a.iter().any(|other| other.id == part.id)
        {
            return false;
        }
    }

    for part in combination_a {
        if let Some(other) = combination_b.iter().find(|other| other.id == part.id) {
            if other.position != part.position {
                return false;
            }
        }
    }

    true
}

fn emit_progress(
    sink: &mut Option<Box<dyn ProgressSink>>,
    meta: &SolveMeta,
    solutions_found: usize,
    started_at: Instant,
    message: &str,
) {
    if let Some(sink) = sink.as_mut() {
        sink.on_progress(&ProgressUpdate {
            message,
            placement_attempts: meta.total_number_of_placement_attempts,
            tried_combinations: meta.total_number_of_tried_combinations,
            skipped_impossible_situations: meta.skipped_impossible_situations,
            skipped_duplicate_situations: meta.skipped_duplicate_situations,
            solutions_found,
            elapsed: started_at.elapsed(),
        });
    }
}

fn log_solution(solution: &PossibleSolution) {
    let placements: Vec<String> = solution
        .parts
        .iter()
        .map(|part| format!("{} at {}", part.id, part.position))
        .collect();
    log::info!("found solution: {}", placements.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Position;

    fn part(id: PieceId, x: usize, y: usize, affects: Vec<Corner>) -> CombinationPart {
        CombinationPart {
            id,
            position: Position::new(x, y),
            affects,
        }
    }

    #[test]
    fn cancel_token_signals_all_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn compatible_accepts_disjoint_combinations() {
        let a = vec![part('A', 0, 0, vec![Corner::TopLeft])];
        let b = vec![part('B', 3, 0, vec![Corner::TopRight])];
        assert!(compatible(Corner::TopLeft, &a, Corner::TopRight, &b));
    }

    #[test]
    fn compatible_rejects_unreciprocated_cross_effect() {
        // A's piece also reaches the top right corner, but the top right
        // combination does not use it.
        let a = vec![part('A', 0, 0, vec![Corner::TopLeft, Corner::TopRight])];
        let b = vec![part('B', 3, 0, vec![Corner::TopRight])];
        assert!(!compatible(Corner::TopLeft, &a, Corner::TopRight, &b));

        // Once the other combination uses the same piece, they agree.
        let b = vec![
            part('A', 0, 0, vec![Corner::TopRight, Corner::TopLeft]),
            part('B', 3, 0, vec![Corner::TopRight]),
        ];
        let a = vec![part('A', 0, 0, vec![Corner::TopLeft, Corner::TopRight])];
        assert!(compatible(Corner::TopLeft, &a, Corner::TopRight, &b));
    }

    #[test]
    fn compatible_rejects_same_piece_at_different_positions() {
        let a = vec![part('A', 0, 0, vec![Corner::TopLeft])];
        let b = vec![part('A', 3, 0, vec![Corner::TopRight])];
        assert!(!compatible(Corner::TopLeft, &a, Corner::TopRight, &b));
    }

    #[test]
    fn empty_combinations_are_always_compatible() {
        let empty: PieceCombination = Vec::new();
        let other = vec![part('A', 0, 0, vec![Corner::TopLeft])];
        assert!(compatible(Corner::TopLeft, &empty, Corner::TopRight, &other));
        assert!(compatible(Corner::TopLeft, &empty, Corner::BottomLeft, &empty));
    }
}
