use shapeshifter_solver::{
    FigureName, PossibleSolution, Puzzle, PuzzleInput, SolveReport, Solver,
};
use std::collections::BTreeSet;

/// A complete placement assignment in normalized form: `(piece id, x, y)`
/// sorted by piece id.
#[allow(dead_code)]
pub type Placements = Vec<(char, usize, usize)>;

/// Build a [`PuzzleInput`] with numeric figure names `0..figures`.
#[allow(dead_code)]
pub fn input(
    figures: usize,
    game_board: Vec<Vec<i64>>,
    puzzle_pieces: Vec<Vec<Vec<i64>>>,
) -> PuzzleInput {
    PuzzleInput {
        figures: (0..figures as i64).map(FigureName::Index).collect(),
        game_board,
        puzzle_pieces,
    }
}

/// Build a puzzle straight from raw fixture data.
///
/// # Panics
///  - If the fixture violates an input constraint.
#[allow(dead_code)]
pub fn puzzle(
    figures: usize,
    game_board: Vec<Vec<i64>>,
    puzzle_pieces: Vec<Vec<Vec<i64>>>,
) -> Puzzle {
    Puzzle::new(input(figures, game_board, puzzle_pieces)).unwrap()
}

/// Run the full pipeline: prepare solution starts, then search everything.
#[allow(dead_code)]
pub fn solve(puzzle: &Puzzle) -> SolveReport {
    let mut solver = Solver::new(puzzle);
    solver.prepare_solution_starts();
    solver.solve()
}

/// Normalize a solution into id-sorted `(id, x, y)` triples.
#[allow(dead_code)]
pub fn placements(solution: &PossibleSolution) -> Placements {
    let mut placements: Placements = solution
        .parts
        .iter()
        .map(|part| (part.id, part.position.x, part.position.y))
        .collect();
    placements.sort_unstable();
    placements
}

/// Normalize every solution of a report into a comparable set.
#[allow(dead_code)]
pub fn solution_set(report: &SolveReport) -> BTreeSet<Placements> {
    report.solutions.iter().map(placements).collect()
}

/// Reference enumerator: try every assignment of one position per piece,
/// with no pruning, no corner analysis and no memoization, and collect the
/// assignments whose stacked board is uniform at the target.
///
/// Only usable on tiny fixtures; pairs with [`solution_set`] to check
/// pruning and memoization soundness.
#[allow(dead_code)]
pub fn exhaustive_solution_set(puzzle: &Puzzle) -> BTreeSet<Placements> {
    let mut solutions = BTreeSet::new();
    let mut chosen = Vec::with_capacity(puzzle.pieces.len());
    enumerate(puzzle, &puzzle.board, &mut chosen, &mut solutions);
    solutions
}

fn enumerate(
    puzzle: &Puzzle,
    board: &shapeshifter_solver::Grid,
    chosen: &mut Placements,
    solutions: &mut BTreeSet<Placements>,
) {
    if chosen.len() == puzzle.pieces.len() {
        if board.every_value_is(puzzle.target_figure) {
            let mut placements = chosen.clone();
            placements.sort_unstable();
            solutions.insert(placements);
        }
        return;
    }

    let piece = &puzzle.pieces[chosen.len()];
    for &position in piece.possible_positions() {
        let after = board.stack(puzzle.figure_count, &[piece.placement(position)]);
        chosen.push((piece.id(), position.x, position.y));
        enumerate(puzzle, &after, chosen, solutions);
        chosen.pop();
    }
}
