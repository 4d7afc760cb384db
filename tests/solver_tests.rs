mod common;

use common::{exhaustive_solution_set, placements, puzzle, solution_set, solve};
use shapeshifter_solver::Solver;
use std::collections::BTreeSet;

#[test]
fn single_piece_on_single_wrong_cell() {
    let _ = env_logger::builder().is_test(true).try_init();

    // One 1x1 piece, one cell away from uniformity: the only solution
    // places the piece on the cell holding 1.
    let puzzle = puzzle(3, vec![vec![2, 2], vec![2, 1]], vec![vec![vec![1]]]);
    let report = solve(&puzzle);

    assert_eq!(report.solutions.len(), 1);
    assert_eq!(placements(&report.solutions[0]), vec![('A', 1, 1)]);
    assert!(!report.meta.returning_max_one_solution);
    assert!(report.meta.calculation_duration >= 0.0);
}

#[test]
fn infeasible_puzzle_completes_with_no_solutions() {
    let puzzle = puzzle(
        2,
        vec![vec![0, 1, 0], vec![1, 1, 0], vec![0, 0, 0]],
        vec![
            vec![vec![1, 0], vec![1, 1], vec![0, 1]],
            vec![vec![1, 1, 1]],
            vec![vec![1], vec![1], vec![1]],
        ],
    );
    let report = solve(&puzzle);

    assert!(report.solutions.is_empty());
    assert!(exhaustive_solution_set(&puzzle).is_empty());
}

#[test]
fn every_solution_reaches_the_target_everywhere() {
    let puzzle = puzzle(
        2,
        vec![vec![0, 0, 1], vec![0, 0, 1], vec![1, 1, 0]],
        vec![vec![vec![1, 1], vec![1, 1]], vec![vec![1]]],
    );
    let report = solve(&puzzle);

    assert!(!report.solutions.is_empty());
    for solution in &report.solutions {
        let final_board = solution.parts.last().unwrap().after.as_ref().unwrap();
        assert!(final_board.every_value_is(puzzle.target_figure));
    }
}

#[test]
fn every_solution_uses_every_piece_exactly_once() {
    let puzzle = puzzle(
        2,
        vec![vec![1, 1], vec![1, 1]],
        vec![vec![vec![1]], vec![vec![1]]],
    );
    let report = solve(&puzzle);

    assert!(!report.solutions.is_empty());
    for solution in &report.solutions {
        let mut ids: Vec<char> = solution.parts.iter().map(|part| part.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!['A', 'B']);
    }
}

#[test]
fn pruned_search_matches_exhaustive_enumeration() {
    // Two 1x1 pieces on an already uniform 2x2 board: they must cancel each
    // other out, which works on any of the four cells.
    let stacked_pair = puzzle(
        2,
        vec![vec![1, 1], vec![1, 1]],
        vec![vec![vec![1]], vec![vec![1]]],
    );
    // A 2x2 block plus a 1x1, with exactly one way to cover the wrong
    // cells.
    let block_and_dot = puzzle(
        2,
        vec![vec![0, 0, 1], vec![0, 0, 1], vec![1, 1, 0]],
        vec![vec![vec![1, 1], vec![1, 1]], vec![vec![1]]],
    );

    for puzzle in [&stacked_pair, &block_and_dot] {
        let report = solve(puzzle);
        assert_eq!(solution_set(&report), exhaustive_solution_set(puzzle));
    }

    // The pair puzzle has one solution per cell.
    let report = solve(&stacked_pair);
    let expected: BTreeSet<_> = [
        vec![('A', 0, 0), ('B', 0, 0)],
        vec![('A', 1, 0), ('B', 1, 0)],
        vec![('A', 0, 1), ('B', 0, 1)],
        vec![('A', 1, 1), ('B', 1, 1)],
    ]
    .into_iter()
    .collect();
    assert_eq!(solution_set(&report), expected);
}

#[test]
fn spanning_pieces_are_handled_by_the_corner_analysis() {
    // A full-width bar must affect both top corners (or both bottom
    // corners) with every placement.
    let puzzle = puzzle(
        2,
        vec![vec![0, 0], vec![1, 1], vec![1, 1]],
        vec![vec![vec![1, 1]]],
    );
    let report = solve(&puzzle);

    assert_eq!(report.solutions.len(), 1);
    assert_eq!(placements(&report.solutions[0]), vec![('A', 0, 0)]);
    assert_eq!(solution_set(&report), exhaustive_solution_set(&puzzle));
}

#[test]
fn blank_start_search_without_prepared_starts() {
    // Skipping the corner analysis entirely still finds the solution from
    // a single blank start.
    let puzzle = puzzle(3, vec![vec![2, 2], vec![2, 1]], vec![vec![vec![1]]]);

    let solver = Solver::new(&puzzle);
    let report = solver.solve();

    assert_eq!(report.solutions.len(), 1);
    assert_eq!(placements(&report.solutions[0]), vec![('A', 1, 1)]);
    assert_eq!(report.possible_solution_starts.len(), 1);
    assert!(report.possible_solution_starts[0].parts.is_empty());
}

#[test]
fn wrap_around_stacking_needs_full_cycles() {
    // With three figures, a cell already at the target must be covered a
    // multiple of three times to stay correct. Two 1x1 pieces on a 1x1
    // board cannot manage that.
    let two_covers = puzzle(3, vec![vec![2]], vec![vec![vec![1]], vec![vec![1]]]);
    let report = solve(&two_covers);
    assert!(report.solutions.is_empty());

    // 1 + 4 ≡ 2 (mod 3): covering the cell four times reaches the target.
    let cycling = puzzle(
        3,
        vec![vec![1]],
        vec![vec![vec![1]], vec![vec![1]], vec![vec![1]], vec![vec![1]]],
    );
    let report = solve(&cycling);
    assert_eq!(report.solutions.len(), 1);
    assert_eq!(
        placements(&report.solutions[0]),
        vec![('A', 0, 0), ('B', 0, 0), ('C', 0, 0), ('D', 0, 0)]
    );
}

#[test]
fn starts_are_sorted_by_branching_factor() {
    let puzzle = puzzle(
        2,
        vec![vec![0, 0, 1], vec![0, 0, 1], vec![1, 1, 0]],
        vec![vec![vec![1, 1], vec![1, 1]], vec![vec![1]]],
    );

    let mut solver = Solver::new(&puzzle);
    solver.prepare_solution_starts();

    let counts: Vec<f64> = solver
        .possible_solution_starts()
        .iter()
        .map(|start| {
            start
                .continuation
                .as_ref()
                .unwrap()
                .possible_combinations
        })
        .collect();
    let mut sorted = counts.clone();
    sorted.sort_by(f64::total_cmp);
    assert_eq!(counts, sorted);

    for (index, start) in solver.possible_solution_starts().iter().enumerate() {
        assert_eq!(start.start_index, Some(index));
    }
}

#[test]
fn start_snapshots_chain_before_and_after_boards() {
    let puzzle = puzzle(
        2,
        vec![vec![1, 1], vec![1, 1]],
        vec![vec![vec![1]], vec![vec![1]]],
    );

    let mut solver = Solver::new(&puzzle);
    solver.prepare_solution_starts();

    for start in solver.possible_solution_starts() {
        let mut previous = puzzle.board.clone();
        for part in &start.parts {
            assert_eq!(part.before.as_ref().unwrap(), &previous);
            let after = previous.stack(puzzle.figure_count, &[&part.grid]);
            assert_eq!(part.after.as_ref().unwrap(), &after);
            previous = after;
        }
    }
}

#[test]
fn oversized_pieces_make_the_puzzle_infeasible() {
    // The piece does not fit the board at all: zero possible positions,
    // zero solutions, no error.
    let puzzle = puzzle(2, vec![vec![0, 0]], vec![vec![vec![1, 1, 1]]]);
    let report = solve(&puzzle);

    assert!(report.solutions.is_empty());
    assert_eq!(report.meta.total_number_of_possible_combinations, 0.0);
}

#[test]
fn max_one_solution_mode_stops_at_the_first_solution() {
    // 26 plus-shaped pieces on an already solved board: the combination
    // space (9^26) is far past the full-enumeration limit, so the engine
    // commits to a single solution up front.
    let plus: Vec<Vec<i64>> = vec![vec![0, 1, 0], vec![1, 1, 1], vec![0, 1, 0]];
    let board = vec![vec![1; 5]; 5];
    let puzzle = puzzle(2, board, vec![plus; 26]);
    let report = solve(&puzzle);

    assert!(report.meta.returning_max_one_solution);
    assert_eq!(report.solutions.len(), 1);
    // An even stack of identical pieces on one spot cancels out, so the
    // first solution the leftmost descent reaches keeps every piece at the
    // same position.
    let solution = placements(&report.solutions[0]);
    assert!(solution.iter().all(|&(_, x, y)| (x, y) == (solution[0].1, solution[0].2)));
}
