#![deny(missing_docs)]

//! Solver for "Shapeshifter"-style stacking puzzles: a rectangular board of
//! cells, each holding one of `N` cyclic figure states, must be driven to a
//! single target state by placing a fixed multiset of binary-shaped pieces.
//! Each placement adds `1 (mod N)` to the cells it covers; pieces only
//! translate, they never rotate or reflect.
//!
//! Solving runs in two phases:
//!
//! 1. **Setup**: the four board corners are special. Only pieces whose
//!    shape has an active cell at a corner can reach it, and then only in
//!    one forced, flush-against-the-corner placement. For each corner the
//!    admissible cover counts follow from modular arithmetic
//!    ([`corners`]); cross-joining the corners' piece combinations yields a
//!    list of *possible solution starts*, partial placements every solution
//!    must extend.
//! 2. **Search**: for each start, the remaining pieces are placed by a
//!    branch-and-bound recursion ([`Solver`]) that prunes subtrees in which
//!    more cells are wrong than the unplaced pieces can still change, and
//!    skips whole starts whose (board, remaining pieces) situation was
//!    already explored.
//!
//! Infeasible puzzles are not errors: the report simply carries an empty
//! solution list. When the combination space is too large to enumerate
//! exhaustively, the engine returns at most one solution and says so in the
//! report's meta counters.

pub mod corners;
pub mod grid;
pub mod piece;
pub mod puzzle;
pub mod solution;
pub mod solver;

pub use grid::{Corner, Grid, Position};
pub use piece::{Piece, PieceId};
pub use puzzle::{Figure, FigureName, Puzzle, PuzzleError, PuzzleInput};
pub use solution::{PossibleSolution, SolutionPart};
pub use solver::{
    CancelToken, ProgressSink, ProgressUpdate, SolveMeta, SolveReport, Solver,
};
