//! Partial and complete placement assignments.
//!
//! A [`PossibleSolution`] starts life as a *prefix* of a full placement
//! (the pieces pinned down by the corner analysis) and grows one part per
//! placed piece during the search. A complete solution is simply a possible
//! solution that uses every piece and whose final board is uniform at the
//! target value.

use crate::grid::{Grid, Position};
use crate::piece::{Piece, PieceId};
use serde::Serialize;

/// One placed piece inside a (partial) solution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionPart {
    /// The id of the placed piece.
    pub id: PieceId,
    /// The top-left placement offset.
    pub position: Position,
    /// The piece on an otherwise empty board-sized grid at `position`.
    pub grid: Grid,
    /// The board before this placement, once the snapshot chain has been
    /// materialized.
    pub before: Option<Grid>,
    /// The board after this placement.
    pub after: Option<Grid>,
}

/// Placement choices for one not-yet-used piece.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementOptions {
    /// The unused piece's id.
    pub id: PieceId,
    /// The piece's influence, used for ordering and for the pruning bound.
    pub cells_influenced: usize,
    /// The positions still open to this piece.
    pub positions: Vec<Position>,
}

/// How a partial solution can still be continued.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationInfo {
    /// Options for every unused piece, ordered by descending influence.
    pub placement_options: Vec<PlacementOptions>,
    /// The number of unused pieces.
    pub unused_count: usize,
    /// The product of the per-piece position counts. Kept as `f64`: the
    /// product overflows any fixed-width integer on large puzzles.
    pub possible_combinations: f64,
}

/// An ordered list of placements, from the empty prefix up to a complete
/// solution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PossibleSolution {
    /// The target figure value the board must reach.
    pub target_value: u8,
    /// The placements so far, in stacking order.
    pub parts: Vec<SolutionPart>,
    /// The index of the solution start this grew from, assigned after the
    /// starts are sorted.
    pub start_index: Option<usize>,
    /// Lazily computed continuation metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation: Option<ContinuationInfo>,
}

impl PossibleSolution {
    /// Create an empty possible solution for the given target value.
    pub fn new(target_value: u8) -> Self {
        PossibleSolution {
            target_value,
            parts: Vec::new(),
            start_index: None,
            continuation: None,
        }
    }

    /// Append a part in stacking order.
    pub fn add(&mut self, part: SolutionPart) {
        self.parts.push(part);
    }

    /// Return a copy with one more part appended. Continuation metadata is
    /// not carried over; it describes the shorter prefix.
    pub fn clone_with(&self, part: SolutionPart) -> Self {
        let mut parts = Vec::with_capacity(self.parts.len() + 1);
        parts.extend(self.parts.iter().cloned());
        parts.push(part);

        PossibleSolution {
            target_value: self.target_value,
            parts,
            start_index: self.start_index,
            continuation: None,
        }
    }

    /// The board after the last placement, or `None` while no piece has
    /// been placed (or the snapshot chain is not materialized yet).
    pub fn final_board(&self) -> Option<&Grid> {
        self.parts.last().and_then(|part| part.after.as_ref())
    }

    /// True if every cell of the final board holds the target value.
    /// Placements exist and their snapshots are materialized by the time
    /// this is asked.
    pub fn is_solution(&self) -> bool {
        self.final_board()
            .is_some_and(|board| board.every_value_is(self.target_value))
    }

    /// Structural equality on the placement sequence: same piece ids at the
    /// same positions in the same order.
    pub fn same_placements(&self, other: &PossibleSolution) -> bool {
        self.parts.len() == other.parts.len()
            && self
                .parts
                .iter()
                .zip(&other.parts)
                .all(|(a, b)| a.id == b.id && a.position == b.position)
    }

    /// Sort the parts by piece id, making prefixes structurally comparable.
    pub fn sort_parts(&mut self) {
        self.parts.sort_by_key(|part| part.id);
    }

    /// True if the piece with the given id has been placed.
    pub fn uses_piece(&self, id: PieceId) -> bool {
        self.parts.iter().any(|part| part.id == id)
    }

    /// Compute and cache which pieces are still unused and where they could
    /// go. Unused pieces are ordered by descending influence, so the search
    /// can rule out hopeless branches as early as possible.
    pub fn compute_continuation(
        &mut self,
        pieces: &[Piece],
        avoid_corners: bool,
    ) -> &ContinuationInfo {
        let mut unused: Vec<&Piece> = pieces
            .iter()
            .filter(|piece| !self.uses_piece(piece.id()))
            .collect();
        unused.sort_by(|a, b| b.cells_influenced().cmp(&a.cells_influenced()));

        let placement_options: Vec<PlacementOptions> = unused
            .iter()
            .map(|piece| PlacementOptions {
                id: piece.id(),
                cells_influenced: piece.cells_influenced(),
                positions: piece.positions(avoid_corners).to_vec(),
            })
            .collect();

        let possible_combinations = placement_options
            .iter()
            .map(|options| options.positions.len() as f64)
            .product();

        self.continuation = Some(ContinuationInfo {
            unused_count: placement_options.len(),
            placement_options,
            possible_combinations,
        });

        self.continuation.as_ref().unwrap()
    }
}
