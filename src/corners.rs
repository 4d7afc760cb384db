//! Per-corner constraint analysis.
//!
//! A placement contributes exactly one `+1 (mod figure_count)` increment to
//! every covered cell, so the number of pieces covering a corner cell fully
//! determines that corner's final value. This module computes, for each
//! board corner, how many covering pieces are admissible and which concrete
//! piece subsets (with their forced flush-against-the-corner placements)
//! realize an admissible count.

use crate::grid::{Corner, Grid, Position};
use crate::piece::{Piece, PieceId};
use serde::Serialize;

/// One piece of a per-corner combination: the piece, its forced placement,
/// and every corner that placement touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinationPart {
    /// The piece identifier.
    pub id: PieceId,
    /// The unique translation placing the piece flush against the corner.
    pub position: Position,
    /// All corners affected by this placement, the combination's own corner
    /// first.
    pub affects: Vec<Corner>,
}

/// A set of pieces jointly covering one corner, sorted by piece id.
pub type PieceCombination = Vec<CombinationPart>;

/// The modular-arithmetic constraints and admissible piece combinations of
/// a single board corner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CornerInfo {
    /// Which corner this describes.
    pub corner: Corner,
    /// The board's value at this corner.
    pub original_value: u8,
    /// The target figure value.
    pub target_value: u8,
    /// `(target - original) mod figure_count`, the minimum number of
    /// increments this cell needs.
    pub minimum_transforms_needed: usize,
    /// Every piece count `k` in `0..=piece_count` with
    /// `k ≡ minimum_transforms_needed (mod figure_count)`.
    pub possible_transforms: Vec<usize>,
    /// Ids of the pieces whose shape has an active cell at this corner.
    pub eligible_pieces: Vec<PieceId>,
    /// Every subset of the eligible pieces whose size is an admissible
    /// transform count, with forced placements.
    pub combinations: Vec<PieceCombination>,
}

impl CornerInfo {
    /// Analyze one corner of the board against the full piece set.
    fn analyze(
        corner: Corner,
        board: &Grid,
        target_value: u8,
        figure_count: usize,
        pieces: &[Piece],
    ) -> Self {
        let original_value = board.corner(corner);

        let minimum_transforms_needed = (usize::from(target_value) + figure_count
            - usize::from(original_value))
            % figure_count;

        let possible_transforms: Vec<usize> = (0..=pieces.len())
            .filter(|count| count % figure_count == minimum_transforms_needed)
            .collect();

        // A piece with no valid placement cannot cover anything, however
        // active its corners are.
        let eligible: Vec<&Piece> = pieces
            .iter()
            .filter(|piece| piece.active_corner(corner) && !piece.possible_positions().is_empty())
            .collect();
        let eligible_pieces = eligible.iter().map(|piece| piece.id()).collect();

        let mut combinations = Vec::new();
        for mask in 0u64..(1u64 << eligible.len()) {
            if !possible_transforms.contains(&(mask.count_ones() as usize)) {
                continue;
            }

            let mut combination: PieceCombination = eligible
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, piece)| forced_placement(corner, piece, board))
                .collect();
            combination.sort_by_key(|part| part.id);

            combinations.push(combination);
        }

        CornerInfo {
            corner,
            original_value,
            target_value,
            minimum_transforms_needed,
            possible_transforms,
            eligible_pieces,
            combinations,
        }
    }
}

/// Analyze all four corners. The result is indexed by [`Corner::index`].
pub(crate) fn analyze_corners(
    board: &Grid,
    target_value: u8,
    figure_count: usize,
    pieces: &[Piece],
) -> [CornerInfo; 4] {
    Corner::ALL.map(|corner| CornerInfo::analyze(corner, board, target_value, figure_count, pieces))
}

/// Compute the unique translation that puts `piece` flush against `corner`,
/// and every other corner that placement also touches: when the piece spans
/// the board's full width or height, the placement reaches the adjacent
/// corner on that axis, which is affected if the piece's own corner cell on
/// that side is active.
fn forced_placement(corner: Corner, piece: &Piece, board: &Grid) -> CombinationPart {
    let right = board.cols() - piece.shape().cols();
    let bottom = board.rows() - piece.shape().rows();

    let mut affects = vec![corner];
    let position = match corner {
        Corner::TopLeft => {
            if piece.spans_x_axis() && piece.active_corner(Corner::TopRight) {
                affects.push(Corner::TopRight);
            }
            if piece.spans_y_axis() && piece.active_corner(Corner::BottomLeft) {
                affects.push(Corner::BottomLeft);
            }
            Position::new(0, 0)
        }
        Corner::TopRight => {
            if piece.spans_x_axis() && piece.active_corner(Corner::TopLeft) {
                affects.push(Corner::TopLeft);
            }
            if piece.spans_y_axis() && piece.active_corner(Corner::BottomRight) {
                affects.push(Corner::BottomRight);
            }
            Position::new(right, 0)
        }
        Corner::BottomLeft => {
            if piece.spans_x_axis() && piece.active_corner(Corner::BottomRight) {
                affects.push(Corner::BottomRight);
            }
            if piece.spans_y_axis() && piece.active_corner(Corner::TopLeft) {
                affects.push(Corner::TopLeft);
            }
            Position::new(0, bottom)
        }
        Corner::BottomRight => {
            if piece.spans_x_axis() && piece.active_corner(Corner::BottomLeft) {
                affects.push(Corner::BottomLeft);
            }
            if piece.spans_y_axis() && piece.active_corner(Corner::TopRight) {
                affects.push(Corner::TopRight);
            }
            Position::new(right, bottom)
        }
    };

    CombinationPart {
        id: piece.id(),
        position,
        affects,
    }
}
