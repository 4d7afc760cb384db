//! Puzzle piece model: a binary shape plus geometry precomputed against the
//! dimensions of the game board it will be placed on.
//!
//! All derived properties are cached at construction. A piece never changes
//! once built, so the placement masks can be shared freely during the
//! search.

use crate::grid::{Corner, Grid, Position};
use std::collections::HashMap;

/// A puzzle piece identifier, assigned `'A'`, `'B'`, `'C'`, … in input
/// order.
pub type PieceId = char;

/// An immutable binary piece shape with precomputed placement geometry.
#[derive(Debug, Clone)]
pub struct Piece {
    id: PieceId,
    shape: Grid,
    active_corners: [bool; 4],
    spans_x_axis: bool,
    spans_y_axis: bool,
    can_avoid_edges: bool,
    can_avoid_affecting_some_corners: bool,
    cells_influenced: usize,
    possible_positions: Vec<Position>,
    positions_avoiding_corners: Vec<Position>,
    placements: HashMap<Position, Grid>,
}

impl Piece {
    /// Build a piece from its binary shape and the board dimensions,
    /// precomputing every derived property.
    pub(crate) fn new(id: PieceId, shape: Grid, board_rows: usize, board_cols: usize) -> Self {
        let mut active_corners = [false; 4];
        for corner in Corner::ALL {
            active_corners[corner.index()] = shape.corner(corner) != 0;
        }

        let spans_x_axis = shape.cols() == board_cols;
        let spans_y_axis = shape.rows() == board_rows;

        let row_margin = board_rows >= shape.rows() + 2;
        let col_margin = board_cols >= shape.cols() + 2;
        let can_avoid_edges = row_margin && col_margin;

        let can_avoid_affecting_some_corners = Self::can_avoid_corners(
            row_margin,
            col_margin,
            spans_x_axis,
            spans_y_axis,
            active_corners,
        );

        let possible_positions = Self::enumerate_positions(&shape, board_rows, board_cols);

        let placements: HashMap<Position, Grid> = possible_positions
            .iter()
            .map(|&position| (position, Self::placement_mask(&shape, position, board_rows, board_cols)))
            .collect();

        let positions_avoiding_corners = possible_positions
            .iter()
            .copied()
            .filter(|position| {
                let mask = &placements[position];
                Corner::ALL.iter().all(|&corner| mask.corner(corner) == 0)
            })
            .collect();

        let cells_influenced = shape.count_value(1);

        Piece {
            id,
            shape,
            active_corners,
            spans_x_axis,
            spans_y_axis,
            can_avoid_edges,
            can_avoid_affecting_some_corners,
            cells_influenced,
            possible_positions,
            positions_avoiding_corners,
            placements,
        }
    }

    /// Decide analytically whether at least one valid placement leaves all
    /// four board corners untouched.
    ///
    /// Any of the following is sufficient:
    /// 1. a 1-cell margin on both axes, or on one full axis pair;
    /// 2. some inactive shape corner while spanning neither board axis;
    /// 3. an inactive left or right corner pair while not spanning the
    ///    board's width (the piece can slide clear horizontally);
    /// 4. an inactive top or bottom corner pair while not spanning the
    ///    board's height.
    fn can_avoid_corners(
        row_margin: bool,
        col_margin: bool,
        spans_x_axis: bool,
        spans_y_axis: bool,
        active: [bool; 4],
    ) -> bool {
        let top_left = active[Corner::TopLeft.index()];
        let top_right = active[Corner::TopRight.index()];
        let bottom_left = active[Corner::BottomLeft.index()];
        let bottom_right = active[Corner::BottomRight.index()];

        (row_margin || col_margin)
            || (active.contains(&false) && !spans_x_axis && !spans_y_axis)
            || (((!top_left && !bottom_left) || (!top_right && !bottom_right)) && !spans_x_axis)
            || (((!top_left && !top_right) || (!bottom_left && !bottom_right)) && !spans_y_axis)
    }

    /// All valid top-left offsets: a pure translation scan, no rotation.
    fn enumerate_positions(shape: &Grid, board_rows: usize, board_cols: usize) -> Vec<Position> {
        if shape.rows() > board_rows || shape.cols() > board_cols {
            return Vec::new();
        }

        let mut positions = Vec::with_capacity(
            (board_rows - shape.rows() + 1) * (board_cols - shape.cols() + 1),
        );
        for y in 0..=board_rows - shape.rows() {
            for x in 0..=board_cols - shape.cols() {
                positions.push(Position::new(x, y));
            }
        }

        positions
    }

    /// The piece's shape copied onto an otherwise empty board-sized grid at
    /// the given offset.
    fn placement_mask(shape: &Grid, position: Position, board_rows: usize, board_cols: usize) -> Grid {
        let mut rows = vec![vec![0u8; board_cols]; board_rows];
        for y in 0..shape.rows() {
            for x in 0..shape.cols() {
                rows[position.y + y][position.x + x] = shape.get(x, y);
            }
        }

        Grid::from_rows(&rows)
    }

    /// The piece identifier.
    pub fn id(&self) -> PieceId {
        self.id
    }

    /// The binary shape grid.
    pub fn shape(&self) -> &Grid {
        &self.shape
    }

    /// Whether the given corner of the shape's bounding box is a filled
    /// cell.
    pub fn active_corner(&self, corner: Corner) -> bool {
        self.active_corners[corner.index()]
    }

    /// Whether the shape's width equals the board's width.
    pub fn spans_x_axis(&self) -> bool {
        self.spans_x_axis
    }

    /// Whether the shape's height equals the board's height.
    pub fn spans_y_axis(&self) -> bool {
        self.spans_y_axis
    }

    /// Whether the piece fits with a 1-cell margin on all four sides.
    pub fn can_avoid_edges(&self) -> bool {
        self.can_avoid_edges
    }

    /// Whether at least one valid placement leaves every board corner
    /// untouched. Pieces for which this is false must show up in some
    /// corner's combination of every solution.
    pub fn can_avoid_affecting_some_corners(&self) -> bool {
        self.can_avoid_affecting_some_corners
    }

    /// The number of filled shape cells, an upper bound on the cells a
    /// single placement can change.
    pub fn cells_influenced(&self) -> usize {
        self.cells_influenced
    }

    /// All valid placement offsets on the board.
    pub fn possible_positions(&self) -> &[Position] {
        &self.possible_positions
    }

    /// The subset of [`Self::possible_positions`] whose placement touches no
    /// board corner.
    pub fn positions_avoiding_corners(&self) -> &[Position] {
        &self.positions_avoiding_corners
    }

    /// Placement offsets to consider during the search: corner-avoiding ones
    /// once the corner analysis has pinned down the corner placements, all
    /// of them otherwise.
    pub fn positions(&self, avoid_corners: bool) -> &[Position] {
        if avoid_corners {
            &self.positions_avoiding_corners
        } else {
            &self.possible_positions
        }
    }

    /// The cached board-sized placement mask for the given offset.
    ///
    /// # Panics
    ///
    /// Panics if `position` is not one of the piece's possible positions.
    pub fn placement(&self, position: Position) -> &Grid {
        self.placements
            .get(&position)
            .expect("position must be one of the piece's possible positions")
    }
}
