//! Puzzle input model: figures, game board, pieces, and the eager input
//! validation that guards the solving engine.

use crate::corners::{analyze_corners, CornerInfo};
use crate::grid::Grid;
use crate::piece::{Piece, PieceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The caller-facing name of a figure state: either a label or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FigureName {
    /// A textual label, e.g. `"sun"`.
    Name(String),
    /// A numeric label.
    Index(i64),
}

impl fmt::Display for FigureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FigureName::Name(name) => f.write_str(name),
            FigureName::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A cyclic figure state. The value is the figure's index in input order;
/// the last figure is the target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    /// The caller-facing name.
    pub name: FigureName,
    /// The figure's index in `0..figure_count`.
    pub value: u8,
}

impl fmt::Display for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.value)
    }
}

/// Raw puzzle input, deserializable from the wire shape
/// `{ figures, gameBoard, puzzlePieces }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleInput {
    /// The cyclic figure states, last one is the target.
    pub figures: Vec<FigureName>,
    /// The board cells, each an index into `figures`.
    pub game_board: Vec<Vec<i64>>,
    /// The binary piece shapes.
    pub puzzle_pieces: Vec<Vec<Vec<i64>>>,
}

/// A constraint violated by the raw puzzle input.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum PuzzleError {
    /// The figure list was empty, leaving no target state.
    #[display("at least one figure is required")]
    NoFigures,
    /// More figure states than a board cell can hold.
    #[display("at most 256 figures are supported, got {count}")]
    TooManyFigures {
        /// The number of figures supplied.
        count: usize,
    },
    /// The board had no rows or an empty first row.
    #[display("the game board must have at least one row and one column")]
    EmptyBoard,
    /// A board row had a different length than the first row.
    #[display("game board row {row} has {found} columns, expected {expected}")]
    RaggedBoard {
        /// The offending row index.
        row: usize,
        /// The offending row's length.
        found: usize,
        /// The length of the first row.
        expected: usize,
    },
    /// A board cell was negative or not a valid figure index.
    #[display("game board cell ({x}, {y}) holds {value}, expected a figure index in 0..{figure_count}")]
    BoardValueOutOfRange {
        /// The cell's column.
        x: usize,
        /// The cell's row.
        y: usize,
        /// The offending value.
        value: i64,
        /// The number of figures.
        figure_count: usize,
    },
    /// More pieces than the `A..=Z` identifier scheme can label.
    #[display("at most 26 puzzle pieces are supported, got {count}")]
    TooManyPieces {
        /// The number of pieces supplied.
        count: usize,
    },
    /// A piece shape had no rows or an empty first row.
    #[display("puzzle piece {id} must have at least one row and one column")]
    EmptyPiece {
        /// The offending piece's id.
        id: PieceId,
    },
    /// A piece shape row had a different length than its first row.
    #[display("puzzle piece {id} row {row} has {found} columns, expected {expected}")]
    RaggedPiece {
        /// The offending piece's id.
        id: PieceId,
        /// The offending row index.
        row: usize,
        /// The offending row's length.
        found: usize,
        /// The length of the piece's first row.
        expected: usize,
    },
    /// A piece cell was something other than 0 or 1.
    #[display("puzzle piece {id} cell ({x}, {y}) holds {value}, expected 0 or 1")]
    NonBinaryPieceCell {
        /// The offending piece's id.
        id: PieceId,
        /// The cell's column.
        x: usize,
        /// The cell's row.
        y: usize,
        /// The offending value.
        value: i64,
    },
}

/// A validated puzzle: figures, board, pieces with precomputed geometry,
/// and the per-corner constraint analysis. Immutable once constructed.
#[derive(Debug)]
pub struct Puzzle {
    /// The figure states, last one is the target.
    pub figures: Vec<Figure>,
    /// `figures.len()`, the modulus of every stack operation.
    pub figure_count: usize,
    /// The value every cell must reach.
    pub target_figure: u8,
    /// The initial game board.
    pub board: Grid,
    /// The pieces in id order.
    pub pieces: Vec<Piece>,
    /// Ids of pieces that touch at least one corner in every valid
    /// placement. Each of them must appear in some corner combination of
    /// every solution.
    pub pieces_that_cannot_avoid_corners: Vec<PieceId>,
    /// The corner analysis, indexed by [`crate::Corner::index`].
    pub corners_info: [CornerInfo; 4],
    /// The product of every piece's possible-position count.
    pub total_possible_combinations: f64,
}

impl Puzzle {
    /// Validate the raw input and build the puzzle model, precomputing
    /// piece geometry and the corner analysis.
    pub fn new(input: PuzzleInput) -> Result<Self, PuzzleError> {
        let (board_rows, piece_grids) = validate(&input)?;

        let figures: Vec<Figure> = input
            .figures
            .iter()
            .enumerate()
            .map(|(index, name)| Figure {
                name: name.clone(),
                value: index as u8,
            })
            .collect();
        let figure_count = figures.len();
        let target_figure = figures.last().map(|figure| figure.value).unwrap();

        let board = Grid::from_rows(&board_rows);

        let pieces: Vec<Piece> = piece_grids
            .into_iter()
            .enumerate()
            .map(|(index, rows)| {
                let id = char::from(b'A' + index as u8);
                Piece::new(id, Grid::from_rows(&rows), board.rows(), board.cols())
            })
            .collect();

        let pieces_that_cannot_avoid_corners: Vec<PieceId> = pieces
            .iter()
            .filter(|piece| !piece.can_avoid_affecting_some_corners())
            .map(|piece| piece.id())
            .collect();

        let total_possible_combinations = pieces
            .iter()
            .map(|piece| piece.possible_positions().len() as f64)
            .product();

        let corners_info = analyze_corners(&board, target_figure, figure_count, &pieces);

        log::debug!(
            "puzzle: {} figures (target {target_figure}), {}x{} board, {} pieces, {} possible combinations",
            figure_count,
            board.rows(),
            board.cols(),
            pieces.len(),
            total_possible_combinations,
        );
        for piece in &pieces {
            log::debug!(
                "piece {} ({} possible positions, {} cells influenced):\n{}",
                piece.id(),
                piece.possible_positions().len(),
                piece.cells_influenced(),
                piece.shape(),
            );
        }

        Ok(Puzzle {
            figures,
            figure_count,
            target_figure,
            board,
            pieces,
            pieces_that_cannot_avoid_corners,
            corners_info,
            total_possible_combinations,
        })
    }

    /// Look up a piece by id.
    ///
    /// # Panics
    ///
    /// Panics if no piece carries the given id.
    pub fn piece(&self, id: PieceId) -> &Piece {
        self.pieces
            .iter()
            .find(|piece| piece.id() == id)
            .expect("piece id must come from this puzzle")
    }
}

/// Check every input constraint, returning the board rows and piece grids
/// converted to cell values.
#[allow(clippy::type_complexity)]
fn validate(input: &PuzzleInput) -> Result<(Vec<Vec<u8>>, Vec<Vec<Vec<u8>>>), PuzzleError> {
    if input.figures.is_empty() {
        return Err(PuzzleError::NoFigures);
    }
    let figure_count = input.figures.len();
    if figure_count > 256 {
        return Err(PuzzleError::TooManyFigures {
            count: figure_count,
        });
    }

    if input.game_board.is_empty() || input.game_board[0].is_empty() {
        return Err(PuzzleError::EmptyBoard);
    }
    let expected = input.game_board[0].len();
    let mut board_rows = Vec::with_capacity(input.game_board.len());
    for (y, row) in input.game_board.iter().enumerate() {
        if row.len() != expected {
            return Err(PuzzleError::RaggedBoard {
                row: y,
                found: row.len(),
                expected,
            });
        }

        let mut cells = Vec::with_capacity(expected);
        for (x, &value) in row.iter().enumerate() {
            if value < 0 || value >= figure_count as i64 {
                return Err(PuzzleError::BoardValueOutOfRange {
                    x,
                    y,
                    value,
                    figure_count,
                });
            }
            cells.push(value as u8);
        }
        board_rows.push(cells);
    }

    if input.puzzle_pieces.len() > 26 {
        return Err(PuzzleError::TooManyPieces {
            count: input.puzzle_pieces.len(),
        });
    }

    let mut piece_grids = Vec::with_capacity(input.puzzle_pieces.len());
    for (index, piece) in input.puzzle_pieces.iter().enumerate() {
        let id = char::from(b'A' + index as u8);

        if piece.is_empty() || piece[0].is_empty() {
            return Err(PuzzleError::EmptyPiece { id });
        }
        let expected = piece[0].len();
        let mut rows = Vec::with_capacity(piece.len());
        for (y, row) in piece.iter().enumerate() {
            if row.len() != expected {
                return Err(PuzzleError::RaggedPiece {
                    id,
                    row: y,
                    found: row.len(),
                    expected,
                });
            }

            let mut cells = Vec::with_capacity(expected);
            for (x, &value) in row.iter().enumerate() {
                if value != 0 && value != 1 {
                    return Err(PuzzleError::NonBinaryPieceCell { id, x, y, value });
                }
                cells.push(value as u8);
            }
            rows.push(cells);
        }
        piece_grids.push(rows);
    }

    Ok((board_rows, piece_grids))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(
        figures: usize,
        board: Vec<Vec<i64>>,
        pieces: Vec<Vec<Vec<i64>>>,
    ) -> PuzzleInput {
        PuzzleInput {
            figures: (0..figures as i64).map(FigureName::Index).collect(),
            game_board: board,
            puzzle_pieces: pieces,
        }
    }

    #[test]
    fn builds_model_from_valid_input() {
        let puzzle = Puzzle::new(input(
            3,
            vec![vec![2, 2], vec![2, 1]],
            vec![vec![vec![1]], vec![vec![1, 1]]],
        ))
        .unwrap();

        assert_eq!(puzzle.figure_count, 3);
        assert_eq!(puzzle.target_figure, 2);
        assert_eq!(puzzle.pieces.len(), 2);
        assert_eq!(puzzle.pieces[0].id(), 'A');
        assert_eq!(puzzle.pieces[1].id(), 'B');
        // 4 positions for the 1x1 piece, 2 for the 1x2 piece.
        assert_eq!(puzzle.total_possible_combinations, 8.0);
    }

    #[test]
    fn rejects_empty_figures() {
        let result = Puzzle::new(input(0, vec![vec![0]], vec![]));
        assert_eq!(result.unwrap_err(), PuzzleError::NoFigures);
    }

    #[test]
    fn rejects_ragged_board() {
        let result = Puzzle::new(input(2, vec![vec![0, 1], vec![0]], vec![]));
        assert_eq!(
            result.unwrap_err(),
            PuzzleError::RaggedBoard {
                row: 1,
                found: 1,
                expected: 2
            }
        );
    }

    #[test]
    fn rejects_out_of_range_board_value() {
        let result = Puzzle::new(input(2, vec![vec![0, 2]], vec![]));
        assert_eq!(
            result.unwrap_err(),
            PuzzleError::BoardValueOutOfRange {
                x: 1,
                y: 0,
                value: 2,
                figure_count: 2
            }
        );

        let negative = Puzzle::new(input(2, vec![vec![-1]], vec![]));
        assert!(matches!(
            negative.unwrap_err(),
            PuzzleError::BoardValueOutOfRange { value: -1, .. }
        ));
    }

    #[test]
    fn rejects_non_binary_piece_cell() {
        let result = Puzzle::new(input(2, vec![vec![0]], vec![vec![vec![1, 2]]]));
        assert_eq!(
            result.unwrap_err(),
            PuzzleError::NonBinaryPieceCell {
                id: 'A',
                x: 1,
                y: 0,
                value: 2
            }
        );
    }

    #[test]
    fn rejects_empty_piece() {
        let result = Puzzle::new(input(2, vec![vec![0]], vec![vec![]]));
        assert_eq!(result.unwrap_err(), PuzzleError::EmptyPiece { id: 'A' });
    }

    #[test]
    fn error_messages_name_the_constraint() {
        let error = PuzzleError::BoardValueOutOfRange {
            x: 1,
            y: 0,
            value: 7,
            figure_count: 3,
        };
        assert_eq!(
            error.to_string(),
            "game board cell (1, 0) holds 7, expected a figure index in 0..3"
        );
    }

    #[test]
    fn pieces_that_cannot_avoid_corners_are_tracked() {
        // A 2x2 piece on a 2x2 board covers all corners in its only
        // placement; a 1x1 piece on the same board can never avoid them
        // either.
        let puzzle = Puzzle::new(input(
            2,
            vec![vec![0, 0], vec![0, 0]],
            vec![vec![vec![1, 1], vec![1, 1]], vec![vec![1]]],
        ))
        .unwrap();
        assert_eq!(puzzle.pieces_that_cannot_avoid_corners, vec!['A', 'B']);

        // On a 4x4 board both can step clear of the corners.
        let roomy = Puzzle::new(input(
            2,
            vec![vec![0; 4]; 4],
            vec![vec![vec![1, 1], vec![1, 1]], vec![vec![1]]],
        ))
        .unwrap();
        assert!(roomy.pieces_that_cannot_avoid_corners.is_empty());
    }
}
