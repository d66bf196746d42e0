//! Grid geometry for the dots-and-boxes board
//!
//! The board is an `S x S` lattice of dots addressed by 1-indexed
//! `(x, y)` pairs where `x` is the column and `y` is the row. Edges join
//! two orthogonally adjacent dots and boxes are the unit cells between
//! them. Nothing in here performs I/O; the server's game state and any
//! client renderer share these definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Default number of dots along each side of the board
pub const DEFAULT_GRID_SIZE: u32 = 4;

/// Smallest board that still contains a box
pub const MIN_GRID_SIZE: u32 = 2;

/// Largest board the server will host. Keeps every coordinate and the
/// edge count well inside `i32` and `usize`.
pub const MAX_GRID_SIZE: u32 = 1024;

/// A dot on the board. Ordered by column, then row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Reasons two points cannot form an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("both ends of the line are the same dot {0:?}")]
    SamePoint(Point),
    #[error("dots {0:?} and {1:?} are not adjacent")]
    NotAdjacent(Point, Point),
    #[error("dot {point:?} lies outside a {size}x{size} grid")]
    OutOfBounds { point: Point, size: u32 },
}

/// An undirected segment between two adjacent dots
///
/// The endpoints are stored sorted, so `Edge::new(a, b)` and
/// `Edge::new(b, a)` produce equal values with equal hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    start: Point,
    end: Point,
}

impl Edge {
    /// Builds the canonical edge between two dots
    ///
    /// Exactly one of `|dx|`, `|dy|` must be 1 and the other 0.
    pub fn new(p1: Point, p2: Point) -> Result<Self, GeometryError> {
        if p1 == p2 {
            return Err(GeometryError::SamePoint(p1));
        }

        let dx = p1.x.abs_diff(p2.x);
        let dy = p1.y.abs_diff(p2.y);
        if !matches!((dx, dy), (1, 0) | (0, 1)) {
            return Err(GeometryError::NotAdjacent(p1, p2));
        }

        let (start, end) = if p1 < p2 { (p1, p2) } else { (p2, p1) };
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    pub fn is_horizontal(&self) -> bool {
        self.start.y == self.end.y
    }
}

/// A unit cell identified by its top-left dot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoxCell {
    pub top_left: Point,
}

impl BoxCell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self {
            top_left: Point::new(x, y),
        }
    }

    /// The four sides of the cell: top, bottom, left, right
    pub fn edges(&self) -> [Edge; 4] {
        let Point { x, y } = self.top_left;
        [
            Edge {
                start: Point::new(x, y),
                end: Point::new(x + 1, y),
            },
            Edge {
                start: Point::new(x, y + 1),
                end: Point::new(x + 1, y + 1),
            },
            Edge {
                start: Point::new(x, y),
                end: Point::new(x, y + 1),
            },
            Edge {
                start: Point::new(x + 1, y),
                end: Point::new(x + 1, y + 1),
            },
        ]
    }

    /// True once every side of the cell has been drawn
    pub fn is_complete<V>(&self, drawn: &HashMap<Edge, V>) -> bool {
        self.edges().iter().all(|edge| drawn.contains_key(edge))
    }
}

/// Board dimensions and the bounds checks that go with them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    size: u32,
}

impl Grid {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Largest valid coordinate, saturating for sizes past `i32::MAX`
    fn max_coord(&self) -> i32 {
        i32::try_from(self.size).unwrap_or(i32::MAX)
    }

    pub fn contains(&self, point: Point) -> bool {
        let max = self.max_coord();
        (1..=max).contains(&point.x) && (1..=max).contains(&point.y)
    }

    /// Validates bounds and adjacency and returns the canonical edge
    pub fn edge(&self, p1: Point, p2: Point) -> Result<Edge, GeometryError> {
        for point in [p1, p2] {
            if !self.contains(point) {
                return Err(GeometryError::OutOfBounds {
                    point,
                    size: self.size,
                });
            }
        }
        Edge::new(p1, p2)
    }

    /// Number of drawable edges: `2 * S * (S - 1)`
    pub fn total_edges(&self) -> usize {
        let size = self.size as usize;
        size.saturating_mul(size.saturating_sub(1)).saturating_mul(2)
    }

    /// Number of boxes: `(S - 1)^2`
    pub fn total_boxes(&self) -> usize {
        let side = (self.size as usize).saturating_sub(1);
        side.saturating_mul(side)
    }

    /// The boxes that have `edge` as one of their sides (zero to two)
    pub fn boxes_adjacent_to(&self, edge: &Edge) -> Vec<BoxCell> {
        let Point { x, y } = edge.start;
        let last = self.max_coord() - 1;

        let candidates = if edge.is_horizontal() {
            // the box above and the box below
            [BoxCell::new(x, y.saturating_sub(1)), BoxCell::new(x, y)]
        } else {
            // the box to the left and the box to the right
            [BoxCell::new(x.saturating_sub(1), y), BoxCell::new(x, y)]
        };

        candidates
            .into_iter()
            .filter(|cell| {
                let p = cell.top_left;
                (1..=last).contains(&p.x) && (1..=last).contains(&p.y)
            })
            .collect()
    }

    /// Every edge on the board, rows of horizontal edges first
    pub fn all_edges(&self) -> Vec<Edge> {
        let size = self.max_coord();
        let mut edges = Vec::with_capacity(self.total_edges());
        for y in 1..=size {
            for x in 1..size {
                edges.push(Edge {
                    start: Point::new(x, y),
                    end: Point::new(x + 1, y),
                });
            }
        }
        for x in 1..=size {
            for y in 1..size {
                edges.push(Edge {
                    start: Point::new(x, y),
                    end: Point::new(x, y + 1),
                });
            }
        }
        edges
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SIZE)
    }
}
