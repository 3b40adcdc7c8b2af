//! Hierarchical range image: a min/max mipmap over the range image.
//!
//! Level 0 mirrors the raw image; every level above halves both axes and
//! stores the (min, max) of the cells it covers. Cells without a beam
//! contribute `(+inf, -inf)` so empty regions never constrain a query.
//! A rectangular window query reads at the coarsest level where the window
//! spans at most two cells per axis, touching at most four cells.

use super::range_image::RangeImage2D;

/// Inclusive (min, max) over the measured ranges of a window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangeBounds {
    /// Smallest range in the window, `+inf` if the window holds no beams
    pub min: f32,
    /// Largest range in the window, `-inf` if the window holds no beams
    pub max: f32,
}

impl RangeBounds {
    /// Bounds of an empty window
    pub fn empty() -> Self {
        Self {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
        }
    }

    /// True if the window held at least one beam
    pub fn has_beams(&self) -> bool {
        self.min <= self.max
    }

    /// Combine with another window's bounds
    pub fn union(&self, other: &RangeBounds) -> RangeBounds {
        RangeBounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// One mipmap level
#[derive(Clone, Debug)]
struct BoundsLevel {
    min: Vec<f32>,
    max: Vec<f32>,
    num_rows: usize,
    num_cols: usize,
}

impl BoundsLevel {
    #[inline]
    fn min_at(&self, row: usize, col: usize) -> f32 {
        self.min[row * self.num_cols + col]
    }

    #[inline]
    fn max_at(&self, row: usize, col: usize) -> f32 {
        self.max[row * self.num_cols + col]
    }
}

/// Min/max mipmap over one range image.
#[derive(Clone, Debug)]
pub struct HierarchicalRangeImage {
    levels: Vec<BoundsLevel>,
}

impl HierarchicalRangeImage {
    /// Build the full mipmap pyramid for `image`
    pub fn new(image: &RangeImage2D) -> Self {
        let num_rows = image.num_rows();
        let num_cols = image.num_cols();
        let mut base = BoundsLevel {
            min: Vec::with_capacity(num_rows * num_cols),
            max: Vec::with_capacity(num_rows * num_cols),
            num_rows,
            num_cols,
        };
        for row in 0..num_rows {
            for col in 0..num_cols {
                if image.has_beam(row, col) {
                    let range = image.range(row, col);
                    base.min.push(range);
                    base.max.push(range);
                } else {
                    base.min.push(f32::INFINITY);
                    base.max.push(f32::NEG_INFINITY);
                }
            }
        }

        let mut levels = vec![base];
        while levels.last().unwrap().num_rows > 1 || levels.last().unwrap().num_cols > 1 {
            let prev = levels.last().unwrap();
            let num_rows = prev.num_rows.div_ceil(2);
            let num_cols = prev.num_cols.div_ceil(2);
            let mut level = BoundsLevel {
                min: Vec::with_capacity(num_rows * num_cols),
                max: Vec::with_capacity(num_rows * num_cols),
                num_rows,
                num_cols,
            };
            for row in 0..num_rows {
                for col in 0..num_cols {
                    let mut min = f32::INFINITY;
                    let mut max = f32::NEG_INFINITY;
                    for dr in 0..2 {
                        for dc in 0..2 {
                            let r = 2 * row + dr;
                            let c = 2 * col + dc;
                            if r < prev.num_rows && c < prev.num_cols {
                                min = min.min(prev.min_at(r, c));
                                max = max.max(prev.max_at(r, c));
                            }
                        }
                    }
                    level.min.push(min);
                    level.max.push(max);
                }
            }
            levels.push(level);
        }
        Self { levels }
    }

    /// Number of mipmap levels (at least one)
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Bounds over the inclusive index window `[min_row..=max_row] x
    /// [min_col..=max_col]`.
    ///
    /// Reads at the coarsest level whose cells still resolve the window, so
    /// the cost is at most four cell reads regardless of window size. The
    /// result may be looser than the exact min/max (coarse cells can cover
    /// beams outside the window) but never tighter.
    pub fn range_bounds(
        &self,
        min_row: usize,
        min_col: usize,
        max_row: usize,
        max_col: usize,
    ) -> RangeBounds {
        debug_assert!(min_row <= max_row && min_col <= max_col);
        let spread = (max_row - min_row).max(max_col - min_col);
        let level = (usize::BITS - spread.leading_zeros()) as usize;
        let level = level.min(self.levels.len() - 1);
        let grid = &self.levels[level];

        let mut bounds = RangeBounds::empty();
        for row in (min_row >> level)..=(max_row >> level).min(grid.num_rows - 1) {
            for col in (min_col >> level)..=(max_col >> level).min(grid.num_cols - 1) {
                bounds.min = bounds.min.min(grid.min_at(row, col));
                bounds.max = bounds.max.max(grid.max_at(row, col));
            }
        }
        bounds
    }
}
