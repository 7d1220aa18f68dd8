//! Integer cell coordinates and cube-shaped coordinate ranges.

use nalgebra::{Point3, Vector3};

/// A discrete 3D coordinate identifying one cell of the grid.
///
/// Uses `i32` components so the grid can grow in every direction from its
/// origin; cells are cubes of edge [`GridSemantics::CELL_SIZE`] centered on
/// `origin + coord * CELL_SIZE`.
///
/// [`GridSemantics::CELL_SIZE`]: crate::GridSemantics::CELL_SIZE
///
/// # Example
///
/// ```
/// use sparse_grid::CellCoord;
///
/// let coord = CellCoord::new(1, -2, 3);
/// assert_eq!(coord.x, 1);
/// assert_eq!(coord + CellCoord::new(0, 2, 0), CellCoord::new(1, 0, 3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellCoord {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl CellCoord {
    /// Creates a new cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The coordinate at the grid origin, `(0, 0, 0)`.
    #[must_use]
    pub const fn origin() -> Self {
        Self::new(0, 0, 0)
    }

    /// Returns the coordinate as an array.
    #[must_use]
    pub const fn as_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }

    /// Converts to a floating-point point.
    #[must_use]
    pub fn to_point(self) -> Point3<f64> {
        Point3::new(f64::from(self.x), f64::from(self.y), f64::from(self.z))
    }

    /// Converts to a floating-point vector.
    #[must_use]
    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(f64::from(self.x), f64::from(self.y), f64::from(self.z))
    }
}

impl From<(i32, i32, i32)> for CellCoord {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Self::new(x, y, z)
    }
}

impl From<[i32; 3]> for CellCoord {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl std::ops::Add for CellCoord {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(
            self.x.wrapping_add(other.x),
            self.y.wrapping_add(other.y),
            self.z.wrapping_add(other.z),
        )
    }
}

impl std::ops::Sub for CellCoord {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(
            self.x.wrapping_sub(other.x),
            self.y.wrapping_sub(other.y),
            self.z.wrapping_sub(other.z),
        )
    }
}

impl std::ops::Neg for CellCoord {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(
            self.x.wrapping_neg(),
            self.y.wrapping_neg(),
            self.z.wrapping_neg(),
        )
    }
}

/// The cube of integer offsets `[-step, +step]³` around an optional center.
///
/// Covers `(2·step + 1)³` coordinates. Iteration order is x-fastest, then y,
/// then z, which both query engines rely on for reproducible enumeration.
///
/// # Example
///
/// ```
/// use sparse_grid::{CellCoord, CellRange};
///
/// let range = CellRange::new(1);
/// assert_eq!(range.count(), 27);
/// assert_eq!(range.into_iter().next(), Some(CellCoord::new(-1, -1, -1)));
///
/// let shifted: Vec<_> = CellRange::new(0).offset(CellCoord::new(5, 5, 5)).into_iter().collect();
/// assert_eq!(shifted, vec![CellCoord::new(5, 5, 5)]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CellRange {
    step: CellCoord,
    offset: CellCoord,
}

impl CellRange {
    /// Creates a range extending `step` cells from the center on every axis.
    #[must_use]
    pub const fn new(step: i32) -> Self {
        let step = step.abs();
        Self {
            step: CellCoord::new(step, step, step),
            offset: CellCoord::origin(),
        }
    }

    /// Creates a range with a per-axis extent.
    #[must_use]
    pub const fn with_steps(step: CellCoord) -> Self {
        Self {
            step: CellCoord::new(step.x.abs(), step.y.abs(), step.z.abs()),
            offset: CellCoord::origin(),
        }
    }

    /// Centers the range on `offset` instead of the origin.
    #[must_use]
    pub const fn offset(mut self, offset: CellCoord) -> Self {
        self.offset = offset;
        self
    }

    /// Total number of coordinates in the range.
    #[must_use]
    pub fn count(&self) -> usize {
        let per_axis = |step: i32| (step as usize) * 2 + 1;
        per_axis(self.step.x) * per_axis(self.step.y) * per_axis(self.step.z)
    }
}

impl IntoIterator for CellRange {
    type Item = CellCoord;
    type IntoIter = CellRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        CellRangeIter {
            range: self,
            current: Some(CellCoord::new(-self.step.x, -self.step.y, -self.step.z)),
        }
    }
}

/// Iterator over the coordinates of a [`CellRange`].
#[derive(Debug, Clone)]
pub struct CellRangeIter {
    range: CellRange,
    current: Option<CellCoord>,
}

impl Iterator for CellRangeIter {
    type Item = CellCoord;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        let step = self.range.step;

        let mut next = current;
        next.x += 1;
        if next.x > step.x {
            next.x = -step.x;
            next.y += 1;
            if next.y > step.y {
                next.y = -step.y;
                next.z += 1;
                if next.z > step.z {
                    self.current = None;
                    return Some(current + self.range.offset);
                }
            }
        }
        self.current = Some(next);

        Some(current + self.range.offset)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.current.map_or(0, |current| {
            let step = self.range.step;
            let size_x = (step.x as usize) * 2 + 1;
            let size_y = (step.y as usize) * 2 + 1;
            let rem_x = (step.x - current.x) as usize + 1;
            let rem_y = (step.y - current.y) as usize;
            let rem_z = (step.z - current.z) as usize;
            rem_x + rem_y * size_x + rem_z * size_x * size_y
        });
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CellRangeIter {}
