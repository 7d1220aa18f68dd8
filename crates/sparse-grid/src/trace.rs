//! Line traces through the grid via 3D-DDA voxel traversal.
//!
//! A trace walks exactly the cells its segment pierces, in ray order. At
//! every step it searches the 3x3x3 block around the current cell — element
//! radii are capped below half a cell, so anything protruding into the
//! current cell from a neighbor is caught — and tests resident elements with
//! the exact segment/shape intersection.
//!
//! [`LineTrace::multi`] reports every pierced element; [`LineTrace::single`]
//! keeps the hit closest to the start and stops walking as soon as a block
//! has produced one, which is sound because cells are visited in ray order
//! and the whole block is searched before advancing.

use hashbrown::HashSet;
use std::marker::PhantomData;

use nalgebra::{Point3, Vector3, distance_squared};

use crate::coord::{CellCoord, CellRange};
use crate::grid::{Element, GridSemantics, SpatialGrid, cell_extent};
use crate::math;
use crate::slot_map::ElementId;

/// Outcome of a closest-hit trace.
///
/// Defaults to a miss with sentinel geometry: locations at `f64::MAX`, a zero
/// normal, and an invalid element id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceResult {
    /// Whether anything was hit.
    pub blocking_hit: bool,
    /// The hit location, or the trace end point when the trace entered the
    /// grid but hit nothing.
    pub location: Point3<f64>,
    /// The point where the segment enters the hit element.
    pub impact_point: Point3<f64>,
    /// Outward surface normal of the hit element at the impact point.
    pub impact_normal: Vector3<f64>,
    /// The hit element, valid iff `blocking_hit`.
    pub element_id: ElementId,
}

impl Default for TraceResult {
    fn default() -> Self {
        Self {
            blocking_hit: false,
            location: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            impact_point: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            impact_normal: Vector3::zeros(),
            element_id: ElementId::default(),
        }
    }
}

/// A directed segment prepared for tracing against a grid.
///
/// Construction precomputes everything the DDA walk needs: the unit
/// direction, its componentwise reciprocal (infinite on axis-aligned rays;
/// all downstream math tolerates that), the per-axis distance between cell
/// boundary crossings, and the per-axis step sign.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use sparse_grid::{Bounds, GridSemantics, LineTrace, SpatialGrid};
///
/// struct Demo;
/// impl GridSemantics for Demo {
///     const CELL_SIZE: f64 = 100.0;
///     const MAX_ELEMENT_RADIUS: f64 = 49.0;
///     type ElementData = ();
/// }
///
/// let mut grid: SpatialGrid<Demo> = SpatialGrid::new();
/// let id = grid.add_element(
///     Bounds::Sphere { origin: Point3::new(0.0, 50.0, 50.0), radius: 10.0 },
///     (),
/// );
///
/// let trace = LineTrace::new(Point3::new(-1000.0, 50.0, 50.0), Point3::new(1000.0, 50.0, 50.0));
/// let result = trace.single(&grid);
/// assert!(result.blocking_hit);
/// assert_eq!(result.element_id, id);
/// ```
#[derive(Debug, Clone)]
pub struct LineTrace<S: GridSemantics> {
    start: Point3<f64>,
    end: Point3<f64>,
    dir: Vector3<f64>,
    inv_dir: Vector3<f64>,
    delta: Vector3<f64>,
    step: CellCoord,
    _semantics: PhantomData<S>,
}

impl<S: GridSemantics> LineTrace<S> {
    /// Prepares a trace between two points.
    #[must_use]
    pub fn new(start: Point3<f64>, end: Point3<f64>) -> Self {
        let dir = (end - start)
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::zeros);
        Self::build(start, end, dir)
    }

    /// Prepares a trace from a start point along a unit direction.
    #[must_use]
    pub fn with_direction(start: Point3<f64>, direction: Vector3<f64>, length: f64) -> Self {
        Self::build(start, start + direction * length, direction)
    }

    fn build(start: Point3<f64>, end: Point3<f64>, dir: Vector3<f64>) -> Self {
        let inv_dir = dir.map(|c| 1.0 / c);
        let delta = inv_dir.map(|c| (S::CELL_SIZE * c).abs());
        let step = CellCoord::new(
            if dir.x > 0.0 { 1 } else { -1 },
            if dir.y > 0.0 { 1 } else { -1 },
            if dir.z > 0.0 { 1 } else { -1 },
        );
        Self {
            start,
            end,
            dir,
            inv_dir,
            delta,
            step,
            _semantics: PhantomData,
        }
    }

    /// The start of the segment.
    #[must_use]
    pub const fn start(&self) -> &Point3<f64> {
        &self.start
    }

    /// The end of the segment.
    #[must_use]
    pub const fn end(&self) -> &Point3<f64> {
        &self.end
    }

    /// Calls `sink` with `(id, element, hit_point)` for every element the
    /// segment pierces. Each element is reported at most once; ordering
    /// across cells is unspecified.
    pub fn multi<F>(&self, grid: &SpatialGrid<S>, mut sink: F)
    where
        F: FnMut(ElementId, &Element<S::ElementData>, Point3<f64>),
    {
        let Some(walk) = self.begin(grid) else {
            return;
        };
        let Walk {
            mut current,
            end_cell,
            mut t_max,
            max_steps,
        } = walk;

        let mut checked_cells = HashSet::new();

        for _ in 0..max_steps {
            self.check_all(grid, current, &mut checked_cells, &mut sink);

            if current == end_cell || !grid.is_cell_within_bounds(current) {
                break;
            }

            self.progress(&mut current, &mut t_max);
        }
    }

    /// Returns the hit closest to the start of the segment, or a default
    /// [`TraceResult`] when the segment misses the grid entirely.
    #[must_use]
    pub fn single(&self, grid: &SpatialGrid<S>) -> TraceResult {
        let mut result = TraceResult::default();

        let Some(walk) = self.begin(grid) else {
            return result;
        };
        let Walk {
            mut current,
            end_cell,
            mut t_max,
            max_steps,
        } = walk;

        result.location = self.end;
        let mut checked_cells = HashSet::new();

        for _ in 0..max_steps {
            self.check_closest(grid, current, &mut checked_cells, &mut result);

            if result.blocking_hit || current == end_cell || !grid.is_cell_within_bounds(current) {
                break;
            }

            self.progress(&mut current, &mut t_max);
        }

        result
    }

    /// Clips the segment against the aggregate bounds and seeds the DDA
    /// state, or `None` when the segment never reaches occupied space.
    fn begin(&self, grid: &SpatialGrid<S>) -> Option<Walk> {
        let grid_bounds = grid.bounds()?;
        let hit_point =
            math::line_box_hit_point(grid_bounds, &self.start, &self.end, &self.dir, &self.inv_dir)?;

        let mut current = grid.location_to_coordinates(&hit_point);
        let end_cell = grid.location_to_coordinates(&self.end);
        let mut t_max = self.seed_t_max(grid, current, &hit_point);

        // When the segment enters from outside, the rounded coordinate can
        // name the neighbor just outside the entry face; one step lands on
        // the first cell the segment is actually inside.
        if hit_point != self.start {
            self.progress(&mut current, &mut t_max);
        }

        Some(Walk {
            current,
            end_cell,
            t_max,
            max_steps: self.max_steps(&hit_point),
        })
    }

    /// Per-axis distance along the ray from `hit_point` to the far face of
    /// the current cell.
    fn seed_t_max(
        &self,
        grid: &SpatialGrid<S>,
        current: CellCoord,
        hit_point: &Point3<f64>,
    ) -> Vector3<f64> {
        let cell_origin = grid.cell_center(current);
        let extent = cell_extent::<S>();
        let mut t_max = Vector3::zeros();
        for axis in 0..3 {
            let t1 = ((cell_origin[axis] - extent[axis]) - hit_point[axis]) * self.inv_dir[axis];
            let t2 = ((cell_origin[axis] + extent[axis]) - hit_point[axis]) * self.inv_dir[axis];
            // f64::max ignores a NaN from 0 * inf on an axis-aligned ray.
            t_max[axis] = t1.max(t2);
        }
        t_max
    }

    /// Hard upper bound on DDA steps: the segment cannot cross more cell
    /// boundaries than its per-axis spans allow.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn max_steps(&self, hit_point: &Point3<f64>) -> usize {
        let delta = self.end - hit_point;
        let cells_on = |span: f64| (span.abs() / S::CELL_SIZE).ceil();
        (cells_on(delta.x) + cells_on(delta.y) + cells_on(delta.z)) as usize + 1
    }

    /// Advances to the next cell along the axis whose boundary is closest.
    /// Ties break in axis order: x before y before z.
    fn progress(&self, current: &mut CellCoord, t_max: &mut Vector3<f64>) {
        if t_max.x <= t_max.y && t_max.x <= t_max.z {
            current.x += self.step.x;
            t_max.x += self.delta.x;
        } else if t_max.y <= t_max.z {
            current.y += self.step.y;
            t_max.y += self.delta.y;
        } else {
            current.z += self.step.z;
            t_max.z += self.delta.z;
        }
    }

    /// Searches the 3x3x3 block around `offset` for pierced elements and
    /// feeds them to `sink`. Cells already visited by this trace are skipped.
    fn check_all<F>(
        &self,
        grid: &SpatialGrid<S>,
        offset: CellCoord,
        checked_cells: &mut HashSet<CellCoord>,
        sink: &mut F,
    ) where
        F: FnMut(ElementId, &Element<S::ElementData>, Point3<f64>),
    {
        for coords in CellRange::new(1).offset(offset) {
            if !checked_cells.insert(coords) {
                continue;
            }
            let Some(cell) = grid.get_cell(coords) else {
                continue;
            };
            if cell.has_elements()
                && math::line_intersects_box(cell.bounds(), &self.start, &self.inv_dir)
            {
                cell.for_each_element(grid, |id, element| {
                    if let Some(hit) = element.bounds().line_hit_point(
                        &self.start,
                        &self.end,
                        &self.dir,
                        &self.inv_dir,
                    ) {
                        sink(id, element, hit);
                    }
                });
            }
        }
    }

    /// Same block search as [`check_all`](Self::check_all), but folds hits
    /// into the running closest result instead of emitting them.
    fn check_closest(
        &self,
        grid: &SpatialGrid<S>,
        offset: CellCoord,
        checked_cells: &mut HashSet<CellCoord>,
        closest: &mut TraceResult,
    ) {
        for coords in CellRange::new(1).offset(offset) {
            if !checked_cells.insert(coords) {
                continue;
            }
            let Some(cell) = grid.get_cell(coords) else {
                continue;
            };
            if cell.has_elements()
                && math::line_intersects_box(cell.bounds(), &self.start, &self.inv_dir)
            {
                cell.for_each_element(grid, |id, element| {
                    let Some(hit) = element.bounds().line_hit_point(
                        &self.start,
                        &self.end,
                        &self.dir,
                        &self.inv_dir,
                    ) else {
                        return;
                    };
                    if !closest.blocking_hit
                        || distance_squared(&self.start, &hit)
                            < distance_squared(&self.start, &closest.impact_point)
                    {
                        closest.blocking_hit = true;
                        closest.location = hit;
                        closest.impact_point = hit;
                        closest.impact_normal = element.bounds().impact_normal(&hit, &self.dir);
                        closest.element_id = id;
                    }
                });
            }
        }
    }
}

/// Seeded DDA state shared by both trace modes.
struct Walk {
    current: CellCoord,
    end_cell: CellCoord,
    t_max: Vector3<f64>,
    max_steps: usize,
}
