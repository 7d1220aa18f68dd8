//! Radial (sphere) overlap queries.
//!
//! A query enumerates every element whose bounds overlap a sphere. Two modes
//! share one iterator shape:
//!
//! - **Uncached**: scans the cube of cells covering the sphere, rejecting
//!   whole cells with a sphere/AABB test before testing elements. Cheap to
//!   build, pays the per-cell reject on every run.
//! - **Cached**: classifies the cube once, relative to an unbound origin
//!   cell, into three disjoint shells:
//!   - *inner* — cells whose farthest corner lies within the effective
//!     radius `r - half_diagonal`. Every resident element is guaranteed to
//!     overlap the sphere (element radii are capped below half a cell), so
//!     they are emitted without any test;
//!   - *outer* — the outermost shell of the cube; needs the per-cell reject
//!     and then per-element tests;
//!   - *edge* — everything in between; per-element tests only.
//!
//! Build a cached query once, then bind it to as many origins as needed:
//!
//! ```
//! use nalgebra::Point3;
//! use sparse_grid::{Bounds, GridSemantics, SphereQueryBuilder, SpatialGrid};
//!
//! struct Demo;
//! impl GridSemantics for Demo {
//!     const CELL_SIZE: f64 = 100.0;
//!     const MAX_ELEMENT_RADIUS: f64 = 49.0;
//!     type ElementData = ();
//! }
//!
//! let mut grid: SpatialGrid<Demo> = SpatialGrid::new();
//! let id = grid.add_element(
//!     Bounds::Sphere { origin: Point3::new(10.0, 0.0, 0.0), radius: 5.0 },
//!     (),
//! );
//!
//! let query = SphereQueryBuilder::new().radius(150.0).build_cached();
//! let mut hits = Vec::new();
//! query
//!     .set_origin(Point3::new(0.0, 0.0, 0.0))
//!     .each(&grid, |id, _element| hits.push(id));
//! assert_eq!(hits, vec![id]);
//! ```

use std::marker::PhantomData;

use nalgebra::{Point3, Vector3};

use crate::coord::{CellCoord, CellRange};
use crate::grid::{Cell, Element, GridSemantics, SpatialGrid, cell_extent, half_diagonal};
use crate::math;
use crate::slot_map::ElementId;

/// Cube half-width, in cells, needed to cover a sphere of `radius`.
fn scan_bounds<S: GridSemantics>(radius: f64) -> i32 {
    #[allow(clippy::cast_possible_truncation)]
    let cells = (radius / S::CELL_SIZE).round() as i32;
    cells + 1
}

fn scan_elements<S, F>(
    grid: &SpatialGrid<S>,
    cell: &Cell,
    origin: &Point3<f64>,
    radius: f64,
    sink: &mut F,
) where
    S: GridSemantics,
    F: FnMut(ElementId, &Element<S::ElementData>),
{
    cell.for_each_element(grid, |id, element| {
        if element.bounds().overlaps_sphere(origin, radius) {
            sink(id, element);
        }
    });
}

fn scan_cell<S, F>(
    grid: &SpatialGrid<S>,
    cell: &Cell,
    origin: &Point3<f64>,
    radius: f64,
    radius_sq: f64,
    sink: &mut F,
) where
    S: GridSemantics,
    F: FnMut(ElementId, &Element<S::ElementData>),
{
    if math::box_intersects_sphere_radius_sq(cell.bounds(), origin, radius_sq) {
        scan_elements(grid, cell, origin, radius, sink);
    }
}

/// Visiting every occupied cell beats addressing candidates one by one once
/// the candidate cube outnumbers the cells that actually exist.
fn scan_all_cells<S, F>(
    grid: &SpatialGrid<S>,
    origin: &Point3<f64>,
    radius: f64,
    radius_sq: f64,
    sink: &mut F,
) where
    S: GridSemantics,
    F: FnMut(ElementId, &Element<S::ElementData>),
{
    grid.for_each_cell(|_, cell| {
        scan_cell(grid, cell, origin, radius, radius_sq, &mut *sink);
    });
}

/// Builder for radial queries; see the [module docs](self) for the two modes.
#[derive(Debug, Clone)]
pub struct SphereQueryBuilder<S: GridSemantics> {
    radius: f64,
    _semantics: PhantomData<S>,
}

impl<S: GridSemantics> SphereQueryBuilder<S> {
    /// Starts a builder with the radius defaulted to one cell size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            radius: S::CELL_SIZE,
            _semantics: PhantomData,
        }
    }

    /// Sets the query radius.
    #[must_use]
    pub fn radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Sets the radius to the bounding-sphere radius of a box with the given
    /// half-extents, for callers sizing a query around a box-shaped region.
    #[must_use]
    pub fn box_extent(mut self, half_extents: Vector3<f64>) -> Self {
        self.radius = half_extents.norm();
        self
    }

    /// Builds a single-shot query that classifies cells at run time.
    #[must_use]
    pub fn build_uncached(self) -> SphereQuery<S> {
        SphereQuery {
            radius: self.radius,
            _semantics: PhantomData,
        }
    }

    /// Builds a reusable query with the cell shells classified up front.
    #[must_use]
    pub fn build_cached(self) -> CachedSphereQuery<S> {
        let radius = self.radius;
        let bounds = scan_bounds::<S>(radius);
        let extent = cell_extent::<S>();
        // The farthest an element center can sit from its cell center is the
        // half diagonal; only cells whose farthest corner clears the reduced
        // radius may skip the per-element test. Queries smaller than the
        // half diagonal can never guarantee a cell.
        let effective = (radius - half_diagonal::<S>()).max(0.0);
        let effective_sq = effective * effective;

        let mut inner = Vec::new();
        let mut edge = Vec::new();
        let mut outer = Vec::new();

        for index in CellRange::new(bounds) {
            let cell_center = index.to_vector() * S::CELL_SIZE;

            // The corner of this cell farthest from the query origin.
            let farthest = Vector3::new(
                if cell_center.x > 0.0 {
                    cell_center.x + extent.x
                } else {
                    cell_center.x - extent.x
                },
                if cell_center.y > 0.0 {
                    cell_center.y + extent.y
                } else {
                    cell_center.y - extent.y
                },
                if cell_center.z > 0.0 {
                    cell_center.z + extent.z
                } else {
                    cell_center.z - extent.z
                },
            );

            if farthest.norm_squared() <= effective_sq {
                inner.push(index);
            } else if index.x.abs() < bounds && index.y.abs() < bounds && index.z.abs() < bounds {
                edge.push(index);
            } else {
                outer.push(index);
            }
        }

        CachedSphereQuery {
            radius,
            inner,
            edge,
            outer,
            _semantics: PhantomData,
        }
    }
}

impl<S: GridSemantics> Default for SphereQueryBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single-shot radial query; bind an origin with
/// [`set_origin`](Self::set_origin) to run it.
#[derive(Debug, Clone)]
pub struct SphereQuery<S: GridSemantics> {
    radius: f64,
    _semantics: PhantomData<S>,
}

impl<S: GridSemantics> SphereQuery<S> {
    /// The query radius.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Binds the query to a world-space origin.
    #[must_use]
    pub fn set_origin(&self, origin: Point3<f64>) -> QueryIter<'_, S> {
        QueryIter {
            query: self,
            origin,
        }
    }
}

/// An uncached query bound to an origin.
#[derive(Debug)]
pub struct QueryIter<'q, S: GridSemantics> {
    query: &'q SphereQuery<S>,
    origin: Point3<f64>,
}

impl<S: GridSemantics> QueryIter<'_, S> {
    /// Calls `sink` for every element overlapping the query sphere. The
    /// sink's return value is ignored; there is no early exit.
    pub fn each<F>(&self, grid: &SpatialGrid<S>, mut sink: F)
    where
        F: FnMut(ElementId, &Element<S::ElementData>),
    {
        let radius = self.query.radius;
        let radius_sq = radius * radius;
        let range = CellRange::new(scan_bounds::<S>(radius));

        if range.count() > grid.num_cells() {
            scan_all_cells(grid, &self.origin, radius, radius_sq, &mut sink);
            return;
        }

        let offset = grid.location_to_coordinates(&self.origin);
        for coords in range.offset(offset) {
            if let Some(cell) = grid.get_cell(coords) {
                scan_cell(grid, cell, &self.origin, radius, radius_sq, &mut sink);
            }
        }
    }
}

/// A reusable radial query with pre-classified cell shells; bind an origin
/// with [`set_origin`](Self::set_origin) to run it.
#[derive(Debug, Clone)]
pub struct CachedSphereQuery<S: GridSemantics> {
    radius: f64,
    inner: Vec<CellCoord>,
    edge: Vec<CellCoord>,
    outer: Vec<CellCoord>,
    _semantics: PhantomData<S>,
}

impl<S: GridSemantics> CachedSphereQuery<S> {
    /// The query radius.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Total number of classified cells across the three shells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.inner.len() + self.edge.len() + self.outer.len()
    }

    /// Binds the query to a world-space origin.
    #[must_use]
    pub fn set_origin(&self, origin: Point3<f64>) -> CachedQueryIter<'_, S> {
        CachedQueryIter {
            query: self,
            origin,
        }
    }

    #[cfg(test)]
    pub(crate) fn shell_sizes(&self) -> (usize, usize, usize) {
        (self.inner.len(), self.edge.len(), self.outer.len())
    }
}

/// A cached query bound to an origin.
#[derive(Debug)]
pub struct CachedQueryIter<'q, S: GridSemantics> {
    query: &'q CachedSphereQuery<S>,
    origin: Point3<f64>,
}

impl<S: GridSemantics> CachedQueryIter<'_, S> {
    /// Calls `sink` for every element overlapping the query sphere. The
    /// sink's return value is ignored; there is no early exit.
    pub fn each<F>(&self, grid: &SpatialGrid<S>, mut sink: F)
    where
        F: FnMut(ElementId, &Element<S::ElementData>),
    {
        let radius = self.query.radius;
        let radius_sq = radius * radius;

        if self.query.cell_count() > grid.num_cells() {
            scan_all_cells(grid, &self.origin, radius, radius_sq, &mut sink);
            return;
        }

        let offset = grid.location_to_coordinates(&self.origin);

        // Inner cells are fully contained in the sphere: emit unconditionally.
        for &coords in &self.query.inner {
            if let Some(cell) = grid.get_cell(coords + offset) {
                if cell.has_elements() {
                    cell.for_each_element(grid, &mut sink);
                }
            }
        }

        for &coords in &self.query.edge {
            if let Some(cell) = grid.get_cell(coords + offset) {
                scan_elements(grid, cell, &self.origin, radius, &mut sink);
            }
        }

        for &coords in &self.query.outer {
            if let Some(cell) = grid.get_cell(coords + offset) {
                scan_cell(grid, cell, &self.origin, radius, radius_sq, &mut sink);
            }
        }
    }
}
