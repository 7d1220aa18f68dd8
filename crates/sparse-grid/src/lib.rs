//! Sparse, unbounded 3D spatial index over a uniform grid of cubic cells.
//!
//! This crate lets a host (a game, a robotics stack, a simulation) register
//! volumetric elements — spheres or axis-aligned boxes — at world-space
//! positions, relocate them as they move, and answer two classes of
//! geometric queries cheaply:
//!
//! - [`SphereQueryBuilder`] / [`CachedSphereQuery`] — *radial overlap*:
//!   which elements overlap a sphere centered at a point?
//! - [`LineTrace`] — *line trace*: which elements does a directed segment
//!   pierce, optionally stopping at the nearest hit?
//!
//! Three subsystems cooperate:
//!
//! - [`SlotMap`] — a generational, dense-array-backed element store whose
//!   [`ElementId`] handles stay stable under insert/remove and never resolve
//!   once their element is gone.
//! - [`SpatialGrid`] — a sparse map from integer [`CellCoord`]s to sets of
//!   element ids, plus the monotonically growing AABB of all occupied space.
//! - The query engines — a pre-classified shell scanner for radial queries
//!   and a 3D-DDA voxel walk for line traces.
//!
//! # Semantics
//!
//! A grid is parameterized by a [`GridSemantics`] type fixing the cell size,
//! the maximum element radius, and the host payload at compile time. The
//! radius cap (`MAX_ELEMENT_RADIUS < CELL_SIZE / 2`) is what lets both query
//! engines confine their search to a one-cell neighborhood.
//!
//! # Example
//!
//! ```
//! use nalgebra::Point3;
//! use sparse_grid::{Bounds, GridSemantics, LineTrace, SpatialGrid, SphereQueryBuilder};
//!
//! struct WorldSemantics;
//! impl GridSemantics for WorldSemantics {
//!     const CELL_SIZE: f64 = 100.0;
//!     const MAX_ELEMENT_RADIUS: f64 = 49.0;
//!     type ElementData = u64;
//! }
//!
//! let mut grid: SpatialGrid<WorldSemantics> = SpatialGrid::new();
//! let id = grid.add_element(
//!     Bounds::Sphere { origin: Point3::new(10.0, 10.0, 10.0), radius: 5.0 },
//!     42,
//! );
//!
//! // Radial query: build once, run against any origin.
//! let query = SphereQueryBuilder::new().radius(250.0).build_cached();
//! let mut found = Vec::new();
//! query
//!     .set_origin(Point3::new(0.0, 0.0, 0.0))
//!     .each(&grid, |id, element| found.push((id, *element.data())));
//! assert_eq!(found, vec![(id, 42)]);
//!
//! // Line trace: closest hit along a segment.
//! let trace = LineTrace::new(Point3::new(-500.0, 10.0, 10.0), Point3::new(500.0, 10.0, 10.0));
//! let hit = trace.single(&grid);
//! assert!(hit.blocking_hit);
//! assert_eq!(hit.element_id, id);
//! ```
//!
//! # Concurrency
//!
//! Mutation requires `&mut SpatialGrid`; reads — lookups and both query
//! engines — take `&self` and are safe to fan out across threads once
//! mutation has quiesced. See the [`SpatialGrid`] docs.
//!
//! # Float semantics
//!
//! Coordinates are `f64` and assumed free of NaNs. Axis-aligned rays produce
//! infinite reciprocal components; all traversal math tolerates them.

// Safety: Deny unwrap/expect in library code. Tests may use them.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod bounds;
mod coord;
mod error;
mod grid;
pub mod math;
mod query;
mod slot_map;
mod trace;

pub use bounds::{Aabb, Bounds, DebugDraw};
pub use coord::{CellCoord, CellRange, CellRangeIter};
pub use error::GridError;
pub use grid::{
    Cell, Element, GridSemantics, SpatialGrid, cell_extent, half_cell_size, half_diagonal,
};
pub use query::{
    CachedQueryIter, CachedSphereQuery, QueryIter, SphereQuery, SphereQueryBuilder,
};
pub use slot_map::{ElementId, SlotMap};
pub use trace::{LineTrace, TraceResult};

// Re-export the math types for convenience.
pub use nalgebra::{Point3, Vector3};
