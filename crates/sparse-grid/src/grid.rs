//! The sparse cell grid: element storage, cell membership, aggregate bounds.

use hashbrown::{HashMap, HashSet, hash_map::Entry};
use nalgebra::{Point3, Vector3};

use crate::bounds::{Aabb, Bounds};
use crate::coord::CellCoord;
use crate::error::GridError;
use crate::math;
use crate::slot_map::{ElementId, SlotMap};

/// Compile-time parameters of a grid instantiation.
///
/// The grid is generic over this descriptor the way the cell size and payload
/// type would be template parameters in other engines: every instantiation
/// fixes its cell geometry at the type level, so queries can precompute shell
/// classifications that remain valid for the grid's whole lifetime.
///
/// Constraints (`CELL_SIZE > 0`, `MAX_ELEMENT_RADIUS < CELL_SIZE / 2`) are
/// checked when a grid is constructed.
///
/// # Example
///
/// ```
/// use sparse_grid::GridSemantics;
///
/// struct WorldSemantics;
///
/// impl GridSemantics for WorldSemantics {
///     const CELL_SIZE: f64 = 100.0;
///     const MAX_ELEMENT_RADIUS: f64 = 49.0;
///     type ElementData = u64;
/// }
/// ```
pub trait GridSemantics {
    /// Edge length of every (cubic) cell, in world units.
    const CELL_SIZE: f64;
    /// Upper bound on [`Bounds::radius`] for stored elements. Must be less
    /// than `CELL_SIZE / 2` so an element never protrudes past the cells
    /// adjacent to its home cell.
    const MAX_ELEMENT_RADIUS: f64;
    /// Host payload carried by every element.
    type ElementData;
}

/// Half of the cell edge length.
#[must_use]
pub fn half_cell_size<S: GridSemantics>() -> f64 {
    S::CELL_SIZE * 0.5
}

/// Distance from a cell center to any of its corners.
#[must_use]
pub fn half_diagonal<S: GridSemantics>() -> f64 {
    half_cell_size::<S>() * 3.0_f64.sqrt()
}

/// Half-extent vector of a cell's AABB.
#[must_use]
pub fn cell_extent<S: GridSemantics>() -> Vector3<f64> {
    Vector3::repeat(half_cell_size::<S>())
}

/// One stored element: its home cell, its volume, and the host payload.
#[derive(Debug, Clone)]
pub struct Element<D> {
    cell: CellCoord,
    bounds: Bounds,
    data: D,
}

impl<D> Element<D> {
    /// The cell this element currently lives in.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }

    /// The element's volume.
    #[must_use]
    pub const fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// The host payload.
    #[must_use]
    pub const fn data(&self) -> &D {
        &self.data
    }

    /// The host payload, mutably.
    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }
}

/// One occupied region of the grid: the ids of resident elements and the
/// cell's world-space AABB, fixed at creation.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    elements: HashSet<ElementId>,
    bounds: Aabb,
}

impl Cell {
    /// The cell's world-space AABB.
    #[must_use]
    pub const fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Returns whether any element lives here.
    #[must_use]
    pub fn has_elements(&self) -> bool {
        !self.elements.is_empty()
    }

    /// Number of resident elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns whether the cell holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterates the ids of resident elements, in no particular order.
    pub fn element_ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.elements.iter().copied()
    }

    /// Calls `f` for every resident element, resolving ids through the
    /// grid's element store. Ids that fail to resolve are skipped.
    pub fn for_each_element<S, F>(&self, grid: &SpatialGrid<S>, mut f: F)
    where
        S: GridSemantics,
        F: FnMut(ElementId, &Element<S::ElementData>),
    {
        for &id in &self.elements {
            grid.elements.apply_at(id, &mut f);
        }
    }
}

/// A sparse, unbounded 3D spatial index over a uniform grid of cubic cells.
///
/// Elements (spheres or axis-aligned boxes, each smaller than half a cell)
/// are stored in a generational slot map and indexed by the cell containing
/// their center. The grid also maintains the aggregate AABB of every cell it
/// has ever occupied, which the query engines use to clip their work.
///
/// # Concurrency
///
/// Mutators take `&mut self`: exclusive access is the write lock. Readers
/// (lookups and both query engines) take `&self` and may run from many
/// threads at once, provided no mutator runs concurrently — the usual tick
/// shape is a serial mutation phase followed by a parallel read phase. For
/// concurrent mutation, wrap the grid in a `std::sync::Mutex` or `RwLock`.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use sparse_grid::{Bounds, CellCoord, GridSemantics, SpatialGrid};
///
/// struct Demo;
/// impl GridSemantics for Demo {
///     const CELL_SIZE: f64 = 100.0;
///     const MAX_ELEMENT_RADIUS: f64 = 49.0;
///     type ElementData = &'static str;
/// }
///
/// let mut grid: SpatialGrid<Demo> = SpatialGrid::new();
/// let id = grid.add_element(
///     Bounds::Sphere { origin: Point3::new(10.0, 10.0, 10.0), radius: 5.0 },
///     "player",
/// );
///
/// let element = grid.get_element(id).unwrap();
/// assert_eq!(element.cell(), CellCoord::new(0, 0, 0));
/// assert_eq!(*element.data(), "player");
///
/// grid.remove_element(id);
/// assert!(grid.get_element(id).is_none());
/// ```
#[derive(Debug)]
pub struct SpatialGrid<S: GridSemantics> {
    origin: Point3<f64>,
    elements: SlotMap<Element<S::ElementData>>,
    cells: HashMap<CellCoord, Cell>,
    bounds: Option<Aabb>,
}

impl<S: GridSemantics> SpatialGrid<S> {
    /// Creates an empty grid with its origin at the world origin.
    ///
    /// # Panics
    ///
    /// Panics when the semantics constants are invalid; see
    /// [`try_new`](Self::try_new) for the fallible form.
    #[must_use]
    pub fn new() -> Self {
        Self::with_origin(Point3::origin())
    }

    /// Creates an empty grid whose cell `(0, 0, 0)` is centered on `origin`.
    ///
    /// # Panics
    ///
    /// Panics when the semantics constants are invalid.
    #[must_use]
    pub fn with_origin(origin: Point3<f64>) -> Self {
        assert!(
            S::CELL_SIZE > 0.0 && S::CELL_SIZE.is_finite(),
            "cell size must be positive and finite"
        );
        assert!(
            S::MAX_ELEMENT_RADIUS < half_cell_size::<S>(),
            "max element radius must be less than half the cell size"
        );
        Self {
            origin,
            elements: SlotMap::new(),
            cells: HashMap::new(),
            bounds: None,
        }
    }

    /// Fallible constructor: validates the semantics constants instead of
    /// panicking.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidCellSize`] or
    /// [`GridError::InvalidElementRadius`] when the constants violate their
    /// constraints.
    pub fn try_new() -> Result<Self, GridError> {
        if S::CELL_SIZE <= 0.0 || !S::CELL_SIZE.is_finite() {
            return Err(GridError::InvalidCellSize(S::CELL_SIZE));
        }
        if S::MAX_ELEMENT_RADIUS >= half_cell_size::<S>() {
            return Err(GridError::InvalidElementRadius {
                radius: S::MAX_ELEMENT_RADIUS,
                cell_size: S::CELL_SIZE,
            });
        }
        Ok(Self::with_origin(Point3::origin()))
    }

    /// Edge length of every cell.
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        S::CELL_SIZE
    }

    /// Number of occupied cells (including cells left empty by removals
    /// until [`clear_empty_cells`](Self::clear_empty_cells) runs).
    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Number of live elements.
    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// The world-space position of cell `(0, 0, 0)`'s center.
    #[must_use]
    pub const fn origin(&self) -> &Point3<f64> {
        &self.origin
    }

    /// The union of the AABBs of every cell that ever held an element, or
    /// `None` while the grid has never been occupied. Grows monotonically;
    /// never shrunk by element removal or cell compaction.
    #[must_use]
    pub const fn bounds(&self) -> Option<&Aabb> {
        self.bounds.as_ref()
    }

    /// Maps a world-space location to the coordinate of the containing cell.
    #[must_use]
    pub fn location_to_coordinates(&self, location: &Point3<f64>) -> CellCoord {
        math::round_vec_to_cell((location - self.origin) / S::CELL_SIZE)
    }

    /// World-space center of a cell.
    #[must_use]
    pub fn cell_center(&self, coords: CellCoord) -> Point3<f64> {
        self.origin + coords.to_vector() * S::CELL_SIZE
    }

    /// Returns whether a cell's center lies inside the aggregate bounds.
    #[must_use]
    pub fn is_cell_within_bounds(&self, coords: CellCoord) -> bool {
        self.bounds
            .as_ref()
            .is_some_and(|bounds| bounds.contains(&self.cell_center(coords)))
    }

    /// Inserts an element, creating its cell if needed, and returns its id.
    ///
    /// # Panics
    ///
    /// Panics when `bounds.radius()` is not smaller than half the cell size;
    /// such an element could protrude beyond the neighbor cells the query
    /// engines scan.
    pub fn add_element(&mut self, bounds: Bounds, data: S::ElementData) -> ElementId {
        assert!(
            bounds.radius() < half_cell_size::<S>(),
            "element radius must be less than half the cell size"
        );

        let coords = self.location_to_coordinates(&bounds.origin());
        let id = self.elements.insert(Element {
            cell: coords,
            bounds,
            data,
        });
        self.find_or_add_cell(coords).elements.insert(id);
        id
    }

    /// Removes an element. Stale or invalid ids are ignored.
    ///
    /// The element's cell stays in the map even when emptied; reclaim empty
    /// cells explicitly with [`clear_empty_cells`](Self::clear_empty_cells).
    pub fn remove_element(&mut self, id: ElementId) {
        if let Some(element) = self.elements.remove(id) {
            if let Some(cell) = self.cells.get_mut(&element.cell) {
                cell.elements.remove(&id);
            }
        }
    }

    /// Moves an element to a new location, migrating it between cells when
    /// the move crosses a cell boundary. Unknown ids are ignored.
    pub fn update_element_location(&mut self, id: ElementId, new_location: Point3<f64>) {
        let origin = self.origin;
        let Some(element) = self.elements.get_mut(id) else {
            return;
        };

        element.bounds.set_origin(new_location);
        let new_coords = math::round_vec_to_cell((new_location - origin) / S::CELL_SIZE);
        let old_coords = element.cell;
        if new_coords == old_coords {
            return;
        }
        element.cell = new_coords;

        let prev_cell = self.cells.get_mut(&old_coords);
        debug_assert!(prev_cell.is_some(), "live element in unmapped cell");
        if let Some(prev_cell) = prev_cell {
            prev_cell.elements.remove(&id);
        }
        self.find_or_add_cell(new_coords).elements.insert(id);
    }

    /// Returns an element by id, or `None` for stale or invalid ids.
    #[must_use]
    pub fn get_element(&self, id: ElementId) -> Option<&Element<S::ElementData>> {
        self.elements.get(id)
    }

    /// Returns the cell at `coords`, if it exists.
    #[must_use]
    pub fn get_cell(&self, coords: CellCoord) -> Option<&Cell> {
        self.cells.get(&coords)
    }

    /// Calls `f` with the cell at `coords` iff it exists.
    pub fn with_cell<F>(&self, coords: CellCoord, f: F)
    where
        F: FnOnce(&Cell),
    {
        if let Some(cell) = self.cells.get(&coords) {
            f(cell);
        }
    }

    /// Visits every cell, in no particular order.
    pub fn for_each_cell<F>(&self, mut f: F)
    where
        F: FnMut(CellCoord, &Cell),
    {
        for (&coords, cell) in &self.cells {
            f(coords, cell);
        }
    }

    /// Visits every live element, in no particular order.
    pub fn for_each_element<F>(&self, mut f: F)
    where
        F: FnMut(ElementId, &Element<S::ElementData>),
    {
        for (id, element) in self.elements.iter() {
            f(id, element);
        }
    }

    /// Drops every cell whose element set is empty. The aggregate bounds are
    /// left untouched.
    pub fn clear_empty_cells(&mut self) {
        let before = self.cells.len();
        self.cells.retain(|_, cell| cell.has_elements());
        tracing::trace!(removed = before - self.cells.len(), "cleared empty cells");
    }

    fn find_or_add_cell(&mut self, coords: CellCoord) -> &mut Cell {
        let origin = self.origin;
        match self.cells.entry(coords) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let center = origin + coords.to_vector() * S::CELL_SIZE;
                let cell_bounds = Aabb::from_center(center, cell_extent::<S>());
                match &mut self.bounds {
                    Some(bounds) => bounds.expand_to_include(&cell_bounds),
                    None => self.bounds = Some(cell_bounds),
                }
                tracing::trace!(?coords, "created cell");
                entry.insert(Cell {
                    elements: HashSet::new(),
                    bounds: cell_bounds,
                })
            }
        }
    }
}

impl<S: GridSemantics> Default for SpatialGrid<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    struct Demo;
    impl GridSemantics for Demo {
        const CELL_SIZE: f64 = 100.0;
        const MAX_ELEMENT_RADIUS: f64 = 49.0;
        type ElementData = u32;
    }

    struct BadRadius;
    impl GridSemantics for BadRadius {
        const CELL_SIZE: f64 = 100.0;
        const MAX_ELEMENT_RADIUS: f64 = 50.0;
        type ElementData = ();
    }

    fn sphere(x: f64, y: f64, z: f64, radius: f64) -> Bounds {
        Bounds::Sphere {
            origin: Point3::new(x, y, z),
            radius,
        }
    }

    #[test]
    fn semantics_helpers() {
        assert_eq!(half_cell_size::<Demo>(), 50.0);
        assert_eq!(cell_extent::<Demo>(), Vector3::repeat(50.0));
        approx::assert_relative_eq!(half_diagonal::<Demo>(), 50.0 * 3.0_f64.sqrt());
    }

    #[test]
    fn try_new_rejects_bad_semantics() {
        assert!(matches!(
            SpatialGrid::<BadRadius>::try_new(),
            Err(GridError::InvalidElementRadius { .. })
        ));
        assert!(SpatialGrid::<Demo>::try_new().is_ok());
    }

    #[test]
    #[should_panic(expected = "max element radius")]
    fn new_panics_on_bad_semantics() {
        let _ = SpatialGrid::<BadRadius>::new();
    }

    #[test]
    fn coordinates_round_to_nearest_cell() {
        let grid: SpatialGrid<Demo> = SpatialGrid::new();
        assert_eq!(
            grid.location_to_coordinates(&Point3::new(10.0, 10.0, 10.0)),
            CellCoord::new(0, 0, 0)
        );
        assert_eq!(
            grid.location_to_coordinates(&Point3::new(60.0, -60.0, 149.0)),
            CellCoord::new(1, -1, 1)
        );
        assert_eq!(
            grid.cell_center(CellCoord::new(1, -1, 0)),
            Point3::new(100.0, -100.0, 0.0)
        );
    }

    #[test]
    fn origin_offsets_every_conversion() {
        let grid: SpatialGrid<Demo> = SpatialGrid::with_origin(Point3::new(1000.0, 0.0, 0.0));
        assert_eq!(
            grid.location_to_coordinates(&Point3::new(1010.0, 0.0, 0.0)),
            CellCoord::new(0, 0, 0)
        );
        assert_eq!(
            grid.cell_center(CellCoord::new(1, 0, 0)),
            Point3::new(1100.0, 0.0, 0.0)
        );
    }

    #[test]
    fn add_element_populates_cell_and_bounds() {
        let mut grid: SpatialGrid<Demo> = SpatialGrid::new();
        let id = grid.add_element(sphere(10.0, 10.0, 10.0, 5.0), 7);

        assert_eq!(grid.num_cells(), 1);
        assert_eq!(grid.num_elements(), 1);
        let cell = grid.get_cell(CellCoord::new(0, 0, 0)).unwrap();
        assert_eq!(cell.len(), 1);
        assert_eq!(cell.element_ids().next(), Some(id));

        let bounds = grid.bounds().unwrap();
        assert_eq!(bounds.min, Point3::new(-50.0, -50.0, -50.0));
        assert_eq!(bounds.max, Point3::new(50.0, 50.0, 50.0));
    }

    #[test]
    #[should_panic(expected = "element radius")]
    fn oversized_element_is_rejected() {
        let mut grid: SpatialGrid<Demo> = SpatialGrid::new();
        grid.add_element(sphere(0.0, 0.0, 0.0, 50.0), 0);
    }

    #[test]
    fn remove_element_tolerates_stale_ids() {
        let mut grid: SpatialGrid<Demo> = SpatialGrid::new();
        let id = grid.add_element(sphere(0.0, 0.0, 0.0, 5.0), 1);
        grid.remove_element(id);
        assert!(grid.get_element(id).is_none());
        // Double remove is a no-op.
        grid.remove_element(id);
        assert_eq!(grid.num_elements(), 0);
        // The emptied cell lingers.
        assert_eq!(grid.num_cells(), 1);
    }

    #[test]
    fn update_location_migrates_between_cells() {
        let mut grid: SpatialGrid<Demo> = SpatialGrid::new();
        let id = grid.add_element(sphere(10.0, 0.0, 0.0, 5.0), 1);

        grid.update_element_location(id, Point3::new(60.0, 0.0, 0.0));

        let element = grid.get_element(id).unwrap();
        assert_eq!(element.cell(), CellCoord::new(1, 0, 0));
        assert_eq!(element.bounds().origin(), Point3::new(60.0, 0.0, 0.0));
        assert!(grid.get_cell(CellCoord::new(0, 0, 0)).unwrap().is_empty());
        assert_eq!(grid.get_cell(CellCoord::new(1, 0, 0)).unwrap().len(), 1);
    }

    #[test]
    fn update_location_within_cell_keeps_membership() {
        let mut grid: SpatialGrid<Demo> = SpatialGrid::new();
        let id = grid.add_element(sphere(10.0, 0.0, 0.0, 5.0), 1);
        grid.update_element_location(id, Point3::new(20.0, 5.0, -5.0));
        assert_eq!(grid.get_element(id).unwrap().cell(), CellCoord::new(0, 0, 0));
        assert_eq!(grid.num_cells(), 1);
    }

    #[test]
    fn update_location_ignores_unknown_ids() {
        let mut grid: SpatialGrid<Demo> = SpatialGrid::new();
        grid.update_element_location(ElementId::default(), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(grid.num_cells(), 0);
    }

    #[test]
    fn clear_empty_cells_keeps_bounds() {
        let mut grid: SpatialGrid<Demo> = SpatialGrid::new();
        let id = grid.add_element(sphere(10.0, 0.0, 0.0, 5.0), 1);
        grid.update_element_location(id, Point3::new(60.0, 0.0, 0.0));

        grid.clear_empty_cells();

        assert!(grid.get_cell(CellCoord::new(0, 0, 0)).is_none());
        assert_eq!(grid.num_cells(), 1);
        let bounds = grid.bounds().unwrap();
        assert_eq!(bounds.min, Point3::new(-50.0, -50.0, -50.0));
        assert_eq!(bounds.max, Point3::new(150.0, 50.0, 50.0));
    }

    #[test]
    fn cell_membership_matches_element_cells() {
        let mut grid: SpatialGrid<Demo> = SpatialGrid::new();
        for i in 0..20 {
            let x = f64::from(i) * 37.0 - 300.0;
            grid.add_element(sphere(x, x * 0.5, -x, 10.0), i as u32);
        }

        grid.for_each_cell(|coords, cell| {
            cell.for_each_element(&grid, |_, element| {
                assert_eq!(element.cell(), coords);
                assert_eq!(
                    grid.location_to_coordinates(&element.bounds().origin()),
                    coords
                );
            });
        });

        let mut visited = 0;
        grid.for_each_element(|id, element| {
            assert!(grid.get_cell(element.cell()).unwrap().element_ids().any(|e| e == id));
            visited += 1;
        });
        assert_eq!(visited, 20);
    }

    #[test]
    fn bounds_contain_every_live_origin() {
        let mut grid: SpatialGrid<Demo> = SpatialGrid::new();
        for i in 0..10 {
            let x = f64::from(i) * 91.0 - 400.0;
            grid.add_element(sphere(x, 0.0, x * 0.3, 5.0), 0);
        }
        let bounds = *grid.bounds().unwrap();
        grid.for_each_element(|_, element| {
            assert!(bounds.contains(&element.bounds().origin()));
        });
    }

    #[test]
    fn is_cell_within_bounds_tracks_aggregate() {
        let mut grid: SpatialGrid<Demo> = SpatialGrid::new();
        assert!(!grid.is_cell_within_bounds(CellCoord::new(0, 0, 0)));
        grid.add_element(sphere(0.0, 0.0, 0.0, 5.0), 0);
        assert!(grid.is_cell_within_bounds(CellCoord::new(0, 0, 0)));
        assert!(!grid.is_cell_within_bounds(CellCoord::new(1, 0, 0)));
    }
}
