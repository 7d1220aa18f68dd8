//! Geometric primitives: world-space AABBs and the tagged element bound.

use nalgebra::{Point3, Vector3, distance_squared};

use crate::math;

/// An axis-aligned bounding box in world coordinates.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use sparse_grid::Aabb;
///
/// let aabb = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 10.0));
/// assert!(aabb.contains(&Point3::new(5.0, 5.0, 5.0)));
/// assert!(!aabb.contains(&Point3::new(15.0, 5.0, 5.0)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    /// Minimum corner of the bounding box.
    pub min: Point3<f64>,
    /// Maximum corner of the bounding box.
    pub max: Point3<f64>,
}

impl Aabb {
    /// Creates a new AABB from two corners, reordering them if necessary.
    #[must_use]
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self {
            min: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Creates an AABB centered at a point with the given half-extents.
    #[must_use]
    pub fn from_center(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Returns the center point of the AABB.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        Point3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    /// Returns the half-extents (half-size) of the AABB.
    #[must_use]
    pub fn half_extents(&self) -> Vector3<f64> {
        Vector3::new(
            (self.max.x - self.min.x) * 0.5,
            (self.max.y - self.min.y) * 0.5,
            (self.max.z - self.min.z) * 0.5,
        )
    }

    /// Checks if a point is inside the AABB, boundaries included.
    #[must_use]
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Returns the point of the AABB closest to `point`.
    ///
    /// Points inside the box map to themselves.
    #[must_use]
    pub fn closest_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::new(
            point.x.clamp(self.min.x, self.max.x),
            point.y.clamp(self.min.y, self.max.y),
            point.z.clamp(self.min.z, self.max.z),
        )
    }

    /// Grows this AABB to the union with another.
    pub fn expand_to_include(&mut self, other: &Self) {
        self.min.x = self.min.x.min(other.min.x);
        self.min.y = self.min.y.min(other.min.y);
        self.min.z = self.min.z.min(other.min.z);
        self.max.x = self.max.x.max(other.max.x);
        self.max.y = self.max.y.max(other.max.y);
        self.max.z = self.max.z.max(other.max.z);
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(Point3::origin(), Point3::origin())
    }
}

/// Host-implemented sink for visualizing bounds.
///
/// The grid never draws on its own; hosts pass an implementation to
/// [`Bounds::debug_draw`] from whatever debug-rendering layer they have.
pub trait DebugDraw {
    /// Draws an axis-aligned box.
    fn draw_box(&mut self, aabb: &Aabb);
    /// Draws a sphere.
    fn draw_sphere(&mut self, center: Point3<f64>, radius: f64);
}

/// The volume occupied by one grid element: a sphere or an axis-aligned box.
///
/// The shape set is closed and the overlap tests run in the query engines'
/// inner loops, so dispatch is a plain `match` rather than a trait object.
///
/// # Example
///
/// ```
/// use nalgebra::{Point3, Vector3};
/// use sparse_grid::Bounds;
///
/// let sphere = Bounds::Sphere { origin: Point3::new(0.0, 0.0, 0.0), radius: 2.0 };
/// assert!(sphere.overlaps_sphere(&Point3::new(3.0, 0.0, 0.0), 1.5));
///
/// let boxy = Bounds::Box {
///     origin: Point3::new(0.0, 0.0, 0.0),
///     half_extents: Vector3::new(1.0, 2.0, 2.0),
/// };
/// assert_eq!(boxy.radius(), 3.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bounds {
    /// A sphere centered at `origin`.
    Sphere {
        /// World-space center.
        origin: Point3<f64>,
        /// Radius, non-negative.
        radius: f64,
    },
    /// An axis-aligned box centered at `origin`.
    Box {
        /// World-space center.
        origin: Point3<f64>,
        /// Half-extent per axis, all non-negative.
        half_extents: Vector3<f64>,
    },
}

impl Bounds {
    /// World-space center of the shape.
    #[must_use]
    pub const fn origin(&self) -> Point3<f64> {
        match *self {
            Self::Sphere { origin, .. } | Self::Box { origin, .. } => origin,
        }
    }

    /// Moves the shape to a new center.
    pub fn set_origin(&mut self, new_origin: Point3<f64>) {
        match self {
            Self::Sphere { origin, .. } | Self::Box { origin, .. } => *origin = new_origin,
        }
    }

    /// The world-space AABB of a box bound.
    ///
    /// # Panics
    ///
    /// Panics when called on a sphere; asking a sphere for its box is a
    /// programmer error, not a recoverable condition.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        match *self {
            Self::Box {
                origin,
                half_extents,
            } => Aabb::from_center(origin, half_extents),
            Self::Sphere { .. } => panic!("aabb() called on a sphere bound"),
        }
    }

    /// Bounding radius: the sphere radius, or the half-extent diagonal for a
    /// box.
    #[must_use]
    pub fn radius(&self) -> f64 {
        match *self {
            Self::Sphere { radius, .. } => radius,
            Self::Box { half_extents, .. } => half_extents.norm(),
        }
    }

    /// Returns whether this shape overlaps a sphere.
    #[must_use]
    pub fn overlaps_sphere(&self, center: &Point3<f64>, radius: f64) -> bool {
        match *self {
            Self::Sphere {
                origin,
                radius: own_radius,
            } => {
                let reach = own_radius + radius;
                distance_squared(center, &origin) <= reach * reach
            }
            Self::Box {
                origin,
                half_extents,
            } => math::box_intersects_sphere(
                &Aabb::from_center(origin, half_extents),
                center,
                radius,
            ),
        }
    }

    /// Returns whether this shape overlaps an axis-aligned box given by its
    /// center and half-extents.
    #[must_use]
    pub fn overlaps_box(&self, center: &Point3<f64>, half_extents: &Vector3<f64>) -> bool {
        let other = Aabb::from_center(*center, *half_extents);
        match *self {
            Self::Sphere { origin, radius } => {
                math::box_intersects_sphere(&other, &origin, radius)
            }
            Self::Box {
                origin,
                half_extents: own_extents,
            } => math::box_intersects_box(&Aabb::from_center(origin, own_extents), &other),
        }
    }

    /// Entry point of the segment `start..end` into this shape, if any.
    ///
    /// `dir` must be the unit direction of the segment and `inv_dir` its
    /// componentwise reciprocal.
    #[must_use]
    pub fn line_hit_point(
        &self,
        start: &Point3<f64>,
        end: &Point3<f64>,
        dir: &Vector3<f64>,
        inv_dir: &Vector3<f64>,
    ) -> Option<Point3<f64>> {
        match *self {
            Self::Sphere { origin, radius } => {
                math::line_sphere_hit_point(start, end, dir, &origin, radius)
            }
            Self::Box {
                origin,
                half_extents,
            } => math::line_box_hit_point(
                &Aabb::from_center(origin, half_extents),
                start,
                end,
                dir,
                inv_dir,
            ),
        }
    }

    /// Outward surface normal at a hit point produced by
    /// [`line_hit_point`](Self::line_hit_point).
    ///
    /// When the segment started inside the shape (the hit point is the
    /// segment start), the normal opposes the travel direction `dir`.
    #[must_use]
    pub fn impact_normal(&self, point: &Point3<f64>, dir: &Vector3<f64>) -> Vector3<f64> {
        match *self {
            Self::Sphere { origin, radius } => {
                let offset = point - origin;
                let dist = offset.norm();
                if dist < radius * (1.0 - 1e-9) || dist <= f64::EPSILON {
                    -dir
                } else {
                    offset / dist
                }
            }
            Self::Box {
                origin,
                half_extents,
            } => {
                let offset = point - origin;
                let ratios = Vector3::new(
                    offset.x.abs() / half_extents.x.max(f64::EPSILON),
                    offset.y.abs() / half_extents.y.max(f64::EPSILON),
                    offset.z.abs() / half_extents.z.max(f64::EPSILON),
                );
                if ratios.x < 1.0 - 1e-9 && ratios.y < 1.0 - 1e-9 && ratios.z < 1.0 - 1e-9 {
                    return -dir;
                }
                let axis = ratios.imax();
                let mut normal = Vector3::zeros();
                normal[axis] = offset[axis].signum();
                normal
            }
        }
    }

    /// Draws this shape through a host-supplied [`DebugDraw`] sink.
    pub fn debug_draw(&self, drawer: &mut dyn DebugDraw) {
        match *self {
            Self::Sphere { origin, radius } => drawer.draw_sphere(origin, radius),
            Self::Box {
                origin,
                half_extents,
            } => drawer.draw_box(&Aabb::from_center(origin, half_extents)),
        }
    }
}
