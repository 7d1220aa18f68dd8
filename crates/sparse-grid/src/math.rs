//! Segment, box, and sphere intersection helpers.
//!
//! Pure, allocation-free functions shared by the grid and both query engines.
//! The slab tests take a precomputed componentwise reciprocal of the ray
//! direction; a zero direction component yields an infinite reciprocal, which
//! every function here tolerates by treating the ray as unconstrained on that
//! axis once its start lies inside the slab.
//!
//! The two hit-point helpers assume `dir` has unit length.

use nalgebra::{Point3, Vector3, distance_squared};

use crate::bounds::Aabb;
use crate::coord::CellCoord;

/// Rounds each component to the nearest integer, halves away from zero.
///
/// # Example
///
/// ```
/// use nalgebra::Vector3;
/// use sparse_grid::{CellCoord, math};
///
/// assert_eq!(
///     math::round_vec_to_cell(Vector3::new(0.5, -0.5, 1.49)),
///     CellCoord::new(1, -1, 1),
/// );
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn round_vec_to_cell(v: Vector3<f64>) -> CellCoord {
    CellCoord::new(v.x.round() as i32, v.y.round() as i32, v.z.round() as i32)
}

/// Returns whether two AABBs overlap, boundaries included.
#[must_use]
pub fn box_intersects_box(a: &Aabb, b: &Aabb) -> bool {
    a.min.x <= b.max.x
        && b.min.x <= a.max.x
        && a.min.y <= b.max.y
        && b.min.y <= a.max.y
        && a.min.z <= b.max.z
        && b.min.z <= a.max.z
}

/// Returns whether an AABB and a sphere overlap.
#[must_use]
pub fn box_intersects_sphere(aabb: &Aabb, center: &Point3<f64>, radius: f64) -> bool {
    box_intersects_sphere_radius_sq(aabb, center, radius * radius)
}

/// [`box_intersects_sphere`] with the radius already squared, for hot loops
/// that test one sphere against many cells.
#[must_use]
pub fn box_intersects_sphere_radius_sq(aabb: &Aabb, center: &Point3<f64>, radius_sq: f64) -> bool {
    distance_squared(center, &aabb.closest_point(center)) <= radius_sq
}

/// Slab test: returns whether the infinite ray from `start` along the
/// direction whose reciprocal is `inv_dir` pierces the box.
#[must_use]
pub fn line_intersects_box(aabb: &Aabb, start: &Point3<f64>, inv_dir: &Vector3<f64>) -> bool {
    let mut t_entry = f64::NEG_INFINITY;
    let mut t_exit = f64::INFINITY;

    for axis in 0..3 {
        if inv_dir[axis].is_infinite() {
            // Axis-aligned ray: the slab constrains nothing as long as the
            // start sits inside it, boundaries included.
            if start[axis] < aabb.min[axis] || start[axis] > aabb.max[axis] {
                return false;
            }
            continue;
        }

        let t1 = (aabb.min[axis] - start[axis]) * inv_dir[axis];
        let t2 = (aabb.max[axis] - start[axis]) * inv_dir[axis];

        t_entry = t_entry.max(t1.min(t2));
        t_exit = t_exit.min(t1.max(t2));

        if t_entry > t_exit {
            return false;
        }
    }

    true
}

/// Entry point of the segment `start..end` into the box, if any.
///
/// Yields `start` itself when the segment starts inside the box. Fails when
/// the box lies behind the start or beyond the end of the segment.
#[must_use]
pub fn line_box_hit_point(
    aabb: &Aabb,
    start: &Point3<f64>,
    end: &Point3<f64>,
    dir: &Vector3<f64>,
    inv_dir: &Vector3<f64>,
) -> Option<Point3<f64>> {
    if aabb.contains(start) {
        return Some(*start);
    }

    let mut t_entry = f64::NEG_INFINITY;
    let mut t_exit = f64::INFINITY;

    for axis in 0..3 {
        if inv_dir[axis].is_infinite() {
            if start[axis] < aabb.min[axis] || start[axis] > aabb.max[axis] {
                return None;
            }
            continue;
        }

        let t1 = (aabb.min[axis] - start[axis]) * inv_dir[axis];
        let t2 = (aabb.max[axis] - start[axis]) * inv_dir[axis];

        t_entry = t_entry.max(t1.min(t2));
        t_exit = t_exit.min(t1.max(t2));

        if t_entry > t_exit {
            return None;
        }
    }

    if t_entry < 0.0 || t_entry * t_entry > distance_squared(start, end) {
        return None;
    }

    Some(start + dir * t_entry)
}

/// Returns whether the segment `start..end` pierces the sphere.
#[must_use]
pub fn line_intersects_sphere(
    start: &Point3<f64>,
    end: &Point3<f64>,
    dir: &Vector3<f64>,
    center: &Point3<f64>,
    radius: f64,
) -> bool {
    line_sphere_hit_point(start, end, dir, center, radius).is_some()
}

/// Entry point of the segment `start..end` into the sphere, if any.
///
/// Yields `start` itself when the segment starts inside the sphere; otherwise
/// the near root of the analytic ray/sphere intersection, rejected when it
/// falls behind the start or beyond the segment length.
#[must_use]
pub fn line_sphere_hit_point(
    start: &Point3<f64>,
    end: &Point3<f64>,
    dir: &Vector3<f64>,
    center: &Point3<f64>,
    radius: f64,
) -> Option<Point3<f64>> {
    let start_to_center = start - center;
    let radius_sq = radius * radius;

    if start_to_center.norm_squared() < radius_sq {
        return Some(*start);
    }

    let v = dir.dot(&(center - start));
    let discriminant = radius_sq - (start_to_center.norm_squared() - v * v);

    if discriminant < 0.0 {
        return None;
    }

    let time = v - discriminant.sqrt();

    if time < 0.0 || time * time > distance_squared(start, end) {
        return None;
    }

    Some(start + dir * time)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn unit_x() -> (Vector3<f64>, Vector3<f64>) {
        let dir = Vector3::x();
        let inv_dir = dir.map(|c| 1.0 / c);
        (dir, inv_dir)
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(
            round_vec_to_cell(Vector3::new(2.5, -2.5, 0.0)),
            CellCoord::new(3, -3, 0)
        );
        assert_eq!(
            round_vec_to_cell(Vector3::new(0.49, -0.49, 1.5)),
            CellCoord::new(0, 0, 2)
        );
    }

    #[test]
    fn boxes_touching_on_a_face_overlap() {
        let a = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb::new(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        let c = Aabb::new(Point3::new(1.1, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert!(box_intersects_box(&a, &b));
        assert!(!box_intersects_box(&a, &c));
    }

    #[test]
    fn box_sphere_overlap_uses_closest_point() {
        let aabb = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        assert!(box_intersects_sphere(&aabb, &Point3::new(2.0, 0.0, 0.0), 1.0));
        assert!(!box_intersects_sphere(
            &aabb,
            &Point3::new(2.0, 0.0, 0.0),
            0.9
        ));
        // Sphere center inside the box.
        assert!(box_intersects_sphere(&aabb, &Point3::new(0.5, 0.5, 0.5), 0.1));
    }

    #[test]
    fn axis_aligned_ray_on_box_boundary_hits() {
        let aabb = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let (_, inv_dir) = unit_x();
        // Grazing along the y = 1 face.
        assert!(line_intersects_box(
            &aabb,
            &Point3::new(-5.0, 1.0, 0.0),
            &inv_dir
        ));
        assert!(!line_intersects_box(
            &aabb,
            &Point3::new(-5.0, 1.1, 0.0),
            &inv_dir
        ));
    }

    #[test]
    fn line_box_hit_point_from_outside() {
        let aabb = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let (dir, inv_dir) = unit_x();
        let hit = line_box_hit_point(
            &aabb,
            &Point3::new(-5.0, 0.0, 0.0),
            &Point3::new(5.0, 0.0, 0.0),
            &dir,
            &inv_dir,
        )
        .unwrap();
        assert_relative_eq!(hit.x, -1.0);
    }

    #[test]
    fn line_box_hit_point_from_inside_is_start() {
        let aabb = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let (dir, inv_dir) = unit_x();
        let start = Point3::new(0.25, 0.0, 0.0);
        let hit =
            line_box_hit_point(&aabb, &start, &Point3::new(5.0, 0.0, 0.0), &dir, &inv_dir).unwrap();
        assert_eq!(hit, start);
    }

    #[test]
    fn line_box_hit_point_rejects_box_behind_start() {
        let aabb = Aabb::new(Point3::new(-3.0, -1.0, -1.0), Point3::new(-2.0, 1.0, 1.0));
        let (dir, inv_dir) = unit_x();
        assert!(
            line_box_hit_point(
                &aabb,
                &Point3::new(0.0, 0.0, 0.0),
                &Point3::new(5.0, 0.0, 0.0),
                &dir,
                &inv_dir,
            )
            .is_none()
        );
    }

    #[test]
    fn line_box_hit_point_rejects_box_beyond_segment() {
        let aabb = Aabb::new(Point3::new(10.0, -1.0, -1.0), Point3::new(12.0, 1.0, 1.0));
        let (dir, inv_dir) = unit_x();
        assert!(
            line_box_hit_point(
                &aabb,
                &Point3::new(0.0, 0.0, 0.0),
                &Point3::new(5.0, 0.0, 0.0),
                &dir,
                &inv_dir,
            )
            .is_none()
        );
    }

    #[test]
    fn line_sphere_hit_point_near_root() {
        let (dir, _) = unit_x();
        let hit = line_sphere_hit_point(
            &Point3::new(-10.0, 0.0, 0.0),
            &Point3::new(10.0, 0.0, 0.0),
            &dir,
            &Point3::new(0.0, 0.0, 0.0),
            2.0,
        )
        .unwrap();
        assert_relative_eq!(hit.x, -2.0);
    }

    #[test]
    fn line_sphere_hit_point_from_inside_is_start() {
        let (dir, _) = unit_x();
        let start = Point3::new(0.5, 0.0, 0.0);
        let hit = line_sphere_hit_point(
            &start,
            &Point3::new(10.0, 0.0, 0.0),
            &dir,
            &Point3::new(0.0, 0.0, 0.0),
            2.0,
        )
        .unwrap();
        assert_eq!(hit, start);
    }

    #[test]
    fn line_sphere_rejects_sphere_behind_or_beyond() {
        let (dir, _) = unit_x();
        // Behind the start.
        assert!(
            line_sphere_hit_point(
                &Point3::new(0.0, 0.0, 0.0),
                &Point3::new(10.0, 0.0, 0.0),
                &dir,
                &Point3::new(-5.0, 0.0, 0.0),
                2.0,
            )
            .is_none()
        );
        // Beyond the segment end.
        assert!(
            line_sphere_hit_point(
                &Point3::new(0.0, 0.0, 0.0),
                &Point3::new(10.0, 0.0, 0.0),
                &dir,
                &Point3::new(20.0, 0.0, 0.0),
                2.0,
            )
            .is_none()
        );
    }

    #[test]
    fn line_misses_sphere_off_axis() {
        let (dir, _) = unit_x();
        assert!(!line_intersects_sphere(
            &Point3::new(-10.0, 5.0, 0.0),
            &Point3::new(10.0, 5.0, 0.0),
            &dir,
            &Point3::new(0.0, 0.0, 0.0),
            2.0,
        ));
    }
}
