//! A minimal broadphase tick: mutate serially, then query.
//!
//! Scatters a few hundred projectiles in a 100-unit grid, moves them one
//! step, and runs the two query engines — a cached radial query around the
//! player and a closest-hit trace along the aim direction.
//!
//! Run with: `cargo run -p sparse-grid --example broadphase_tick`

use nalgebra::{Point3, Vector3};
use sparse_grid::{Bounds, GridSemantics, LineTrace, SpatialGrid, SphereQueryBuilder};

const PROJECTILES: usize = 400;

struct Arena;

impl GridSemantics for Arena {
    const CELL_SIZE: f64 = 100.0;
    const MAX_ELEMENT_RADIUS: f64 = 49.0;
    type ElementData = Projectile;
}

struct Projectile {
    velocity: Vector3<f64>,
}

fn main() {
    let mut grid: SpatialGrid<Arena> = SpatialGrid::new();

    // Deterministic scatter on a spiral, with a sideways drift.
    let mut ids = Vec::with_capacity(PROJECTILES);
    for i in 0..PROJECTILES {
        let angle = (i as f64) * 0.37;
        let reach = 30.0 + (i as f64) * 2.0;
        let origin = Point3::new(
            reach * angle.cos(),
            reach * angle.sin(),
            (i as f64 % 7.0) * 40.0 - 120.0,
        );
        let id = grid.add_element(
            Bounds::Sphere {
                origin,
                radius: 4.0,
            },
            Projectile {
                velocity: Vector3::new(-angle.sin(), angle.cos(), 0.0) * 25.0,
            },
        );
        ids.push(id);
    }

    // Serial mutation phase: advance every projectile one step.
    for &id in &ids {
        let Some(element) = grid.get_element(id) else {
            continue;
        };
        let next = element.bounds().origin() + element.data().velocity;
        grid.update_element_location(id, next);
    }
    grid.clear_empty_cells();

    println!(
        "grid: {} projectiles across {} cells",
        grid.num_elements(),
        grid.num_cells()
    );

    // Read phase. The cached query classifies its cell shells once and can
    // be reused for every origin of interest.
    let player = Point3::new(0.0, 0.0, 0.0);
    let nearby = SphereQueryBuilder::<Arena>::new().radius(250.0).build_cached();

    let mut threats = 0;
    nearby.set_origin(player).each(&grid, |_, element| {
        let toward = player - element.bounds().origin();
        if toward.dot(&element.data().velocity) > 0.0 {
            threats += 1;
        }
    });
    println!("radial query: {threats} projectiles inbound within 250 units");

    let aim = LineTrace::new(player, Point3::new(900.0, 120.0, 0.0));
    let hit = aim.single(&grid);
    if hit.blocking_hit {
        println!(
            "trace: first projectile along the aim line at {:.1?}, normal {:.1?}",
            hit.impact_point, hit.impact_normal
        );
    } else {
        println!("trace: aim line is clear");
    }
}
