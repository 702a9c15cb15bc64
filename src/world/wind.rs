//! Wind velocity fields sampled by the flexible integrator.

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Width of a region in meters
pub const REGION_WIDTH_METERS: f32 = 256.0;

/// Source of wind velocity at a world position
pub trait WindField {
    fn velocity_at(&self, position: Vec3) -> Vec3;

    /// Evolve the field by `dt` seconds
    fn advance(&mut self, _dt: f32) {}
}

/// No wind anywhere
#[derive(Debug, Clone, Copy, Default)]
pub struct CalmWind;

impl WindField for CalmWind {
    fn velocity_at(&self, _position: Vec3) -> Vec3 {
        Vec3::ZERO
    }
}

/// The same velocity everywhere
#[derive(Debug, Clone, Copy)]
pub struct UniformWind {
    velocity: Vec3,
}

impl UniformWind {
    pub fn new(velocity: Vec3) -> Self {
        Self { velocity }
    }
}

impl WindField for UniformWind {
    fn velocity_at(&self, _position: Vec3) -> Vec3 {
        self.velocity
    }
}

/// Horizontal wind on a square grid covering one region, drifting toward
/// random gust targets over time.
///
/// Positions outside the region wrap around, and samples are bilinear
/// between grid points.
#[derive(Debug, Clone)]
pub struct GustingWind {
    cells: usize,
    base: Vec2,
    gust_strength: f32,
    velocities: Vec<Vec2>,
    targets: Vec<Vec2>,
    rng: StdRng,
}

impl GustingWind {
    pub fn new(seed: u64, cells: usize, base: Vec2, gust_strength: f32) -> Self {
        let cells = cells.max(2);
        let mut rng = StdRng::seed_from_u64(seed);
        let gust_strength = gust_strength.max(0.0);
        let velocities: Vec<Vec2> = (0..cells * cells)
            .map(|_| base + random_gust(&mut rng, gust_strength))
            .collect();
        let targets = velocities.clone();
        Self {
            cells,
            base,
            gust_strength,
            velocities,
            targets,
            rng,
        }
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    /// Move every grid point toward its gust target, picking a new target
    /// once one is reached.
    fn drift(&mut self, dt: f32) {
        let blend = (dt.max(0.0) * 0.5).min(1.0);
        for (velocity, target) in self.velocities.iter_mut().zip(self.targets.iter_mut()) {
            *velocity = velocity.lerp(*target, blend);
            if velocity.distance_squared(*target) < 0.01 {
                *target = self.base + random_gust(&mut self.rng, self.gust_strength);
            }
        }
    }

    fn cell(&self, x: usize, y: usize) -> Vec2 {
        self.velocities[(y % self.cells) * self.cells + (x % self.cells)]
    }
}

fn random_gust(rng: &mut StdRng, strength: f32) -> Vec2 {
    if strength <= 0.0 {
        return Vec2::ZERO;
    }
    Vec2::new(
        rng.random_range(-strength..=strength),
        rng.random_range(-strength..=strength),
    )
}

impl WindField for GustingWind {
    fn advance(&mut self, dt: f32) {
        self.drift(dt);
    }

    fn velocity_at(&self, position: Vec3) -> Vec3 {
        let cell_size = REGION_WIDTH_METERS / self.cells as f32;
        let gx = position.x.rem_euclid(REGION_WIDTH_METERS) / cell_size;
        let gy = position.y.rem_euclid(REGION_WIDTH_METERS) / cell_size;
        if !gx.is_finite() || !gy.is_finite() {
            return Vec3::ZERO;
        }

        let x0 = gx.floor() as usize;
        let y0 = gy.floor() as usize;
        let fx = gx - x0 as f32;
        let fy = gy - y0 as f32;

        let bottom = self.cell(x0, y0).lerp(self.cell(x0 + 1, y0), fx);
        let top = self.cell(x0, y0 + 1).lerp(self.cell(x0 + 1, y0 + 1), fx);
        bottom.lerp(top, fy).extend(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calm_and_uniform() {
        assert_eq!(CalmWind.velocity_at(Vec3::ONE), Vec3::ZERO);
        let wind = UniformWind::new(Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(wind.velocity_at(Vec3::new(-5.0, 900.0, 3.0)), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_gusting_is_seeded() {
        let a = GustingWind::new(7, 8, Vec2::new(2.0, 0.0), 1.5);
        let b = GustingWind::new(7, 8, Vec2::new(2.0, 0.0), 1.5);
        let p = Vec3::new(100.3, 37.9, 20.0);
        assert_eq!(a.velocity_at(p), b.velocity_at(p));
    }

    #[test]
    fn test_gusting_without_strength_is_base() {
        let mut wind = GustingWind::new(1, 4, Vec2::new(3.0, -1.0), 0.0);
        wind.advance(1.0);
        let v = wind.velocity_at(Vec3::new(17.0, 200.0, 0.0));
        assert!((v - Vec3::new(3.0, -1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_gusting_wraps_and_stays_bounded() {
        let mut wind = GustingWind::new(42, 16, Vec2::ZERO, 2.0);
        for _ in 0..50 {
            wind.advance(0.1);
        }
        let inside = wind.velocity_at(Vec3::new(10.0, 10.0, 0.0));
        let wrapped = wind.velocity_at(Vec3::new(10.0 + REGION_WIDTH_METERS, 10.0 - REGION_WIDTH_METERS, 0.0));
        assert!((inside - wrapped).length() < 1e-4);
        assert!(inside.x.abs() <= 2.0 + 1e-4 && inside.y.abs() <= 2.0 + 1e-4);
        assert_eq!(inside.z, 0.0);
    }
}
