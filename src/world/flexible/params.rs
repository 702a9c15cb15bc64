//! Per-object flexible configuration as delivered by the volume parameter store.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Highest power-of-two section exponent (2^3 = 8 dynamic sections)
pub const MAX_SECTIONS: u32 = 3;
pub const MIN_SECTIONS: u32 = 0;
pub const DEFAULT_NUM_SECTIONS: u32 = 2;

pub const MIN_TENSION: f32 = 0.0;
pub const DEFAULT_TENSION: f32 = 1.0;
pub const MAX_TENSION: f32 = 10.0;

pub const MIN_AIR_FRICTION: f32 = 0.0;
pub const DEFAULT_AIR_FRICTION: f32 = 2.0;
pub const MAX_AIR_FRICTION: f32 = 10.0;

pub const MIN_GRAVITY: f32 = -10.0;
pub const DEFAULT_GRAVITY: f32 = 0.3;
pub const MAX_GRAVITY: f32 = 10.0;

pub const MIN_WIND_SENSITIVITY: f32 = 0.0;
pub const DEFAULT_WIND_SENSITIVITY: f32 = 0.0;
pub const MAX_WIND_SENSITIVITY: f32 = 10.0;

pub const MAX_INTERNAL_TENSION_FORCE: f32 = 0.99;

/// Softness, gravity, drag, wind and tension of a flexible prim.
///
/// Fields are private so every write goes through a clamping setter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlexibleParams {
    simulate_lod: u32,
    gravity: f32,
    air_friction: f32,
    wind_sensitivity: f32,
    tension: f32,
    user_force: Vec3,
}

impl Default for FlexibleParams {
    fn default() -> Self {
        Self {
            simulate_lod: DEFAULT_NUM_SECTIONS,
            gravity: DEFAULT_GRAVITY,
            air_friction: DEFAULT_AIR_FRICTION,
            wind_sensitivity: DEFAULT_WIND_SENSITIVITY,
            tension: DEFAULT_TENSION,
            user_force: Vec3::ZERO,
        }
    }
}

impl FlexibleParams {
    pub fn simulate_lod(&self) -> u32 {
        self.simulate_lod
    }

    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    pub fn air_friction(&self) -> f32 {
        self.air_friction
    }

    pub fn wind_sensitivity(&self) -> f32 {
        self.wind_sensitivity
    }

    pub fn tension(&self) -> f32 {
        self.tension
    }

    pub fn user_force(&self) -> Vec3 {
        self.user_force
    }

    pub fn set_simulate_lod(&mut self, lod: u32) {
        self.simulate_lod = lod.clamp(MIN_SECTIONS, MAX_SECTIONS);
    }

    pub fn set_gravity(&mut self, gravity: f32) {
        self.gravity = clamp_finite(gravity, MIN_GRAVITY, MAX_GRAVITY, DEFAULT_GRAVITY);
    }

    pub fn set_air_friction(&mut self, friction: f32) {
        self.air_friction = clamp_finite(friction, MIN_AIR_FRICTION, MAX_AIR_FRICTION, DEFAULT_AIR_FRICTION);
    }

    pub fn set_wind_sensitivity(&mut self, wind: f32) {
        self.wind_sensitivity =
            clamp_finite(wind, MIN_WIND_SENSITIVITY, MAX_WIND_SENSITIVITY, DEFAULT_WIND_SENSITIVITY);
    }

    pub fn set_tension(&mut self, tension: f32) {
        self.tension = clamp_finite(tension, MIN_TENSION, MAX_TENSION, DEFAULT_TENSION);
    }

    pub fn set_user_force(&mut self, force: Vec3) {
        self.user_force = if force.is_finite() { force } else { Vec3::ZERO };
    }

    /// Builder-style helpers for tests and the headless driver
    pub fn with_simulate_lod(mut self, lod: u32) -> Self {
        self.set_simulate_lod(lod);
        self
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.set_gravity(gravity);
        self
    }

    pub fn with_air_friction(mut self, friction: f32) -> Self {
        self.set_air_friction(friction);
        self
    }

    pub fn with_wind_sensitivity(mut self, wind: f32) -> Self {
        self.set_wind_sensitivity(wind);
        self
    }

    pub fn with_tension(mut self, tension: f32) -> Self {
        self.set_tension(tension);
        self
    }

    pub fn with_user_force(mut self, force: Vec3) -> Self {
        self.set_user_force(force);
        self
    }
}

fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Path shape parameters of the owning volume that shape the sections
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathParams {
    /// Cross-section scale at the anchor end
    pub begin_scale: Vec2,
    /// Cross-section scale at the free end
    pub end_scale: Vec2,
    /// Twist at the anchor end, in half turns
    pub twist_begin: f32,
    /// Twist at the free end, in half turns
    pub twist_end: f32,
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            begin_scale: Vec2::ONE,
            end_scale: Vec2::ONE,
            twist_begin: 0.0,
            twist_end: 0.0,
        }
    }
}
