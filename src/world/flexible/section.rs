use glam::{Quat, Vec2, Vec3};
use crate::utils::math::{is_finite_quat, is_finite_vec3};

/// One spine sample of a flexible object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Section {
    pub position: Vec3,
    /// Unit direction from the parent section to this one
    pub direction: Vec3,
    /// First derivative of position along the spine
    pub d_position: Vec3,
    /// Bend rotation accumulated from the anchor
    pub rotation: Quat,
    /// Twist about the spine, kept apart from the bend
    pub axis_rotation: Quat,
    /// Cross-section scale
    pub scale: Vec2,
    pub velocity: Vec3,
    /// Session time in seconds of the last step that moved this section
    pub updated_at: Option<f64>,
}

impl Default for Section {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::Z,
            d_position: Vec3::Z,
            rotation: Quat::IDENTITY,
            axis_rotation: Quat::IDENTITY,
            scale: Vec2::ONE,
            velocity: Vec3::ZERO,
            updated_at: None,
        }
    }
}

impl Section {
    pub fn is_finite(&self) -> bool {
        is_finite_vec3(self.position)
            && is_finite_vec3(self.direction)
            && is_finite_vec3(self.d_position)
            && is_finite_vec3(self.velocity)
            && is_finite_quat(self.rotation)
            && is_finite_quat(self.axis_rotation)
            && self.scale.is_finite()
    }
}

/// Number of sections stored for a resolution exponent, anchor included
pub fn section_count(resolution: u32) -> usize {
    (1usize << resolution) + 1
}
