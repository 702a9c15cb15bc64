use glam::{Quat, Vec2, Vec3};
use std::f32::consts::PI;

/// Linear interpolation between two scalars
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Linear interpolation between two cross-section scales
pub fn lerp_vec2(a: Vec2, b: Vec2, t: f32) -> Vec2 {
    a + (b - a) * t
}

/// Wrap an angle in radians into [-PI, PI]
pub fn wrap_angle(mut angle: f32) -> f32 {
    if angle > PI {
        angle -= 2.0 * PI;
    }
    if angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Rotation about the local z axis, used for path twist
pub fn twist(angle: f32) -> Quat {
    Quat::from_axis_angle(Vec3::Z, angle)
}

/// Signed angle and axis of a rotation, with the angle wrapped into [-PI, PI]
pub fn signed_axis_angle(rotation: Quat) -> (Vec3, f32) {
    let (axis, angle) = rotation.to_axis_angle();
    (axis, wrap_angle(angle))
}

/// Shortest-arc rotation taking `from` onto `to`, both unit length.
///
/// Nearly antiparallel inputs fall back to a half turn about any perpendicular
/// axis, which is what `Quat::from_rotation_arc` does as well.
pub fn shortest_arc(from: Vec3, to: Vec3) -> Quat {
    Quat::from_rotation_arc(from, to)
}

pub fn is_finite_vec3(v: Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

pub fn is_finite_quat(q: Quat) -> bool {
    q.x.is_finite() && q.y.is_finite() && q.z.is_finite() && q.w.is_finite()
}
