//! One simulation step of a flexible spine.
//!
//! Sections are advanced strictly in index order: each one reads the already
//! updated position and direction of its parent, so a single object can't be
//! split across threads. Objects are independent of each other.

use glam::{Quat, Vec3};
use super::params::{FlexibleParams, MAX_INTERNAL_TENSION_FORCE};
use super::section::{section_count, Section};
use super::IntegrationError;
use crate::utils::math::{shortest_arc, signed_axis_angle};
use crate::world::object::Transform;
use crate::world::wind::WindField;

/// Wind is ignored below this sensitivity
const MIN_WIND_SENSITIVITY: f32 = 0.001;

/// Per-step coefficients taken from the volume's flexible parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub tension: f32,
    pub air_friction: f32,
    pub wind_sensitivity: f32,
    pub gravity: f32,
    pub user_force: Vec3,
    /// Longest step the integrator will take
    pub max_step_seconds: f32,
}

impl FrameParams {
    pub fn new(params: &FlexibleParams, max_step_seconds: f32) -> Self {
        Self {
            tension: params.tension(),
            air_friction: params.air_friction(),
            wind_sensitivity: params.wind_sensitivity(),
            gravity: params.gravity(),
            user_force: params.user_force(),
            max_step_seconds: max_step_seconds.max(0.0),
        }
    }
}

/// Spine length per section below which physics is skipped
const MIN_SECTION_LENGTH: f32 = 1.0e-6;

/// Anchor position: the render centroid moved back half the object length
/// along its local z axis.
pub fn anchor_position(frame: &Transform) -> Vec3 {
    let anchor_direction = frame.rotation * Vec3::Z;
    frame.position - anchor_direction * (frame.scale.z * 0.5)
}

/// Advance `sections`, sampled at `simulate_res`, by `dt` seconds.
///
/// Returns the accumulated rotation of the last segment. The anchor is always
/// rebuilt from `frame` first; the remaining sections are only trusted when
/// every value is finite afterwards, otherwise an error names the first bad
/// section and the caller is expected to reset the spine.
pub fn step(
    sections: &mut [Section],
    simulate_res: u32,
    dt: f32,
    params: &FrameParams,
    frame: &Transform,
    wind: &dyn WindField,
) -> Result<Quat, IntegrationError> {
    debug_assert_eq!(sections.len(), section_count(simulate_res));
    let num_sections = (1usize << simulate_res).min(sections.len().saturating_sub(1));
    if num_sections == 0 {
        return Ok(frame.rotation);
    }

    let dt = if dt.is_finite() { dt.clamp(0.0, params.max_step_seconds) } else { 0.0 };

    let base_rotation = frame.rotation;
    let anchor_direction = base_rotation * Vec3::Z;
    let section_length = frame.scale.z / num_sections as f32;

    sections[0].position = anchor_position(frame);
    sections[0].direction = anchor_direction;
    sections[0].rotation = base_rotation;

    if !(section_length > MIN_SECTION_LENGTH) {
        // Zero-length object: collapse onto the anchor rest pose
        let anchor = sections[0];
        for section in sections.iter_mut().take(num_sections + 1).skip(1) {
            section.position = anchor.position;
            section.direction = anchor.direction;
            section.d_position = anchor.direction;
            section.rotation = base_rotation;
            section.velocity = Vec3::ZERO;
        }
        sections[0].d_position = anchor_direction;
        return Ok(base_rotation);
    }
    let inv_section_length = 1.0 / section_length;

    // Coefficients which are constant across sections
    let t_factor = (params.tension * 0.1 * (1.0 - 0.85f32.powf(dt * 30.0)))
        .min(MAX_INTERNAL_TENSION_FORCE);

    let friction_coeff = 10f32.powf((params.air_friction * 2.0 + 1.0) * dt).max(1.0);
    let momentum = 1.0 / friction_coeff;

    let wind_factor = params.wind_sensitivity * 0.1 * section_length * dt;
    let max_angle = (section_length * 2.0).atan();
    let force_factor = section_length * dt;

    let mut parent_segment_rotation = base_rotation;

    for i in 1..=num_sections {
        let last_position = sections[i].position;
        let mut position = last_position;

        // gravity
        position.z -= params.gravity * force_factor;

        // wind
        if params.wind_sensitivity > MIN_WIND_SENSITIVITY {
            position += wind.velocity_at(position) * wind_factor;
        }

        // user-defined force
        position += params.user_force * force_factor;

        // tension pulls toward a rigid extension of the grandparent direction
        let parent_position = sections[i - 1].position;
        let parent_direction = sections[i - 1].direction;
        let rest_direction = if i == 1 {
            sections[0].direction
        } else {
            sections[i - 2].direction
        };
        let current = position - parent_position;
        position += (rest_direction * section_length - current) * t_factor;

        // inertia
        position += sections[i].velocity * momentum;

        if !position.is_finite() {
            return Err(IntegrationError::NonFinite { section: i });
        }

        // clamp length and rotation
        let raw_direction = (position - parent_position)
            .try_normalize()
            .unwrap_or(parent_direction);
        let (axis, angle) = signed_axis_angle(shortest_arc(parent_direction, raw_direction));
        let clamped_angle = angle.clamp(-max_angle, max_angle);
        let delta_rotation = Quat::from_axis_angle(axis, clamped_angle);

        let segment_rotation = (delta_rotation * parent_segment_rotation).normalize();
        parent_segment_rotation = segment_rotation;

        let direction = (delta_rotation * parent_direction)
            .try_normalize()
            .unwrap_or(parent_direction);
        let position = parent_position + direction * section_length;

        sections[i].direction = direction;
        sections[i].position = position;
        sections[i].rotation = segment_rotation;

        if i > 1 {
            // Spread half the bend onto the parent joint
            let half_delta = Quat::from_axis_angle(axis, clamped_angle * 0.5);
            sections[i - 1].rotation = (half_delta * sections[i - 1].rotation).normalize();
        }

        let mut velocity = position - last_position;
        if velocity.length_squared() > 1.0 {
            velocity = velocity.normalize();
        }
        sections[i].velocity = velocity;
    }

    update_derivatives(&mut sections[..=num_sections], section_length);

    if let Some(bad) = sections[..=num_sections].iter().position(|s| !s.is_finite()) {
        return Err(IntegrationError::NonFinite { section: bad });
    }
    Ok(parent_segment_rotation)
}

/// Recompute `d_position` with a three-point quadratic fit through each
/// section and its neighbours; the ends use one-sided differences.
pub fn update_derivatives(sections: &mut [Section], section_length: f32) {
    let n = sections.len().saturating_sub(1);
    if n == 0 || !(section_length > MIN_SECTION_LENGTH) {
        return;
    }
    let inv = 1.0 / section_length;

    sections[0].d_position = (sections[1].position - sections[0].position) * inv;
    for i in 1..n {
        // f = a x^2 + b x + c through (-L, f1), (0, f2), (L, f3); f'(0) = b
        let prev = sections[i - 1].position;
        let here = sections[i].position;
        let next = sections[i + 1].position;
        let a = (prev - here + next - here) * 0.5 * inv * inv;
        let b = (next - here - a * (section_length * section_length)) * inv;
        sections[i].d_position = b;
    }
    sections[n].d_position = (sections[n].position - sections[n - 1].position) * inv;
}
