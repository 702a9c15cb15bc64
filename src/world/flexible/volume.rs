use glam::{Quat, Vec2, Vec3};
use tracing::{debug, warn};
use super::integrator::{self, anchor_position, FrameParams};
use super::params::{FlexibleParams, PathParams, MAX_SECTIONS};
use super::remap::remap_sections;
use super::section::{section_count, Section};
use super::IntegrationError;
use crate::utils::math::{lerp, lerp_vec2, twist};
use crate::world::object::Transform;
use crate::world::wind::WindField;
use std::f32::consts::PI;

/// Screen-angle multiplier turning apparent size into render sections
const RENDER_RES_ANGLE_SCALE: f32 = 12.0;

/// Simulation state of one flexible prim
#[derive(Debug, Clone)]
pub struct FlexibleVolume {
    params: FlexibleParams,
    path: PathParams,
    sections: Vec<Section>,
    /// Resolution `sections` is sampled at; `None` until first initialised
    initialized_res: Option<u32>,
    simulate_res: u32,
    render_res: u32,
    initialized: bool,
    /// Scheduler frame of the last integration, `None` until the first one
    /// after creation or a resolution change
    last_update_frame: Option<u64>,
    /// Scheduler frame the volume was last put in a bin
    last_classified_frame: Option<u64>,
    last_step_time: Option<f64>,
    last_segment_rotation: Quat,
    pub(crate) last_frame_rotation: Quat,
    /// Whether the published path matches the current sections
    pub(crate) geometry_current: bool,
}

impl FlexibleVolume {
    pub fn new(params: FlexibleParams, path: PathParams, frame: &Transform) -> Self {
        let mut volume = Self {
            params,
            path,
            sections: vec![Section::default()],
            initialized_res: None,
            simulate_res: 0,
            render_res: 1,
            initialized: false,
            last_update_frame: None,
            last_classified_frame: None,
            last_step_time: None,
            last_segment_rotation: frame.rotation,
            last_frame_rotation: frame.rotation,
            geometry_current: false,
        };
        volume.set_attributes_of_all_sections(frame);
        volume
    }

    pub fn params(&self) -> &FlexibleParams {
        &self.params
    }

    pub fn path_params(&self) -> &PathParams {
        &self.path
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn simulate_res(&self) -> u32 {
        self.simulate_res
    }

    pub fn render_res(&self) -> u32 {
        self.render_res
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn last_update_frame(&self) -> Option<u64> {
        self.last_update_frame
    }

    /// True until the first integration after creation or a LOD change
    pub fn needs_first_update(&self) -> bool {
        self.last_update_frame.is_none()
    }

    pub fn end_rotation(&self) -> Quat {
        self.last_segment_rotation
    }

    pub fn anchor_position(&self, frame: &Transform) -> Vec3 {
        anchor_position(frame)
    }

    /// Tip of the simulated spine
    pub fn end_position(&self) -> Vec3 {
        self.sections.last().map(|s| s.position).unwrap_or_default()
    }

    /// Position of a simulated section, with the index clamped into range
    pub fn node_position(&self, index: usize) -> Vec3 {
        let last = self.sections.len().saturating_sub(1);
        self.sections[index.min(last)].position
    }

    /// Re-seed the anchor from `frame`, remap to the simulate resolution and
    /// lay scale and twist out along the spine.
    pub fn set_attributes_of_all_sections(&mut self, frame: &Transform) {
        let begin_rot = PI * self.path.twist_begin;
        let end_rot = PI * self.path.twist_end;
        let scale = frame.scale;

        let anchor_direction = frame.rotation * Vec3::Z;
        let anchor = &mut self.sections[0];
        anchor.position = anchor_position(frame);
        anchor.direction = anchor_direction;
        anchor.d_position = anchor_direction;
        anchor.rotation = frame.rotation;
        anchor.scale = Vec2::new(scale.x, scale.y) * self.path.begin_scale;
        anchor.velocity = Vec3::ZERO;
        anchor.axis_rotation = twist(begin_rot);

        self.sections = remap_sections(&self.sections, self.initialized_res, self.simulate_res, scale.z);
        self.initialized_res = Some(self.simulate_res);

        let num_sections = 1usize << self.simulate_res;
        let t_inc = 1.0 / num_sections as f32;
        for (i, section) in self.sections.iter_mut().enumerate().skip(1) {
            let t = t_inc * i as f32;
            section.axis_rotation = twist(lerp(begin_rot, end_rot, t));
            section.scale = Vec2::new(scale.x, scale.y)
                * lerp_vec2(self.path.begin_scale, self.path.end_scale, t);
        }
        self.geometry_current = false;
    }

    /// Force a new simulation resolution, e.g. after a LOD change.
    pub fn set_simulate_res(&mut self, res: u32, frame: &Transform) {
        let res = res.min(MAX_SECTIONS);
        if self.initialized && res == self.simulate_res {
            return;
        }
        debug!(from = self.simulate_res, to = res, "flexible simulate resolution changed");
        self.simulate_res = res;
        self.render_res = self.render_res.max(res);
        self.set_attributes_of_all_sections(frame);
        self.initialized = true;
        self.last_update_frame = None;
    }

    /// Pick render and simulate resolutions from the apparent size at
    /// `distance`. Returns true when the simulate resolution changed.
    pub fn update_render_res(&mut self, distance: f32, frame: &Transform) -> bool {
        let mut new_res = self.params.simulate_lod();

        let render_res = if distance > f32::EPSILON && distance.is_finite() {
            let app_angle = frame.scale.z / distance;
            let res = (RENDER_RES_ANGLE_SCALE * app_angle) as i64;
            res.clamp(new_res as i64 - 1, MAX_SECTIONS as i64).max(0) as u32
        } else {
            MAX_SECTIONS
        };
        self.render_res = render_res;

        // Throttle back simulation of sections we are not rendering
        if render_res < new_res {
            new_res = render_res;
        }

        if !self.initialized || self.simulate_res != new_res {
            self.simulate_res = new_res;
            self.set_attributes_of_all_sections(frame);
            self.initialized = true;
            self.last_update_frame = None;
            return true;
        }
        false
    }

    pub fn on_parameter_changed(&mut self, params: FlexibleParams, frame: &Transform) {
        self.params = params;
        self.set_attributes_of_all_sections(frame);
    }

    pub fn on_path_changed(&mut self, path: PathParams, frame: &Transform) {
        self.path = path;
        self.set_attributes_of_all_sections(frame);
    }

    pub fn on_set_scale(&mut self, frame: &Transform) {
        self.set_attributes_of_all_sections(frame);
    }

    /// Region origin shift
    pub fn on_shift(&mut self, offset: Vec3) {
        for section in &mut self.sections {
            section.position += offset;
        }
    }

    pub(crate) fn mark_classified(&mut self, frame: u64) -> bool {
        if self.last_classified_frame == Some(frame) {
            return false;
        }
        self.last_classified_frame = Some(frame);
        true
    }

    /// Integrate one step at scheduler frame `frame_number`, `now` seconds
    /// into the session.
    ///
    /// A step that goes non-finite resets the spine to its rest pose; the
    /// volume still counts as updated so the scheduler does not retry it.
    pub fn do_flexible_update(
        &mut self,
        frame: &Transform,
        now: f64,
        max_step_seconds: f32,
        wind: &dyn WindField,
        frame_number: u64,
    ) -> Result<(), IntegrationError> {
        if !self.initialized {
            self.set_simulate_res(self.simulate_res, frame);
        }

        let dt = match self.last_step_time {
            Some(last) if now > last => (now - last) as f32,
            _ => 0.0,
        };
        self.last_step_time = Some(now);
        self.last_update_frame = Some(frame_number);
        self.geometry_current = false;

        let params = FrameParams::new(&self.params, max_step_seconds);
        match integrator::step(&mut self.sections, self.simulate_res, dt, &params, frame, wind) {
            Ok(end_rotation) => {
                self.last_segment_rotation = end_rotation;
                for section in &mut self.sections {
                    section.updated_at = Some(now);
                }
                Ok(())
            }
            Err(e) => {
                warn!("Flexible step failed ({}), resetting to rest pose", e);
                self.initialized_res = None;
                self.sections.truncate(1);
                self.sections[0] = Section::default();
                self.set_attributes_of_all_sections(frame);
                self.last_segment_rotation = frame.rotation;
                Err(e)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn section_count_matches(&self) -> bool {
        self.sections.len() == section_count(self.simulate_res)
    }
}
