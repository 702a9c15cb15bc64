//! Publishing simulated sections to the renderable path.

use glam::{Quat, Vec2, Vec3};
use tracing::trace;
use super::remap::remap_sections;
use super::volume::FlexibleVolume;
use crate::world::drawable::{Drawable, RebuildFlags};
use crate::world::object::Transform;

/// Fraction of the camera distance a frame must move before an up to date
/// path is rebuilt
const MOVE_THRESHOLD_FACTOR: f32 = 0.001;

/// One render-resolution path point, in prim-local space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec2,
    /// Texture coordinate along the path, 0 at the anchor and 1 at the tip
    pub tex_t: f32,
}

/// Resample the volume's sections at render resolution and hand them to
/// `drawable`. Returns false when the published path is already current.
pub fn rebuild_geometry(
    volume: &mut FlexibleVolume,
    frame: &Transform,
    drawable: &mut Drawable,
    distance: f32,
) -> bool {
    let rotated = volume.last_frame_rotation != frame.rotation;
    if volume.geometry_current && !rotated {
        let moved = drawable
            .built_at()
            .map(|at| at.distance(frame.position))
            .unwrap_or(f32::INFINITY);
        if moved <= MOVE_THRESHOLD_FACTOR * distance.max(0.0) {
            return false;
        }
    }

    let render = remap_sections(
        volume.sections(),
        Some(volume.simulate_res()),
        volume.render_res(),
        frame.scale.z,
    );

    let inv_rotation = frame.rotation.inverse();
    let last = (render.len() - 1).max(1) as f32;
    let path: Vec<PathPoint> = render
        .iter()
        .enumerate()
        .map(|(i, section)| PathPoint {
            position: inv_rotation * (section.position - frame.position),
            rotation: (inv_rotation * section.rotation * section.axis_rotation).normalize(),
            scale: section.scale,
            tex_t: i as f32 / last,
        })
        .collect();

    trace!(points = path.len(), "flexible path rebuilt");
    drawable.publish_path(path, frame.position);
    if rotated {
        drawable.mark_rebuild(RebuildFlags::POSITION);
    }

    volume.last_frame_rotation = frame.rotation;
    volume.geometry_current = true;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::flexible::{FlexibleParams, PathParams};

    fn frame() -> Transform {
        Transform {
            position: Vec3::new(50.0, 60.0, 25.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::new(0.1, 0.1, 1.0),
        }
    }

    fn volume(frame: &Transform) -> FlexibleVolume {
        let mut volume = FlexibleVolume::new(FlexibleParams::default(), PathParams::default(), frame);
        volume.update_render_res(1.0, frame);
        volume
    }

    #[test]
    fn test_rest_path_is_centred_on_the_prim() {
        let frame = frame();
        let mut volume = volume(&frame);
        let mut drawable = Drawable::new();
        assert!(rebuild_geometry(&mut volume, &frame, &mut drawable, 1.0));

        let path = drawable.path();
        assert_eq!(path.len(), 9);
        assert!((path[0].position - Vec3::new(0.0, 0.0, -0.5)).length() < 1e-5);
        assert!((path[8].position - Vec3::new(0.0, 0.0, 0.5)).length() < 1e-5);
        assert_eq!(path[0].tex_t, 0.0);
        assert_eq!(path[8].tex_t, 1.0);
        assert_eq!(drawable.rebuild_flags(), RebuildFlags::VOLUME);
    }

    #[test]
    fn test_current_path_is_not_rebuilt() {
        let frame = frame();
        let mut volume = volume(&frame);
        let mut drawable = Drawable::new();
        rebuild_geometry(&mut volume, &frame, &mut drawable, 10.0);
        drawable.take_rebuild();

        // Small moves are absorbed
        let mut nudged = frame;
        nudged.position.x += 0.005;
        assert!(!rebuild_geometry(&mut volume, &nudged, &mut drawable, 10.0));
        assert!(!drawable.needs_rebuild());

        // Larger ones are not
        nudged.position.x += 0.5;
        assert!(rebuild_geometry(&mut volume, &nudged, &mut drawable, 10.0));
        assert_eq!(drawable.take_rebuild(), RebuildFlags::POSITION);
    }

    #[test]
    fn test_rotation_change_forces_rebuild() {
        let frame = frame();
        let mut volume = volume(&frame);
        let mut drawable = Drawable::new();
        rebuild_geometry(&mut volume, &frame, &mut drawable, 10.0);
        drawable.take_rebuild();

        let mut turned = frame;
        turned.rotation = Quat::from_rotation_x(0.3);
        assert!(rebuild_geometry(&mut volume, &turned, &mut drawable, 10.0));
        assert!(drawable.rebuild_flags().contains(RebuildFlags::POSITION));
    }
}
