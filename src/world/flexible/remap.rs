//! Resampling of a section array between power-of-two resolutions.

use glam::Vec3;
use super::params::MAX_SECTIONS;
use super::section::{section_count, Section};

/// Resample `source`, taken at `source_res`, into a new array at `dest_res`.
///
/// `source_res == None` means the sections were never initialised: only the
/// anchor is trusted and the rest pose is extended straight along its
/// direction. `length` is the full spine length (the object's z scale).
///
/// Resolutions above `MAX_SECTIONS`, or a source slice shorter than its
/// resolution implies, are caller bugs: they assert in debug builds and are
/// clamped in release builds. The result always holds `2^dest_res + 1`
/// sections and its anchor is an exact copy of the source anchor.
pub fn remap_sections(
    source: &[Section],
    source_res: Option<u32>,
    dest_res: u32,
    length: f32,
) -> Vec<Section> {
    debug_assert!(dest_res <= MAX_SECTIONS, "destination resolution {} out of range", dest_res);
    debug_assert!(!source.is_empty(), "remap needs at least the anchor section");
    let dest_res = dest_res.min(MAX_SECTIONS);
    let anchor = source.first().copied().unwrap_or_default();

    // A source holding only the anchor cannot back any resolution
    let source_res = source_res.and_then(|res| {
        debug_assert!(
            res <= MAX_SECTIONS && source.len() >= section_count(res),
            "source resolution {} does not match {} sections",
            res,
            source.len()
        );
        (source.len() >= 2).then(|| clamp_to_available(res, source.len()))
    });

    let num_output_sections = 1usize << dest_res;
    let section_length = length / num_output_sections as f32;

    let mut dest = Vec::with_capacity(num_output_sections + 1);
    match source_res {
        None => {
            // Generate all from section 0
            dest.push(anchor);
            for section in 0..num_output_sections {
                let mut next = dest[section];
                next.position += dest[section].direction * section_length;
                next.velocity = Vec3::ZERO;
                dest.push(next);
            }
        }
        Some(src) if src > dest_res => {
            // Copy, skipping sections
            let num_steps = 1usize << (src - dest_res);
            dest.push(anchor);
            for section in 0..num_output_sections {
                dest.push(source[(section + 1) * num_steps]);
            }
        }
        Some(src) if src < dest_res => {
            let step_shift = dest_res - src;
            let num_steps = 1usize << step_shift;
            let source_section_length = length / (1usize << src) as f32;
            let t_inc = 1.0 / num_steps as f32;

            dest.push(anchor);
            for source_index in 0..(1usize << src) {
                let last = &source[source_index];
                let next = &source[source_index + 1];

                // Cubic Hermite of position: A t^3 + B t^2 + C t + D
                let d = last.position;
                let c = last.d_position * source_section_length;
                let y = next.d_position * source_section_length - c;
                let x = next.position - d - c;
                let a = y - 2.0 * x;
                let b = x - a;

                for step in 1..num_steps {
                    let t = t_inc * step as f32;
                    let t_sq = t * t;
                    dest.push(Section {
                        position: t_sq * (t * a + b) + t * c + d,
                        direction: last.direction.lerp(next.direction, t),
                        d_position: last.d_position.lerp(next.d_position, t),
                        rotation: last.rotation.slerp(next.rotation, t),
                        axis_rotation: last.axis_rotation.slerp(next.axis_rotation, t),
                        scale: last.scale.lerp(next.scale, t),
                        velocity: last.velocity.lerp(next.velocity, t),
                        updated_at: last.updated_at,
                    });
                }
                dest.push(*next);
            }
        }
        Some(_) => {
            // Same resolution, copy
            dest.extend_from_slice(&source[..=num_output_sections]);
        }
    }

    debug_assert_eq!(dest.len(), section_count(dest_res));
    dest
}

/// Largest resolution not above `res` that a slice of `available` sections can back
fn clamp_to_available(res: u32, available: usize) -> u32 {
    let mut res = res.min(MAX_SECTIONS);
    while res > 0 && section_count(res) > available {
        res -= 1;
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec2};

    fn straight(res: u32, length: f32) -> Vec<Section> {
        let anchor = Section {
            position: Vec3::new(1.0, 2.0, 3.0),
            ..Section::default()
        };
        remap_sections(&[anchor], None, res, length)
    }

    /// Spine bent along a circular arc in the xz plane with exact tangents
    fn arc(res: u32, length: f32, radius: f32) -> Vec<Section> {
        let n = 1usize << res;
        (0..=n)
            .map(|i| {
                let s = length * i as f32 / n as f32;
                let theta = s / radius;
                let position = Vec3::new(radius * (1.0 - theta.cos()), 0.0, radius * theta.sin());
                let tangent = Vec3::new(theta.sin(), 0.0, theta.cos());
                Section {
                    position,
                    direction: tangent,
                    d_position: tangent,
                    rotation: Quat::from_axis_angle(Vec3::Y, theta),
                    scale: Vec2::splat(0.1 + 0.01 * i as f32),
                    ..Section::default()
                }
            })
            .collect()
    }

    #[test]
    fn test_output_length_for_every_pair() {
        for source_res in 0..=MAX_SECTIONS {
            let source = straight(source_res, 2.0);
            for dest_res in 0..=MAX_SECTIONS {
                let dest = remap_sections(&source, Some(source_res), dest_res, 2.0);
                assert_eq!(dest.len(), section_count(dest_res));
                assert_eq!(dest[0], source[0]);
            }
        }
    }

    #[test]
    fn test_same_resolution_is_a_copy() {
        let source = arc(2, 1.0, 2.0);
        let dest = remap_sections(&source, Some(2), 2, 1.0);
        assert_eq!(dest, source);
    }

    #[test]
    fn test_uninitialised_source_extends_anchor() {
        let mut anchor = Section::default();
        anchor.direction = Vec3::X;
        anchor.velocity = Vec3::ONE;
        let dest = remap_sections(&[anchor], None, 2, 2.0);
        assert_eq!(dest.len(), 5);
        for (i, section) in dest.iter().enumerate().skip(1) {
            assert!((section.position - Vec3::X * 0.5 * i as f32).length() < 1e-5);
            assert_eq!(section.velocity, Vec3::ZERO);
        }
    }

    #[test]
    fn test_upsample_from_two_sections() {
        let source = straight(0, 1.0);
        assert_eq!(source.len(), 2);

        let dest = remap_sections(&source, Some(0), 2, 1.0);
        assert_eq!(dest.len(), 5);
        assert_eq!(dest[0], source[0]);
        assert_eq!(dest[4].position, source[1].position);
        for (i, section) in dest.iter().enumerate() {
            let expected = source[0].position + Vec3::Z * 0.25 * i as f32;
            assert!((section.position - expected).length() < 1e-5, "section {}", i);
        }
    }

    #[test]
    fn test_downsample_strides() {
        let source = arc(3, 1.0, 1.5);
        let dest = remap_sections(&source, Some(3), 1, 1.0);
        assert_eq!(dest.len(), 3);
        assert_eq!(dest[0], source[0]);
        assert_eq!(dest[1], source[4]);
        assert_eq!(dest[2], source[8]);
    }

    #[test]
    fn test_down_then_up_keeps_anchor_and_stays_close() {
        let length = 1.0;
        let source = arc(3, length, 2.0);
        let down = remap_sections(&source, Some(3), 2, length);
        let up = remap_sections(&down, Some(2), 3, length);

        assert_eq!(up.len(), source.len());
        assert_eq!(up[0], source[0]);
        for (i, (a, b)) in up.iter().zip(source.iter()).enumerate() {
            assert!((a.position - b.position).length() < 1e-3, "section {} drifted", i);
            assert!((a.scale - b.scale).length() < 1e-5);
        }
    }

    #[test]
    fn test_interpolated_sections_lerp_scale_and_rotation() {
        let source = arc(0, 1.0, 3.0);
        let dest = remap_sections(&source, Some(0), 1, 1.0);
        let mid = dest[1];
        assert!((mid.scale - (source[0].scale + source[1].scale) * 0.5).length() < 1e-6);
        let expected = source[0].rotation.slerp(source[1].rotation, 0.5);
        assert!(mid.rotation.angle_between(expected) < 1e-4);
    }
}
