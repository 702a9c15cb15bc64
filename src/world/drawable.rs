use bitflags::bitflags;
use glam::Vec3;
use crate::world::flexible::PathPoint;

bitflags! {
    /// Pending render-side work for a drawable
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RebuildFlags: u8 {
        /// Point positions changed, topology is unchanged
        const POSITION = 0x01;
        /// Point count changed; the mesh has to be regenerated
        const VOLUME   = 0x02;
    }
}

/// Render-pipeline boundary of an object: the path the renderer extrudes and
/// the dirty bits telling it what to rebuild.
#[derive(Debug, Clone, Default)]
pub struct Drawable {
    path: Vec<PathPoint>,
    rebuild: RebuildFlags,
    /// Frame position the current path was built against
    built_at: Option<Vec3>,
    rebuild_count: u64,
}

impl Drawable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> &[PathPoint] {
        &self.path
    }

    pub fn rebuild_flags(&self) -> RebuildFlags {
        self.rebuild
    }

    pub fn needs_rebuild(&self) -> bool {
        !self.rebuild.is_empty()
    }

    /// Number of paths published so far
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    pub fn built_at(&self) -> Option<Vec3> {
        self.built_at
    }

    pub fn mark_rebuild(&mut self, flags: RebuildFlags) {
        self.rebuild |= flags;
    }

    /// Hand the pending rebuild to the renderer and clear it
    pub fn take_rebuild(&mut self) -> RebuildFlags {
        std::mem::take(&mut self.rebuild)
    }

    pub(crate) fn publish_path(&mut self, path: Vec<PathPoint>, frame_position: Vec3) {
        let flags = if path.len() != self.path.len() {
            RebuildFlags::VOLUME
        } else {
            RebuildFlags::POSITION
        };
        self.path = path;
        self.built_at = Some(frame_position);
        self.rebuild_count += 1;
        self.mark_rebuild(flags);
    }

    pub(crate) fn shift(&mut self, offset: Vec3) {
        if let Some(at) = self.built_at.as_mut() {
            *at += offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_rebuild_clears_flags() {
        let mut drawable = Drawable::new();
        drawable.mark_rebuild(RebuildFlags::POSITION);
        drawable.mark_rebuild(RebuildFlags::VOLUME);
        assert!(drawable.needs_rebuild());
        assert_eq!(drawable.take_rebuild(), RebuildFlags::POSITION | RebuildFlags::VOLUME);
        assert!(!drawable.needs_rebuild());
    }
}
