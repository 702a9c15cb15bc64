//! Flexible ("flexi") prims: spine simulation, resolution remapping, path
//! geometry and the frame-budgeted LOD scheduler that drives them.

pub mod params;
pub mod section;
pub mod remap;
pub mod integrator;
pub mod geometry;
pub mod volume;
pub mod scheduler;

pub use params::{FlexibleParams, PathParams, MAX_SECTIONS};
pub use section::{section_count, Section};
pub use remap::remap_sections;
pub use integrator::FrameParams;
pub use geometry::{rebuild_geometry, PathPoint};
pub use volume::FlexibleVolume;
pub use scheduler::{SchedulerContext, SchedulerStats, NUM_LOD_BINS};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    #[error("Section {section} left the finite range during integration")]
    NonFinite { section: usize },
}
