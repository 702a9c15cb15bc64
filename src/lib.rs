// SLV-Flexi: flexible prim simulation and object lifecycle for the SLV viewer
// Performance by Default, Scalable by Design

pub mod config;
pub mod utils;
pub mod world;

// Re-export commonly used types for convenience
pub use config::{PerformanceProfile, ViewerSettings};
pub use world::{ObjectHandle, ObjectRegistry, World, WorldObject};
pub use world::flexible::{FlexibleParams, FlexibleVolume, SchedulerContext};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
