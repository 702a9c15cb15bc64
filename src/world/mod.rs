pub mod drawable;
pub mod events;
pub mod flexible;
pub mod frame;
pub mod object;
pub mod object_list;
pub mod orphans;
pub mod wind;

// Re-export the types most callers need
pub use drawable::{Drawable, RebuildFlags};
pub use events::{ObjectEvent, ObjectUpdate};
pub use frame::{FrameReport, World};
pub use object::{CameraMetrics, ObjectFlags, PCode, RegionHost, Transform, VolumeBehavior, WorldObject};
pub use object_list::{CameraView, ObjectHandle, ObjectRegistry};
pub use orphans::{local_key, OrphanRecord, OrphanTable};
pub use wind::{CalmWind, GustingWind, UniformWind, WindField};
