use std::fmt;
use std::net::SocketAddrV4;
use bitflags::bitflags;
use glam::{Quat, Vec3};
use uuid::Uuid;
use super::drawable::Drawable;
use super::flexible::{rebuild_geometry, FlexibleParams, FlexibleVolume, IntegrationError, PathParams};
use super::object_list::ObjectHandle;
use super::wind::WindField;

/// World-space placement of an object's render frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self { position, rotation, scale }
    }

    /// Radius of the bounding sphere
    pub fn radius(&self) -> f32 {
        self.scale.length() * 0.5
    }
}

/// Primitive code from the object update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PCode {
    Volume,
    Avatar,
    Grass,
    Tree,
    ParticleSystem,
}

impl PCode {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            9 => Some(Self::Volume),
            47 => Some(Self::Avatar),
            95 => Some(Self::Grass),
            255 => Some(Self::Tree),
            143 => Some(Self::ParticleSystem),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Volume => 9,
            Self::Avatar => 47,
            Self::Grass => 95,
            Self::Tree => 255,
            Self::ParticleSystem => 143,
        }
    }
}

/// Simulator circuit an object arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionHost(pub SocketAddrV4);

impl RegionHost {
    pub fn new(ip: [u8; 4], port: u16) -> Self {
        Self(SocketAddrV4::new(ip.into(), port))
    }
}

impl fmt::Display for RegionHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ObjectFlags: u16 {
        const SELECTED        = 0x0001;
        const ATTACHMENT      = 0x0002;
        const VISIBLE         = 0x0004;
        const FORCE_INVISIBLE = 0x0008;
        const ORPHANED        = 0x0010;
        const DEAD            = 0x0020;
        const ACTIVE          = 0x0040;
    }
}

/// Camera-relative size of an object, refreshed by the lazy angle update
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraMetrics {
    pub distance: f32,
    /// Fraction of the screen covered by the bounding sphere
    pub pixel_area: f32,
    /// Angular radius in radians
    pub app_angle: f32,
}

/// Physics capability of a volume, fixed when the object is built
#[derive(Debug, Clone)]
pub enum VolumeBehavior {
    Rigid,
    Flexible(Box<FlexibleVolume>),
}

/// A live object as held by the registry
#[derive(Debug)]
pub struct WorldObject {
    id: Uuid,
    local_id: u32,
    pcode: PCode,
    region: RegionHost,
    transform: Transform,
    pub(crate) flags: ObjectFlags,
    pub(crate) parent: Option<ObjectHandle>,
    pub(crate) children: Vec<ObjectHandle>,
    behavior: VolumeBehavior,
    drawable: Drawable,
    camera: CameraMetrics,
    cost: Option<f32>,
}

impl WorldObject {
    pub fn new(id: Uuid, pcode: PCode, region: RegionHost) -> Self {
        Self {
            id,
            local_id: 0,
            pcode,
            region,
            transform: Transform::default(),
            flags: ObjectFlags::VISIBLE,
            parent: None,
            children: Vec::new(),
            behavior: VolumeBehavior::Rigid,
            drawable: Drawable::new(),
            camera: CameraMetrics::default(),
            cost: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn local_id(&self) -> u32 {
        self.local_id
    }

    pub(crate) fn set_local_id(&mut self, local_id: u32) {
        self.local_id = local_id;
    }

    pub fn pcode(&self) -> PCode {
        self.pcode
    }

    pub fn region(&self) -> RegionHost {
        self.region
    }

    pub fn flags(&self) -> ObjectFlags {
        self.flags
    }

    pub fn parent(&self) -> Option<ObjectHandle> {
        self.parent
    }

    pub fn children(&self) -> &[ObjectHandle] {
        &self.children
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        let rescaled = transform.scale != self.transform.scale;
        self.transform = transform;
        if rescaled {
            if let VolumeBehavior::Flexible(volume) = &mut self.behavior {
                volume.on_set_scale(&self.transform);
            }
        }
    }

    pub fn is_dead(&self) -> bool {
        self.flags.contains(ObjectFlags::DEAD)
    }

    pub fn is_selected(&self) -> bool {
        self.flags.contains(ObjectFlags::SELECTED)
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.flags.set(ObjectFlags::SELECTED, selected);
    }

    pub fn is_attachment(&self) -> bool {
        self.flags.contains(ObjectFlags::ATTACHMENT)
    }

    pub fn set_attachment(&mut self, attachment: bool) {
        self.flags.set(ObjectFlags::ATTACHMENT, attachment);
    }

    pub fn is_visible(&self) -> bool {
        self.flags.contains(ObjectFlags::VISIBLE) && !self.flags.contains(ObjectFlags::FORCE_INVISIBLE)
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.flags.set(ObjectFlags::VISIBLE, visible);
    }

    pub fn is_orphaned(&self) -> bool {
        self.flags.contains(ObjectFlags::ORPHANED)
    }

    pub fn camera(&self) -> &CameraMetrics {
        &self.camera
    }

    pub(crate) fn set_camera(&mut self, camera: CameraMetrics) {
        self.camera = camera;
    }

    pub fn cost(&self) -> Option<f32> {
        self.cost
    }

    pub(crate) fn set_cost(&mut self, cost: Option<f32>) {
        self.cost = cost;
    }

    pub fn drawable(&self) -> &Drawable {
        &self.drawable
    }

    pub fn drawable_mut(&mut self) -> &mut Drawable {
        &mut self.drawable
    }

    pub fn behavior(&self) -> &VolumeBehavior {
        &self.behavior
    }

    pub fn is_flexible(&self) -> bool {
        matches!(self.behavior, VolumeBehavior::Flexible(_))
    }

    pub fn flexible(&self) -> Option<&FlexibleVolume> {
        match &self.behavior {
            VolumeBehavior::Flexible(volume) => Some(&**volume),
            VolumeBehavior::Rigid => None,
        }
    }

    pub fn flexible_mut(&mut self) -> Option<&mut FlexibleVolume> {
        match &mut self.behavior {
            VolumeBehavior::Flexible(volume) => Some(&mut **volume),
            VolumeBehavior::Rigid => None,
        }
    }

    /// Apply flexible parameters from the volume parameter store, turning a
    /// rigid volume flexible if needed.
    pub fn set_flexible_params(&mut self, params: FlexibleParams, path: PathParams) {
        match &mut self.behavior {
            VolumeBehavior::Flexible(volume) => {
                if volume.path_params() != &path {
                    volume.on_path_changed(path, &self.transform);
                }
                if volume.params() != &params {
                    volume.on_parameter_changed(params, &self.transform);
                }
            }
            VolumeBehavior::Rigid => {
                self.behavior = VolumeBehavior::Flexible(Box::new(FlexibleVolume::new(
                    params,
                    path,
                    &self.transform,
                )));
            }
        }
    }

    /// Drop the flexible parameter; the object goes back to rigid
    pub fn clear_flexible(&mut self) {
        self.behavior = VolumeBehavior::Rigid;
    }

    /// Per-frame idle work of a flexible object: keep the simulate and render
    /// resolutions in line with the current camera distance.
    pub(crate) fn idle_update_flexible(&mut self) -> bool {
        let distance = self.camera.distance;
        match &mut self.behavior {
            VolumeBehavior::Flexible(volume) => volume.update_render_res(distance, &self.transform),
            VolumeBehavior::Rigid => false,
        }
    }

    /// Integrate the flexible spine and push it to the drawable.
    ///
    /// Returns `None` for rigid objects.
    pub(crate) fn do_flexible_update(
        &mut self,
        now: f64,
        max_step_seconds: f32,
        wind: &dyn WindField,
        frame_number: u64,
    ) -> Option<Result<(), IntegrationError>> {
        let volume = match &mut self.behavior {
            VolumeBehavior::Flexible(volume) => volume,
            VolumeBehavior::Rigid => return None,
        };
        let result = volume.do_flexible_update(&self.transform, now, max_step_seconds, wind, frame_number);
        rebuild_geometry(volume, &self.transform, &mut self.drawable, self.camera.distance);
        Some(result)
    }

    /// Region origin shift
    pub(crate) fn shift(&mut self, offset: Vec3) {
        self.transform.position += offset;
        self.drawable.shift(offset);
        if let VolumeBehavior::Flexible(volume) = &mut self.behavior {
            volume.on_shift(offset);
        }
    }
}
