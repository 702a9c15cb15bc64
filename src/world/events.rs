use uuid::Uuid;
use super::flexible::{FlexibleParams, PathParams};
use super::object::{PCode, RegionHost, Transform};

/// Object update handed over by the network decode layer
#[derive(Debug, Clone)]
pub struct ObjectUpdate {
    pub id: Uuid,
    pub local_id: u32,
    pub host: RegionHost,
    pub pcode: PCode,
    /// Local id of the parent on the same host, if linked
    pub parent_local_id: Option<u32>,
    pub transform: Transform,
    /// Present when the volume carries the flexible parameter
    pub flexible: Option<(FlexibleParams, PathParams)>,
}

impl ObjectUpdate {
    pub fn new(id: Uuid, local_id: u32, host: RegionHost, pcode: PCode) -> Self {
        Self {
            id,
            local_id,
            host,
            pcode,
            parent_local_id: None,
            transform: Transform::default(),
            flexible: None,
        }
    }

    pub fn with_parent(mut self, parent_local_id: u32) -> Self {
        self.parent_local_id = Some(parent_local_id);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_flexible(mut self, params: FlexibleParams, path: PathParams) -> Self {
        self.flexible = Some((params, path));
        self
    }
}

/// Lifecycle notifications sent to registry listeners
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectEvent {
    Created { id: Uuid, local_id: u32 },
    /// Object marked dead; it can no longer be found
    Killed { id: Uuid },
    /// Storage of a dead object reclaimed
    Freed { id: Uuid },
    /// Child arrived before its parent
    Orphaned { child: Uuid, parent_key: u64 },
    Reparented { child: Uuid, parent: Uuid },
    OrphansPruned { count: usize },
}
