//! Registry of live world objects.
//!
//! The registry owns every object. Everything else (bins, orphan records,
//! selection, listeners) refers to objects by `ObjectHandle` or `Uuid` and
//! has to re-resolve through the registry, since an object may be killed
//! between frames. Killed objects disappear from lookups immediately; their
//! storage is reclaimed later by `clean_dead_objects`.

use std::collections::{HashMap, HashSet, VecDeque};
use crossbeam_channel::{unbounded, Receiver, Sender};
use glam::Vec3;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;
use super::events::{ObjectEvent, ObjectUpdate};
use super::object::{CameraMetrics, ObjectFlags, PCode, RegionHost, WorldObject};
use super::orphans::{host_index_of, local_key, OrphanTable};
use crate::config::ObjectListSettings;
use crate::utils::clock::{Clock, SystemClock};

/// Generation-counted reference to a registry slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle {
    index: u32,
    generation: u32,
}

impl ObjectHandle {
    pub fn index(&self) -> u32 {
        self.index
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    object: Option<WorldObject>,
}

/// Viewpoint used for apparent-size updates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub position: Vec3,
    /// Vertical field of view in radians
    pub view_angle: f32,
}

impl Default for CameraView {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            view_angle: std::f32::consts::FRAC_PI_3,
        }
    }
}

pub struct ObjectRegistry {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live_count: usize,
    uuid_map: HashMap<Uuid, ObjectHandle>,
    /// Packed (host index, local id) -> global id
    local_table: HashMap<u64, Uuid>,
    host_indices: HashMap<RegionHost, u32>,
    next_host_index: u32,
    regions: HashSet<RegionHost>,
    dead: VecDeque<ObjectHandle>,
    active: Vec<ObjectHandle>,
    active_index: HashMap<ObjectHandle, usize>,
    orphans: OrphanTable,
    listeners: Vec<Sender<ObjectEvent>>,
    stale_costs: HashSet<Uuid>,
    pending_costs: HashSet<Uuid>,
    /// Objects created since the last apparent-angle pass
    fresh: Vec<ObjectHandle>,
    lazy_slice: usize,
    frame: u64,
    settings: ObjectListSettings,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("live", &self.live_count)
            .field("dead", &self.dead.len())
            .field("active", &self.active.len())
            .field("orphans", &self.orphans.len())
            .field("frame", &self.frame)
            .finish()
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new(ObjectListSettings::default())
    }
}

impl ObjectRegistry {
    pub fn new(settings: ObjectListSettings) -> Self {
        Self::with_clock(settings, Box::new(SystemClock::new()))
    }

    /// Registry whose cleanup budget is metered by `clock`
    pub fn with_clock(settings: ObjectListSettings, clock: Box<dyn Clock>) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live_count: 0,
            uuid_map: HashMap::new(),
            local_table: HashMap::new(),
            host_indices: HashMap::new(),
            next_host_index: 1,
            regions: HashSet::new(),
            dead: VecDeque::new(),
            active: Vec::new(),
            active_index: HashMap::new(),
            orphans: OrphanTable::new(),
            listeners: Vec::new(),
            stale_costs: HashSet::new(),
            pending_costs: HashSet::new(),
            fresh: Vec::new(),
            lazy_slice: 0,
            frame: 0,
            settings,
            clock,
        }
    }

    pub fn settings(&self) -> &ObjectListSettings {
        &self.settings
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.live_count
    }

    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Killed objects whose storage has not been reclaimed yet
    pub fn dead_count(&self) -> usize {
        self.dead.len()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn advance_frame(&mut self) {
        self.frame += 1;
    }

    /// Receive lifecycle events from now on
    pub fn subscribe(&mut self) -> Receiver<ObjectEvent> {
        let (tx, rx) = unbounded();
        self.listeners.push(tx);
        rx
    }

    fn emit(&mut self, event: ObjectEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ---------------------------------------------------------------------
    // Slots

    fn alloc_slot(&mut self, object: WorldObject) -> ObjectHandle {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            ObjectHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                object: Some(object),
            });
            ObjectHandle { index, generation: 0 }
        }
    }

    fn slot_object(&self, handle: ObjectHandle) -> Option<&WorldObject> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    fn slot_object_mut(&mut self, handle: ObjectHandle) -> Option<&mut WorldObject> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_mut())
    }

    /// Live object behind `handle`; `None` once it has been killed
    pub fn get(&self, handle: ObjectHandle) -> Option<&WorldObject> {
        self.slot_object(handle).filter(|o| !o.is_dead())
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut WorldObject> {
        self.slot_object_mut(handle).filter(|o| !o.is_dead())
    }

    pub fn is_alive(&self, handle: ObjectHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Live objects in slot order
    pub fn iter(&self) -> impl Iterator<Item = (ObjectHandle, &WorldObject)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.object
                .as_ref()
                .filter(|o| !o.is_dead())
                .map(|o| {
                    (
                        ObjectHandle {
                            index: index as u32,
                            generation: slot.generation,
                        },
                        o,
                    )
                })
        })
    }

    pub fn handles(&self) -> Vec<ObjectHandle> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    // ---------------------------------------------------------------------
    // Lookup and creation

    /// Handle of the live object with global id `id`
    pub fn find(&self, id: &Uuid) -> Option<ObjectHandle> {
        self.uuid_map.get(id).copied().filter(|h| self.is_alive(*h))
    }

    pub fn find_object(&self, id: &Uuid) -> Option<&WorldObject> {
        self.find(id).and_then(|h| self.get(h))
    }

    /// Return the live object with `id`, creating it if there is none
    pub fn create_or_get(&mut self, id: Uuid, pcode: PCode, region: RegionHost) -> ObjectHandle {
        if let Some(handle) = self.find(&id) {
            return handle;
        }

        let handle = self.alloc_slot(WorldObject::new(id, pcode, region));
        self.uuid_map.insert(id, handle);
        self.live_count += 1;
        self.fresh.push(handle);
        self.host_index(region);

        debug!("📦 Created object {} ({:?}) from {}", id, pcode, region);
        self.emit(ObjectEvent::Created { id, local_id: 0 });
        handle
    }

    /// Create an object that only exists on this viewer
    pub fn create_viewer_object(&mut self, pcode: PCode, region: RegionHost) -> ObjectHandle {
        self.create_or_get(Uuid::new_v4(), pcode, region)
    }

    /// Kill the object with `id` and build a fresh one in its place, keeping
    /// the local id binding.
    pub fn replace_object(&mut self, id: Uuid, pcode: PCode, region: RegionHost) -> ObjectHandle {
        let local_id = self.find_object(&id).map(|o| (o.local_id(), o.region()));
        if let Some(old) = self.find(&id) {
            self.kill(old);
        }
        let handle = self.create_or_get(id, pcode, region);
        if let Some((local_id, host)) = local_id {
            if local_id != 0 {
                self.set_uuid_and_local(id, local_id, host);
            }
        }
        handle
    }

    /// Apply an object update from the network layer
    pub fn process_object_update(&mut self, update: ObjectUpdate) -> ObjectHandle {
        let handle = self.create_or_get(update.id, update.pcode, update.host);
        self.set_uuid_and_local(update.id, update.local_id, update.host);

        let mut flexible = false;
        if let Some(object) = self.get_mut(handle) {
            object.set_transform(update.transform);
            match update.flexible {
                Some((params, path)) => {
                    object.set_flexible_params(params, path);
                    flexible = true;
                }
                None if object.is_flexible() => object.clear_flexible(),
                None => {}
            }
        }
        self.update_active(handle, flexible);

        match update.parent_local_id {
            Some(parent_local_id) => {
                let parent = self
                    .uuid_from_local(parent_local_id, update.host)
                    .and_then(|id| self.find(&id));
                match parent {
                    Some(parent) => {
                        self.set_parent(handle, Some(parent));
                        self.clear_orphan(handle);
                    }
                    None => self.orphanize(handle, parent_local_id, update.host),
                }
            }
            None => {
                self.set_parent(handle, None);
                self.clear_orphan(handle);
            }
        }

        self.resolve_orphans(handle);
        handle
    }

    // ---------------------------------------------------------------------
    // Local ids

    /// Stable index of `host`, assigned on first sight starting at 1
    pub fn host_index(&mut self, host: RegionHost) -> u32 {
        if let Some(index) = self.host_indices.get(&host) {
            return *index;
        }
        let index = self.next_host_index;
        self.next_host_index += 1;
        self.host_indices.insert(host, index);
        index
    }

    pub fn find_host_index(&self, host: RegionHost) -> Option<u32> {
        self.host_indices.get(&host).copied()
    }

    /// Bind `local_id` on `host` to the global id `id`
    pub fn set_uuid_and_local(&mut self, id: Uuid, local_id: u32, host: RegionHost) {
        let index = self.host_index(host);
        let key = local_key(index, local_id);

        let previous = self.find_object(&id).map(|o| (o.local_id(), o.region()));
        if let Some((old_local, old_host)) = previous {
            if old_local != 0 && (old_local, old_host) != (local_id, host) {
                self.remove_from_local_id_table(id, old_local, old_host);
            }
        }

        self.local_table.insert(key, id);
        if let Some(handle) = self.find(&id) {
            if let Some(object) = self.get_mut(handle) {
                object.set_local_id(local_id);
            }
        }
    }

    pub fn uuid_from_local(&self, local_id: u32, host: RegionHost) -> Option<Uuid> {
        let index = self.find_host_index(host)?;
        self.local_table.get(&local_key(index, local_id)).copied()
    }

    /// Remove the binding of `local_id` on `host`, but only while it still
    /// points at `id`. A local id reused for another object is left alone.
    pub fn remove_from_local_id_table(&mut self, id: Uuid, local_id: u32, host: RegionHost) -> bool {
        let Some(index) = self.find_host_index(host) else {
            return false;
        };
        let key = local_key(index, local_id);
        if self.local_table.get(&key) == Some(&id) {
            self.local_table.remove(&key);
            true
        } else {
            false
        }
    }

    // ---------------------------------------------------------------------
    // Parenting and orphans

    /// True when `ancestor` is `handle` or sits somewhere above it
    fn is_ancestor_or_self(&self, ancestor: ObjectHandle, handle: ObjectHandle) -> bool {
        let mut visited = HashSet::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            if h == ancestor {
                return true;
            }
            if !visited.insert(h) {
                return false;
            }
            current = self.get(h).and_then(|o| o.parent());
        }
        false
    }

    /// Link `child` under `parent`. Links that would close a loop are
    /// refused and leave the child unparented; returns whether the link held.
    fn set_parent(&mut self, child: ObjectHandle, parent: Option<ObjectHandle>) -> bool {
        let old_parent = match self.get(child) {
            Some(object) => object.parent(),
            None => return false,
        };
        let parent = match parent {
            Some(p) if self.is_ancestor_or_self(child, p) => {
                warn!("📦 Refusing to link {:?} under its own descendant {:?}", child, p);
                if old_parent.is_some() {
                    self.set_parent(child, None);
                }
                return false;
            }
            other => other,
        };
        if old_parent == parent {
            return true;
        }
        if let Some(old) = old_parent.and_then(|p| self.get_mut(p)) {
            old.children.retain(|c| *c != child);
        }
        if let Some(new) = parent.and_then(|p| self.get_mut(p)) {
            new.children.push(child);
        }
        if let Some(object) = self.get_mut(child) {
            object.parent = parent;
        }
        true
    }

    /// Park `child` until the parent with `parent_local_id` on `host` shows up
    pub fn orphanize(&mut self, child: ObjectHandle, parent_local_id: u32, host: RegionHost) {
        let Some(id) = self.get(child).map(|o| o.id()) else {
            return;
        };
        let parent_key = local_key(self.host_index(host), parent_local_id);
        let frame = self.frame;
        self.orphans.insert(parent_key, id, frame);
        self.set_parent(child, None);
        if let Some(object) = self.get_mut(child) {
            object.flags.insert(ObjectFlags::ORPHANED | ObjectFlags::FORCE_INVISIBLE);
        }
        debug!("📦 Orphaned {} waiting on parent {:016x}", id, parent_key);
        self.emit(ObjectEvent::Orphaned { child: id, parent_key });
    }

    /// Re-parent every orphan waiting on `parent`. Returns the children that
    /// were reunited.
    pub fn resolve_orphans(&mut self, parent: ObjectHandle) -> Vec<ObjectHandle> {
        let Some((parent_id, local_id, region)) = self.get(parent).map(|o| (o.id(), o.local_id(), o.region())) else {
            return Vec::new();
        };
        let Some(index) = self.find_host_index(region) else {
            return Vec::new();
        };
        let parent_key = local_key(index, local_id);
        if local_id == 0 || !self.orphans.is_waiting_on(parent_key) {
            return Vec::new();
        }

        let mut reunited = Vec::new();
        for child_id in self.orphans.take_children_of(parent_key) {
            let Some(child) = self.find(&child_id) else {
                continue;
            };
            if child == parent {
                continue;
            }
            let linked = self.set_parent(child, Some(parent));
            if let Some(object) = self.get_mut(child) {
                object.flags.remove(ObjectFlags::ORPHANED | ObjectFlags::FORCE_INVISIBLE);
            }
            if !linked {
                continue;
            }
            self.emit(ObjectEvent::Reparented {
                child: child_id,
                parent: parent_id,
            });
            reunited.push(child);
        }
        if !reunited.is_empty() {
            info!("📦 Reunited {} orphan(s) with parent {}", reunited.len(), parent_id);
        }
        reunited
    }

    fn clear_orphan(&mut self, handle: ObjectHandle) {
        let Some(object) = self.get_mut(handle) else {
            return;
        };
        let was_orphaned = object.is_orphaned();
        object.flags.remove(ObjectFlags::ORPHANED | ObjectFlags::FORCE_INVISIBLE);
        if was_orphaned {
            let id = object.id();
            self.orphans.remove_child(&id);
        }
    }

    pub fn orphans(&self) -> &OrphanTable {
        &self.orphans
    }

    /// Drop orphan records that can no longer resolve: the host has no live
    /// region, the child is gone, or the record is older than the configured
    /// horizon.
    pub fn prune_orphans(&mut self) -> usize {
        let live_indices: HashSet<u32> = self
            .regions
            .iter()
            .filter_map(|host| self.host_indices.get(host).copied())
            .collect();
        let frame = self.frame;
        let max_age = self.settings.orphan_max_age_frames;
        let uuid_map = &self.uuid_map;

        let mut dropped = Vec::new();
        let count = self.orphans.prune(|record| {
            let stale = !live_indices.contains(&host_index_of(record.parent_key))
                || !uuid_map.contains_key(&record.child)
                || frame.saturating_sub(record.created_frame) > max_age;
            if stale {
                dropped.push(record.child);
            }
            stale
        });

        for child in dropped {
            if let Some(object) = self.find(&child).and_then(|h| self.get_mut(h)) {
                object.flags.remove(ObjectFlags::ORPHANED | ObjectFlags::FORCE_INVISIBLE);
            }
        }
        if count > 0 {
            info!("📦 Pruned {} stale orphan record(s)", count);
            self.emit(ObjectEvent::OrphansPruned { count });
        }
        count
    }

    // ---------------------------------------------------------------------
    // Death and cleanup

    /// Mark `handle` dead. It drops out of every lookup at once, along with
    /// its children; storage is reclaimed by `clean_dead_objects`.
    pub fn kill(&mut self, handle: ObjectHandle) -> bool {
        let Some(object) = self.get_mut(handle) else {
            return false;
        };
        object.flags.insert(ObjectFlags::DEAD);
        object.flags.remove(ObjectFlags::ACTIVE);
        let id = object.id();
        let local_id = object.local_id();
        let region = object.region();
        let parent = object.parent.take();
        let children = std::mem::take(&mut object.children);

        if self.uuid_map.get(&id) == Some(&handle) {
            self.uuid_map.remove(&id);
        }
        if local_id != 0 {
            self.remove_from_local_id_table(id, local_id, region);
        }
        self.remove_active(handle);
        self.orphans.remove_child(&id);
        self.stale_costs.remove(&id);
        self.pending_costs.remove(&id);
        if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            parent.children.retain(|c| *c != handle);
        }

        self.live_count -= 1;
        self.dead.push_back(handle);
        trace!("📦 Killed object {}", id);
        self.emit(ObjectEvent::Killed { id });

        for child in children {
            if let Some(object) = self.get_mut(child) {
                object.parent = None;
            }
            self.kill(child);
        }
        true
    }

    /// Kill every object that came from `host`, then reclaim them all
    pub fn kill_objects(&mut self, host: RegionHost) -> usize {
        let doomed: Vec<ObjectHandle> = self
            .iter()
            .filter(|(_, o)| o.region() == host)
            .map(|(h, _)| h)
            .collect();
        let killed = doomed.into_iter().filter(|h| self.kill(*h)).count();
        self.clean_dead_objects(false);
        info!("📦 Killed {} object(s) from {}", killed, host);
        killed
    }

    pub fn kill_all_objects(&mut self) -> usize {
        let killed = self
            .handles()
            .into_iter()
            .filter(|h| self.kill(*h))
            .count();
        self.clean_dead_objects(false);
        self.orphans = OrphanTable::new();
        self.stale_costs.clear();
        self.pending_costs.clear();
        info!("📦 Killed all {} object(s)", killed);
        killed
    }

    /// Reclaim killed objects. With `use_timer` the sweep stops once the
    /// cleanup budget is spent (always freeing at least one); otherwise it
    /// runs to completion.
    pub fn clean_dead_objects(&mut self, use_timer: bool) -> usize {
        let budget = self.settings.cleanup_budget();
        let start = self.clock.now();
        let mut freed = 0;

        while let Some(handle) = self.dead.pop_front() {
            let slot = &mut self.slots[handle.index as usize];
            if slot.generation != handle.generation {
                continue;
            }
            let Some(object) = slot.object.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free_list.push(handle.index);
            freed += 1;
            self.emit(ObjectEvent::Freed { id: object.id() });

            if use_timer && self.clock.now().saturating_sub(start) >= budget {
                break;
            }
        }

        if freed > 0 {
            debug!("🧹 Cleaned {} dead object(s), {} pending", freed, self.dead.len());
        }
        freed
    }

    // ---------------------------------------------------------------------
    // Regions

    pub fn add_region(&mut self, host: RegionHost) {
        self.host_index(host);
        if self.regions.insert(host) {
            info!("📦 Region {} connected", host);
        }
    }

    /// Disconnect `host` and tear down its objects
    pub fn remove_region(&mut self, host: RegionHost) -> usize {
        if !self.regions.remove(&host) {
            return 0;
        }
        info!("📦 Region {} disconnected", host);
        self.kill_objects(host)
    }

    pub fn has_region(&self, host: RegionHost) -> bool {
        self.regions.contains(&host)
    }

    // ---------------------------------------------------------------------
    // Active list

    /// Add or remove `handle` from the list of objects needing idle updates
    pub fn update_active(&mut self, handle: ObjectHandle, active: bool) {
        if !self.is_alive(handle) {
            return;
        }
        if active {
            if !self.active_index.contains_key(&handle) {
                self.active_index.insert(handle, self.active.len());
                self.active.push(handle);
            }
        } else {
            self.remove_active(handle);
        }
        if let Some(object) = self.get_mut(handle) {
            object.flags.set(ObjectFlags::ACTIVE, active);
        }
    }

    fn remove_active(&mut self, handle: ObjectHandle) {
        let Some(index) = self.active_index.remove(&handle) else {
            return;
        };
        self.active.swap_remove(index);
        if let Some(moved) = self.active.get(index) {
            self.active_index.insert(*moved, index);
        }
    }

    pub fn active_objects(&self) -> &[ObjectHandle] {
        &self.active
    }

    // ---------------------------------------------------------------------
    // Spatial

    /// Move every object by `offset`, e.g. after a region origin change
    pub fn shift_objects(&mut self, offset: Vec3) {
        if offset == Vec3::ZERO || !offset.is_finite() {
            return;
        }
        for slot in &mut self.slots {
            if let Some(object) = slot.object.as_mut().filter(|o| !o.is_dead()) {
                object.shift(offset);
            }
        }
    }

    /// Refresh distance, pixel area and apparent angle for one slice of the
    /// registry plus anything created since the last call.
    pub fn update_apparent_angles(&mut self, camera: &CameraView) {
        let slices = self.settings.lazy_update_slices.max(1);
        let slice = self.lazy_slice % slices;
        self.lazy_slice = (slice + 1) % slices;

        let fresh: HashSet<ObjectHandle> = std::mem::take(&mut self.fresh).into_iter().collect();
        let half_view = (camera.view_angle * 0.5).max(f32::EPSILON);

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let handle = ObjectHandle {
                index: index as u32,
                generation: slot.generation,
            };
            if index % slices != slice && !fresh.contains(&handle) {
                continue;
            }
            let Some(object) = slot.object.as_mut().filter(|o| !o.is_dead()) else {
                continue;
            };
            let transform = object.transform();
            let distance = transform.position.distance(camera.position);
            let radius = transform.radius();
            let app_angle = radius.atan2(distance);
            let pixel_area = (app_angle / half_view).powi(2).min(1.0);
            object.set_camera(CameraMetrics {
                distance,
                pixel_area,
                app_angle,
            });
        }
    }

    // ---------------------------------------------------------------------
    // Object costs

    /// Queue a cost refresh for `handle` and its root
    pub fn mark_cost_stale(&mut self, handle: ObjectHandle) {
        let Some(object) = self.get(handle) else {
            return;
        };
        let id = object.id();
        let mut root = handle;
        let mut visited = HashSet::from([handle]);
        while let Some(parent) = self.get(root).and_then(|o| o.parent()) {
            if !visited.insert(parent) {
                break;
            }
            root = parent;
        }
        let root_id = self.get(root).map(|o| o.id());

        self.stale_costs.insert(id);
        if let Some(root_id) = root_id {
            self.stale_costs.insert(root_id);
        }
    }

    /// Hand out up to the configured batch of stale ids, moving them to the
    /// pending set. Ids already in flight are not requested twice.
    pub fn take_stale_costs(&mut self) -> Vec<Uuid> {
        let limit = self.settings.max_cost_requests;
        let batch: Vec<Uuid> = self
            .stale_costs
            .iter()
            .filter(|id| !self.pending_costs.contains(*id))
            .take(limit)
            .copied()
            .collect();
        for id in &batch {
            self.stale_costs.remove(id);
            self.pending_costs.insert(*id);
        }
        batch
    }

    pub fn apply_object_cost(&mut self, id: Uuid, cost: f32) {
        self.pending_costs.remove(&id);
        if let Some(object) = self.find(&id).and_then(|h| self.get_mut(h)) {
            object.set_cost(Some(cost));
        }
    }

    pub fn on_cost_fetch_failure(&mut self, id: Uuid) {
        if self.pending_costs.remove(&id) {
            warn!("📦 Cost fetch failed for {}", id);
        }
    }

    pub fn stale_cost_count(&self) -> usize {
        self.stale_costs.len()
    }

    pub fn pending_cost_count(&self) -> usize {
        self.pending_costs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> RegionHost {
        RegionHost::new([10, 0, 0, 1], 13000)
    }

    #[test]
    fn test_create_or_get_is_idempotent() {
        let mut registry = ObjectRegistry::default();
        let id = Uuid::new_v4();
        let a = registry.create_or_get(id, PCode::Volume, host());
        let b = registry.create_or_get(id, PCode::Volume, host());
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_stale_handle_after_free() {
        let mut registry = ObjectRegistry::default();
        let old = registry.create_viewer_object(PCode::Volume, host());
        registry.kill(old);
        assert_eq!(registry.clean_dead_objects(false), 1);

        let new = registry.create_viewer_object(PCode::Volume, host());
        assert_eq!(new.index(), old.index());
        assert_ne!(new, old);
        assert!(registry.get(old).is_none());
        assert!(registry.get(new).is_some());
    }

    #[test]
    fn test_host_indices_start_at_one() {
        let mut registry = ObjectRegistry::default();
        let other = RegionHost::new([10, 0, 0, 2], 13001);
        assert_eq!(registry.host_index(host()), 1);
        assert_eq!(registry.host_index(other), 2);
        assert_eq!(registry.host_index(host()), 1);
    }

    #[test]
    fn test_active_list_swap_remove() {
        let mut registry = ObjectRegistry::default();
        let a = registry.create_viewer_object(PCode::Volume, host());
        let b = registry.create_viewer_object(PCode::Volume, host());
        let c = registry.create_viewer_object(PCode::Volume, host());
        for h in [a, b, c] {
            registry.update_active(h, true);
        }
        registry.update_active(a, false);
        assert_eq!(registry.active_objects(), &[c, b]);
        registry.kill(c);
        assert_eq!(registry.active_objects(), &[b]);
        assert!(registry.get(b).unwrap().flags().contains(ObjectFlags::ACTIVE));
    }

    #[test]
    fn test_kill_cascades_to_children() {
        let mut registry = ObjectRegistry::default();
        let parent_id = Uuid::new_v4();
        let child_id = Uuid::new_v4();
        registry.process_object_update(ObjectUpdate::new(parent_id, 5, host(), PCode::Volume));
        registry.process_object_update(ObjectUpdate::new(child_id, 6, host(), PCode::Volume).with_parent(5));

        let parent = registry.find(&parent_id).unwrap();
        assert_eq!(registry.get(parent).unwrap().children().len(), 1);
        registry.kill(parent);
        assert!(registry.find(&child_id).is_none());
        assert_eq!(registry.dead_count(), 2);
    }

    #[test]
    fn test_timed_cleanup_respects_budget() {
        use crate::utils::clock::ManualClock;
        use std::time::Duration;

        let settings = ObjectListSettings {
            cleanup_budget_ms: 1.0,
            ..ObjectListSettings::default()
        };
        let clock = ManualClock::new(Duration::from_micros(400));
        let mut registry = ObjectRegistry::with_clock(settings, Box::new(clock));
        for _ in 0..10 {
            let h = registry.create_viewer_object(PCode::Volume, host());
            registry.kill(h);
        }
        // start = 0, then reads at 0.4, 0.8 and 1.2 ms
        assert_eq!(registry.clean_dead_objects(true), 3);
        assert_eq!(registry.dead_count(), 7);
        assert_eq!(registry.clean_dead_objects(false), 7);
    }

    #[test]
    fn test_stale_costs_batch_and_mark_root() {
        let mut registry = ObjectRegistry::default();
        let root_id = Uuid::new_v4();
        let leaf_id = Uuid::new_v4();
        registry.process_object_update(ObjectUpdate::new(root_id, 1, host(), PCode::Volume));
        let leaf = registry.process_object_update(ObjectUpdate::new(leaf_id, 2, host(), PCode::Volume).with_parent(1));

        registry.mark_cost_stale(leaf);
        assert_eq!(registry.stale_cost_count(), 2);

        let mut batch = registry.take_stale_costs();
        batch.sort();
        let mut expected = vec![root_id, leaf_id];
        expected.sort();
        assert_eq!(batch, expected);
        assert_eq!(registry.pending_cost_count(), 2);

        registry.apply_object_cost(leaf_id, 1.5);
        registry.on_cost_fetch_failure(root_id);
        assert_eq!(registry.pending_cost_count(), 0);
        assert_eq!(registry.find_object(&leaf_id).unwrap().cost(), Some(1.5));
    }

    #[test]
    fn test_apparent_angles_walk_one_slice_after_fresh() {
        let settings = ObjectListSettings {
            lazy_update_slices: 2,
            ..ObjectListSettings::default()
        };
        let mut registry = ObjectRegistry::new(settings);
        let a = registry.create_viewer_object(PCode::Volume, host());
        let b = registry.create_viewer_object(PCode::Volume, host());
        let camera = CameraView::default();

        // Both are fresh on the first pass
        registry.update_apparent_angles(&camera);
        assert!(registry.get(a).unwrap().camera().app_angle > 0.0);
        assert!(registry.get(b).unwrap().camera().app_angle > 0.0);

        for h in [a, b] {
            registry.get_mut(h).unwrap().set_transform(crate::world::object::Transform {
                position: Vec3::new(20.0, 0.0, 0.0),
                ..Default::default()
            });
        }
        // Second pass covers slice 1 only
        registry.update_apparent_angles(&camera);
        assert_eq!(registry.get(a).unwrap().camera().distance, 0.0);
        assert!((registry.get(b).unwrap().camera().distance - 20.0).abs() < 1e-5);
    }

    #[test]
    fn test_apparent_angles_cover_fresh_objects() {
        let mut registry = ObjectRegistry::default();
        let h = registry.create_viewer_object(PCode::Volume, host());
        registry.get_mut(h).unwrap().set_transform(crate::world::object::Transform {
            position: Vec3::new(10.0, 0.0, 0.0),
            ..Default::default()
        });
        registry.update_apparent_angles(&CameraView::default());
        let camera = *registry.get(h).unwrap().camera();
        assert!((camera.distance - 10.0).abs() < 1e-5);
        assert!(camera.app_angle > 0.0 && camera.pixel_area > 0.0);
    }
}
