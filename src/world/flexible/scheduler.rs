//! Frame-budgeted scheduling of flexible updates.
//!
//! Every frame the bins are cleared, each flexible object classifies itself
//! into a bin from its idle update, and the budgeted pass drains the bins from
//! highest priority down. The pass is cooperative: the budget is checked
//! between objects, never inside one, so a single expensive object may overrun
//! its share. Objects that were never integrated since creation or their last
//! resolution change are always updated, budget or not.

use std::time::Duration;
use tracing::{debug, trace, warn};
use crate::config::FlexibleSettings;
use crate::utils::clock::{Clock, SystemClock};
use crate::world::object::WorldObject;
use crate::world::object_list::{ObjectHandle, ObjectRegistry};
use crate::world::wind::WindField;

/// Number of priority bins; the top one is reserved for selected objects
pub const NUM_LOD_BINS: usize = 8;

/// Apparent angle (radians) to bin index scale
const BIN_ANGLE_SCALE: f32 = 16.0;

/// Floor on a bin's log2 weight, so single-object bins still get time
const MIN_BIN_WEIGHT: f32 = 1.0;

/// Counters from the last budgeted pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SchedulerStats {
    pub frame: u64,
    /// Objects integrated inside their bin's budget
    pub updated: usize,
    /// Objects integrated over budget because they had never been updated
    pub forced: usize,
    /// Objects left for a later frame
    pub deferred: usize,
    /// Bins that finished past their allocation
    pub overruns: usize,
    /// Integrations that went non-finite and were reset
    pub nonfinite: usize,
    /// Time spent on budgeted updates
    pub budgeted_time: Duration,
    /// Time spent on forced updates
    pub forced_time: Duration,
}

/// Bins, frame counter and budget shared by all flexible objects
pub struct SchedulerContext {
    bins: [Vec<ObjectHandle>; NUM_LOD_BINS],
    frame: u64,
    settings: FlexibleSettings,
    clock: Box<dyn Clock>,
    stats: SchedulerStats,
}

impl std::fmt::Debug for SchedulerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerContext")
            .field("frame", &self.frame)
            .field("queued", &self.queued())
            .field("settings", &self.settings)
            .finish()
    }
}

impl SchedulerContext {
    pub fn new(settings: FlexibleSettings) -> Self {
        Self::with_clock(settings, Box::new(SystemClock::new()))
    }

    pub fn with_clock(settings: FlexibleSettings, clock: Box<dyn Clock>) -> Self {
        Self {
            bins: Default::default(),
            frame: 0,
            settings,
            clock,
            stats: SchedulerStats::default(),
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn settings(&self) -> &FlexibleSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut FlexibleSettings {
        &mut self.settings
    }

    /// Debug switch: when disabled only never-updated objects are simulated
    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
    }

    pub fn last_stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn bin(&self, index: usize) -> &[ObjectHandle] {
        &self.bins[index]
    }

    /// Objects waiting in all bins
    pub fn queued(&self) -> usize {
        self.bins.iter().map(Vec::len).sum()
    }

    /// Start a new frame: empty the bins and bump the frame counter
    pub fn reset_bins(&mut self) {
        for bin in &mut self.bins {
            bin.clear();
        }
        self.frame += 1;
    }

    /// Priority bin of an object from its selection, visibility, attachment
    /// state and apparent size. `None` for objects without a flexible volume.
    pub fn bin_for(object: &WorldObject) -> Option<usize> {
        if !object.is_flexible() {
            return None;
        }
        if object.is_selected() {
            return Some(NUM_LOD_BINS - 1);
        }
        if !object.is_visible() {
            return Some(0);
        }

        let top = NUM_LOD_BINS - 2;
        let angle = object.camera().app_angle;
        let mut bin = if angle.is_finite() && angle > 0.0 {
            (1 + (angle * BIN_ANGLE_SCALE) as usize).min(top)
        } else {
            1
        };
        if object.is_attachment() {
            bin = (bin + 1).min(top);
        }
        Some(bin)
    }

    /// Queue `handle` for this frame's pass. An object is queued at most once
    /// per frame; the chosen bin is returned when it was queued.
    pub fn classify(&mut self, handle: ObjectHandle, object: &mut WorldObject) -> Option<usize> {
        let bin = Self::bin_for(object)?;
        let frame = self.frame;
        let volume = object.flexible_mut()?;
        if !volume.mark_classified(frame) {
            return None;
        }
        self.bins[bin].push(handle);
        trace!(bin, "flexible object classified");
        Some(bin)
    }

    /// Time allocation of every bin for this frame. Each non-empty bin gets a
    /// share of the slice weighted by `(index + 1) * log2(count)`.
    pub fn allocations(&self) -> [Duration; NUM_LOD_BINS] {
        let slice = self.settings.time_slice();
        let mut weights = [0.0f32; NUM_LOD_BINS];
        for (i, bin) in self.bins.iter().enumerate() {
            if !bin.is_empty() {
                let log_count = (bin.len() as f32).log2().max(MIN_BIN_WEIGHT);
                weights[i] = (i + 1) as f32 * log_count;
            }
        }
        let total: f32 = weights.iter().sum();

        let mut allocations = [Duration::ZERO; NUM_LOD_BINS];
        if total > 0.0 {
            for (allocation, weight) in allocations.iter_mut().zip(weights) {
                *allocation = slice.mul_f32(weight / total);
            }
        }
        allocations
    }

    /// Drain the bins in priority order, integrating and rebuilding each
    /// object until its bin's allocation or the frame slice runs out.
    ///
    /// `now` is the simulation time in seconds the objects integrate to.
    pub fn run_budgeted_pass(
        &mut self,
        registry: &mut ObjectRegistry,
        wind: &dyn WindField,
        now: f64,
    ) -> SchedulerStats {
        let slice = self.settings.time_slice();
        let max_step = self.settings.max_step_seconds;
        let enabled = self.settings.enabled;
        let allocations = self.allocations();
        let frame = self.frame;

        let mut stats = SchedulerStats {
            frame,
            ..SchedulerStats::default()
        };
        let mut total_spent = Duration::ZERO;

        for bin_index in (0..NUM_LOD_BINS).rev() {
            let budget = allocations[bin_index];
            let mut bin_spent = Duration::ZERO;
            let bin = std::mem::take(&mut self.bins[bin_index]);

            for handle in bin.iter().copied() {
                // Objects can die between classification and the pass
                let Some(object) = registry.get_mut(handle) else {
                    continue;
                };
                let never_updated = object
                    .flexible()
                    .map(|v| v.needs_first_update())
                    .unwrap_or(false);
                let within_budget = enabled && bin_spent < budget && total_spent < slice;
                if !within_budget && !never_updated {
                    stats.deferred += 1;
                    continue;
                }

                let start = self.clock.now();
                let result = object.do_flexible_update(now, max_step, wind, frame);
                let cost = self.clock.now().saturating_sub(start);

                if let Some(Err(e)) = result {
                    stats.nonfinite += 1;
                    warn!("🌿 Flexible object {} reset to rest pose: {}", object.id(), e);
                }

                if within_budget {
                    bin_spent += cost;
                    total_spent += cost;
                    stats.updated += 1;
                    stats.budgeted_time += cost;
                } else {
                    stats.forced += 1;
                    stats.forced_time += cost;
                }
            }

            self.bins[bin_index] = bin;
            if bin_spent > budget {
                stats.overruns += 1;
                trace!(bin = bin_index, ?bin_spent, ?budget, "flexible bin over budget");
            }
        }

        if stats.overruns > 0 || stats.forced > 0 {
            debug!(
                "🌿 Flexible pass {}: {} updated, {} forced, {} deferred, {} bin overrun(s)",
                frame, stats.updated, stats.forced, stats.deferred, stats.overruns
            );
        }
        self.stats = stats;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::flexible::{FlexibleParams, PathParams};
    use crate::world::object::{PCode, RegionHost};
    use crate::world::wind::CalmWind;
    use crate::utils::clock::ManualClock;

    fn host() -> RegionHost {
        RegionHost::new([127, 0, 0, 1], 9000)
    }

    fn flexible_object(registry: &mut ObjectRegistry) -> ObjectHandle {
        let handle = registry.create_viewer_object(PCode::Volume, host());
        let object = registry.get_mut(handle).unwrap();
        object.set_flexible_params(FlexibleParams::default(), PathParams::default());
        handle
    }

    #[test]
    fn test_bin_choice() {
        let mut registry = ObjectRegistry::default();
        let h = flexible_object(&mut registry);
        let object = registry.get_mut(h).unwrap();

        assert_eq!(SchedulerContext::bin_for(object), Some(1));
        object.set_attachment(true);
        assert_eq!(SchedulerContext::bin_for(object), Some(2));
        object.set_visible(false);
        assert_eq!(SchedulerContext::bin_for(object), Some(0));
        object.set_selected(true);
        assert_eq!(SchedulerContext::bin_for(object), Some(NUM_LOD_BINS - 1));

        object.clear_flexible();
        assert_eq!(SchedulerContext::bin_for(object), None);
    }

    #[test]
    fn test_classify_once_per_frame() {
        let mut registry = ObjectRegistry::default();
        let h = flexible_object(&mut registry);
        let mut scheduler = SchedulerContext::new(FlexibleSettings::default());
        scheduler.reset_bins();

        let object = registry.get_mut(h).unwrap();
        assert_eq!(scheduler.classify(h, object), Some(1));
        assert_eq!(scheduler.classify(h, object), None);
        assert_eq!(scheduler.queued(), 1);

        scheduler.reset_bins();
        assert_eq!(scheduler.queued(), 0);
        assert!(scheduler.classify(h, object).is_some());
    }

    #[test]
    fn test_allocations_sum_to_slice() {
        let mut registry = ObjectRegistry::default();
        let mut scheduler = SchedulerContext::new(FlexibleSettings::default());
        scheduler.reset_bins();
        for _ in 0..5 {
            let h = flexible_object(&mut registry);
            let object = registry.get_mut(h).unwrap();
            scheduler.classify(h, object);
        }
        let h = flexible_object(&mut registry);
        let object = registry.get_mut(h).unwrap();
        object.set_selected(true);
        scheduler.classify(h, object);

        let allocations = scheduler.allocations();
        let total: Duration = allocations.iter().sum();
        let slice = scheduler.settings().time_slice();
        assert!(total.as_secs_f64() <= slice.as_secs_f64() + 1e-8);
        assert!(total.as_secs_f64() >= slice.as_secs_f64() * 0.999);
        // Single-object top bin still gets time
        assert!(allocations[NUM_LOD_BINS - 1] > Duration::ZERO);
        assert_eq!(allocations[3], Duration::ZERO);
    }

    #[test]
    fn test_empty_bins_allocate_nothing() {
        let scheduler = SchedulerContext::new(FlexibleSettings::default());
        assert!(scheduler.allocations().iter().all(|a| a.is_zero()));
    }

    #[test]
    fn test_overbudget_pass_defers_updated_objects() {
        let mut registry = ObjectRegistry::default();
        let clock = ManualClock::new(Duration::from_micros(750));
        let mut scheduler = SchedulerContext::with_clock(FlexibleSettings::default(), Box::new(clock));
        let handles: Vec<_> = (0..6).map(|_| flexible_object(&mut registry)).collect();

        // First frame: everything is new and gets updated
        scheduler.reset_bins();
        for h in &handles {
            let object = registry.get_mut(*h).unwrap();
            scheduler.classify(*h, object);
        }
        let stats = scheduler.run_budgeted_pass(&mut registry, &CalmWind, 0.0);
        assert_eq!(stats.updated + stats.forced, 6);

        // Second frame: 0.75 ms per object against a 2 ms slice
        scheduler.reset_bins();
        for h in &handles {
            let object = registry.get_mut(*h).unwrap();
            scheduler.classify(*h, object);
        }
        let stats = scheduler.run_budgeted_pass(&mut registry, &CalmWind, 1.0 / 30.0);
        assert_eq!(stats.forced, 0);
        assert_eq!(stats.updated, 3);
        assert_eq!(stats.deferred, 3);
    }
}
