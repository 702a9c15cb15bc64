//! Per-frame driver tying the registry, scheduler and wind together.

use std::time::Duration;
use tracing::debug;
use crate::config::ViewerSettings;
use crate::utils::clock::{Clock, SystemClock};
use super::flexible::{SchedulerContext, SchedulerStats};
use super::object_list::{CameraView, ObjectRegistry};
use super::wind::{CalmWind, WindField};

/// Summary of one `World::step_frame`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub flexible: SchedulerStats,
    pub classified: usize,
    pub lod_changes: usize,
    pub cleaned: usize,
    pub orphans_pruned: usize,
}

/// Everything one viewer frame touches
pub struct World {
    pub registry: ObjectRegistry,
    pub scheduler: SchedulerContext,
    wind: Box<dyn WindField>,
    /// Simulation time in seconds
    time: f64,
    /// Registry frames between orphan prunes
    prune_interval: u64,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("registry", &self.registry)
            .field("scheduler", &self.scheduler)
            .field("time", &self.time)
            .finish()
    }
}

impl World {
    pub fn new(settings: &ViewerSettings) -> Self {
        Self::with_clocks(
            settings,
            Box::new(SystemClock::new()),
            Box::new(SystemClock::new()),
        )
    }

    /// World whose scheduler and cleanup budgets use the given clocks
    pub fn with_clocks(
        settings: &ViewerSettings,
        scheduler_clock: Box<dyn Clock>,
        cleanup_clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            registry: ObjectRegistry::with_clock(settings.objects.clone(), cleanup_clock),
            scheduler: SchedulerContext::with_clock(settings.flexible.clone(), scheduler_clock),
            wind: Box::new(CalmWind),
            time: 0.0,
            prune_interval: 64,
        }
    }

    pub fn set_wind(&mut self, wind: Box<dyn WindField>) {
        self.wind = wind;
    }

    pub fn wind(&self) -> &dyn WindField {
        self.wind.as_ref()
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Run one frame of `dt` seconds seen from `camera`
    pub fn step_frame(&mut self, camera: &CameraView, dt: Duration) -> FrameReport {
        self.time += dt.as_secs_f64();
        self.wind.advance(dt.as_secs_f32());
        self.registry.advance_frame();
        self.scheduler.reset_bins();
        self.registry.update_apparent_angles(camera);

        let mut classified = 0;
        let mut lod_changes = 0;
        let active = self.registry.active_objects().to_vec();
        for handle in active {
            let Some(object) = self.registry.get_mut(handle) else {
                continue;
            };
            if object.idle_update_flexible() {
                lod_changes += 1;
            }
            if self.scheduler.classify(handle, object).is_some() {
                classified += 1;
            }
        }

        let flexible = self
            .scheduler
            .run_budgeted_pass(&mut self.registry, self.wind.as_ref(), self.time);

        let cleaned = self.registry.clean_dead_objects(true);
        let orphans_pruned = if self.registry.frame() % self.prune_interval == 0 {
            self.registry.prune_orphans()
        } else {
            0
        };

        if lod_changes > 0 {
            debug!("🌿 {} flexible object(s) changed resolution", lod_changes);
        }

        FrameReport {
            frame: self.registry.frame(),
            flexible,
            classified,
            lod_changes,
            cleaned,
            orphans_pruned,
        }
    }
}
