use std::fs;
use std::path::{Path, PathBuf};
use directories::ProjectDirs;
use serde::{Serialize, Deserialize};
use thiserror::Error;

const SETTINGS_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "SLV_FLEXI";

/// Upper bound on any per-frame budget read from settings
const MAX_BUDGET_MS: f32 = 1000.0;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode settings: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Failed to decode settings: {0}")]
    Decode(#[from] toml::de::Error),

    #[error("Layered configuration error: {0}")]
    Layered(#[from] config::ConfigError),

    #[error("No configuration directory available on this platform")]
    NoConfigDir,
}

// =============================================================================
// Performance Configuration System
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceProfile {
    Low,      // Optimized for low-end hardware
    Balanced, // Default for mid-range systems
    High,     // Maximum quality for high-end hardware
    Custom,   // User-defined granular controls
}

impl Default for PerformanceProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

/// Flexible object simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlexibleSettings {
    /// When false only never-updated objects are simulated
    pub enabled: bool,
    /// Global quality factor scaling the per-frame time slice
    pub update_factor: f32,
    /// Per-frame time slice for all flexible updates, before `update_factor`
    pub frame_time_slice_ms: f32,
    /// Longest simulated step, regardless of frame hitches
    pub max_step_seconds: f32,
}

impl Default for FlexibleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            update_factor: 1.0,
            frame_time_slice_ms: 2.0,
            max_step_seconds: 0.2,
        }
    }
}

/// Object list lifecycle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectListSettings {
    /// Time budget for one timed dead-object sweep
    pub cleanup_budget_ms: f32,
    /// Registry frames an orphan record survives before pruning
    pub orphan_max_age_frames: u64,
    /// Number of slices the lazy apparent-angle update cycles through
    pub lazy_update_slices: usize,
    /// Maximum stale object costs handed out per request batch
    pub max_cost_requests: usize,
}

impl Default for ObjectListSettings {
    fn default() -> Self {
        Self {
            cleanup_budget_ms: 1.0,
            orphan_max_age_frames: 1800,
            lazy_update_slices: 16,
            max_cost_requests: 128,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub profile: PerformanceProfile,
    pub flexible: FlexibleSettings,
    pub objects: ObjectListSettings,
    pub logging: LoggingSettings,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            profile: PerformanceProfile::default(),
            flexible: FlexibleSettings::default(),
            objects: ObjectListSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl ViewerSettings {
    pub fn for_profile(profile: PerformanceProfile) -> Self {
        let (flexible, objects) = match profile {
            PerformanceProfile::Low => (
                FlexibleSettings {
                    enabled: true,
                    update_factor: 0.5,
                    frame_time_slice_ms: 1.0,
                    max_step_seconds: 0.2,
                },
                ObjectListSettings {
                    cleanup_budget_ms: 0.5,
                    orphan_max_age_frames: 900,
                    lazy_update_slices: 32,
                    max_cost_requests: 64,
                },
            ),
            PerformanceProfile::Balanced => (
                FlexibleSettings::default(),
                ObjectListSettings::default(),
            ),
            PerformanceProfile::High => (
                FlexibleSettings {
                    enabled: true,
                    update_factor: 2.0,
                    frame_time_slice_ms: 4.0,
                    max_step_seconds: 0.2,
                },
                ObjectListSettings {
                    cleanup_budget_ms: 2.0,
                    orphan_max_age_frames: 3600,
                    lazy_update_slices: 8,
                    max_cost_requests: 256,
                },
            ),
            PerformanceProfile::Custom => {
                // For custom, return defaults that user can modify
                (FlexibleSettings::default(), ObjectListSettings::default())
            }
        };

        Self {
            profile,
            flexible,
            objects,
            logging: LoggingSettings::default(),
        }
    }

    /// Per-frame flexible budget after the quality factor is applied
    pub fn flexible_time_slice(&self) -> std::time::Duration {
        self.flexible.time_slice()
    }
}

/// Milliseconds to a budget, with NaN as zero and huge values capped
fn budget_from_ms(ms: f32) -> std::time::Duration {
    let ms = ms.max(0.0).min(MAX_BUDGET_MS);
    std::time::Duration::try_from_secs_f32(ms / 1000.0).unwrap_or_default()
}

impl FlexibleSettings {
    pub fn time_slice(&self) -> std::time::Duration {
        budget_from_ms(self.frame_time_slice_ms * self.update_factor)
    }
}

impl ObjectListSettings {
    pub fn cleanup_budget(&self) -> std::time::Duration {
        budget_from_ms(self.cleanup_budget_ms)
    }
}

// Settings file management
fn settings_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "slv", "slv-flexi")
        .map(|proj| proj.config_dir().join(SETTINGS_FILE))
}

pub fn save_settings_to(settings: &ViewerSettings, path: &Path) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let toml = toml::to_string_pretty(settings)?;
    fs::write(path, toml)?;
    Ok(())
}

pub fn load_settings_from(path: &Path) -> Result<ViewerSettings, SettingsError> {
    let data = fs::read_to_string(path)?;
    Ok(toml::from_str::<ViewerSettings>(&data)?)
}

pub fn save_settings(settings: &ViewerSettings) -> Result<(), SettingsError> {
    let path = settings_path().ok_or(SettingsError::NoConfigDir)?;
    save_settings_to(settings, &path)
}

pub fn load_settings() -> Option<ViewerSettings> {
    let path = settings_path()?;
    match load_settings_from(&path) {
        Ok(settings) => Some(settings),
        Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!("Ignoring unreadable settings at {}: {}", path.display(), e);
            None
        }
    }
}

/// Build settings from defaults, an optional TOML file and `SLV_FLEXI__*`
/// environment variables, in increasing priority.
pub fn load_layered(file: Option<&Path>) -> Result<ViewerSettings, SettingsError> {
    let defaults = match file.and_then(|p| p.exists().then(|| load_settings_from(p))) {
        Some(Ok(from_file)) => from_file,
        Some(Err(e)) => return Err(e),
        None => ViewerSettings::default(),
    };

    let layered = config::Config::builder()
        .add_source(config::Config::try_from(&defaults)?)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(layered.try_deserialize::<ViewerSettings>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_budgets_are_capped() {
        let flexible = FlexibleSettings {
            frame_time_slice_ms: f32::INFINITY,
            ..FlexibleSettings::default()
        };
        assert_eq!(flexible.time_slice(), std::time::Duration::from_secs(1));

        let overflowing = FlexibleSettings {
            frame_time_slice_ms: f32::MAX,
            update_factor: f32::MAX,
            ..FlexibleSettings::default()
        };
        assert_eq!(overflowing.time_slice(), std::time::Duration::from_secs(1));

        let nan = FlexibleSettings {
            frame_time_slice_ms: f32::NAN,
            ..FlexibleSettings::default()
        };
        assert_eq!(nan.time_slice(), std::time::Duration::ZERO);

        let objects = ObjectListSettings {
            cleanup_budget_ms: f32::INFINITY,
            ..ObjectListSettings::default()
        };
        assert_eq!(objects.cleanup_budget(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_time_slice_scales_with_quality() {
        let mut flexible = FlexibleSettings::default();
        flexible.frame_time_slice_ms = 2.0;
        flexible.update_factor = 2.0;
        assert_eq!(flexible.time_slice(), std::time::Duration::from_millis(4));

        flexible.update_factor = -1.0;
        assert_eq!(flexible.time_slice(), std::time::Duration::ZERO);
    }

    #[test]
    fn test_profiles_order_budgets() {
        let low = ViewerSettings::for_profile(PerformanceProfile::Low);
        let high = ViewerSettings::for_profile(PerformanceProfile::High);
        assert!(low.flexible_time_slice() < high.flexible_time_slice());
        assert!(low.objects.orphan_max_age_frames < high.objects.orphan_max_age_frames);
    }
}
