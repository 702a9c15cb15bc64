pub mod settings;

// Re-export commonly used types
pub use settings::{
    PerformanceProfile, ViewerSettings, FlexibleSettings, ObjectListSettings,
    LoggingSettings, SettingsError,
    save_settings, load_settings, save_settings_to, load_settings_from, load_layered,
};
