use slv_flexi::config::{
    load_layered, load_settings_from, save_settings_to, PerformanceProfile, ViewerSettings,
};
use std::path::PathBuf;
use std::time::Duration;

fn temp_settings_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("slv-flexi-test-{}", uuid::Uuid::new_v4()))
        .join("settings.toml")
}

#[test]
fn test_performance_profiles() {
    for profile in [PerformanceProfile::Low, PerformanceProfile::Balanced, PerformanceProfile::High] {
        let settings = ViewerSettings::for_profile(profile);

        assert_eq!(settings.profile, profile);
        assert!(settings.flexible.enabled);
        assert!(settings.flexible.max_step_seconds > 0.0);
        assert!(settings.objects.lazy_update_slices > 0);

        match profile {
            PerformanceProfile::Low => {
                assert_eq!(settings.flexible_time_slice(), Duration::from_micros(500));
                assert_eq!(settings.objects.orphan_max_age_frames, 900);
            }
            PerformanceProfile::Balanced => {
                assert_eq!(settings, ViewerSettings::default());
                assert_eq!(settings.flexible_time_slice(), Duration::from_millis(2));
            }
            PerformanceProfile::High => {
                assert_eq!(settings.flexible_time_slice(), Duration::from_millis(8));
                assert_eq!(settings.objects.max_cost_requests, 256);
            }
            _ => {}
        }
    }
}

#[test]
fn test_settings_persistence() {
    let path = temp_settings_path();
    let mut original = ViewerSettings::for_profile(PerformanceProfile::High);
    original.flexible.enabled = false;
    original.logging.level = "debug".to_string();

    save_settings_to(&original, &path).expect("settings should save");
    let loaded = load_settings_from(&path).expect("settings should load");
    assert_eq!(loaded, original);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_partial_file_falls_back_to_defaults() {
    let path = temp_settings_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "[flexible]\nframe_time_slice_ms = 3.5\n").unwrap();

    let loaded = load_settings_from(&path).expect("partial settings should load");
    assert_eq!(loaded.flexible.frame_time_slice_ms, 3.5);
    assert_eq!(loaded.flexible.max_step_seconds, 0.2);
    assert_eq!(loaded.objects, ViewerSettings::default().objects);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_layered_loading_reads_file() {
    let path = temp_settings_path();
    let original = ViewerSettings::for_profile(PerformanceProfile::Low);
    save_settings_to(&original, &path).unwrap();

    let layered = load_layered(Some(&path)).expect("layered settings should load");
    assert_eq!(layered.profile, PerformanceProfile::Low);
    assert_eq!(layered.objects.orphan_max_age_frames, 900);
    assert_eq!(layered.flexible.update_factor, 0.5);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_layered_loading_without_file_uses_defaults() {
    let layered = load_layered(None).expect("defaults should load");
    assert_eq!(layered.objects.cleanup_budget_ms, 1.0);
    assert_eq!(layered.flexible.max_step_seconds, 0.2);
}
