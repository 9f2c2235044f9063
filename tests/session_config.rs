use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use ppe_witness::config::SessionConfig;
use ppe_witness::{ClassLabel, ViolationPolicy};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PPE_CONFIG",
        "PPE_POLICY",
        "PPE_ARTIFACT_DIR",
        "PPE_THROTTLE_SECS",
        "PPE_SNAPSHOT_INTERVAL",
        "PPE_IOU_THRESHOLD",
        "PPE_THRESHOLDS",
    ] {
        std::env::remove_var(key);
    }
}

fn config_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SessionConfig::load().expect("load defaults");

    assert_eq!(cfg.policy, ViolationPolicy::PerPerson);
    assert_eq!(cfg.throttle_interval, Duration::from_secs(8));
    assert_eq!(cfg.snapshot_interval, 70);
    assert_eq!(cfg.iou_threshold, 0.2);
    assert_eq!(cfg.required_equipment, vec![ClassLabel::Hardhat]);
    assert_eq!(cfg.artifacts.dir.to_str(), Some("violator_images"));
    assert_eq!(cfg.artifacts.crop_size, (150, 200));
    assert!(cfg.artifacts.clear_on_start);
    assert_eq!(cfg.fps, 25.0);
    for label in [
        ClassLabel::Person,
        ClassLabel::Hardhat,
        ClassLabel::FaceMask,
        ClassLabel::SafetyVest,
    ] {
        assert_eq!(cfg.thresholds.get(label), Some(0.5));
    }
    assert!(cfg.report_path.is_none());
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".json",
        r#"{
            "policy": "count-deficit",
            "thresholds": { "Person": 0.6, "Hardhat": 0.4 },
            "iou_threshold": 0.3,
            "throttle": { "min_interval_secs": 4.5 },
            "artifacts": { "dir": "site_a", "clear_on_start": false, "crop_width": 96 },
            "source": { "fps": 30 },
            "report_path": "reports/site_a.json"
        }"#,
    );

    std::env::set_var("PPE_CONFIG", file.path());
    std::env::set_var("PPE_ARTIFACT_DIR", "site_b");
    std::env::set_var("PPE_THRESHOLDS", "hardhat=0.7, safety vest=0.55");

    let cfg = SessionConfig::load().expect("load config");

    assert_eq!(cfg.policy, ViolationPolicy::CountDeficit);
    assert_eq!(cfg.snapshot_interval, 80);
    assert_eq!(cfg.iou_threshold, 0.3);
    assert_eq!(cfg.throttle_interval, Duration::from_millis(4500));
    assert_eq!(cfg.thresholds.get(ClassLabel::Person), Some(0.6));
    assert_eq!(cfg.thresholds.get(ClassLabel::Hardhat), Some(0.7));
    assert_eq!(cfg.thresholds.get(ClassLabel::SafetyVest), Some(0.55));
    assert_eq!(cfg.artifacts.dir.to_str(), Some("site_b"));
    assert!(!cfg.artifacts.clear_on_start);
    assert_eq!(cfg.artifacts.crop_size, (96, 200));
    assert_eq!(cfg.fps, 30.0);
    assert_eq!(
        cfg.report_path.as_deref().and_then(|p| p.to_str()),
        Some("reports/site_a.json")
    );

    let store = cfg.store_config();
    assert_eq!(store.root.to_str(), Some("site_b"));
    assert!(!store.clear_on_start);

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".toml",
        r#"
policy = "presence"
required_equipment = ["hardhat", "vest"]

[throttle]
min_interval_secs = 2
snapshot_interval = 25
"#,
    );

    std::env::set_var("PPE_POLICY", "per-person");
    std::env::set_var("PPE_SNAPSHOT_INTERVAL", "50");

    let cfg = SessionConfig::load_from(Some(file.path())).expect("load toml");

    assert_eq!(cfg.policy, ViolationPolicy::PerPerson);
    assert_eq!(cfg.snapshot_interval, 50);
    assert_eq!(cfg.throttle_interval, Duration::from_secs(2));
    assert_eq!(
        cfg.required_equipment,
        vec![ClassLabel::Hardhat, ClassLabel::SafetyVest]
    );

    let settings = cfg.pipeline_settings().expect("pipeline settings");
    assert_eq!(settings.policy, ViolationPolicy::PerPerson);
    assert_eq!(
        settings.required_equipment.classes(),
        &[ClassLabel::Hardhat, ClassLabel::SafetyVest]
    );

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    for contents in [
        r#"{ "policy": "strict" }"#,
        r#"{ "thresholds": { "Person": 1.5 } }"#,
        r#"{ "thresholds": { "Forklift": 0.5 } }"#,
        r#"{ "iou_threshold": -0.1 }"#,
        r#"{ "throttle": { "snapshot_interval": 0 } }"#,
        r#"{ "throttle": { "min_interval_secs": -1 } }"#,
        r#"{ "required_equipment": [] }"#,
        r#"{ "required_equipment": ["person"] }"#,
        r#"{ "source": { "fps": 0 } }"#,
    ] {
        let file = config_file(".json", contents);
        assert!(
            SessionConfig::load_from(Some(file.path())).is_err(),
            "accepted {}",
            contents
        );
    }

    std::env::set_var("PPE_THROTTLE_SECS", "soon");
    assert!(SessionConfig::load().is_err());
    clear_env();

    std::env::set_var("PPE_THRESHOLDS", "hardhat");
    assert!(SessionConfig::load().is_err());
    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.json");
    assert!(SessionConfig::load_from(Some(&missing)).is_err());
}

#[test]
fn oversized_throttle_interval_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PPE_THROTTLE_SECS", "1e30");
    assert!(SessionConfig::load().is_err());
    clear_env();

    let file = config_file(".json", r#"{ "throttle": { "min_interval_secs": 1e300 } }"#);
    assert!(SessionConfig::load_from(Some(file.path())).is_err());
}

#[test]
fn snapshot_interval_follows_the_final_policy() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PPE_POLICY", "presence");
    let cfg = SessionConfig::load().expect("load config");
    assert_eq!(cfg.policy, ViolationPolicy::Presence);
    assert_eq!(
        cfg.snapshot_interval,
        ViolationPolicy::Presence.default_snapshot_interval()
    );
    assert_eq!(cfg.snapshot_interval, 80);
    clear_env();

    let file = config_file(".json", r#"{ "policy": "count-deficit" }"#);
    std::env::set_var("PPE_POLICY", "per-person");
    let mut cfg = SessionConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.snapshot_interval, 70);

    cfg.set_policy(ViolationPolicy::CountDeficit);
    assert_eq!(cfg.snapshot_interval, 80);
    clear_env();
}

#[test]
fn explicit_snapshot_interval_survives_policy_changes() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(".json", r#"{ "throttle": { "snapshot_interval": 30 } }"#);
    std::env::set_var("PPE_POLICY", "presence");
    let mut cfg = SessionConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.snapshot_interval, 30);

    cfg.set_policy(ViolationPolicy::PerPerson);
    assert_eq!(cfg.snapshot_interval, 30);
    clear_env();
}
