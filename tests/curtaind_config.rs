use std::io::Write;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use ir_curtain::config::{CurtainConfig, DEFAULT_EXTERNAL_PORT, DEFAULT_MOTION_THRESHOLD};
use ir_curtain::ClassifierPolicy;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "CURTAIN_CONFIG",
        "CURTAIN_DEVICE_INDEX",
        "CURTAIN_MOTION_THRESHOLD",
        "CURTAIN_DEADZONE_PERCENT",
        "CURTAIN_POLICY",
        "CURTAIN_EXTERNAL_PORT",
        "CURTAIN_FORWARD_ADDR",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = CurtainConfig::load().expect("load defaults");
    assert_eq!(cfg.device_index, 0);
    assert_eq!(cfg.capture.target_fps, 30);
    assert_eq!((cfg.capture.width, cfg.capture.height), (640, 480));
    assert_eq!(cfg.detection.motion_threshold, DEFAULT_MOTION_THRESHOLD);
    assert_eq!(cfg.detection.deadzone_percent, 15.0);
    assert_eq!(cfg.detection.policy, ClassifierPolicy::ColumnMajority);
    assert!(cfg.external.enabled);
    assert_eq!(cfg.external.port, DEFAULT_EXTERNAL_PORT);
    assert!(cfg.forward_addr.is_none());
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "device_index": 2,
        "capture": { "target_fps": 15, "width": 320, "height": 240 },
        "detection": {
            "motion_threshold": 35,
            "deadzone_percent": 10.0,
            "policy": "pixel-ratio"
        },
        "external": { "port": 30000 },
        "forward_addr": "127.0.0.1:9100"
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("CURTAIN_CONFIG", file.path());
    std::env::set_var("CURTAIN_DEVICE_INDEX", "1");
    std::env::set_var("CURTAIN_DEADZONE_PERCENT", "25");

    let cfg = CurtainConfig::load().expect("load config");

    assert_eq!(cfg.device_index, 1);
    assert_eq!(cfg.capture.target_fps, 15);
    assert_eq!((cfg.capture.width, cfg.capture.height), (320, 240));
    assert_eq!(cfg.detection.motion_threshold, 35);
    assert_eq!(cfg.detection.deadzone_percent, 25.0);
    assert_eq!(cfg.detection.zone_activation_fraction, 0.5);
    assert_eq!(cfg.detection.policy, ClassifierPolicy::PixelRatio);
    assert_eq!(cfg.external.port, 30000);
    assert_eq!(cfg.forward_addr.as_deref(), Some("127.0.0.1:9100"));

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
device_index = 0

[detection]
motion_threshold = 12
column_activation_fraction = 0.05
policy = "column-majority"

[external]
enabled = false
"#;
    file.write_all(toml.as_bytes()).expect("write config");

    std::env::set_var("CURTAIN_POLICY", "pixel");

    let cfg = CurtainConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.detection.motion_threshold, 12);
    assert_eq!(cfg.detection.column_activation_fraction, 0.05);
    assert_eq!(cfg.detection.policy, ClassifierPolicy::PixelRatio);
    assert!(!cfg.external.enabled);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CURTAIN_MOTION_THRESHOLD", "300");
    assert!(CurtainConfig::load().is_err());
    clear_env();

    std::env::set_var("CURTAIN_POLICY", "fuzzy");
    assert!(CurtainConfig::load().is_err());
    clear_env();

    std::env::set_var("CURTAIN_DEADZONE_PERCENT", "150");
    assert!(CurtainConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "capture": { "width": 0 } }"#)
        .expect("write config");
    assert!(CurtainConfig::load_from(Some(file.path())).is_err());

    let mut broken = NamedTempFile::new().expect("temp config");
    broken.write_all(b"{ not json").expect("write config");
    assert!(CurtainConfig::load_from(Some(broken.path())).is_err());

    clear_env();
}
