use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use roomreel_kernel::config::ReelConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ROOMREEL_CONFIG",
        "ROOMREEL_HEURISTIC_INTERVAL_MS",
        "ROOMREEL_ML_INTERVAL_MS",
        "ROOMREEL_MATCH_THRESHOLD",
        "ROOMREEL_MAX_RECORDING_SECS",
        "ROOMREEL_DETECTOR_MODEL",
        "ROOMREEL_EMBEDDING_MODEL",
        "ROOMREEL_PATTERNS",
        "ROOMREEL_JITTER",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "sampling": { "heuristic_interval_ms": 250, "ml_interval_ms": 1500 },
        "scoring": { "match_threshold": 0.9, "match_points": 30, "jitter": false },
        "session": { "countdown_ticks": 5, "max_recording_secs": 45 },
        "models": { "detector_path": "models/ssd.onnx", "input_size": 320 },
        "reference_root": "public"
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("ROOMREEL_CONFIG", file.path());
    std::env::set_var("ROOMREEL_ML_INTERVAL_MS", "800");
    std::env::set_var("ROOMREEL_EMBEDDING_MODEL", "models/mobilenet.onnx");

    let cfg = ReelConfig::load().expect("load config");

    assert_eq!(cfg.sampling.heuristic_interval_ms, 250);
    assert_eq!(cfg.sampling.ml_interval_ms, 800);
    assert_eq!(cfg.scoring.match_threshold, 0.9);
    assert_eq!(cfg.scoring.detection_threshold, 0.4);
    assert!(!cfg.scoring.jitter);
    assert_eq!(cfg.scoring_settings().match_points, 30);
    assert_eq!(cfg.session_settings().countdown_ticks, 5);
    assert_eq!(cfg.session_settings().max_recording_ms, 45_000);
    assert_eq!(cfg.models.input_size, 320);
    assert_eq!(
        cfg.models.detector_path.as_deref(),
        Some(std::path::Path::new("models/ssd.onnx"))
    );
    assert_eq!(
        cfg.models.embedding_path.as_deref(),
        Some(std::path::Path::new("models/mobilenet.onnx"))
    );
    assert_eq!(cfg.reference_root, std::path::PathBuf::from("public"));

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
        [sampling]
        heuristic_interval_ms = 100

        [session]
        countdown_tick_ms = 500
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("ROOMREEL_CONFIG", file.path());

    let cfg = ReelConfig::load().expect("load config");
    assert_eq!(cfg.sampling.heuristic_interval_ms, 100);
    assert_eq!(cfg.sampling.ml_interval_ms, 1000);
    assert_eq!(cfg.session.countdown_tick_ms, 500);

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ReelConfig::load().expect("load defaults");
    assert_eq!(cfg, ReelConfig::default());
    assert_eq!(cfg.sampling.heuristic_interval_ms, 200);
    assert_eq!(cfg.scoring.match_interval_ms, 3000);
    assert_eq!(cfg.session.max_recording_secs, 60);
    assert!(cfg.patterns_path.is_none());
    assert!(cfg.pattern_table().expect("builtin table").patterns("room-tour").len() >= 3);
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ROOMREEL_MATCH_THRESHOLD", "1.2");
    assert!(ReelConfig::load().is_err());
    clear_env();

    std::env::set_var("ROOMREEL_HEURISTIC_INTERVAL_MS", "0");
    assert!(ReelConfig::load().is_err());
    clear_env();

    std::env::set_var("ROOMREEL_MAX_RECORDING_SECS", "soon");
    assert!(ReelConfig::load().is_err());
    clear_env();

    std::env::set_var("ROOMREEL_JITTER", "maybe");
    assert!(ReelConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_malformed_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ \"sampling\": 5 }").expect("write config");
    std::env::set_var("ROOMREEL_CONFIG", file.path());
    assert!(ReelConfig::load().is_err());

    std::env::set_var("ROOMREEL_CONFIG", "/nonexistent/roomreel.json");
    assert!(ReelConfig::load().is_err());

    clear_env();
}

#[test]
fn custom_pattern_table_is_loaded() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut patterns = Builder::new().suffix(".toml").tempfile().expect("temp patterns");
    let toml = r#"
        [[garage]]
        name = "toolbox"
        red = [150, 255]
        green = [0, 80]
        blue = [0, 80]
        edge_pattern = 0.4
        brightness = [60.0, 200.0]
    "#;
    std::io::Write::write_all(&mut patterns, toml.as_bytes()).expect("write patterns");
    std::env::set_var("ROOMREEL_PATTERNS", patterns.path());

    let cfg = ReelConfig::load().expect("load config");
    let table = cfg.pattern_table().expect("pattern table");
    assert_eq!(table.patterns("garage").len(), 1);
    assert_eq!(table.patterns("garage")[0].name, "toolbox");
    assert!(table.patterns("room-tour").is_empty());

    clear_env();
}
