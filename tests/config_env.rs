use std::io::Write;

use formpilot::load_config;
use pretty_assertions::assert_eq;
use serial_test::serial;

fn config_file(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[tokio::test]
#[serial]
async fn environment_overrides_win_over_the_file() {
    let file = config_file("tracker:\n  transition_cap: 4\n  stuck_after: 3\n");
    std::env::set_var("FORMPILOT__TRACKER__TRANSITION_CAP", "6");
    std::env::set_var("FORMPILOT__PROFILE__SERVICE_URL", "https://profiles.internal:8443");

    let loaded = load_config(Some(file.path())).await;

    std::env::remove_var("FORMPILOT__TRACKER__TRANSITION_CAP");
    std::env::remove_var("FORMPILOT__PROFILE__SERVICE_URL");

    let loaded = loaded.unwrap();
    assert_eq!(loaded.path.as_deref(), Some(file.path()));
    assert_eq!(loaded.config.tracker.transition_cap, 6);
    assert_eq!(loaded.config.tracker.stuck_after, 3);
    assert_eq!(loaded.config.profile.service_url, "https://profiles.internal:8443");
}

#[tokio::test]
#[serial]
async fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = load_config(Some(&dir.path().join("absent.yaml"))).await.unwrap();
    assert_eq!(loaded.path, None);
    assert_eq!(loaded.config, formpilot::EngineConfig::default());
}

#[tokio::test]
#[serial]
async fn malformed_override_is_an_error() {
    let file = config_file("");
    std::env::set_var("FORMPILOT__INJECTOR__VALIDATION_PASS", "sometimes");

    let result = load_config(Some(file.path())).await;

    std::env::remove_var("FORMPILOT__INJECTOR__VALIDATION_PASS");
    assert!(matches!(result, Err(formpilot::ConfigError::Override { .. })));
}
