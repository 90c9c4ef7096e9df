use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

#[test]
fn normalizes_trailing_slash_and_missing_scheme() {
    assert_eq!(
        normalize_api_base("http://localhost:8000/api/"),
        "http://localhost:8000/api"
    );
    assert_eq!(normalize_api_base("npc.local:9000/api"), "http://npc.local:9000/api");
    assert_eq!(normalize_api_base("   "), DEFAULT_API_BASE);
}

#[test]
fn file_overrides_defaults() {
    let mut settings = Settings::default();
    apply_file_overrides(
        &mut settings,
        r#"
api_base = "http://backend:8000/api"
request_timeout_secs = 5
turn_timeout_secs = 20
"#,
    )
    .expect("valid toml");

    assert_eq!(settings.api_base, "http://backend:8000/api");
    assert_eq!(settings.request_timeout(), Duration::from_secs(5));
    assert_eq!(settings.turn_timeout(), Some(Duration::from_secs(20)));
    assert_eq!(settings.log_filter, "info");
}

#[test]
fn malformed_file_is_reported_and_leaves_settings_alone() {
    let mut settings = Settings::default();
    assert!(apply_file_overrides(&mut settings, "request_timeout_secs = \"soon\"").is_err());
    assert_eq!(settings, Settings::default());
}

#[test]
fn env_overrides_file_values_and_skips_unparseable_numbers() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("NPC_CHAT_API_BASE", "http://ignored:1/api"),
        ("APP__API_BASE", "http://winner:2/api"),
        ("NPC_CHAT_TIMEOUT_SECS", "7"),
        ("APP__REQUEST_TIMEOUT_SECS", "not-a-number"),
        ("NPC_CHAT_LOG", "client_core=debug"),
    ]);
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings, |key| vars.get(key).map(|v| v.to_string()));

    assert_eq!(settings.api_base, "http://winner:2/api");
    assert_eq!(settings.request_timeout_secs, 7);
    assert_eq!(settings.turn_timeout_secs, None);
    assert_eq!(settings.log_filter, "client_core=debug");
}

#[test]
fn zero_timeouts_are_clamped_or_disabled() {
    let settings = Settings {
        request_timeout_secs: 0,
        turn_timeout_secs: Some(0),
        ..Settings::default()
    };
    assert_eq!(settings.request_timeout(), Duration::from_secs(1));
    assert_eq!(settings.turn_timeout(), None);
}

fn temp_settings_path(label: &str) -> std::path::PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    env::temp_dir().join(format!("npc_chat_{label}_{suffix}.toml"))
}

#[test]
fn loads_settings_file_from_explicit_path() {
    let path = temp_settings_path("settings");
    fs::write(&path, "log_filter = \"warn\"\napi_base = \"backend:8000/api/\"\n")
        .expect("write settings");

    let (settings, file_error) = load_settings(Some(&path), |_| None);
    assert!(file_error.is_none());
    assert_eq!(settings.log_filter, "warn");
    assert_eq!(settings.api_base, "http://backend:8000/api");

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn malformed_settings_file_is_handed_back_to_the_caller() {
    let path = temp_settings_path("malformed");
    fs::write(&path, "request_timeout_secs = \"soon\"\n").expect("write settings");

    let (settings, file_error) = load_settings(Some(&path), |key| {
        (key == "NPC_CHAT_LOG").then(|| "debug".to_string())
    });
    let err = file_error.expect("malformed file reported");
    assert!(format!("{err:#}").contains("ignoring malformed settings file"));
    assert_eq!(settings.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT.as_secs());
    assert_eq!(settings.log_filter, "debug");

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn missing_settings_file_is_not_an_error() {
    let path = temp_settings_path("absent");
    let (settings, file_error) = load_settings(Some(&path), |_| None);
    assert!(file_error.is_none());
    assert_eq!(settings, Settings::default());
}
