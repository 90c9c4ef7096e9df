use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use client_core::backend::{DEFAULT_API_BASE, DEFAULT_REQUEST_TIMEOUT};
use serde::Deserialize;

pub const DEFAULT_SETTINGS_FILE: &str = "npc_chat.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base: String,
    pub request_timeout_secs: u64,
    pub turn_timeout_secs: Option<u64>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            turn_timeout_secs: None,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn turn_timeout(&self) -> Option<Duration> {
        self.turn_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base: Option<String>,
    request_timeout_secs: Option<u64>,
    turn_timeout_secs: Option<u64>,
    log_filter: Option<String>,
}

/// Defaults, then the settings file (if present), then environment variables.
/// A malformed file is skipped and handed back so the caller can report it
/// once logging is up.
pub fn load_settings(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> (Settings, Option<anyhow::Error>) {
    let mut settings = Settings::default();
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_FILE));

    let mut file_error = None;
    if let Ok(raw) = fs::read_to_string(path) {
        if let Err(err) = apply_file_overrides(&mut settings, &raw)
            .with_context(|| format!("ignoring malformed settings file {}", path.display()))
        {
            file_error = Some(err);
        }
    }
    apply_env_overrides(&mut settings, env);

    settings.api_base = normalize_api_base(&settings.api_base);
    (settings, file_error)
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) -> Result<(), toml::de::Error> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.api_base {
        settings.api_base = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.turn_timeout_secs {
        settings.turn_timeout_secs = Some(v);
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    Ok(())
}

fn apply_env_overrides(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("NPC_CHAT_API_BASE") {
        settings.api_base = v;
    }
    if let Some(v) = env("APP__API_BASE") {
        settings.api_base = v;
    }

    for key in ["NPC_CHAT_TIMEOUT_SECS", "APP__REQUEST_TIMEOUT_SECS"] {
        if let Some(v) = env(key) {
            if let Ok(parsed) = v.trim().parse::<u64>() {
                settings.request_timeout_secs = parsed;
            }
        }
    }

    if let Some(v) = env("APP__TURN_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.turn_timeout_secs = Some(parsed);
        }
    }

    if let Some(v) = env("NPC_CHAT_LOG") {
        settings.log_filter = v;
    }
}

pub fn normalize_api_base(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Settings::default().api_base;
    }
    if trimmed.contains("://") {
        return trimmed.to_string();
    }
    format!("http://{trimmed}")
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
