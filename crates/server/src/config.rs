use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::Context;

use crate::hazard::HazardPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub normal_latency_ms: u64,
    pub long_latency_ms: u64,
    pub hazard_window_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8123".into(),
            normal_latency_ms: 1000,
            long_latency_ms: 4000,
            hazard_window_ms: 3000,
        }
    }
}

impl Settings {
    pub fn hazard_policy(&self) -> HazardPolicy {
        HazardPolicy {
            normal: Duration::from_millis(self.normal_latency_ms),
            long: Duration::from_millis(self.long_latency_ms),
            window: Duration::from_millis(self.hazard_window_ms),
        }
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = Path::new("server.toml");
    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        apply_file_overrides(&mut settings, &raw)
            .with_context(|| format!("failed to parse '{}'", path.display()))?;
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg = toml::from_str::<HashMap<String, toml::Value>>(raw)?;

    if let Some(v) = file_cfg.get("bind_addr").and_then(toml::Value::as_str) {
        settings.server_bind = v.to_string();
    }
    if let Some(v) = file_cfg.get("normal_latency_ms") {
        settings.normal_latency_ms = millis_from_toml("normal_latency_ms", v)?;
    }
    if let Some(v) = file_cfg.get("long_latency_ms") {
        settings.long_latency_ms = millis_from_toml("long_latency_ms", v)?;
    }
    if let Some(v) = file_cfg.get("hazard_window_ms") {
        settings.hazard_window_ms = millis_from_toml("hazard_window_ms", v)?;
    }
    Ok(())
}

fn millis_from_toml(key: &str, value: &toml::Value) -> anyhow::Result<u64> {
    value
        .as_integer()
        .and_then(|v| u64::try_from(v).ok())
        .with_context(|| format!("'{key}' must be a non-negative integer"))
}

fn apply_env_overrides(
    settings: &mut Settings,
    var: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = var("APP__NORMAL_LATENCY_MS") {
        settings.normal_latency_ms = parse_millis("APP__NORMAL_LATENCY_MS", &v)?;
    }
    if let Some(v) = var("APP__LONG_LATENCY_MS") {
        settings.long_latency_ms = parse_millis("APP__LONG_LATENCY_MS", &v)?;
    }
    if let Some(v) = var("APP__HAZARD_WINDOW_MS") {
        settings.hazard_window_ms = parse_millis("APP__HAZARD_WINDOW_MS", &v)?;
    }
    Ok(())
}

fn parse_millis(key: &str, raw: &str) -> anyhow::Result<u64> {
    raw.trim()
        .parse::<u64>()
        .with_context(|| format!("{key} must be a whole number of milliseconds, got '{raw}'"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
