use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

use crate::mutation::DEFAULT_RESET_DELAY;

pub const SETTINGS_FILE: &str = "ledger.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub token_path: PathBuf,
    pub request_timeout_secs: u64,
    pub reset_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/v1".into(),
            token_path: default_token_path(),
            request_timeout_secs: 15,
            reset_delay_ms: DEFAULT_RESET_DELAY.as_millis() as u64,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.api_base_url)
            .with_context(|| format!("invalid api_base_url '{}'", self.api_base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("api_base_url must start with http:// or https://");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

fn default_token_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ledger-client")
        .join("session.json")
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    token_path: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
    reset_delay_ms: Option<u64>,
}

/// Defaults, then `ledger.toml` in the working directory, then environment.
pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
        apply_file_settings(&mut settings, file_cfg);
    }

    apply_env_overrides(&mut settings, env)?;
    settings.validate()?;
    Ok(settings)
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.token_path {
        settings.token_path = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.reset_delay_ms {
        settings.reset_delay_ms = v;
    }
}

/// `APP__*` names win over the plain ones when both are set.
fn apply_env_overrides(
    settings: &mut Settings,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    let lookup = |plain: &str, prefixed: &str| env(prefixed).or_else(|| env(plain));

    if let Some(v) = lookup("LEDGER_API_URL", "APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("LEDGER_TOKEN_PATH", "APP__TOKEN_PATH") {
        settings.token_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("LEDGER_REQUEST_TIMEOUT_SECS", "APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v
            .parse()
            .with_context(|| format!("invalid request timeout '{v}'"))?;
    }
    if let Some(v) = lookup("LEDGER_RESET_DELAY_MS", "APP__RESET_DELAY_MS") {
        settings.reset_delay_ms = v
            .parse()
            .with_context(|| format!("invalid reset delay '{v}'"))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
