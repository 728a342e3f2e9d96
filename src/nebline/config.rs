use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::nebline::registry::Vendor;

include!(concat!(env!("OUT_DIR"), "/nebline_env_allowlist.rs"));

pub const PROJECT_CONFIG_FILE: &str = "nebline.json";
const ENV_PREFIX: &str = "NEBLINE_";

/// Per-project settings read from `nebline.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectConfig {
    pub model: String,
    pub anthropic_api_key: String,
    pub open_ai_api_key: String,
    pub google_api_key: String,
    pub open_router_api_key: String,
}

/// API keys handed to the router on every call. Never persisted here.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub google: Option<String>,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderCredentials")
            .field("openai", &mask(&self.openai))
            .field("anthropic", &mask(&self.anthropic))
            .field("google", &mask(&self.google))
            .finish()
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl ProviderCredentials {
    pub fn for_vendor(&self, vendor: Vendor) -> Option<&str> {
        let key = match vendor {
            Vendor::OpenAi => &self.openai,
            Vendor::Anthropic => &self.anthropic,
            Vendor::Google => &self.google,
        };
        key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

impl ProjectConfig {
    pub fn credentials(&self) -> ProviderCredentials {
        ProviderCredentials {
            openai: non_empty(&self.open_ai_api_key),
            anthropic: non_empty(&self.anthropic_api_key),
            google: non_empty(&self.google_api_key),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        json5::from_str(raw).map_err(|err| anyhow!("invalid project config: {err}"))
    }
}

pub fn project_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_CONFIG_FILE)
}

pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig> {
    let path = project_config_path(project_dir);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    let raw =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    ProjectConfig::parse(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Transport settings shared by every project: endpoints and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub google_base_url: String,
    pub anthropic_version: String,
    pub request_timeout_secs: Option<u64>,
    pub thinking_budget_tokens: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            openai_base_url: "https://api.openai.com".to_string(),
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            google_base_url: "https://generativelanguage.googleapis.com".to_string(),
            anthropic_version: "2023-06-01".to_string(),
            request_timeout_secs: None,
            thinking_budget_tokens: 2000,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn base_url(&self, vendor: Vendor) -> &str {
        let raw = match vendor {
            Vendor::OpenAi => &self.openai_base_url,
            Vendor::Anthropic => &self.anthropic_base_url,
            Vendor::Google => &self.google_base_url,
        };
        raw.trim_end_matches('/')
    }
}

fn lookup_string(lookup: &dyn Fn(&str) -> Option<String>, var: &str) -> Option<String> {
    lookup(var).as_deref().and_then(non_empty)
}

fn lookup_u64(lookup: &dyn Fn(&str) -> Option<String>, var: &str) -> Result<Option<u64>> {
    match lookup_string(lookup, var) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|err| anyhow!("invalid {var}={raw}: {err}")),
        None => Ok(None),
    }
}

fn validate(cfg: &ClientSettings) -> Result<()> {
    for vendor in [Vendor::OpenAi, Vendor::Anthropic, Vendor::Google] {
        let url = cfg.base_url(vendor);
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow!(
                "invalid {} base url `{url}`: must start with http:// or https://",
                vendor.label()
            ));
        }
    }
    if cfg.anthropic_version.trim().is_empty() {
        return Err(anyhow!("invalid anthropic version: cannot be empty"));
    }
    if cfg.request_timeout_secs == Some(0) {
        return Err(anyhow!("invalid request timeout: must be >= 1 second"));
    }
    if cfg.thinking_budget_tokens < 1024 {
        return Err(anyhow!("invalid thinking budget: must be >= 1024 tokens"));
    }
    Ok(())
}

fn resolve_settings_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("NEBLINE_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("nebline").join("nebline.toml"))
}

fn merge_file_settings(base: &mut ClientSettings, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    *base = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse settings {}: {err}", path.display()))?;
    Ok(())
}

fn merge_env_settings(
    cfg: &mut ClientSettings,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(url) = lookup_string(lookup, "NEBLINE_OPENAI_BASE_URL") {
        cfg.openai_base_url = url;
    }
    if let Some(url) = lookup_string(lookup, "NEBLINE_ANTHROPIC_BASE_URL") {
        cfg.anthropic_base_url = url;
    }
    if let Some(url) = lookup_string(lookup, "NEBLINE_GOOGLE_BASE_URL") {
        cfg.google_base_url = url;
    }
    if let Some(version) = lookup_string(lookup, "NEBLINE_ANTHROPIC_VERSION") {
        cfg.anthropic_version = version;
    }
    if let Some(secs) = lookup_u64(lookup, "NEBLINE_REQUEST_TIMEOUT_SECS")? {
        cfg.request_timeout_secs = Some(secs);
    }
    if let Some(budget) = lookup_u64(lookup, "NEBLINE_THINKING_BUDGET")? {
        cfg.thinking_budget_tokens = u32::try_from(budget)
            .map_err(|_| anyhow!("invalid NEBLINE_THINKING_BUDGET={budget}: out of range"))?;
    }
    Ok(())
}

pub fn load_settings_from(
    file: Option<&Path>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<ClientSettings> {
    let mut cfg = ClientSettings::default();
    merge_file_settings(&mut cfg, file)?;
    merge_env_settings(&mut cfg, lookup)?;
    validate(&cfg)?;
    Ok(cfg)
}

pub fn load_settings() -> Result<ClientSettings> {
    warn_unknown_env_vars(env::vars().map(|(k, _)| k));
    let path = resolve_settings_path();
    load_settings_from(path.as_deref(), &|var| env::var(var).ok())
}

fn unknown_env_vars(keys: impl Iterator<Item = String>) -> Vec<String> {
    keys.filter(|k| k.starts_with(ENV_PREFIX))
        .filter(|k| !GENERATED_ENV_ALLOWLIST.contains(&k.as_str()))
        .collect()
}

fn warn_unknown_env_vars(keys: impl Iterator<Item = String>) {
    for key in unknown_env_vars(keys) {
        tracing::warn!(var = %key, "ignoring unknown NEBLINE environment variable");
    }
}
