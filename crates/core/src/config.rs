use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PURGE_KEY_HEADER: &str = "X-Purge-Key";
pub const DEFAULT_CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Resolved settings, built once at start and shared by reference.
///
/// Every optional value has already been normalized: blank strings are
/// `None`, so "is this target configured" is a plain `Option` check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub site_url: Option<String>,
    pub local_cache: LocalCacheSettings,
    pub cloudflare: CloudflareSettings,
    /// Bearer token required by the webhook listener, if set
    pub hook_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCacheSettings {
    pub purge_path: Option<String>,
    pub purge_key: Option<String>,
    pub purge_key_header: String,
    /// `None` means the request may block indefinitely
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudflareSettings {
    pub zone_id: Option<String>,
    pub api_token: Option<String>,
    pub api_base: String,
}

impl CloudflareSettings {
    /// Zone and token, only when both are present
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.zone_id, &self.api_token) {
            (Some(zone), Some(token)) => Some((zone.as_str(), token.as_str())),
            _ => None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site_url: None,
            local_cache: LocalCacheSettings {
                purge_path: None,
                purge_key: None,
                purge_key_header: DEFAULT_PURGE_KEY_HEADER.to_string(),
                timeout: None,
            },
            cloudflare: CloudflareSettings {
                zone_id: None,
                api_token: None,
                api_base: DEFAULT_CLOUDFLARE_API_BASE.to_string(),
            },
            hook_token: None,
        }
    }
}

/// Raw TOML structure; every field optional so env can fill the gaps
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    site_url: Option<String>,
    hook_token: Option<String>,
    #[serde(default)]
    local_cache: RawLocalCache,
    #[serde(default)]
    cloudflare: RawCloudflare,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLocalCache {
    purge_path: Option<String>,
    purge_key: Option<String>,
    purge_key_header: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCloudflare {
    zone_id: Option<String>,
    api_token: Option<String>,
    api_base: Option<String>,
}

/// Load settings from an optional TOML file, then the process environment.
///
/// A `.env` file in the working directory is read first when present.
/// Environment values win over file values; blank environment values are
/// ignored rather than clearing what the file set.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let _ = dotenvy::dotenv();

    let raw = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => RawSettings::default(),
    };

    resolve(raw, |key| std::env::var(key).ok())
}

/// Parse a settings file body without consulting the environment
pub fn parse_settings_toml_str(content: &str) -> Result<Settings> {
    let raw: RawSettings = toml::from_str(content)?;
    resolve(raw, |_| None)
}

/// Build settings from an arbitrary variable lookup (useful for testing)
pub fn settings_from_lookup<F>(lookup: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    resolve(RawSettings::default(), lookup)
}

/// Parse a settings file body, then overlay values from `lookup`
pub fn layered_settings<F>(content: &str, lookup: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let raw: RawSettings = toml::from_str(content)?;
    resolve(raw, lookup)
}

fn resolve<F>(raw: RawSettings, lookup: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str, fallback: Option<String>| -> Option<String> {
        non_blank(lookup(key)).or_else(|| non_blank(fallback))
    };

    let timeout_secs = match non_blank(lookup("PURGE_TIMEOUT_SECS")) {
        Some(value) => Some(value.parse::<u64>().map_err(|e| Error::InvalidValue {
            name: "PURGE_TIMEOUT_SECS".to_string(),
            message: format!("'{}': {}", value, e),
        })?),
        None => raw.local_cache.timeout_secs,
    };

    let site_url = var("SITE_URL", raw.site_url).map(|url| url.trim_end_matches('/').to_string());

    Ok(Settings {
        site_url,
        local_cache: LocalCacheSettings {
            purge_path: var("PURGE_PATH", raw.local_cache.purge_path),
            purge_key: var("PURGE_KEY", raw.local_cache.purge_key),
            purge_key_header: var("PURGE_KEY_HEADER", raw.local_cache.purge_key_header)
                .unwrap_or_else(|| DEFAULT_PURGE_KEY_HEADER.to_string()),
            timeout: timeout_secs.filter(|&s| s > 0).map(Duration::from_secs),
        },
        cloudflare: CloudflareSettings {
            zone_id: var("CLOUDFLARE_ZONE_ID", raw.cloudflare.zone_id),
            api_token: var("CLOUDFLARE_API_TOKEN", raw.cloudflare.api_token),
            api_base: var("CLOUDFLARE_API_BASE", raw.cloudflare.api_base)
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_CLOUDFLARE_API_BASE.to_string()),
        },
        hook_token: var("HOOK_TOKEN", raw.hook_token),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Show only the first few characters of a secret
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    if prefix.chars().count() == secret.chars().count() {
        "****".to_string()
    } else {
        format!("{}****", prefix)
    }
}
