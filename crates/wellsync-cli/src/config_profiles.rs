//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wellsync_core::sync::TenantCredentials;
use wellsync_core::util::normalize_text_option;
use wellsync_core::SyncSettings;

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "cli-config.json";

pub const PROFILE_ENV: &str = "WELLSYNC_PROFILE";
pub const API_URL_ENV: &str = "WELLSYNC_API_URL";
pub const TENANT_ID_ENV: &str = "WELLSYNC_TENANT_ID";
pub const TENANT_SECRET_ENV: &str = "WELLSYNC_TENANT_SECRET";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

/// Where one device profile syncs to. The tenant secret is never stored here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

/// Values pulled from the environment that override a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub api_base_url: Option<String>,
    pub tenant_id: Option<String>,
    pub tenant_secret: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            api_base_url: normalize_text_option(std::env::var(API_URL_ENV).ok()),
            tenant_id: normalize_text_option(std::env::var(TENANT_ID_ENV).ok()),
            tenant_secret: normalize_text_option(std::env::var(TENANT_SECRET_ENV).ok()),
        }
    }
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("wellsync")
        .join(CONFIG_FILE_NAME)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(std::env::var(PROFILE_ENV).ok().as_deref()) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        "default".to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    pub fn api_base_url(&self) -> Option<String> {
        normalize_text_option(self.api_base_url.clone())
    }

    pub fn tenant_id(&self) -> Option<String> {
        normalize_text_option(self.tenant_id.clone())
    }

    fn normalize(&mut self) {
        self.api_base_url = normalize_text_option(self.api_base_url.clone())
            .map(|url| url.trim_end_matches('/').to_string());
        self.tenant_id = normalize_text_option(self.tenant_id.clone());
    }
}

/// Load the saved profile and resolve it against the environment.
pub fn load_remote_config(
    explicit_profile: Option<&str>,
) -> Result<(SyncSettings, TenantCredentials), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(explicit_profile);
    tracing::debug!("Using sync profile '{profile_name}'");
    resolve_remote_config(config.profile(&profile_name), EnvOverrides::from_env())
}

/// Build sync settings and tenant credentials from a profile and the environment.
///
/// Environment values win over the profile.
pub fn resolve_remote_config(
    profile: Option<&CliProfile>,
    overrides: EnvOverrides,
) -> Result<(SyncSettings, TenantCredentials), CliError> {
    let api_base_url = overrides
        .api_base_url
        .or_else(|| profile.and_then(CliProfile::api_base_url))
        .ok_or(CliError::SyncNotConfigured)?;
    let tenant_id = overrides
        .tenant_id
        .or_else(|| profile.and_then(CliProfile::tenant_id))
        .ok_or(CliError::SyncNotConfigured)?;
    let tenant_secret = overrides
        .tenant_secret
        .ok_or(CliError::MissingTenantSecret)?;

    let mut settings = SyncSettings::new(api_base_url);
    if let Some(timeout_ms) = profile.and_then(|profile| profile.request_timeout_ms) {
        settings = settings.with_request_timeout(Duration::from_millis(timeout_ms));
    }
    settings.validate()?;

    Ok((settings, TenantCredentials::new(tenant_id, tenant_secret)))
}
