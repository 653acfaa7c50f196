use std::{num::NonZeroU32, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Raw configuration as written in `prism.toml`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub blob: FileBlobConfig,
    #[serde(default)]
    pub sizing: FileSizingConfig,
    #[serde(default)]
    pub maintenance: FileMaintenanceConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileBlobConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileSizingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large: Option<NonZeroU32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<NonZeroU32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb: Option<NonZeroU32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jpeg_quality: Option<u8>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileMaintenanceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    /// Human-readable duration, e.g. `"30s"` or `"1m 30s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_error_messages: Option<usize>,
}

/// Environment-derived configuration values, kept raw until composed so a
/// malformed value is reported with its variable name.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<String>,
    pub blob_backend: Option<String>,
    pub blob_root: Option<PathBuf>,
    pub tier_large: Option<String>,
    pub tier_medium: Option<String>,
    pub tier_thumb: Option<String>,
    pub jpeg_quality: Option<String>,
    pub maintenance_concurrency: Option<String>,
    pub call_timeout: Option<String>,
    pub max_error_messages: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name).filter(|value| !value.trim().is_empty())
        };
        Self {
            config_path: var("PRISM_CONFIG").map(PathBuf::from),
            database_url: var("DATABASE_URL"),
            database_max_connections: var("PRISM_DB_MAX_CONNECTIONS"),
            blob_backend: var("PRISM_BLOB_BACKEND"),
            blob_root: var("PRISM_BLOB_ROOT").map(PathBuf::from),
            tier_large: var("PRISM_TIER_LARGE"),
            tier_medium: var("PRISM_TIER_MEDIUM"),
            tier_thumb: var("PRISM_TIER_THUMB"),
            jpeg_quality: var("PRISM_JPEG_QUALITY"),
            maintenance_concurrency: var("PRISM_MAINTENANCE_CONCURRENCY"),
            call_timeout: var("PRISM_CALL_TIMEOUT"),
            max_error_messages: var("PRISM_MAX_ERROR_MESSAGES"),
        }
    }
}
