use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use prism_core::{image::SizingPolicy, pipeline::PipelineSettings};

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub blob: BlobConfig,
    pub sizing: SizingPolicy,
    pub maintenance: MaintenanceConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            policy: self.sizing.clone(),
            call_timeout: self.maintenance.call_timeout,
            concurrency: self.maintenance.concurrency,
            max_error_messages: self.maintenance.max_error_messages,
        }
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // URLs carry credentials.
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobBackend {
    /// Plain files under the root, written atomically.
    Fs,
    /// Integrity-checked cacache store rooted at the root.
    Cacache,
    /// Process memory; nothing survives exit.
    Memory,
}

impl BlobBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            BlobBackend::Fs => "fs",
            BlobBackend::Cacache => "cacache",
            BlobBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for BlobBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlobBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fs" | "file" | "filesystem" => Ok(BlobBackend::Fs),
            "cacache" | "cache" => Ok(BlobBackend::Cacache),
            "memory" | "mem" => Ok(BlobBackend::Memory),
            other => Err(format!(
                "unknown blob backend '{other}' (expected fs, cacache or memory)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlobConfig {
    pub backend: BlobBackend,
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceConfig {
    pub concurrency: usize,
    pub call_timeout: Duration,
    pub max_error_messages: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
