use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use prism_core::{
    image::{PolicyError, SizingPolicy},
    pipeline::settings::{
        DEFAULT_CALL_TIMEOUT, DEFAULT_CONCURRENCY, DEFAULT_MAX_ERROR_MESSAGES,
    },
};
use prism_model::Tier;
use thiserror::Error;
use tracing::debug;

use crate::{
    models::{
        BlobBackend, BlobConfig, Config, ConfigMetadata, DatabaseConfig,
        MaintenanceConfig,
    },
    sources::{EnvConfig, FileConfig},
};

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] = ["prism.toml", "config/prism.toml"];
const DEFAULT_BLOB_ROOT: &str = "prism-data/blobs";
const DEFAULT_MAX_CONNECTIONS: u32 = 8;

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

/// Resolves [`Config`] from an optional `.env`, the process environment and
/// an optional TOML file. Environment values win over file values.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file not found at {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid sizing policy: {0}")]
    Sizing(#[from] PolicyError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| ()),
            None => dotenvy::dotenv().map(|_| ()),
        };
        let env_file_loaded = match loaded {
            Ok(()) => true,
            Err(dotenvy::Error::Io(_)) => false,
            Err(err) => return Err(err.into()),
        };

        self.load_with_env(EnvConfig::gather(), env_file_loaded)
    }

    /// Composes configuration from an already-gathered environment; `load`
    /// without touching process state.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
        env_file_loaded: bool,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file, config_path) = self.load_file_config(&env)?;
        let mut warnings = Vec::new();
        if config_path.is_none() {
            warnings.push(
                "No prism.toml found; using environment variables and defaults"
                    .to_string(),
            );
        }

        let mut config = compose(file.unwrap_or_default(), env, &mut warnings)?;
        config.metadata = ConfigMetadata {
            config_path,
            env_file_loaded,
        };
        debug!(?config, "configuration resolved");
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let requested =
            self.options.config_path.as_ref().or(env.config_path.as_ref());

        let path = match requested {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path: path.clone() });
            }
            Some(path) => path.clone(),
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(found) => found,
                None => return Ok((None, None)),
            },
        };

        let file = read_file_config(&path)?;
        Ok((Some(file), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn compose(
    file: FileConfig,
    env: EnvConfig,
    warnings: &mut Vec<String>,
) -> Result<Config, ConfigLoadError> {
    let FileConfig {
        database: file_database,
        blob: file_blob,
        sizing: file_sizing,
        maintenance: file_maintenance,
    } = file;

    let database = DatabaseConfig {
        url: env.database_url.or(file_database.url),
        max_connections: parsed(
            "PRISM_DB_MAX_CONNECTIONS",
            env.database_max_connections,
        )?
        .or(file_database.max_connections)
        .unwrap_or(DEFAULT_MAX_CONNECTIONS),
    };
    if database.max_connections == 0 {
        return Err(invalid("database.max_connections", "0", "must be >= 1"));
    }

    let backend = match env.blob_backend.or(file_blob.backend) {
        Some(raw) => BlobBackend::from_str(&raw).map_err(|reason| {
            ConfigLoadError::InvalidValue {
                key: "blob.backend",
                value: raw,
                reason,
            }
        })?,
        None => BlobBackend::Fs,
    };
    if backend == BlobBackend::Memory && database.url.is_some() {
        // Records would outlive the blobs they reference.
        return Err(invalid(
            "blob.backend",
            backend.as_str(),
            "in-memory blobs cannot back a database-stored media set",
        ));
    }
    if backend == BlobBackend::Memory {
        warnings.push(
            "blob backend is 'memory'; blobs are lost when the process exits"
                .to_string(),
        );
    }
    let blob = BlobConfig {
        backend,
        root: env
            .blob_root
            .or(file_blob.root)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BLOB_ROOT)),
    };

    let defaults = SizingPolicy::default();
    let edge = |tier| defaults.threshold(tier);
    let sizing = SizingPolicy::new(
        parsed("PRISM_TIER_LARGE", env.tier_large)?
            .or(file_sizing.large)
            .unwrap_or(edge(Tier::Large)),
        parsed("PRISM_TIER_MEDIUM", env.tier_medium)?
            .or(file_sizing.medium)
            .unwrap_or(edge(Tier::Medium)),
        parsed("PRISM_TIER_THUMB", env.tier_thumb)?
            .or(file_sizing.thumb)
            .unwrap_or(edge(Tier::Thumb)),
        parsed("PRISM_JPEG_QUALITY", env.jpeg_quality)?
            .or(file_sizing.jpeg_quality)
            .unwrap_or(defaults.jpeg_quality()),
    )?;

    let call_timeout = match env.call_timeout {
        Some(raw) => Some(duration("PRISM_CALL_TIMEOUT", raw)?),
        None => file_maintenance
            .call_timeout
            .map(|raw| duration("maintenance.call_timeout", raw))
            .transpose()?,
    }
    .unwrap_or(DEFAULT_CALL_TIMEOUT);
    if call_timeout.is_zero() {
        return Err(invalid("maintenance.call_timeout", "0s", "must be positive"));
    }

    let concurrency =
        parsed("PRISM_MAINTENANCE_CONCURRENCY", env.maintenance_concurrency)?
            .or(file_maintenance.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
    if concurrency == 0 {
        return Err(invalid("maintenance.concurrency", "0", "must be >= 1"));
    }

    let maintenance = MaintenanceConfig {
        concurrency,
        call_timeout,
        max_error_messages: parsed(
            "PRISM_MAX_ERROR_MESSAGES",
            env.max_error_messages,
        )?
        .or(file_maintenance.max_error_messages)
        .unwrap_or(DEFAULT_MAX_ERROR_MESSAGES),
    };

    Ok(Config {
        database,
        blob,
        sizing,
        maintenance,
        metadata: ConfigMetadata::default(),
    })
}

fn parsed<T>(
    key: &'static str,
    raw: Option<String>,
) -> Result<Option<T>, ConfigLoadError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|err| invalid(key, &value, err.to_string()))
    })
    .transpose()
}

fn duration(key: &'static str, raw: String) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim())
        .map_err(|err| invalid(key, &raw, err.to_string()))
}

fn invalid(
    key: &'static str,
    value: &str,
    reason: impl Into<String>,
) -> ConfigLoadError {
    ConfigLoadError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}
