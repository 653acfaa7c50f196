//! Configuration for Prism binaries.
//!
//! Values come from, in increasing precedence: built-in defaults, a TOML
//! file (`--config`, `PRISM_CONFIG`, `./prism.toml` or
//! `./config/prism.toml`), then environment variables (a `.env` file is
//! loaded first when present).

#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod sources;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    BlobBackend, BlobConfig, Config, ConfigMetadata, DatabaseConfig,
    MaintenanceConfig,
};
pub use sources::{EnvConfig, FileConfig};
