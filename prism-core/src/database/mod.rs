//! Media record persistence: the repository port and its adapters.

pub mod repositories;
pub mod repository_ports;

#[cfg(feature = "database")]
pub use repositories::PostgresMediaRepository;
pub use repositories::InMemoryMediaRepository;
pub use repository_ports::MediaRepository;

/// Embedded schema migrations for the Postgres adapter.
#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
