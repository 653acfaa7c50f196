pub mod memory;
#[cfg(feature = "database")]
pub mod media;

#[cfg(feature = "database")]
pub use media::PostgresMediaRepository;
pub use memory::InMemoryMediaRepository;
