//! Infrastructure adapters (storage backends).

pub mod blob;
