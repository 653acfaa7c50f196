//! # Prism Core
//!
//! Derived-image pipeline for Prism: every ingested original gets a bounded
//! set of resized variants (`large`, `medium`, `thumb`), and the recorded
//! variant state is kept consistent with the blob store as originals are
//! added, repaired, reprocessed or deleted.
//!
//! ## Feature Flags
//!
//! - `database`: PostgreSQL repository adapter and embedded migrations
//!   (SQLx)
//!
//! ## Architecture
//!
//! - [`image`]: decoding, sizing policy and variant encoding; pure
//! - [`infra::blob`]: the [`BlobStore`](infra::blob::BlobStore) port with
//!   filesystem, cacache and in-memory backends
//! - [`database`]: the [`MediaRepository`](database::MediaRepository) port
//!   with Postgres and in-memory adapters
//! - [`pipeline`]: per-record ingest, repair, reprocess and cascading delete
//! - [`maintenance`]: batch runner and the caller-facing
//!   [`MaintenanceService`](maintenance::MaintenanceService)
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use prism_core::{
//!     database::InMemoryMediaRepository,
//!     infra::blob::MemoryBlobStore,
//!     maintenance::MaintenanceService,
//!     pipeline::{PipelineContext, PipelineSettings},
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! async fn run(bytes: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//!     let context = PipelineContext::new(
//!         Arc::new(MemoryBlobStore::new()),
//!         Arc::new(InMemoryMediaRepository::new()),
//!     );
//!     let service = MaintenanceService::new(context, PipelineSettings::default());
//!
//!     let record = service.ingest("photo.jpg", "image/jpeg", bytes).await?;
//!     println!("{} has {} variants", record.id, record.variants.len());
//!
//!     let batch = service.reprocess_all(&CancellationToken::new()).await?;
//!     println!("reprocessed {} records", batch.succeeded);
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]

pub mod database;
pub mod error;
pub mod image;
pub mod infra;
pub mod maintenance;
pub mod pipeline;

#[cfg(feature = "database")]
pub use database::MIGRATOR;
pub use error::{MediaError, Result};
