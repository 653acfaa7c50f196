use std::{any::type_name_of_val, fmt, sync::Arc, time::Duration};

use crate::{
    database::repository_ports::MediaRepository, image::SizingPolicy,
    infra::blob::BlobStore,
};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_MAX_ERROR_MESSAGES: usize = 50;

/// Explicitly owned handles to the two external stores, built once at
/// startup and shared by the pipeline and the maintenance runner.
#[derive(Clone)]
pub struct PipelineContext {
    pub blobs: Arc<dyn BlobStore>,
    pub repository: Arc<dyn MediaRepository>,
}

impl PipelineContext {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        repository: Arc<dyn MediaRepository>,
    ) -> Self {
        Self { blobs, repository }
    }
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("blobs", &self.blobs)
            .field("repository", &type_name_of_val(self.repository.as_ref()))
            .finish()
    }
}

/// Tunables for the pipeline and batch runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub policy: SizingPolicy,
    /// Upper bound on every single blob store or repository call.
    pub call_timeout: Duration,
    /// Records processed at once by a batch.
    pub concurrency: usize,
    /// Error strings kept per batch; the rest are only counted.
    pub max_error_messages: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            policy: SizingPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            max_error_messages: DEFAULT_MAX_ERROR_MESSAGES,
        }
    }
}
