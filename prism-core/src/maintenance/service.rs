use std::sync::Arc;

use prism_model::{MediaId, MediaRecord};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    error::Result,
    maintenance::{
        result::{
            BatchResult, CandidateSelector, MaintenanceError,
            MaintenanceOperation,
        },
        runner::{MaintenanceRunner, RunnerConfig},
    },
    pipeline::{DeleteOutcome, MediaPipeline, PipelineContext, PipelineSettings},
};

/// Entry point for callers: single-record operations plus the two
/// maintenance batches.
///
/// Each batch kind holds its own lock for the duration of a run; a second
/// run of the same kind is refused instead of queued. The lock is
/// process-local.
#[derive(Debug, Clone)]
pub struct MaintenanceService {
    pipeline: MediaPipeline,
    runner: MaintenanceRunner,
    repair_lock: Arc<Mutex<()>>,
    reprocess_lock: Arc<Mutex<()>>,
}

impl MaintenanceService {
    pub fn new(context: PipelineContext, settings: PipelineSettings) -> Self {
        let pipeline = MediaPipeline::new(
            context,
            settings.policy.clone(),
            settings.call_timeout,
        );
        let runner =
            MaintenanceRunner::new(pipeline.clone(), RunnerConfig::from(&settings));
        Self {
            pipeline,
            runner,
            repair_lock: Arc::new(Mutex::new(())),
            reprocess_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn pipeline(&self) -> &MediaPipeline {
        &self.pipeline
    }

    pub async fn ingest(
        &self,
        filename: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<MediaRecord> {
        self.pipeline.ingest(filename, mime_type, bytes).await
    }

    pub async fn get(&self, id: MediaId) -> Result<Option<MediaRecord>> {
        self.pipeline.get(id).await
    }

    pub async fn delete_media(&self, id: MediaId) -> DeleteOutcome {
        self.pipeline.delete_by_id(id).await
    }

    /// Measure every record whose dimensions are unknown. Safe to repeat: a
    /// fixed record drops out of the selection.
    pub async fn repair_missing_dimensions(
        &self,
        cancel: &CancellationToken,
    ) -> std::result::Result<BatchResult, MaintenanceError> {
        self.run_exclusive(
            CandidateSelector::MissingDimensions,
            MaintenanceOperation::Repair,
            cancel,
        )
        .await
    }

    /// Regenerate variants for every record, typically after a sizing policy
    /// change.
    pub async fn reprocess_all(
        &self,
        cancel: &CancellationToken,
    ) -> std::result::Result<BatchResult, MaintenanceError> {
        self.run_exclusive(
            CandidateSelector::All,
            MaintenanceOperation::Reprocess,
            cancel,
        )
        .await
    }

    async fn run_exclusive(
        &self,
        selector: CandidateSelector,
        operation: MaintenanceOperation,
        cancel: &CancellationToken,
    ) -> std::result::Result<BatchResult, MaintenanceError> {
        let lock = match operation {
            MaintenanceOperation::Repair => &self.repair_lock,
            MaintenanceOperation::Reprocess => &self.reprocess_lock,
        };
        let _guard = lock
            .try_lock()
            .map_err(|_| MaintenanceError::AlreadyRunning(operation))?;
        self.runner.run_batch(selector, operation, cancel).await
    }
}
