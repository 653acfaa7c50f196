use std::collections::HashSet;

use futures::{StreamExt, stream};
use prism_model::{MediaId, MediaRecord};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    maintenance::result::{
        BatchResult, CandidateSelector, MaintenanceError, MaintenanceOperation,
    },
    pipeline::{MediaPipeline, PipelineSettings, RecordOutcome},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    pub concurrency: usize,
    pub max_error_messages: usize,
}

impl From<&PipelineSettings> for RunnerConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            concurrency: settings.concurrency,
            max_error_messages: settings.max_error_messages,
        }
    }
}

/// Enumerates candidates and runs one pipeline operation over each of them
/// through a bounded worker pool. A record's failure never stops the batch.
#[derive(Debug, Clone)]
pub struct MaintenanceRunner {
    pipeline: MediaPipeline,
    config: RunnerConfig,
}

enum Visit {
    Done(Box<dyn RecordOutcome>),
    Cancelled,
}

impl MaintenanceRunner {
    pub fn new(pipeline: MediaPipeline, config: RunnerConfig) -> Self {
        Self { pipeline, config }
    }

    pub fn config(&self) -> RunnerConfig {
        self.config
    }

    pub async fn run_batch(
        &self,
        selector: CandidateSelector,
        operation: MaintenanceOperation,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, MaintenanceError> {
        let listed = match selector {
            CandidateSelector::MissingDimensions => {
                self.pipeline.list_missing_dimensions().await
            }
            CandidateSelector::All => self.pipeline.list_all().await,
        }
        .map_err(MaintenanceError::Enumeration)?;

        let candidates = dedupe(listed);
        info!(
            %operation,
            ?selector,
            candidates = candidates.len(),
            concurrency = self.config.concurrency,
            "maintenance batch started"
        );

        let mut result = BatchResult::new(operation, candidates.len());
        let mut visits = stream::iter(candidates)
            .map(|record| {
                let cancel = cancel.clone();
                async move {
                    // Checked when the record is picked up, not when queued.
                    if cancel.is_cancelled() {
                        return (record.id, Visit::Cancelled);
                    }
                    let outcome: Box<dyn RecordOutcome> = match operation {
                        MaintenanceOperation::Repair => {
                            Box::new(self.pipeline.repair(&record).await)
                        }
                        MaintenanceOperation::Reprocess => {
                            Box::new(self.pipeline.reprocess(&record).await)
                        }
                    };
                    (record.id, Visit::Done(outcome))
                }
            })
            .buffer_unordered(self.config.concurrency.max(1));

        while let Some((id, visit)) = visits.next().await {
            match visit {
                Visit::Done(outcome) => result.record(
                    id,
                    outcome.as_ref(),
                    self.config.max_error_messages,
                ),
                Visit::Cancelled => result.cancelled = true,
            }
        }

        if result.cancelled {
            warn!(
                %operation,
                processed = result.processed(),
                candidates = result.candidates,
                "maintenance batch cancelled"
            );
        } else {
            info!(
                %operation,
                succeeded = result.succeeded,
                failed = result.failed,
                skipped = result.skipped,
                orphaned_blobs = result.orphaned_blobs,
                "maintenance batch finished"
            );
        }
        Ok(result)
    }
}

/// Keep the first occurrence of each id so no record is scheduled twice.
fn dedupe(records: Vec<MediaRecord>) -> Vec<MediaRecord> {
    let mut seen: HashSet<MediaId> = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert(record.id))
        .collect()
}
