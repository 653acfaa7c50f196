use std::{
    any::type_name_of_val, collections::HashSet, fmt, sync::Arc,
    time::Duration,
};

use chrono::Utc;
use prism_model::{BlobPath, ImageDimensions, MediaId, MediaRecord};
use tracing::{debug, info, instrument, warn};

use crate::{
    database::repository_ports::MediaRepository,
    error::{MediaError, Result},
    image::{GeneratedImage, SizingPolicy, VariantGenerator},
    infra::blob::BlobStore,
    pipeline::{
        outcome::{
            CleanupReport, DeleteOutcome, RepairOutcome, ReprocessOutcome,
            ReprocessReport, SkipReason,
        },
        settings::PipelineContext,
        timed::timed,
    },
};

/// Drives the variant generator against the blob store and repository.
///
/// Every store call is bounded by `call_timeout`; decode, resize and encode
/// run on the blocking pool. Per-record operations never return `Err`:
/// failures are folded into their outcome types.
#[derive(Clone)]
pub struct MediaPipeline {
    blobs: Arc<dyn BlobStore>,
    repo: Arc<dyn MediaRepository>,
    generator: Arc<VariantGenerator>,
    call_timeout: Duration,
}

impl fmt::Debug for MediaPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPipeline")
            .field("blobs", &self.blobs)
            .field("repository", &type_name_of_val(self.repo.as_ref()))
            .field("policy", self.generator.policy())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl MediaPipeline {
    pub fn new(
        context: PipelineContext,
        policy: SizingPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            blobs: context.blobs,
            repo: context.repository,
            generator: Arc::new(VariantGenerator::new(policy)),
            call_timeout,
        }
    }

    pub fn generator(&self) -> &VariantGenerator {
        &self.generator
    }

    pub fn repository(&self) -> &Arc<dyn MediaRepository> {
        &self.repo
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub async fn get(&self, id: MediaId) -> Result<Option<MediaRecord>> {
        timed("repository get", self.call_timeout, self.repo.get(id)).await
    }

    pub async fn list_missing_dimensions(&self) -> Result<Vec<MediaRecord>> {
        timed(
            "repository list missing dimensions",
            self.call_timeout,
            self.repo.list_missing_dimensions(),
        )
        .await
    }

    pub async fn list_all(&self) -> Result<Vec<MediaRecord>> {
        timed("repository list", self.call_timeout, self.repo.list_all())
            .await
    }

    /// Store a new upload: decode it, write the original and every variant,
    /// then insert the record. Nothing is inserted unless all blobs it
    /// references were written.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn ingest(
        &self,
        filename: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<MediaRecord> {
        let id = MediaId::new();
        let (generated, bytes) =
            self.generate_blocking(id, bytes, mime_type).await?;
        for failure in &generated.failures {
            warn!(
                media_id = %id,
                tier = %failure.tier,
                "tier left absent: {}",
                failure.message
            );
        }

        let original_ref =
            BlobPath::original_for(id, generated.original_extension());
        let mut written = Vec::with_capacity(generated.variants.len() + 1);

        let writes = std::iter::once((&original_ref, bytes.as_slice())).chain(
            generated
                .variants
                .iter()
                .map(|encoded| (&encoded.variant.path, encoded.bytes.as_slice())),
        );
        for (path, data) in writes {
            if let Err(err) = self.write_blob(path, data).await {
                let cleanup = self.remove_blobs(id, written).await;
                log_cleanup(id, "ingest rollback", &cleanup);
                return Err(err);
            }
            written.push(path.clone());
        }

        let record = MediaRecord {
            id,
            filename: filename.to_owned(),
            mime_type: mime_type.to_owned(),
            original_ref,
            dimensions: Some(generated.original),
            variants: generated.variant_set(),
            created_at: Utc::now(),
        };

        let inserted = timed(
            "repository insert",
            self.call_timeout,
            self.repo.insert(&record),
        )
        .await;
        if let Err(err) = inserted {
            // A timed-out insert may still have committed.
            match self.get(id).await {
                Ok(Some(stored)) => {
                    warn!(
                        media_id = %id,
                        "insert reported {err} but record exists"
                    );
                    return Ok(stored);
                }
                Ok(None) => {
                    let cleanup = self.remove_blobs(id, written).await;
                    log_cleanup(id, "ingest rollback", &cleanup);
                }
                Err(lookup) => {
                    warn!(
                        media_id = %id,
                        "cannot confirm failed insert ({lookup}); leaving {} blobs",
                        written.len()
                    );
                }
            }
            return Err(err);
        }

        info!(
            media_id = %id,
            dimensions = %generated.original,
            variants = record.variants.len(),
            "media ingested"
        );
        Ok(record)
    }

    /// Fill in unknown original dimensions from the stored original.
    #[instrument(skip(self, record), fields(media_id = %record.id))]
    pub async fn repair(&self, record: &MediaRecord) -> RepairOutcome {
        if record.has_dimensions() {
            return RepairOutcome::Skipped(SkipReason::AlreadyMeasured);
        }

        let bytes = match self.read_blob(&record.original_ref).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(path = %record.original_ref, "original missing");
                return RepairOutcome::Skipped(SkipReason::MissingSource);
            }
            Err(err) => return RepairOutcome::Failed(err),
        };

        let generator = Arc::clone(&self.generator);
        let mime_type = record.mime_type.clone();
        let measured = tokio::task::spawn_blocking(move || {
            generator.measure(&bytes, &mime_type)
        })
        .await
        .map_err(|err| {
            MediaError::Internal(format!("Failed to join measure task: {err}"))
        });

        let dimensions = match measured {
            Ok(Ok(dimensions)) => dimensions,
            Ok(Err(MediaError::Decode(message))) => {
                debug!("original unreadable: {message}");
                return RepairOutcome::Skipped(SkipReason::Unreadable);
            }
            Ok(Err(err)) | Err(err) => return RepairOutcome::Failed(err),
        };

        match timed(
            "repository update dimensions",
            self.call_timeout,
            self.repo.update_dimensions(record.id, dimensions),
        )
        .await
        {
            Ok(()) => {
                info!(%dimensions, "dimensions repaired");
                RepairOutcome::Fixed(dimensions)
            }
            Err(err) => RepairOutcome::Failed(err),
        }
    }

    /// Regenerate every variant from the original under the current policy.
    ///
    /// New blobs are written before the record is switched over to them, and
    /// blobs the record stops referencing are removed only afterwards, so the
    /// record never points at a blob that is not there.
    #[instrument(skip(self, record), fields(media_id = %record.id))]
    pub async fn reprocess(&self, record: &MediaRecord) -> ReprocessOutcome {
        let failed = |error| ReprocessOutcome::Failed {
            error,
            cleanup: CleanupReport::default(),
        };

        let bytes = match self.read_blob(&record.original_ref).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                return ReprocessOutcome::Skipped(SkipReason::MissingSource);
            }
            Err(err) => return failed(err),
        };

        let generated = match self
            .generate_blocking(record.id, bytes, &record.mime_type)
            .await
        {
            Ok((generated, _)) => generated,
            Err(err) => return failed(err),
        };

        let previous: HashSet<&BlobPath> = record.variants.paths().collect();
        let mut written = Vec::with_capacity(generated.variants.len());
        for encoded in &generated.variants {
            let path = &encoded.variant.path;
            if let Err(error) = self.write_blob(path, &encoded.bytes).await {
                // Paths still referenced by the record now hold equivalent
                // bytes; only blobs new to this attempt are taken back.
                let fresh = written
                    .into_iter()
                    .filter(|p: &BlobPath| !previous.contains(p))
                    .collect::<Vec<_>>();
                let cleanup = self.remove_blobs(record.id, fresh).await;
                log_cleanup(record.id, "reprocess rollback", &cleanup);
                return ReprocessOutcome::Failed { error, cleanup };
            }
            written.push(path.clone());
        }

        let variants = generated.variant_set();
        let replaced = timed(
            "repository replace variants",
            self.call_timeout,
            self.repo
                .replace_variants(record.id, &variants, generated.original),
        )
        .await;

        if let Err(err) = replaced {
            let fresh: Vec<BlobPath> = written
                .into_iter()
                .filter(|p| !previous.contains(p))
                .collect();

            if matches!(err, MediaError::NotFound(_)) {
                // Deleted underneath us; nothing references the new blobs.
                let cleanup = self.remove_blobs(record.id, fresh).await;
                return ReprocessOutcome::Failed {
                    error: err,
                    cleanup,
                };
            }

            // The update may have committed (timeout), so the new blobs
            // stay put and are reported instead of removed.
            let mut cleanup = CleanupReport::default();
            for path in fresh {
                cleanup.orphan(path, "written before failed repository update");
            }
            let error = if matches!(err, MediaError::RepositoryWrite(_)) {
                err
            } else {
                MediaError::RepositoryWrite(err.to_string())
            };
            warn!("variant swap failed, record keeps previous variants: {error}");
            return ReprocessOutcome::Failed { error, cleanup };
        }

        let current: HashSet<&BlobPath> = variants.paths().collect();
        let stale = record
            .variants
            .paths()
            .filter(|path| !current.contains(path))
            .cloned()
            .collect::<Vec<_>>();
        let cleanup = self.remove_blobs(record.id, stale).await;
        log_cleanup(record.id, "stale variant cleanup", &cleanup);

        info!(
            dimensions = %generated.original,
            variants = variants.len(),
            removed = cleanup.removed.len(),
            "media reprocessed"
        );
        ReprocessOutcome::Processed(ReprocessReport {
            dimensions: generated.original,
            variants,
            tier_failures: generated.failures,
            cleanup,
        })
    }

    /// Remove the record, then every blob it referenced.
    ///
    /// The repository delete is the commit point. Blob removal afterwards is
    /// best-effort and never turns `Deleted` into a failure; leftovers are
    /// listed in the returned report.
    #[instrument(skip(self, record), fields(media_id = %record.id))]
    pub async fn delete(&self, record: &MediaRecord) -> DeleteOutcome {
        let removed = timed(
            "repository delete",
            self.call_timeout,
            self.repo.delete(record.id),
        )
        .await;

        match removed {
            Ok(true) => {}
            Ok(false) => return DeleteOutcome::NotFound,
            Err(err) => {
                warn!("record delete failed, blobs untouched: {err}");
                return DeleteOutcome::Failed(err);
            }
        }

        let cleanup = self.remove_blobs(record.id, record.blob_paths()).await;
        log_cleanup(record.id, "delete", &cleanup);
        info!(removed = cleanup.removed.len(), "media deleted");
        DeleteOutcome::Deleted(cleanup)
    }

    pub async fn delete_by_id(&self, id: MediaId) -> DeleteOutcome {
        match self.get(id).await {
            Ok(Some(record)) => self.delete(&record).await,
            Ok(None) => DeleteOutcome::NotFound,
            Err(err) => DeleteOutcome::Failed(err),
        }
    }

    async fn generate_blocking(
        &self,
        id: MediaId,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<(GeneratedImage, Vec<u8>)> {
        let generator = Arc::clone(&self.generator);
        let mime_type = mime_type.to_owned();
        tokio::task::spawn_blocking(move || {
            generator
                .generate(id, &bytes, &mime_type)
                .map(|generated| (generated, bytes))
        })
        .await
        .map_err(|err| {
            MediaError::Internal(format!("Failed to join generate task: {err}"))
        })?
    }

    async fn read_blob(&self, path: &BlobPath) -> Result<Option<Vec<u8>>> {
        timed("blob read", self.call_timeout, self.blobs.read(path)).await
    }

    async fn write_blob(&self, path: &BlobPath, bytes: &[u8]) -> Result<()> {
        timed("blob write", self.call_timeout, self.blobs.write(path, bytes))
            .await
    }

    async fn remove_blobs(
        &self,
        id: MediaId,
        paths: impl IntoIterator<Item = BlobPath>,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();
        for path in paths {
            match timed(
                "blob delete",
                self.call_timeout,
                self.blobs.delete(&path),
            )
            .await
            {
                Ok(()) => report.removed.push(path),
                Err(err) => {
                    warn!(media_id = %id, %path, "blob left behind: {err}");
                    report.orphan(path, err.to_string());
                }
            }
        }
        report
    }
}

fn log_cleanup(id: MediaId, stage: &str, report: &CleanupReport) {
    if report.is_clean() {
        debug!(
            media_id = %id,
            stage,
            removed = report.removed.len(),
            "cleanup done"
        );
    } else {
        warn!(
            media_id = %id,
            stage,
            removed = report.removed.len(),
            orphaned = report.orphaned.len(),
            "cleanup left orphaned blobs"
        );
    }
}
