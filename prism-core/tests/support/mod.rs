#![allow(dead_code)]

use std::{
    io::Cursor,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, Rgba};
use prism_core::{
    database::{InMemoryMediaRepository, MediaRepository},
    error::{MediaError, Result},
    image::SizingPolicy,
    infra::blob::{BlobStore, MemoryBlobStore},
    maintenance::MaintenanceService,
    pipeline::{PipelineContext, PipelineSettings},
};
use prism_model::{
    BlobPath, ImageDimensions, MediaId, MediaRecord, Tier, VariantSet,
};
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 251) as u8, (y % 241) as u8, ((x ^ y) % 256) as u8])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .expect("encode jpeg fixture");
    buf
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, 0, (y % 256) as u8, 255])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png fixture");
    buf
}

pub fn dims(width: u32, height: u32) -> ImageDimensions {
    ImageDimensions::try_from((width, height)).expect("non-zero fixture dims")
}

/// Small thresholds so tests resize small images.
pub fn small_policy() -> SizingPolicy {
    policy(160, 80, 20)
}

pub fn policy(large: u32, medium: u32, thumb: u32) -> SizingPolicy {
    let nz = |v| std::num::NonZeroU32::new(v).expect("non-zero threshold");
    SizingPolicy::new(nz(large), nz(medium), nz(thumb), 85)
        .expect("valid fixture policy")
}

pub fn settings(policy: SizingPolicy) -> PipelineSettings {
    PipelineSettings {
        policy,
        call_timeout: Duration::from_secs(5),
        concurrency: 4,
        max_error_messages: 50,
    }
}

/// Memory blob store with switchable failures.
#[derive(Debug, Clone, Default)]
pub struct FaultyBlobStore {
    pub inner: MemoryBlobStore,
    fail_writes: Arc<Mutex<Vec<String>>>,
    fail_deletes: Arc<Mutex<Vec<String>>>,
    read_delay: Arc<Mutex<Option<Duration>>>,
    read_trip: Arc<Mutex<Option<(usize, CancellationToken)>>>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl FaultyBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes to any path containing `needle` fail.
    pub fn fail_writes_containing(&self, needle: &str) {
        self.fail_writes.lock().unwrap().push(needle.to_owned());
    }

    pub fn fail_deletes_containing(&self, needle: &str) {
        self.fail_deletes.lock().unwrap().push(needle.to_owned());
    }

    pub fn delay_reads(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    /// Cancel `token` once the `after`-th read has completed.
    pub fn cancel_after_reads(&self, after: usize, token: CancellationToken) {
        *self.read_trip.lock().unwrap() = Some((after, token));
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn heal(&self) {
        self.fail_writes.lock().unwrap().clear();
        self.fail_deletes.lock().unwrap().clear();
        *self.read_delay.lock().unwrap() = None;
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, path: &BlobPath) -> bool {
        self.inner.exists(path).await.unwrap()
    }

    fn matches(rules: &Mutex<Vec<String>>, path: &BlobPath) -> bool {
        rules
            .lock()
            .unwrap()
            .iter()
            .any(|needle| path.as_str().contains(needle.as_str()))
    }
}

#[async_trait]
impl BlobStore for FaultyBlobStore {
    async fn write(&self, path: &BlobPath, bytes: &[u8]) -> Result<()> {
        if Self::matches(&self.fail_writes, path) {
            return Err(MediaError::storage(path.as_str(), "injected write failure"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(path, bytes).await
    }

    async fn read(&self, path: &BlobPath) -> Result<Option<Vec<u8>>> {
        let delay = *self.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let read = self.inner.read(path).await;
        let count = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, token)) = self.read_trip.lock().unwrap().as_ref() {
            if count == *after {
                token.cancel();
            }
        }
        read
    }

    async fn exists(&self, path: &BlobPath) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn delete(&self, path: &BlobPath) -> Result<()> {
        if Self::matches(&self.fail_deletes, path) {
            return Err(MediaError::storage(
                path.as_str(),
                "injected delete failure",
            ));
        }
        self.inner.delete(path).await
    }
}

/// Holds listings until released, so a batch can be caught mid-run.
#[derive(Debug, Clone)]
pub struct ListingGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Semaphore>,
}

impl ListingGate {
    pub fn open(&self) {
        self.release.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

/// In-memory repository with switchable failures.
#[derive(Debug, Clone, Default)]
pub struct FaultyRepository {
    pub inner: InMemoryMediaRepository,
    fail_replace: Arc<AtomicBool>,
    fail_delete: Arc<AtomicBool>,
    fail_list: Arc<AtomicBool>,
    duplicate_listings: Arc<AtomicBool>,
    gate: Arc<Mutex<Option<ListingGate>>>,
}

impl FaultyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_replace(&self, on: bool) {
        self.fail_replace.store(on, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, on: bool) {
        self.fail_delete.store(on, Ordering::SeqCst);
    }

    pub fn fail_list(&self, on: bool) {
        self.fail_list.store(on, Ordering::SeqCst);
    }

    /// Every listing returns each record twice.
    pub fn duplicate_listings(&self, on: bool) {
        self.duplicate_listings.store(on, Ordering::SeqCst);
    }

    pub fn gate_listings(&self) -> ListingGate {
        let gate = ListingGate {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Semaphore::new(0)),
        };
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    async fn listing(&self, records: Vec<MediaRecord>) -> Result<Vec<MediaRecord>> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            let _permit = gate.release.acquire().await.map_err(|err| {
                MediaError::Internal(format!("listing gate closed: {err}"))
            })?;
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(MediaError::Internal("injected listing failure".into()));
        }
        if self.duplicate_listings.load(Ordering::SeqCst) {
            return Ok(records
                .iter()
                .chain(records.iter())
                .cloned()
                .collect());
        }
        Ok(records)
    }
}

#[async_trait]
impl MediaRepository for FaultyRepository {
    async fn get(&self, id: MediaId) -> Result<Option<MediaRecord>> {
        self.inner.get(id).await
    }

    async fn list_missing_dimensions(&self) -> Result<Vec<MediaRecord>> {
        let records = self.inner.list_missing_dimensions().await?;
        self.listing(records).await
    }

    async fn list_all(&self) -> Result<Vec<MediaRecord>> {
        let records = self.inner.list_all().await?;
        self.listing(records).await
    }

    async fn insert(&self, record: &MediaRecord) -> Result<()> {
        self.inner.insert(record).await
    }

    async fn update_dimensions(
        &self,
        id: MediaId,
        dimensions: ImageDimensions,
    ) -> Result<()> {
        self.inner.update_dimensions(id, dimensions).await
    }

    async fn replace_variants(
        &self,
        id: MediaId,
        variants: &VariantSet,
        dimensions: ImageDimensions,
    ) -> Result<()> {
        if self.fail_replace.load(Ordering::SeqCst) {
            return Err(MediaError::RepositoryWrite(
                "injected replace failure".into(),
            ));
        }
        self.inner.replace_variants(id, variants, dimensions).await
    }

    async fn delete(&self, id: MediaId) -> Result<bool> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(MediaError::RepositoryWrite(
                "injected delete failure".into(),
            ));
        }
        self.inner.delete(id).await
    }
}

/// Service plus handles on its stores.
pub struct Harness {
    pub blobs: FaultyBlobStore,
    pub repo: FaultyRepository,
    pub service: MaintenanceService,
}

impl Harness {
    pub fn new(policy: SizingPolicy) -> Self {
        Self::with_settings(settings(policy))
    }

    pub fn with_settings(settings: PipelineSettings) -> Self {
        let blobs = FaultyBlobStore::new();
        let repo = FaultyRepository::new();
        let service = MaintenanceService::new(
            PipelineContext::new(Arc::new(blobs.clone()), Arc::new(repo.clone())),
            settings,
        );
        Self {
            blobs,
            repo,
            service,
        }
    }

    /// A second service over the same stores, e.g. after a policy change.
    pub fn reconfigured(&self, settings: PipelineSettings) -> MaintenanceService {
        MaintenanceService::new(
            PipelineContext::new(
                Arc::new(self.blobs.clone()),
                Arc::new(self.repo.clone()),
            ),
            settings,
        )
    }

    /// Insert a record with unknown dimensions, optionally storing its
    /// original.
    pub async fn seed_unmeasured(
        &self,
        bytes: Option<Vec<u8>>,
        mime_type: &str,
        extension: &str,
    ) -> MediaId {
        let id = MediaId::new();
        let original_ref = BlobPath::original_for(id, extension);
        if let Some(bytes) = bytes {
            self.blobs.inner.write(&original_ref, &bytes).await.unwrap();
        }
        let record = MediaRecord {
            id,
            filename: format!("legacy-{id}.{extension}"),
            mime_type: mime_type.to_owned(),
            original_ref,
            dimensions: None,
            variants: VariantSet::new(),
            created_at: Utc::now(),
        };
        self.repo.inner.insert(&record).await.unwrap();
        id
    }

    pub async fn record(&self, id: MediaId) -> MediaRecord {
        self.repo
            .inner
            .get(id)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("record {id} missing"))
    }
}

pub fn variant_dims(record: &MediaRecord, tier: Tier) -> Option<ImageDimensions> {
    record.variants.get(tier).map(|v| v.dimensions)
}
