//! Bounded-concurrency download/copy dispatch over a manifest's layers.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use regex::Regex;
use std::sync::LazyLock;
use tokio::{
    fs,
    sync::{Mutex, Semaphore},
    task::JoinSet,
};
use vmpull_utils::{
    digest_to_filename, CONFIG_FILENAME, DEFAULT_DOWNLOAD_CONCURRENCY, DISK_IMAGE_FILENAME,
    NVRAM_FILENAME,
};

use crate::{
    oci::{cache::CacheStore, model::Layer, registry::RegistryClient, singleflight::SingleFlight},
    VmPullError, VmPullResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const EMPTY_MEDIA_TYPE: &str = "application/vnd.oci.empty.v1+json";
const DISK_MEDIA_TYPE: &str = "application/vnd.oci.image.layer.v1.tar";
const CONFIG_MEDIA_TYPE: &str = "application/vnd.oci.image.config.v1+json";
const NVRAM_MEDIA_TYPE: &str = "application/octet-stream";

static DISK_PART_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"part\.number=(\d+);part\.total=(\d+)").unwrap());

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Where a reassembled disk part's bytes actually live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartSource {
    /// The part's bytes live in the pull's staging directory; ephemeral.
    Staging(PathBuf),
    /// The part's bytes live in the cache; must not be deleted by the reassembler.
    Cached(PathBuf),
}

impl PartSource {
    /// The path backing this source, regardless of variant.
    pub fn path(&self) -> &Path {
        match self {
            PartSource::Staging(p) => p,
            PartSource::Cached(p) => p,
        }
    }
}

pub(crate) enum LayerClass {
    Empty,
    DiskPart { part_num: u32, total_parts: u32 },
    Disk,
    Config,
    Nvram,
    Ignored,
}

pub(crate) fn classify(layer: &Layer) -> LayerClass {
    if layer.media_type == EMPTY_MEDIA_TYPE {
        return LayerClass::Empty;
    }
    if let Some(captures) = DISK_PART_PATTERN.captures(&layer.media_type) {
        let part_num: u32 = captures[1].parse().unwrap_or(0);
        let total_parts: u32 = captures[2].parse().unwrap_or(0);
        return LayerClass::DiskPart {
            part_num,
            total_parts,
        };
    }
    match layer.media_type.as_str() {
        DISK_MEDIA_TYPE => LayerClass::Disk,
        CONFIG_MEDIA_TYPE => LayerClass::Config,
        NVRAM_MEDIA_TYPE => LayerClass::Nvram,
        _ => LayerClass::Ignored,
    }
}

/// Tracks cumulative downloaded/copied bytes across the download phase.
#[derive(Debug, Default, Clone)]
pub struct Progress {
    inner: Arc<Mutex<u64>>,
}

impl Progress {
    /// Creates a zeroed progress tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `bytes` to the running total.
    pub async fn add(&self, bytes: u64) {
        let mut total = self.inner.lock().await;
        *total += bytes;
    }

    /// The current running total.
    pub async fn total(&self) -> u64 {
        *self.inner.lock().await
    }
}

/// The result of scheduling all of a manifest's layers.
#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    /// Disk parts discovered, unordered; the reassembler is responsible for ordering.
    pub disk_parts: Vec<(u32, PartSource)>,
    /// The declared total part count, if any disk parts were present.
    pub total_parts: Option<u32>,
}

/// Dispatches bounded-concurrency downloads/copies for every layer in a manifest.
pub struct DownloadScheduler {
    registry: Arc<RegistryClient>,
    cache: Arc<CacheStore>,
    single_flight: Arc<SingleFlight>,
    concurrency: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DownloadScheduler {
    /// Creates a scheduler over the given collaborators, capped at the default concurrency.
    pub fn new(
        registry: Arc<RegistryClient>,
        cache: Arc<CacheStore>,
        single_flight: Arc<SingleFlight>,
    ) -> Self {
        Self {
            registry,
            cache,
            single_flight,
            concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
        }
    }

    /// Schedules every non-ignored layer of `layers` for download or cache-copy into
    /// `staging_dir`, respecting the single-flight coordinator and a concurrency cap.
    ///
    /// Returns the collected disk-part sources; non-part layers are written directly to their
    /// well-known staging filenames (`disk.img`, `config.json`, `nvram.bin`).
    #[tracing::instrument(skip(self, layers, progress))]
    pub async fn schedule(
        &self,
        org: &str,
        repository: &str,
        manifest_id: &str,
        token: &str,
        layers: &[Layer],
        staging_dir: &Path,
        memory_constrained: bool,
        progress: &Progress,
    ) -> VmPullResult<ScheduleOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut total_parts = None;

        for layer in layers {
            let class = classify(layer);
            let total_parts_for_layer = match &class {
                LayerClass::DiskPart { total_parts, .. } => Some(*total_parts),
                _ => None,
            };
            if let Some(tp) = total_parts_for_layer {
                total_parts = Some(tp);
            }

            if matches!(class, LayerClass::Empty | LayerClass::Ignored) {
                continue;
            }

            let permit = semaphore.clone().acquire_owned().await.expect("semaphore closed");
            let registry = self.registry.clone();
            let cache = self.cache.clone();
            let single_flight = self.single_flight.clone();
            let org = org.to_string();
            let repository = repository.to_string();
            let manifest_id = manifest_id.to_string();
            let token = token.to_string();
            let layer = layer.clone();
            let staging_dir = staging_dir.to_path_buf();
            let progress = progress.clone();

            tasks.spawn(async move {
                let _permit = permit;
                fetch_one_layer(
                    registry,
                    cache,
                    single_flight,
                    &org,
                    &repository,
                    &manifest_id,
                    &token,
                    layer,
                    class,
                    &staging_dir,
                    memory_constrained,
                    &progress,
                )
                .await
            });
        }

        let mut outcome = ScheduleOutcome {
            disk_parts: Vec::new(),
            total_parts,
        };

        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(Ok(Some((part_num, source)))) => outcome.disk_parts.push((part_num, source)),
                Ok(Ok(None)) => {}
                Ok(Err(err)) => {
                    tasks.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    tasks.abort_all();
                    return Err(VmPullError::custom(join_err));
                }
            }
        }

        Ok(outcome)
    }
}

#[allow(clippy::too_many_arguments)]
async fn fetch_one_layer(
    registry: Arc<RegistryClient>,
    cache: Arc<CacheStore>,
    single_flight: Arc<SingleFlight>,
    org: &str,
    repository: &str,
    manifest_id: &str,
    token: &str,
    layer: Layer,
    class: LayerClass,
    staging_dir: &Path,
    memory_constrained: bool,
    progress: &Progress,
) -> VmPullResult<Option<(u32, PartSource)>> {
    let cached_path = cache.layer_path(org, manifest_id, &layer.digest);
    let is_disk_part = matches!(class, LayerClass::DiskPart { .. });

    let staging_output = match &class {
        LayerClass::Disk => Some(staging_dir.join(DISK_IMAGE_FILENAME)),
        LayerClass::Config => Some(staging_dir.join(CONFIG_FILENAME)),
        LayerClass::Nvram => Some(staging_dir.join(NVRAM_FILENAME)),
        LayerClass::DiskPart { .. } => {
            Some(staging_dir.join(digest_to_filename(&layer.digest)))
        }
        _ => None,
    };

    if !cached_path.exists() && single_flight.is_downloading(&layer.digest).await {
        single_flight.wait_for(&layer.digest, &cached_path).await;
    }

    if cached_path.exists() {
        if memory_constrained && is_disk_part {
            progress.add(layer.size).await;
            return Ok(part_result(&class, PartSource::Cached(cached_path)));
        }

        let output = staging_output.expect("non-ignored layer always has a staging output");
        fs::copy(&cached_path, &output).await?;
        progress.add(layer.size).await;
        return Ok(part_result(&class, PartSource::Staging(output)));
    }

    single_flight.mark_started(&layer.digest).await;
    let download_result = async {
        let output = staging_output
            .clone()
            .expect("non-ignored layer always has a staging output");
        registry
            .download_blob(
                repository,
                &layer.digest,
                &layer.media_type,
                token,
                &output,
                vmpull_utils::DEFAULT_MAX_RETRIES,
            )
            .await?;
        cache
            .store_layer(org, manifest_id, &layer.digest, &output)
            .await?;
        Ok::<PathBuf, VmPullError>(output)
    }
    .await;
    single_flight.mark_complete(&layer.digest).await;

    let output = download_result?;
    progress.add(layer.size).await;
    Ok(part_result(&class, PartSource::Staging(output)))
}

pub(crate) fn part_result(class: &LayerClass, source: PartSource) -> Option<(u32, PartSource)> {
    match class {
        LayerClass::DiskPart { part_num, .. } => Some((*part_num, source)),
        _ => None,
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
