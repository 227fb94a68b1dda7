//! Enrichment orchestration.
//!
//! The coordinator takes a stored-file descriptor, locates the file on disk,
//! runs the three extractors concurrently, reverse-geocodes when the EXIF
//! data carries a GPS position, and merges everything that succeeded into
//! the existing metadata mapping.
//!
//! The whole pipeline degrades instead of failing: a missing file skips the
//! invocation, a failed extractor omits its key, a failed geocode omits
//! `location`, and a failed persistence write is logged and dropped. No
//! failure here ever aborts sibling work or surfaces to the upload path that
//! triggered it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use crate::blurhash;
use crate::config::Config;
use crate::error::EnrichError;
use crate::exif::{self, ExifRecord, GpsCoordinate};
use crate::geo::GeoResolver;
use crate::paths;
use crate::raster::{self, RasterMetadata};

/// The metadata mapping attached to a stored file. Keys this pipeline never
/// touches pass through the merge untouched.
pub type MetadataMap = serde_json::Map<String, Value>;

/// Deadline for each extractor; expiry counts as an extractor failure.
const EXTRACTOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata keys staged by the pipeline, in summary order.
const STAGED_KEYS: [&str; 4] = ["blurHash", "exif", "location", "metadata"];

/// Descriptor of a durably-stored file, emitted by the storage backend.
/// Read-only within the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFileDescriptor {
    pub id: i64,
    /// Declared file name, for logging.
    pub name: String,
    /// Serving URL or location hint recorded by the storage provider.
    pub url: String,
    /// Content hash used in the on-disk file name.
    pub hash: String,
    /// Extension with leading dot, e.g. `".jpg"`.
    pub ext: String,
    pub mime: String,
    /// Storage provider tag, e.g. `"local"`.
    pub provider: String,
    /// Metadata already attached to the file; the merge target.
    pub provider_metadata: MetadataMap,
}

impl StoredFileDescriptor {
    /// Whether this file is eligible for enrichment: stored locally and an
    /// image. Everything else has no path to resolve or no pixels to read.
    pub fn is_local_image(&self) -> bool {
        self.provider == "local" && self.mime.starts_with("image/")
    }
}

/// Where the merged record goes. Called at most once per invocation;
/// failures are logged by the pipeline but not retried — retry policy, if
/// any, belongs to the sink.
#[async_trait::async_trait]
pub trait MetadataSink: Send + Sync {
    async fn update(&self, id: i64, metadata: &MetadataMap) -> anyhow::Result<()>;
}

/// Terminal state of one enrichment invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichOutcome {
    /// The file could not be located; existing metadata returned unchanged
    /// and nothing was extracted or persisted.
    Skipped(MetadataMap),
    /// Extraction ran; the merged record is ready for persistence.
    Enriched(MetadataMap),
}

impl EnrichOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    pub fn metadata(&self) -> &MetadataMap {
        match self {
            Self::Skipped(m) | Self::Enriched(m) => m,
        }
    }

    pub fn into_metadata(self) -> MetadataMap {
        match self {
            Self::Skipped(m) | Self::Enriched(m) => m,
        }
    }
}

/// Run the enrichment pipeline for one stored file.
///
/// Resolves the on-disk path, runs the raster / blurhash / exif extractors
/// concurrently with an all-settled join, geocodes a GPS position if one was
/// extracted, and returns the merged metadata. Never fails — every error
/// inside degrades to an omitted key.
pub async fn enrich(
    descriptor: &StoredFileDescriptor,
    resolver: &GeoResolver,
    config: &Config,
) -> EnrichOutcome {
    let Ok(path) = paths::resolve(descriptor, &config.storage).await else {
        log::warn!(
            "Could not locate {} on disk; skipping enrichment",
            descriptor.name
        );
        if config.development {
            log::debug!(
                "unresolved descriptor: id={} url={} hash={} ext={}",
                descriptor.id,
                descriptor.url,
                descriptor.hash,
                descriptor.ext
            );
        }
        return EnrichOutcome::Skipped(descriptor.provider_metadata.clone());
    };

    log::info!("Enriching {} from {}", descriptor.name, path.display());

    // All-settled join: one extractor failing never cancels the others.
    let (raster_result, blur_result, exif_result) = tokio::join!(
        with_deadline("raster", raster::inspect(&path)),
        with_deadline("blurhash", blurhash::encode_file(&path)),
        with_deadline("exif", exif::extract(&path)),
    );

    let (mut update, gps) = merge_results(
        &descriptor.provider_metadata,
        raster_result,
        blur_result,
        exif_result,
    );

    // Geocoding starts only after exif settles and never blocks completion.
    if let Some(gps) = gps {
        match resolver.resolve(gps.latitude, gps.longitude).await {
            Ok(place) => stage(&mut update, "location", &place),
            Err(e) => log::warn!("Reverse geocoding for {} failed: {e}", descriptor.name),
        }
    }

    EnrichOutcome::Enriched(update)
}

/// Run the pipeline and hand an enriched record to the sink.
pub async fn enrich_and_persist(
    descriptor: &StoredFileDescriptor,
    resolver: &GeoResolver,
    sink: &dyn MetadataSink,
    config: &Config,
) -> EnrichOutcome {
    let outcome = enrich(descriptor, resolver, config).await;

    if let EnrichOutcome::Enriched(metadata) = &outcome {
        let staged: Vec<&str> = STAGED_KEYS
            .iter()
            .copied()
            .filter(|key| metadata.contains_key(*key))
            .collect();
        log::info!(
            "Enrichment of {} complete: {}",
            descriptor.name,
            if staged.is_empty() {
                "nothing extracted".to_string()
            } else {
                staged.join(", ")
            }
        );

        if let Err(e) = sink.update(descriptor.id, metadata).await {
            // The in-memory record is lost for this invocation.
            log::error!(
                "{} (file {})",
                EnrichError::Persistence(e.to_string()),
                descriptor.name
            );
        }
    }

    outcome
}

/// Impose the extractor deadline; expiry is a typed failure equivalent to
/// any other extractor failure.
async fn with_deadline<T>(
    stage: &'static str,
    fut: impl Future<Output = Result<T, EnrichError>>,
) -> Result<T, EnrichError> {
    match tokio::time::timeout(EXTRACTOR_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(EnrichError::Timeout {
            stage,
            limit: EXTRACTOR_TIMEOUT,
        }),
    }
}

/// Fold the settled extractor results into a copy of the existing metadata.
///
/// Shallow union: each successful extractor contributes its own key, failed
/// ones are logged and omitted, and every pre-existing key survives. Also
/// returns the extracted GPS position, if any, for the geocoding step.
fn merge_results(
    existing: &MetadataMap,
    raster: Result<RasterMetadata, EnrichError>,
    blur: Result<String, EnrichError>,
    exif: Result<Option<ExifRecord>, EnrichError>,
) -> (MetadataMap, Option<GpsCoordinate>) {
    let mut update = existing.clone();

    match raster {
        Ok(meta) => stage(&mut update, "metadata", &meta),
        Err(e) => log::warn!("{e}"),
    }

    match blur {
        Ok(hash) => {
            update.insert("blurHash".to_string(), Value::String(hash));
        }
        Err(e) => log::warn!("{e}"),
    }

    let mut gps = None;
    match exif {
        Ok(Some(record)) => {
            gps = record.gps.clone();
            stage(&mut update, "exif", &record);
        }
        Ok(None) => log::debug!("No EXIF tags present"),
        Err(e) => log::warn!("{e}"),
    }

    (update, gps)
}

fn stage<T: Serialize>(update: &mut MetadataMap, key: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(v) => {
            update.insert(key.to_string(), v);
        }
        Err(e) => log::warn!("Could not serialize {key}: {e}"),
    }
}
