//! # media-enrich
//!
//! Post-upload image enrichment: after a storage backend durably writes an
//! image, this pipeline locates the file on disk, computes a BlurHash
//! placeholder, extracts EXIF capture data and basic raster properties, and
//! reverse-geocodes any GPS position into a structured place description —
//! then merges everything that succeeded into the file's metadata record.
//!
//! Partial failure is the normal case: every extractor is isolated, a failed
//! one simply leaves its key absent, and the triggering upload is never
//! delayed or failed by enrichment.
//!
//! ## Quick Start
//!
//! The simplest way to use the library is [`pipeline::enrich`], which runs
//! the full locate → extract → geocode → merge flow for one stored file:
//!
//! ```rust,no_run
//! use media_enrich::config::Config;
//! use media_enrich::geo::GeoResolver;
//! use media_enrich::pipeline::{self, MetadataMap, StoredFileDescriptor};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Credentials and storage roots from the environment
//!     let config = Config::from_env();
//!     let resolver = GeoResolver::new(config.geocoding.clone());
//!
//!     // Normally emitted by the storage backend after a write
//!     let descriptor = StoredFileDescriptor {
//!         id: 1,
//!         name: "photo.jpg".into(),
//!         url: "/uploads/photo_abc123.jpg".into(),
//!         hash: "photo_abc123".into(),
//!         ext: ".jpg".into(),
//!         mime: "image/jpeg".into(),
//!         provider: "local".into(),
//!         provider_metadata: MetadataMap::new(),
//!     };
//!
//!     let outcome = pipeline::enrich(&descriptor, &resolver, &config).await;
//!     println!("{}", serde_json::to_string_pretty(outcome.metadata()).unwrap());
//! }
//! ```
//!
//! ## Running in the background
//!
//! A storage hook should not block its own write response. Hand descriptors
//! to an [`queue::EnrichmentQueue`] instead: a bounded channel with a fixed
//! worker pool that runs [`pipeline::enrich_and_persist`] per job and hands
//! the merged record to your [`pipeline::MetadataSink`] implementation.
//!
//! ## Lower-Level Usage
//!
//! The extractors are usable on their own:
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() {
//!     let path = Path::new("photo.jpg");
//!
//!     let raster = media_enrich::raster::inspect(path).await;
//!     let hash = media_enrich::blurhash::encode_file(path).await;
//!     let exif = media_enrich::exif::extract(path).await;
//!
//!     println!("{raster:?}\n{hash:?}\n{exif:?}");
//! }
//! ```
//!
//! ## Modules
//!
//! - [`pipeline`] — the coordinator: descriptor, merge, persistence contract
//! - [`queue`] — bounded background worker queue
//! - [`paths`] — on-disk path resolution from provider location hints
//! - [`raster`] — header-level image properties
//! - [`blurhash`] — BlurHash placeholder encoding
//! - [`exif`] — EXIF extraction and normalization
//! - [`geo`] — region-routed reverse geocoding with retry
//! - [`config`] — credentials, storage roots, diagnostics flag
//! - [`error`] — the failure taxonomy

pub mod blurhash;
pub mod config;
pub mod error;
pub mod exif;
pub mod geo;
pub mod paths;
pub mod pipeline;
pub mod queue;
pub mod raster;
