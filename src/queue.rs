//! Background enrichment queue.
//!
//! Storage hooks must not block the write they were triggered by, so
//! enrichment runs out-of-band: a bounded channel fed by
//! [`EnrichmentQueue::enqueue`] and drained by a fixed pool of worker tasks,
//! each job being one [`crate::pipeline::enrich_and_persist`] invocation.
//! Bounding the channel makes backlog observable: a full queue rejects
//! loudly instead of accumulating invisible deferred work.
//!
//! Shutdown semantics are at-most-once: [`EnrichmentQueue::close`] stops
//! intake and drains what was already accepted; anything abandoned mid-flight
//! was never persisted, because the pipeline persists only once, at the end.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::geo::GeoResolver;
use crate::pipeline::{self, MetadataSink, StoredFileDescriptor};

/// A bounded queue of enrichment jobs with a fixed worker pool.
pub struct EnrichmentQueue {
    tx: mpsc::Sender<StoredFileDescriptor>,
    workers: Vec<JoinHandle<()>>,
}

impl EnrichmentQueue {
    /// Spawn `workers` tasks draining a channel of `capacity` jobs.
    ///
    /// A queue with zero workers accepts jobs but never runs them; useful
    /// only for tests.
    pub fn new(
        capacity: usize,
        workers: usize,
        sink: Arc<dyn MetadataSink>,
        config: Config,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let config = Arc::new(config);
        let resolver = Arc::new(GeoResolver::new(config.geocoding.clone()));

        let handles = (0..workers)
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let sink = Arc::clone(&sink);
                let config = Arc::clone(&config);
                let resolver = Arc::clone(&resolver);

                tokio::spawn(async move {
                    loop {
                        // Hold the lock only while waiting for the next job.
                        let next = rx.lock().await.recv().await;
                        let Some(descriptor) = next else { break };
                        pipeline::enrich_and_persist(
                            &descriptor,
                            &resolver,
                            sink.as_ref(),
                            &config,
                        )
                        .await;
                    }
                    log::debug!("enrichment worker {worker} stopped");
                })
            })
            .collect();

        Self {
            tx,
            workers: handles,
        }
    }

    /// Non-blocking enqueue. Returns whether the job was accepted.
    ///
    /// Ineligible files (remote provider, non-image mime) are filtered here,
    /// mirroring the storage hook's guard. A full queue is an observable
    /// rejection, not back-pressure on the caller.
    pub fn enqueue(&self, descriptor: StoredFileDescriptor) -> bool {
        if !descriptor.is_local_image() {
            log::debug!(
                "Skipping {} (provider {}, {})",
                descriptor.name,
                descriptor.provider,
                descriptor.mime
            );
            return false;
        }

        match self.tx.try_send(descriptor) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(d)) => {
                log::error!("Enrichment queue full; dropping {}", d.name);
                false
            }
            Err(mpsc::error::TrySendError::Closed(d)) => {
                log::error!("Enrichment queue closed; dropping {}", d.name);
                false
            }
        }
    }

    /// Remaining queue capacity.
    pub fn remaining_capacity(&self) -> usize {
        self.tx.capacity()
    }

    /// Stop intake and wait for the workers to drain accepted jobs.
    pub async fn close(self) {
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::MetadataMap;
    use image::RgbaImage;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        updates: StdMutex<Vec<i64>>,
    }

    #[async_trait::async_trait]
    impl MetadataSink for RecordingSink {
        async fn update(&self, id: i64, _metadata: &MetadataMap) -> anyhow::Result<()> {
            self.updates.lock().unwrap().push(id);
            Ok(())
        }
    }

    fn descriptor(dir: &TempDir, name: &str, id: i64) -> StoredFileDescriptor {
        StoredFileDescriptor {
            id,
            name: name.to_string(),
            url: dir.path().join(name).to_string_lossy().into_owned(),
            hash: format!("hash{id}"),
            ext: ".png".to_string(),
            mime: "image/png".to_string(),
            provider: "local".to_string(),
            provider_metadata: MetadataMap::new(),
        }
    }

    fn write_png(dir: &TempDir, name: &str) {
        RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]))
            .save(dir.path().join(name))
            .unwrap();
    }

    #[tokio::test]
    async fn accepted_job_reaches_sink_exactly_once() {
        let dir = TempDir::new().unwrap();
        write_png(&dir, "a.png");
        let sink = Arc::new(RecordingSink::default());

        let queue = EnrichmentQueue::new(8, 2, sink.clone(), Config::default());
        assert!(queue.enqueue(descriptor(&dir, "a.png", 42)));
        queue.close().await;

        assert_eq!(*sink.updates.lock().unwrap(), vec![42]);
    }

    #[tokio::test]
    async fn ineligible_descriptors_are_filtered() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let queue = EnrichmentQueue::new(8, 1, sink.clone(), Config::default());

        let mut remote = descriptor(&dir, "a.png", 1);
        remote.provider = "s3".to_string();
        assert!(!queue.enqueue(remote));

        let mut pdf = descriptor(&dir, "doc.pdf", 2);
        pdf.mime = "application/pdf".to_string();
        assert!(!queue.enqueue(pdf));

        queue.close().await;
        assert!(sink.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::default());
        // zero workers: nothing drains, so the bound is hit deterministically
        let queue = EnrichmentQueue::new(1, 0, sink, Config::default());

        assert!(queue.enqueue(descriptor(&dir, "a.png", 1)));
        assert!(!queue.enqueue(descriptor(&dir, "b.png", 2)));
        assert_eq!(queue.remaining_capacity(), 0);
    }

    #[tokio::test]
    async fn skipped_files_never_reach_the_sink() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let queue = EnrichmentQueue::new(8, 1, sink.clone(), Config::default());

        // eligible but unresolvable on disk
        assert!(queue.enqueue(descriptor(&dir, "missing.png", 9)));
        queue.close().await;

        assert!(sink.updates.lock().unwrap().is_empty());
    }
}
