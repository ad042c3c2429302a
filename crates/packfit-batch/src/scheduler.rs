//! Bounded-concurrency batch scheduling.
//!
//! A [`Batch`] owns the arena of [`CompressionItem`]s for one session and
//! drives them through the size-target search with a bounded number of
//! simultaneous in-flight encodes. Admission is in submission order
//! through a semaphore permit taken before each item's task is spawned;
//! the CPU-bound search itself runs on the blocking thread pool so the
//! async runtime stays responsive. Completion order across items is not
//! guaranteed, and one item's failure never blocks another's progress.

use std::sync::Arc;

use futures::future::join_all;
use packfit_core::{fit_to_target, Codec, Profile};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::item::{CompressionItem, ItemSnapshot, ItemStatus};

/// Aggregate completion counts for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

impl BatchProgress {
    /// True once every item is terminal.
    pub fn is_finished(&self) -> bool {
        self.succeeded + self.failed == self.total
    }
}

/// Arena of compression items plus the codec they are encoded with.
pub struct Batch<C> {
    codec: Arc<C>,
    items: Vec<Arc<Mutex<CompressionItem>>>,
}

impl<C> Batch<C>
where
    C: Codec + Send + Sync + 'static,
{
    /// Create an empty batch over the given codec.
    pub fn new(codec: C) -> Self {
        Self {
            codec: Arc::new(codec),
            items: Vec::new(),
        }
    }

    /// Queue a new item in `Pending` and return its id.
    pub fn submit(&mut self, file_name: impl Into<String>, source: Vec<u8>, profile: Profile) -> Uuid {
        let item = CompressionItem::new(file_name, source, profile);
        let id = item.id();
        self.items.push(Arc::new(Mutex::new(item)));
        id
    }

    /// Number of items in the arena.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if no items have been submitted.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drive every `Pending` item to a terminal state, with at most
    /// `window_size` items in `Processing` at any instant.
    ///
    /// Items are admitted in submission order as permits free up; a
    /// degenerate `window_size` of 0 is clamped to 1. Returns once all
    /// items are terminal. Progress is observable through
    /// [`Batch::snapshots`] and [`Batch::progress`] while this runs.
    pub async fn run_all(&self, window_size: usize) {
        let window = window_size.max(1);
        let semaphore = Arc::new(Semaphore::new(window));
        let mut tasks = Vec::with_capacity(self.items.len());

        for item in &self.items {
            // Taking the permit here, before the task exists, is what
            // keeps admission in submission order.
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("batch semaphore is never closed");
            let codec = Arc::clone(&self.codec);
            let item = Arc::clone(item);
            tasks.push(tokio::spawn(run_one(codec, item, permit)));
        }

        for joined in join_all(tasks).await {
            if let Err(e) = joined {
                // run_one contains its own failures; reaching this means
                // the task itself was torn down.
                warn!(error = %e, "item task did not run to completion");
            }
        }

        let progress = self.progress().await;
        info!(
            succeeded = progress.succeeded,
            failed = progress.failed,
            total = progress.total,
            "batch finished"
        );
    }

    /// Reset every non-`Processing` item back to `Pending` and run the
    /// full set again through the same admission contract.
    pub async fn recompress_all(&self, window_size: usize) {
        for item in &self.items {
            // No-op for in-flight items; there is no mid-flight cancellation.
            item.lock().await.reset();
        }
        self.run_all(window_size).await;
    }

    /// Drop an item from the arena, releasing its buffers.
    ///
    /// Returns false when the id is unknown or the item is currently
    /// `Processing` (an in-flight search cannot be detached).
    pub async fn remove(&mut self, id: Uuid) -> bool {
        let mut index = None;
        for (i, item) in self.items.iter().enumerate() {
            let guard = item.lock().await;
            if guard.id() == id {
                if guard.status() == ItemStatus::Processing {
                    return false;
                }
                index = Some(i);
                break;
            }
        }
        match index {
            Some(i) => {
                self.items.remove(i);
                true
            }
            None => false,
        }
    }

    /// Read-only views of every item, in submission order.
    pub async fn snapshots(&self) -> Vec<ItemSnapshot> {
        let mut snapshots = Vec::with_capacity(self.items.len());
        for item in &self.items {
            snapshots.push(item.lock().await.snapshot());
        }
        snapshots
    }

    /// Aggregate completion counts.
    pub async fn progress(&self) -> BatchProgress {
        let mut progress = BatchProgress {
            succeeded: 0,
            failed: 0,
            total: self.items.len(),
        };
        for item in &self.items {
            match item.lock().await.status() {
                ItemStatus::Success => progress.succeeded += 1,
                ItemStatus::Failed => progress.failed += 1,
                ItemStatus::Pending | ItemStatus::Processing => {}
            }
        }
        progress
    }

    /// `(output file name, result bytes)` pairs for every `Success` item,
    /// ready for the packaging collaborator.
    pub async fn successful_outputs(&self) -> Vec<(String, Vec<u8>)> {
        let mut outputs = Vec::new();
        for item in &self.items {
            let guard = item.lock().await;
            if guard.status() == ItemStatus::Success {
                if let Some(bytes) = guard.result_bytes() {
                    outputs.push((guard.output_name(), bytes.to_vec()));
                }
            }
        }
        outputs
    }
}

/// Run one item's search while holding its admission permit.
///
/// Every outcome, including a panicking encode, lands as state on this
/// item alone; nothing propagates to sibling tasks.
async fn run_one<C>(codec: Arc<C>, item: Arc<Mutex<CompressionItem>>, _permit: OwnedSemaphorePermit)
where
    C: Codec + Send + Sync + 'static,
{
    let (id, source, profile) = {
        let mut guard = item.lock().await;
        if !guard.begin() {
            // Already terminal (or somehow in flight): leave it alone.
            return;
        }
        (guard.id(), guard.source(), guard.profile().clone())
    };

    debug!(item = %id, "admitted");

    let search = tokio::task::spawn_blocking(move || fit_to_target(&*codec, &source, &profile));

    let mut guard = item.lock().await;
    match search.await {
        Ok(Ok(outcome)) => {
            debug!(
                item = %id,
                size = outcome.size,
                success = outcome.success,
                "search finished"
            );
            guard.complete(outcome);
        }
        Ok(Err(e)) => {
            warn!(item = %id, error = %e, "search failed");
            guard.fail(e.to_string());
        }
        Err(e) => {
            warn!(item = %id, error = %e, "search task panicked");
            guard.fail("encode task panicked".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packfit_core::{DecodeError, EncodeError, Raster};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// First source byte that makes [`ProbeCodec::decode`] fail.
    const CORRUPT_MARKER: u8 = 0xBB;

    /// Codec double that records concurrency and admission order and
    /// produces encodes of a fixed size.
    struct ProbeCodec {
        hold: Duration,
        encoded_size: usize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        decode_order: StdMutex<Vec<u8>>,
    }

    impl ProbeCodec {
        fn new(hold: Duration, encoded_size: usize) -> Self {
            Self {
                hold,
                encoded_size,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                decode_order: StdMutex::new(Vec::new()),
            }
        }
    }

    impl Codec for ProbeCodec {
        fn decode(&self, bytes: &[u8]) -> Result<Raster, DecodeError> {
            if bytes.first() == Some(&CORRUPT_MARKER) {
                return Err(DecodeError::UnsupportedFormat);
            }
            if let Ok(mut order) = self.decode_order.lock() {
                order.push(bytes.first().copied().unwrap_or_default());
            }
            Ok(Raster::new(8, 8, vec![0u8; 8 * 8 * 3]))
        }

        fn encode(
            &self,
            _raster: &Raster,
            _quality: f32,
            _output: Option<(u32, u32)>,
        ) -> Result<Vec<u8>, EncodeError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            std::thread::sleep(self.hold);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![0u8; self.encoded_size])
        }
    }

    /// Profile small enough that the probe's fixed encode size always
    /// fits, with a short bisection budget to keep tests fast.
    fn quick_profile() -> Profile {
        Profile::new(100, 2, vec![], 0.5)
    }

    fn source_tagged(tag: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; 2048];
        bytes[0] = tag;
        bytes
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_all_drives_every_item_terminal() {
        let mut batch = Batch::new(ProbeCodec::new(Duration::from_millis(1), 10));
        for i in 0..6 {
            batch.submit(format!("img{i}.png"), source_tagged(i), quick_profile());
        }

        batch.run_all(3).await;

        let progress = batch.progress().await;
        assert!(progress.is_finished());
        assert_eq!(progress.succeeded, 6);
        assert_eq!(progress.failed, 0);
        for snap in batch.snapshots().await {
            assert_eq!(snap.status, ItemStatus::Success);
            assert!(snap.result_size.is_some());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_window_invariant_holds() {
        let codec = ProbeCodec::new(Duration::from_millis(25), 10);
        let mut batch = Batch::new(codec);
        for i in 0..10 {
            batch.submit(format!("img{i}.png"), source_tagged(i), quick_profile());
        }

        batch.run_all(3).await;

        assert!(batch.progress().await.is_finished());
        let observed = batch.codec.max_in_flight.load(Ordering::SeqCst);
        assert!(observed <= 3, "saw {observed} concurrent encodes, window is 3");
        // The window was actually used, not serialized down to 1
        assert!(observed >= 2, "encodes never overlapped");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_admission_follows_submission_order() {
        let codec = ProbeCodec::new(Duration::from_millis(1), 10);
        let mut batch = Batch::new(codec);
        for i in 1..=5 {
            batch.submit(format!("img{i}.png"), source_tagged(i), quick_profile());
        }

        // A window of one serializes the batch, exposing admission order
        // directly as decode order.
        batch.run_all(1).await;

        let order = batch.codec.decode_order.lock().unwrap().clone();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_are_isolated() {
        let mut batch = Batch::new(ProbeCodec::new(Duration::from_millis(1), 10));
        batch.submit("good1.png", source_tagged(1), quick_profile());
        let corrupt = batch.submit("corrupt.png", source_tagged(CORRUPT_MARKER), quick_profile());
        batch.submit("good2.png", source_tagged(2), quick_profile());

        batch.run_all(2).await;

        let progress = batch.progress().await;
        assert_eq!(progress.succeeded, 2);
        assert_eq!(progress.failed, 1);

        for snap in batch.snapshots().await {
            if snap.id == corrupt {
                assert_eq!(snap.status, ItemStatus::Failed);
                // Hard failure: no best-effort bytes
                assert!(snap.result_size.is_none());
                assert!(snap.error.is_some());
            } else {
                assert_eq!(snap.status, ItemStatus::Success);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_over_target_items_fail_with_best_effort_bytes() {
        // Encodes of 5000 bytes can never meet a 100-byte target.
        let mut batch = Batch::new(ProbeCodec::new(Duration::from_millis(1), 5000));
        batch.submit("big.png", source_tagged(1), quick_profile());

        batch.run_all(1).await;

        let snap = &batch.snapshots().await[0];
        assert_eq!(snap.status, ItemStatus::Failed);
        assert_eq!(snap.result_size, Some(5000));
        assert!(snap.error.as_ref().unwrap().contains("exceeds target"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_recompress_all_reruns_terminal_items() {
        let mut batch = Batch::new(ProbeCodec::new(Duration::from_millis(1), 10));
        for i in 0..3 {
            batch.submit(format!("img{i}.png"), source_tagged(i), quick_profile());
        }

        batch.run_all(2).await;
        let first_decodes = batch.codec.decode_order.lock().unwrap().len();
        assert_eq!(first_decodes, 3);

        batch.recompress_all(2).await;

        // Every item went through the pipeline again
        let second_decodes = batch.codec.decode_order.lock().unwrap().len();
        assert_eq!(second_decodes, 6);
        let progress = batch.progress().await;
        assert_eq!(progress.succeeded, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_successful_outputs_for_packaging() {
        let mut batch = Batch::new(ProbeCodec::new(Duration::from_millis(1), 10));
        batch.submit("cat.png", source_tagged(1), quick_profile());
        batch.submit("corrupt.png", source_tagged(CORRUPT_MARKER), quick_profile());

        batch.run_all(2).await;

        let outputs = batch.successful_outputs().await;
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].0, "cat_compressed.png");
        assert_eq!(outputs[0].1.len(), 10);
    }

    #[tokio::test]
    async fn test_remove_detaches_item() {
        let mut batch = Batch::new(ProbeCodec::new(Duration::from_millis(1), 10));
        let id = batch.submit("cat.png", source_tagged(1), quick_profile());
        batch.submit("dog.png", source_tagged(2), quick_profile());

        assert!(batch.remove(id).await);
        assert_eq!(batch.len(), 1);

        // Unknown ids are reported, not ignored silently
        assert!(!batch.remove(id).await);
    }

    #[tokio::test]
    async fn test_run_all_on_empty_batch_returns() {
        let batch: Batch<ProbeCodec> = Batch::new(ProbeCodec::new(Duration::ZERO, 10));
        batch.run_all(4).await;
        assert!(batch.progress().await.is_finished());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_zero_window_is_clamped() {
        let mut batch = Batch::new(ProbeCodec::new(Duration::from_millis(1), 10));
        batch.submit("cat.png", source_tagged(1), quick_profile());

        batch.run_all(0).await;

        assert_eq!(batch.progress().await.succeeded, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fast_path_item_passes_through() {
        // Source already under target: bytes come back untouched and no
        // decode is recorded.
        let mut batch = Batch::new(ProbeCodec::new(Duration::from_millis(1), 10));
        let profile = Profile::new(10_000, 2, vec![], 0.5);
        batch.submit("small.png", vec![7u8; 50], profile);

        batch.run_all(1).await;

        let snap = &batch.snapshots().await[0];
        assert_eq!(snap.status, ItemStatus::Success);
        assert_eq!(snap.result_size, Some(50));
        assert!(batch.codec.decode_order.lock().unwrap().is_empty());
    }
}
