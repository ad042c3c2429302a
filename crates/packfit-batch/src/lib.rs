//! Packfit Batch - bounded-concurrency compression scheduling
//!
//! This crate drives queues of images through the `packfit-core`
//! size-target search:
//!
//! - `intake` - screens uploads (format, per-file and queue caps) before
//!   they become queue items
//! - `item` - the per-image state machine (`Pending` -> `Processing` ->
//!   `Success`/`Failed`, explicit recompress back to `Pending`)
//! - `scheduler` - the [`Batch`] arena and the admission window that caps
//!   simultaneous in-flight encodes
//!
//! # Usage
//!
//! ```ignore
//! use packfit_batch::{Batch, Profile, StdCodec};
//!
//! let mut batch = Batch::new(StdCodec);
//! for (name, bytes) in uploads {
//!     batch.submit(name, bytes, Profile::compact());
//! }
//! batch.run_all(3).await;
//! let outputs = batch.successful_outputs().await;
//! ```

pub mod intake;
pub mod item;
pub mod scheduler;

pub use intake::{screen, RejectReason, ScreenReport, SubmissionError, UploadRules};
pub use item::{CompressionItem, ItemSnapshot, ItemStatus};
pub use scheduler::{Batch, BatchProgress};

// Re-export the core types callers need to drive a batch.
pub use packfit_core::{Codec, FitError, FitOutcome, Profile, StdCodec};
