//! Per-image compression job state.
//!
//! A [`CompressionItem`] tracks one submitted image from `Pending` through
//! `Processing` to a terminal `Success` or `Failed`, owning the source
//! bytes and, once terminal, exactly one result buffer. Terminal items can
//! be sent back to `Pending` through an explicit recompress request; the
//! previous result buffer is released before the reset, never leaked
//! alongside a new one.

use std::sync::Arc;

use packfit_core::{FitOutcome, Profile};
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle states of a compression item.
///
/// `Processing` is exclusive: at most one in-flight encode per item, and a
/// recompress request on a `Processing` item is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting for admission.
    Pending,
    /// An encode search is in flight.
    Processing,
    /// Terminal: output met the target ceiling.
    Success,
    /// Terminal: hard failure (no result) or output over target (result
    /// attached).
    Failed,
}

impl ItemStatus {
    /// True for `Success` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Success | ItemStatus::Failed)
    }
}

/// One submitted image moving through the compression pipeline.
#[derive(Debug)]
pub struct CompressionItem {
    id: Uuid,
    file_name: String,
    source: Arc<[u8]>,
    profile: Profile,
    status: ItemStatus,
    result: Option<Vec<u8>>,
    error: Option<String>,
}

/// Read-only view of an item for progress rendering. The presentation
/// collaborator consumes these; nothing in the pipeline depends on what it
/// does with them.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSnapshot {
    pub id: Uuid,
    pub file_name: String,
    pub status: ItemStatus,
    pub source_size: usize,
    pub result_size: Option<usize>,
    pub error: Option<String>,
}

impl CompressionItem {
    /// Create a new item in `Pending`.
    pub fn new(file_name: impl Into<String>, source: Vec<u8>, profile: Profile) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            source: Arc::from(source),
            profile,
            status: ItemStatus::Pending,
            result: None,
            error: None,
        }
    }

    /// Stable opaque identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Original upload name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Shared handle to the immutable source bytes.
    pub fn source(&self) -> Arc<[u8]> {
        Arc::clone(&self.source)
    }

    /// Size of the original upload in bytes.
    pub fn source_size(&self) -> usize {
        self.source.len()
    }

    /// Profile in effect for this item.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Current lifecycle state.
    pub fn status(&self) -> ItemStatus {
        self.status
    }

    /// Result bytes, present in terminal states when an encode produced
    /// output (always for `Success`, best-effort for over-target
    /// `Failed`, absent for hard failures).
    pub fn result_bytes(&self) -> Option<&[u8]> {
        self.result.as_deref()
    }

    /// Size of the result buffer, if one is attached.
    pub fn result_size(&self) -> Option<usize> {
        self.result.as_ref().map(Vec::len)
    }

    /// Failure reason, set only in `Failed`.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Output file name: the upload name with a `_compressed` suffix
    /// inserted before the extension.
    pub fn output_name(&self) -> String {
        add_suffix(&self.file_name, "_compressed")
    }

    /// Admit the item: `Pending` -> `Processing`, clearing any stale error.
    ///
    /// Returns false (and leaves the item untouched) unless the item is
    /// `Pending`, so an item is never processed twice concurrently.
    pub(crate) fn begin(&mut self) -> bool {
        if self.status != ItemStatus::Pending {
            return false;
        }
        self.status = ItemStatus::Processing;
        self.error = None;
        true
    }

    /// Land a finished search: `Processing` -> `Success` or `Failed`
    /// depending on whether the target was met. Over-target outcomes keep
    /// their best-effort bytes.
    pub(crate) fn complete(&mut self, outcome: FitOutcome) {
        debug_assert_eq!(self.status, ItemStatus::Processing);
        // Release any prior buffer before attaching the new one.
        self.result = None;
        self.status = if outcome.success {
            ItemStatus::Success
        } else {
            ItemStatus::Failed
        };
        self.error = outcome.message;
        self.result = Some(outcome.bytes);
    }

    /// Land a hard failure: `Processing` -> `Failed` with no result bytes.
    pub(crate) fn fail(&mut self, message: String) {
        debug_assert_eq!(self.status, ItemStatus::Processing);
        self.result = None;
        self.status = ItemStatus::Failed;
        self.error = Some(message);
    }

    /// Recompress request: terminal (or still pending) items return to
    /// `Pending` with their result buffer released and error cleared.
    ///
    /// A `Processing` item is left untouched and false is returned; there
    /// is no mid-flight cancellation.
    pub(crate) fn reset(&mut self) -> bool {
        if self.status == ItemStatus::Processing {
            return false;
        }
        self.result = None;
        self.error = None;
        self.status = ItemStatus::Pending;
        true
    }

    /// Read-only view for progress rendering.
    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            id: self.id,
            file_name: self.file_name.clone(),
            status: self.status,
            source_size: self.source.len(),
            result_size: self.result_size(),
            error: self.error.clone(),
        }
    }
}

/// Insert a suffix before the file extension, or append it when there is
/// no extension.
fn add_suffix(filename: &str, suffix: &str) -> String {
    match filename.rfind('.') {
        Some(idx) => format!("{}{}{}", &filename[..idx], suffix, &filename[idx..]),
        None => format!("{filename}{suffix}"),
    }
}
