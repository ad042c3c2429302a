//! Upload screening ahead of the compression queue.
//!
//! The scheduler assumes every submitted item is a well-formed image of an
//! accepted format and a sane size; this module is the gate that makes the
//! assumption hold. A submission is partitioned into accepted uploads and
//! per-file rejections with reasons, plus submission-level errors (too
//! many files at once, queue at capacity), so a caller can report all of
//! them at once instead of failing on the first problem.

use image::ImageFormat;
use packfit_core::format_size;
use thiserror::Error;

/// Formats accepted into the queue.
const ACCEPTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Gif,
];

/// Caps applied to uploads before they reach the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRules {
    /// Largest accepted single file, in bytes.
    pub max_file_bytes: usize,
    /// Most files accepted in one submission.
    pub max_files_per_submission: usize,
    /// Most items the queue may hold in total.
    pub max_queue_len: usize,
}

impl Default for UploadRules {
    fn default() -> Self {
        Self {
            max_file_bytes: 50 * 1024 * 1024,
            max_files_per_submission: 50,
            max_queue_len: 100,
        }
    }
}

/// Why a single file was turned away.
#[derive(Debug, Error)]
pub enum RejectReason {
    /// The bytes carry no accepted image signature.
    #[error("unsupported file format")]
    UnsupportedFormat,

    /// The file exceeds the per-file size cap.
    #[error("file too large: {}, maximum allowed {}", format_size(*.0), format_size(*.1))]
    TooLarge(usize, usize),
}

/// Submission-level problems, reported alongside any per-file rejections.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// More files than one submission may carry; the excess was dropped.
    #[error("a submission may contain at most {limit} files, got {got}")]
    TooManyFiles { got: usize, limit: usize },

    /// The queue cannot hold the whole submission; only `remaining` more
    /// items fit.
    #[error("queue is full: room for {remaining} more files")]
    QueueFull { remaining: usize },
}

/// An upload that passed screening.
#[derive(Debug)]
pub struct AcceptedUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// An upload that was turned away, with every reason that applied.
#[derive(Debug)]
pub struct RejectedUpload {
    pub file_name: String,
    pub reasons: Vec<RejectReason>,
}

/// Outcome of screening one submission.
#[derive(Debug, Default)]
pub struct ScreenReport {
    pub accepted: Vec<AcceptedUpload>,
    pub rejected: Vec<RejectedUpload>,
    pub submission_errors: Vec<SubmissionError>,
}

/// Screen a submission of `(file name, bytes)` uploads against the rules,
/// given the current queue length.
///
/// Files failing the per-file checks land in `rejected` with all their
/// reasons. Valid files beyond the per-submission cap or the queue's
/// remaining capacity are dropped and the drop is reported as a
/// submission error; the queue cap is enforced here, not merely reported.
pub fn screen(
    files: Vec<(String, Vec<u8>)>,
    queue_len: usize,
    rules: &UploadRules,
) -> ScreenReport {
    let mut report = ScreenReport::default();

    if files.len() > rules.max_files_per_submission {
        report.submission_errors.push(SubmissionError::TooManyFiles {
            got: files.len(),
            limit: rules.max_files_per_submission,
        });
    }

    let queue_room = rules.max_queue_len.saturating_sub(queue_len);
    let capacity = rules.max_files_per_submission.min(queue_room);

    let mut over_capacity = false;
    for (file_name, bytes) in files {
        let mut reasons = Vec::new();

        if sniff_accepted_format(&bytes).is_none() {
            reasons.push(RejectReason::UnsupportedFormat);
        }
        if bytes.len() > rules.max_file_bytes {
            reasons.push(RejectReason::TooLarge(bytes.len(), rules.max_file_bytes));
        }

        if !reasons.is_empty() {
            report.rejected.push(RejectedUpload { file_name, reasons });
        } else if report.accepted.len() < capacity {
            report.accepted.push(AcceptedUpload { file_name, bytes });
        } else {
            over_capacity = true;
        }
    }

    if over_capacity && queue_room < rules.max_files_per_submission {
        report
            .submission_errors
            .push(SubmissionError::QueueFull { remaining: queue_room });
    }

    report
}

/// Sniff the byte signature and return the format if it is one the queue
/// accepts.
fn sniff_accepted_format(bytes: &[u8]) -> Option<ImageFormat> {
    let format = image::guess_format(bytes).ok()?;
    ACCEPTED_FORMATS.contains(&format).then_some(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// PNG signature followed by filler; enough for format sniffing.
    fn fake_png(len: usize) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.resize(len.max(8), 0);
        bytes
    }

    fn fake_jpeg() -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0]
    }

    #[test]
    fn test_accepts_valid_files() {
        let files = vec![
            ("a.png".to_string(), fake_png(100)),
            ("b.jpg".to_string(), fake_jpeg()),
        ];

        let report = screen(files, 0, &UploadRules::default());

        assert_eq!(report.accepted.len(), 2);
        assert!(report.rejected.is_empty());
        assert!(report.submission_errors.is_empty());
    }

    #[test]
    fn test_rejects_unrecognized_bytes() {
        let files = vec![("not_an_image.txt".to_string(), vec![b'h', b'i'])];

        let report = screen(files, 0, &UploadRules::default());

        assert!(report.accepted.is_empty());
        assert_eq!(report.rejected.len(), 1);
        assert!(matches!(
            report.rejected[0].reasons[0],
            RejectReason::UnsupportedFormat
        ));
    }

    #[test]
    fn test_rejects_oversized_file() {
        let rules = UploadRules {
            max_file_bytes: 64,
            ..UploadRules::default()
        };
        let files = vec![("big.png".to_string(), fake_png(100))];

        let report = screen(files, 0, &rules);

        assert_eq!(report.rejected.len(), 1);
        let reason = &report.rejected[0].reasons[0];
        assert!(matches!(reason, RejectReason::TooLarge(100, 64)));
        assert!(reason.to_string().contains("100 B"));
    }

    #[test]
    fn test_collects_every_reason_per_file() {
        let rules = UploadRules {
            max_file_bytes: 4,
            ..UploadRules::default()
        };
        let files = vec![("junk.bin".to_string(), vec![0u8; 16])];

        let report = screen(files, 0, &rules);

        assert_eq!(report.rejected[0].reasons.len(), 2);
    }

    #[test]
    fn test_submission_cap_drops_excess() {
        let rules = UploadRules {
            max_files_per_submission: 2,
            ..UploadRules::default()
        };
        let files = (0..4)
            .map(|i| (format!("f{i}.png"), fake_png(32)))
            .collect();

        let report = screen(files, 0, &rules);

        assert_eq!(report.accepted.len(), 2);
        assert!(report
            .submission_errors
            .iter()
            .any(|e| matches!(e, SubmissionError::TooManyFiles { got: 4, limit: 2 })));
    }

    #[test]
    fn test_queue_capacity_is_enforced() {
        let rules = UploadRules {
            max_queue_len: 10,
            ..UploadRules::default()
        };
        let files = (0..5)
            .map(|i| (format!("f{i}.png"), fake_png(32)))
            .collect();

        // 8 already queued: only 2 of the 5 fit
        let report = screen(files, 8, &rules);

        assert_eq!(report.accepted.len(), 2);
        assert!(report
            .submission_errors
            .iter()
            .any(|e| matches!(e, SubmissionError::QueueFull { remaining: 2 })));
    }

    #[test]
    fn test_full_queue_accepts_nothing() {
        let rules = UploadRules {
            max_queue_len: 3,
            ..UploadRules::default()
        };
        let files = vec![("a.png".to_string(), fake_png(32))];

        let report = screen(files, 3, &rules);

        assert!(report.accepted.is_empty());
        assert!(report
            .submission_errors
            .iter()
            .any(|e| matches!(e, SubmissionError::QueueFull { remaining: 0 })));
    }

    #[test]
    fn test_empty_submission() {
        let report = screen(Vec::new(), 0, &UploadRules::default());
        assert!(report.accepted.is_empty());
        assert!(report.rejected.is_empty());
        assert!(report.submission_errors.is_empty());
    }
}
