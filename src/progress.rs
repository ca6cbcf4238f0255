//! Progress-callback trait for per-file intake events.
//!
//! Inject an [`Arc<dyn IntakeProgressCallback>`] via
//! [`crate::config::IntakeConfigBuilder::progress_callback`] to receive
//! events as the pipeline classifies and uploads each file.
//!
//! # Example
//!
//! ```rust
//! use doc_intake::{IntakeConfig, IntakeProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RejectCounter {
//!     rejected: AtomicUsize,
//! }
//!
//! impl IntakeProgressCallback for RejectCounter {
//!     fn on_file_rejected(&self, filename: &str, reason: &str) {
//!         self.rejected.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{filename}: {reason}");
//!     }
//! }
//!
//! let counter = Arc::new(RejectCounter { rejected: AtomicUsize::new(0) });
//!
//! let config = IntakeConfig::builder()
//!     .progress_callback(counter as Arc<dyn IntakeProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the intake pipeline as it processes a submission.
///
/// Implementations must be `Send + Sync`: upload events fire from
/// concurrently running upload futures. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait IntakeProgressCallback: Send + Sync {
    /// Called once, before the first file is classified.
    fn on_submission_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// A file passed classification (and the quality gate, for images).
    ///
    /// This is not final: if storing the file fails later,
    /// [`on_file_rejected`](Self::on_file_rejected) fires for the same file.
    fn on_file_accepted(&self, filename: &str, stored_name: &str) {
        let _ = (filename, stored_name);
    }

    /// A file was rejected, either during classification or at upload time
    /// (after an earlier `on_file_accepted`). Fires at most once per file.
    fn on_file_rejected(&self, filename: &str, reason: &str) {
        let _ = (filename, reason);
    }

    /// A processed file reached storage, or was skipped because a file with
    /// the same name already existed in its target folder.
    fn on_upload_complete(&self, stored_name: &str, skipped: bool) {
        let _ = (stored_name, skipped);
    }

    /// Called once after the report has been handled.
    fn on_submission_complete(&self, uploaded: usize, rejected: usize) {
        let _ = (uploaded, rejected);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IntakeProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IntakeConfig`].
pub type ProgressCallback = Arc<dyn IntakeProgressCallback>;
