//! Progress-callback trait for job events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to follow a job
//! through its states and, during Rasterize, page by page.
//!
//! # Example
//!
//! ```rust
//! use toolsherd::{JobProgressCallback, JobState, PipelineConfig};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct StateLog(Mutex<Vec<JobState>>);
//!
//! impl JobProgressCallback for StateLog {
//!     fn on_state_change(&self, _from: JobState, to: JobState) {
//!         self.0.lock().unwrap().push(to);
//!     }
//! }
//!
//! let log = Arc::new(StateLog::default());
//! let config = PipelineConfig::builder()
//!     .progress_callback(log as Arc<dyn JobProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::PipelineError;
use crate::format::Format;
use crate::job::JobState;
use crate::request::TransformKind;
use std::sync::Arc;

/// Called by the orchestrator as a job advances.
///
/// Implementations must be `Send + Sync`: page events fire from the tasks that
/// encode pages, which may run on different threads. Every method has a
/// no-op default.
pub trait JobProgressCallback: Send + Sync {
    /// Called once, before the job leaves `Received`.
    fn on_job_start(&self, kind: TransformKind) {
        let _ = kind;
    }

    /// Called on every state transition, including the one into `Failed`.
    fn on_state_change(&self, from: JobState, to: JobState) {
        let _ = (from, to);
    }

    /// Called when a rasterised page has been encoded.
    ///
    /// # Arguments
    /// * `page_num`   : 1-indexed page number
    /// * `total_pages`: pages in the job
    fn on_page_complete(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called once when the job reaches `Completed`.
    ///
    /// `output_bytes` is the total size of the artifact body.
    fn on_job_complete(&self, format: Format, output_bytes: usize) {
        let _ = (format, output_bytes);
    }

    /// Called once when the job reaches `Failed`.
    fn on_job_failed(&self, error: &PipelineError) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        transitions: Mutex<Vec<(JobState, JobState)>>,
        pages: AtomicUsize,
        failed: AtomicUsize,
    }

    impl JobProgressCallback for Recorder {
        fn on_state_change(&self, from: JobState, to: JobState) {
            self.transitions.lock().unwrap().push((from, to));
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_failed(&self, _error: &PipelineError) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_job_start(TransformKind::Merge);
        cb.on_state_change(JobState::Received, JobState::Decoding);
        cb.on_page_complete(1, 3);
        cb.on_job_complete(Format::Pdf, 10);
        cb.on_job_failed(&PipelineError::Internal("x".into()));
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Recorder::default();
        rec.on_state_change(JobState::Received, JobState::Decoding);
        rec.on_page_complete(1, 2);
        rec.on_page_complete(2, 2);
        rec.on_job_failed(&PipelineError::Internal("boom".into()));

        assert_eq!(
            *rec.transitions.lock().unwrap(),
            vec![(JobState::Received, JobState::Decoding)]
        );
        assert_eq!(rec.pages.load(Ordering::SeqCst), 2);
        assert_eq!(rec.failed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_job_complete(Format::Png, 512);
    }
}
