//! The job state machine: decode → transform → encode for one request.
//!
//! ```text
//! Received ──▶ Decoding ──▶ Transforming ──▶ Encoding ──▶ Completed
//!    │            │              │               │
//!    └────────────┴──────────────┴───────────────┴──────▶ Failed
//! ```
//!
//! Transitions are strictly sequential. A job is consumed by
//! [`Job::execute`], so a failed job cannot be resumed; the caller builds a
//! new one with corrected input. Nothing survives the call except the
//! returned artifact: decoded sequences and intermediate buffers are dropped
//! when the job reaches a terminal state.
//!
//! Decoding, transforming and encoding are CPU-bound and run on Tokio's
//! blocking pool. During Rasterize, page PNGs are encoded concurrently
//! (bounded by `concurrency`) and collected in page order.

use crate::codec;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::format::Format;
use crate::model::{PageSequence, RasterPage, SourceDocument};
use crate::output::{JobOutput, JobStats, ResultArtifact};
use crate::pipeline::encode;
use crate::progress::ProgressCallback;
use crate::request::{TransformKind, TransformRequest};
use crate::transform::{self, Transformed};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Received,
    Decoding,
    Transforming,
    Encoding,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// `true` if `next` is a legal transition from `self`.
    pub fn can_advance_to(self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Received, Decoding)
            | (Decoding, Transforming)
            | (Transforming, Encoding)
            | (Encoding, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobState::Received => "received",
            JobState::Decoding => "decoding",
            JobState::Transforming => "transforming",
            JobState::Encoding => "encoding",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        })
    }
}

/// One request on its way to an artifact or an error.
pub struct Job {
    request: Arc<TransformRequest>,
    state: JobState,
    stats: JobStats,
    callback: Option<ProgressCallback>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("kind", &self.request.kind())
            .field("state", &self.state)
            .finish()
    }
}

impl Job {
    pub fn new(request: TransformRequest) -> Self {
        let stats = JobStats {
            kind: Some(request.kind()),
            input_documents: request.sources().len(),
            input_bytes: request.input_bytes(),
            states: vec![JobState::Received],
            ..Default::default()
        };
        Self {
            request: Arc::new(request),
            state: JobState::Received,
            stats,
            callback: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn kind(&self) -> TransformKind {
        self.request.kind()
    }

    /// Run the job to a terminal state.
    ///
    /// # Errors
    /// The first error raised by any stage. The job is `Failed` and no
    /// partial artifact is produced.
    pub async fn execute(mut self, config: &PipelineConfig) -> Result<JobOutput, PipelineError> {
        let total_start = Instant::now();
        let kind = self.kind();
        self.callback = config.progress_callback.clone();
        if let Some(ref cb) = self.callback {
            cb.on_job_start(kind);
        }
        info!(
            "Starting {} job: {} input(s), {} bytes",
            kind, self.stats.input_documents, self.stats.input_bytes
        );

        match self.drive(config).await {
            Ok(artifact) => {
                self.advance(JobState::Completed);
                self.stats.output_bytes = artifact.byte_len();
                self.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
                info!(
                    "{} job complete: {} → {} bytes {}, {}ms",
                    kind,
                    self.stats.input_bytes,
                    self.stats.output_bytes,
                    artifact.format,
                    self.stats.total_duration_ms
                );
                if let Some(ref cb) = self.callback {
                    cb.on_job_complete(artifact.format, self.stats.output_bytes);
                }
                Ok(JobOutput {
                    artifact,
                    stats: self.stats,
                })
            }
            Err(e) => {
                let stage = self.state;
                self.advance(JobState::Failed);
                warn!("{} job failed while {}: {}", kind, stage, e);
                if let Some(ref cb) = self.callback {
                    cb.on_job_failed(&e);
                }
                Err(e)
            }
        }
    }

    async fn drive(&mut self, config: &PipelineConfig) -> Result<ResultArtifact, PipelineError> {
        // ── Received: checks that need no decoding ───────────────────────
        self.request.validate()?;

        // ── Decoding ─────────────────────────────────────────────────────
        self.advance(JobState::Decoding);
        let start = Instant::now();
        let sources: Vec<SourceDocument> = self.request.sources().into_iter().cloned().collect();
        let decoded = tokio::task::spawn_blocking(move || decode_all(&sources))
            .await
            .map_err(join_error)??;
        self.stats.decoded_pages = decoded.iter().map(PageSequence::len).sum();
        self.stats.decode_duration_ms = start.elapsed().as_millis() as u64;
        debug!(
            "Decoded {} pages in {}ms",
            self.stats.decoded_pages, self.stats.decode_duration_ms
        );

        // ── Transforming ─────────────────────────────────────────────────
        self.advance(JobState::Transforming);
        let start = Instant::now();
        let request = Arc::clone(&self.request);
        let cfg = config.clone();
        let transformed =
            tokio::task::spawn_blocking(move || transform::apply(&request, decoded, &cfg))
                .await
                .map_err(join_error)??;
        self.stats.transform_duration_ms = start.elapsed().as_millis() as u64;
        self.stats.output_pages = transformed.page_count();
        debug!(
            "Transformed to {} pages in {}ms",
            self.stats.output_pages, self.stats.transform_duration_ms
        );

        // ── Encoding ─────────────────────────────────────────────────────
        self.advance(JobState::Encoding);
        let start = Instant::now();
        let artifact = match transformed {
            Transformed::Pages { pages, format } => {
                let cfg = config.clone();
                let bytes =
                    tokio::task::spawn_blocking(move || codec::encode(&pages, format, &cfg))
                        .await
                        .map_err(join_error)??;
                ResultArtifact::single(format, bytes)
            }
            Transformed::Rasters(rasters) => {
                ResultArtifact::pages(Format::Png, encode_rasters(rasters, config).await?)
            }
            Transformed::Compress {
                source,
                pages,
                profile,
            } => {
                let format = source.format();
                let cfg = config.clone();
                let bytes = tokio::task::spawn_blocking(move || {
                    transform::compress::compress(&source, &pages, profile, &cfg)
                })
                .await
                .map_err(join_error)??;
                ResultArtifact::single(format, bytes)
            }
        };
        self.stats.encode_duration_ms = start.elapsed().as_millis() as u64;
        Ok(artifact)
    }

    fn advance(&mut self, to: JobState) {
        let from = self.state;
        if !from.can_advance_to(to) {
            warn!("Ignoring illegal job transition {} → {}", from, to);
            return;
        }
        debug!("Job {} → {}", from, to);
        self.state = to;
        self.stats.states.push(to);
        if let Some(ref cb) = self.callback {
            cb.on_state_change(from, to);
        }
    }
}

/// Decode every source; the first failure aborts with its index.
fn decode_all(sources: &[SourceDocument]) -> Result<Vec<PageSequence>, PipelineError> {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| codec::decode(s).map_err(|e| PipelineError::decode(i, e)))
        .collect()
}

/// PNG-encode rendered pages concurrently, returning them in page order.
pub(crate) async fn encode_rasters(
    rasters: Vec<RasterPage>,
    config: &PipelineConfig,
) -> Result<Vec<Vec<u8>>, PipelineError> {
    let total = rasters.len();
    let mut pages = stream::iter(rasters.into_iter().enumerate())
        .map(|(i, raster)| encode_raster_task(i, raster))
        .buffered(config.concurrency.max(1));

    let mut out = Vec::with_capacity(total);
    while let Some(result) = pages.next().await {
        let (_, bytes) = result?;
        out.push(bytes);
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(out.len(), total);
        }
    }
    Ok(out)
}

/// Encode one rendered page on the blocking pool; `index` is 0-based.
pub(crate) async fn encode_raster_task(
    index: usize,
    raster: RasterPage,
) -> Result<(usize, Vec<u8>), PipelineError> {
    let bytes = tokio::task::spawn_blocking(move || encode::encode_page(&raster.image))
        .await
        .map_err(join_error)??;
    Ok((index + 1, bytes))
}

fn join_error(e: tokio::task::JoinError) -> PipelineError {
    PipelineError::Internal(format!("Worker task failed: {}", e))
}
