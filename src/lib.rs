//! # toolsherd
//!
//! Merge, reorder, rasterise, extract text from, compress and convert PDFs,
//! images and Word documents, entirely in memory.
//!
//! ## Why this crate?
//!
//! Each of these tools is a thin wrapper around a format library, but they
//! all share one shape: decode the inputs into pages, do something to the
//! page list, encode the result. This crate makes that shape explicit. Every
//! format decodes into the same [`PageSequence`], every transform works on
//! that sequence, and every job goes through the same state machine, so
//! adding a format or a transform touches one module.
//!
//! ## Pipeline Overview
//!
//! ```text
//! bytes (+ format tag)
//!  │
//!  ├─ 1. Received      validate request parameters
//!  ├─ 2. Decoding      codec per input: PDF / PNG / JPEG / WebP / Word → pages
//!  ├─ 3. Transforming  merge · reorder · rasterize · extract-text · compress · convert
//!  ├─ 4. Encoding      pages → PDF / image / Word bytes (PNG per page for rasterize)
//!  └─ 5. Completed     one ResultArtifact   (or Failed with a tagged error)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use toolsherd::{run, PipelineConfig, SourceDocument, TransformRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let doc = SourceDocument::sniffed(std::fs::read("report.pdf")?)?;
//!     let request = TransformRequest::reorder(doc, vec![2, 0, 1]);
//!     let output = run(request, &PipelineConfig::default()).await?;
//!     std::fs::write("reordered.pdf", output.artifact.as_single().unwrap_or_default())?;
//!     eprintln!("{} ms", output.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `toolsherd` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! toolsherd = { version = "0.1", default-features = false }
//! ```
//!
//! ## What needs pdfium
//!
//! | Transform | Renderer needed |
//! |-----------|-----------------|
//! | Merge, Reorder, ExtractText, Compress, ConvertFormat | no |
//! | Rasterize of PDF or Word input | yes (`PDFIUM_LIB_PATH` or system library) |
//! | Rasterize of image input | no |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod job;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod request;
pub mod stream;
pub mod transform;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CompressionLevel, CompressionProfile, PipelineConfig, PipelineConfigBuilder};
pub use convert::{inspect, run, run_sync, run_to_file};
pub use error::{DecodeError, EncodeError, PipelineError, ValidationError};
pub use format::Format;
pub use job::{Job, JobState};
pub use model::{Page, PageContent, PageSequence, RasterPage, SourceDocument, TextPage};
pub use output::{ArtifactBody, DocumentMetadata, JobOutput, JobStats, PageSize, ResultArtifact};
pub use pipeline::render::{PageRenderer, PdfiumRenderer, RenderTarget};
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
pub use request::{ConvertInput, TransformKind, TransformRequest};
pub use stream::{rasterize_stream, PageStream};
