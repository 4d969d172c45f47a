//! Error types for the toolsherd pipeline.
//!
//! Errors are split by the job stage that raises them:
//!
//! * [`DecodeError`]: a source buffer is not a valid instance of its
//!   declared format.
//! * [`ValidationError`]: the request parameters are inconsistent with the
//!   inputs (too few documents, a bad permutation, a bad scale).
//! * [`EncodeError`]: the transformed content cannot be written to the
//!   target format.
//!
//! [`PipelineError`] wraps all three and adds the ambient failures of the
//! surrounding I/O helpers (missing files, downloads, output writes, the
//! pdfium binding). Every error is terminal for its job: the orchestrator
//! never retries and never returns a partial artifact.

use crate::format::Format;
use crate::job::JobState;
use std::path::PathBuf;
use thiserror::Error;

/// A source buffer could not be decoded.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    /// Missing magic bytes, truncated structure, or an unsupported version.
    #[error("{format} input is malformed: {detail}")]
    Malformed { format: Format, detail: String },

    /// The PDF is encrypted; the pipeline does not handle passwords.
    #[error("{format} input is encrypted and cannot be processed")]
    Encrypted { format: Format },

    /// The caller declared a MIME type the pipeline does not know.
    #[error("Unsupported input format '{declared}'")]
    UnknownFormat { declared: String },
}

/// Request parameters rejected before or during the transform.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// Merge needs at least `required` documents.
    #[error("Merge needs at least {required} documents, got {got}")]
    InsufficientInputs { required: usize, got: usize },

    /// The permutation is not a bijection over the decoded page indices.
    ///
    /// `index` is the offending entry when one can be named (out of range,
    /// duplicated, or missing).
    #[error("Invalid page permutation: {reason}")]
    InvalidPermutation {
        index: Option<usize>,
        reason: String,
    },

    /// Rasterize scale must be finite and strictly positive.
    #[error("Invalid rasterize scale {scale}: must be > 0")]
    InvalidScale { scale: f32 },
}

/// Transformed content could not be serialised.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EncodeError {
    /// No lossless or approximate mapping exists from the content to `to`.
    #[error("Cannot encode {from} content as {to}: {detail}")]
    UnsupportedFeature {
        from: String,
        to: Format,
        detail: String,
    },

    /// The encoder could not produce a valid output buffer.
    #[error("Failed to write {format} output: {detail}")]
    Malformed { format: Format, detail: String },
}

/// All fatal errors returned by the toolsherd library.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Stage errors ──────────────────────────────────────────────────────
    /// Source document `source_index` (0-based, request order) failed to decode.
    #[error("Source document {source_index}: {source}")]
    Decode {
        source_index: usize,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The page renderer failed on a specific page (1-indexed).
    #[error("Rasterisation failed for page {page}: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or its directory) or install pdfium system-wide."
    )]
    RendererUnavailable(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (a worker task panicked, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Wrap a decode failure of the `source_index`-th input.
    pub fn decode(source_index: usize, source: DecodeError) -> Self {
        PipelineError::Decode {
            source_index,
            source,
        }
    }

    /// The job state in which this error is raised.
    ///
    /// Two kinds can also surface from another state:
    /// - validation errors for request parameters come from `Received`, the
    ///   permutation check from `Transforming`;
    /// - a PDF page's content stream is only parsed when its text is needed,
    ///   so a `Malformed` one fails ExtractText (and conversion to Word) in
    ///   `Transforming`.
    ///
    /// Every `Encode` error, `UnsupportedFeature` included, comes from
    /// `Encoding`.
    pub fn stage(&self) -> JobState {
        match self {
            PipelineError::Decode { .. } => JobState::Decoding,
            PipelineError::Validation(_)
            | PipelineError::RenderFailed { .. }
            | PipelineError::RendererUnavailable(_) => JobState::Transforming,
            PipelineError::Encode(_) | PipelineError::OutputWriteFailed { .. } => {
                JobState::Encoding
            }
            _ => JobState::Received,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_names_format_and_source() {
        let e = PipelineError::decode(
            1,
            DecodeError::Malformed {
                format: Format::Pdf,
                detail: "missing %PDF header".into(),
            },
        );
        let msg = e.to_string();
        assert!(msg.contains("Source document 1"), "got: {msg}");
        assert!(msg.contains("application/pdf"), "got: {msg}");
        assert!(msg.contains("missing %PDF header"), "got: {msg}");
    }

    #[test]
    fn insufficient_inputs_display() {
        let e = ValidationError::InsufficientInputs {
            required: 2,
            got: 1,
        };
        assert!(e.to_string().contains("at least 2"));
        assert!(e.to_string().contains("got 1"));
    }

    #[test]
    fn unsupported_feature_display() {
        let e = EncodeError::UnsupportedFeature {
            from: "vector page".into(),
            to: Format::Png,
            detail: "rasterize first".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("vector page"), "got: {msg}");
        assert!(msg.contains("image/png"), "got: {msg}");
    }

    #[test]
    fn stage_mapping() {
        assert_eq!(
            PipelineError::Validation(ValidationError::InvalidScale { scale: 0.0 }).stage(),
            JobState::Transforming
        );
        assert_eq!(
            PipelineError::Encode(EncodeError::Malformed {
                format: Format::Pdf,
                detail: "x".into()
            })
            .stage(),
            JobState::Encoding
        );
        assert_eq!(
            PipelineError::decode(
                0,
                DecodeError::Encrypted {
                    format: Format::Pdf
                }
            )
            .stage(),
            JobState::Decoding
        );
    }
}
