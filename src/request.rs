//! Transform requests: what a job is asked to do.

use crate::config::CompressionLevel;
use crate::error::ValidationError;
use crate::format::Format;
use crate::model::{RasterPage, SourceDocument};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Merge needs at least this many documents.
pub const MIN_MERGE_INPUTS: usize = 2;

/// Input of a `ConvertFormat` request.
#[derive(Debug, Clone)]
pub enum ConvertInput {
    /// Encoded bytes, decoded by the matching codec.
    Document(SourceDocument),
    /// An already-decoded pixel buffer; skips decoding.
    Raster(RasterPage),
}

/// The single operation a job carries.
#[derive(Debug, Clone)]
pub enum TransformRequest {
    /// Concatenate the pages of every document, in order. Output: PDF.
    Merge { documents: Vec<SourceDocument> },
    /// Permute pages; `permutation[i]` is the original index placed at `i`.
    /// Output: PDF.
    Reorder {
        document: SourceDocument,
        permutation: Vec<usize>,
    },
    /// Render each page to PNG at `scale` pixels per point.
    Rasterize { document: SourceDocument, scale: f32 },
    /// Flat text per page with a page-number heading. Output: Word.
    ExtractText { document: SourceDocument },
    /// Re-encode at reduced fidelity. Output: the source format.
    Compress {
        document: SourceDocument,
        level: CompressionLevel,
    },
    /// Re-encode in another container format.
    ConvertFormat { input: ConvertInput, target: Format },
}

/// The variant tag of a [`TransformRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    Merge,
    Reorder,
    Rasterize,
    ExtractText,
    Compress,
    ConvertFormat,
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransformKind::Merge => "merge",
            TransformKind::Reorder => "reorder",
            TransformKind::Rasterize => "rasterize",
            TransformKind::ExtractText => "extract-text",
            TransformKind::Compress => "compress",
            TransformKind::ConvertFormat => "convert",
        })
    }
}

impl TransformRequest {
    pub fn merge(documents: impl IntoIterator<Item = SourceDocument>) -> Self {
        TransformRequest::Merge {
            documents: documents.into_iter().collect(),
        }
    }

    pub fn reorder(document: SourceDocument, permutation: impl Into<Vec<usize>>) -> Self {
        TransformRequest::Reorder {
            document,
            permutation: permutation.into(),
        }
    }

    pub fn rasterize(document: SourceDocument, scale: f32) -> Self {
        TransformRequest::Rasterize { document, scale }
    }

    pub fn extract_text(document: SourceDocument) -> Self {
        TransformRequest::ExtractText { document }
    }

    pub fn compress(document: SourceDocument, level: CompressionLevel) -> Self {
        TransformRequest::Compress { document, level }
    }

    pub fn convert(document: SourceDocument, target: Format) -> Self {
        TransformRequest::ConvertFormat {
            input: ConvertInput::Document(document),
            target,
        }
    }

    pub fn convert_raster(raster: RasterPage, target: Format) -> Self {
        TransformRequest::ConvertFormat {
            input: ConvertInput::Raster(raster),
            target,
        }
    }

    pub fn kind(&self) -> TransformKind {
        match self {
            TransformRequest::Merge { .. } => TransformKind::Merge,
            TransformRequest::Reorder { .. } => TransformKind::Reorder,
            TransformRequest::Rasterize { .. } => TransformKind::Rasterize,
            TransformRequest::ExtractText { .. } => TransformKind::ExtractText,
            TransformRequest::Compress { .. } => TransformKind::Compress,
            TransformRequest::ConvertFormat { .. } => TransformKind::ConvertFormat,
        }
    }

    /// The encoded documents this request decodes, in request order.
    pub fn sources(&self) -> Vec<&SourceDocument> {
        match self {
            TransformRequest::Merge { documents } => documents.iter().collect(),
            TransformRequest::Reorder { document, .. }
            | TransformRequest::Rasterize { document, .. }
            | TransformRequest::ExtractText { document }
            | TransformRequest::Compress { document, .. } => vec![document],
            TransformRequest::ConvertFormat { input, .. } => match input {
                ConvertInput::Document(d) => vec![d],
                ConvertInput::Raster(_) => Vec::new(),
            },
        }
    }

    /// Total bytes of encoded input.
    pub fn input_bytes(&self) -> usize {
        self.sources().iter().map(|s| s.len()).sum()
    }

    /// Checks that need no decoded content.
    ///
    /// The permutation of a Reorder is checked later, against the decoded
    /// page count.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            TransformRequest::Merge { documents } if documents.len() < MIN_MERGE_INPUTS => {
                Err(ValidationError::InsufficientInputs {
                    required: MIN_MERGE_INPUTS,
                    got: documents.len(),
                })
            }
            TransformRequest::Rasterize { scale, .. } if !(scale.is_finite() && *scale > 0.0) => {
                Err(ValidationError::InvalidScale { scale: *scale })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf() -> SourceDocument {
        SourceDocument::new(b"%PDF-1.7".to_vec(), Format::Pdf)
    }

    #[test]
    fn merge_needs_two_documents() {
        assert_eq!(
            TransformRequest::merge([pdf()]).validate(),
            Err(ValidationError::InsufficientInputs {
                required: 2,
                got: 1
            })
        );
        assert_eq!(
            TransformRequest::merge(Vec::new()).validate(),
            Err(ValidationError::InsufficientInputs {
                required: 2,
                got: 0
            })
        );
        assert!(TransformRequest::merge([pdf(), pdf()]).validate().is_ok());
    }

    #[test]
    fn rasterize_scale_must_be_positive_and_finite() {
        for bad in [0.0, -2.0, f32::NAN, f32::INFINITY] {
            let err = TransformRequest::rasterize(pdf(), bad).validate().unwrap_err();
            assert!(matches!(err, ValidationError::InvalidScale { .. }), "{bad}");
        }
        assert!(TransformRequest::rasterize(pdf(), 0.25).validate().is_ok());
    }

    #[test]
    fn permutation_is_not_checked_up_front() {
        assert!(TransformRequest::reorder(pdf(), vec![0, 0, 7]).validate().is_ok());
    }

    #[test]
    fn sources_follow_request_order() {
        let a = SourceDocument::new(b"%PDF-a".to_vec(), Format::Pdf);
        let b = SourceDocument::new(b"%PDF-bb".to_vec(), Format::Pdf);
        let req = TransformRequest::merge([a, b]);
        let lens: Vec<usize> = req.sources().iter().map(|s| s.len()).collect();
        assert_eq!(lens, vec![6, 7]);
        assert_eq!(req.input_bytes(), 13);
        assert_eq!(req.kind(), TransformKind::Merge);
    }
}
