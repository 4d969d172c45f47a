//! Transforms: build a new page sequence (or final bytes) from decoded input.
//!
//! Transforms never mutate their input sequences. Each one takes the decoded
//! sequences of a request and produces a [`Transformed`] value that the
//! encoding stage knows how to serialise. Whether a page can be written in
//! the target format is decided by the encoder, so `UnsupportedFeature`
//! always surfaces from the encoding stage.
//!
//! | Request | Transform | Result |
//! |---------|-----------|--------|
//! | Merge | [`merge::merge`] | pages → PDF |
//! | Reorder | [`reorder::reorder`] | pages → PDF |
//! | Rasterize | [`rasterize::rasterize`] | PNG-per-page rasters |
//! | ExtractText | [`text::extract_text`] | text pages → Word |
//! | Compress | deferred | [`compress::compress`] runs while encoding |
//! | ConvertFormat | [`convert::convert`] | pages → target format |

pub mod compress;
pub mod convert;
pub mod merge;
pub mod rasterize;
pub mod reorder;
pub mod text;

use crate::config::{CompressionProfile, PipelineConfig};
use crate::error::PipelineError;
use crate::format::Format;
use crate::model::{Page, PageContent, PageSequence, RasterPage, SourceDocument};
use crate::request::{ConvertInput, TransformRequest};

/// Output of the transform stage.
#[derive(Debug)]
pub enum Transformed {
    /// A sequence still to be encoded as `format`.
    Pages { pages: PageSequence, format: Format },
    /// Rendered pages, each to be encoded as its own PNG.
    Rasters(Vec<RasterPage>),
    /// A source to re-encode in its own format with `profile`.
    Compress {
        source: SourceDocument,
        pages: PageSequence,
        profile: CompressionProfile,
    },
}

impl Transformed {
    /// Pages (or rasters) the encoding stage will see.
    pub fn page_count(&self) -> usize {
        match self {
            Transformed::Pages { pages, .. } => pages.len(),
            Transformed::Rasters(r) => r.len(),
            Transformed::Compress { pages, .. } => pages.len(),
        }
    }
}

/// Run the transform `request` names over its decoded sources.
///
/// `decoded` holds one sequence per entry of [`TransformRequest::sources`],
/// in the same order.
pub fn apply(
    request: &TransformRequest,
    decoded: Vec<PageSequence>,
    config: &PipelineConfig,
) -> Result<Transformed, PipelineError> {
    match request {
        TransformRequest::Merge { .. } => Ok(Transformed::Pages {
            pages: merge::merge(&decoded)?,
            format: Format::Pdf,
        }),
        TransformRequest::Reorder { permutation, .. } => Ok(Transformed::Pages {
            pages: reorder::reorder(&first(decoded)?, permutation)?,
            format: Format::Pdf,
        }),
        TransformRequest::Rasterize { scale, .. } => Ok(Transformed::Rasters(
            rasterize::rasterize(&first(decoded)?, *scale, config)?,
        )),
        TransformRequest::ExtractText { .. } => {
            let pages =
                text::extract_text(&first(decoded)?).map_err(|e| PipelineError::decode(0, e))?;
            Ok(Transformed::Pages {
                pages,
                format: Format::Docx,
            })
        }
        TransformRequest::Compress { document, level } => Ok(Transformed::Compress {
            source: document.clone(),
            pages: first(decoded)?,
            profile: level.profile(),
        }),
        TransformRequest::ConvertFormat { input, target } => {
            let pages = match input {
                ConvertInput::Document(_) => first(decoded)?,
                ConvertInput::Raster(raster) => PageSequence::new(vec![Page::new(
                    0,
                    PageContent::Raster(raster.clone()),
                )]),
            };
            let pages =
                convert::convert(pages, *target).map_err(|e| PipelineError::decode(0, e))?;
            Ok(Transformed::Pages {
                pages,
                format: *target,
            })
        }
    }
}

fn first(decoded: Vec<PageSequence>) -> Result<PageSequence, PipelineError> {
    decoded
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::Internal("transform ran without a decoded source".into()))
}
